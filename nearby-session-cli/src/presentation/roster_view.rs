use nearby_session_core::{PeerState, RosterSnapshot};
use serde_json::json;
use std::fmt::Write;

/// Section order of the roster table
pub const SECTIONS: [PeerState; 3] = [
    PeerState::NotConnected,
    PeerState::Connecting,
    PeerState::Connected,
];

/// Placeholder row for an empty section
pub const EMPTY_ROW: &str = "None";

/// Plain-text roster: a title, then one section per state listing peer
/// names, with a single "None" row when a section is empty
pub fn render(display_name: &str, snapshot: &RosterSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Session: {}", display_name);

    for state in SECTIONS {
        let _ = writeln!(out, "  {}", state.describe());

        let peers = snapshot.peers_in(state);
        if peers.is_empty() {
            let _ = writeln!(out, "    {}", EMPTY_ROW);
        }
        for peer in peers {
            let _ = writeln!(out, "    {}", peer.display_name());
        }
    }

    out
}

/// Same content as [`render`], as one JSON document
pub fn render_json(
    display_name: &str,
    snapshot: &RosterSnapshot,
) -> Result<String, serde_json::Error> {
    let sections: Vec<_> = SECTIONS
        .iter()
        .map(|state| {
            json!({
                "state": state.describe(),
                "peers": snapshot.peers_in(*state),
            })
        })
        .collect();

    serde_json::to_string(&json!({
        "session": display_name,
        "sections": sections,
    }))
}
