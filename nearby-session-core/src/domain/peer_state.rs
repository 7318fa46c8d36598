use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection phase of a single peer, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    /// Handshake in progress
    Connecting,
    /// Channel open, peer reachable for messaging
    Connected,
    /// Known peer without a live channel
    NotConnected,
}

impl PeerState {
    /// Every state, in the order the roster buckets are presented
    pub const ALL: [PeerState; 3] = [
        PeerState::Connecting,
        PeerState::Connected,
        PeerState::NotConnected,
    ];

    /// Human readable label for this state
    pub fn describe(self) -> &'static str {
        match self {
            PeerState::Connecting => "Connecting",
            PeerState::Connected => "Connected",
            PeerState::NotConnected => "Not Connected",
        }
    }

    /// Whether `next` is a regular step of the per-peer state machine.
    ///
    /// NotConnected -> Connecting -> Connected -> NotConnected, plus
    /// Connecting -> NotConnected when an invitation times out or is declined.
    pub fn can_transition_to(self, next: PeerState) -> bool {
        matches!(
            (self, next),
            (PeerState::NotConnected, PeerState::Connecting)
                | (PeerState::Connecting, PeerState::Connected)
                | (PeerState::Connecting, PeerState::NotConnected)
                | (PeerState::Connected, PeerState::NotConnected)
        )
    }

    pub fn is_live(self) -> bool {
        !matches!(self, PeerState::NotConnected)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
