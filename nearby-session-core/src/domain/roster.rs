use crate::domain::{PeerId, PeerIdentity, PeerState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of applying one fact to the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterUpdate {
    /// Peer was not tracked before and now is
    Inserted(PeerState),
    /// Peer moved from one bucket to another
    Moved { from: PeerState, to: PeerState },
    /// Peer was forgotten entirely
    Removed,
    /// Nothing changed
    Unchanged,
}

impl RosterUpdate {
    pub fn is_change(&self) -> bool {
        !matches!(self, RosterUpdate::Unchanged)
    }
}

/// Roster entry for one tracked peer
#[derive(Debug, Clone)]
struct RosterEntry {
    identity: PeerIdentity,
    state: PeerState,
    /// Position within the current bucket (bumped on every move)
    since: u64,
}

/// Authoritative record of every known peer and its connection state.
///
/// There is a single map keyed by peer id; the connecting / connected /
/// disconnected buckets are views filtered by state, so a peer can never
/// sit in two buckets at once.
#[derive(Debug, Default)]
pub struct Roster {
    peers: HashMap<PeerId, RosterEntry>,
    next_seq: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Start tracking a peer we have just heard about (found by the browser,
    /// invited by us, or inviting us). Already tracked peers keep their state.
    pub fn observe(&mut self, identity: &PeerIdentity) -> RosterUpdate {
        if self.peers.contains_key(&identity.id()) {
            return RosterUpdate::Unchanged;
        }

        let since = self.next_seq();
        self.peers.insert(
            identity.id(),
            RosterEntry {
                identity: identity.clone(),
                state: PeerState::NotConnected,
                since,
            },
        );

        RosterUpdate::Inserted(PeerState::NotConnected)
    }

    /// Discovery lost sight of a peer. Only idle peers are forgotten; a live
    /// or pending connection outranks a stale discovery loss.
    pub fn lose(&mut self, peer_id: &PeerId) -> RosterUpdate {
        match self.peers.get(peer_id).map(|entry| entry.state) {
            Some(PeerState::NotConnected) => {
                self.peers.remove(peer_id);
                RosterUpdate::Removed
            }
            _ => RosterUpdate::Unchanged,
        }
    }

    /// Move a peer to the state reported by the transport
    pub fn apply_state(&mut self, identity: &PeerIdentity, state: PeerState) -> RosterUpdate {
        let since = self.next_seq();

        match self.peers.get_mut(&identity.id()) {
            Some(entry) if entry.state == state => RosterUpdate::Unchanged,
            Some(entry) => {
                let from = entry.state;
                entry.state = state;
                entry.since = since;
                tracing::trace!("Roster: {} {} -> {}", identity, from, state);
                RosterUpdate::Moved { from, to: state }
            }
            None => {
                self.peers.insert(
                    identity.id(),
                    RosterEntry {
                        identity: identity.clone(),
                        state,
                        since,
                    },
                );
                RosterUpdate::Inserted(state)
            }
        }
    }

    /// Forget a peer on explicit request. Peers with a live or pending
    /// connection are kept.
    pub fn forget(&mut self, peer_id: &PeerId) -> RosterUpdate {
        self.lose(peer_id)
    }

    /// Drop every peer (session teardown)
    pub fn clear(&mut self) -> RosterUpdate {
        if self.peers.is_empty() {
            return RosterUpdate::Unchanged;
        }

        self.peers.clear();
        RosterUpdate::Removed
    }

    pub fn state_of(&self, peer_id: &PeerId) -> Option<PeerState> {
        self.peers.get(peer_id).map(|entry| entry.state)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerIdentity> {
        self.peers.get(peer_id).map(|entry| &entry.identity)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All peers in `state`, in the order they entered that bucket
    pub fn peers_in(&self, state: PeerState) -> Vec<PeerIdentity> {
        let mut entries: Vec<&RosterEntry> = self
            .peers
            .values()
            .filter(|entry| entry.state == state)
            .collect();

        entries.sort_by_key(|entry| entry.since);
        entries
            .into_iter()
            .map(|entry| entry.identity.clone())
            .collect()
    }

    /// Immutable copy of all three buckets
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            connecting: self.peers_in(PeerState::Connecting),
            connected: self.peers_in(PeerState::Connected),
            disconnected: self.peers_in(PeerState::NotConnected),
        }
    }
}

/// Point-in-time copy of the roster, safe to read without any lock held
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub connecting: Vec<PeerIdentity>,
    pub connected: Vec<PeerIdentity>,
    pub disconnected: Vec<PeerIdentity>,
}

impl RosterSnapshot {
    pub fn peers_in(&self, state: PeerState) -> &[PeerIdentity] {
        match state {
            PeerState::Connecting => &self.connecting,
            PeerState::Connected => &self.connected,
            PeerState::NotConnected => &self.disconnected,
        }
    }

    pub fn len(&self) -> usize {
        self.connecting.len() + self.connected.len() + self.disconnected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket holding `peer_id`, if any
    pub fn state_of(&self, peer_id: &PeerId) -> Option<PeerState> {
        PeerState::ALL.into_iter().find(|state| {
            self.peers_in(*state)
                .iter()
                .any(|peer| peer.id() == *peer_id)
        })
    }
}
