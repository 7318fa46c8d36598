use crate::application::{DiscoveryKind, InvitationResponder};
use crate::infrastructure::Reliability;
use nearby_session_core::{PeerIdentity, PeerState};

/// Events reported by the transport (discovery + connection + data)
#[derive(Debug)]
pub enum TransportEvent {
    /// Browser found an advertising peer
    PeerFound(PeerIdentity),
    /// Browser lost sight of a peer
    PeerLost(PeerIdentity),
    /// A nearby peer asked to join our session
    InvitationReceived {
        from: PeerIdentity,
        context: Vec<u8>,
        responder: InvitationResponder,
    },
    /// A discovery channel stopped for good (until restarted)
    DiscoveryFailed {
        channel: DiscoveryKind,
        reason: String,
    },
    /// Connection phase of a peer changed
    StateChanged {
        peer: PeerIdentity,
        old: PeerState,
        new: PeerState,
    },
    /// Inbound payload
    DataReceived {
        from: PeerIdentity,
        payload: Vec<u8>,
        reliability: Reliability,
    },
}

impl TransportEvent {
    /// Whether this event originates from a discovery channel
    pub fn discovery_kind(&self) -> Option<DiscoveryKind> {
        match self {
            TransportEvent::PeerFound(_) | TransportEvent::PeerLost(_) => {
                Some(DiscoveryKind::Browser)
            }
            TransportEvent::InvitationReceived { .. } => Some(DiscoveryKind::Advertiser),
            TransportEvent::DiscoveryFailed { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}
