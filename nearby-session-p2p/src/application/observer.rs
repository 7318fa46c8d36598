use crate::application::{DiscoveryKind, Invitation};
use nearby_session_core::PeerIdentity;
use tokio::sync::mpsc;

/// Owner-side hooks invoked by the controller.
///
/// Every call happens inside the controller's serialized turn, after its
/// state lock has been released, so implementations may call back into the
/// controller (stop discovery, send, forget a peer, even shut down).
pub trait SessionObserver: Send + Sync {
    /// The roster changed; read the new buckets through the controller
    fn roster_changed(&self);

    fn data_received(&self, _from: &PeerIdentity, _payload: &[u8]) {}

    /// A deferred invitation waits for [`Invitation::resolve`]
    fn invitation_received(&self, _invitation: Invitation) {}

    /// A discovery channel stopped and must be restarted by the owner
    fn discovery_failed(&self, _channel: DiscoveryKind, _reason: &str) {}
}

/// Notification forwarded by [`ChannelObserver`]
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    RosterChanged,
    DataReceived { from: PeerIdentity, payload: Vec<u8> },
    InvitationReceived(Invitation),
    DiscoveryFailed { channel: DiscoveryKind, reason: String },
}

/// Observer that turns notifications into messages on a tokio channel, for
/// owners living in their own task
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ObserverEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("ChannelObserver: receiver dropped");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn roster_changed(&self) {
        self.forward(ObserverEvent::RosterChanged);
    }

    fn data_received(&self, from: &PeerIdentity, payload: &[u8]) {
        self.forward(ObserverEvent::DataReceived {
            from: from.clone(),
            payload: payload.to_vec(),
        });
    }

    fn invitation_received(&self, invitation: Invitation) {
        self.forward(ObserverEvent::InvitationReceived(invitation));
    }

    fn discovery_failed(&self, channel: DiscoveryKind, reason: &str) {
        self.forward(ObserverEvent::DiscoveryFailed {
            channel,
            reason: reason.to_string(),
        });
    }
}
