use crate::application::TransportEvent;
use crate::infrastructure::error::TransportResult;
use async_trait::async_trait;
use nearby_session_core::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Delivery guarantee requested for a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reliability {
    /// Ordered and retransmitted
    Reliable,
    /// Best-effort, may be dropped or reordered
    Unreliable,
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reliability::Reliable => write!(f, "reliable"),
            Reliability::Unreliable => write!(f, "unreliable"),
        }
    }
}

/// Link-layer capability consumed by the session controller.
///
/// Implementations do the actual discovery, handshakes, framing and
/// encryption. Callbacks from their worker threads are buffered and handed
/// over in batches through [`Transport::poll_events`], so the controller
/// processes them inside its own serialized turn.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Identity this transport advertises
    fn local_identity(&self) -> &PeerIdentity;

    /// Look for peers advertising `service_type`
    fn start_browsing(&self, service_type: &str) -> TransportResult<()>;
    fn stop_browsing(&self);

    /// Make this peer visible to browsers of `service_type`
    fn start_advertising(&self, service_type: &str) -> TransportResult<()>;
    fn stop_advertising(&self);

    /// Ask `peer` to join our session. Past `timeout` the invitation lapses
    /// silently.
    fn invite(&self, peer: &PeerIdentity, context: Vec<u8>, timeout: Duration)
        -> TransportResult<()>;

    /// Hand one payload to the link layer. May wait on backpressure; the
    /// caller bounds the wait.
    async fn send(
        &self,
        peer: &PeerIdentity,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> TransportResult<()>;

    /// Close every open channel
    fn disconnect(&self);

    /// Drain events buffered since the last call
    fn poll_events(&self) -> Vec<TransportEvent>;
}
