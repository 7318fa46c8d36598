use crate::application::controller::Shared;
use crate::application::Invitation;
use crate::error::{Result, SessionError};
use crate::infrastructure::{Reliability, Transport, TransportError};
use futures::stream::{FuturesUnordered, StreamExt};
use nearby_session_core::{PeerId, PeerIdentity, PeerState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Per-peer channel table kept in step with the transport's state reports.
///
/// Lives inside the controller's state lock; it never awaits.
pub struct Session<T: Transport> {
    transport: Arc<T>,
    channels: HashMap<PeerId, (PeerIdentity, PeerState)>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            channels: HashMap::new(),
        }
    }

    /// Ask `peer` to join. The transport drops the invite silently once
    /// `timeout` passes without an answer.
    pub fn invite(&self, peer: &PeerIdentity, context: Vec<u8>, timeout: Duration) -> Result<()> {
        tracing::debug!("📨 Inviting {} (timeout {:?})", peer, timeout);
        self.transport.invite(peer, context, timeout)?;
        Ok(())
    }

    /// Record a transition reported by the transport. The transport is
    /// authoritative, so unexpected transitions are applied and logged.
    pub fn on_state_changed(&mut self, peer: &PeerIdentity, old: PeerState, new: PeerState) {
        let known = self
            .channels
            .get(&peer.id())
            .map(|(_, state)| *state)
            .unwrap_or(PeerState::NotConnected);

        if known != old {
            tracing::warn!(
                "⚠️  {} reported {} -> {}, but was {}",
                peer,
                old,
                new,
                known
            );
        }

        if known != new && !known.can_transition_to(new) {
            tracing::warn!("⚠️  Unexpected transition for {}: {} -> {}", peer, known, new);
        }

        match new {
            PeerState::NotConnected => {
                if self.channels.remove(&peer.id()).is_some() {
                    tracing::info!("🔌 {} disconnected", peer);
                }
            }
            PeerState::Connected => {
                tracing::info!("✅ {} connected", peer);
                self.channels.insert(peer.id(), (peer.clone(), new));
            }
            PeerState::Connecting => {
                self.channels.insert(peer.id(), (peer.clone(), new));
            }
        }
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        matches!(
            self.channels.get(peer_id),
            Some((_, PeerState::Connected))
        )
    }

    pub fn connected_peers(&self) -> Vec<PeerIdentity> {
        self.channels
            .values()
            .filter(|(_, state)| *state == PeerState::Connected)
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    /// Identity of the peer to send to, if a channel is open
    pub fn prepare_send(&self, peer_id: &PeerId) -> Result<PeerIdentity> {
        match self.channels.get(peer_id) {
            Some((identity, PeerState::Connected)) => Ok(identity.clone()),
            _ => Err(SessionError::PeerNotConnected(*peer_id)),
        }
    }

    /// Close every channel and forget the table
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.channels.clear();
    }
}

/// Hand one payload to the transport, bounded by `timeout`
pub(crate) async fn deliver<T: Transport + ?Sized>(
    transport: &T,
    peer: &PeerIdentity,
    payload: Vec<u8>,
    reliability: Reliability,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, transport.send(peer, payload, reliability)).await {
        Ok(Ok(())) => Ok(()),
        // The channel closed between our check and the send
        Ok(Err(TransportError::Unreachable(id))) => Err(SessionError::PeerNotConnected(id)),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            tracing::warn!("⏱️  Send to {} timed out after {:?}", peer, timeout);
            Err(SessionError::SendTimedOut {
                peer: peer.id(),
                timeout,
            })
        }
    }
}

/// Per-peer outcome counts of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastSummary {
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Cheap, cloneable handle for messaging and invitations.
///
/// Async operations never hold the controller's locks across an await.
pub struct SessionHandle<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for SessionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> SessionHandle<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub fn display_name(&self) -> &str {
        self.shared.transport.local_identity().display_name()
    }

    /// Invite `peer`, tracking it in the roster if it is new
    pub fn invite(&self, peer: &PeerIdentity, context: Vec<u8>) -> Result<()> {
        self.shared.invite(peer, context)
    }

    pub fn accept(&self, invitation: &Invitation) -> Result<()> {
        self.shared.resolve_invitation(invitation, true)
    }

    pub fn reject(&self, invitation: &Invitation) -> Result<()> {
        self.shared.resolve_invitation(invitation, false)
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.shared.state.lock().session.is_connected(peer_id)
    }

    pub fn connected_peers(&self) -> Vec<PeerIdentity> {
        self.shared.state.lock().session.connected_peers()
    }

    /// Send to one connected peer
    pub async fn send(
        &self,
        peer_id: &PeerId,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> Result<()> {
        self.shared.ensure_open()?;
        let peer = self.shared.state.lock().session.prepare_send(peer_id)?;

        tracing::trace!(
            "📤 {} bytes to {} ({})",
            payload.len(),
            peer,
            reliability
        );

        deliver(
            self.shared.transport.as_ref(),
            &peer,
            payload,
            reliability,
            self.shared.config.send_timeout,
        )
        .await
    }

    /// Send to every connected peer concurrently. Each peer's outcome goes
    /// to `on_complete` as it finishes; failures never abort the others.
    pub async fn broadcast<F>(
        &self,
        payload: Vec<u8>,
        reliability: Reliability,
        mut on_complete: F,
    ) -> Result<BroadcastSummary>
    where
        F: FnMut(&PeerIdentity, Result<()>),
    {
        self.shared.ensure_open()?;
        let peers = self.connected_peers();
        let timeout = self.shared.config.send_timeout;

        tracing::debug!(
            "📢 Broadcasting {} bytes to {} peers",
            payload.len(),
            peers.len()
        );

        let mut sends: FuturesUnordered<_> = peers
            .into_iter()
            .map(|peer| {
                let transport = self.shared.transport.clone();
                let payload = payload.clone();
                async move {
                    let result =
                        deliver(transport.as_ref(), &peer, payload, reliability, timeout).await;
                    (peer, result)
                }
            })
            .collect();

        let mut summary = BroadcastSummary::default();
        while let Some((peer, result)) = sends.next().await {
            match &result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    tracing::warn!("❌ Broadcast to {} failed: {}", peer, e);
                    summary.failed += 1;
                }
            }
            on_complete(&peer, result);
        }

        Ok(summary)
    }
}
