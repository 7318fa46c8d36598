use crate::application::{
    validate_service_type, DiscoveryKind, InvitationResponder, TransportEvent,
};
use crate::infrastructure::error::{TransportError, TransportResult};
use crate::infrastructure::{Reliability, Transport};
use async_trait::async_trait;
use instant::Instant;
use nearby_session_core::{IdentityError, PeerId, PeerIdentity, PeerState};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// How accepted invitations turn into connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeMode {
    /// Connecting then Connected right away
    #[default]
    Immediate,
    /// Stays Connecting until [`MemoryNetwork::complete_handshake`] or
    /// [`MemoryNetwork::fail_handshake`]
    Manual,
}

/// One participant on the simulated network
struct Node {
    identity: PeerIdentity,
    /// Service type being browsed, if any
    browsing: Option<String>,
    /// Service type being advertised, if any
    advertising: Option<String>,
    inbox: VecDeque<TransportEvent>,
    links: HashMap<PeerId, PeerState>,
    stalled: bool,
    radio_available: bool,
}

impl Node {
    fn link_state(&self, peer: &PeerId) -> PeerState {
        self.links
            .get(peer)
            .copied()
            .unwrap_or(PeerState::NotConnected)
    }
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<PeerId, Node>,
    handshake: HandshakeMode,
}

impl NetworkState {
    /// Move the link between `a` and `b` to `new`, reporting the change to
    /// both ends
    fn set_link(&mut self, a: PeerId, b: PeerId, new: PeerState) -> bool {
        let (Some(a_identity), Some(b_identity)) = (
            self.nodes.get(&a).map(|n| n.identity.clone()),
            self.nodes.get(&b).map(|n| n.identity.clone()),
        ) else {
            return false;
        };

        let mut changed = false;
        for (side, other) in [(a, &b_identity), (b, &a_identity)] {
            if let Some(node) = self.nodes.get_mut(&side) {
                let old = node.link_state(&other.id());
                if old == new {
                    continue;
                }

                if new == PeerState::NotConnected {
                    node.links.remove(&other.id());
                } else {
                    node.links.insert(other.id(), new);
                }
                node.inbox.push_back(TransportEvent::StateChanged {
                    peer: other.clone(),
                    old,
                    new,
                });
                changed = true;
            }
        }

        changed
    }

    /// Nodes other than `except` browsing for `service_type`
    fn browsers_of(&self, service_type: &str, except: PeerId) -> Vec<PeerId> {
        self.nodes
            .values()
            .filter(|n| n.identity.id() != except)
            .filter(|n| n.browsing.as_deref() == Some(service_type))
            .map(|n| n.identity.id())
            .collect()
    }

    /// Identities other than `except` advertising `service_type`
    fn advertisers_of(&self, service_type: &str, except: PeerId) -> Vec<PeerIdentity> {
        self.nodes
            .values()
            .filter(|n| n.identity.id() != except)
            .filter(|n| n.advertising.as_deref() == Some(service_type))
            .map(|n| n.identity.clone())
            .collect()
    }

    fn push(&mut self, to: &PeerId, event: TransportEvent) {
        if let Some(node) = self.nodes.get_mut(to) {
            node.inbox.push_back(event);
        }
    }
}

/// In-process neighbourhood shared by any number of [`MemoryTransport`]s.
///
/// Discovery, invitations, handshakes and data all travel through per-node
/// inboxes drained by `poll_events`. Test hooks let a caller sever links,
/// stall senders or break discovery at any moment.
#[derive(Default)]
pub struct MemoryNetwork {
    state: Mutex<NetworkState>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_handshake(mode: HandshakeMode) -> Arc<Self> {
        let network = Self::default();
        network.state.lock().handshake = mode;
        Arc::new(network)
    }

    pub fn set_handshake_mode(&self, mode: HandshakeMode) {
        self.state.lock().handshake = mode;
    }

    /// Add a participant called `display_name`. It neither browses nor
    /// advertises until asked to.
    pub fn join(self: &Arc<Self>, display_name: &str) -> Result<MemoryTransport, IdentityError> {
        let identity = PeerIdentity::new(display_name)?;

        self.state.lock().nodes.insert(
            identity.id(),
            Node {
                identity: identity.clone(),
                browsing: None,
                advertising: None,
                inbox: VecDeque::new(),
                links: HashMap::new(),
                stalled: false,
                radio_available: true,
            },
        );

        tracing::debug!("🔌 MemoryNetwork: {} joined", identity);

        Ok(MemoryTransport {
            network: self.clone(),
            identity,
        })
    }

    /// Remove a participant: browsers lose sight of it and its links drop
    pub fn leave(&self, id: &PeerId) {
        let mut state = self.state.lock();

        let linked: Vec<PeerId> = match state.nodes.get(id) {
            Some(node) => node.links.keys().copied().collect(),
            None => return,
        };
        for peer in linked {
            state.set_link(*id, peer, PeerState::NotConnected);
        }

        if let Some(node) = state.nodes.remove(id) {
            if let Some(service_type) = &node.advertising {
                for browser in state.browsers_of(service_type, *id) {
                    state.push(&browser, TransportEvent::PeerLost(node.identity.clone()));
                }
            }
            tracing::debug!("🔌 MemoryNetwork: {} left", node.identity);
        }
    }

    /// Connect two nodes without an invitation
    pub fn link(&self, a: &PeerId, b: &PeerId) -> bool {
        let mut state = self.state.lock();
        state.set_link(*a, *b, PeerState::Connecting);
        state.set_link(*a, *b, PeerState::Connected)
    }

    /// Finish a pending handshake (manual mode)
    pub fn complete_handshake(&self, a: &PeerId, b: &PeerId) -> bool {
        let mut state = self.state.lock();
        match state.nodes.get(a).map(|n| n.link_state(b)) {
            Some(PeerState::Connecting) => state.set_link(*a, *b, PeerState::Connected),
            _ => false,
        }
    }

    /// Abort a pending handshake (manual mode)
    pub fn fail_handshake(&self, a: &PeerId, b: &PeerId) -> bool {
        let mut state = self.state.lock();
        match state.nodes.get(a).map(|n| n.link_state(b)) {
            Some(PeerState::Connecting) => state.set_link(*a, *b, PeerState::NotConnected),
            _ => false,
        }
    }

    /// Drop the link between two nodes, as if they moved out of range
    pub fn sever(&self, a: &PeerId, b: &PeerId) -> bool {
        self.state.lock().set_link(*a, *b, PeerState::NotConnected)
    }

    /// Report `peer` as lost to `observer`'s browser
    pub fn lose_sight(&self, observer: &PeerId, peer: &PeerId) {
        let mut state = self.state.lock();
        let Some(identity) = state.nodes.get(peer).map(|n| n.identity.clone()) else {
            return;
        };
        if state.nodes.get(observer).is_some_and(|n| n.browsing.is_some()) {
            state.push(observer, TransportEvent::PeerLost(identity));
        }
    }

    /// Sends from a stalled node never complete
    pub fn set_stalled(&self, id: &PeerId, stalled: bool) {
        if let Some(node) = self.state.lock().nodes.get_mut(id) {
            node.stalled = stalled;
        }
    }

    /// Kill a running discovery channel of `id`
    pub fn fail_discovery(&self, id: &PeerId, channel: DiscoveryKind, reason: &str) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(id) {
            match channel {
                DiscoveryKind::Browser => node.browsing = None,
                DiscoveryKind::Advertiser => node.advertising = None,
            }
            node.inbox.push_back(TransportEvent::DiscoveryFailed {
                channel,
                reason: reason.to_string(),
            });
        }
    }

    /// With the radio off, discovery cannot start
    pub fn set_radio_available(&self, id: &PeerId, available: bool) {
        if let Some(node) = self.state.lock().nodes.get_mut(id) {
            node.radio_available = available;
        }
    }

    pub fn is_browsing(&self, id: &PeerId) -> bool {
        self.state
            .lock()
            .nodes
            .get(id)
            .is_some_and(|n| n.browsing.is_some())
    }

    pub fn is_advertising(&self, id: &PeerId) -> bool {
        self.state
            .lock()
            .nodes
            .get(id)
            .is_some_and(|n| n.advertising.is_some())
    }

    /// Link state as seen from `a`
    pub fn link_state(&self, a: &PeerId, b: &PeerId) -> PeerState {
        self.state
            .lock()
            .nodes
            .get(a)
            .map(|n| n.link_state(b))
            .unwrap_or(PeerState::NotConnected)
    }

    pub fn peers(&self) -> Vec<PeerIdentity> {
        self.state
            .lock()
            .nodes
            .values()
            .map(|n| n.identity.clone())
            .collect()
    }

    fn answer_invitation(&self, inviter: PeerId, invitee: PeerId, accept: bool, deadline: Instant) {
        if !accept {
            tracing::debug!("MemoryNetwork: invitation declined");
            return;
        }
        if Instant::now() > deadline {
            tracing::debug!("MemoryNetwork: invitation answered after it lapsed");
            return;
        }

        let mut state = self.state.lock();
        let current = state
            .nodes
            .get(&inviter)
            .map(|n| n.link_state(&invitee))
            .unwrap_or(PeerState::NotConnected);
        if current != PeerState::NotConnected {
            return;
        }

        state.set_link(inviter, invitee, PeerState::Connecting);
        if state.handshake == HandshakeMode::Immediate {
            state.set_link(inviter, invitee, PeerState::Connected);
        }
    }
}

/// One participant's view of a [`MemoryNetwork`]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    identity: PeerIdentity,
}

impl MemoryTransport {
    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    /// Returns `true` if the sender is stalled and the send must hang
    fn deliver_now(&self, peer: &PeerIdentity, payload: Vec<u8>, reliability: Reliability) -> TransportResult<bool> {
        let mut state = self.network.state.lock();
        let me = self.identity.id();

        let node = state
            .nodes
            .get(&me)
            .ok_or_else(|| TransportError::Unavailable("left the network".to_string()))?;
        if node.stalled {
            return Ok(true);
        }
        if node.link_state(&peer.id()) != PeerState::Connected {
            return Err(TransportError::Unreachable(peer.id()));
        }

        state.push(
            &peer.id(),
            TransportEvent::DataReceived {
                from: self.identity.clone(),
                payload,
                reliability,
            },
        );
        Ok(false)
    }

    fn check_start(&self, service_type: &str) -> TransportResult<()> {
        validate_service_type(service_type)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        self.check_radio()
    }

    fn check_radio(&self) -> TransportResult<()> {
        match self.network.state.lock().nodes.get(&self.identity.id()) {
            Some(node) if node.radio_available => Ok(()),
            Some(_) => Err(TransportError::Unavailable("radio off".to_string())),
            None => Err(TransportError::Unavailable("left the network".to_string())),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_identity(&self) -> &PeerIdentity {
        &self.identity
    }

    fn start_browsing(&self, service_type: &str) -> TransportResult<()> {
        self.check_start(service_type)?;

        let mut state = self.network.state.lock();
        let me = self.identity.id();

        if let Some(node) = state.nodes.get_mut(&me) {
            node.browsing = Some(service_type.to_string());
        }

        for advertiser in state.advertisers_of(service_type, me) {
            state.push(&me, TransportEvent::PeerFound(advertiser));
        }
        Ok(())
    }

    fn stop_browsing(&self) {
        if let Some(node) = self.network.state.lock().nodes.get_mut(&self.identity.id()) {
            node.browsing = None;
        }
    }

    fn start_advertising(&self, service_type: &str) -> TransportResult<()> {
        self.check_start(service_type)?;

        let mut state = self.network.state.lock();
        let me = self.identity.id();

        if let Some(node) = state.nodes.get_mut(&me) {
            node.advertising = Some(service_type.to_string());
        }

        for browser in state.browsers_of(service_type, me) {
            state.push(&browser, TransportEvent::PeerFound(self.identity.clone()));
        }
        Ok(())
    }

    fn stop_advertising(&self) {
        let mut state = self.network.state.lock();
        let me = self.identity.id();

        let Some(service_type) = state.nodes.get_mut(&me).and_then(|n| n.advertising.take())
        else {
            return;
        };

        for browser in state.browsers_of(&service_type, me) {
            state.push(&browser, TransportEvent::PeerLost(self.identity.clone()));
        }
    }

    fn invite(&self, peer: &PeerIdentity, context: Vec<u8>, timeout: Duration) -> TransportResult<()> {
        let mut state = self.network.state.lock();

        if !state.nodes.contains_key(&peer.id()) {
            // Nobody to answer; the invitation simply lapses
            tracing::debug!("MemoryNetwork: {} is not around, invite lapses", peer);
            return Ok(());
        }

        let network: Weak<MemoryNetwork> = Arc::downgrade(&self.network);
        let inviter = self.identity.id();
        let invitee = peer.id();
        let deadline = Instant::now() + timeout;

        let responder = InvitationResponder::new(move |accept| {
            if let Some(network) = network.upgrade() {
                network.answer_invitation(inviter, invitee, accept, deadline);
            }
        });

        state.push(
            &invitee,
            TransportEvent::InvitationReceived {
                from: self.identity.clone(),
                context,
                responder,
            },
        );
        Ok(())
    }

    async fn send(
        &self,
        peer: &PeerIdentity,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> TransportResult<()> {
        if self.deliver_now(peer, payload, reliability)? {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.network.state.lock();
        let me = self.identity.id();

        let linked: Vec<PeerId> = match state.nodes.get(&me) {
            Some(node) => node.links.keys().copied().collect(),
            None => return,
        };
        for peer in linked {
            state.set_link(me, peer, PeerState::NotConnected);
        }
    }

    fn poll_events(&self) -> Vec<TransportEvent> {
        match self.network.state.lock().nodes.get_mut(&self.identity.id()) {
            Some(node) => node.inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(events: &[TransportEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::PeerFound(p) => Some(p.display_name().to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_discovery_respects_service_type() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();
        let carol = network.join("Carol").unwrap();

        bob.start_advertising("chat").unwrap();
        carol.start_advertising("games").unwrap();
        alice.start_browsing("chat").unwrap();

        assert_eq!(found(&alice.poll_events()), vec!["Bob"]);
        assert!(alice.poll_events().is_empty());
    }

    #[test]
    fn test_invalid_service_type_refused() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();

        assert!(matches!(
            alice.start_advertising("No Spaces"),
            Err(TransportError::Unavailable(_))
        ));
        assert!(alice.start_browsing("").is_err());
        assert!(!network.is_advertising(&alice.local_identity().id()));
        assert!(!network.is_browsing(&alice.local_identity().id()));
    }

    #[test]
    fn test_advertiser_announces_to_running_browsers() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();

        alice.start_browsing("chat").unwrap();
        bob.start_advertising("chat").unwrap();
        assert_eq!(found(&alice.poll_events()), vec!["Bob"]);

        bob.stop_advertising();
        let events = alice.poll_events();
        assert!(matches!(&events[..], [TransportEvent::PeerLost(p)] if p.display_name() == "Bob"));
    }

    #[test]
    fn test_accepted_invitation_connects_both_sides() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();

        bob.invite(alice.local_identity(), b"hi".to_vec(), Duration::from_secs(30))
            .unwrap();

        let mut events = alice.poll_events();
        let Some(TransportEvent::InvitationReceived { from, context, responder }) = events.pop()
        else {
            panic!("expected an invitation");
        };
        assert_eq!(&from, bob.local_identity());
        assert_eq!(context, b"hi");

        responder.respond(true);

        let states: Vec<PeerState> = bob
            .poll_events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::StateChanged { new, .. } => Some(new),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PeerState::Connecting, PeerState::Connected]);
        assert_eq!(
            network.link_state(&alice.local_identity().id(), &bob.local_identity().id()),
            PeerState::Connected
        );
    }

    #[test]
    fn test_declined_or_lapsed_invitation_does_nothing() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();

        bob.invite(alice.local_identity(), Vec::new(), Duration::from_secs(30))
            .unwrap();
        bob.invite(alice.local_identity(), Vec::new(), Duration::ZERO)
            .unwrap();

        let mut responders = alice.poll_events().into_iter().filter_map(|e| match e {
            TransportEvent::InvitationReceived { responder, .. } => Some(responder),
            _ => None,
        });
        let declined = responders.next().unwrap();
        let lapsed = responders.next().unwrap();

        declined.respond(false);
        std::thread::sleep(Duration::from_millis(2));
        lapsed.respond(true);

        assert!(bob.poll_events().is_empty());
        assert!(alice.poll_events().is_empty());
    }

    #[test]
    fn test_manual_handshake() {
        let network = MemoryNetwork::with_handshake(HandshakeMode::Manual);
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();
        let (a, b) = (alice.local_identity().id(), bob.local_identity().id());

        bob.invite(alice.local_identity(), Vec::new(), Duration::from_secs(30))
            .unwrap();
        for event in alice.poll_events() {
            if let TransportEvent::InvitationReceived { responder, .. } = event {
                responder.respond(true);
            }
        }

        assert_eq!(network.link_state(&a, &b), PeerState::Connecting);
        assert!(network.fail_handshake(&a, &b));
        assert_eq!(network.link_state(&b, &a), PeerState::NotConnected);
        assert!(!network.complete_handshake(&a, &b));
    }

    #[tokio::test]
    async fn test_send_requires_link() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();

        let err = alice
            .send(bob.local_identity(), b"x".to_vec(), Reliability::Reliable)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Unreachable(bob.local_identity().id()));

        network.link(&alice.local_identity().id(), &bob.local_identity().id());
        bob.poll_events();

        for payload in [b"1", b"2", b"3"] {
            alice
                .send(bob.local_identity(), payload.to_vec(), Reliability::Reliable)
                .await
                .unwrap();
        }

        let received: Vec<Vec<u8>> = bob
            .poll_events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::DataReceived { payload, .. } => Some(payload),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn test_leave_drops_links_and_visibility() {
        let network = MemoryNetwork::new();
        let alice = network.join("Alice").unwrap();
        let bob = network.join("Bob").unwrap();
        let bob_id = bob.local_identity().id();

        alice.start_browsing("chat").unwrap();
        bob.start_advertising("chat").unwrap();
        network.link(&alice.local_identity().id(), &bob_id);
        alice.poll_events();

        network.leave(&bob_id);

        let events = alice.poll_events();
        assert!(events.iter().any(|e| matches!(
            e,
            TransportEvent::StateChanged { new: PeerState::NotConnected, .. }
        )));
        assert!(events.iter().any(|e| matches!(e, TransportEvent::PeerLost(_))));
        assert_eq!(network.peers().len(), 1);
    }
}
