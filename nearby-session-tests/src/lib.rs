use cucumber::World;
use nearby_session_p2p::application::DeferToOwner;
use nearby_session_p2p::{
    DiscoveryKind, HandshakeMode, Invitation, MemoryNetwork, MemoryTransport, PeerIdentity,
    PeerState, SessionConfig, SessionController, SessionError, SessionObserver, Transport,
    TransportEvent,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVICE_TYPE: &str = "bdd-svc";

/// Counts roster notifications and keeps every invitation surfaced to the
/// owner
#[derive(Default)]
pub struct RosterObserver {
    roster_changes: Mutex<usize>,
    invitations: Mutex<Vec<Invitation>>,
    failures: Mutex<Vec<DiscoveryKind>>,
}

impl RosterObserver {
    pub fn roster_changes(&self) -> usize {
        *self.roster_changes.lock().unwrap()
    }

    pub fn reset(&self) {
        *self.roster_changes.lock().unwrap() = 0;
    }

    pub fn invitation_from(&self, name: &str) -> Option<Invitation> {
        self.invitations
            .lock()
            .unwrap()
            .iter()
            .find(|inv| inv.from().display_name() == name)
            .cloned()
    }

    pub fn failures(&self) -> Vec<DiscoveryKind> {
        self.failures.lock().unwrap().clone()
    }
}

impl SessionObserver for RosterObserver {
    fn roster_changed(&self) {
        *self.roster_changes.lock().unwrap() += 1;
    }

    fn invitation_received(&self, invitation: Invitation) {
        self.invitations.lock().unwrap().push(invitation);
    }

    fn discovery_failed(&self, channel: DiscoveryKind, _reason: &str) {
        self.failures.lock().unwrap().push(channel);
    }
}

/// A local controller on a memory network, surrounded by named remote
/// nodes the scenario drives by hand
#[derive(World)]
#[world(init = Self::new)]
pub struct RosterWorld {
    pub network: Arc<MemoryNetwork>,
    pub local: SessionController<MemoryTransport>,
    pub observer: Arc<RosterObserver>,
    pub remotes: HashMap<String, MemoryTransport>,
    pub last_error: Option<SessionError>,
}

impl fmt::Debug for RosterWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterWorld")
            .field("local", &self.local.display_name())
            .field("roster", &self.local.roster())
            .field("remotes", &self.remotes.keys().collect::<Vec<_>>())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl RosterWorld {
    pub fn new() -> Self {
        let network = MemoryNetwork::with_handshake(HandshakeMode::Manual);
        let observer = Arc::new(RosterObserver::default());

        let transport = network
            .join("Local")
            .expect("local peer joins the network");
        let local = SessionController::<MemoryTransport>::builder()
            .config(SessionConfig::new(SERVICE_TYPE).with_auto_invite(false))
            .policy(DeferToOwner)
            .observer(&observer)
            .build(transport)
            .expect("local controller builds");

        Self {
            network,
            local,
            observer,
            remotes: HashMap::new(),
            last_error: None,
        }
    }

    /// Process everything queued for the local controller
    pub fn turn(&self) -> usize {
        self.local.poll()
    }

    /// Add an advertising node called `name`
    pub fn add_remote(&mut self, name: &str) {
        let transport = self
            .network
            .join(name)
            .expect("remote peer joins the network");
        transport
            .start_advertising(SERVICE_TYPE)
            .expect("remote advertises");
        self.remotes.insert(name.to_string(), transport);
    }

    pub fn remote(&self, name: &str) -> &MemoryTransport {
        self.remotes
            .get(name)
            .unwrap_or_else(|| panic!("Peer '{}' not found", name))
    }

    pub fn identity(&self, name: &str) -> PeerIdentity {
        self.remote(name).local_identity().clone()
    }

    /// Let `name` answer every invitation waiting in its inbox
    pub fn remote_answers(&self, name: &str, accept: bool) -> usize {
        let mut answered = 0;
        for event in self.remote(name).poll_events() {
            if let TransportEvent::InvitationReceived { responder, .. } = event {
                responder.respond(accept);
                answered += 1;
            }
        }
        answered
    }

    /// Discover `name`, invite it, let it accept and finish the handshake
    pub fn connect(&mut self, name: &str) {
        self.add_remote(name);
        self.turn();

        let peer = self.identity(name);
        self.local
            .invite(&peer, Vec::new())
            .expect("local invite goes out");
        self.remote_answers(name, true);
        self.complete_handshake(name);
    }

    pub fn complete_handshake(&self, name: &str) -> bool {
        let local = self.local.local_identity().id();
        let completed = self
            .network
            .complete_handshake(&local, &self.identity(name).id());
        self.turn();
        completed
    }

    /// `name` invites the local peer
    pub fn remote_invites(&self, name: &str) {
        self.remote(name)
            .invite(
                self.local.local_identity(),
                Vec::new(),
                Duration::from_secs(30),
            )
            .expect("invite reaches the network");
    }

    pub fn state_of(&self, name: &str) -> Option<PeerState> {
        self.local.state_of(&self.identity(name).id())
    }

    /// Number of roster sections naming `name`
    pub fn sections_containing(&self, name: &str) -> usize {
        let roster = self.local.roster();
        [&roster.connecting, &roster.connected, &roster.disconnected]
            .iter()
            .filter(|section| section.iter().any(|p| p.display_name() == name))
            .count()
    }
}
