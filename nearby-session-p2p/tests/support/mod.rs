#![allow(dead_code)]

pub mod scripted_transport;

use nearby_session_p2p::{
    DiscoveryKind, Invitation, PeerIdentity, SessionConfig, SessionController, SessionObserver,
};
use scripted_transport::ScriptedTransport;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn peer(name: &str) -> PeerIdentity {
    PeerIdentity::new(name).unwrap()
}

/// Observer remembering every notification it received
#[derive(Default)]
pub struct RecordingObserver {
    pub roster_changes: Mutex<usize>,
    pub data: Mutex<Vec<(PeerIdentity, Vec<u8>)>>,
    pub invitations: Mutex<Vec<Invitation>>,
    pub failures: Mutex<Vec<(DiscoveryKind, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn roster_changes(&self) -> usize {
        *self.roster_changes.lock().unwrap()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.data
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn invitations(&self) -> Vec<Invitation> {
        self.invitations.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(DiscoveryKind, String)> {
        self.failures.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn roster_changed(&self) {
        *self.roster_changes.lock().unwrap() += 1;
    }

    fn data_received(&self, from: &PeerIdentity, payload: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .push((from.clone(), payload.to_vec()));
    }

    fn invitation_received(&self, invitation: Invitation) {
        self.invitations.lock().unwrap().push(invitation);
    }

    fn discovery_failed(&self, channel: DiscoveryKind, reason: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((channel, reason.to_string()));
    }
}

/// Controller over a scripted transport, browsing and advertising, with a
/// recording observer attached
pub struct Fixture {
    pub transport: ScriptedTransport,
    pub controller: SessionController<ScriptedTransport>,
    pub observer: Arc<RecordingObserver>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new("test-svc").with_auto_invite(false))
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_test_tracing();

        let transport = ScriptedTransport::new("Local");
        let observer = RecordingObserver::new();
        let controller = SessionController::<ScriptedTransport>::builder()
            .config(config)
            .observer(&observer)
            .build(transport.clone())
            .unwrap();

        controller.start_services().unwrap();

        Self {
            transport,
            controller,
            observer,
        }
    }

    pub fn names(peers: &[PeerIdentity]) -> Vec<&str> {
        peers.iter().map(|p| p.display_name()).collect()
    }
}
