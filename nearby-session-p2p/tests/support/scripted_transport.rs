use async_trait::async_trait;
use nearby_session_p2p::infrastructure::TransportResult;
use nearby_session_p2p::{
    InvitationResponder, PeerId, PeerIdentity, PeerState, Reliability, Transport, TransportError,
    TransportEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Transport call recorded by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartBrowsing,
    StopBrowsing,
    StartAdvertising,
    StopAdvertising,
    Invite(PeerId),
    Disconnect,
}

struct Inner {
    identity: PeerIdentity,
    events: Mutex<VecDeque<TransportEvent>>,
    calls: Mutex<Vec<Call>>,
    sent: Mutex<Vec<(PeerId, Vec<u8>, Reliability)>>,
    unreachable: Mutex<Vec<PeerId>>,
    start_failure: Mutex<Option<TransportError>>,
    stalled: AtomicBool,
}

/// Transport whose events are pushed by the test, one step at a time
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new(display_name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity: PeerIdentity::new(display_name).unwrap(),
                events: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                unreachable: Mutex::new(Vec::new()),
                start_failure: Mutex::new(None),
                stalled: AtomicBool::new(false),
            }),
        }
    }

    pub fn push(&self, event: TransportEvent) {
        self.inner.events.lock().unwrap().push_back(event);
    }

    pub fn found(&self, peer: &PeerIdentity) {
        self.push(TransportEvent::PeerFound(peer.clone()));
    }

    pub fn lost(&self, peer: &PeerIdentity) {
        self.push(TransportEvent::PeerLost(peer.clone()));
    }

    pub fn state(&self, peer: &PeerIdentity, old: PeerState, new: PeerState) {
        self.push(TransportEvent::StateChanged {
            peer: peer.clone(),
            old,
            new,
        });
    }

    /// Walk `peer` through NotConnected -> Connecting -> Connected
    pub fn connect(&self, peer: &PeerIdentity) {
        self.state(peer, PeerState::NotConnected, PeerState::Connecting);
        self.state(peer, PeerState::Connecting, PeerState::Connected);
    }

    pub fn data(&self, from: &PeerIdentity, payload: &[u8]) {
        self.push(TransportEvent::DataReceived {
            from: from.clone(),
            payload: payload.to_vec(),
            reliability: Reliability::Reliable,
        });
    }

    /// Queue an invitation; the receiver yields the decision
    pub fn invitation(&self, from: &PeerIdentity, context: &[u8]) -> mpsc::Receiver<bool> {
        let (tx, rx) = mpsc::channel();
        self.push(TransportEvent::InvitationReceived {
            from: from.clone(),
            context: context.to_vec(),
            responder: InvitationResponder::new(move |accept| {
                let _ = tx.send(accept);
            }),
        });
        rx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn sent(&self) -> Vec<(PeerId, Vec<u8>, Reliability)> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.inner.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Sends to `peer` fail as if its channel just closed
    pub fn make_unreachable(&self, peer: &PeerIdentity) {
        self.inner.unreachable.lock().unwrap().push(peer.id());
    }

    /// The next discovery start fails with `error`
    pub fn fail_next_start(&self, error: TransportError) {
        *self.inner.start_failure.lock().unwrap() = Some(error);
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }

    fn take_start_failure(&self) -> TransportResult<()> {
        match self.inner.start_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn local_identity(&self) -> &PeerIdentity {
        &self.inner.identity
    }

    fn start_browsing(&self, _service_type: &str) -> TransportResult<()> {
        self.take_start_failure()?;
        self.record(Call::StartBrowsing);
        Ok(())
    }

    fn stop_browsing(&self) {
        self.record(Call::StopBrowsing);
    }

    fn start_advertising(&self, _service_type: &str) -> TransportResult<()> {
        self.take_start_failure()?;
        self.record(Call::StartAdvertising);
        Ok(())
    }

    fn stop_advertising(&self) {
        self.record(Call::StopAdvertising);
    }

    fn invite(&self, peer: &PeerIdentity, _context: Vec<u8>, _timeout: Duration) -> TransportResult<()> {
        self.record(Call::Invite(peer.id()));
        Ok(())
    }

    async fn send(
        &self,
        peer: &PeerIdentity,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> TransportResult<()> {
        if self.inner.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        if self.inner.unreachable.lock().unwrap().contains(&peer.id()) {
            return Err(TransportError::Unreachable(peer.id()));
        }

        self.inner
            .sent
            .lock()
            .unwrap()
            .push((peer.id(), payload, reliability));
        Ok(())
    }

    fn disconnect(&self) {
        self.record(Call::Disconnect);
    }

    fn poll_events(&self) -> Vec<TransportEvent> {
        self.inner.events.lock().unwrap().drain(..).collect()
    }
}
