use crate::application::session::Session;
use crate::application::{
    should_invite, BroadcastSummary, DiscoveryChannel, DiscoveryKind, Invitation,
    InvitationDecision, InvitationPolicy, SessionConfig, SessionControllerBuilder, SessionHandle,
    SessionObserver, TransportEvent,
};
use crate::error::{Result, SessionError};
use crate::infrastructure::{Reliability, Transport};
use instant::Instant;
use nearby_session_core::{PeerId, PeerIdentity, PeerState, Roster, RosterSnapshot, RosterUpdate};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Everything guarded by the controller's state lock
pub(crate) struct ControllerState<T: Transport> {
    pub(crate) roster: Roster,
    pub(crate) session: Session<T>,
    browser: DiscoveryChannel,
    advertiser: DiscoveryChannel,
    pending: Vec<Invitation>,
    observer: Option<Weak<dyn SessionObserver>>,
    policy: Arc<dyn InvitationPolicy>,
}

impl<T: Transport> ControllerState<T> {
    fn channel(&self, kind: DiscoveryKind) -> &DiscoveryChannel {
        match kind {
            DiscoveryKind::Browser => &self.browser,
            DiscoveryKind::Advertiser => &self.advertiser,
        }
    }

    fn channel_mut(&mut self, kind: DiscoveryKind) -> &mut DiscoveryChannel {
        match kind {
            DiscoveryKind::Browser => &mut self.browser,
            DiscoveryKind::Advertiser => &mut self.advertiser,
        }
    }
}

/// Notifications collected during a turn, delivered once the state lock
/// is released
#[derive(Default)]
struct Outbox {
    data: Vec<(PeerIdentity, Vec<u8>)>,
    failures: Vec<(DiscoveryKind, String)>,
    invitations: Vec<Invitation>,
    roster_changed: bool,
}

impl Outbox {
    fn roster_changed() -> Self {
        Self {
            roster_changed: true,
            ..Default::default()
        }
    }
}

pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) config: SessionConfig,
    /// Serializes turns and owner notifications; reentrant so observers can
    /// call back into the controller
    turn: ReentrantMutex<()>,
    closed: AtomicBool,
    pub(crate) state: Mutex<ControllerState<T>>,
}

impl<T: Transport> Shared<T> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::ShutDown);
        }
        Ok(())
    }

    fn local_id(&self) -> PeerId {
        self.transport.local_identity().id()
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.state.lock().observer.as_ref().and_then(Weak::upgrade)
    }

    /// One processing turn: drain the transport, apply every event, expire
    /// stale invitations, then notify the owner.
    fn poll(&self) -> usize {
        let _turn = self.turn.lock();
        if self.is_closed() {
            return 0;
        }

        let events = self.transport.poll_events();
        let count = events.len();
        let mut outbox = Outbox::default();

        for event in events {
            if self.is_closed() {
                break;
            }
            self.handle_event(event, &mut outbox);
        }

        self.expire_invitations(Instant::now());

        if count > 0 {
            tracing::debug!(
                "🔄 Processed {} transport events (roster changed: {})",
                count,
                outbox.roster_changed
            );
        }

        self.flush(outbox);
        count
    }

    fn handle_event(&self, event: TransportEvent, outbox: &mut Outbox) {
        let mut state = self.state.lock();

        if let Some(kind) = event.discovery_kind() {
            if !state.channel(kind).is_active() {
                drop(state);
                tracing::trace!("Dropping event from stopped {}", kind);
                if let TransportEvent::InvitationReceived { from, responder, .. } = event {
                    tracing::debug!("🚫 Declining invitation from {} (not advertising)", from);
                    responder.respond(false);
                }
                return;
            }
        }

        match event {
            TransportEvent::PeerFound(peer) => {
                if peer.id() == self.local_id() {
                    return;
                }

                tracing::debug!("🔍 Found {}", peer);
                outbox.roster_changed |= state.roster.observe(&peer).is_change();

                let idle = state.roster.state_of(&peer.id()) == Some(PeerState::NotConnected);
                if self.config.auto_invite
                    && idle
                    && should_invite(self.transport.local_identity(), &peer)
                {
                    if let Err(e) =
                        state
                            .session
                            .invite(&peer, Vec::new(), self.config.invite_timeout)
                    {
                        tracing::warn!("❌ Failed to invite {}: {}", peer, e);
                    }
                }
            }

            TransportEvent::PeerLost(peer) => match state.roster.lose(&peer.id()) {
                RosterUpdate::Removed => {
                    tracing::debug!("👋 Lost {}", peer);
                    outbox.roster_changed = true;
                }
                _ => {
                    if let Some(current) = state.roster.state_of(&peer.id()) {
                        tracing::debug!(
                            "Keeping {} ({}): connection outranks discovery loss",
                            peer,
                            current
                        );
                    }
                }
            },

            TransportEvent::InvitationReceived {
                from,
                context,
                responder,
            } => {
                if from.id() == self.local_id() {
                    drop(state);
                    responder.respond(false);
                    return;
                }

                outbox.roster_changed |= state.roster.observe(&from).is_change();
                let policy = state.policy.clone();
                drop(state);

                let invitation =
                    Invitation::new(from, context, responder, self.config.invitation_timeout);
                let decision = policy.decide(&invitation);
                tracing::debug!("✉️  Invitation from {}: {:?}", invitation.from(), decision);

                match decision {
                    InvitationDecision::Accept | InvitationDecision::Reject => {
                        let accept = decision == InvitationDecision::Accept;
                        if let Err(e) = invitation.resolve(accept) {
                            tracing::warn!("❌ Could not answer {:?}: {}", invitation, e);
                        }
                    }
                    InvitationDecision::Defer => {
                        self.state.lock().pending.push(invitation.clone());
                        outbox.invitations.push(invitation);
                    }
                }
            }

            TransportEvent::DiscoveryFailed { channel, reason } => {
                state.channel_mut(channel).fail(&reason);
                outbox.failures.push((channel, reason));
            }

            TransportEvent::StateChanged { peer, old, new } => {
                if peer.id() == self.local_id() {
                    return;
                }

                state.session.on_state_changed(&peer, old, new);

                // A forgotten peer is not brought back by its own teardown
                if new == PeerState::NotConnected && !state.roster.contains(&peer.id()) {
                    tracing::trace!("Ignoring disconnect of untracked {}", peer);
                    return;
                }

                outbox.roster_changed |= state.roster.apply_state(&peer, new).is_change();
            }

            TransportEvent::DataReceived {
                from,
                payload,
                reliability,
            } => {
                tracing::trace!(
                    "📥 {} bytes from {} ({})",
                    payload.len(),
                    from,
                    reliability
                );
                outbox.data.push((from, payload));
            }
        }
    }

    /// Decline deferred invitations the owner did not answer in time
    fn expire_invitations(&self, now: Instant) {
        let expired: Vec<Invitation> = {
            let mut state = self.state.lock();
            let (expired, keep): (Vec<Invitation>, Vec<Invitation>) =
                std::mem::take(&mut state.pending)
                    .into_iter()
                    .filter(|invitation| !invitation.is_resolved())
                    .partition(|invitation| invitation.is_expired(now));
            state.pending = keep;
            expired
        };

        for invitation in expired {
            if invitation.expire(now) {
                tracing::warn!(
                    "⏰ Invitation from {} was not answered in time, declining",
                    invitation.from()
                );
            }
        }
    }

    /// Deliver collected notifications. Runs under the turn lock only.
    fn flush(&self, outbox: Outbox) {
        let Some(observer) = self.observer() else {
            return;
        };

        for (from, payload) in outbox.data {
            if self.is_closed() {
                return;
            }
            observer.data_received(&from, &payload);
        }

        for (channel, reason) in outbox.failures {
            if self.is_closed() {
                return;
            }
            observer.discovery_failed(channel, &reason);
        }

        for invitation in outbox.invitations {
            if self.is_closed() {
                return;
            }
            observer.invitation_received(invitation);
        }

        if outbox.roster_changed && !self.is_closed() {
            observer.roster_changed();
        }
    }

    pub(crate) fn invite(&self, peer: &PeerIdentity, context: Vec<u8>) -> Result<()> {
        let _turn = self.turn.lock();
        self.ensure_open()?;

        if peer.id() == self.local_id() {
            return Err(SessionError::SelfInvitation);
        }

        let (update, result) = {
            let mut state = self.state.lock();
            let update = state.roster.observe(peer);
            let result = state
                .session
                .invite(peer, context, self.config.invite_timeout);
            (update, result)
        };

        if update.is_change() {
            self.flush(Outbox::roster_changed());
        }
        result
    }

    pub(crate) fn resolve_invitation(&self, invitation: &Invitation, accept: bool) -> Result<()> {
        self.ensure_open()?;
        self.state
            .lock()
            .pending
            .retain(|pending| pending.id() != invitation.id());
        invitation.resolve(accept)
    }

    fn start_channel(&self, kind: DiscoveryKind) -> Result<bool> {
        let _turn = self.turn.lock();
        self.ensure_open()?;
        self.state
            .lock()
            .channel_mut(kind)
            .start(self.transport.as_ref(), &self.config.service_type)
    }

    /// Once this returns no further events of the channel reach the owner
    fn stop_channel(&self, kind: DiscoveryKind) -> bool {
        let _turn = self.turn.lock();
        if self.is_closed() {
            return false;
        }
        self.state
            .lock()
            .channel_mut(kind)
            .stop(self.transport.as_ref())
    }

    fn forget_peer(&self, peer_id: &PeerId) -> Result<bool> {
        let _turn = self.turn.lock();
        self.ensure_open()?;

        let update = self.state.lock().roster.forget(peer_id);
        if !update.is_change() {
            return Ok(false);
        }

        tracing::debug!("🗑️  Forgot peer {}", peer_id.short());
        self.flush(Outbox::roster_changed());
        Ok(true)
    }

    /// Stop discovery, close every channel and empty the roster
    fn teardown(&self) -> (RosterUpdate, Vec<Invitation>) {
        let mut state = self.state.lock();
        let transport = self.transport.as_ref();

        state.browser.stop(transport);
        state.advertiser.stop(transport);
        state.session.disconnect();

        let update = state.roster.clear();
        let pending = std::mem::take(&mut state.pending);
        (update, pending)
    }

    /// Throw away whatever the transport buffered, declining invitations
    fn discard_queued_events(&self) {
        for event in self.transport.poll_events() {
            if let TransportEvent::InvitationReceived { responder, .. } = event {
                responder.respond(false);
            }
        }
    }

    fn decline_all(pending: Vec<Invitation>) {
        for invitation in pending {
            // Errors only mean it was already answered
            let _ = invitation.resolve(false);
        }
    }

    fn stop_services(&self) -> Result<()> {
        let _turn = self.turn.lock();
        self.ensure_open()?;

        let (update, pending) = self.teardown();
        Self::decline_all(pending);
        self.discard_queued_events();

        tracing::info!("⏸️  Services stopped");
        if update.is_change() {
            self.flush(Outbox::roster_changed());
        }
        Ok(())
    }

    fn shutdown(&self) {
        let _turn = self.turn.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let (_, pending) = self.teardown();
        self.state.lock().observer = None;
        Self::decline_all(pending);
        self.discard_queued_events();

        tracing::info!(
            "🛑 Session controller for {} shut down",
            self.transport.local_identity()
        );
    }
}

/// Single source of truth for the peer roster.
///
/// Composes the two discovery channels and the session, reconciles every
/// transport event into the connecting / connected / disconnected buckets,
/// applies the invitation policy and tells the owner about roster changes
/// once per turn.
pub struct SessionController<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> SessionController<T> {
    /// Create a controller with the default invitation policy and no observer
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        SessionControllerBuilder::new().config(config).build(transport)
    }

    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: T,
        config: SessionConfig,
        policy: Arc<dyn InvitationPolicy>,
        observer: Option<Weak<dyn SessionObserver>>,
    ) -> Self {
        let transport = Arc::new(transport);

        let state = ControllerState {
            roster: Roster::new(),
            session: Session::new(transport.clone()),
            browser: DiscoveryChannel::browser(),
            advertiser: DiscoveryChannel::advertiser(),
            pending: Vec::new(),
            observer,
            policy,
        };

        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                turn: ReentrantMutex::new(()),
                closed: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
        }
    }

    /// Name we advertise; fixed for the lifetime of the process
    pub fn display_name(&self) -> &str {
        self.shared.transport.local_identity().display_name()
    }

    pub fn local_identity(&self) -> &PeerIdentity {
        self.shared.transport.local_identity()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Register the owner. Only a weak reference is kept.
    pub fn set_observer<O: SessionObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(observer) as Weak<dyn SessionObserver>;
        self.shared.state.lock().observer = Some(weak);
    }

    pub fn clear_observer(&self) {
        self.shared.state.lock().observer = None;
    }

    pub fn set_invitation_policy(&self, policy: impl InvitationPolicy + 'static) {
        self.shared.state.lock().policy = Arc::new(policy);
    }

    pub fn start_browsing(&self) -> Result<bool> {
        self.shared.start_channel(DiscoveryKind::Browser)
    }

    pub fn stop_browsing(&self) -> bool {
        self.shared.stop_channel(DiscoveryKind::Browser)
    }

    pub fn start_advertising(&self) -> Result<bool> {
        self.shared.start_channel(DiscoveryKind::Advertiser)
    }

    pub fn stop_advertising(&self) -> bool {
        self.shared.stop_channel(DiscoveryKind::Advertiser)
    }

    pub fn is_browsing(&self) -> bool {
        self.shared.state.lock().browser.is_active()
    }

    pub fn is_advertising(&self) -> bool {
        self.shared.state.lock().advertiser.is_active()
    }

    /// Advertise and browse. Both channels are attempted; the first failure
    /// is returned.
    pub fn start_services(&self) -> Result<()> {
        let advertising = self.start_advertising();
        let browsing = self.start_browsing();
        advertising?;
        browsing?;

        tracing::info!("▶️  Services started for {}", self.local_identity());
        Ok(())
    }

    /// Stop discovery, disconnect every peer and clear the roster.
    /// Services can be started again afterwards.
    pub fn stop_services(&self) -> Result<()> {
        self.shared.stop_services()
    }

    /// Run one processing turn. Returns the number of transport events
    /// handled.
    pub fn poll(&self) -> usize {
        self.shared.poll()
    }

    pub fn connecting_peers(&self) -> Vec<PeerIdentity> {
        self.peers_in(PeerState::Connecting)
    }

    pub fn connected_peers(&self) -> Vec<PeerIdentity> {
        self.peers_in(PeerState::Connected)
    }

    pub fn disconnected_peers(&self) -> Vec<PeerIdentity> {
        self.peers_in(PeerState::NotConnected)
    }

    fn peers_in(&self, state: PeerState) -> Vec<PeerIdentity> {
        self.shared.state.lock().roster.peers_in(state)
    }

    /// All three buckets, taken atomically
    pub fn roster(&self) -> RosterSnapshot {
        self.shared.state.lock().roster.snapshot()
    }

    pub fn state_of(&self, peer_id: &PeerId) -> Option<PeerState> {
        self.shared.state.lock().roster.state_of(peer_id)
    }

    /// Drop an idle peer from the roster. Returns `Ok(false)` for unknown
    /// peers and for peers with a live or pending connection.
    pub fn forget_peer(&self, peer_id: &PeerId) -> Result<bool> {
        self.shared.forget_peer(peer_id)
    }

    /// Deferred invitations still waiting for an answer
    pub fn pending_invitations(&self) -> Vec<Invitation> {
        self.shared
            .state
            .lock()
            .pending
            .iter()
            .filter(|invitation| !invitation.is_resolved())
            .cloned()
            .collect()
    }

    pub fn session(&self) -> SessionHandle<T> {
        SessionHandle::new(self.shared.clone())
    }

    pub fn invite(&self, peer: &PeerIdentity, context: Vec<u8>) -> Result<()> {
        self.shared.invite(peer, context)
    }

    pub fn accept(&self, invitation: &Invitation) -> Result<()> {
        self.shared.resolve_invitation(invitation, true)
    }

    pub fn reject(&self, invitation: &Invitation) -> Result<()> {
        self.shared.resolve_invitation(invitation, false)
    }

    pub async fn send(
        &self,
        peer_id: &PeerId,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> Result<()> {
        self.session().send(peer_id, payload, reliability).await
    }

    pub async fn broadcast<F>(
        &self,
        payload: Vec<u8>,
        reliability: Reliability,
        on_complete: F,
    ) -> Result<BroadcastSummary>
    where
        F: FnMut(&PeerIdentity, Result<()>),
    {
        self.session()
            .broadcast(payload, reliability, on_complete)
            .await
    }

    /// Stop discovery, disconnect everyone and drop the observer. Waits for
    /// a turn running on another thread; no callback fires after this
    /// returns.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_closed()
    }
}

impl<T: Transport> Drop for SessionController<T> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
