use crate::error::{Result, SessionError};
use instant::Instant;
use nearby_session_core::PeerIdentity;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of one received invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(Uuid);

impl InvitationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvitationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot decision callback handed over by the transport
pub struct InvitationResponder(Box<dyn FnOnce(bool) + Send>);

impl InvitationResponder {
    pub fn new(respond: impl FnOnce(bool) + Send + 'static) -> Self {
        Self(Box::new(respond))
    }

    /// Tell the transport whether to join the inviter's session
    pub fn respond(self, accept: bool) {
        (self.0)(accept)
    }
}

impl fmt::Debug for InvitationResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvitationResponder")
    }
}

struct InvitationInner {
    id: InvitationId,
    from: PeerIdentity,
    context: Vec<u8>,
    received_at: Instant,
    deadline: Instant,
    responder: Mutex<Option<InvitationResponder>>,
}

/// A pending request from a nearby peer to join its session.
///
/// Cheap to clone; every clone refers to the same one-shot decision, so the
/// invitation resolves exactly once no matter who holds it.
#[derive(Clone)]
pub struct Invitation {
    inner: Arc<InvitationInner>,
}

impl Invitation {
    pub(crate) fn new(
        from: PeerIdentity,
        context: Vec<u8>,
        responder: InvitationResponder,
        timeout: Duration,
    ) -> Self {
        let received_at = Instant::now();

        Self {
            inner: Arc::new(InvitationInner {
                id: InvitationId::new(),
                from,
                context,
                received_at,
                deadline: received_at + timeout,
                responder: Mutex::new(Some(responder)),
            }),
        }
    }

    pub fn id(&self) -> InvitationId {
        self.inner.id
    }

    /// The inviting peer
    pub fn from(&self) -> &PeerIdentity {
        &self.inner.from
    }

    /// Opaque bytes the inviter attached
    pub fn context(&self) -> &[u8] {
        &self.inner.context
    }

    pub fn received_at(&self) -> Instant {
        self.inner.received_at
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.responder.lock().is_none()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.inner.deadline
    }

    /// Answer the invitation. Fails if it was already answered or its
    /// deadline has passed (in which case it is declined on the spot).
    pub fn resolve(&self, accept: bool) -> Result<()> {
        let responder = self
            .inner
            .responder
            .lock()
            .take()
            .ok_or(SessionError::InvitationAlreadyResolved(self.inner.id))?;

        if self.is_expired(Instant::now()) {
            tracing::warn!(
                "⏰ Invitation {} from {} expired before it was answered",
                self.inner.id,
                self.inner.from
            );
            responder.respond(false);
            return Err(SessionError::InvitationAlreadyResolved(self.inner.id));
        }

        tracing::debug!(
            "✉️  Invitation {} from {} {}",
            self.inner.id,
            self.inner.from,
            if accept { "accepted" } else { "declined" }
        );
        responder.respond(accept);
        Ok(())
    }

    /// Decline if still pending and past the deadline. Returns whether it
    /// was declined by this call.
    pub(crate) fn expire(&self, now: Instant) -> bool {
        if !self.is_expired(now) {
            return false;
        }

        match self.inner.responder.lock().take() {
            Some(responder) => {
                responder.respond(false);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Invitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invitation")
            .field("id", &self.inner.id)
            .field("from", &self.inner.from)
            .field("context_len", &self.inner.context.len())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// What to do with an incoming invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationDecision {
    Accept,
    Reject,
    /// Hand it to the owner, who must decide before the deadline
    Defer,
}

/// Pluggable decision rule for incoming invitations
pub trait InvitationPolicy: Send + Sync {
    fn decide(&self, invitation: &Invitation) -> InvitationDecision;
}

/// Accept everything (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

impl InvitationPolicy for AutoAccept {
    fn decide(&self, _invitation: &Invitation) -> InvitationDecision {
        InvitationDecision::Accept
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoReject;

impl InvitationPolicy for AutoReject {
    fn decide(&self, _invitation: &Invitation) -> InvitationDecision {
        InvitationDecision::Reject
    }
}

/// Let the owner answer every invitation
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferToOwner;

impl InvitationPolicy for DeferToOwner {
    fn decide(&self, _invitation: &Invitation) -> InvitationDecision {
        InvitationDecision::Defer
    }
}

impl<F> InvitationPolicy for F
where
    F: Fn(&Invitation) -> InvitationDecision + Send + Sync,
{
    fn decide(&self, invitation: &Invitation) -> InvitationDecision {
        self(invitation)
    }
}

/// Exactly one side of a pair sends the invitation: the one whose display
/// name sorts greater, with the peer id breaking ties between equal names.
pub fn should_invite(local: &PeerIdentity, remote: &PeerIdentity) -> bool {
    match local.display_name().cmp(remote.display_name()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => local.id() > remote.id(),
    }
}
