use crate::application::{DiscoveryKind, InvitationId};
use crate::infrastructure::TransportError;
use nearby_session_core::{IdentityError, PeerId};
use std::time::Duration;

/// Session errors surfaced to the application
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Discovery failed on {channel}: {reason}")]
    DiscoveryFailed {
        channel: DiscoveryKind,
        reason: String,
    },

    #[error("Invitation {0} was already resolved")]
    InvitationAlreadyResolved(InvitationId),

    #[error("Peer not connected: {0}")]
    PeerNotConnected(PeerId),

    #[error("A peer cannot invite itself")]
    SelfInvitation,

    #[error("Send to {peer} timed out after {timeout:?}")]
    SendTimedOut { peer: PeerId, timeout: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session has been shut down")]
    ShutDown,
}

impl SessionError {
    /// Only resource exhaustion at the transport boundary is fatal;
    /// everything else is a per-call or per-peer failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(TransportError::ResourceExhausted(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
