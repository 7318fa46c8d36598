// Application layer (discovery, session, controller)
pub mod application;

// Infrastructure layer (transport boundary + in-memory adapter)
pub mod infrastructure;

mod error;

// Re-exports for convenience
pub use application::{
    BroadcastSummary, ChannelObserver, DiscoveryChannel, DiscoveryKind, Invitation,
    InvitationDecision, InvitationId, InvitationPolicy, InvitationResponder, ObserverEvent,
    SessionConfig, SessionController, SessionControllerBuilder, SessionHandle, SessionObserver,
    SessionRuntime, TransportEvent,
};
pub use error::{Result, SessionError};
pub use infrastructure::{
    HandshakeMode, MemoryNetwork, MemoryTransport, Reliability, Transport, TransportError,
};
pub use nearby_session_core::{IdentityError, PeerId, PeerIdentity, PeerState, RosterSnapshot};
