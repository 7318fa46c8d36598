mod config;
mod controller;
mod controller_builder;
mod discovery;
mod events;
mod invitation;
mod observer;
mod runtime;
mod session;

pub use config::{
    validate_service_type, SessionConfig, DEFAULT_SERVICE_TYPE, MAX_SERVICE_TYPE_LEN,
};
pub use controller::SessionController;
pub use controller_builder::SessionControllerBuilder;
pub use discovery::{DiscoveryChannel, DiscoveryKind};
pub use events::TransportEvent;
pub use invitation::{
    should_invite, AutoAccept, AutoReject, DeferToOwner, Invitation, InvitationDecision,
    InvitationId, InvitationPolicy, InvitationResponder,
};
pub use observer::{ChannelObserver, ObserverEvent, SessionObserver};
pub use runtime::SessionRuntime;
pub use session::{BroadcastSummary, Session, SessionHandle};
