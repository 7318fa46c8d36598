pub mod peer;
pub mod peer_state;
pub mod roster;

pub use peer::{IdentityError, PeerId, PeerIdentity};
pub use peer_state::PeerState;
pub use roster::{Roster, RosterSnapshot, RosterUpdate};
