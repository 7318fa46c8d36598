pub mod domain;

pub use domain::{
    IdentityError, PeerId, PeerIdentity, PeerState, Roster, RosterSnapshot, RosterUpdate,
};
