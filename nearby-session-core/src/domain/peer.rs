use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Longest display name (in UTF-8 bytes) a peer may advertise
pub const MAX_DISPLAY_NAME_BYTES: usize = 63;

/// Unique identifier for a peer, valid for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Create a new random peer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, handy for log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PeerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Errors that can occur when creating a peer identity
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum IdentityError {
    #[error("Display name cannot be empty")]
    EmptyDisplayName,

    #[error("Display name is {len} bytes, at most {max} are allowed")]
    DisplayNameTooLong { len: usize, max: usize },
}

/// A remote (or local) participant: stable id plus human-readable name.
///
/// Two identities are equal when their ids are equal. Display names are
/// not guaranteed unique, so they take no part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IdentityRecord")]
pub struct PeerIdentity {
    id: PeerId,
    display_name: String,
}

/// Wire shape of a [`PeerIdentity`], checked before it becomes one
#[derive(Deserialize)]
struct IdentityRecord {
    id: PeerId,
    display_name: String,
}

impl TryFrom<IdentityRecord> for PeerIdentity {
    type Error = IdentityError;

    fn try_from(record: IdentityRecord) -> Result<Self, Self::Error> {
        Self::with_id(record.id, record.display_name)
    }
}

impl PeerIdentity {
    /// Create an identity with a fresh random id
    pub fn new(display_name: impl Into<String>) -> Result<Self, IdentityError> {
        Self::with_id(PeerId::new(), display_name)
    }

    /// Create an identity for a known id (e.g. reported by a transport)
    pub fn with_id(id: PeerId, display_name: impl Into<String>) -> Result<Self, IdentityError> {
        let display_name = display_name.into();
        Self::validate_display_name(&display_name)?;

        Ok(Self { id, display_name })
    }

    fn validate_display_name(name: &str) -> Result<(), IdentityError> {
        if name.is_empty() {
            return Err(IdentityError::EmptyDisplayName);
        }

        if name.len() > MAX_DISPLAY_NAME_BYTES {
            return Err(IdentityError::DisplayNameTooLong {
                len: name.len(),
                max: MAX_DISPLAY_NAME_BYTES,
            });
        }

        Ok(())
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.display_name, self.id.short())
    }
}
