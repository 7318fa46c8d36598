use nearby_session_core::PeerId;

/// Transport boundary errors
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TransportError {
    #[error("Radio unavailable: {0}")]
    Unavailable(String),

    #[error("Peer unreachable: {0}")]
    Unreachable(PeerId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
