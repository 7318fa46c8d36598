use crate::error::{Result, SessionError};
use std::time::Duration;

/// Service type used when none is configured
pub const DEFAULT_SERVICE_TYPE: &str = "mcsessionp2p";

/// Longest service type the discovery layer accepts
pub const MAX_SERVICE_TYPE_LEN: usize = 15;

/// Configuration for a session controller
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Discovery namespace; only peers with the same service type meet
    pub service_type: String,

    /// How long an outgoing invitation may stay unanswered
    pub invite_timeout: Duration,

    /// How long a deferred incoming invitation waits for the owner
    pub invitation_timeout: Duration,

    /// Upper bound for handing one payload to the transport
    pub send_timeout: Duration,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Invite newly found peers automatically
    pub auto_invite: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            invite_timeout: Duration::from_secs(30),
            invitation_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(5),
            poll_interval_ms: 100,
            auto_invite: true,
        }
    }
}

impl SessionConfig {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            ..Default::default()
        }
    }

    pub fn with_invite_timeout(mut self, timeout: Duration) -> Self {
        self.invite_timeout = timeout;
        self
    }

    pub fn with_invitation_timeout(mut self, timeout: Duration) -> Self {
        self.invitation_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_auto_invite(mut self, enabled: bool) -> Self {
        self.auto_invite = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        validate_service_type(&self.service_type)?;

        let durations = [
            ("invite_timeout", self.invite_timeout),
            ("invitation_timeout", self.invitation_timeout),
            ("send_timeout", self.send_timeout),
            ("poll_interval", self.poll_interval()),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(SessionError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// 1-15 lowercase ASCII letters, digits or hyphens; at least one letter;
/// hyphens only between other characters and never two in a row.
pub fn validate_service_type(service_type: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(SessionError::InvalidConfig(format!(
            "service type '{}' {}",
            service_type, reason
        )))
    };

    if service_type.is_empty() || service_type.len() > MAX_SERVICE_TYPE_LEN {
        return invalid("must be 1-15 characters long");
    }

    if !service_type
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return invalid("may only contain lowercase letters, digits and hyphens");
    }

    if !service_type.bytes().any(|b| b.is_ascii_lowercase()) {
        return invalid("must contain at least one letter");
    }

    if service_type.starts_with('-') || service_type.ends_with('-') || service_type.contains("--")
    {
        return invalid("has a misplaced hyphen");
    }

    Ok(())
}
