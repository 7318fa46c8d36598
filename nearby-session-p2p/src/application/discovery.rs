use crate::error::{Result, SessionError};
use crate::infrastructure::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two independent discovery channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryKind {
    /// Actively looking for advertising peers
    Browser,
    /// Announcing ourselves so others can invite us
    Advertiser,
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryKind::Browser => write!(f, "browser"),
            DiscoveryKind::Advertiser => write!(f, "advertiser"),
        }
    }
}

/// Idempotent start/stop facade over one discovery channel of a transport
#[derive(Debug)]
pub struct DiscoveryChannel {
    kind: DiscoveryKind,
    active: bool,
    last_failure: Option<String>,
}

impl DiscoveryChannel {
    pub fn new(kind: DiscoveryKind) -> Self {
        Self {
            kind,
            active: false,
            last_failure: None,
        }
    }

    pub fn browser() -> Self {
        Self::new(DiscoveryKind::Browser)
    }

    pub fn advertiser() -> Self {
        Self::new(DiscoveryKind::Advertiser)
    }

    pub fn kind(&self) -> DiscoveryKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reason of the last terminal failure, cleared by a successful start
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Start the channel for `service_type`. Returns `Ok(false)` if it was
    /// already running.
    pub fn start<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        service_type: &str,
    ) -> Result<bool> {
        if self.active {
            return Ok(false);
        }

        let started = match self.kind {
            DiscoveryKind::Browser => transport.start_browsing(service_type),
            DiscoveryKind::Advertiser => transport.start_advertising(service_type),
        };

        if let Err(e) = started {
            let reason = e.to_string();
            tracing::warn!("❌ Failed to start {}: {}", self.kind, reason);
            self.last_failure = Some(reason.clone());
            return Err(SessionError::DiscoveryFailed {
                channel: self.kind,
                reason,
            });
        }

        self.active = true;
        self.last_failure = None;
        tracing::info!("📡 Started {} for '{}'", self.kind, service_type);
        Ok(true)
    }

    /// Stop the channel. Returns `false` if it was not running.
    pub fn stop<T: Transport + ?Sized>(&mut self, transport: &T) -> bool {
        if !self.active {
            return false;
        }

        match self.kind {
            DiscoveryKind::Browser => transport.stop_browsing(),
            DiscoveryKind::Advertiser => transport.stop_advertising(),
        }

        self.active = false;
        tracing::info!("🔇 Stopped {}", self.kind);
        true
    }

    /// Record a terminal failure reported by the transport. The channel stays
    /// down until the owner starts it again.
    pub fn fail(&mut self, reason: &str) {
        tracing::warn!("❌ {} failed: {}", self.kind, reason);
        self.active = false;
        self.last_failure = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{MemoryNetwork, TransportError};

    #[test]
    fn test_start_is_idempotent() {
        let network = MemoryNetwork::new();
        let transport = network.join("Alice").unwrap();
        let mut browser = DiscoveryChannel::browser();

        assert!(browser.start(&transport, "test-svc").unwrap());
        assert!(!browser.start(&transport, "test-svc").unwrap());
        assert!(browser.is_active());
        assert!(network.is_browsing(&transport.local_identity().id()));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let network = MemoryNetwork::new();
        let transport = network.join("Alice").unwrap();
        let mut advertiser = DiscoveryChannel::advertiser();

        assert!(!advertiser.stop(&transport));
        advertiser.start(&transport, "test-svc").unwrap();
        assert!(advertiser.stop(&transport));
        assert!(!advertiser.stop(&transport));
        assert!(!network.is_advertising(&transport.local_identity().id()));
    }

    #[test]
    fn test_start_failure_keeps_channel_down() {
        let network = MemoryNetwork::new();
        let transport = network.join("Alice").unwrap();
        network.set_radio_available(&transport.local_identity().id(), false);

        let mut browser = DiscoveryChannel::browser();
        let err = browser.start(&transport, "test-svc").unwrap_err();

        assert!(matches!(
            err,
            SessionError::DiscoveryFailed {
                channel: DiscoveryKind::Browser,
                ..
            }
        ));
        assert!(!browser.is_active());
        assert_eq!(
            browser.last_failure(),
            Some(TransportError::Unavailable("radio off".to_string()).to_string().as_str())
        );
    }

    #[test]
    fn test_fail_then_restart() {
        let network = MemoryNetwork::new();
        let transport = network.join("Alice").unwrap();
        let mut browser = DiscoveryChannel::browser();

        browser.start(&transport, "test-svc").unwrap();
        browser.fail("interference");
        assert!(!browser.is_active());
        assert_eq!(browser.last_failure(), Some("interference"));

        assert!(browser.start(&transport, "test-svc").unwrap());
        assert!(browser.last_failure().is_none());
    }
}
