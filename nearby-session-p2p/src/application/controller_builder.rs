use crate::application::{AutoAccept, InvitationPolicy, SessionConfig, SessionController, SessionObserver};
use crate::error::Result;
use crate::infrastructure::Transport;
use std::sync::{Arc, Weak};

/// Builder for a [`SessionController`]
pub struct SessionControllerBuilder {
    config: SessionConfig,
    policy: Arc<dyn InvitationPolicy>,
    observer: Option<Weak<dyn SessionObserver>>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            policy: Arc::new(AutoAccept),
            observer: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.config.service_type = service_type.into();
        self
    }

    pub fn policy(mut self, policy: impl InvitationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Only a weak reference is kept; the caller owns the observer
    pub fn observer<O: SessionObserver + 'static>(mut self, observer: &Arc<O>) -> Self {
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(observer) as Weak<dyn SessionObserver>;
        self.observer = Some(weak);
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> Result<SessionController<T>> {
        self.config.validate()?;

        tracing::info!(
            "🎯 Session controller for {} (service type '{}')",
            transport.local_identity(),
            self.config.service_type
        );

        Ok(SessionController::from_parts(
            transport,
            self.config,
            self.policy,
            self.observer,
        ))
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
