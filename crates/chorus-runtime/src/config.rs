//! Runtime configuration.

use std::time::Duration;

use crate::error::RuntimeError;

/// Default address of the provider's inbound (publish) channel.
pub const DEFAULT_PUBLISH_ADDR: &str = "127.0.0.1:5555";

/// Default address of the provider's outbound (subscribe) channel.
pub const DEFAULT_SUBSCRIBE_ADDR: &str = "127.0.0.1:5556";

/// Configuration for the client runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Local identity.
    pub identity: String,
    /// Address commands and messages are published to.
    pub publish_addr: String,
    /// Address events and messages are received from.
    pub subscribe_addr: String,
    /// Envelopes buffered for the writer before new ones are rejected.
    pub outbound_capacity: usize,
    /// Inputs buffered for the driver before the pump waits.
    pub inbound_capacity: usize,
    /// Upper bound on connecting each channel.
    pub connect_timeout: Duration,
    /// Request a group snapshot as soon as the runtime starts.
    pub refresh_on_start: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            identity: String::new(),
            publish_addr: DEFAULT_PUBLISH_ADDR.to_string(),
            subscribe_addr: DEFAULT_SUBSCRIBE_ADDR.to_string(),
            outbound_capacity: 256,
            inbound_capacity: 1024,
            connect_timeout: Duration::from_secs(5),
            refresh_on_start: true,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration for `identity`.
    pub fn for_identity(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), ..Self::default() }
    }

    /// Check the configuration before any resource is acquired.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.identity.trim().is_empty() {
            return Err(RuntimeError::Config("identity must not be empty".to_string()));
        }
        if self.publish_addr.is_empty() || self.subscribe_addr.is_empty() {
            return Err(RuntimeError::Config("channel addresses must not be empty".to_string()));
        }
        if self.outbound_capacity == 0 || self.inbound_capacity == 0 {
            return Err(RuntimeError::Config("queue capacities must be positive".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(RuntimeError::Config("connect timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_requires_identity() {
        assert!(matches!(RuntimeConfig::default().validate(), Err(RuntimeError::Config(_))));
        assert!(RuntimeConfig::for_identity("alice").validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = RuntimeConfig { outbound_capacity: 0, ..RuntimeConfig::for_identity("alice") };
        assert!(config.validate().is_err());
    }
}
