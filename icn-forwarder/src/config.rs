use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForwarderError, Result};

/// Content Store container strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStoreKind {
    /// Hash map keyed by the full name
    #[default]
    Exact,
    /// Component trie answering with a descendant of the requested name
    Prefix,
}

/// Forwarding configuration
#[derive(Debug, Clone)]
pub struct ForwardingConfig {
    /// Age after which a non-static cache entry is evicted
    pub cs_timeout: Duration,
    /// Age after which a PIT entry with a spent retransmit budget is dropped
    pub pit_timeout: Duration,
    /// Number of retransmissions allowed per pending Interest
    pub pit_retransmits: u32,
    /// Period of the ageing sweep
    pub ageing_interval: Duration,
    /// Hand unmatched Interests to the local application instead of the FIB
    pub interest_to_app: bool,
    pub content_store: ContentStoreKind,
    /// Maximum number of cache entries, 0 for unbounded
    pub cs_capacity: usize,
    /// On a terminal Nack keep the PIT entry for local-app requesters
    pub keep_local_waiters_on_nack: bool,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            cs_timeout: Duration::from_secs(10),
            pit_timeout: Duration::from_secs(10),
            pit_retransmits: 3,
            ageing_interval: Duration::from_secs(3),
            interest_to_app: false,
            content_store: ContentStoreKind::Exact,
            cs_capacity: 0,
            keep_local_waiters_on_nack: false,
        }
    }
}

impl ForwardingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ageing_interval.is_zero() {
            return Err(ForwarderError::InvalidConfig(
                "ageing interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ForwardingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ageing_interval_rejected() {
        let config = ForwardingConfig {
            ageing_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ForwarderError::InvalidConfig(_))));
    }
}
