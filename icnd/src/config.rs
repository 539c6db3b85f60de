use std::{fs, path::Path, time::Duration};

use icn_core::{Content, FaceId, Name};
use icn_forwarder::{ContentStoreKind, ForwardingConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Error types for configuration handling
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub forwarder: ForwarderConfig,
    pub logging: LoggingConfig,
    pub routes: Vec<RouteConfig>,
    pub static_content: Vec<StaticContentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Period of the status log line, 0 disables it
    pub status_interval_secs: u64,
    /// Depth of every packet queue between faces and the engine
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    pub cs_timeout_secs: u64,
    pub pit_timeout_secs: u64,
    pub pit_retransmits: u32,
    pub ageing_interval_ms: u64,
    pub interest_to_app: bool,
    pub content_store: ContentStoreKind,
    pub cs_capacity: usize,
    pub keep_local_waiters_on_nack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Route installed at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub faces: Vec<FaceId>,
    #[serde(rename = "static", default)]
    pub is_static: bool,
}

/// Content pinned in the cache at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticContentConfig {
    pub name: String,
    pub payload: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 30,
            queue_capacity: 1024,
        }
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        let defaults = ForwardingConfig::default();
        Self {
            cs_timeout_secs: defaults.cs_timeout.as_secs(),
            pit_timeout_secs: defaults.pit_timeout.as_secs(),
            pit_retransmits: defaults.pit_retransmits,
            ageing_interval_ms: defaults.ageing_interval.as_millis() as u64,
            interest_to_app: defaults.interest_to_app,
            content_store: defaults.content_store,
            cs_capacity: defaults.cs_capacity,
            keep_local_waiters_on_nack: defaults.keep_local_waiters_on_nack,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RouteConfig {
    pub fn name(&self) -> Name {
        Name::from_str(&self.prefix)
    }
}

impl StaticContentConfig {
    pub fn to_content(&self) -> Content {
        Content::new(Name::from_str(&self.name), self.payload.clone().into_bytes())
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.queue_capacity == 0 {
            return Err(ConfigError::Invalid("daemon.queue_capacity must be greater than zero".to_string()));
        }
        if self.forwarder.ageing_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "forwarder.ageing_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level '{}'", self.logging.level)));
        }
        for route in &self.routes {
            if route.faces.is_empty() {
                return Err(ConfigError::Invalid(format!("route {} has no faces", route.prefix)));
            }
        }
        for content in &self.static_content {
            if Name::from_str(&content.name).is_empty() {
                return Err(ConfigError::Invalid("static content needs a non-empty name".to_string()));
            }
        }
        Ok(())
    }

    pub fn forwarding_config(&self) -> ForwardingConfig {
        let forwarder = &self.forwarder;
        ForwardingConfig {
            cs_timeout: Duration::from_secs(forwarder.cs_timeout_secs),
            pit_timeout: Duration::from_secs(forwarder.pit_timeout_secs),
            pit_retransmits: forwarder.pit_retransmits,
            ageing_interval: Duration::from_millis(forwarder.ageing_interval_ms),
            interest_to_app: forwarder.interest_to_app,
            content_store: forwarder.content_store,
            cs_capacity: forwarder.cs_capacity,
            keep_local_waiters_on_nack: forwarder.keep_local_waiters_on_nack,
        }
    }

    pub fn status_interval(&self) -> Option<Duration> {
        match self.daemon.status_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
