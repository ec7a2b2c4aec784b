//! Bridge configuration: built-in defaults, an optional TOML file, then CLI
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use nus_bridge::identity::LOCAL_NAME;
use nus_bridge::{DEFAULT_TICK, MAX_CHUNK};
use nus_pty::ShellConfig;

use crate::wire::MAX_PAYLOAD;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name announced to peers.
    pub local_name: String,
    /// Primary listen address.
    pub listen: String,
    /// Used once if `listen` cannot be bound.
    pub fallback_listen: String,
    /// Largest notify frame, in bytes.
    pub max_chunk: usize,
    /// Pump period in milliseconds.
    pub tick_ms: u64,
    /// Depth of the inbound and outbound transport queues.
    pub queue_depth: usize,
    pub shell: ShellConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            local_name: LOCAL_NAME.to_string(),
            listen: "0.0.0.0:6400".to_string(),
            fallback_listen: "127.0.0.1:0".to_string(),
            max_chunk: MAX_CHUNK,
            tick_ms: DEFAULT_TICK.as_millis() as u64,
            queue_depth: 64,
            shell: ShellConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load a config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: BridgeConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk == 0 || self.max_chunk > MAX_PAYLOAD {
            return Err(ConfigError::Invalid(format!(
                "max_chunk must be between 1 and {MAX_PAYLOAD}, got {}",
                self.max_chunk
            )));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".into()));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be positive".into()));
        }
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Invalid("listen address is empty".into()));
        }
        if self.shell.read_buf == 0 {
            return Err(ConfigError::Invalid("shell.read_buf must be positive".into()));
        }
        if self.shell.cols == 0 || self.shell.rows == 0 {
            return Err(ConfigError::Invalid(format!(
                "terminal size {}x{} is empty",
                self.shell.cols, self.shell.rows
            )));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
