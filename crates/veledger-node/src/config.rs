//! Service configuration.
//!
//! [`NodeConfig`] is assembled from three layers, later ones winning:
//! built-in defaults, an optional TOML file, and `VELEDGER_*` environment
//! variables. Nested keys use a double underscore, e.g.
//! `VELEDGER_ESCROW__EARLY_WITHDRAW_ENABLED=true`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use veledger_core::constants::DEFAULT_EVENT_CAPACITY;
use veledger_core::error::ConfigError;
use veledger_core::params::EscrowParams;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "VELEDGER";

/// Configuration for an [`EscrowService`](crate::EscrowService) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Protocol parameters for the engine.
    pub escrow: EscrowParams,
    /// Log level filter string (e.g. "info", "debug", "veledger_escrow=trace").
    pub log_level: String,
    /// Log output format ("text" or "json").
    pub log_format: String,
    /// Capacity of the checkpoint event channel.
    pub event_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            escrow: EscrowParams::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl NodeConfig {
    /// Load from defaults, then `path` (if given), then the process environment.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Load`] if the file is missing or malformed, or a value has the wrong type
    /// - [`ConfigError::InvalidParameter`] if the result fails [`validate`](Self::validate)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading environment variables from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let load_err = |e: config::ConfigError| ConfigError::Load(e.to_string());

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default()).map_err(load_err)?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let cfg: Self = builder.build().map_err(load_err)?.try_deserialize().map_err(load_err)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the escrow parameters and service settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.escrow.validate()?;
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidParameter("event_capacity must be positive".into()));
        }
        match self.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::InvalidParameter(format!(
                "log_format must be \"text\" or \"json\", got {other:?}"
            ))),
        }
    }
}

/// Default location of the configuration file: `<config dir>/veledger/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("veledger")
        .join("config.toml")
}
