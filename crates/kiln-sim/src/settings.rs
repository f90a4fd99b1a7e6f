//! Protocol configuration.
//!
//! Layered, lowest priority first:
//! 1. built-in defaults ([`ProtocolConfig::default`])
//! 2. an optional TOML file, by default `<config dir>/kiln/kiln.toml`
//! 3. `KILN_*` environment variables (`KILN_DECAY_BPS=9800`)
//!
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use kiln_core::constants::{
    BPS_PRECISION, DEFAULT_BOOTSTRAP_WEEKLY_TOKENS, DEFAULT_DECAY_BPS, DEFAULT_MAX_CHECKPOINT_WEEKS,
    DEFAULT_RAMP_WEEKS, DEFAULT_WEEKLY_RATE_BPS,
};
use kiln_rewards::EmissionSchedule;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "KILN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config: {0}")] Load(#[from] config::ConfigError),
    #[error("invalid config: {0}")] Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Share of circulating supply emitted per week during the ramp, in bps.
    pub weekly_rate_bps: u64,
    /// Per-week multiplier applied after the ramp, in bps.
    pub decay_bps: u64,
    pub ramp_weeks: u64,
    /// Minimum weekly emission during the ramp, in whole tokens.
    pub bootstrap_weekly_tokens: u64,
    /// Weeks a single checkpoint call may materialize.
    pub max_checkpoint_weeks: u64,
    /// Log level filter string (e.g. "info", "kiln_rewards=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            weekly_rate_bps: DEFAULT_WEEKLY_RATE_BPS,
            decay_bps: DEFAULT_DECAY_BPS,
            ramp_weeks: DEFAULT_RAMP_WEEKS,
            bootstrap_weekly_tokens: DEFAULT_BOOTSTRAP_WEEKLY_TOKENS,
            max_checkpoint_weeks: DEFAULT_MAX_CHECKPOINT_WEEKS,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ProtocolConfig {
    /// `<config dir>/kiln/kiln.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kiln").join("kiln.toml"))
    }

    /// Load from `path` (or the default path) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from `path` (or the default path) and the given environment source.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(path) = Self::default_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }
        let config: Self = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weekly_rate_bps == 0 || self.weekly_rate_bps > BPS_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "weekly_rate_bps must be in 1..={BPS_PRECISION}, got {}",
                self.weekly_rate_bps
            )));
        }
        if self.decay_bps > BPS_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "decay_bps must be at most {BPS_PRECISION}, got {}",
                self.decay_bps
            )));
        }
        if self.max_checkpoint_weeks == 0 {
            return Err(ConfigError::Invalid("max_checkpoint_weeks must be non-zero".into()));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "log_format must be \"text\" or \"json\", got {:?}",
                self.log_format
            )));
        }
        Ok(())
    }

    pub fn schedule(&self) -> EmissionSchedule {
        EmissionSchedule::from_bps(
            self.weekly_rate_bps,
            self.decay_bps,
            self.ramp_weeks,
            self.bootstrap_weekly_tokens,
        )
    }
}
