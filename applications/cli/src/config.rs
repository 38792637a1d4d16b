/// CLI configuration
use crate::error::{CliError, Result};
use reprise_playback::{parse_max_delay, PlayerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Config file read when no path is given, if present
pub const DEFAULT_CONFIG_FILE: &str = "reprise.toml";

/// Environment variable prefix; nested keys use `__`, e.g.
/// `REPRISE_PLAYBACK__MAX_DELAY_MS=250`
pub const ENV_PREFIX: &str = "REPRISE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Cap on any single wait. Kept untyped until validation so that a
    /// non-numeric value is reported rather than silently ignored.
    #[serde(default)]
    pub max_delay_ms: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Print item payloads
    #[serde(default = "default_payloads")]
    pub payloads: bool,

    /// Print event notifications in addition to named ones
    #[serde(default = "default_show_events")]
    pub show_events: bool,
}

impl CliConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration, reading environment variables from `env` instead
    /// of the process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if config_path.exists() {
                    settings = settings.add_source(config::File::from(config_path));
                }
            }
        }

        // Override with environment variables (prefixed with REPRISE_)
        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.player_config().map(|_| ())
    }

    /// Player configuration described by these settings
    pub fn player_config(&self) -> Result<PlayerConfig> {
        let max_delay_ms = parse_max_delay(&self.playback.max_delay_ms)
            .map_err(|e| CliError::Config(format!("playback.max_delay_ms: {}", e)))?;
        Ok(PlayerConfig { max_delay_ms })
    }

    /// Player configuration with a command-line cap applied on top
    ///
    /// `None` keeps the configured cap. A negative override removes it.
    pub fn player_config_with_override(&self, max_delay_ms: Option<i64>) -> Result<PlayerConfig> {
        let mut player_config = self.player_config()?;
        if let Some(ms) = max_delay_ms {
            player_config.max_delay_ms = u64::try_from(ms).ok();
        }
        Ok(player_config)
    }
}

// Default values
fn default_payloads() -> bool {
    true
}

fn default_show_events() -> bool {
    false
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            payloads: default_payloads(),
            show_events: default_show_events(),
        }
    }
}
