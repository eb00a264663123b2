use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::inbound::CouplingSettings;
use crate::application::MotionSettings;
use crate::common::SetupResult;
use crate::domains::coupling::ChannelIdentity;
use crate::domains::motion::{CentreOfRotation, DecodePolicy};

/// Prefix of environment overrides, e.g. `COSIM__COUPLING__SOCKET_ID=4`.
pub const ENV_PREFIX: &str = "COSIM";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub coupling: CouplingConfig,
    pub motion: MotionConfig,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Read as a plain number and rounded, so `3` and `3.0` name the same socket.
    pub socket_id: f64,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    pub centre_of_rotation: [f64; 3],
    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub max_steps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_workers() -> usize {
    1
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_steps: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: default_level(),
        }
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The TOML file at `path`, overridden by `COSIM__<SECTION>__<KEY>` environment variables.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).format(::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("loading {}", path.as_ref().display()))?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.channel_identity()?;
        if self.motion.centre_of_rotation.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!(
                "centre_of_rotation must be finite, got {:?}",
                self.motion.centre_of_rotation
            ));
        }
        if self.group.workers == 0 {
            return Err(anyhow!("group.workers must be at least 1"));
        }
        if self.coupling.response_timeout_ms == Some(0) {
            return Err(anyhow!("coupling.response_timeout_ms must be positive when set"));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn channel_identity(&self) -> SetupResult<ChannelIdentity> {
        ChannelIdentity::from_scalar(self.coupling.socket_id)
    }

    pub fn coupling_settings(&self) -> CouplingSettings {
        CouplingSettings {
            directory: self.coupling.directory.clone(),
            response_timeout: self.coupling.response_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            centre: CentreOfRotation::from(self.motion.centre_of_rotation),
            decode_policy: self.motion.decode_policy,
        }
    }

    pub fn log_level(&self) -> Result<log::LevelFilter> {
        self.logging
            .level
            .parse()
            .map_err(|_| anyhow!("unknown log level {:?}", self.logging.level))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coupling: CouplingConfig {
                socket_id: 1.0,
                directory: default_directory(),
                response_timeout_ms: None,
            },
            motion: MotionConfig {
                centre_of_rotation: [0.0, 0.0, 0.0],
                decode_policy: DecodePolicy::Strict,
            },
            group: GroupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
