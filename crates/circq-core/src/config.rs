use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Queue capacities the stress driver is compiled for.
pub const SUPPORTED_CAPACITIES: [usize; 5] = [2, 4, 64, 1024, 65536];

/// Upper bound on threads per side of a stress run.
pub const MAX_THREADS_PER_SIDE: usize = 256;

/// Upper bound on `producers * items_per_producer` for one run.
pub const MAX_TOTAL_ITEMS: u64 = 1 << 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "circq=debug". `RUST_LOG` wins when set.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StressConfig {
    #[serde(default = "StressConfig::default_producers")]
    pub producers: usize,
    #[serde(default = "StressConfig::default_consumers")]
    pub consumers: usize,
    #[serde(default = "StressConfig::default_items_per_producer")]
    pub items_per_producer: u64,
    /// Must be one of [`SUPPORTED_CAPACITIES`]
    #[serde(default = "StressConfig::default_capacity")]
    pub capacity: usize,
    /// Pin each worker thread to a core, round-robin
    #[serde(default)]
    pub pin_threads: bool,
    /// Wall-clock limit for one run
    #[serde(default = "StressConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StressConfig {
    fn default_producers() -> usize {
        2
    }

    fn default_consumers() -> usize {
        1
    }

    fn default_items_per_producer() -> u64 {
        1024
    }

    fn default_capacity() -> usize {
        1024
    }

    fn default_timeout_ms() -> u64 {
        10_000
    }

    /// Items produced across all producers, or `None` past [`MAX_TOTAL_ITEMS`].
    pub fn total_items(&self) -> Option<u64> {
        self.items_per_producer
            .checked_mul(self.producers as u64)
            .filter(|&total| total <= MAX_TOTAL_ITEMS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            producers: Self::default_producers(),
            consumers: Self::default_consumers(),
            items_per_producer: Self::default_items_per_producer(),
            capacity: Self::default_capacity(),
            pin_threads: false,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub stress: StressConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            logging: LoggingConfig::default(),
            stress: StressConfig::default(),
        }
    }
}

impl Settings {
    pub fn default_env() -> String {
        env::var("CIRCQ_ENV").unwrap_or_else(|_| "development".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.logging.level.trim().is_empty(),
            "logging.level cannot be empty"
        );
        let stress = &self.stress;
        anyhow::ensure!(
            (1..=MAX_THREADS_PER_SIDE).contains(&stress.producers),
            "stress.producers must be 1..={}",
            MAX_THREADS_PER_SIDE
        );
        anyhow::ensure!(
            (1..=MAX_THREADS_PER_SIDE).contains(&stress.consumers),
            "stress.consumers must be 1..={}",
            MAX_THREADS_PER_SIDE
        );
        anyhow::ensure!(
            stress.items_per_producer > 0,
            "stress.items_per_producer must be > 0"
        );
        anyhow::ensure!(
            stress.total_items().is_some(),
            "stress.producers * stress.items_per_producer must be <= {}",
            MAX_TOTAL_ITEMS
        );
        anyhow::ensure!(
            SUPPORTED_CAPACITIES.contains(&stress.capacity),
            "stress.capacity must be one of {:?}, got {}",
            SUPPORTED_CAPACITIES,
            stress.capacity
        );
        anyhow::ensure!(stress.timeout_ms > 0, "stress.timeout_ms must be > 0");
        Ok(())
    }

    /// Get the default configuration directory.
    ///
    /// Priority order:
    /// 1. ~/.circq/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".circq");
            if user_dir.exists() {
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            return project_config;
        }
        cwd
    }

    /// Layer `default.toml`, `{env}.toml`, `local.toml` and `CIRCQ__*`
    /// environment variables, later sources winning.
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix("CIRCQ")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut settings: Settings = builder
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.env = env_name.to_string();
        Ok(settings)
    }

    /// Load and validate settings from `config_dir`, or from
    /// [`default_config_dir`](Self::default_config_dir) when `None`.
    pub fn load(config_dir: Option<PathBuf>) -> Result<Settings> {
        let dir = config_dir.unwrap_or_else(Self::default_config_dir);
        let env_name = Self::default_env();
        let settings = Self::load_from_sources(&dir, &env_name)
            .with_context(|| format!("loading configuration from {:?}", dir))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing configuration to TOML")
    }

    pub fn from_toml(s: &str) -> Result<Settings> {
        toml::from_str(s).context("parsing TOML configuration")
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("writing configuration to {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_capacity() {
        let mut s = Settings::default();
        s.stress.capacity = 1000;
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("stress.capacity"), "{err}");
    }

    #[test]
    fn rejects_zero_workers_and_items() {
        let mut s = Settings::default();
        s.stress.producers = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.stress.consumers = MAX_THREADS_PER_SIDE + 1;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.stress.items_per_producer = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.logging.level = "  ".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_item_totals_past_the_limit() {
        let mut s = Settings::default();
        s.stress.producers = 2;
        s.stress.items_per_producer = u64::MAX;
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("items_per_producer"), "{err}");

        s.stress.items_per_producer = MAX_TOTAL_ITEMS / 2 + 1;
        assert!(s.validate().is_err());

        s.stress.items_per_producer = MAX_TOTAL_ITEMS / 2;
        assert_eq!(s.stress.total_items(), Some(MAX_TOTAL_ITEMS));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut s = Settings::default();
        s.stress.pin_threads = true;
        s.stress.capacity = 64;
        let text = s.to_toml().unwrap();
        assert!(text.contains("[stress]"));
        assert_eq!(Settings::from_toml(&text).unwrap(), s);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let s = Settings::from_toml("[stress]\nproducers = 8\n").unwrap();
        assert_eq!(s.stress.producers, 8);
        assert_eq!(s.stress.consumers, 1);
        assert_eq!(s.logging, LoggingConfig::default());
    }
}
