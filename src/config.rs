// File: src/config.rs
use chrono::Duration;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub ranking: RankingSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub normalizer: NormalizerSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Durable backing file; memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            path: None,
        }
    }
}

impl CacheSettings {
    /// Saturates at `Duration::MAX`; `Settings::validate` rejects such values.
    pub fn ttl(&self) -> Duration {
        seconds(self.ttl_secs).unwrap_or(Duration::MAX)
    }
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_entries() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingSettings {
    /// Retrain after this many new feedback events.
    #[serde(default = "default_retrain_every")]
    pub retrain_every: usize,
    /// Also retrain when this much time has passed since the last training.
    #[serde(default)]
    pub retrain_interval_secs: Option<u64>,
    /// Only the most recent events are used for training.
    #[serde(default = "default_training_window")]
    pub training_window: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_l2")]
    pub l2: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            retrain_every: default_retrain_every(),
            retrain_interval_secs: None,
            training_window: default_training_window(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
            max_weight: default_max_weight(),
            recency_half_life_days: default_recency_half_life_days(),
            seed: default_seed(),
            model_path: None,
        }
    }
}

impl RankingSettings {
    pub fn retrain_interval(&self) -> Option<Duration> {
        self.retrain_interval_secs
            .map(|secs| seconds(secs).unwrap_or(Duration::MAX))
    }
}

/// `None` when `secs` does not fit in a `Duration`.
fn seconds(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

fn default_retrain_every() -> usize {
    10
}

fn default_training_window() -> usize {
    500
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    60
}

fn default_l2() -> f64 {
    0.01
}

fn default_max_weight() -> f64 {
    4.0
}

fn default_recency_half_life_days() -> f64 {
    14.0
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LedgerSettings {
    /// JSON-lines file; memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_results: default_max_results(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerSettings {
    /// Minimum similarity ratio in (0, 1] for a fuzzy match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            max_edit_distance: default_max_edit_distance(),
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

fn default_max_edit_distance() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from an optional TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (PANTRY__CACHE__TTL_SECS, etc.)
    /// 2. Config file, if given and present
    /// 3. Defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PANTRY")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Message("cache.ttl_secs must be positive".into()));
        }
        if seconds(self.cache.ttl_secs).is_none() {
            return Err(ConfigError::Message("cache.ttl_secs is too large".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Message("cache.max_entries must be positive".into()));
        }
        if self.ranking.retrain_every == 0 {
            return Err(ConfigError::Message("ranking.retrain_every must be positive".into()));
        }
        if let Some(secs) = self.ranking.retrain_interval_secs {
            if seconds(secs).is_none() {
                return Err(ConfigError::Message(
                    "ranking.retrain_interval_secs is too large".into(),
                ));
            }
        }
        if self.ranking.training_window == 0 {
            return Err(ConfigError::Message("ranking.training_window must be positive".into()));
        }
        if !(self.ranking.max_weight.is_finite() && self.ranking.max_weight > 0.0) {
            return Err(ConfigError::Message("ranking.max_weight must be positive".into()));
        }
        if !(self.ranking.learning_rate.is_finite() && self.ranking.learning_rate > 0.0) {
            return Err(ConfigError::Message("ranking.learning_rate must be positive".into()));
        }
        if !(self.ranking.recency_half_life_days > 0.0) {
            return Err(ConfigError::Message(
                "ranking.recency_half_life_days must be positive".into(),
            ));
        }
        let threshold = self.normalizer.fuzzy_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Message(
                "normalizer.fuzzy_threshold must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}
