use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use scoring::{DefaultWeights, DuplicateCheck, RankingBlend, SimilarityWeights, TrainingParams};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("expected redis or memory, got {other}")),
        }
    }
}

/// What recommendations do when the user's weights can't be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsUnavailableMode {
    /// Non-personalized popularity/recency ranking.
    Fallback,
    /// Global default weights, still reported as personalized.
    Defaults,
}

impl FromStr for WeightsUnavailableMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fallback" => Ok(WeightsUnavailableMode::Fallback),
            "defaults" => Ok(WeightsUnavailableMode::Defaults),
            other => Err(format!("expected fallback or defaults, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    pub redis_url: String,
    pub store_timeout: Duration,
    pub duplicate_check: DuplicateCheck,
    pub duplicate_check_fail_open: bool,
    pub blend: RankingBlend,
    pub weights_unavailable: WeightsUnavailableMode,
    pub training: TrainingParams,
    pub queue_capacity: usize,
    pub default_weights_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            store: StoreKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_timeout: Duration::from_millis(250),
            duplicate_check: DuplicateCheck::default(),
            duplicate_check_fail_open: false,
            blend: RankingBlend::default(),
            weights_unavailable: WeightsUnavailableMode::Fallback,
            training: TrainingParams::default(),
            queue_capacity: 1024,
            default_weights_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = Self {
            port: try_load("RUST_PORT", "1111")?,
            store: try_load("STORE", "redis")?,
            redis_url: match read_secret("REDIS_URL") {
                Some(url) => url,
                None => try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            },
            store_timeout: Duration::from_millis(try_load("STORE_TIMEOUT_MS", "250")?),
            duplicate_check: DuplicateCheck {
                weights: SimilarityWeights {
                    title_weight: try_load("TITLE_WEIGHT", "0.4")?,
                    ingredients_weight: try_load("INGREDIENTS_WEIGHT", "0.6")?,
                },
                threshold: try_load("SIMILARITY_THRESHOLD", "0.3")?,
            },
            duplicate_check_fail_open: try_load("DUPLICATE_CHECK_FAIL_OPEN", "false")?,
            blend: RankingBlend {
                like: try_load("LIKE_BLEND", "0.6")?,
                save: try_load("SAVE_BLEND", "0.4")?,
            },
            weights_unavailable: try_load("WEIGHTS_UNAVAILABLE_MODE", "fallback")?,
            training: TrainingParams {
                learning_rate: try_load("LEARNING_RATE", "0.05")?,
                epochs: try_load("TRAINING_EPOCHS", "50")?,
                min_samples: try_load("MIN_TRAINING_SAMPLES", "5")?,
                max_samples: try_load("MAX_TRAINING_SAMPLES", "500")?,
            },
            queue_capacity: try_load("TRAINING_QUEUE_CAPACITY", "1024")?,
            default_weights_path: var("DEFAULT_WEIGHTS_PATH").ok(),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.duplicate_check.validate()?;
        self.blend.validate()?;

        if !self.training.learning_rate.is_finite() || self.training.learning_rate <= 0.0 {
            return Err(anyhow!("LEARNING_RATE must be positive"));
        }

        if self.queue_capacity == 0 {
            return Err(anyhow!("TRAINING_QUEUE_CAPACITY must be at least 1"));
        }

        Ok(())
    }

    pub fn load_default_weights(&self) -> Result<DefaultWeights> {
        let Some(path) = &self.default_weights_path else {
            return Ok(DefaultWeights::builtin()?);
        };

        info!("Loading default weights from {path}");
        let json = read_to_string(path).with_context(|| format!("reading {path}"))?;

        Ok(DefaultWeights::from_json(&json)?)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured: {key}: {e}")
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret ({e}), falling back to environment");
        })
        .ok()
}
