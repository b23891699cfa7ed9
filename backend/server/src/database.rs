//! # Redis
//!
//! Storage collaborator for the scoring engine. Holds the candidate recipe pool, the
//! interaction log, per-user weights and the training history.
//!
//! ## Layout
//!
//! - `recipes`: hash, recipe id to recipe JSON
//! - `interactions:{user}:{type}`: list, append-only interaction JSON
//! - `feature_weights:{user}`: hash, interaction type to weights JSON, upserted
//! - `training_metrics:{user}`: list, append-only metrics JSON
//!
//! ## Notes
//!
//! Concurrent training runs for the same user race on `feature_weights`. Last write wins, the
//! weights are a continuously retrained approximation and nothing needs them serialized.
//!
//! The in-memory store mirrors the layout for tests and local runs.
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::RwLock;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use scoring::{
    FeatureWeights, Interaction, InteractionType, Recipe, TrainingMetrics,
    features::FEATURE_SCHEMA_VERSION,
};
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;

pub const RECIPES_KEY: &str = "recipes";

fn interactions_key(user_id: &str, interaction_type: InteractionType) -> String {
    format!("interactions:{user_id}:{interaction_type}")
}

fn weights_key(user_id: &str) -> String {
    format!("feature_weights:{user_id}")
}

fn metrics_key(user_id: &str) -> String {
    format!("training_metrics:{user_id}")
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Default)]
pub struct MemoryStore {
    recipes: RwLock<BTreeMap<String, Recipe>>,
    interactions: RwLock<HashMap<(String, InteractionType), Vec<Interaction>>>,
    /// Per user, interaction type to weights JSON, like the Redis hash.
    weights: RwLock<HashMap<String, BTreeMap<String, String>>>,
    metrics: RwLock<HashMap<String, Vec<TrainingMetrics>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Makes every call fail as if the backing database went away.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn put_raw_weights(&self, user_id: &str, field: &str, json: &str) {
        self.weights
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(field.to_string(), json.to_string());
    }

    fn check(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::StorageUnavailable("memory store offline".to_string()));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub enum Store {
    Redis(ConnectionManager),
    Memory(Arc<MemoryStore>),
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(Arc::new(MemoryStore::default()))
    }

    /// Candidate pool for duplicate checks, ordered by recipe id.
    pub async fn recipes(&self) -> Result<Vec<Recipe>, AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let raw: Vec<String> = connection.hvals(RECIPES_KEY).await?;

                let mut recipes = parse_all::<Recipe>(&raw);
                recipes.sort_by(|a, b| a.id.cmp(&b.id));

                Ok(recipes)
            }
            Store::Memory(memory) => {
                memory.check()?;
                Ok(memory.recipes.read().values().cloned().collect())
            }
        }
    }

    pub async fn upsert_recipes(&self, recipes: &[Recipe]) -> Result<(), AppError> {
        if recipes.is_empty() {
            return Ok(());
        }

        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let pairs = recipes
                    .iter()
                    .map(|recipe| Ok((recipe.id.clone(), serde_json::to_string(recipe)?)))
                    .collect::<Result<Vec<(String, String)>, AppError>>()?;

                connection.hset_multiple::<_, _, _, ()>(RECIPES_KEY, &pairs).await?;
                Ok(())
            }
            Store::Memory(memory) => {
                memory.check()?;

                let mut stored = memory.recipes.write();
                for recipe in recipes {
                    stored.insert(recipe.id.clone(), recipe.clone());
                }

                Ok(())
            }
        }
    }

    pub async fn append_interaction(&self, interaction: &Interaction) -> Result<(), AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let key = interactions_key(&interaction.user_id, interaction.interaction_type);

                connection
                    .rpush::<_, _, ()>(key, serde_json::to_string(interaction)?)
                    .await?;
                Ok(())
            }
            Store::Memory(memory) => {
                memory.check()?;

                memory
                    .interactions
                    .write()
                    .entry((interaction.user_id.clone(), interaction.interaction_type))
                    .or_default()
                    .push(interaction.clone());

                Ok(())
            }
        }
    }

    /// The newest `limit` interactions, oldest first.
    pub async fn interactions(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
        limit: usize,
    ) -> Result<Vec<Interaction>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let start = -(limit.min(isize::MAX as usize) as isize);
                let raw: Vec<String> = connection
                    .lrange(interactions_key(user_id, interaction_type), start, -1)
                    .await?;

                Ok(parse_all(&raw))
            }
            Store::Memory(memory) => {
                memory.check()?;

                let interactions = memory.interactions.read();
                let log = interactions
                    .get(&(user_id.to_string(), interaction_type))
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                Ok(log[log.len().saturating_sub(limit)..].to_vec())
            }
        }
    }

    pub async fn weights(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<InteractionType, FeatureWeights>, AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let raw: HashMap<String, String> = connection.hgetall(weights_key(user_id)).await?;

                Ok(decode_weight_rows(user_id, &raw))
            }
            Store::Memory(memory) => {
                memory.check()?;

                Ok(memory
                    .weights
                    .read()
                    .get(user_id)
                    .map(|rows| decode_weight_rows(user_id, rows))
                    .unwrap_or_default())
            }
        }
    }

    pub async fn weights_for(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
    ) -> Result<Option<FeatureWeights>, AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let raw: Option<String> = connection
                    .hget(weights_key(user_id), interaction_type.as_str())
                    .await?;

                Ok(raw.and_then(|json| decode_weights(user_id, interaction_type.as_str(), &json)))
            }
            Store::Memory(memory) => {
                memory.check()?;

                Ok(memory
                    .weights
                    .read()
                    .get(user_id)
                    .and_then(|rows| rows.get(interaction_type.as_str()))
                    .and_then(|json| decode_weights(user_id, interaction_type.as_str(), json)))
            }
        }
    }

    pub async fn upsert_weights(&self, weights: &FeatureWeights) -> Result<(), AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();

                connection
                    .hset::<_, _, _, ()>(
                        weights_key(&weights.user_id),
                        weights.interaction_type.as_str(),
                        serde_json::to_string(weights)?,
                    )
                    .await?;
                Ok(())
            }
            Store::Memory(memory) => {
                memory.check()?;
                let json = serde_json::to_string(weights)?;

                memory
                    .weights
                    .write()
                    .entry(weights.user_id.clone())
                    .or_default()
                    .insert(weights.interaction_type.as_str().to_string(), json);

                Ok(())
            }
        }
    }

    pub async fn append_metrics(&self, metrics: &TrainingMetrics) -> Result<(), AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();

                connection
                    .rpush::<_, _, ()>(metrics_key(&metrics.user_id), serde_json::to_string(metrics)?)
                    .await?;
                Ok(())
            }
            Store::Memory(memory) => {
                memory.check()?;

                memory
                    .metrics
                    .write()
                    .entry(metrics.user_id.clone())
                    .or_default()
                    .push(metrics.clone());

                Ok(())
            }
        }
    }

    /// Training history, oldest first.
    pub async fn metrics(&self, user_id: &str) -> Result<Vec<TrainingMetrics>, AppError> {
        match self {
            Store::Redis(manager) => {
                let mut connection = manager.clone();
                let raw: Vec<String> = connection.lrange(metrics_key(user_id), 0, -1).await?;

                Ok(parse_all(&raw))
            }
            Store::Memory(memory) => {
                memory.check()?;
                Ok(memory.metrics.read().get(user_id).cloned().unwrap_or_default())
            }
        }
    }
}

#[derive(Deserialize)]
struct StoredSchema {
    schema_version: u32,
}

/// Rows from another feature schema read as absent, so the trainer reseeds them from the
/// defaults. The version is read first since an older schema may name retired features.
fn decode_weights(user_id: &str, field: &str, json: &str) -> Option<FeatureWeights> {
    if let Ok(StoredSchema { schema_version }) = serde_json::from_str(json)
        && schema_version != FEATURE_SCHEMA_VERSION
    {
        warn!("Ignoring {field} weights for {user_id}, schema {schema_version} is stale");
        return None;
    }

    serde_json::from_str(json)
        .map_err(|e| warn!("Ignoring unreadable {field} weights for {user_id}: {e}"))
        .ok()
}

fn decode_weight_rows<'a>(
    user_id: &str,
    rows: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> BTreeMap<InteractionType, FeatureWeights> {
    rows.into_iter()
        .filter_map(|(field, json)| {
            let Ok(interaction_type) = field.parse::<InteractionType>() else {
                warn!("Ignoring weights for unknown interaction type {field}");
                return None;
            };

            decode_weights(user_id, field, json).map(|row| (interaction_type, row))
        })
        .collect()
}

/// Rows that no longer parse are logged and skipped rather than failing the whole read.
fn parse_all<T: serde::de::DeserializeOwned>(raw: &[String]) -> Vec<T> {
    raw.iter()
        .filter_map(|json| {
            serde_json::from_str(json)
                .map_err(|e| warn!("Skipping unreadable row: {e}"))
                .ok()
        })
        .collect()
}
