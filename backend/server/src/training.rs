//! # Training Worker
//!
//! `POST /interactions` only enqueues. This worker drains the queue, appends each interaction to
//! the log and retrains that user's weights for the interaction type, so request latency never
//! pays for training.
use std::{sync::Arc, time::Duration};

use chrono::Utc;
use scoring::{
    DefaultWeights, FeatureWeights, Interaction, InteractionType, ScoringError, TrainingOutcome,
    WeightLearner,
};
use tokio::{sync::mpsc::Receiver, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{database::Store, error::AppError, utils::bounded};

#[derive(Clone)]
pub struct Trainer {
    pub store: Store,
    pub defaults: Arc<DefaultWeights>,
    pub learner: WeightLearner,
    pub store_timeout: Duration,
}

impl Trainer {
    /// Stored weights, or the defaults when the row is missing or from an older schema.
    pub async fn current_weights(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
    ) -> Result<FeatureWeights, AppError> {
        let stored = bounded(
            self.store_timeout,
            self.store.weights_for(user_id, interaction_type),
        )
        .await?;

        Ok(stored.unwrap_or_else(|| self.defaults.seed(user_id, interaction_type)))
    }

    /// Retrains and persists. `None` when the learner skipped the run.
    pub async fn retrain(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
    ) -> Result<Option<TrainingOutcome>, AppError> {
        let current = self.current_weights(user_id, interaction_type).await?;
        let log = bounded(
            self.store_timeout,
            self.store
                .interactions(user_id, interaction_type, self.learner.params.max_samples),
        )
        .await?;

        let outcome = match self.learner.train(&current, &log, Utc::now()) {
            Ok(outcome) => outcome,
            Err(ScoringError::InsufficientData { samples, required }) => {
                debug!(
                    "Not training {interaction_type} for {user_id}: {samples} of {required} samples"
                );
                return Ok(None);
            }
            Err(ScoringError::Diverged) => {
                warn!("Training {interaction_type} for {user_id} diverged, keeping weights");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        bounded(self.store_timeout, self.store.upsert_weights(&outcome.weights)).await?;
        bounded(self.store_timeout, self.store.append_metrics(&outcome.metrics)).await?;

        info!(
            "Trained {interaction_type} weights for {user_id}: samples={} mse={:.4} r2={:.4}",
            outcome.metrics.sample_count, outcome.metrics.mse, outcome.metrics.r_squared
        );

        Ok(Some(outcome))
    }

    pub async fn handle(&self, interaction: Interaction) -> Result<Option<TrainingOutcome>, AppError> {
        bounded(self.store_timeout, self.store.append_interaction(&interaction)).await?;

        self.retrain(&interaction.user_id, interaction.interaction_type)
            .await
    }
}

/// Runs until every sender is dropped, then finishes the queued work and exits.
pub fn spawn_worker(trainer: Trainer, mut receiver: Receiver<Interaction>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(interaction) = receiver.recv().await {
            let user_id = interaction.user_id.clone();

            if let Err(e) = trainer.handle(interaction).await {
                warn!("Dropping interaction from {user_id}: {e}");
            }
        }

        info!("Training queue closed, worker exiting");
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::Utc;
    use scoring::{
        DefaultWeights, Feature, FeatureVector, Interaction, InteractionType, TrainingParams,
        WeightLearner,
    };
    use tokio::sync::mpsc;

    use super::{Trainer, spawn_worker};
    use crate::database::{MemoryStore, Store};

    fn trainer(store: Store) -> Trainer {
        Trainer {
            store,
            defaults: Arc::new(DefaultWeights::builtin().unwrap()),
            learner: WeightLearner::new(TrainingParams {
                min_samples: 3,
                ..Default::default()
            }),
            store_timeout: Duration::from_secs(1),
        }
    }

    fn like(relevance: f64) -> Interaction {
        Interaction {
            user_id: "ana".to_string(),
            recipe_id: "r1".to_string(),
            interaction_type: InteractionType::Like,
            value: 1.0,
            features: FeatureVector::new().with(Feature::Relevance, relevance),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_skips_until_enough_samples() {
        let store = Store::memory();
        let trainer = trainer(store.clone());

        assert!(trainer.handle(like(0.5)).await.unwrap().is_none());
        assert!(trainer.handle(like(0.6)).await.unwrap().is_none());
        assert!(store.weights("ana").await.unwrap().is_empty());

        let outcome = trainer.handle(like(0.7)).await.unwrap().unwrap();

        assert_eq!(outcome.metrics.sample_count, 3);
        assert_eq!(
            store.weights_for("ana", InteractionType::Like).await.unwrap(),
            Some(outcome.weights)
        );
        assert_eq!(store.metrics("ana").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cold_start_uses_defaults() {
        let trainer = trainer(Store::memory());
        let defaults = DefaultWeights::builtin().unwrap();

        let current = trainer.current_weights("new-user", InteractionType::Save).await.unwrap();

        assert!(current.is_default());
        assert_eq!(&current.weights, defaults.get(InteractionType::Save));
    }

    #[tokio::test]
    async fn test_stale_schema_is_reseeded() {
        let store = Store::memory();
        let trainer = trainer(store.clone());
        let mut stale = trainer.defaults.seed("ana", InteractionType::Like);
        stale.schema_version = 0;
        stale.weights = FeatureVector::new();
        store.upsert_weights(&stale).await.unwrap();

        let current = trainer.current_weights("ana", InteractionType::Like).await.unwrap();

        assert!(current.is_default());
        assert_eq!(&current.weights, trainer.defaults.get(InteractionType::Like));
    }

    #[tokio::test]
    async fn test_retired_feature_row_is_reseeded_and_trained() {
        let memory = Arc::new(MemoryStore::default());
        let store = Store::Memory(memory.clone());
        let trainer = trainer(store.clone());
        memory.put_raw_weights(
            "ana",
            "like",
            r#"{"user_id":"ana","interaction_type":"like","schema_version":0,
                "weights":{"relevance":0.3,"spiciness":0.2},
                "last_updated":"2025-01-01T00:00:00Z"}"#,
        );

        let current = trainer.current_weights("ana", InteractionType::Like).await.unwrap();
        assert!(current.is_default());
        assert_eq!(&current.weights, trainer.defaults.get(InteractionType::Like));

        for relevance in [0.3, 0.6] {
            assert!(trainer.handle(like(relevance)).await.unwrap().is_none());
        }
        let outcome = trainer.handle(like(0.9)).await.unwrap().unwrap();

        assert!(!outcome.weights.is_default());
        assert_eq!(
            store.weights_for("ana", InteractionType::Like).await.unwrap(),
            Some(outcome.weights)
        );
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let store = Store::memory();
        let (sender, receiver) = mpsc::channel(16);
        let worker = spawn_worker(trainer(store.clone()), receiver);

        for relevance in [0.2, 0.4, 0.6, 0.8] {
            sender.send(like(relevance)).await.unwrap();
        }
        drop(sender);
        worker.await.unwrap();

        assert_eq!(store.interactions("ana", InteractionType::Like, 10).await.unwrap().len(), 4);
        assert_eq!(store.metrics("ana").await.unwrap().len(), 2);
    }
}
