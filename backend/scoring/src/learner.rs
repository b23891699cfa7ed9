//! # Weight Learner
//!
//! Fits `predicted = Σ weight_f · feature_f` per (user, interaction type) against the observed
//! interaction values.
//!
//! ## Training
//! - Warm-started from the current weights, which are the global defaults on cold start
//! - Full-batch gradient descent on mean squared error over the most recent interactions
//! - Fewer than `min_samples` interactions skips training, the current weights keep serving
//! - A run that ends with a non-finite weight is thrown away
//!
//! ## Metrics
//! Every run produces MSE, R² and per-feature importance (share of total absolute weight). They
//! are history for observability, ranking never reads them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScoringError},
    features::{FEATURE_COUNT, FEATURE_SCHEMA_VERSION, Feature, FeatureVector},
    interaction::{Interaction, InteractionType},
    weights::FeatureWeights,
};

pub const MODEL_VERSION: &str = "linear-gd-v1";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub min_samples: usize,
    pub max_samples: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 50,
            min_samples: 5,
            max_samples: 500,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingMetrics {
    pub user_id: String,
    pub model_version: String,
    pub interaction_type: InteractionType,
    pub mse: f64,
    pub r_squared: f64,
    pub feature_importances: FeatureVector,
    pub sample_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub weights: FeatureWeights,
    pub metrics: TrainingMetrics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightLearner {
    pub params: TrainingParams,
}

struct Sample {
    features: [f64; FEATURE_COUNT],
    target: f64,
}

impl WeightLearner {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    /// Retrains `current` on the interaction log. Interactions of another type are ignored and
    /// only the newest `max_samples` are used.
    pub fn train(
        &self,
        current: &FeatureWeights,
        interactions: &[Interaction],
        now: DateTime<Utc>,
    ) -> Result<TrainingOutcome> {
        let matching: Vec<&Interaction> = interactions
            .iter()
            .filter(|interaction| interaction.interaction_type == current.interaction_type)
            .filter(|interaction| interaction.value.is_finite())
            .collect();

        if matching.len() < self.params.min_samples.max(1) {
            return Err(ScoringError::InsufficientData {
                samples: matching.len(),
                required: self.params.min_samples.max(1),
            });
        }

        let samples: Vec<Sample> = matching[matching.len().saturating_sub(self.params.max_samples)..]
            .iter()
            .map(|interaction| Sample {
                features: interaction.features.dense(),
                target: interaction.value,
            })
            .collect();

        let mut weights = current.weights.dense();
        let n = samples.len() as f64;

        for _ in 0..self.params.epochs {
            let mut gradient = [0.0; FEATURE_COUNT];

            for sample in &samples {
                let error = predict(&weights, &sample.features) - sample.target;

                for (g, x) in gradient.iter_mut().zip(sample.features) {
                    *g += 2.0 * error * x / n;
                }
            }

            for (w, g) in weights.iter_mut().zip(gradient) {
                *w -= self.params.learning_rate * g;
            }
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ScoringError::Diverged);
        }

        let predicted: Vec<f64> = samples.iter().map(|s| predict(&weights, &s.features)).collect();
        let observed: Vec<f64> = samples.iter().map(|s| s.target).collect();

        let trained = FeatureWeights {
            user_id: current.user_id.clone(),
            interaction_type: current.interaction_type,
            schema_version: FEATURE_SCHEMA_VERSION,
            weights: to_vector(&weights),
            last_updated: Some(now),
        };

        let metrics = TrainingMetrics {
            user_id: current.user_id.clone(),
            model_version: MODEL_VERSION.to_string(),
            interaction_type: current.interaction_type,
            mse: mse(&predicted, &observed),
            r_squared: r_squared(&predicted, &observed),
            feature_importances: importances(&weights),
            sample_count: samples.len(),
            timestamp: now,
        };

        Ok(TrainingOutcome {
            weights: trained,
            metrics,
        })
    }

    /// Single stochastic gradient step on one new interaction.
    pub fn step(
        &self,
        current: &FeatureWeights,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) -> Result<FeatureWeights> {
        let features = interaction.features.dense();
        let mut weights = current.weights.dense();
        let error = predict(&weights, &features) - interaction.value;

        for (w, x) in weights.iter_mut().zip(features) {
            *w -= self.params.learning_rate * 2.0 * error * x;
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ScoringError::Diverged);
        }

        Ok(FeatureWeights {
            weights: to_vector(&weights),
            last_updated: Some(now),
            ..current.clone()
        })
    }
}

fn predict(weights: &[f64; FEATURE_COUNT], features: &[f64; FEATURE_COUNT]) -> f64 {
    weights.iter().zip(features).map(|(w, x)| w * x).sum()
}

fn to_vector(weights: &[f64; FEATURE_COUNT]) -> FeatureVector {
    Feature::ALL
        .into_iter()
        .zip(weights)
        .fold(FeatureVector::new(), |vector, (feature, weight)| {
            vector.with(feature, *weight)
        })
}

fn importances(weights: &[f64; FEATURE_COUNT]) -> FeatureVector {
    let total: f64 = weights.iter().map(|w| w.abs()).sum();

    let shares = (*weights).map(|w| if total > 0.0 { w.abs() / total } else { 0.0 });

    to_vector(&shares)
}

/// Mean squared error, 0 for empty input.
pub fn mse(predicted: &[f64], observed: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }

    let sum: f64 = predicted
        .iter()
        .zip(observed)
        .map(|(p, o)| (o - p).powi(2))
        .sum();

    sum / observed.len() as f64
}

/// Coefficient of determination. 0 when the observed values have no variance.
pub fn r_squared(predicted: &[f64], observed: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }

    let mean = observed.iter().sum::<f64>() / observed.len() as f64;

    let ss_res: f64 = predicted
        .iter()
        .zip(observed)
        .map(|(p, o)| (o - p).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return 0.0;
    }

    1.0 - ss_res / ss_tot
}
