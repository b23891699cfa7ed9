//! # Feature Weights
//!
//! One weight vector per (user, interaction type), seeded from a global default table until the
//! learner has trained on that user's interactions.
//!
//! The default table is plain data. The built-in one ships with the crate and a deployment can
//! swap it for its own file at startup, after which it never changes.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScoringError},
    features::{FEATURE_SCHEMA_VERSION, FeatureVector},
    interaction::InteractionType,
};

const BUILTIN_DEFAULT_WEIGHTS: &str = include_str!("default_weights.json");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureWeights {
    pub user_id: String,
    pub interaction_type: InteractionType,
    pub schema_version: u32,
    pub weights: FeatureVector,
    /// `None` while the weights are still the untouched defaults.
    pub last_updated: Option<DateTime<Utc>>,
}

impl FeatureWeights {
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        dot(&self.weights, features)
    }

    pub fn is_default(&self) -> bool {
        self.last_updated.is_none()
    }
}

pub fn dot(weights: &FeatureVector, features: &FeatureVector) -> f64 {
    weights
        .dense()
        .iter()
        .zip(features.dense())
        .map(|(weight, value)| weight * value)
        .sum()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DefaultWeights {
    schema_version: u32,
    view: FeatureVector,
    like: FeatureVector,
    save: FeatureVector,
}

impl DefaultWeights {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DEFAULT_WEIGHTS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let defaults: DefaultWeights =
            serde_json::from_str(json).map_err(|e| ScoringError::DefaultWeights(e.to_string()))?;

        if defaults.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(ScoringError::DefaultWeights(format!(
                "schema version {} does not match {FEATURE_SCHEMA_VERSION}",
                defaults.schema_version
            )));
        }

        Ok(defaults)
    }

    pub fn get(&self, interaction_type: InteractionType) -> &FeatureVector {
        match interaction_type {
            InteractionType::View => &self.view,
            InteractionType::Like => &self.like,
            InteractionType::Save => &self.save,
        }
    }

    /// Cold-start weights for a user with no trained row yet.
    pub fn seed(&self, user_id: &str, interaction_type: InteractionType) -> FeatureWeights {
        FeatureWeights {
            user_id: user_id.to_string(),
            interaction_type,
            schema_version: FEATURE_SCHEMA_VERSION,
            weights: self.get(interaction_type).clone(),
            last_updated: None,
        }
    }
}
