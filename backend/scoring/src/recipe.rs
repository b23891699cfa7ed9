use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScoringError},
    features::FeatureVector,
    normalize::normalize_title,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Snapshot of a stored recipe. Only read by the engine.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Recipe {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub ingredients: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_in_minutes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbohydrates: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<Season>,

    #[serde(default)]
    pub likes: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Relevance supplied by whatever produced the candidate, e.g. a search engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,

    /// Explicit snapshot that replaces derived features when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
}

impl Recipe {
    /// Rejects recipes that cannot be compared: a title with no letters left after
    /// normalization, or no non-blank ingredient.
    pub fn validate(&self) -> Result<()> {
        if normalize_title(&self.title).is_empty() {
            return Err(ScoringError::MissingTitle);
        }

        if self.ingredients.iter().all(|ingredient| ingredient.trim().is_empty()) {
            return Err(ScoringError::MissingIngredients);
        }

        Ok(())
    }
}
