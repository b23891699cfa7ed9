use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScoringError},
    ingredients::ingredient_overlap,
    normalize::normalize_title,
    recipe::Recipe,
    title::title_score,
};

pub const DEFAULT_TITLE_WEIGHT: f64 = 0.4;
pub const DEFAULT_INGREDIENTS_WEIGHT: f64 = 0.6;

/// Blend of title and ingredient similarity. The weights conventionally sum to 1 but don't
/// have to, a score is then bounded by their sum instead.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub title_weight: f64,
    pub ingredients_weight: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            title_weight: DEFAULT_TITLE_WEIGHT,
            ingredients_weight: DEFAULT_INGREDIENTS_WEIGHT,
        }
    }
}

impl SimilarityWeights {
    pub fn validate(&self) -> Result<()> {
        check_weight("title_weight", self.title_weight)?;
        check_weight("ingredients_weight", self.ingredients_weight)
    }
}

pub(crate) fn check_weight(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScoringError::InvalidWeight {
            name: name.to_string(),
            value,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityFeature {
    Title,
    Ingredients,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Contribution {
    pub feature: SimilarityFeature,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl Contribution {
    fn new(feature: SimilarityFeature, value: f64, weight: f64) -> Self {
        Self {
            feature,
            value,
            weight,
            contribution: value * weight,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimilarityScore {
    pub score: f64,
    pub title_score: f64,
    pub ingredients_score: f64,
    pub breakdown: Vec<Contribution>,
}

/// Scores `existing` against `new`. Both recipes must have a usable title and at least one
/// ingredient so a malformed recipe never passes for a merely dissimilar one.
pub fn similarity(
    new: &Recipe,
    existing: &Recipe,
    weights: &SimilarityWeights,
) -> Result<SimilarityScore> {
    weights.validate()?;
    new.validate()?;
    existing.validate()?;

    Ok(score_unchecked(new, existing, weights))
}

pub(crate) fn score_unchecked(
    new: &Recipe,
    existing: &Recipe,
    weights: &SimilarityWeights,
) -> SimilarityScore {
    let title_score = title_score(&normalize_title(&new.title), &normalize_title(&existing.title));
    let ingredients_score = ingredient_overlap(&new.ingredients, &existing.ingredients);

    let breakdown = vec![
        Contribution::new(SimilarityFeature::Title, title_score, weights.title_weight),
        Contribution::new(
            SimilarityFeature::Ingredients,
            ingredients_score,
            weights.ingredients_weight,
        ),
    ];

    SimilarityScore {
        score: breakdown.iter().map(|c| c.contribution).sum(),
        title_score,
        ingredients_score,
        breakdown,
    }
}
