//! # Duplicate Detection
//!
//! Run on recipe creation or edit, before the recipe is committed. Every candidate in the pool
//! is scored against the new recipe and the ones at or above the threshold come back as a
//! single warning, closest match first.
//!
//! - The new recipe must be well formed, otherwise an error is returned instead of "no matches"
//! - Malformed candidates already in storage are skipped
//! - A candidate with the same id as the new recipe is the recipe being edited and is skipped
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Result, ScoringError},
    recipe::Recipe,
    similarity::{Contribution, SimilarityWeights, score_unchecked},
};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DuplicateCheck {
    pub weights: SimilarityWeights,
    pub threshold: f64,
}

impl Default for DuplicateCheck {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    SimilarRecipe,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub recipe_id: String,
    pub title: String,
    pub score: f64,
    pub title_score: f64,
    pub ingredients_score: f64,
    pub breakdown: Vec<Contribution>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DuplicateWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    pub matches: Vec<SimilarityMatch>,
}

impl DuplicateCheck {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ScoringError::InvalidWeight {
                name: "threshold".to_string(),
                value: self.threshold,
            });
        }

        Ok(())
    }

    /// `None` means the pool holds nothing at or above the threshold.
    pub fn check(&self, new: &Recipe, candidates: &[Recipe]) -> Result<Option<DuplicateWarning>> {
        self.validate()?;
        new.validate()?;

        let mut matches: Vec<SimilarityMatch> = candidates
            .iter()
            .filter(|candidate| new.id.is_empty() || candidate.id != new.id)
            .filter(|candidate| match candidate.validate() {
                Ok(()) => true,
                Err(e) => {
                    debug!("Skipping candidate {}: {e}", candidate.id);
                    false
                }
            })
            .filter_map(|candidate| {
                let result = score_unchecked(new, candidate, &self.weights);

                (result.score >= self.threshold).then(|| SimilarityMatch {
                    recipe_id: candidate.id.clone(),
                    title: candidate.title.clone(),
                    score: result.score,
                    title_score: result.title_score,
                    ingredients_score: result.ingredients_score,
                    breakdown: result.breakdown,
                })
            })
            .collect();

        if matches.is_empty() {
            return Ok(None);
        }

        // stable, so equal scores keep pool order
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(Some(DuplicateWarning {
            kind: WarningKind::SimilarRecipe,
            message: warning_message(&matches),
            matches,
        }))
    }
}

fn warning_message(matches: &[SimilarityMatch]) -> String {
    let closest = &matches[0];
    let percent = (closest.score * 100.0).round();

    match matches.len() {
        1 => format!(
            "Found a similar recipe: \"{}\" ({percent}% match)",
            closest.title
        ),
        n => format!(
            "Found {n} similar recipes, the closest is \"{}\" ({percent}% match)",
            closest.title
        ),
    }
}
