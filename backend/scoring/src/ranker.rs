//! # Recommendation Ranking
//!
//! Personalized: every candidate gets a like score and a save score from the user's weights
//! (trained or default) and `final = like_blend · like + save_blend · save`.
//!
//! Fallback: when personal weights can't be used, `final = 0.7 · popularity + 0.3 · recency`
//! and the like/save scores are left out, so a caller can tell the two apart.
//!
//! Both paths sort descending by final score and keep input order on ties.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    features::{FeatureContext, extract_features, popularity},
    recipe::Recipe,
    similarity::check_weight,
    weights::FeatureWeights,
};

pub const DEFAULT_LIKE_BLEND: f64 = 0.6;
pub const DEFAULT_SAVE_BLEND: f64 = 0.4;

const FALLBACK_POPULARITY_SHARE: f64 = 0.7;
const FALLBACK_RECENCY_SHARE: f64 = 0.3;
const RECENCY_DECAY_DAYS: f64 = 30.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RankingBlend {
    pub like: f64,
    pub save: f64,
}

impl Default for RankingBlend {
    fn default() -> Self {
        Self {
            like: DEFAULT_LIKE_BLEND,
            save: DEFAULT_SAVE_BLEND,
        }
    }
}

impl RankingBlend {
    pub fn validate(&self) -> Result<()> {
        check_weight("like_blend", self.like)?;
        check_weight("save_blend", self.save)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RankedRecipe {
    pub recipe_id: String,
    pub title: String,
    pub final_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_score: Option<f64>,
}

impl RankedRecipe {
    pub fn is_personalized(&self) -> bool {
        self.like_score.is_some() && self.save_score.is_some()
    }
}

pub fn rank_personalized(
    candidates: &[Recipe],
    like: &FeatureWeights,
    save: &FeatureWeights,
    blend: &RankingBlend,
    context: &FeatureContext,
) -> Vec<RankedRecipe> {
    let ranked = candidates
        .iter()
        .map(|recipe| {
            let features = extract_features(recipe, context);
            let like_score = like.predict(&features);
            let save_score = save.predict(&features);

            RankedRecipe {
                recipe_id: recipe.id.clone(),
                title: recipe.title.clone(),
                final_score: blend.like * like_score + blend.save * save_score,
                like_score: Some(like_score),
                save_score: Some(save_score),
            }
        })
        .collect();

    sorted(ranked)
}

pub fn rank_fallback(candidates: &[Recipe], now: DateTime<Utc>) -> Vec<RankedRecipe> {
    let ranked = candidates
        .iter()
        .map(|recipe| RankedRecipe {
            recipe_id: recipe.id.clone(),
            title: recipe.title.clone(),
            final_score: FALLBACK_POPULARITY_SHARE * popularity(recipe.likes)
                + FALLBACK_RECENCY_SHARE * recency(recipe.created_at, now),
            like_score: None,
            save_score: None,
        })
        .collect();

    sorted(ranked)
}

/// 1 for a recipe created now, decaying exponentially with age. Unknown age is 0.
pub fn recency(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(created_at) = created_at else {
        return 0.0;
    };

    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;

    (-age_days / RECENCY_DECAY_DAYS).exp()
}

fn sorted(mut ranked: Vec<RankedRecipe>) -> Vec<RankedRecipe> {
    ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    ranked
}
