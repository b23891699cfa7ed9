//! # Feature Schema
//!
//! Numeric encoding of a recipe used both as regression input for the weight learner and as the
//! scoring input for the ranker. Both sides go through [`FeatureVector`], so a feature the
//! learner never saw can't sneak into scoring.
//!
//! - Keys are fixed by [`Feature`] and versioned by [`FEATURE_SCHEMA_VERSION`]
//! - Missing keys read as 0
//! - Unknown keys and non-finite values are rejected on parse
//!
//! ## Derivation
//!
//! | Feature | Value |
//! |---|---|
//! | relevance | caller supplied, clamped to 0..1 |
//! | cuisine_type | 1 if cuisine is preferred by the user |
//! | popularity | ln(1 + likes) / ln(1001), clamped to 0..1 |
//! | season | 1 if the recipe lists the current season |
//! | calories | kcal / 1000 |
//! | protein, fat, carbohydrates | grams / 100 |
//! | difficulty | easy 0, medium 0.5, hard 1 |
//! | cook_time, prep_time | minutes / 120 |
//!
//! Everything except relevance and popularity is clamped to 0..2.
use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScoringError},
    recipe::{Difficulty, Recipe, Season},
};

pub const FEATURE_SCHEMA_VERSION: u32 = 1;
pub const FEATURE_COUNT: usize = 11;

const POPULARITY_SATURATION: f64 = 1000.0;
const CALORIE_SCALE: f64 = 1000.0;
const MACRO_SCALE: f64 = 100.0;
const MINUTE_SCALE: f64 = 120.0;
const FEATURE_CAP: f64 = 2.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Relevance,
    CuisineType,
    Popularity,
    Season,
    Calories,
    Protein,
    Fat,
    Carbohydrates,
    Difficulty,
    CookTime,
    PrepTime,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Relevance,
        Feature::CuisineType,
        Feature::Popularity,
        Feature::Season,
        Feature::Calories,
        Feature::Protein,
        Feature::Fat,
        Feature::Carbohydrates,
        Feature::Difficulty,
        Feature::CookTime,
        Feature::PrepTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Relevance => "relevance",
            Feature::CuisineType => "cuisine_type",
            Feature::Popularity => "popularity",
            Feature::Season => "season",
            Feature::Calories => "calories",
            Feature::Protein => "protein",
            Feature::Fat => "fat",
            Feature::Carbohydrates => "carbohydrates",
            Feature::Difficulty => "difficulty",
            Feature::CookTime => "cook_time",
            Feature::PrepTime => "prep_time",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| ScoringError::UnknownFeature(s.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct FeatureVector {
    values: BTreeMap<Feature, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values.get(&feature).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, feature: Feature, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(ScoringError::NonFiniteFeature {
                feature: feature.to_string(),
                value,
            });
        }

        self.values.insert(feature, value);
        Ok(())
    }

    /// Builder form of [`FeatureVector::set`] for values known to be finite.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        if value.is_finite() {
            self.values.insert(feature, value);
        }
        self
    }

    /// Every schema feature in schema order, missing ones as 0.
    pub fn dense(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|feature| self.get(feature))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(feature, value)| (*feature, *value))
    }
}

impl TryFrom<BTreeMap<String, f64>> for FeatureVector {
    type Error = ScoringError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        let mut vector = FeatureVector::new();

        for (name, value) in raw {
            vector.set(name.parse()?, value)?;
        }

        Ok(vector)
    }
}

impl From<FeatureVector> for BTreeMap<String, f64> {
    fn from(vector: FeatureVector) -> Self {
        vector
            .values
            .into_iter()
            .map(|(feature, value)| (feature.to_string(), value))
            .collect()
    }
}

/// Per-request inputs to derivation that are not part of the recipe.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    pub preferred_cuisines: Vec<String>,
    pub now: DateTime<Utc>,
}

impl FeatureContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            preferred_cuisines: Vec::new(),
            now,
        }
    }

    pub fn with_cuisines(mut self, cuisines: Vec<String>) -> Self {
        self.preferred_cuisines = cuisines;
        self
    }
}

/// Explicit snapshot on the recipe if present, otherwise derived from its content.
pub fn extract_features(recipe: &Recipe, context: &FeatureContext) -> FeatureVector {
    if let Some(features) = &recipe.features {
        return features.clone();
    }

    let prep = recipe.prep_minutes.map(f64::from);
    let cook = recipe.cook_minutes.map(f64::from).or_else(|| {
        recipe
            .ready_in_minutes
            .map(|ready| (f64::from(ready) - prep.unwrap_or(0.0)).max(0.0))
    });

    FeatureVector::new()
        .with(Feature::Relevance, unit(recipe.relevance.unwrap_or(0.0)))
        .with(Feature::CuisineType, cuisine_match(recipe, context))
        .with(Feature::Popularity, popularity(recipe.likes))
        .with(Feature::Season, in_season(recipe, context.now))
        .with(Feature::Calories, scaled(recipe.calories, CALORIE_SCALE))
        .with(Feature::Protein, scaled(recipe.protein, MACRO_SCALE))
        .with(Feature::Fat, scaled(recipe.fat, MACRO_SCALE))
        .with(Feature::Carbohydrates, scaled(recipe.carbohydrates, MACRO_SCALE))
        .with(Feature::Difficulty, difficulty(recipe.difficulty))
        .with(Feature::CookTime, scaled(cook, MINUTE_SCALE))
        .with(Feature::PrepTime, scaled(prep, MINUTE_SCALE))
}

pub fn popularity(likes: u32) -> f64 {
    unit(f64::from(likes).ln_1p() / POPULARITY_SATURATION.ln_1p())
}

pub fn season_of(date: DateTime<Utc>) -> Season {
    match date.month() {
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        9..=11 => Season::Autumn,
        _ => Season::Winter,
    }
}

fn cuisine_match(recipe: &Recipe, context: &FeatureContext) -> f64 {
    let Some(cuisine) = recipe.cuisine.as_deref().map(str::trim) else {
        return 0.0;
    };

    let preferred = context
        .preferred_cuisines
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(cuisine));

    if preferred { 1.0 } else { 0.0 }
}

fn in_season(recipe: &Recipe, now: DateTime<Utc>) -> f64 {
    if recipe.seasons.contains(&season_of(now)) {
        1.0
    } else {
        0.0
    }
}

fn difficulty(difficulty: Option<Difficulty>) -> f64 {
    match difficulty {
        Some(Difficulty::Easy) | None => 0.0,
        Some(Difficulty::Medium) => 0.5,
        Some(Difficulty::Hard) => 1.0,
    }
}

fn scaled(value: Option<f64>, scale: f64) -> f64 {
    value
        .filter(|v| v.is_finite())
        .map(|v| (v / scale).clamp(0.0, FEATURE_CAP))
        .unwrap_or(0.0)
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
