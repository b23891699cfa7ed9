//! # Recipe Scoring
//!
//! Pure scoring core behind the recipe service. Nothing in here touches storage or the network,
//! every function is safe to call from any number of requests at once.
//!
//! ## Duplicate detection
//! - [`normalize`]: title canonicalization and ingredient sets
//! - [`title`]: tiered title matching
//! - [`ingredients`]: ingredient Jaccard overlap
//! - [`similarity`]: weighted title + ingredient score with a breakdown
//! - [`duplicate`]: scans a candidate pool and builds the duplicate warning
//!
//! ## Recommendations
//! - [`features`]: versioned feature schema and derivation from recipes
//! - [`weights`]: per-user weights and the global default table
//! - [`learner`]: online linear regression over logged interactions
//! - [`ranker`]: personalized and fallback ranking
pub mod duplicate;
pub mod error;
pub mod features;
pub mod ingredients;
pub mod interaction;
pub mod learner;
pub mod normalize;
pub mod ranker;
pub mod recipe;
pub mod similarity;
pub mod title;
pub mod weights;

pub use duplicate::{DuplicateCheck, DuplicateWarning, SimilarityMatch};
pub use error::ScoringError;
pub use features::{Feature, FeatureContext, FeatureVector};
pub use interaction::{Interaction, InteractionType};
pub use learner::{TrainingMetrics, TrainingOutcome, TrainingParams, WeightLearner};
pub use ranker::{RankedRecipe, RankingBlend};
pub use recipe::Recipe;
pub use similarity::{SimilarityScore, SimilarityWeights};
pub use weights::{DefaultWeights, FeatureWeights};
