//! Title matching for duplicate detection.
//!
//! Recipe titles are short, so containment is a much stronger duplicate signal than raw token
//! overlap. Tiers are checked in order and the first one that applies wins:
//!
//! | Tier | Condition | Score |
//! |---|---|---|
//! | 1 | titles equal | 1.0 |
//! | 2 | existing contains new | 0.9 |
//! | 3 | new contains existing | 0.8 |
//! | 4 | new has 3+ chars and either contains the other | 0.7 |
//! | 5 | token Jaccard | 0.0 - 1.0 |
//!
//! The matcher is directional. `("pasta", "chicken pasta carbonara")` scores 0.9 while the
//! reverse scores 0.8.
use std::collections::HashSet;

pub const EXACT_SCORE: f64 = 1.0;
pub const EXISTING_CONTAINS_NEW_SCORE: f64 = 0.9;
pub const NEW_CONTAINS_EXISTING_SCORE: f64 = 0.8;
pub const SHORT_CONTAINMENT_SCORE: f64 = 0.7;
pub const SHORT_CONTAINMENT_MIN_LEN: usize = 3;

/// Scores two already normalized titles.
pub fn title_score(new: &str, existing: &str) -> f64 {
    if new == existing {
        return EXACT_SCORE;
    }

    if existing.contains(new) {
        return EXISTING_CONTAINS_NEW_SCORE;
    }

    if new.contains(existing) {
        return NEW_CONTAINS_EXISTING_SCORE;
    }

    // unreachable after the two checks above
    if new.len() >= SHORT_CONTAINMENT_MIN_LEN && (new.contains(existing) || existing.contains(new)) {
        return SHORT_CONTAINMENT_SCORE;
    }

    token_jaccard(new, existing)
}

fn token_jaccard(new: &str, existing: &str) -> f64 {
    let new_tokens: HashSet<&str> = new.split_whitespace().collect();
    let existing_tokens: HashSet<&str> = existing.split_whitespace().collect();

    let union = new_tokens.union(&existing_tokens).count();
    if union == 0 {
        return 0.0;
    }

    new_tokens.intersection(&existing_tokens).count() as f64 / union as f64
}
