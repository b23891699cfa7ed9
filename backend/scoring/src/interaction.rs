use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Like,
    Save,
}

impl InteractionType {
    pub const ALL: [InteractionType; 3] = [
        InteractionType::View,
        InteractionType::Like,
        InteractionType::Save,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Like => "like",
            InteractionType::Save => "save",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InteractionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown interaction type {s}"))
    }
}

/// One logged user action. Append-only, the learner only reads these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Interaction {
    pub user_id: String,
    pub recipe_id: String,
    pub interaction_type: InteractionType,
    /// Target for the learner: 1/0 for likes and saves, graded engagement for views.
    pub value: f64,
    pub features: FeatureVector,
    pub timestamp: DateTime<Utc>,
}
