use chrono::{DateTime, Utc};
use scoring::{FeatureVector, Interaction, InteractionType};
use serde::Deserialize;

/// One row of an interaction export. Rows without a timestamp are stamped at import time.
#[derive(Deserialize, Debug, Clone)]
pub struct ExportedInteraction {
    pub user_id: String,
    pub recipe_id: String,
    pub interaction_type: InteractionType,
    pub value: f64,

    #[serde(default)]
    pub features: FeatureVector,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ExportedInteraction {
    pub fn into_interaction(self, now: DateTime<Utc>) -> Interaction {
        Interaction {
            user_id: self.user_id,
            recipe_id: self.recipe_id,
            interaction_type: self.interaction_type,
            value: self.value,
            features: self.features,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}
