use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Recipe is missing a title")]
    MissingTitle,

    #[error("Recipe is missing ingredients")]
    MissingIngredients,

    #[error("Invalid weight for {name}: {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Non-finite value for feature {feature}: {value}")]
    NonFiniteFeature { feature: String, value: f64 },

    #[error("Not enough interactions to train: {samples} of {required}")]
    InsufficientData { samples: usize, required: usize },

    #[error("Training diverged, keeping current weights")]
    Diverged,

    #[error("Default weights misconfigured: {0}")]
    DefaultWeights(String),
}

pub type Result<T> = std::result::Result<T, ScoringError>;
