use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use scoring::{Interaction, InteractionType};
use serde::de::DeserializeOwned;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    Ok(pb)
}

/// Distinct (user, type) pairs in a log, sorted so replays train in a stable order.
pub fn training_pairs(interactions: &[Interaction]) -> BTreeSet<(String, InteractionType)> {
    interactions
        .iter()
        .filter(|interaction| !interaction.user_id.trim().is_empty())
        .map(|interaction| (interaction.user_id.clone(), interaction.interaction_type))
        .collect()
}
