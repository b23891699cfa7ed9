//! # Recipe Processing
//!
//! Operator tooling around the scoring service's store.
//!
//! ## Seed
//! Loads a JSON array of recipes into the candidate pool duplicate checks read from. Existing
//! recipes with the same id are replaced.
//!
//! ## Train
//! Replays an interaction export (JSON array) through the same path the training worker uses:
//! 1. Append every interaction to the log.
//! 2. Collect the distinct (user, interaction type) pairs.
//! 3. Retrain each pair once from its stored or default weights.
//!
//! Pairs below the minimum sample count are skipped and keep serving their current weights.
//!
//! ## Check
//! Runs a duplicate check for one recipe against the stored pool and prints the warning.
use std::{path::Path, sync::Arc};

use anyhow::{Result, bail};
use chrono::Utc;
use scoring::Recipe;
use server::{config::Config, state::State};

pub mod models;
pub mod utils;

use models::ExportedInteraction;
use utils::{progress_bar, read_json, training_pairs};

/// Opens the configured store. Training runs inline here, so the queue receiver is dropped.
pub async fn connect(config: Config) -> Result<Arc<State>> {
    let (state, _receiver) = State::new(config).await?;

    Ok(state)
}

pub async fn seed_recipes(state: &State, path: &Path) -> Result<usize> {
    let recipes: Vec<Recipe> = read_json(path)?;

    for recipe in &recipes {
        if recipe.id.trim().is_empty() {
            bail!("Recipe \"{}\" has no id", recipe.title);
        }

        recipe.validate()?;
    }

    state.store.upsert_recipes(&recipes).await?;
    println!("Seeded {} recipes", recipes.len());

    Ok(recipes.len())
}

pub async fn replay_interactions(state: &State, path: &Path) -> Result<(usize, usize)> {
    let exported: Vec<ExportedInteraction> = read_json(path)?;
    let now = Utc::now();
    let interactions: Vec<_> = exported
        .into_iter()
        .map(|row| row.into_interaction(now))
        .filter(|interaction| interaction.value.is_finite())
        .collect();

    println!("Loaded Interactions: {}", interactions.len());

    let pb = progress_bar(interactions.len())?;
    pb.set_message("Appending");

    for interaction in &interactions {
        state.store.append_interaction(interaction).await?;
        pb.inc(1);
    }

    pb.finish_with_message("Appended");

    let pairs = training_pairs(&interactions);
    let pb = progress_bar(pairs.len())?;

    let mut trained = 0;
    let mut skipped = 0;

    for (user_id, interaction_type) in pairs {
        pb.set_message(format!("Training {user_id} {interaction_type}"));

        match state.trainer.retrain(&user_id, interaction_type).await? {
            Some(_) => trained += 1,
            None => skipped += 1,
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!("\nTrained: {trained}");
    println!("Skipped: {skipped}");

    Ok((trained, skipped))
}

pub async fn check_recipe(state: &State, path: &Path) -> Result<bool> {
    let recipe: Recipe = read_json(path)?;
    let pool = state.store.recipes().await?;

    println!("Checking against {} recipes", pool.len());

    match state.config.duplicate_check.check(&recipe, &pool)? {
        Some(warning) => {
            println!("{}", serde_json::to_string_pretty(&warning)?);
            Ok(true)
        }
        None => {
            println!("No similar recipes found");
            Ok(false)
        }
    }
}
