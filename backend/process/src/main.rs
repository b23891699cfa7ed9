use std::path::PathBuf;

use clap::{Parser, Subcommand};
use server::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a JSON array of recipes into the duplicate-check pool
    Seed { path: PathBuf },

    /// Replay a JSON array of interactions and retrain every affected user
    Train { path: PathBuf },

    /// Check one recipe JSON against the stored pool
    Check { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let state = process::connect(Config::load()?).await?;

    match args.command {
        Command::Seed { path } => {
            process::seed_recipes(&state, &path).await?;
        }
        Command::Train { path } => {
            process::replay_interactions(&state, &path).await?;
        }
        Command::Check { path } => {
            process::check_recipe(&state, &path).await?;
        }
    }

    Ok(())
}
