//! battle-tracker - interactive tabletop combat tracker

use std::path::PathBuf;

use anyhow::{Context, Result};
use battle_tracker::config::TrackerConfig;
use battle_tracker::console::{Console, Reply};
use battle_tracker::data::ReferenceData;
use battle_tracker::encounter::Encounter;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Track initiative, hit points, death saves and loot for one encounter
#[derive(Parser, Debug)]
#[command(name = "battle-tracker", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed the dice for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Use dying and death saves instead of instant death at 0 HP
    #[arg(long)]
    death_saves: bool,

    /// Status effect table (JSON)
    #[arg(long)]
    status_effects: Option<PathBuf>,

    /// Extra monster templates (JSON)
    #[arg(long)]
    monsters: Option<PathBuf>,

    /// Name pools by species (JSON)
    #[arg(long)]
    names: Option<PathBuf>,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing; the console owns stdout, diagnostics go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "battle_tracker=warn".into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = TrackerConfig::load(args.config.as_deref())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.death_saves {
        config.death_saves_enabled = true;
    }
    if args.status_effects.is_some() {
        config.data.status_effects = args.status_effects;
    }
    if args.monsters.is_some() {
        config.data.monsters = args.monsters;
    }
    if args.names.is_some() {
        config.data.names = args.names;
    }

    let data = ReferenceData::load(&config.data).context("failed to load reference data")?;
    let mut console = Console::new(Encounter::new(&config, data));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"battle-tracker ready. Type help for commands.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        match console.execute(&line) {
            Reply::Output(text) => {
                if !text.is_empty() {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
            Reply::Quit => break,
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    info!(
        "Encounter ended after {} rounds, {} XP pooled",
        console.encounter().round(),
        console.encounter().xp_pool()
    );
    Ok(())
}
