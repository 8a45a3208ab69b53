use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use taskboard::config::TaskboardConfig;
use taskboard::telemetry;

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Multi-tenant task board with ordered card relocation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to taskboard.toml (defaults to ./taskboard.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Move one card and print its final placement as JSON
    Relocate {
        /// Card to move
        #[arg(long)]
        card: Uuid,

        /// Acting user
        #[arg(long)]
        actor: Uuid,

        /// Destination board (the card's own board for a reorder)
        #[arg(long)]
        board: Uuid,

        /// Requested position; out-of-range values are clamped
        #[arg(long, allow_negative_numbers = true)]
        position: i32,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Verify every board's card positions are dense
    Check {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = TaskboardConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env()?;
    let _guard = telemetry::init_tracing(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Serve { port, db, dev } => {
            cmd::cmd_serve(&config, port, db, dev).await?;
        }
        Commands::Relocate {
            card,
            actor,
            board,
            position,
            db,
        } => {
            if let Some(db) = db {
                config.database.path = db;
            }
            cmd::cmd_relocate(&config, card, actor, board, position).await?;
        }
        Commands::Check { db } => {
            if let Some(db) = db {
                config.database.path = db;
            }
            cmd::cmd_check(&config).await?;
        }
    }

    Ok(())
}
