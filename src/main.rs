use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use skylog::config::{DatabaseArgs, ReconcileArgs};

mod commands;

#[derive(Parser)]
#[command(name = "skylog")]
#[command(about = "Track the aircraft seen by a local ADS-B receiver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the receiver and reconcile visits until interrupted
    Run {
        #[command(flatten)]
        database: DatabaseArgs,

        #[command(flatten)]
        reconcile: ReconcileArgs,
    },
    /// Apply pending database migrations and exit
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,
    },
}

#[tokio::main]
async fn main() {
    // ../.env takes precedence when running from a checkout subdirectory
    if dotenvy::from_filename("../.env").is_err() {
        dotenvy::dotenv().ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            database,
            reconcile,
        } => commands::handle_run(database, reconcile).await,
        Commands::Migrate { database } => commands::handle_migrate(database).await,
    }
}
