use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farmstand::config::Config;
use farmstand::storage::LocalImageStore;
use farmstand::{db, ui, AppState};

#[derive(Parser, Debug)]
#[command(name = "farmstand")]
#[command(author, version, about = "A small marketplace for local farm produce", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "FARMSTAND_CONFIG", default_value = "farmstand.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Serve,
    /// Create the admin and farmer accounts, then exit
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.seed.uses_default_passwords() {
        tracing::warn!(
            "Seed roster uses the built-in demo passwords; set [seed] passwords for real deployments"
        );
    }

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    let db = db::init(&config.server.data_dir).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Seed => {
            let created = db::seed_roster(&db, &config.seed.roster()).await?;
            tracing::info!(created, "Seeding finished");
            Ok(())
        }
        Commands::Serve => serve(config, db).await,
    }
}

async fn serve(config: Config, db: db::DbPool) -> Result<()> {
    tracing::info!("Starting Farmstand v{}", env!("CARGO_PKG_VERSION"));

    if config.seed.on_startup {
        db::seed_roster(&db, &config.seed.roster()).await?;
    }

    let images = LocalImageStore::new(&config.storage)
        .await
        .context("Failed to prepare the upload directory")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, db, Arc::new(images)));
    let app = ui::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
