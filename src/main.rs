use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use newshub::api::{build_router, AppState};
use newshub::config::Config;
use newshub::feed::{build_http_client, FeedFetcher};
use newshub::service::ReadCascade;
use newshub::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(name = "newshub", about = "Personal news aggregation server")]
struct Args {
    /// TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "newshub.toml")]
    config: PathBuf,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Listen address, overrides `listen_addr` from the config file
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let db_path = PathBuf::from(&config.database_path);
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        tracing::info!(path = %db_path.display(), "Database reset");
    }

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!(
                "Database '{}' is locked by another process. Please close it and try again.",
                config.database_path
            );
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    let client = build_http_client().context("Failed to build HTTP client")?;
    let fetcher = FeedFetcher::new(db.clone(), client, &config);
    let (cascade, _cascade_worker) = ReadCascade::spawn(db.clone(), config.cascade_queue_capacity);

    if config.refresh_interval_minutes > 0 {
        let period = Duration::from_secs(config.refresh_interval_minutes * 60);
        tokio::spawn(refresh_loop(db.clone(), fetcher.clone(), period));
    }

    let app = build_router(AppState::new(db, &config, fetcher, cascade));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down");
    Ok(())
}

/// Refresh every subscribed feed once per `period`, starting immediately.
async fn refresh_loop(db: Database, fetcher: FeedFetcher, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match db.get_all_feeds().await {
            Ok(feeds) if feeds.is_empty() => {}
            Ok(feeds) => {
                fetcher.refresh_all(feeds).await;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load feeds for refresh"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
