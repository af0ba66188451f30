use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use seatwatch_core::config::AccessMode;
use seatwatch_core::{
    AllowList, AvailabilityOracle, Notifier, PgAllowList, PgRequestStore, RequestStore,
    SeatWatchConfig, StaticAllowList, StationCatalog, TelegramNotifier,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use seatwatch_server::conversation::ConversationService;
use seatwatch_server::http::{start_http_server, HttpState};
use seatwatch_server::subsystems::monitor::{run_monitor_loop, MonitorContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "seatwatch.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match SeatWatchConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG overrides service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match seatwatch_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match seatwatch_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match StationCatalog::load(&config.stations.path) {
            Ok(c) => println!("✅ Station catalog: {} stations", c.len()),
            Err(e) => {
                println!("❌ Station catalog failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ SeatWatch health check passed");
        return Ok(());
    }

    seatwatch_core::db::run_migrations(&pool).await?;

    let stations = Arc::new(StationCatalog::load(&config.stations.path)?);
    let store: Arc<dyn RequestStore> = Arc::new(PgRequestStore::new(pool.clone()));
    let oracle: Arc<dyn AvailabilityOracle> =
        Arc::from(seatwatch_core::oracle::create_oracle(&config.oracle)?);
    let oracle_timeout = Duration::from_secs(config.oracle.timeout_seconds);
    let local_offset = config.service.local_offset()?;

    let allow_list: Arc<dyn AllowList> = match config.access.mode {
        AccessMode::Database => Arc::new(PgAllowList::new(pool.clone())),
        AccessMode::Static => {
            tracing::info!(
                "Using static allow-list ({} users)",
                config.access.allowed_users.len()
            );
            Arc::new(StaticAllowList::new(config.access.allowed_users.clone()))
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(&config.telegram)?);

    let conversation = Arc::new(ConversationService::new(
        store.clone(),
        allow_list,
        stations,
        oracle.clone(),
        oracle_timeout,
    )
    .with_local_offset(local_offset));
    let monitor = Arc::new(MonitorContext::new(
        store.clone(),
        oracle,
        notifier,
        oracle_timeout,
        config.monitor.booking_url.clone(),
    ));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Background seat monitor
    let mut monitor_task = None;
    if config.monitor.enabled {
        monitor_task = Some(tokio::spawn(run_monitor_loop(
            monitor.clone(),
            config.monitor.interval_minutes,
            tx.subscribe(),
        )));
    } else {
        tracing::warn!("Seat monitor disabled by config");
    }

    if config.http.enabled {
        let state = Arc::new(HttpState {
            conversation,
            monitor,
            store,
        });
        start_http_server(state, &config.http, tx.subscribe()).await?;
    } else {
        let mut shutdown = tx.subscribe();
        let _ = shutdown.recv().await;
    }

    if let Some(task) = monitor_task {
        let _ = task.await;
    }

    Ok(())
}
