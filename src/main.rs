use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use roombook::compactor;
use roombook::config::Config;
use roombook::model::RecordType;
use roombook::registry::AppRegistry;
use roombook::store::IndexedStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    roombook::observability::init(config.metrics_port)?;

    let store = if config.in_memory {
        Arc::new(IndexedStore::in_memory())
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        Arc::new(IndexedStore::open(&config.log_path())?)
    };
    let registry = AppRegistry::new(store.clone(), &config);

    if store.is_durable() {
        let compactor_store = store.clone();
        let threshold = config.compact_threshold;
        let every = config.compact_interval;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_store, threshold, every).await;
        });
    }

    info!("roombook started");
    info!(
        "  storage: {}",
        if config.in_memory { "in-memory".to_string() } else { config.log_path().display().to_string() }
    );
    info!("  booking horizon: {} days", registry.bookings().max_booking_days());
    info!(
        "  records: {} rooms, {} bookings, {} users",
        store.count(RecordType::Room),
        store.count(RecordType::Booking),
        store.count(RecordType::User)
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    shutdown_signal().await?;
    info!("shutdown signal received");

    if store.is_durable() {
        match store.compact().await {
            Ok(()) => info!("final compaction done"),
            Err(e) => tracing::warn!("final compaction failed: {e}"),
        }
    }
    info!("roombook stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = ctrl_c => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }
    Ok(())
}
