use color_eyre::{eyre::WrapErr, Result};
use datacompass::broadcast::{Broadcaster, LogBroadcaster, PusherBroadcaster, PusherConfig};
use datacompass::config::{AppConfig, StoreBackend, StoreConfig};
use datacompass::http::{self, AppState};
use datacompass::ingest::IngestCoordinator;
use datacompass::mqtt::MqttSubscriber;
use datacompass::persistence::{
    InMemoryReadingStore, PostgresClient, PostgresReadingStore, ReadingStore,
};
use datacompass::telemetry::RawRingBuffer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load().await?;

    let store = build_store(&config.store).await?;
    let broadcaster = build_broadcaster(&config.pusher)?;
    let buffer = Arc::new(RawRingBuffer::new(config.ingest.buffer_capacity));
    info!(capacity = buffer.capacity(), "raw payload buffer ready");
    let coordinator = Arc::new(IngestCoordinator::new(buffer, store, broadcaster));

    let shutdown = CancellationToken::new();

    let subscriber = MqttSubscriber::new(config.mqtt.clone(), Arc::clone(&coordinator));
    let subscriber_shutdown = shutdown.clone();
    let subscriber_handle = tokio::spawn(async move {
        if let Err(e) = subscriber.run(subscriber_shutdown).await {
            error!(error = %e, "MQTT subscriber failed to start");
        }
    });

    let app = http::router(AppState {
        coordinator: Arc::clone(&coordinator),
        recent_limit: config.ingest.recent_limit,
    });
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind HTTP listener on {addr}"))?;
    info!(%addr, "HTTP server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await
        .wrap_err("HTTP server error")?;

    shutdown.cancel();
    if let Err(e) = subscriber_handle.await {
        warn!(error = %e, "MQTT subscriber task panicked");
    }
    coordinator.drain().await;

    info!("datacompass stopped");
    Ok(())
}

fn setup() -> Result<()> {
    let _ = dotenvy::dotenv();
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn ReadingStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let client = PostgresClient::new(
                &config.host,
                config.port,
                &config.database,
                &config.username,
                &config.password,
                config.max_pool_size,
            )?;
            client
                .ping()
                .await
                .wrap_err_with(|| {
                    format!("Failed to reach PostgreSQL at {}:{}", config.host, config.port)
                })?;
            let store = PostgresReadingStore::new(client);
            store
                .ensure_schema()
                .await
                .wrap_err("Failed to prepare sensor_data table")?;
            info!(host = %config.host, database = %config.database, "using PostgreSQL store");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!(
                capacity = config.memory_capacity,
                "using in-memory store, readings are lost on exit"
            );
            Ok(Arc::new(InMemoryReadingStore::with_capacity(
                config.memory_capacity,
            )))
        }
    }
}

fn build_broadcaster(config: &PusherConfig) -> Result<Arc<dyn Broadcaster>> {
    if config.is_configured() {
        info!(cluster = %config.cluster, "broadcasting readings via Pusher");
        Ok(Arc::new(PusherBroadcaster::new(config.clone())?))
    } else {
        warn!("Pusher credentials not set, broadcasts are only logged");
        Ok(Arc::new(LogBroadcaster))
    }
}
