mod api;
mod config;
mod db;
mod engine;
mod error;
mod kafka;
mod models;
mod processor;

use config::AppConfig;
use engine::Dispatcher;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Rapid Dispatch alert service...");

    // Optional Postgres archive
    let archive_tx = if config.archive_db_enabled {
        let pool = db::init_pool(&config.database_url).await?;
        db::ensure_schema(&pool).await?;
        info!("Connected to archive database");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(db::run_archive_sink(pool, rx));
        Some(tx)
    } else {
        None
    };

    let rng = match config.simulation_seed {
        Some(seed) => {
            info!("Simulation seeded with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let dispatcher = Dispatcher::with_archive(config.engine_settings(), rng, archive_tx);
    dispatcher.start_simulation().await?;

    // Optional detector feed
    if config.kafka_enabled {
        let kafka_config = config.clone();
        let kafka_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = kafka::start_kafka_consumer(&kafka_config, kafka_dispatcher).await {
                error!("Kafka consumer stopped: {}", e);
            }
        });
    }

    api::serve(&config.http_bind, dispatcher.clone()).await?;

    dispatcher.shutdown().await;
    info!("Rapid Dispatch stopped");
    Ok(())
}
