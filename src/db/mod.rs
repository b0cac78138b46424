use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::models::Alert;

pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(queries::CREATE_ALERT_HISTORY)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_alert(pool: &DbPool, alert: &Alert) -> Result<()> {
    sqlx::query(queries::INSERT_ALERT_HISTORY)
        .bind(&alert.id)
        .bind(alert.status.as_str())
        .bind(&alert.location)
        .bind(alert.coordinates.lat)
        .bind(alert.coordinates.lng)
        .bind(alert.source.as_str())
        .bind(alert.confidence_score)
        .bind(&alert.driver)
        .bind(&alert.driver_name)
        .bind(&alert.contact_no)
        .bind(&alert.response_time)
        .bind(&alert.accident_clip)
        .bind(alert.created_at)
        .bind(alert.accepted_at)
        .bind(alert.closed_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Persists archived alerts until the engine drops its sender. Failed
/// inserts are logged; the in-memory history stays authoritative.
pub async fn run_archive_sink(pool: DbPool, mut rx: mpsc::UnboundedReceiver<Alert>) {
    info!("Archive sink started");
    while let Some(alert) = rx.recv().await {
        if let Err(e) = insert_alert(&pool, &alert).await {
            error!("Failed to persist archived alert {}: {}", alert.id, e);
        }
    }
    info!("Archive sink stopped");
}
