use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{EngineSettings, SimulationSettings};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http_bind: String,
    pub log_level: String,
    pub alert_countdown_secs: u32,
    pub alert_grace_period_secs: u64,
    pub lock_timeout_ms: u64,
    pub poll_cadence_secs: u64,
    pub simulation_enabled: bool,
    pub simulation_interval_secs: u64,
    pub simulation_chance: f64,
    pub simulation_cooldown_secs: u64,
    pub simulation_max_waiting: usize,
    pub simulation_seed: Option<u64>,
    pub kafka_enabled: bool,
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub archive_db_enabled: bool,
    pub database_url: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset or unparsable values fall back to `default`.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// A probability in [0, 1]. Non-finite values fall back to `default`.
fn chance_or(key: &str, default: f64) -> f64 {
    let chance = parse_or(key, default);
    if chance.is_finite() {
        chance.clamp(0.0, 1.0)
    } else {
        default
    }
}

fn flag_or(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let http_bind = var_or("HTTP_BIND", "0.0.0.0:8080");
        let log_level = var_or("LOG_LEVEL", "info");

        let alert_countdown_secs = parse_or("ALERT_COUNTDOWN_SECS", 30);
        let alert_grace_period_secs = parse_or("ALERT_GRACE_PERIOD_SECS", 60);
        let lock_timeout_ms = parse_or("LOCK_TIMEOUT_MS", 2000);
        let poll_cadence_secs = parse_or("POLL_CADENCE_SECS", 5u64).max(1);

        let simulation_enabled = flag_or("SIMULATION_ENABLED", true);
        let simulation_interval_secs = parse_or("SIMULATION_INTERVAL_SECS", 120);
        let simulation_chance = chance_or("SIMULATION_CHANCE", 0.2);
        let simulation_cooldown_secs = parse_or("SIMULATION_COOLDOWN_SECS", 15);
        let simulation_max_waiting = parse_or("SIMULATION_MAX_WAITING", 3);
        let simulation_seed = match env::var("SIMULATION_SEED") {
            Ok(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("SIMULATION_SEED must be an unsigned integer, got '{}'", v))?,
            ),
            Err(_) => None,
        };

        let kafka_enabled = flag_or("KAFKA_ENABLED", false);
        let kafka_bootstrap_servers = var_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092");
        let kafka_topic = var_or("KAFKA_TOPIC", "accident-detections");
        let kafka_group_id = var_or("KAFKA_GROUP_ID", "rapid-dispatch");
        let kafka_auto_offset_reset = var_or("KAFKA_AUTO_OFFSET_RESET", "latest");
        let kafka_sasl_mechanism = var_or("KAFKA_SASL_MECHANISM", "SCRAM-SHA-256");
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol = var_or("KAFKA_SECURITY_PROTOCOL", "SASL_PLAINTEXT");
        let kafka_max_retries = parse_or("KAFKA_MAX_RETRIES", 5);
        let kafka_circuit_breaker_cooldown = parse_or("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300);

        let archive_db_enabled = flag_or("ARCHIVE_DB_ENABLED", false);
        let db_host = var_or("DB_HOST", "localhost");
        let db_port = var_or("DB_PORT", "5432");
        let db_name = var_or("DB_DATABASE", "rapid_dispatch");
        let db_user = var_or("DB_USER", "dispatch");
        let db_pwd = var_or("DB_PWD", "dispatch");

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        Ok(Self {
            http_bind,
            log_level,
            alert_countdown_secs,
            alert_grace_period_secs,
            lock_timeout_ms,
            poll_cadence_secs,
            simulation_enabled,
            simulation_interval_secs,
            simulation_chance,
            simulation_cooldown_secs,
            simulation_max_waiting,
            simulation_seed,
            kafka_enabled,
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            archive_db_enabled,
            database_url,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            countdown_secs: self.alert_countdown_secs,
            tick: Duration::from_secs(1),
            grace_period: Duration::from_secs(self.alert_grace_period_secs),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            simulation_cadence: Duration::from_secs(self.poll_cadence_secs),
            simulation: SimulationSettings {
                enabled: self.simulation_enabled,
                interval: Duration::from_secs(self.simulation_interval_secs),
                chance: self.simulation_chance,
                cooldown: Duration::from_secs(self.simulation_cooldown_secs),
                max_waiting: self.simulation_max_waiting,
            },
        }
    }
}
