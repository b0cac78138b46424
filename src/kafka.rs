use crate::config::AppConfig;
use crate::engine::Dispatcher;
use crate::processor::detection_processor;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Hands one Kafka payload to the detection processor on its own task.
/// Empty payloads are skipped.
fn dispatch_payload(dispatcher: &Dispatcher, payload: Option<&[u8]>) -> Option<JoinHandle<()>> {
    let Some(payload) = payload else {
        warn!("Received empty payload from Kafka");
        return None;
    };

    let dispatcher = dispatcher.clone();
    let payload = payload.to_vec();
    Some(tokio::spawn(async move {
        if let Err(e) = detection_processor::process_detection(&dispatcher, &payload).await {
            error!("Error processing detection: {}", e);
        }
    }))
}

/// Consumes detector messages from Kafka, with SASL authentication and a
/// circuit breaker around broker failures.
pub async fn start_kafka_consumer(config: &AppConfig, dispatcher: Dispatcher) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        .set("security.protocol", &config.kafka_security_protocol);
    if !config.kafka_username.is_empty() {
        client_config
            .set("sasl.mechanism", &config.kafka_sasl_mechanism)
            .set("sasl.username", &config.kafka_username)
            .set("sasl.password", &config.kafka_password);
    }

    let consumer: StreamConsumer = client_config.create()?;

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        match consumer.recv().await {
            Ok(m) => {
                consecutive_failures = 0;
                dispatch_payload(&dispatcher, m.payload());
            }
            Err(e) => {
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                consecutive_failures += 1;
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
