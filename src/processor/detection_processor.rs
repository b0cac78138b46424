use crate::engine::Dispatcher;
use crate::error::DispatchError;
use crate::models::message::DetectionMessage;
use tracing::{info, warn};

/// Turns one detector payload into a Waiting alert.
///
/// Malformed or unusable payloads are logged and skipped. Only lock
/// contention is surfaced to the caller.
pub async fn process_detection(dispatcher: &Dispatcher, payload: &[u8]) -> anyhow::Result<()> {
    // 1. Parse JSON
    let message: DetectionMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse detection: {}", e);
            return Ok(());
        }
    };

    // 2. Extract alert
    let reference = message.alert_id.clone().unwrap_or_else(|| "<unnamed>".to_string());
    let new_alert = match message.into_new_alert() {
        Some(a) => a,
        None => {
            warn!("Detection {} has no usable coordinates, skipping", reference);
            return Ok(());
        }
    };

    // 3. Admit
    match dispatcher.submit_alert(new_alert).await {
        Ok(id) => {
            info!("Detection {} admitted as alert {}", reference, id);
            Ok(())
        }
        Err(DispatchError::ConcurrencyTimeout) => Err(DispatchError::ConcurrencyTimeout.into()),
        Err(e) => {
            warn!("Detection {} not admitted: {}", reference, e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineSettings, SimulationSettings};
    use crate::models::{AlertSource, AlertStatus};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dispatcher() -> Dispatcher {
        let settings = EngineSettings {
            simulation: SimulationSettings {
                enabled: false,
                ..SimulationSettings::default()
            },
            ..EngineSettings::default()
        };
        Dispatcher::new(settings, StdRng::seed_from_u64(9))
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_becomes_waiting_alert() {
        let d = dispatcher();
        let payload = br#"{
            "alert_id": "CAM-7-0042",
            "location": "Cavalry Ground Lahore",
            "coordinates_lat": "31.5102",
            "coordinates_lng": 74.3581,
            "confidence_score": 0.93,
            "video_url": "/clips/cam7-0042.mp4"
        }"#;
        process_detection(&d, payload).await.unwrap();

        let alert = d.alert("CAM-7-0042").await.unwrap().unwrap();
        assert_eq!(alert.status, AlertStatus::Waiting);
        assert_eq!(alert.source, AlertSource::Detection);
        assert_eq!(alert.accident_clip.as_deref(), Some("/clips/cam7-0042.mp4"));
        assert_eq!(alert.confidence_score, Some(0.93));
        d.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_payloads_are_skipped() {
        let d = dispatcher();
        process_detection(&d, b"not json").await.unwrap();
        process_detection(&d, br#"{"alert_id": "X", "coordinates_lat": 31.5}"#)
            .await
            .unwrap();
        assert!(d.poll("test").await.unwrap().alerts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_detection_is_ignored() {
        let d = dispatcher();
        let payload = br#"{"alert_id": "CAM-1", "coordinates_lat": 31.5, "coordinates_lng": 74.3}"#;
        process_detection(&d, payload).await.unwrap();
        process_detection(&d, payload).await.unwrap();
        assert_eq!(d.poll("test").await.unwrap().alerts.len(), 1);
        d.shutdown().await;
    }
}
