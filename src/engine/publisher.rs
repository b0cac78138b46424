//! Per-consumer change detection for polling clients.
//!
//! Only the alert count and each alert's `(id, status)` feed the fingerprint.
//! The 1 Hz `timeRemaining` countdown is not part of it.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::models::Alert;

/// Hex SHA-256 over the significant content of an ordered alert set.
pub fn fingerprint(alerts: &[Alert]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((alerts.len() as u64).to_le_bytes());
    for alert in alerts {
        hasher.update(alert.id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(alert.status.as_str().as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

/// Remembers the fingerprint each consumer last saw.
#[derive(Debug, Default)]
pub struct ChangePublisher {
    last_seen: HashMap<String, String>,
}

impl ChangePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records what `consumer` is about to receive and reports whether it
    /// differs from its previous observation. A consumer's first poll is
    /// always a change.
    pub fn observe(&mut self, consumer: &str, alerts: &[Alert]) -> bool {
        let current = fingerprint(alerts);
        match self.last_seen.get_mut(consumer) {
            Some(previous) if *previous == current => false,
            Some(previous) => {
                *previous = current;
                true
            }
            None => {
                self.last_seen.insert(consumer.to_string(), current);
                true
            }
        }
    }

    /// Drops a consumer's channel; its next poll reports a change.
    pub fn forget(&mut self, consumer: &str) -> bool {
        self.last_seen.remove(consumer).is_some()
    }
}
