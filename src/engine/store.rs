use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::engine::lifecycle;
use crate::error::DispatchError;
use crate::models::{Alert, AlertStatus, DriverAssignment};

/// Result of a successful `update_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied { from: AlertStatus, to: AlertStatus },
    Unchanged { status: AlertStatus },
}

impl StatusChange {
    /// Status of the alert after the call.
    pub fn status(self) -> AlertStatus {
        match self {
            StatusChange::Applied { to, .. } => to,
            StatusChange::Unchanged { status } => status,
        }
    }
}

/// In-memory authoritative alert collection.
///
/// Active alerts keep insertion order. Archived alerts move to `history`;
/// their ids stay reserved for the lifetime of the store.
#[derive(Debug, Default)]
pub struct AlertStore {
    active: Vec<Alert>,
    history: Vec<Alert>,
    known_ids: HashSet<String>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, alert: Alert) -> Result<String, DispatchError> {
        if alert.status != AlertStatus::Waiting {
            return Err(DispatchError::InvalidRequest(format!(
                "new alert {} must start Waiting, got {}",
                alert.id, alert.status
            )));
        }
        if !self.known_ids.insert(alert.id.clone()) {
            return Err(DispatchError::DuplicateId(alert.id));
        }
        let id = alert.id.clone();
        self.active.push(alert);
        Ok(id)
    }

    pub fn list(&self) -> &[Alert] {
        &self.active
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.active.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Alert> {
        self.active.iter_mut().find(|a| a.id == id)
    }

    pub fn accepted(&self) -> Option<&Alert> {
        self.active.iter().find(|a| a.status == AlertStatus::Accepted)
    }

    /// Ids of Waiting alerts, oldest first.
    pub fn waiting_ids(&self) -> Vec<String> {
        self.active
            .iter()
            .filter(|a| a.is_waiting())
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn update_status(
        &mut self,
        id: &str,
        status: AlertStatus,
        driver: Option<DriverAssignment>,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, DispatchError> {
        let alert = self
            .get_mut(id)
            .ok_or_else(|| DispatchError::NotFound(id.to_string()))?;
        let from = alert.status;

        if from == AlertStatus::Rejected && status == AlertStatus::Rejected {
            return Ok(StatusChange::Unchanged { status: from });
        }
        if !lifecycle::can_transition(from, status) {
            return Err(DispatchError::InvalidTransition {
                id: id.to_string(),
                from,
                attempted: format!("move to {status}"),
            });
        }
        if status == AlertStatus::Accepted {
            let assignment = driver.ok_or_else(|| {
                DispatchError::InvalidRequest("accepting an alert requires driver details".to_string())
            })?;
            alert.assign(assignment, now);
        }

        alert.status = status;
        if status.is_terminal() {
            alert.closed_at = Some(now);
        }
        Ok(StatusChange::Applied { from, to: status })
    }

    /// Counts a Waiting alert down by one second. Returns the seconds left,
    /// or `None` if the alert is absent or no longer Waiting.
    pub fn tick(&mut self, id: &str) -> Option<u32> {
        let alert = self.get_mut(id).filter(|a| a.is_waiting())?;
        alert.time_remaining = alert.time_remaining.saturating_sub(1);
        Some(alert.time_remaining)
    }

    /// Moves an alert from the active set into history. Returns the alert on
    /// the first call only.
    pub fn archive(&mut self, id: &str) -> Option<Alert> {
        let idx = self.active.iter().position(|a| a.id == id)?;
        let alert = self.active.remove(idx);
        self.history.push(alert.clone());
        Some(alert)
    }

    /// Terminal alerts, archived or still in their grace window, most
    /// recently closed first.
    pub fn closed_recent_first(&self, limit: usize) -> Vec<Alert> {
        let mut closed: Vec<&Alert> = self
            .history
            .iter()
            .chain(self.active.iter())
            .filter(|a| a.status.is_terminal())
            .collect();
        closed.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        closed.into_iter().take(limit).cloned().collect()
    }
}
