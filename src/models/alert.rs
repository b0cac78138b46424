use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds a fresh alert waits for an operator before it is auto-rejected.
pub const INITIAL_TIME_REMAINING: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    Waiting,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl AlertStatus {
    /// Rejected, Completed and Cancelled have no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AlertStatus::Rejected | AlertStatus::Completed | AlertStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Waiting => "Waiting",
            AlertStatus::Accepted => "Accepted",
            AlertStatus::Rejected => "Rejected",
            AlertStatus::Completed => "Completed",
            AlertStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Where an alert came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Simulation,
    Detection,
    #[default]
    Manual,
}

impl AlertSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSource::Simulation => "simulation",
            AlertSource::Detection => "detection",
            AlertSource::Manual => "manual",
        }
    }
}

/// Driver details recorded when an alert is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAssignment {
    pub driver: String,
    pub driver_name: String,
    #[serde(default)]
    pub contact_no: Option<String>,
}

/// An accident alert awaiting or undergoing dispatch.
///
/// Serializes through [`AlertView`], which hides `timeRemaining` once the
/// alert has left `Waiting`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "AlertView")]
pub struct Alert {
    pub id: String,
    pub status: AlertStatus,
    pub location: String,
    pub coordinates: Coordinates,
    pub time: String,
    pub date: String,
    pub time_remaining: u32,
    pub driver: Option<String>,
    pub driver_name: Option<String>,
    pub contact_no: Option<String>,
    pub response_time: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accident_clip: Option<String>,
    pub source: AlertSource,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_waiting(&self) -> bool {
        self.status == AlertStatus::Waiting
    }

    /// Records the driver and the elapsed time between creation and acceptance.
    pub(crate) fn assign(&mut self, assignment: DriverAssignment, now: DateTime<Utc>) {
        let elapsed = (now - self.created_at).num_seconds().max(0);
        self.driver = Some(assignment.driver);
        self.driver_name = Some(assignment.driver_name);
        self.contact_no = assignment.contact_no;
        self.response_time = Some(format_response_time(elapsed));
        self.accepted_at = Some(now);
    }
}

fn format_response_time(seconds: i64) -> String {
    format!("{:.1} mins", seconds as f64 / 60.0)
}

/// Wire form of an [`Alert`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    pub id: String,
    pub status: AlertStatus,
    pub location: String,
    pub coordinates: Coordinates,
    pub time: String,
    pub date: String,
    pub time_remaining: Option<u32>,
    pub driver: Option<String>,
    pub driver_name: Option<String>,
    pub contact_no: Option<String>,
    pub response_time: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accident_clip: Option<String>,
    pub source: AlertSource,
    pub confidence_score: Option<f64>,
}

impl From<Alert> for AlertView {
    fn from(alert: Alert) -> Self {
        let time_remaining = alert.is_waiting().then_some(alert.time_remaining);
        Self {
            id: alert.id,
            status: alert.status,
            location: alert.location,
            coordinates: alert.coordinates,
            time: alert.time,
            date: alert.date,
            time_remaining,
            driver: alert.driver,
            driver_name: alert.driver_name,
            contact_no: alert.contact_no,
            response_time: alert.response_time,
            accepted_at: alert.accepted_at,
            accident_clip: alert.accident_clip,
            source: alert.source,
            confidence_score: alert.confidence_score,
        }
    }
}

/// A request to admit a new alert, from the simulator, a detector or an operator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    #[serde(default)]
    pub id: Option<String>,
    pub location: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub accident_clip: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub source: AlertSource,
}

impl NewAlert {
    /// Builds the Waiting alert. Missing time and date are stamped from the local clock.
    pub fn into_alert(self, id: String, countdown: u32) -> Alert {
        let local = Local::now();
        Alert {
            id,
            status: AlertStatus::Waiting,
            location: self.location,
            coordinates: self.coordinates,
            time: self.time.unwrap_or_else(|| clock_time(&local)),
            date: self
                .date
                .unwrap_or_else(|| local.format("%Y-%m-%d").to_string()),
            time_remaining: countdown,
            driver: None,
            driver_name: None,
            contact_no: None,
            response_time: None,
            accepted_at: None,
            accident_clip: self.accident_clip,
            source: self.source,
            confidence_score: self.confidence_score,
            created_at: Utc::now(),
            closed_at: None,
        }
    }
}

/// 12-hour clock string, e.g. `3:07 PM`.
pub fn clock_time(at: &DateTime<Local>) -> String {
    at.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Alert {
        NewAlert {
            id: None,
            location: "Gulberg III Lahore".to_string(),
            coordinates: Coordinates { lat: 31.51, lng: 74.34 },
            time: Some("3:07 PM".to_string()),
            date: Some("Today".to_string()),
            accident_clip: Some("/accident2.mp4".to_string()),
            confidence_score: None,
            source: AlertSource::Simulation,
        }
        .into_alert("#22446".to_string(), INITIAL_TIME_REMAINING)
    }

    #[test]
    fn test_new_alert_starts_waiting_with_full_countdown() {
        let alert = sample();
        assert_eq!(alert.status, AlertStatus::Waiting);
        assert_eq!(alert.time_remaining, 30);
        assert!(alert.driver.is_none());
        assert!(alert.accepted_at.is_none());
    }

    #[test]
    fn test_serialized_form_uses_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], "#22446");
        assert_eq!(json["status"], "Waiting");
        assert_eq!(json["timeRemaining"], 30);
        assert_eq!(json["coordinates"]["lat"], 31.51);
        assert_eq!(json["accidentClip"], "/accident2.mp4");
        assert!(json["driverName"].is_null());
        assert!(json["responseTime"].is_null());
    }

    #[test]
    fn test_time_remaining_hidden_after_leaving_waiting() {
        let mut alert = sample();
        alert.status = AlertStatus::Rejected;
        let json = serde_json::to_value(alert).unwrap();
        assert!(json["timeRemaining"].is_null());
    }

    #[test]
    fn test_assign_records_driver_and_response_time() {
        let mut alert = sample();
        let now = alert.created_at + chrono::Duration::seconds(90);
        alert.assign(
            DriverAssignment {
                driver: "D-7".to_string(),
                driver_name: "Ali Raza".to_string(),
                contact_no: Some("0300-1234567".to_string()),
            },
            now,
        );
        assert_eq!(alert.driver.as_deref(), Some("D-7"));
        assert_eq!(alert.response_time.as_deref(), Some("1.5 mins"));
        assert_eq!(alert.accepted_at, Some(now));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!AlertStatus::Waiting.is_terminal());
        assert!(!AlertStatus::Accepted.is_terminal());
        assert!(AlertStatus::Rejected.is_terminal());
        assert!(AlertStatus::Completed.is_terminal());
        assert!(AlertStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_new_alert_parses_minimal_submission() {
        let payload = r#"{"location":"Faisal Town Lahore","coordinates":{"lat":31.48,"lng":74.31}}"#;
        let new: NewAlert = serde_json::from_str(payload).unwrap();
        assert_eq!(new.source, AlertSource::Manual);
        assert!(new.id.is_none());
        assert!(new.coordinates.is_finite());
    }
}
