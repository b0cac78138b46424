//! Alert transition table.
//!
//! ```text
//!            accept              complete
//!  Waiting ─────────► Accepted ──────────► Completed
//!     │                   │
//!     │ reject            │ cancel
//!     │ timer expiry      └──────────────► Cancelled
//!     │ operator unavailable
//!     ▼
//!  Rejected
//! ```
//!
//! Rejected, Completed and Cancelled are absorbing. Any reject-like event on
//! an already rejected alert is a no-op, not an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::AlertStatus;

/// Anything that can move an alert along the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Accept,
    Reject,
    TimerExpire,
    Complete,
    Cancel,
    OperatorUnavailable,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::Accept => "accept",
            Event::Reject => "reject",
            Event::TimerExpire => "expire",
            Event::Complete => "complete",
            Event::Cancel => "cancel",
            Event::OperatorUnavailable => "bulk-reject",
        };
        f.write_str(name)
    }
}

/// Consumer-facing actions accepted by `submit_action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Reject,
    Complete,
    Cancel,
}

impl Action {
    pub fn event(self) -> Event {
        match self {
            Action::Accept => Event::Accept,
            Action::Reject => Event::Reject,
            Action::Complete => Event::Complete,
            Action::Cancel => Event::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Move(AlertStatus),
    Noop,
}

/// Looks up `event` in the table. `None` means the transition is not allowed.
pub fn next_step(from: AlertStatus, event: Event) -> Option<Step> {
    use AlertStatus::*;
    use Event::*;

    match (from, event) {
        (Waiting, Accept) => Some(Step::Move(Accepted)),
        (Waiting, Reject | TimerExpire | OperatorUnavailable) => Some(Step::Move(Rejected)),
        (Rejected, Reject | TimerExpire | OperatorUnavailable) => Some(Step::Noop),
        (Accepted, Complete) => Some(Step::Move(Completed)),
        (Accepted, Cancel) => Some(Step::Move(Cancelled)),
        _ => None,
    }
}

/// Whether `to` is directly reachable from `from`.
pub fn can_transition(from: AlertStatus, to: AlertStatus) -> bool {
    use AlertStatus::*;

    matches!(
        (from, to),
        (Waiting, Accepted) | (Waiting, Rejected) | (Accepted, Completed) | (Accepted, Cancelled)
    )
}
