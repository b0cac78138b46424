//! The dispatch engine: single owner of alert state.
//!
//! Every mutation, whether it comes from a consumer, a countdown task, the
//! grace-period archiver or the simulation task, goes through one
//! `tokio::sync::Mutex`. Callers never wait on it longer than
//! `EngineSettings::lock_timeout`; contention surfaces as
//! [`DispatchError::ConcurrencyTimeout`].

use chrono::Utc;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{self, Action, Event, Step};
use crate::engine::publisher::ChangePublisher;
use crate::engine::simulation::AdmissionController;
use crate::engine::store::{AlertStore, StatusChange};
use crate::engine::{tasks, EngineSettings};
use crate::error::{DispatchError, ErrorKind};
use crate::models::{Alert, AlertStatus, DriverAssignment, NewAlert};

#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub alerts: Vec<Alert>,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DispatchError> for ActionError {
    fn from(err: &DispatchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Reply to `submit_action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl ActionOutcome {
    pub fn success(status: AlertStatus) -> Self {
        Self {
            ok: true,
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(err: &DispatchError) -> Self {
        Self {
            ok: false,
            status: None,
            error: Some(err.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityChange {
    pub available: bool,
    pub rejected: Vec<String>,
}

pub(super) enum Countdown {
    Running(u32),
    Done,
}

struct EngineState {
    store: AlertStore,
    publisher: ChangePublisher,
    simulation: AdmissionController,
    operator_available: bool,
    countdowns: HashMap<String, JoinHandle<()>>,
    grace_timers: HashMap<String, JoinHandle<()>>,
    simulation_task: Option<JoinHandle<()>>,
}

struct Inner {
    state: Mutex<EngineState>,
    settings: EngineSettings,
    archive_tx: Option<mpsc::UnboundedSender<Alert>>,
}

/// Cheap to clone; all clones share the same engine.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(settings: EngineSettings, rng: StdRng) -> Self {
        Self::with_archive(settings, rng, None)
    }

    /// Like [`Dispatcher::new`], additionally forwarding every archived alert
    /// to `archive_tx`.
    pub fn with_archive(
        settings: EngineSettings,
        rng: StdRng,
        archive_tx: Option<mpsc::UnboundedSender<Alert>>,
    ) -> Self {
        let simulation =
            AdmissionController::new(settings.simulation.clone(), rng, Instant::now());
        let state = EngineState {
            store: AlertStore::new(),
            publisher: ChangePublisher::new(),
            simulation,
            operator_available: true,
            countdowns: HashMap::new(),
            grace_timers: HashMap::new(),
            simulation_task: None,
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                settings,
                archive_tx,
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    async fn lock(&self) -> Result<MutexGuard<'_, EngineState>, DispatchError> {
        tokio::time::timeout(self.inner.settings.lock_timeout, self.inner.state.lock())
            .await
            .map_err(|_| {
                warn!(
                    "Engine lock not acquired within {:?}",
                    self.inner.settings.lock_timeout
                );
                DispatchError::ConcurrencyTimeout
            })
    }

    /// Active alerts plus whether they changed significantly since this
    /// consumer's previous poll.
    pub async fn poll(&self, consumer: &str) -> Result<PollResponse, DispatchError> {
        let mut state = self.lock().await?;
        let alerts = state.store.list().to_vec();
        let changed = state.publisher.observe(consumer, &alerts);
        Ok(PollResponse { alerts, changed })
    }

    pub async fn forget_consumer(&self, consumer: &str) -> Result<bool, DispatchError> {
        let mut state = self.lock().await?;
        Ok(state.publisher.forget(consumer))
    }

    pub async fn alert(&self, id: &str) -> Result<Option<Alert>, DispatchError> {
        let state = self.lock().await?;
        Ok(state.store.get(id).cloned())
    }

    pub async fn apply_action(
        &self,
        id: &str,
        action: Action,
        driver: Option<DriverAssignment>,
    ) -> Result<StatusChange, DispatchError> {
        let mut state = self.lock().await?;
        self.transition(&mut state, id, action.event(), driver)
    }

    /// Consumer-facing form of [`Dispatcher::apply_action`]: failures are
    /// reported in the outcome, never dropped.
    pub async fn submit_action(
        &self,
        id: &str,
        action: Action,
        driver: Option<DriverAssignment>,
    ) -> ActionOutcome {
        match self.apply_action(id, action, driver).await {
            Ok(change) => ActionOutcome::success(change.status()),
            Err(e) => {
                warn!("Action {:?} on alert {} failed: {}", action, id, e);
                ActionOutcome::failure(&e)
            }
        }
    }

    /// Terminal alerts, most recently closed first.
    pub async fn list_history(&self, limit: usize) -> Result<Vec<Alert>, DispatchError> {
        let state = self.lock().await?;
        Ok(state.store.closed_recent_first(limit))
    }

    /// Going unavailable rejects every Waiting alert in one pass.
    pub async fn set_operator_availability(
        &self,
        available: bool,
    ) -> Result<AvailabilityChange, DispatchError> {
        let mut state = self.lock().await?;
        let was_available = std::mem::replace(&mut state.operator_available, available);
        let mut rejected = Vec::new();

        if was_available && !available {
            for id in state.store.waiting_ids() {
                match self.transition(&mut state, &id, Event::OperatorUnavailable, None) {
                    Ok(_) => rejected.push(id),
                    Err(e) => warn!("Bulk reject skipped alert {}: {}", id, e),
                }
            }
            info!(
                "Operator unavailable, rejected {} waiting alert(s)",
                rejected.len()
            );
        } else if !was_available && available {
            info!("Operator available again");
        }

        Ok(AvailabilityChange { available, rejected })
    }

    pub async fn operator_available(&self) -> Result<bool, DispatchError> {
        let state = self.lock().await?;
        Ok(state.operator_available)
    }

    /// Admits an externally submitted alert and starts its countdown.
    pub async fn submit_alert(&self, new: NewAlert) -> Result<String, DispatchError> {
        let mut state = self.lock().await?;
        self.admit(&mut state, new)
    }

    pub async fn set_simulation_enabled(&self, enabled: bool) -> Result<(), DispatchError> {
        let mut state = self.lock().await?;
        state.simulation.set_enabled(enabled);
        info!(
            "Alert simulation {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub async fn simulation_enabled(&self) -> Result<bool, DispatchError> {
        let state = self.lock().await?;
        Ok(state.simulation.is_enabled())
    }

    /// Spawns the periodic simulation task. Calling it twice is harmless.
    pub async fn start_simulation(&self) -> Result<(), DispatchError> {
        let mut state = self.lock().await?;
        if state.simulation_task.is_none() {
            state.simulation_task = Some(tokio::spawn(tasks::run_simulation(self.clone())));
            info!(
                "Simulation task started (every {:?})",
                self.inner.settings.simulation_cadence
            );
        }
        Ok(())
    }

    /// Stops every background task owned by the engine.
    pub async fn shutdown(&self) {
        let mut state = match self.lock().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Shutdown could not stop engine tasks: {}", e);
                return;
            }
        };
        let countdowns = state.countdowns.len();
        for (_, handle) in state.countdowns.drain() {
            handle.abort();
        }
        for (_, handle) in state.grace_timers.drain() {
            handle.abort();
        }
        if let Some(handle) = state.simulation_task.take() {
            handle.abort();
        }
        info!("Dispatcher stopped ({} countdown(s) cancelled)", countdowns);
    }

    pub(super) async fn countdown_tick(&self, id: &str) -> Result<Countdown, DispatchError> {
        let mut state = self.lock().await?;
        let Some(left) = state.store.tick(id) else {
            // The alert left Waiting (or the active set) since the last tick.
            state.countdowns.remove(id);
            return Ok(Countdown::Done);
        };
        if left > 0 {
            return Ok(Countdown::Running(left));
        }

        // Detach our own handle so the transition does not abort this task.
        state.countdowns.remove(id);
        self.transition(&mut state, id, Event::TimerExpire, None)?;
        Ok(Countdown::Done)
    }

    pub(super) async fn archive_after_grace(&self, id: &str) -> Result<(), DispatchError> {
        let mut state = self.lock().await?;
        state.grace_timers.remove(id);
        self.move_to_history(&mut state, id);
        Ok(())
    }

    pub(super) async fn simulation_tick(&self) -> Result<Option<String>, DispatchError> {
        let mut state = self.lock().await?;
        let Some(new) = state.simulation.tick(Instant::now()) else {
            return Ok(None);
        };
        let id = self.admit(&mut state, new)?;
        let max_waiting = state.simulation.max_waiting();
        self.evict_overflow(&mut state, max_waiting);
        Ok(Some(id))
    }

    fn transition(
        &self,
        state: &mut EngineState,
        id: &str,
        event: Event,
        driver: Option<DriverAssignment>,
    ) -> Result<StatusChange, DispatchError> {
        let from = state
            .store
            .get(id)
            .map(|a| a.status)
            .ok_or_else(|| DispatchError::NotFound(id.to_string()))?;

        let to = match lifecycle::next_step(from, event) {
            Some(Step::Move(to)) => to,
            Some(Step::Noop) => {
                debug!("Ignored {} for alert {}: already {}", event, id, from);
                return Ok(StatusChange::Unchanged { status: from });
            }
            None => {
                return Err(DispatchError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    attempted: event.to_string(),
                })
            }
        };

        if to == AlertStatus::Accepted {
            if let Some(active) = state.store.accepted() {
                return Err(DispatchError::AlertBusy {
                    active: active.id.clone(),
                });
            }
        }

        let change = state.store.update_status(id, to, driver, Utc::now())?;

        if from == AlertStatus::Waiting {
            if let Some(countdown) = state.countdowns.remove(id) {
                countdown.abort();
            }
        }
        if to.is_terminal() {
            self.schedule_archive(state, id);
        }

        info!("Alert {} {} -> {} ({})", id, from, to, event);
        Ok(change)
    }

    fn admit(&self, state: &mut EngineState, new: NewAlert) -> Result<String, DispatchError> {
        if new.location.trim().is_empty() {
            return Err(DispatchError::InvalidRequest(
                "location is required".to_string(),
            ));
        }
        if !new.coordinates.is_finite() {
            return Err(DispatchError::InvalidRequest(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        let id = match new.id.as_deref().map(str::trim) {
            Some("") => {
                return Err(DispatchError::InvalidRequest(
                    "id must not be blank".to_string(),
                ))
            }
            Some(id) => id.to_string(),
            None => format!("A-{}", Uuid::new_v4().simple()),
        };

        let source = new.source;
        let alert = new.into_alert(id, self.inner.settings.countdown_secs);
        let id = state.store.create(alert)?;

        let countdown = tokio::spawn(tasks::run_countdown(self.clone(), id.clone()));
        state.countdowns.insert(id.clone(), countdown);

        info!("Admitted alert {} ({:?})", id, source);
        Ok(id)
    }

    /// Rejects and archives the oldest Waiting alerts beyond `max_waiting`.
    fn evict_overflow(&self, state: &mut EngineState, max_waiting: usize) -> Vec<String> {
        let waiting = state.store.waiting_ids();
        let excess = waiting.len().saturating_sub(max_waiting);
        let mut evicted = Vec::with_capacity(excess);

        for id in waiting.into_iter().take(excess) {
            match self.transition(state, &id, Event::Reject, None) {
                Ok(_) => {
                    if let Some(timer) = state.grace_timers.remove(&id) {
                        timer.abort();
                    }
                    self.move_to_history(state, &id);
                    info!("Evicted alert {} to keep {} waiting", id, max_waiting);
                    evicted.push(id);
                }
                Err(e) => warn!("Could not evict alert {}: {}", id, e),
            }
        }
        evicted
    }

    fn schedule_archive(&self, state: &mut EngineState, id: &str) {
        let timer = tokio::spawn(tasks::run_grace_period(self.clone(), id.to_string()));
        if let Some(previous) = state.grace_timers.insert(id.to_string(), timer) {
            previous.abort();
        }
    }

    fn move_to_history(&self, state: &mut EngineState, id: &str) {
        let Some(alert) = state.store.archive(id) else {
            return;
        };
        debug!("Archived alert {} ({})", id, alert.status);
        if let Some(tx) = &self.inner.archive_tx {
            if tx.send(alert).is_err() {
                warn!("Archive sink closed, alert {} kept in memory only", id);
            }
        }
    }
}
