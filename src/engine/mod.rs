pub mod dispatcher;
pub mod lifecycle;
pub mod publisher;
pub mod simulation;
pub mod store;
mod tasks;

use std::time::Duration;

pub use dispatcher::{ActionOutcome, AvailabilityChange, Dispatcher, PollResponse};
pub use lifecycle::Action;
pub use simulation::SimulationSettings;

use crate::models::alert::INITIAL_TIME_REMAINING;

/// Timing knobs for the lifecycle engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Seconds a new alert waits before auto-rejection.
    pub countdown_secs: u32,
    /// Countdown cadence; one second in production.
    pub tick: Duration,
    /// How long terminal alerts stay visible before moving to history.
    pub grace_period: Duration,
    /// Upper bound on waiting for the engine lock.
    pub lock_timeout: Duration,
    /// Cadence of the simulation task.
    pub simulation_cadence: Duration,
    pub simulation: SimulationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            countdown_secs: INITIAL_TIME_REMAINING,
            tick: Duration::from_secs(1),
            grace_period: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(2),
            simulation_cadence: Duration::from_secs(5),
            simulation: SimulationSettings::default(),
        }
    }
}
