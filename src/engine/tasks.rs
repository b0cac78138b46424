use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, error, warn};

use crate::engine::dispatcher::{Countdown, Dispatcher};
use crate::error::DispatchError;

/// Counts one Waiting alert down, one tick at a time, until it expires or
/// leaves Waiting.
pub(super) async fn run_countdown(dispatcher: Dispatcher, id: String) {
    let tick = dispatcher.settings().tick;
    let mut ticker = interval_at(Instant::now() + tick, tick);

    loop {
        ticker.tick().await;
        match dispatcher.countdown_tick(&id).await {
            Ok(Countdown::Running(_)) => {}
            Ok(Countdown::Done) => break,
            // Lock contention only costs this tick; the next one retries.
            Err(DispatchError::ConcurrencyTimeout) => {
                warn!("Countdown tick for alert {} skipped: engine busy", id);
            }
            Err(e) => {
                error!("Countdown for alert {} stopped: {}", id, e);
                break;
            }
        }
    }
    debug!("Countdown for alert {} finished", id);
}

/// Keeps a terminal alert visible for the grace period, then archives it.
pub(super) async fn run_grace_period(dispatcher: Dispatcher, id: String) {
    sleep(dispatcher.settings().grace_period).await;

    loop {
        match dispatcher.archive_after_grace(&id).await {
            Ok(()) => break,
            Err(DispatchError::ConcurrencyTimeout) => {
                warn!("Archiving alert {} postponed: engine busy", id);
                sleep(dispatcher.settings().tick).await;
            }
            Err(e) => {
                error!("Archiving alert {} failed: {}", id, e);
                break;
            }
        }
    }
}

/// Offers the admission controller a chance to admit an alert on every
/// simulation cadence tick.
pub(super) async fn run_simulation(dispatcher: Dispatcher) {
    let cadence = dispatcher.settings().simulation_cadence;
    let mut ticker = interval_at(Instant::now() + cadence, cadence);

    loop {
        ticker.tick().await;
        match dispatcher.simulation_tick().await {
            Ok(Some(id)) => debug!("Simulation admitted alert {}", id),
            Ok(None) => {}
            Err(e) => warn!("Simulation tick failed: {}", e),
        }
    }
}
