//! Simulated alert arrival for environments without a live detector feed.
//!
//! Admission is rate-limited and probabilistic: on each tick an alert is
//! admitted only when the interval since the last admission has elapsed,
//! no cooldown is running, and a weighted coin flip succeeds. The random
//! source is injected so a seeded [`StdRng`] replays the same decisions.

use chrono::Local;
use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::alert::clock_time;
use crate::models::{AlertSource, Coordinates, NewAlert};

pub const LOCATIONS: [&str; 5] = [
    "DHA Phase 6 Lahore",
    "Model Town Block C Lahore",
    "Cavalry Ground Lahore",
    "Gulberg III Lahore",
    "Faisal Town Lahore",
];

const BASE_LAT: f64 = 31.5;
const BASE_LNG: f64 = 74.3;
const JITTER: f64 = 0.05;
const CLIP_COUNT: u32 = 5;
const ID_BASE: u64 = 22345;
const FIRST_COUNTER: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub chance: f64,
    pub cooldown: Duration,
    pub max_waiting: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(120),
            chance: 0.2,
            cooldown: Duration::from_secs(15),
            max_waiting: 3,
        }
    }
}

pub struct AdmissionController {
    settings: SimulationSettings,
    rng: StdRng,
    last_admission: Instant,
    cooldown_until: Option<Instant>,
    counter: u64,
}

impl AdmissionController {
    /// `now` seeds the interval clock, so the first admission can happen no
    /// earlier than one interval after construction.
    pub fn new(settings: SimulationSettings, rng: StdRng, now: Instant) -> Self {
        Self {
            settings,
            rng,
            last_admission: now,
            cooldown_until: None,
            counter: FIRST_COUNTER,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn max_waiting(&self) -> usize {
        self.settings.max_waiting
    }

    /// Runs one admission decision. Returns the alert to admit, if any.
    pub fn tick(&mut self, now: Instant) -> Option<NewAlert> {
        if !self.settings.enabled {
            return None;
        }
        if now.saturating_duration_since(self.last_admission) < self.settings.interval {
            return None;
        }
        if self.cooldown_until.is_some_and(|until| now < until) {
            return None;
        }
        let chance = self.settings.chance;
        if !chance.is_finite() || !self.rng.gen_bool(chance.clamp(0.0, 1.0)) {
            return None;
        }

        self.last_admission = now;
        self.cooldown_until = Some(now + self.settings.cooldown);
        Some(self.generate())
    }

    fn generate(&mut self) -> NewAlert {
        self.counter += 1;
        let location = LOCATIONS[self.rng.gen_range(0..LOCATIONS.len())];
        let coordinates = Coordinates {
            lat: BASE_LAT + self.rng.gen_range(-JITTER..JITTER),
            lng: BASE_LNG + self.rng.gen_range(-JITTER..JITTER),
        };
        let clip = self.rng.gen_range(1..=CLIP_COUNT);

        NewAlert {
            id: Some(format!("#{}", ID_BASE + self.counter)),
            location: location.to_string(),
            coordinates,
            time: Some(clock_time(&Local::now())),
            date: Some("Today".to_string()),
            accident_clip: Some(format!("/accident{clip}.mp4")),
            confidence_score: None,
            source: AlertSource::Simulation,
        }
    }
}
