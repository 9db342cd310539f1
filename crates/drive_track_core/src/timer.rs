//! crates/drive_track_core/src/timer.rs
//!
//! The live session timer: an in-memory state machine that accumulates elapsed
//! seconds, distance and the set of road types while a drive is being tracked.
//!
//! The timer does not own a clock. Whoever drives it calls [`SessionTimer::tick`]
//! once per second; the speed for each tick comes from a [`SpeedSource`].

use crate::domain::{RoadType, Session, SessionDraft, TimeOfDay, ValidationError, Weather};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeSet;

//=========================================================================================
// Speed Sources
//=========================================================================================

/// Supplies one speed reading (miles per hour) per tick.
pub trait SpeedSource {
    fn next_speed_mph(&mut self) -> f64;
}

/// Uniform random speeds standing in for real GPS input.
pub struct SimulatedSpeed {
    rng: StdRng,
    min_mph: f64,
    max_mph: f64,
}

impl SimulatedSpeed {
    pub const DEFAULT_MIN_MPH: f64 = 5.0;
    pub const DEFAULT_MAX_MPH: f64 = 75.0;

    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A reproducible source, for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            min_mph: Self::DEFAULT_MIN_MPH,
            max_mph: Self::DEFAULT_MAX_MPH,
        }
    }
}

impl Default for SimulatedSpeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedSource for SimulatedSpeed {
    fn next_speed_mph(&mut self) -> f64 {
        self.rng.gen_range(self.min_mph..self.max_mph)
    }
}

//=========================================================================================
// State Machine
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Tracking,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimerError {
    #[error("Session can only be saved after it is stopped (timer is {0:?})")]
    NotStopped(TimerState),
    #[error("Session rejected: {0}")]
    Invalid(#[from] ValidationError),
}

/// A read-only view of the accumulators, suitable for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_seconds: u32,
    pub elapsed_display: String,
    pub miles: f64,
    pub current_road_type: Option<RoadType>,
    pub road_types: BTreeSet<RoadType>,
    pub time_of_day: TimeOfDay,
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    state: TimerState,
    elapsed_seconds: u32,
    miles: f64,
    current_road_type: Option<RoadType>,
    road_types: BTreeSet<RoadType>,
    time_of_day: TimeOfDay,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            elapsed_seconds: 0,
            miles: 0.0,
            current_road_type: None,
            road_types: BTreeSet::new(),
            time_of_day: TimeOfDay::Afternoon,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn miles(&self) -> f64 {
        self.miles
    }

    pub fn road_types(&self) -> &BTreeSet<RoadType> {
        &self.road_types
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            elapsed_display: format_elapsed(self.elapsed_seconds),
            miles: self.miles,
            current_road_type: self.current_road_type,
            road_types: self.road_types.clone(),
            time_of_day: self.time_of_day,
        }
    }

    /// Idle -> Tracking. `start_hour` is the local wall-clock hour used to
    /// tag the session's time of day.
    pub fn start(&mut self, start_hour: u32) -> bool {
        if self.state != TimerState::Idle {
            return false;
        }
        self.reset();
        self.time_of_day = TimeOfDay::from_hour(start_hour);
        self.state = TimerState::Tracking;
        true
    }

    /// Advances the timer by one second. Ignored unless tracking.
    pub fn tick<S: SpeedSource + ?Sized>(&mut self, source: &mut S) -> Option<TimerSnapshot> {
        if self.state != TimerState::Tracking {
            return None;
        }
        let speed = source.next_speed_mph().max(0.0);
        let road_type = RoadType::classify(speed);
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        self.miles += speed / 3600.0;
        self.current_road_type = Some(road_type);
        self.road_types.insert(road_type);
        Some(self.snapshot())
    }

    /// Tracking -> Stopped.
    pub fn stop(&mut self) -> bool {
        self.transition(TimerState::Tracking, TimerState::Stopped)
    }

    /// Stopped -> Tracking, keeping everything accumulated so far.
    pub fn resume(&mut self) -> bool {
        self.transition(TimerState::Stopped, TimerState::Tracking)
    }

    /// Stopped -> Idle, throwing the accumulated drive away.
    pub fn discard(&mut self) -> bool {
        if self.state != TimerState::Stopped {
            return false;
        }
        self.reset();
        true
    }

    /// Builds the session record from a stopped timer without leaving the
    /// Stopped state. Pair with [`SessionTimer::complete_save`] once the record
    /// is safely persisted.
    pub fn finalize(
        &self,
        weather: Weather,
        recorded_at: DateTime<Utc>,
    ) -> Result<Session, TimerError> {
        if self.state != TimerState::Stopped {
            return Err(TimerError::NotStopped(self.state));
        }
        let draft = SessionDraft {
            duration: self.elapsed_seconds,
            miles: self.miles,
            weather,
            road_types: self.road_types.clone(),
            time_of_day: self.time_of_day,
        };
        Ok(Session::from_draft(draft, recorded_at)?)
    }

    /// Stopped -> Idle after the finalized record was stored.
    pub fn complete_save(&mut self) -> bool {
        self.discard()
    }

    /// Emits the finalized session and returns to Idle in one step.
    pub fn save(
        &mut self,
        weather: Weather,
        recorded_at: DateTime<Utc>,
    ) -> Result<Session, TimerError> {
        let session = self.finalize(weather, recorded_at)?;
        self.complete_save();
        Ok(session)
    }

    fn transition(&mut self, from: TimerState, to: TimerState) -> bool {
        if self.state != from {
            return false;
        }
        self.state = to;
        true
    }

    fn reset(&mut self) {
        let time_of_day = self.time_of_day;
        *self = Self::new();
        self.time_of_day = time_of_day;
    }
}

/// Renders seconds as `HH:MM:SS`.
pub fn format_elapsed(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
