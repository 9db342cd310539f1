//! crates/drive_track_core/src/aggregation.rs
//!
//! Reduces a collection of sessions into the totals shown on the dashboard, the
//! full log and the exported report. All three go through [`summarize`], so
//! they agree for the same input.

use crate::domain::Session;
use serde::Serialize;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Unrounded totals over a multiset of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub session_count: usize,
    pub total_seconds: u64,
    pub night_seconds: u64,
    pub total_miles: f64,
}

/// The three headline figures, each with one decimal place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryFigures {
    pub total_hours: String,
    pub total_miles: String,
    pub night_hours: String,
}

impl Totals {
    pub fn total_hours(&self) -> f64 {
        self.total_seconds as f64 / SECONDS_PER_HOUR
    }

    pub fn night_hours(&self) -> f64 {
        self.night_seconds as f64 / SECONDS_PER_HOUR
    }

    pub fn formatted(&self) -> SummaryFigures {
        SummaryFigures {
            total_hours: one_decimal(self.total_hours()),
            total_miles: one_decimal(self.total_miles),
            night_hours: one_decimal(self.night_hours()),
        }
    }
}

/// Folds the sessions into [`Totals`]. The result does not depend on the order
/// of `sessions`: durations are summed as integers, and miles are summed in
/// ascending order so floating-point addition always sees the same sequence.
pub fn summarize<'a, I>(sessions: I) -> Totals
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut totals = Totals::default();
    let mut miles = Vec::new();
    for session in sessions {
        totals.session_count += 1;
        totals.total_seconds += u64::from(session.duration);
        if session.is_night() {
            totals.night_seconds += u64::from(session.duration);
        }
        miles.push(session.miles);
    }
    miles.sort_by(f64::total_cmp);
    totals.total_miles = miles.into_iter().sum();
    totals
}

pub fn one_decimal(value: f64) -> String {
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoadType, SessionDraft, TimeOfDay, Weather};
    use chrono::Utc;

    fn session(duration: u32, miles: f64, time_of_day: TimeOfDay) -> Session {
        Session::from_draft(
            SessionDraft {
                duration,
                miles,
                weather: Weather::Sunny,
                road_types: [RoadType::Residential].into_iter().collect(),
                time_of_day,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_input_is_all_zero() {
        let totals = summarize(&Vec::<Session>::new());
        assert_eq!(totals, Totals::default());
        let figures = totals.formatted();
        assert_eq!(figures.total_hours, "0.0");
        assert_eq!(figures.total_miles, "0.0");
        assert_eq!(figures.night_hours, "0.0");
    }

    #[test]
    fn three_session_scenario() {
        let sessions = vec![
            session(3600, 30.0, TimeOfDay::Morning),
            session(7200, 80.5, TimeOfDay::Afternoon),
            session(1800, 12.3, TimeOfDay::Night),
        ];
        let figures = summarize(&sessions).formatted();
        assert_eq!(figures.total_hours, "3.5");
        assert_eq!(figures.night_hours, "0.5");
        assert_eq!(figures.total_miles, "122.8");
    }

    #[test]
    fn miles_sum_is_bit_identical_under_permutation() {
        let mut sessions: Vec<Session> = [0.1, 0.2, 0.3, 1e10, 7.77, 1e-3, 2.5]
            .iter()
            .enumerate()
            .map(|(i, m)| session(60 * (i as u32 + 1), *m, TimeOfDay::Evening))
            .collect();
        let forward = summarize(&sessions);
        sessions.reverse();
        let reversed = summarize(&sessions);
        sessions.rotate_left(3);
        let rotated = summarize(&sessions);
        assert_eq!(forward.total_miles.to_bits(), reversed.total_miles.to_bits());
        assert_eq!(forward.total_miles.to_bits(), rotated.total_miles.to_bits());
        assert_eq!(forward, rotated);
    }
}
