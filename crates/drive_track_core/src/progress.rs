//! crates/drive_track_core/src/progress.rs
//!
//! Progress toward a configured goal. Nothing here is persisted.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub current: f64,
    pub goal: Option<f64>,
    /// False when no goal is configured; the progress bar is hidden then.
    pub has_goal: bool,
    /// Capped at 100.
    pub percentage: f64,
    pub completed: bool,
}

impl GoalProgress {
    pub fn compute(current: f64, goal: Option<f64>) -> Self {
        let active_goal = goal.filter(|g| *g > 0.0);
        let (percentage, completed) = match active_goal {
            Some(g) => ((current / g * 100.0).min(100.0), current >= g),
            None => (0.0, false),
        };
        Self {
            current,
            goal,
            has_goal: active_goal.is_some(),
            percentage,
            completed,
        }
    }
}
