pub mod aggregation;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod progress;
pub mod report;
pub mod services;
pub mod skills;
pub mod timer;

pub use aggregation::{summarize, SummaryFigures, Totals};
pub use domain::{
    Account, AccountCredentials, ManualEntry, ProfileUpdate, RoadType, Session, SessionDraft,
    Share, ShareStatus, Skill, TimeOfDay, UserProfile, ValidationError, Weather,
};
pub use ports::{
    AuthEvent, AuthGrant, AuthProvider, DatabaseService, Platform, PortError, PortResult,
};
pub use progress::GoalProgress;
pub use timer::{SessionTimer, SimulatedSpeed, SpeedSource, TimerError, TimerSnapshot, TimerState};
