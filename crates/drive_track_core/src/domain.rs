//! crates/drive_track_core/src/domain.rs
//!
//! Defines the core data structures for the application and the validation
//! rules that guard them. These structs are independent of any database; they
//! derive `serde` traits so the outer layer can ship them over the wire as-is.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Validation
//=========================================================================================

/// Rejections raised when a record is constructed from untrusted input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Duration must be at least 1 second")]
    ZeroDuration,
    #[error("Duration of {0} seconds exceeds the maximum of {max}", max = Session::MAX_DURATION)]
    DurationTooLong(u64),
    #[error("At least one road type is required")]
    EmptyRoadTypes,
    #[error("Miles must be a non-negative number, got {0}")]
    InvalidMiles(f64),
    #[error("Goal must be a non-negative number, got {0}")]
    NegativeGoal(f64),
    #[error("Unknown weather condition: {0}")]
    UnknownWeather(String),
    #[error("Unknown road type: {0}")]
    UnknownRoadType(String),
    #[error("Unknown time of day: {0}")]
    UnknownTimeOfDay(String),
}

//=========================================================================================
// Enumerations
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
}

impl Weather {
    pub const ALL: [Weather; 4] = [Weather::Sunny, Weather::Cloudy, Weather::Rainy, Weather::Snowy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
            Weather::Snowy => "Snowy",
        }
    }
}

impl FromStr for Weather {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Weather::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownWeather(s.to_string()))
    }
}

/// Road categories. The declaration order is the canonical order used when a
/// set of road types is stored or displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoadType {
    Residential,
    Arterial,
    Highway,
}

impl RoadType {
    pub const ALL: [RoadType; 3] = [RoadType::Residential, RoadType::Arterial, RoadType::Highway];

    /// Upper bound (inclusive, mph) of the Residential band.
    pub const RESIDENTIAL_MAX_MPH: f64 = 30.0;
    /// Upper bound (inclusive, mph) of the Arterial band.
    pub const ARTERIAL_MAX_MPH: f64 = 55.0;

    /// Maps a speed in miles per hour onto a road category.
    pub fn classify(speed_mph: f64) -> RoadType {
        if speed_mph <= Self::RESIDENTIAL_MAX_MPH {
            RoadType::Residential
        } else if speed_mph <= Self::ARTERIAL_MAX_MPH {
            RoadType::Arterial
        } else {
            RoadType::Highway
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadType::Residential => "Residential",
            RoadType::Arterial => "Arterial",
            RoadType::Highway => "Highway",
        }
    }
}

impl FromStr for RoadType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoadType::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownRoadType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    /// Buckets a wall-clock hour (0-23): 05-11 Morning, 12-16 Afternoon,
    /// 17-20 Evening, everything else Night.
    pub fn from_hour(hour: u32) -> TimeOfDay {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
            TimeOfDay::Night => "Night",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeOfDay::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownTimeOfDay(s.to_string()))
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

/// One completed practice-driving interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// When the session was recorded, not when driving started.
    pub date: DateTime<Utc>,
    /// Elapsed seconds, always >= 1.
    pub duration: u32,
    pub miles: f64,
    pub weather: Weather,
    pub road_types: BTreeSet<RoadType>,
    pub time_of_day: TimeOfDay,
}

/// The user-editable part of a session; everything except identity and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub duration: u32,
    pub miles: f64,
    pub weather: Weather,
    pub road_types: BTreeSet<RoadType>,
    pub time_of_day: TimeOfDay,
}

impl SessionDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration < 1 {
            return Err(ValidationError::ZeroDuration);
        }
        if self.duration > Session::MAX_DURATION {
            return Err(ValidationError::DurationTooLong(u64::from(self.duration)));
        }
        if !self.miles.is_finite() || self.miles < 0.0 {
            return Err(ValidationError::InvalidMiles(self.miles));
        }
        if self.road_types.is_empty() {
            return Err(ValidationError::EmptyRoadTypes);
        }
        Ok(())
    }
}

impl Session {
    /// Longest storable session, in seconds. Durations are persisted as a
    /// signed 32-bit column.
    pub const MAX_DURATION: u32 = i32::MAX as u32;

    /// Builds a brand-new session with a fresh id. This is the only way a
    /// session record comes into existence, so every record is validated.
    pub fn from_draft(draft: SessionDraft, date: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::with_id(Uuid::new_v4(), date, draft)
    }

    /// Builds the replacement for an existing record during an edit.
    pub fn with_id(
        id: Uuid,
        date: DateTime<Utc>,
        draft: SessionDraft,
    ) -> Result<Self, ValidationError> {
        draft.validate()?;
        Ok(Self {
            id,
            date,
            duration: draft.duration,
            miles: draft.miles,
            weather: draft.weather,
            road_types: draft.road_types,
            time_of_day: draft.time_of_day,
        })
    }

    pub fn is_night(&self) -> bool {
        self.time_of_day == TimeOfDay::Night
    }
}

/// A session typed in by hand rather than tracked live. Duration is given in
/// whole minutes.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualEntry {
    pub date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub miles: f64,
    pub weather: Weather,
    pub road_types: Vec<RoadType>,
    pub time_of_day: TimeOfDay,
}

impl ManualEntry {
    pub fn into_session(self) -> Result<Session, ValidationError> {
        let seconds = u64::from(self.duration_minutes) * 60;
        let duration = u32::try_from(seconds)
            .map_err(|_| ValidationError::DurationTooLong(seconds))?;
        let draft = SessionDraft {
            duration,
            miles: self.miles,
            weather: self.weather,
            road_types: self.road_types.into_iter().collect(),
            time_of_day: self.time_of_day,
        };
        Session::from_draft(draft, self.date)
    }
}

//=========================================================================================
// Accounts and Profiles
//=========================================================================================

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    pub hashed_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub account_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub permit_date: Option<NaiveDate>,
    pub total_hours_goal: Option<f64>,
    pub night_hours_goal: Option<f64>,
}

/// A merge-style edit of the profile. An absent field (`None`) is left as it
/// is; `Some(None)`, sent as JSON `null`, clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub permit_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub total_hours_goal: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub night_hours_goal: Option<Option<f64>>,
}

/// Marks a field that appeared in the payload, even as `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UserProfile {
    /// The profile created lazily on first authentication.
    pub fn initial_for(account: &Account) -> Self {
        let name = account
            .email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("New User")
            .to_string();
        Self {
            account_id: account.id,
            name: Some(name),
            email: Some(account.email.clone()),
            date_of_birth: None,
            permit_date: None,
            total_hours_goal: None,
            night_hours_goal: None,
        }
    }

    /// Merges `update` into the profile. Goals are checked before anything is
    /// written, so a rejected update leaves the profile untouched.
    pub fn apply(&mut self, update: ProfileUpdate) -> Result<(), ValidationError> {
        let total_hours_goal = update.total_hours_goal.map(normalize_goal).transpose()?;
        let night_hours_goal = update.night_hours_goal.map(normalize_goal).transpose()?;
        if let Some(name) = update.name {
            self.name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(date_of_birth) = update.date_of_birth {
            self.date_of_birth = date_of_birth;
        }
        if let Some(permit_date) = update.permit_date {
            self.permit_date = permit_date;
        }
        if let Some(goal) = total_hours_goal {
            self.total_hours_goal = goal;
        }
        if let Some(goal) = night_hours_goal {
            self.night_hours_goal = goal;
        }
        Ok(())
    }
}

/// A goal of zero means "no goal".
fn normalize_goal(goal: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match goal {
        Some(g) if !g.is_finite() || g < 0.0 => Err(ValidationError::NegativeGoal(g)),
        Some(g) if g == 0.0 => Ok(None),
        other => Ok(other),
    }
}

/// Canonical form of an email address used for matching shares.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//=========================================================================================
// Sharing
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Pending,
    Accepted,
}

impl ShareStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareStatus::Pending => "pending",
            ShareStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for ShareStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ShareStatus::Pending),
            "accepted" => Ok(ShareStatus::Accepted),
            other => Err(format!("unknown share status '{}'", other)),
        }
    }
}

/// A read-only access grant from a student to a guardian's email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_email: String,
    pub student_name: String,
    pub guardian_email: String,
    pub status: ShareStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Share {
    pub fn pending(student: &UserProfile, student_email: &str, guardian_email: &str) -> Self {
        let student_name = student
            .name
            .clone()
            .unwrap_or_else(|| student_email.split('@').next().unwrap_or_default().to_string());
        Self {
            id: Uuid::new_v4(),
            student_id: student.account_id,
            student_email: student_email.to_string(),
            student_name,
            guardian_email: normalize_email(guardian_email),
            status: ShareStatus::Pending,
            created_at: Utc::now(),
            accepted_at: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ShareStatus::Accepted
    }
}

//=========================================================================================
// Skills
//=========================================================================================

/// A catalog item plus the per-account completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: u32,
    pub title: String,
    pub teaching_points: Vec<String>,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SessionDraft {
        SessionDraft {
            duration: 600,
            miles: 4.2,
            weather: Weather::Cloudy,
            road_types: [RoadType::Arterial].into_iter().collect(),
            time_of_day: TimeOfDay::Afternoon,
        }
    }

    #[test]
    fn road_type_bands_are_inclusive_at_the_upper_edge() {
        assert_eq!(RoadType::classify(0.0), RoadType::Residential);
        assert_eq!(RoadType::classify(30.0), RoadType::Residential);
        assert_eq!(RoadType::classify(30.1), RoadType::Arterial);
        assert_eq!(RoadType::classify(55.0), RoadType::Arterial);
        assert_eq!(RoadType::classify(55.1), RoadType::Highway);
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert_eq!(
            "Foggy".parse::<Weather>(),
            Err(ValidationError::UnknownWeather("Foggy".into()))
        );
        assert!("Dirt".parse::<RoadType>().is_err());
        assert!("Dusk".parse::<TimeOfDay>().is_err());
        assert_eq!("Highway".parse::<RoadType>(), Ok(RoadType::Highway));
    }

    #[test]
    fn session_requires_positive_duration() {
        let mut d = draft();
        d.duration = 0;
        assert_eq!(Session::from_draft(d, Utc::now()), Err(ValidationError::ZeroDuration));
    }

    #[test]
    fn session_requires_road_types() {
        let mut d = draft();
        d.road_types.clear();
        assert_eq!(Session::from_draft(d, Utc::now()), Err(ValidationError::EmptyRoadTypes));
    }

    #[test]
    fn session_rejects_negative_or_nan_miles() {
        let mut d = draft();
        d.miles = -1.0;
        assert!(matches!(
            Session::from_draft(d.clone(), Utc::now()),
            Err(ValidationError::InvalidMiles(_))
        ));
        d.miles = f64::NAN;
        assert!(Session::from_draft(d, Utc::now()).is_err());
    }

    #[test]
    fn manual_entry_converts_minutes_and_collapses_duplicates() {
        let entry = ManualEntry {
            date: Utc::now(),
            duration_minutes: 45,
            miles: 12.0,
            weather: Weather::Rainy,
            road_types: vec![RoadType::Highway, RoadType::Residential, RoadType::Highway],
            time_of_day: TimeOfDay::Evening,
        };
        let session = entry.into_session().unwrap();
        assert_eq!(session.duration, 2700);
        assert_eq!(
            session.road_types.into_iter().collect::<Vec<_>>(),
            vec![RoadType::Residential, RoadType::Highway]
        );
    }

    #[test]
    fn initial_profile_uses_email_local_part() {
        let account = Account { id: Uuid::new_v4(), email: "alex.doe@example.com".into() };
        let profile = UserProfile::initial_for(&account);
        assert_eq!(profile.name.as_deref(), Some("alex.doe"));
        assert_eq!(profile.total_hours_goal, None);
    }

    #[test]
    fn profile_update_treats_zero_goal_as_absent_and_rejects_negative() {
        let account = Account { id: Uuid::new_v4(), email: "a@b.c".into() };
        let mut profile = UserProfile::initial_for(&account);
        profile
            .apply(ProfileUpdate {
                name: Some(Some("  Alex  ".into())),
                total_hours_goal: Some(Some(50.0)),
                night_hours_goal: Some(Some(0.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Alex"));
        assert_eq!(profile.total_hours_goal, Some(50.0));
        assert_eq!(profile.night_hours_goal, None);

        let err = profile.apply(ProfileUpdate {
            total_hours_goal: Some(Some(-3.0)),
            ..Default::default()
        });
        assert_eq!(err, Err(ValidationError::NegativeGoal(-3.0)));
        // A rejected update leaves the profile untouched.
        assert_eq!(profile.total_hours_goal, Some(50.0));
    }

    #[test]
    fn profile_update_leaves_absent_fields_alone() {
        let account = Account { id: Uuid::new_v4(), email: "sam@example.com".into() };
        let mut profile = UserProfile::initial_for(&account);
        let first: ProfileUpdate =
            serde_json::from_str(r#"{"name": "Sam", "total_hours_goal": 50}"#).unwrap();
        profile.apply(first).unwrap();

        let second: ProfileUpdate = serde_json::from_str(r#"{"night_hours_goal": 10}"#).unwrap();
        profile.apply(second).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Sam"));
        assert_eq!(profile.total_hours_goal, Some(50.0));
        assert_eq!(profile.night_hours_goal, Some(10.0));

        let cleared: ProfileUpdate = serde_json::from_str(r#"{"total_hours_goal": null}"#).unwrap();
        profile.apply(cleared).unwrap();
        assert_eq!(profile.total_hours_goal, None);
        assert_eq!(profile.night_hours_goal, Some(10.0));
    }

    #[test]
    fn manual_entry_rejects_durations_past_the_storable_maximum() {
        let entry = ManualEntry {
            date: Utc::now(),
            duration_minutes: u32::MAX,
            miles: 1.0,
            weather: Weather::Sunny,
            road_types: vec![RoadType::Residential],
            time_of_day: TimeOfDay::Morning,
        };
        assert_eq!(
            entry.into_session(),
            Err(ValidationError::DurationTooLong(u64::from(u32::MAX) * 60))
        );

        let mut d = draft();
        d.duration = Session::MAX_DURATION + 1;
        assert!(matches!(
            Session::from_draft(d, Utc::now()),
            Err(ValidationError::DurationTooLong(_))
        ));
    }

    #[test]
    fn session_wire_format_uses_variant_names() {
        let mut d = draft();
        d.road_types = [RoadType::Highway, RoadType::Residential].into_iter().collect();
        let session = Session::from_draft(d, Utc::now()).unwrap();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["weather"], "Cloudy");
        assert_eq!(json["time_of_day"], "Afternoon");
        assert_eq!(json["road_types"], serde_json::json!(["Residential", "Highway"]));
        assert_eq!(json["duration"], 600);

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn share_normalizes_guardian_email() {
        let account = Account { id: Uuid::new_v4(), email: "kid@example.com".into() };
        let profile = UserProfile::initial_for(&account);
        let share = Share::pending(&profile, &account.email, "  Mom@Example.COM ");
        assert_eq!(share.guardian_email, "mom@example.com");
        assert_eq!(share.status, ShareStatus::Pending);
        assert_eq!(share.student_name, "kid");
    }
}
