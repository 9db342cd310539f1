//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use drive_track_core::domain::{
    normalize_email, Account, AccountCredentials, RoadType, Session, SessionDraft, Share,
    ShareStatus, Skill, TimeOfDay, UserProfile, ValidationError, Weather,
};
use drive_track_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use std::collections::BTreeSet;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps driver errors onto the port's error vocabulary.
fn map_err(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Network(e.to_string())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> PortError {
    let label = format!("{} {} not found", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(label),
        other => map_err(other),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl AccountRecord {
    fn to_domain(self) -> AccountCredentials {
        AccountCredentials {
            account: Account {
                id: self.id,
                email: self.email,
            },
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    account_id: Uuid,
    name: Option<String>,
    email: Option<String>,
    date_of_birth: Option<NaiveDate>,
    permit_date: Option<NaiveDate>,
    total_hours_goal: Option<f64>,
    night_hours_goal: Option<f64>,
}
impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            account_id: self.account_id,
            name: self.name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            permit_date: self.permit_date,
            total_hours_goal: self.total_hours_goal,
            night_hours_goal: self.night_hours_goal,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    date: DateTime<Utc>,
    duration: i32,
    miles: f64,
    weather: String,
    road_types: Vec<String>,
    time_of_day: String,
}
impl SessionRecord {
    /// Stored rows are re-validated on the way out; a row that breaks the
    /// invariants is reported instead of silently returned.
    fn to_domain(self) -> PortResult<Session> {
        let id = self.id;
        let invalid = move |e: String| PortError::Unexpected(format!("Corrupt session {}: {}", id, e));
        let duration = u32::try_from(self.duration).map_err(|e| invalid(e.to_string()))?;
        let weather: Weather = self
            .weather
            .parse()
            .map_err(|e: ValidationError| invalid(e.to_string()))?;
        let time_of_day: TimeOfDay = self
            .time_of_day
            .parse()
            .map_err(|e: ValidationError| invalid(e.to_string()))?;
        let road_types: BTreeSet<RoadType> = self
            .road_types
            .iter()
            .map(|r| r.parse::<RoadType>())
            .collect::<Result<_, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        let draft = SessionDraft {
            duration,
            miles: self.miles,
            weather,
            road_types,
            time_of_day,
        };
        Session::with_id(self.id, self.date, draft).map_err(|e| invalid(e.to_string()))
    }
}

#[derive(FromRow)]
struct SkillsRecord {
    skills: Json<Vec<Skill>>,
}

#[derive(FromRow)]
struct ShareRecord {
    id: Uuid,
    student_id: Uuid,
    student_email: String,
    student_name: String,
    guardian_email: String,
    status: String,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}
impl ShareRecord {
    fn to_domain(self) -> PortResult<Share> {
        let status: ShareStatus = self.status.parse().map_err(PortError::Unexpected)?;
        Ok(Share {
            id: self.id,
            student_id: self.student_id,
            student_email: self.student_email,
            student_name: self.student_name,
            guardian_email: self.guardian_email,
            status,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
        })
    }
}

fn road_type_strings(session: &Session) -> Vec<String> {
    session.road_types.iter().map(|r| r.as_str().to_string()).collect()
}

/// Durations are stored as INTEGER; the domain caps them at `i32::MAX`.
fn stored_duration(session: &Session) -> PortResult<i32> {
    i32::try_from(session.duration).map_err(|_| {
        PortError::Unexpected(format!(
            "Session {} duration {} does not fit the duration column",
            session.id, session.duration
        ))
    })
}

const SESSION_COLUMNS: &str = "id, date, duration, miles, weather, road_types, time_of_day";
const SHARE_COLUMNS: &str =
    "id, student_id, student_email, student_name, guardian_email, status, created_at, accepted_at";
const PROFILE_COLUMNS: &str =
    "account_id, name, email, date_of_birth, permit_date, total_hours_goal, night_hours_goal";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_account(&self, email: &str, hashed_password: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO accounts (id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING id, email, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(email))
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(record.to_domain().account)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let email = normalize_email(email);
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, hashed_password FROM accounts WHERE email = $1",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Account", &email))?;
        Ok(record.to_domain())
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, hashed_password FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Account", account_id))?;
        Ok(record.to_domain().account)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, account_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let account_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT account_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        account_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn get_profile(&self, account_id: Uuid) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE account_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Profile", account_id))?;
        Ok(record.to_domain())
    }

    async fn create_profile_if_absent(&self, profile: UserProfile) -> PortResult<UserProfile> {
        sqlx::query(
            "INSERT INTO profiles (account_id, name, email, date_of_birth, permit_date, \
             total_hours_goal, night_hours_goal) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(profile.account_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(profile.date_of_birth)
        .bind(profile.permit_date)
        .bind(profile.total_hours_goal)
        .bind(profile.night_hours_goal)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        self.get_profile(profile.account_id).await
    }

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET name = $2, date_of_birth = $3, permit_date = $4, \
             total_hours_goal = $5, night_hours_goal = $6 WHERE account_id = $1",
        )
        .bind(profile.account_id)
        .bind(&profile.name)
        .bind(profile.date_of_birth)
        .bind(profile.permit_date)
        .bind(profile.total_hours_goal)
        .bind(profile.night_hours_goal)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Profile {} not found",
                profile.account_id
            )));
        }
        Ok(())
    }

    async fn list_sessions(&self, account_id: Uuid) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM driving_sessions WHERE account_id = $1 ORDER BY date DESC",
            SESSION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM driving_sessions WHERE account_id = $1 AND id = $2",
            SESSION_COLUMNS
        ))
        .bind(account_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Session", session_id))?;
        record.to_domain()
    }

    async fn add_session(&self, account_id: Uuid, session: &Session) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO driving_sessions (id, account_id, date, duration, miles, weather, \
             road_types, time_of_day) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(session.id)
        .bind(account_id)
        .bind(session.date)
        .bind(stored_duration(session)?)
        .bind(session.miles)
        .bind(session.weather.as_str())
        .bind(road_type_strings(session))
        .bind(session.time_of_day.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn replace_session(&self, account_id: Uuid, session: &Session) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE driving_sessions SET date = $3, duration = $4, miles = $5, weather = $6, \
             road_types = $7, time_of_day = $8 WHERE account_id = $1 AND id = $2",
        )
        .bind(account_id)
        .bind(session.id)
        .bind(session.date)
        .bind(stored_duration(session)?)
        .bind(session.miles)
        .bind(session.weather.as_str())
        .bind(road_type_strings(session))
        .bind(session.time_of_day.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session.id)));
        }
        Ok(())
    }

    async fn delete_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM driving_sessions WHERE account_id = $1 AND id = $2")
            .bind(account_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn get_skills(&self, account_id: Uuid) -> PortResult<Option<Vec<Skill>>> {
        let record = sqlx::query_as::<_, SkillsRecord>(
            "SELECT skills FROM skills WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(record.map(|r| r.skills.0))
    }

    async fn put_skills(&self, account_id: Uuid, skills: &[Skill]) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO skills (account_id, skills) VALUES ($1, $2) \
             ON CONFLICT (account_id) DO UPDATE SET skills = EXCLUDED.skills",
        )
        .bind(account_id)
        .bind(Json(skills))
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn create_share(&self, share: &Share) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO shares ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SHARE_COLUMNS
        ))
        .bind(share.id)
        .bind(share.student_id)
        .bind(&share.student_email)
        .bind(&share.student_name)
        .bind(&share.guardian_email)
        .bind(share.status.as_str())
        .bind(share.created_at)
        .bind(share.accepted_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn list_shares_for_student(&self, student_id: Uuid) -> PortResult<Vec<Share>> {
        let records = sqlx::query_as::<_, ShareRecord>(&format!(
            "SELECT {} FROM shares WHERE student_id = $1 ORDER BY created_at ASC",
            SHARE_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_shares_for_guardian(&self, guardian_email: &str) -> PortResult<Vec<Share>> {
        let records = sqlx::query_as::<_, ShareRecord>(&format!(
            "SELECT {} FROM shares WHERE guardian_email = $1 ORDER BY created_at ASC",
            SHARE_COLUMNS
        ))
        .bind(normalize_email(guardian_email))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn accept_pending_shares(
        &self,
        guardian_email: &str,
        accepted_at: DateTime<Utc>,
    ) -> PortResult<Vec<Share>> {
        let records = sqlx::query_as::<_, ShareRecord>(&format!(
            "UPDATE shares SET status = 'accepted', accepted_at = $2 \
             WHERE guardian_email = $1 AND status = 'pending' RETURNING {}",
            SHARE_COLUMNS
        ))
        .bind(normalize_email(guardian_email))
        .bind(accepted_at)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn delete_share(&self, student_id: Uuid, share_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM shares WHERE student_id = $1 AND id = $2")
            .bind(student_id)
            .bind(share_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Share {} not found", share_id)));
        }
        Ok(())
    }
}
