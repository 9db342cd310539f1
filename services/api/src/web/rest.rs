//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{auth, shares, state::AppState};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{NaiveDate, Utc};
use drive_track_core::ports::DatabaseService;
use drive_track_core::report::{report_file_name, DateRange, DrivingLogReport};
use drive_track_core::services::{authorize_read, ensure_profile, ensure_skills, toggle_skill};
use drive_track_core::skills::{self, SkillProgress};
use drive_track_core::{
    summarize, Account, GoalProgress, ManualEntry, ProfileUpdate, Session, Skill, SummaryFigures,
    Totals, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

const RECENT_SESSIONS: usize = 5;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        health_handler,
        get_profile_handler,
        update_profile_handler,
        dashboard_handler,
        list_sessions_handler,
        create_session_handler,
        update_session_handler,
        delete_session_handler,
        driving_log_handler,
        export_log_handler,
        list_skills_handler,
        toggle_skill_handler,
        shares::list_shares_handler,
        shares::create_share_handler,
        shares::delete_share_handler,
        shares::process_shares_handler,
        shares::list_students_handler,
        student_profile_handler,
        student_dashboard_handler,
        student_sessions_handler,
        student_skills_handler,
        student_log_handler,
        student_export_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            shares::InviteRequest,
            shares::SharesResponse,
            HealthResponse,
            ProfileResponse,
            DashboardResponse,
            SessionsResponse,
            SessionResponse,
            DrivingLogResponse,
            SkillsResponse,
        )
    ),
    tags(
        (name = "Drive-Track API", description = "Practice-driving logbook: sessions, goals, skills and guardian sharing.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = Object)]
    pub profile: UserProfile,
}

/// Everything the dashboard shows in one payload.
#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(value_type = Object)]
    pub profile: UserProfile,
    /// The three headline figures, one decimal each.
    #[schema(value_type = Object)]
    pub summary: SummaryFigures,
    #[schema(value_type = Object)]
    pub totals: Totals,
    #[schema(value_type = Object)]
    pub total_hours_progress: GoalProgress,
    #[schema(value_type = Object)]
    pub night_hours_progress: GoalProgress,
    #[schema(value_type = Object)]
    pub skills: SkillProgress,
    #[schema(value_type = Vec<Object>)]
    pub completed_skills: Vec<Skill>,
    #[schema(value_type = Vec<Object>)]
    pub recent_sessions: Vec<Session>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub sessions: Vec<Session>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    #[schema(value_type = Object)]
    pub session: Session,
}

#[derive(Serialize, ToSchema)]
pub struct DrivingLogResponse {
    #[schema(value_type = Object)]
    pub summary: SummaryFigures,
    #[schema(value_type = Object)]
    pub totals: Totals,
    /// Newest first.
    #[schema(value_type = Vec<Object>)]
    pub sessions: Vec<Session>,
}

#[derive(Serialize, ToSchema)]
pub struct SkillsResponse {
    #[schema(value_type = Vec<Object>)]
    pub skills: Vec<Skill>,
    #[schema(value_type = Object)]
    pub progress: SkillProgress,
}

/// Optional inclusive date range. Both ends or neither.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RangeQuery {
    fn resolve(&self) -> Result<Option<DateRange>, ApiError> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some(DateRange { start, end })),
            (Some(_), Some(_)) => Err(ApiError::BadRequest(
                "The start date must not be after the end date".to_string(),
            )),
            _ => Err(ApiError::BadRequest(
                "Both start and end are required for a date range".to_string(),
            )),
        }
    }
}

//=========================================================================================
// Shared Builders
//=========================================================================================

async fn build_dashboard(
    db: &dyn DatabaseService,
    profile: UserProfile,
    skill_list: Vec<Skill>,
) -> Result<DashboardResponse, ApiError> {
    let sessions = db.list_sessions(profile.account_id).await?;
    let totals = summarize(&sessions);
    let total_hours_progress = GoalProgress::compute(totals.total_hours(), profile.total_hours_goal);
    let night_hours_progress = GoalProgress::compute(totals.night_hours(), profile.night_hours_goal);
    let skill_progress = skills::progress(&skill_list);

    Ok(DashboardResponse {
        summary: totals.formatted(),
        totals,
        total_hours_progress,
        night_hours_progress,
        skills: skill_progress,
        completed_skills: skill_list.into_iter().filter(|s| s.completed).collect(),
        recent_sessions: sessions.into_iter().take(RECENT_SESSIONS).collect(),
        profile,
    })
}

async fn build_log(
    db: &dyn DatabaseService,
    profile: &UserProfile,
    range: Option<DateRange>,
) -> Result<DrivingLogReport, ApiError> {
    let sessions = db.list_sessions(profile.account_id).await?;
    Ok(DrivingLogReport::build(&sessions, Some(profile), range, Utc::now()))
}

fn log_response(report: DrivingLogReport) -> DrivingLogResponse {
    DrivingLogResponse {
        summary: report.figures(),
        totals: report.totals,
        sessions: report.sessions,
    }
}

fn export_response(
    report: &DrivingLogReport,
    range: Option<DateRange>,
) -> ([(HeaderName, String); 2], String) {
    let file_name = report_file_name(report.driver.as_ref(), range, Utc::now().date_naive());
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        report.render_text(),
    )
}

/// A student's checklist as a guardian sees it. Never seeds: a student who has
/// not opened the checklist yet shows the catalog with nothing completed.
async fn student_skills(db: &dyn DatabaseService, student_id: Uuid) -> Result<Vec<Skill>, ApiError> {
    Ok(db
        .get_skills(student_id)
        .await?
        .unwrap_or_else(skills::catalog))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Returns the caller's profile, creating it on first use.
#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "The caller's profile", body = ProfileResponse))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = ensure_profile(state.db.as_ref(), &account).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// Replaces the editable profile fields. A goal of zero clears the goal.
#[utoipa::path(
    put,
    path = "/profile",
    request_body(content_type = "application/json", description = "name, date_of_birth, permit_date, total_hours_goal, night_hours_goal"),
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Negative goal")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut profile = ensure_profile(state.db.as_ref(), &account).await?;
    profile.apply(update)?;
    state.db.update_profile(&profile).await?;
    info!("Profile updated for account {}", account.id);
    Ok(Json(ProfileResponse { profile }))
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Summary, goal progress, badges and recent sessions", body = DashboardResponse))
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let db = state.db.as_ref();
    let profile = ensure_profile(db, &account).await?;
    let skill_list = ensure_skills(db, account.id).await?;
    Ok(Json(build_dashboard(db, profile, skill_list).await?))
}

#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "All sessions, newest first", body = SessionsResponse))
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.db.list_sessions(account.id).await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// Logs a session by hand. Duration is given in minutes.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body(content_type = "application/json", description = "date, duration_minutes, miles, weather, road_types, time_of_day"),
    responses(
        (status = 201, description = "Session stored", body = SessionResponse),
        (status = 400, description = "Session failed validation")
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Json(entry): Json<ManualEntry>,
) -> Result<impl IntoResponse, ApiError> {
    let session = entry.into_session()?;
    state.db.add_session(account.id, &session).await?;
    info!("Manual session {} logged for account {}", session.id, account.id);
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// Replaces a stored session with the submitted values.
#[utoipa::path(
    put,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body(content_type = "application/json", description = "date, duration_minutes, miles, weather, road_types, time_of_day"),
    responses(
        (status = 200, description = "Session replaced", body = SessionResponse),
        (status = 400, description = "Session failed validation"),
        (status = 404, description = "No such session")
    )
)]
pub async fn update_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(session_id): Path<Uuid>,
    Json(entry): Json<ManualEntry>,
) -> Result<Json<SessionResponse>, ApiError> {
    state.db.get_session(account.id, session_id).await?;
    let mut session = entry.into_session()?;
    session.id = session_id;
    state.db.replace_session(account.id, &session).await?;
    info!("Session {} edited by account {}", session_id, account.id);
    Ok(Json(SessionResponse { session }))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "No such session")
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_session(account.id, session_id).await?;
    info!("Session {} deleted by account {}", session_id, account.id);
    Ok(StatusCode::NO_CONTENT)
}

/// The full log with its summary, optionally limited to a date range.
#[utoipa::path(
    get,
    path = "/reports/logs",
    params(RangeQuery),
    responses(
        (status = 200, description = "Summary and sessions", body = DrivingLogResponse),
        (status = 400, description = "Incomplete or inverted range")
    )
)]
pub async fn driving_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<DrivingLogResponse>, ApiError> {
    let range = range.resolve()?;
    let profile = ensure_profile(state.db.as_ref(), &account).await?;
    let report = build_log(state.db.as_ref(), &profile, range).await?;
    Ok(Json(log_response(report)))
}

/// Downloads the log as a text document.
#[utoipa::path(
    get,
    path = "/reports/logs/export",
    params(RangeQuery),
    responses(
        (status = 200, description = "The rendered report", body = String, content_type = "text/plain"),
        (status = 400, description = "Incomplete or inverted range")
    )
)]
pub async fn export_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = range.resolve()?;
    let profile = ensure_profile(state.db.as_ref(), &account).await?;
    let report = build_log(state.db.as_ref(), &profile, range).await?;
    info!("Exporting driving log for account {}", account.id);
    Ok(export_response(&report, range))
}

/// The checklist, seeded from the catalog on first visit.
#[utoipa::path(
    get,
    path = "/skills",
    responses((status = 200, description = "Skills and completion", body = SkillsResponse))
)]
pub async fn list_skills_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<SkillsResponse>, ApiError> {
    let skill_list = ensure_skills(state.db.as_ref(), account.id).await?;
    let progress = skills::progress(&skill_list);
    Ok(Json(SkillsResponse {
        skills: skill_list,
        progress,
    }))
}

#[utoipa::path(
    post,
    path = "/skills/{id}/toggle",
    params(("id" = u32, Path, description = "Skill id")),
    responses(
        (status = 200, description = "The skill after the flip"),
        (status = 404, description = "No such skill")
    )
)]
pub async fn toggle_skill_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(skill_id): Path<u32>,
) -> Result<Json<Skill>, ApiError> {
    let skill = toggle_skill(state.db.as_ref(), account.id, skill_id).await?;
    Ok(Json(skill))
}

/// A shared student's profile. Read-only; needs an accepted share.
#[utoipa::path(
    get,
    path = "/students/{id}/profile",
    params(("id" = Uuid, Path, description = "Student account id")),
    responses(
        (status = 200, description = "The student's profile", body = ProfileResponse),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, ApiError> {
    authorize_read(state.db.as_ref(), &account, student_id).await?;
    let profile = state.db.get_profile(student_id).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// A shared student's dashboard. Read-only; needs an accepted share.
#[utoipa::path(
    get,
    path = "/students/{id}/dashboard",
    params(("id" = Uuid, Path, description = "Student account id")),
    responses(
        (status = 200, description = "The student's dashboard", body = DashboardResponse),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let db = state.db.as_ref();
    authorize_read(db, &account, student_id).await?;
    let profile = db.get_profile(student_id).await?;
    let skill_list = student_skills(db, student_id).await?;
    Ok(Json(build_dashboard(db, profile, skill_list).await?))
}

#[utoipa::path(
    get,
    path = "/students/{id}/sessions",
    params(("id" = Uuid, Path, description = "Student account id")),
    responses(
        (status = 200, description = "The student's sessions, newest first", body = SessionsResponse),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<SessionsResponse>, ApiError> {
    authorize_read(state.db.as_ref(), &account, student_id).await?;
    let sessions = state.db.list_sessions(student_id).await?;
    Ok(Json(SessionsResponse { sessions }))
}

#[utoipa::path(
    get,
    path = "/students/{id}/skills",
    params(("id" = Uuid, Path, description = "Student account id")),
    responses(
        (status = 200, description = "The student's checklist", body = SkillsResponse),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_skills_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<SkillsResponse>, ApiError> {
    authorize_read(state.db.as_ref(), &account, student_id).await?;
    let skill_list = student_skills(state.db.as_ref(), student_id).await?;
    let progress = skills::progress(&skill_list);
    Ok(Json(SkillsResponse {
        skills: skill_list,
        progress,
    }))
}

#[utoipa::path(
    get,
    path = "/students/{id}/reports/logs",
    params(("id" = Uuid, Path, description = "Student account id"), RangeQuery),
    responses(
        (status = 200, description = "The student's summary and sessions", body = DrivingLogResponse),
        (status = 400, description = "Incomplete or inverted range"),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<DrivingLogResponse>, ApiError> {
    let db = state.db.as_ref();
    authorize_read(db, &account, student_id).await?;
    let range = range.resolve()?;
    let profile = db.get_profile(student_id).await?;
    let report = build_log(db, &profile, range).await?;
    Ok(Json(log_response(report)))
}

#[utoipa::path(
    get,
    path = "/students/{id}/reports/logs/export",
    params(("id" = Uuid, Path, description = "Student account id"), RangeQuery),
    responses(
        (status = 200, description = "The student's rendered report", body = String, content_type = "text/plain"),
        (status = 400, description = "Incomplete or inverted range"),
        (status = 403, description = "No accepted share")
    )
)]
pub async fn student_export_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(student_id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.as_ref();
    authorize_read(db, &account, student_id).await?;
    let range = range.resolve()?;
    let profile = db.get_profile(student_id).await?;
    let report = build_log(db, &profile, range).await?;
    info!(
        "Account {} exporting the driving log of student {}",
        account.id, student_id
    );
    Ok(export_response(&report, range))
}
