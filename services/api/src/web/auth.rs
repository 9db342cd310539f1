//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use drive_track_core::ports::{AuthGrant, Platform, PortError};
use drive_track_core::services::ensure_profile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::error::ApiError;
use crate::web::middleware::{extract_token, SESSION_COOKIE};
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub account_id: Uuid,
    pub email: String,
    /// Bearer token for native clients. Web clients get a cookie instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie(grant: &AuthGrant) -> String {
    let max_age = (grant.expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, grant.token, max_age
    )
}

fn cleared_cookie() -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Builds the response for a fresh grant: a cookie on the web, the token in
/// the body for native shells.
fn grant_response(
    platform: Platform,
    status: StatusCode,
    grant: AuthGrant,
) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    let token = match platform {
        Platform::Web => {
            if let Ok(cookie) = session_cookie(&grant).parse() {
                headers.insert(header::SET_COOKIE, cookie);
            }
            None
        }
        Platform::Native => Some(grant.token.clone()),
    };
    let body = AuthResponse {
        account_id: grant.account.id,
        email: grant.account.email,
        token,
        expires_at: grant.expires_at,
    };
    (status, headers, Json(body)).into_response()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim();
    if !email.validate_email() {
        return Err(ApiError::BadRequest(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let grant = state.auth.sign_up(email, &req.password).await?;
    ensure_profile(state.db.as_ref(), &grant.account).await?;
    info!("New account registered: {}", grant.account.id);

    Ok(grant_response(
        state.auth.platform(),
        StatusCode::CREATED,
        grant,
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = state.auth.sign_in(req.email.trim(), &req.password).await?;
    ensure_profile(state.db.as_ref(), &grant.account).await?;

    Ok(grant_response(state.auth.platform(), StatusCode::OK, grant))
}

/// POST /auth/logout - Logout and invalidate the credential
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let platform = state.auth.platform();
    let token = extract_token(&headers, platform).ok_or(ApiError::Port(PortError::Unauthorized))?;
    state.auth.sign_out(&token).await?;

    let mut response_headers = HeaderMap::new();
    if platform == Platform::Web {
        if let Ok(cookie) = cleared_cookie().parse() {
            response_headers.insert(header::SET_COOKIE, cookie);
        }
    }
    Ok((StatusCode::OK, response_headers))
}
