//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use drive_track_core::ports::{PortError, Platform};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Pulls the credential the configured platform uses out of the headers: the
/// `session` cookie on the web, an `Authorization: Bearer` token on native.
pub fn extract_token(headers: &HeaderMap, platform: Platform) -> Option<String> {
    match platform {
        Platform::Web => headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())?
            .split(';')
            .find_map(|c| c.trim().strip_prefix("session="))
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        Platform::Native => headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    }
}

/// Middleware that resolves the caller's credential to an `Account`.
///
/// If valid, inserts the account into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers(), state.auth.platform())
        .ok_or(ApiError::Port(PortError::Unauthorized))?;

    let account = state
        .auth
        .current_account(&token)
        .await?
        .ok_or_else(|| {
            debug!("Rejected unknown or expired credential");
            ApiError::Port(PortError::Unauthorized)
        })?;

    req.extensions_mut().insert(account);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_the_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(extract_token(&headers, Platform::Web).as_deref(), Some("abc-123"));
        assert_eq!(extract_token(&headers, Platform::Native), None);
    }

    #[test]
    fn finds_the_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok.en"));
        assert_eq!(extract_token(&headers, Platform::Native).as_deref(), Some("tok.en"));
        assert_eq!(extract_token(&headers, Platform::Web), None);
    }
}
