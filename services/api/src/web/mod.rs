pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod shares;
pub mod state;
pub mod tracking_task;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

// Re-export the main WebSocket handler and the auth guard to make them easily
// accessible to the binary that builds the web server.
pub use middleware::require_auth;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds every API route over `app_state`. CORS and the Swagger UI are
/// layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(rest::get_profile_handler).put(rest::update_profile_handler),
        )
        .route("/dashboard", get(rest::dashboard_handler))
        .route(
            "/sessions",
            get(rest::list_sessions_handler).post(rest::create_session_handler),
        )
        .route(
            "/sessions/{id}",
            put(rest::update_session_handler).delete(rest::delete_session_handler),
        )
        .route("/reports/logs", get(rest::driving_log_handler))
        .route("/reports/logs/export", get(rest::export_log_handler))
        .route("/skills", get(rest::list_skills_handler))
        .route("/skills/{id}/toggle", post(rest::toggle_skill_handler))
        .route(
            "/shares",
            get(shares::list_shares_handler).post(shares::create_share_handler),
        )
        .route("/shares/process", post(shares::process_shares_handler))
        .route("/shares/{id}", delete(shares::delete_share_handler))
        .route("/students", get(shares::list_students_handler))
        .route("/students/{id}/profile", get(rest::student_profile_handler))
        .route(
            "/students/{id}/dashboard",
            get(rest::student_dashboard_handler),
        )
        .route(
            "/students/{id}/sessions",
            get(rest::student_sessions_handler),
        )
        .route("/students/{id}/skills", get(rest::student_skills_handler))
        .route(
            "/students/{id}/reports/logs",
            get(rest::student_log_handler),
        )
        .route(
            "/students/{id}/reports/logs/export",
            get(rest::student_export_handler),
        )
        .route("/track", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
