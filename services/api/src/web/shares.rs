//! services/api/src/web/shares.rs
//!
//! Guardian sharing: the invite endpoints, and the listener that accepts
//! pending invites whenever someone signs in.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use drive_track_core::ports::{AuthEvent, AuthProvider, DatabaseService};
use drive_track_core::services::{create_invite, process_invites};
use drive_track_core::{Account, Share};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct InviteRequest {
    pub guardian_email: String,
}

#[derive(Serialize, ToSchema)]
pub struct SharesResponse {
    #[schema(value_type = Vec<Object>)]
    pub shares: Vec<Share>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Lists the guardians this account has invited.
#[utoipa::path(
    get,
    path = "/shares",
    responses((status = 200, description = "Shares owned by the caller", body = SharesResponse))
)]
pub async fn list_shares_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<SharesResponse>, ApiError> {
    let shares = state.db.list_shares_for_student(account.id).await?;
    Ok(Json(SharesResponse { shares }))
}

/// Invites a guardian by email.
#[utoipa::path(
    post,
    path = "/shares",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Pending share created"),
        (status = 400, description = "Missing or malformed email"),
        (status = 404, description = "Caller has no profile"),
        (status = 412, description = "Self-invite or already shared")
    )
)]
pub async fn create_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let share = create_invite(state.db.as_ref(), &account, &req.guardian_email).await?;
    info!(
        "Account {} invited guardian {}",
        account.id, share.guardian_email
    );
    Ok((StatusCode::CREATED, Json(share)))
}

/// Revokes one of the caller's shares.
#[utoipa::path(
    delete,
    path = "/shares/{id}",
    params(("id" = Uuid, Path, description = "Share id")),
    responses(
        (status = 204, description = "Share revoked"),
        (status = 404, description = "No such share")
    )
)]
pub async fn delete_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
    Path(share_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_share(account.id, share_id).await?;
    info!("Account {} revoked share {}", account.id, share_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts every pending invite addressed to the caller's email.
#[utoipa::path(
    post,
    path = "/shares/process",
    responses((status = 200, description = "Shares accepted by this call", body = SharesResponse))
)]
pub async fn process_shares_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<SharesResponse>, ApiError> {
    let shares = process_invites(state.db.as_ref(), &account.email).await?;
    Ok(Json(SharesResponse { shares }))
}

/// Lists the students who shared their account with the caller.
#[utoipa::path(
    get,
    path = "/students",
    responses((status = 200, description = "Accepted shares addressed to the caller", body = SharesResponse))
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<SharesResponse>, ApiError> {
    let shares = state
        .db
        .list_shares_for_guardian(&account.email)
        .await?
        .into_iter()
        .filter(Share::is_accepted)
        .collect();
    Ok(Json(SharesResponse { shares }))
}

//=========================================================================================
// Sign-In Listener
//=========================================================================================

/// Runs `process_invites` for every account that signs in, for as long as the
/// auth provider keeps publishing.
pub fn spawn_invite_listener(
    auth: Arc<dyn AuthProvider>,
    db: Arc<dyn DatabaseService>,
) -> JoinHandle<()> {
    let mut events = auth.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn(account)) => {
                    match process_invites(db.as_ref(), &account.email).await {
                        Ok(accepted) if !accepted.is_empty() => info!(
                            "Accepted {} pending invite(s) for {}",
                            accepted.len(),
                            account.email
                        ),
                        Ok(_) => {}
                        Err(e) => error!("Failed to process invites for {}: {:?}", account.email, e),
                    }
                }
                Ok(AuthEvent::SignedOut(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Invite listener fell behind by {} auth event(s)", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("Auth event stream closed. Invite listener exiting.");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::WebSessionAuth;
    use drive_track_core::memory::MemoryStore;
    use drive_track_core::services::ensure_profile;
    use drive_track_core::ShareStatus;
    use std::time::Duration;

    #[tokio::test]
    async fn signing_in_accepts_pending_invites() {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryStore::new());
        let auth = Arc::new(WebSessionAuth::new(db.clone(), 30));
        let listener = spawn_invite_listener(auth.clone(), db.clone());

        let student = auth.sign_up("student@example.com", "hunter22").await.unwrap();
        ensure_profile(db.as_ref(), &student.account).await.unwrap();
        create_invite(db.as_ref(), &student.account, "Parent@Example.com")
            .await
            .unwrap();

        auth.sign_up("parent@example.com", "hunter22").await.unwrap();

        let mut accepted = false;
        for _ in 0..50 {
            let shares = db.list_shares_for_student(student.account.id).await.unwrap();
            if shares[0].status == ShareStatus::Accepted {
                accepted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(accepted);
        listener.abort();
    }
}
