//! crates/drive_track_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! identity providers.

use crate::domain::{Account, AccountCredentials, Session, Share, Skill, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use tokio::sync::broadcast;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid email or password")]
    InvalidCredential,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Authentication Port
//=========================================================================================

/// The kind of client the service is deployed for. Web clients keep a
/// server-side session behind a cookie; native shells carry a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Native,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "native" | "ios" | "android" => Ok(Platform::Native),
            other => Err(format!("'{}' is not a known platform", other)),
        }
    }
}

/// A successful sign-in: who signed in and the token that proves it.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub account: Account,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Notifications published on every auth state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Account),
    SignedOut(Uuid),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn platform(&self) -> Platform;

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthGrant>;

    /// Fails with `PortError::InvalidCredential` for an unknown email or a
    /// wrong password.
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthGrant>;

    async fn sign_out(&self, token: &str) -> PortResult<()>;

    /// Resolves a token to its account; `None` when the token is unknown,
    /// expired or revoked.
    async fn current_account(&self, token: &str) -> PortResult<Option<Account>>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

//=========================================================================================
// Document Store Port
//=========================================================================================

/// Every per-user collection is keyed by the owning account; callers can only
/// reach records through their own `account_id`.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    async fn create_account(&self, email: &str, hashed_password: &str) -> PortResult<Account>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account>;

    // --- Web Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning account for a live, unexpired session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Profiles ---
    async fn get_profile(&self, account_id: Uuid) -> PortResult<UserProfile>;

    /// Stores `profile` unless one already exists; returns whichever is stored.
    async fn create_profile_if_absent(&self, profile: UserProfile) -> PortResult<UserProfile>;

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<()>;

    // --- Driving Sessions ---
    /// Newest first.
    async fn list_sessions(&self, account_id: Uuid) -> PortResult<Vec<Session>>;

    async fn get_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<Session>;

    async fn add_session(&self, account_id: Uuid, session: &Session) -> PortResult<()>;

    async fn replace_session(&self, account_id: Uuid, session: &Session) -> PortResult<()>;

    async fn delete_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<()>;

    // --- Skills ---
    /// `None` until the catalog has been seeded for this profile.
    async fn get_skills(&self, account_id: Uuid) -> PortResult<Option<Vec<Skill>>>;

    async fn put_skills(&self, account_id: Uuid, skills: &[Skill]) -> PortResult<()>;

    // --- Shares ---
    async fn create_share(&self, share: &Share) -> PortResult<()>;

    async fn list_shares_for_student(&self, student_id: Uuid) -> PortResult<Vec<Share>>;

    async fn list_shares_for_guardian(&self, guardian_email: &str) -> PortResult<Vec<Share>>;

    /// Marks every pending share for `guardian_email` accepted and returns them.
    async fn accept_pending_shares(
        &self,
        guardian_email: &str,
        accepted_at: DateTime<Utc>,
    ) -> PortResult<Vec<Share>>;

    async fn delete_share(&self, student_id: Uuid, share_id: Uuid) -> PortResult<()>;
}
