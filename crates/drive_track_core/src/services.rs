//! crates/drive_track_core/src/services.rs
//!
//! Use cases that combine domain rules with the store port: lazy profile
//! creation, skill seeding, guardian invitations and share-based read access.

use crate::domain::{normalize_email, Account, Share, Skill, UserProfile};
use crate::ports::{DatabaseService, PortError};
use crate::skills;
use chrono::Utc;
use uuid::Uuid;
use validator::ValidateEmail;

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for InviteError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => InviteError::NotFound(what),
            other => InviteError::Port(other),
        }
    }
}

/// Returns the account's profile, creating the initial one on first use.
pub async fn ensure_profile(
    db: &dyn DatabaseService,
    account: &Account,
) -> Result<UserProfile, PortError> {
    match db.get_profile(account.id).await {
        Ok(profile) => Ok(profile),
        Err(PortError::NotFound(_)) => {
            db.create_profile_if_absent(UserProfile::initial_for(account))
                .await
        }
        Err(e) => Err(e),
    }
}

/// Returns the account's skill list, seeding the full catalog on first visit.
pub async fn ensure_skills(
    db: &dyn DatabaseService,
    account_id: Uuid,
) -> Result<Vec<Skill>, PortError> {
    if let Some(existing) = db.get_skills(account_id).await? {
        return Ok(existing);
    }
    let seeded = skills::catalog();
    db.put_skills(account_id, &seeded).await?;
    Ok(seeded)
}

/// Flips one skill's completion flag and persists the whole list.
pub async fn toggle_skill(
    db: &dyn DatabaseService,
    account_id: Uuid,
    skill_id: u32,
) -> Result<Skill, PortError> {
    let mut list = ensure_skills(db, account_id).await?;
    skills::toggle(&mut list, skill_id)
        .ok_or_else(|| PortError::NotFound(format!("Skill {} not found", skill_id)))?;
    db.put_skills(account_id, &list).await?;
    list.into_iter()
        .find(|s| s.id == skill_id)
        .ok_or_else(|| PortError::NotFound(format!("Skill {} not found", skill_id)))
}

/// Creates a pending share from `student` to `guardian_email`.
pub async fn create_invite(
    db: &dyn DatabaseService,
    student: &Account,
    guardian_email: &str,
) -> Result<Share, InviteError> {
    let guardian = normalize_email(guardian_email);
    if guardian.is_empty() {
        return Err(InviteError::InvalidArgument("Guardian email is required".into()));
    }
    if !guardian.validate_email() {
        return Err(InviteError::InvalidArgument(format!(
            "'{}' is not a valid email address",
            guardian_email.trim()
        )));
    }
    if guardian == normalize_email(&student.email) {
        return Err(InviteError::FailedPrecondition(
            "You cannot share your account with yourself".into(),
        ));
    }

    let profile = db.get_profile(student.id).await?;
    let existing = db.list_shares_for_student(student.id).await?;
    if existing.iter().any(|s| s.guardian_email == guardian) {
        return Err(InviteError::FailedPrecondition(format!(
            "Account is already shared with {}",
            guardian
        )));
    }

    let share = Share::pending(&profile, &student.email, &guardian);
    db.create_share(&share).await?;
    Ok(share)
}

/// Activates every pending share addressed to `email`. Returns the shares that
/// were accepted by this call.
pub async fn process_invites(
    db: &dyn DatabaseService,
    email: &str,
) -> Result<Vec<Share>, PortError> {
    let guardian = normalize_email(email);
    if guardian.is_empty() {
        return Ok(Vec::new());
    }
    db.accept_pending_shares(&guardian, Utc::now()).await
}

/// Resolves which account's data `viewer` may read when asking for `student_id`.
/// Owners always may; guardians only through an accepted share.
pub async fn authorize_read(
    db: &dyn DatabaseService,
    viewer: &Account,
    student_id: Uuid,
) -> Result<(), PortError> {
    if viewer.id == student_id {
        return Ok(());
    }
    let shares = db
        .list_shares_for_guardian(&normalize_email(&viewer.email))
        .await?;
    if shares
        .iter()
        .any(|s| s.student_id == student_id && s.is_accepted())
    {
        Ok(())
    } else {
        Err(PortError::PermissionDenied(format!(
            "No accepted share for student {}",
            student_id
        )))
    }
}
