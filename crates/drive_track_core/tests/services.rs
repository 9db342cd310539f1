//! Integration tests for the store-backed use cases, run against the
//! in-memory store.

use drive_track_core::memory::MemoryStore;
use drive_track_core::ports::{DatabaseService, PortError};
use drive_track_core::services::{
    authorize_read, create_invite, ensure_profile, ensure_skills, process_invites, toggle_skill,
    InviteError,
};
use drive_track_core::{Account, ShareStatus};

async fn signed_up(db: &MemoryStore, email: &str) -> Account {
    let account = db
        .create_account(email, "hash")
        .await
        .expect("account should be created");
    ensure_profile(db, &account)
        .await
        .expect("profile should be created");
    account
}

// ---------------------------------------------------------------------------
// Profiles and skills
// ---------------------------------------------------------------------------

#[tokio::test]
async fn profile_is_created_once() {
    let db = MemoryStore::new();
    let account = db.create_account("kid@example.com", "hash").await.unwrap();

    let first = ensure_profile(&db, &account).await.unwrap();
    let mut edited = first.clone();
    edited.total_hours_goal = Some(50.0);
    db.update_profile(&edited).await.unwrap();

    let second = ensure_profile(&db, &account).await.unwrap();
    assert_eq!(second.total_hours_goal, Some(50.0));
    assert_eq!(second.name.as_deref(), Some("kid"));
}

#[tokio::test]
async fn skills_are_seeded_once_and_toggled_persistently() {
    let db = MemoryStore::new();
    let account = signed_up(&db, "kid@example.com").await;

    let seeded = ensure_skills(&db, account.id).await.unwrap();
    assert_eq!(seeded.len(), 30);

    let toggled = toggle_skill(&db, account.id, 4).await.unwrap();
    assert!(toggled.completed);

    // A second visit must not reset progress.
    let again = ensure_skills(&db, account.id).await.unwrap();
    assert_eq!(again.iter().filter(|s| s.completed).count(), 1);

    let missing = toggle_skill(&db, account.id, 404).await;
    assert!(matches!(missing, Err(PortError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invite_validation_errors() {
    let db = MemoryStore::new();
    let student = signed_up(&db, "kid@example.com").await;

    assert!(matches!(
        create_invite(&db, &student, "   ").await,
        Err(InviteError::InvalidArgument(_))
    ));
    assert!(matches!(
        create_invite(&db, &student, "not-an-email").await,
        Err(InviteError::InvalidArgument(_))
    ));
    assert!(matches!(
        create_invite(&db, &student, "KID@example.com").await,
        Err(InviteError::FailedPrecondition(_))
    ));

    create_invite(&db, &student, "mom@example.com").await.unwrap();
    assert!(matches!(
        create_invite(&db, &student, "Mom@Example.com").await,
        Err(InviteError::FailedPrecondition(_))
    ));
}

#[tokio::test]
async fn invite_without_profile_is_not_found() {
    let db = MemoryStore::new();
    let ghost = db.create_account("ghost@example.com", "hash").await.unwrap();
    assert!(matches!(
        create_invite(&db, &ghost, "mom@example.com").await,
        Err(InviteError::NotFound(_))
    ));
}

#[tokio::test]
async fn processing_accepts_pending_shares_once() {
    let db = MemoryStore::new();
    let student = signed_up(&db, "kid@example.com").await;
    let share = create_invite(&db, &student, "mom@example.com").await.unwrap();
    assert_eq!(share.status, ShareStatus::Pending);

    let applied = process_invites(&db, " MOM@example.com").await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].status, ShareStatus::Accepted);
    assert!(applied[0].accepted_at.is_some());

    let again = process_invites(&db, "mom@example.com").await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn guardian_reads_only_after_acceptance() {
    let db = MemoryStore::new();
    let student = signed_up(&db, "kid@example.com").await;
    let guardian = signed_up(&db, "mom@example.com").await;
    let stranger = signed_up(&db, "other@example.com").await;

    create_invite(&db, &student, "mom@example.com").await.unwrap();
    assert!(matches!(
        authorize_read(&db, &guardian, student.id).await,
        Err(PortError::PermissionDenied(_))
    ));

    process_invites(&db, &guardian.email).await.unwrap();
    authorize_read(&db, &guardian, student.id).await.unwrap();
    authorize_read(&db, &student, student.id).await.unwrap();
    assert!(authorize_read(&db, &stranger, student.id).await.is_err());
}
