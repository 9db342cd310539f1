//! crates/drive_track_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used by the test
//! suites and by the API when it runs with `STORAGE=memory`.

use crate::domain::{
    normalize_email, Account, AccountCredentials, Session, Share, ShareStatus, Skill, UserProfile,
};
use crate::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    credentials: HashMap<Uuid, AccountCredentials>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, UserProfile>,
    sessions: HashMap<Uuid, Vec<Session>>,
    skills: HashMap<Uuid, Vec<Skill>>,
    shares: Vec<Share>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.date.cmp(&a.date));
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn create_account(&self, email: &str, hashed_password: &str) -> PortResult<Account> {
        let email = normalize_email(email);
        let mut t = self.tables.write().await;
        if t.credentials.values().any(|c| c.account.email == email) {
            return Err(PortError::Conflict(format!("Email {} already registered", email)));
        }
        let account = Account { id: Uuid::new_v4(), email };
        t.credentials.insert(
            account.id,
            AccountCredentials {
                account: account.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(account)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let email = normalize_email(email);
        let t = self.tables.read().await;
        t.credentials
            .values()
            .find(|c| c.account.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let t = self.tables.read().await;
        t.credentials
            .get(&account_id)
            .map(|c| c.account.clone())
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", account_id)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut t = self.tables.write().await;
        t.auth_sessions
            .insert(session_id.to_string(), (account_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let t = self.tables.read().await;
        match t.auth_sessions.get(session_id) {
            Some((account_id, expires_at)) if *expires_at > Utc::now() => Ok(*account_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut t = self.tables.write().await;
        t.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn get_profile(&self, account_id: Uuid) -> PortResult<UserProfile> {
        let t = self.tables.read().await;
        t.profiles
            .get(&account_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", account_id)))
    }

    async fn create_profile_if_absent(&self, profile: UserProfile) -> PortResult<UserProfile> {
        let mut t = self.tables.write().await;
        Ok(t.profiles
            .entry(profile.account_id)
            .or_insert(profile)
            .clone())
    }

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<()> {
        let mut t = self.tables.write().await;
        match t.profiles.get_mut(&profile.account_id) {
            Some(stored) => {
                *stored = profile.clone();
                Ok(())
            }
            None => Err(PortError::NotFound(format!(
                "Profile {} not found",
                profile.account_id
            ))),
        }
    }

    async fn list_sessions(&self, account_id: Uuid) -> PortResult<Vec<Session>> {
        let t = self.tables.read().await;
        let mut sessions = t.sessions.get(&account_id).cloned().unwrap_or_default();
        sort_newest_first(&mut sessions);
        Ok(sessions)
    }

    async fn get_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<Session> {
        let t = self.tables.read().await;
        t.sessions
            .get(&account_id)
            .and_then(|list| list.iter().find(|s| s.id == session_id))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn add_session(&self, account_id: Uuid, session: &Session) -> PortResult<()> {
        let mut t = self.tables.write().await;
        t.sessions.entry(account_id).or_default().push(session.clone());
        Ok(())
    }

    async fn replace_session(&self, account_id: Uuid, session: &Session) -> PortResult<()> {
        let mut t = self.tables.write().await;
        let stored = t
            .sessions
            .get_mut(&account_id)
            .and_then(|list| list.iter_mut().find(|s| s.id == session.id))
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        *stored = session.clone();
        Ok(())
    }

    async fn delete_session(&self, account_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut t = self.tables.write().await;
        let list = t
            .sessions
            .get_mut(&account_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        let before = list.len();
        list.retain(|s| s.id != session_id);
        if list.len() == before {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn get_skills(&self, account_id: Uuid) -> PortResult<Option<Vec<Skill>>> {
        let t = self.tables.read().await;
        Ok(t.skills.get(&account_id).cloned())
    }

    async fn put_skills(&self, account_id: Uuid, skills: &[Skill]) -> PortResult<()> {
        let mut t = self.tables.write().await;
        t.skills.insert(account_id, skills.to_vec());
        Ok(())
    }

    async fn create_share(&self, share: &Share) -> PortResult<()> {
        let mut t = self.tables.write().await;
        if t.shares
            .iter()
            .any(|s| s.student_id == share.student_id && s.guardian_email == share.guardian_email)
        {
            return Err(PortError::Conflict(format!(
                "Share with {} already exists",
                share.guardian_email
            )));
        }
        t.shares.push(share.clone());
        Ok(())
    }

    async fn list_shares_for_student(&self, student_id: Uuid) -> PortResult<Vec<Share>> {
        let t = self.tables.read().await;
        Ok(t.shares
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_shares_for_guardian(&self, guardian_email: &str) -> PortResult<Vec<Share>> {
        let email = normalize_email(guardian_email);
        let t = self.tables.read().await;
        Ok(t.shares
            .iter()
            .filter(|s| s.guardian_email == email)
            .cloned()
            .collect())
    }

    async fn accept_pending_shares(
        &self,
        guardian_email: &str,
        accepted_at: DateTime<Utc>,
    ) -> PortResult<Vec<Share>> {
        let email = normalize_email(guardian_email);
        let mut t = self.tables.write().await;
        let mut accepted = Vec::new();
        for share in t
            .shares
            .iter_mut()
            .filter(|s| s.guardian_email == email && s.status == ShareStatus::Pending)
        {
            share.status = ShareStatus::Accepted;
            share.accepted_at = Some(accepted_at);
            accepted.push(share.clone());
        }
        Ok(accepted)
    }

    async fn delete_share(&self, student_id: Uuid, share_id: Uuid) -> PortResult<()> {
        let mut t = self.tables.write().await;
        let before = t.shares.len();
        t.shares
            .retain(|s| !(s.id == share_id && s.student_id == student_id));
        if t.shares.len() == before {
            return Err(PortError::NotFound(format!("Share {} not found", share_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deleting_from_an_unknown_account_leaves_no_trace() {
        let store = MemoryStore::new();
        let err = store
            .delete_session(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.tables.read().await.sessions.is_empty());
    }
}
