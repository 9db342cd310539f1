//! services/api/src/adapters/auth.rs
//!
//! The two implementations of the `AuthProvider` port. Web clients get an
//! opaque session id stored server-side and carried in a cookie. Native shells
//! get a signed HS256 JWT carried as a bearer token; signing out records the
//! token's id until the token would have expired anyway.
//!
//! Both hash passwords with argon2 and publish every sign-in and sign-out on a
//! broadcast channel.

use crate::config::Config;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use drive_track_core::domain::Account;
use drive_track_core::ports::{
    AuthEvent, AuthGrant, AuthProvider, DatabaseService, Platform, PortError, PortResult,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

//=========================================================================================
// Password Helpers
//=========================================================================================

fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed: &str) -> PortResult<()> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PortError::InvalidCredential)
}

/// Checks the credentials against the store. Unknown emails and wrong
/// passwords are indistinguishable to the caller.
async fn check_credentials(
    db: &dyn DatabaseService,
    email: &str,
    password: &str,
) -> PortResult<Account> {
    let creds = db.get_credentials_by_email(email).await.map_err(|e| match e {
        PortError::NotFound(_) => PortError::InvalidCredential,
        other => other,
    })?;
    verify_password(password, &creds.hashed_password)?;
    Ok(creds.account)
}

async fn register(db: &dyn DatabaseService, email: &str, password: &str) -> PortResult<Account> {
    let hashed = hash_password(password)?;
    db.create_account(email, &hashed).await
}

//=========================================================================================
// Web: Server-Side Sessions
//=========================================================================================

pub struct WebSessionAuth {
    db: Arc<dyn DatabaseService>,
    session_ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl WebSessionAuth {
    pub fn new(db: Arc<dyn DatabaseService>, session_days: i64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            session_ttl: Duration::days(session_days),
            events,
        }
    }

    async fn open_session(&self, account: Account) -> PortResult<AuthGrant> {
        let auth_session_id = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.session_ttl;
        self.db
            .create_auth_session(&auth_session_id, account.id, expires_at)
            .await?;
        info!("Opened web session for account {}", account.id);
        let _ = self.events.send(AuthEvent::SignedIn(account.clone()));
        Ok(AuthGrant {
            account,
            token: auth_session_id,
            expires_at,
        })
    }
}

#[async_trait]
impl AuthProvider for WebSessionAuth {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        let account = register(self.db.as_ref(), email, password).await?;
        self.open_session(account).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        let account = check_credentials(self.db.as_ref(), email, password).await?;
        self.open_session(account).await
    }

    async fn sign_out(&self, token: &str) -> PortResult<()> {
        let owner = self.db.validate_auth_session(token).await.ok();
        self.db.delete_auth_session(token).await?;
        if let Some(account_id) = owner {
            info!("Closed web session for account {}", account_id);
            let _ = self.events.send(AuthEvent::SignedOut(account_id));
        }
        Ok(())
    }

    async fn current_account(&self, token: &str) -> PortResult<Option<Account>> {
        let account_id = match self.db.validate_auth_session(token).await {
            Ok(id) => id,
            Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.db.get_account(account_id).await.map(Some)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

//=========================================================================================
// Native: Bearer JWTs
//=========================================================================================

/// Claims embedded in every bearer token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The account id.
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique token id, used for revocation.
    pub jti: String,
}

pub struct NativeTokenAuth {
    db: Arc<dyn DatabaseService>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    /// Revoked token ids mapped to their `exp`.
    revoked: RwLock<HashMap<String, i64>>,
    events: broadcast::Sender<AuthEvent>,
}

impl NativeTokenAuth {
    pub fn new(db: Arc<dyn DatabaseService>, secret: &str, token_days: i64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            token_ttl: Duration::days(token_days),
            revoked: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn issue(&self, account: Account) -> PortResult<AuthGrant> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign token: {:?}", e);
            PortError::Unexpected("Failed to sign token".to_string())
        })?;
        info!("Issued bearer token for account {}", account.id);
        let _ = self.events.send(AuthEvent::SignedIn(account.clone()));
        Ok(AuthGrant {
            account,
            token,
            expires_at: seconds_to_utc(claims.exp),
        })
    }

    fn validate(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                warn!("Rejected bearer token: {}", e);
                None
            }
        }
    }

    /// Records a revoked token and forgets the ones the validator already
    /// rejects as expired.
    async fn revoke(&self, claims: &Claims) {
        let leeway = i64::try_from(self.validation.leeway).unwrap_or(i64::MAX);
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| exp.saturating_add(leeway) >= now);
        revoked.insert(claims.jti.clone(), claims.exp);
    }
}

fn seconds_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

#[async_trait]
impl AuthProvider for NativeTokenAuth {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        let account = register(self.db.as_ref(), email, password).await?;
        self.issue(account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        let account = check_credentials(self.db.as_ref(), email, password).await?;
        self.issue(account)
    }

    async fn sign_out(&self, token: &str) -> PortResult<()> {
        let claims = self.validate(token).ok_or(PortError::Unauthorized)?;
        self.revoke(&claims).await;
        info!("Revoked bearer token for account {}", claims.sub);
        let _ = self.events.send(AuthEvent::SignedOut(claims.sub));
        Ok(())
    }

    async fn current_account(&self, token: &str) -> PortResult<Option<Account>> {
        let Some(claims) = self.validate(token) else {
            return Ok(None);
        };
        if self.revoked.read().await.contains_key(&claims.jti) {
            return Ok(None);
        }
        Ok(Some(Account {
            id: claims.sub,
            email: claims.email,
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

//=========================================================================================
// Startup Selection
//=========================================================================================

/// Picks the provider for the configured client platform.
pub fn build_auth_provider(
    config: &Config,
    db: Arc<dyn DatabaseService>,
) -> PortResult<Arc<dyn AuthProvider>> {
    match config.platform {
        Platform::Web => Ok(Arc::new(WebSessionAuth::new(db, config.auth_session_days))),
        Platform::Native => {
            let secret = config
                .jwt_secret
                .as_deref()
                .ok_or_else(|| PortError::Unexpected("JWT_SECRET is required".to_string()))?;
            Ok(Arc::new(NativeTokenAuth::new(
                db,
                secret,
                config.auth_session_days,
            )))
        }
    }
}
