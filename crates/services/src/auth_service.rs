use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Duration;
use rand::RngCore;
use storage::repository::{SessionRecord, SessionRepository, StorageError, UserRepository};
use training_core::model::{Role, User, UserProfile};

use crate::Clock;
use crate::error::AuthError;

/// Default lifetime of a login session.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

const TOKEN_BYTES: usize = 32;

/// A freshly opened session together with its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub session: SessionRecord,
    pub user: User,
}

/// Sign-in, session lookup and role management.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    session_ttl: Duration,
    allowed_domain: Option<String>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        session_ttl: Duration,
        allowed_domain: Option<String>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            session_ttl,
            allowed_domain: allowed_domain.filter(|d| !d.trim().is_empty()),
            users,
            sessions,
        }
    }

    #[must_use]
    pub fn allowed_domain(&self) -> Option<&str> {
        self.allowed_domain.as_deref()
    }

    /// Upsert the user behind a verified identity and open a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Profile` when the profile is malformed or outside
    /// the allowed email domain.
    pub async fn login(&self, profile: UserProfile) -> Result<LoginSession, AuthError> {
        let profile = match profile.validate(self.allowed_domain.as_deref()) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "login rejected");
                return Err(e.into());
            }
        };
        let now = self.clock.now();
        let user = self.users.upsert_user(&profile, now).await?;

        let session = SessionRecord {
            token: random_token(),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.create_session(&session).await?;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok(LoginSession { session, user })
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are removed on sight.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` for unknown or expired tokens and
    /// for sessions whose user no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let session = self
            .sessions
            .get_session(token)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if session.is_expired(self.clock.now()) {
            self.sessions.delete_session(token).await?;
            return Err(AuthError::Unauthorized);
        }
        self.users
            .get_user(&session.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the session cannot be removed.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Grant the admin role to the user with the given email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage(StorageError::NotFound)` if nobody with
    /// that email has signed in yet.
    pub async fn promote(&self, email: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .set_role_by_email(email.trim(), Role::Admin, self.clock.now())
            .await?;
        tracing::info!(user_id = %user.id, "user promoted to admin");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if repository access fails.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list_users().await?)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if repository access fails.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.sessions.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}

impl AuthError {
    /// True when the error means "no such user" rather than a failure.
    #[must_use]
    pub fn is_unknown_user(&self) -> bool {
        matches!(self, AuthError::Storage(StorageError::NotFound))
    }
}

/// 256 random bits, hex-encoded. Used for session ids and OAuth state.
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
