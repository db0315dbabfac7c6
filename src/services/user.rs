//! User service
//!
//! Accounts, login/logout and session validation. Login outcomes are
//! announced through the hook manager so observers (such as the auth event
//! logger) can react without this service knowing about them.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::hooks::{hook_names, HookManager};
use crate::models::{CreateUserInput, Session, User, USERNAME_MAX_LEN};
use crate::services::password::{burn_verification, hash_password, verify_password};
use anyhow::{anyhow, Context};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
const DEFAULT_SESSION_TTL_DAYS: i64 = 14;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Unknown username or wrong password
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Invalid input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    /// None when the configured lifetime is not a usable positive span
    session_ttl: Option<TimeDelta>,
    hook_manager: Option<Arc<HookManager>>,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl: TimeDelta::try_days(DEFAULT_SESSION_TTL_DAYS),
            hook_manager: None,
        }
    }

    /// Set the session lifetime
    ///
    /// A non-positive or unrepresentable lifetime makes every login fail with
    /// an internal error instead of issuing a dead session.
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.session_ttl = TimeDelta::try_days(days).filter(|ttl| *ttl > TimeDelta::zero());
        self
    }

    /// Attach a hook manager for login/logout events
    pub fn with_hooks(mut self, hook_manager: Arc<HookManager>) -> Self {
        self.hook_manager = Some(hook_manager);
        self
    }

    fn trigger_hook(&self, name: &str, data: serde_json::Value) {
        if let Some(ref manager) = self.hook_manager {
            manager.trigger(name, data);
        }
    }

    /// Create a user account
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an empty, overlong or malformed username, or
    ///   an empty password
    /// - `UserExists` if the username is taken
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        validate_username(&input.username)?;
        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(input.username));
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&User::new(input.username, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Check credentials and open a session
    ///
    /// # Hooks
    /// - `user_login_after` on success
    /// - `user_login_failed` on unknown username or wrong password
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        if input.username.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "This field is required.".to_string(),
            ));
        }

        let user = self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to get user by username")?;

        let user = match user {
            Some(user) => user,
            None => {
                burn_verification(&input.password);
                self.login_failed(&input, "user_not_found");
                return Err(UserServiceError::AuthenticationFailed);
            }
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            self.login_failed(&input, "invalid_password");
            return Err(UserServiceError::AuthenticationFailed);
        }

        let session = self.create_session(user.id).await?;

        self.trigger_hook(
            hook_names::USER_LOGIN_AFTER,
            json!({
                "user_id": user.id,
                "username": user.username,
                "ip": input.ip,
            }),
        );

        Ok(session)
    }

    fn login_failed(&self, input: &LoginInput, reason: &str) {
        self.trigger_hook(
            hook_names::USER_LOGIN_FAILED,
            json!({
                "username": input.username,
                "ip": input.ip,
                "reason": reason,
            }),
        );
    }

    /// End a session
    ///
    /// The logout hook fires even when the token matches no session, with a
    /// null user.
    pub async fn logout(&self, session_id: &str, ip: Option<&str>) -> Result<(), UserServiceError> {
        let user = match self
            .session_repo
            .get_by_id(session_id)
            .await
            .context("Failed to get session")?
        {
            Some(session) => self
                .user_repo
                .get_by_id(session.user_id)
                .await
                .context("Failed to get user")?,
            None => None,
        };

        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        self.trigger_hook(
            hook_names::USER_LOGOUT,
            json!({
                "user_id": user.as_ref().map(|u| u.id),
                "username": user.as_ref().map(|u| u.username.as_str()),
                "ip": ip,
            }),
        );

        Ok(())
    }

    /// Resolve a session token to its user
    ///
    /// Unknown and expired tokens resolve to `None`; expired sessions are
    /// deleted on the way.
    pub async fn validate_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired_at(now) {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Delete every session that expired before `now`
    pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(now)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    /// Session lifetime in whole seconds, for the cookie's Max-Age
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_ttl.map_or(0, |ttl| ttl.num_seconds())
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let ttl = self
            .session_ttl
            .ok_or_else(|| anyhow!("Session lifetime must be a positive number of days"))?;
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Session expiry is out of range"))?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }
}

/// Usernames are 1 to 150 characters of letters, digits and `@.+-_`
fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Username cannot exceed {} characters",
            USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    /// Client address, passed through to login hooks
    pub ip: Option<String>,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ip: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }
}
