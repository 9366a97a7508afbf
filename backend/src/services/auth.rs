//! Session manager: registration, login, refresh-token rotation, logout,
//! password changes and the admin account operations built on them.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    config::Config,
    models::user::{LoginResponse, TokenPair, User, UserRole},
    repositories::{RepositoryError, UserRepository},
    types::UserId,
    utils::{
        jwt::{TokenError, TokenIssuer},
        password::{hash_password, verify_password},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already exists")]
    DuplicateEmail,
    #[error("Only Attendee or Organizer registration is allowed")]
    UnauthorizedRole,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Your account is pending admin approval.")]
    PendingApproval,
    #[error("Invalid access token or refresh token")]
    InvalidToken,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("JWT signing key is not configured")]
    MissingSigningKey,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => AuthError::DuplicateEmail,
            other => AuthError::Internal(other.into()),
        }
    }
}

fn issuance_error(err: TokenError) -> AuthError {
    match err {
        TokenError::MissingSigningKey => AuthError::MissingSigningKey,
        TokenError::Invalid(e) => AuthError::Internal(anyhow::anyhow!("Token creation error: {}", e)),
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenIssuer,
    refresh_token_ttl: Duration,
    organizer_auto_approve: bool,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenIssuer,
        refresh_token_ttl: Duration,
        organizer_auto_approve: bool,
    ) -> Self {
        Self {
            users,
            tokens,
            refresh_token_ttl,
            organizer_auto_approve,
        }
    }

    pub fn from_config(users: Arc<dyn UserRepository>, config: &Config) -> Self {
        Self::new(
            users,
            TokenIssuer::from_config(config),
            config.refresh_token_ttl(),
            config.organizer_auto_approve,
        )
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    /// Self-registration. Organizers start unapproved unless auto-approval is configured.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: &str,
    ) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let role: UserRole = role.parse().map_err(|_| AuthError::UnauthorizedRole)?;
        if !role.is_self_registrable() {
            return Err(AuthError::UnauthorizedRole);
        }
        let is_approved = match role {
            UserRole::Organizer => self.organizer_auto_approve,
            UserRole::Attendee | UserRole::Admin => true,
        };

        let password_hash = hash_password(password)?;
        let user = User::new(
            email.to_string(),
            password_hash,
            full_name.to_string(),
            role,
            is_approved,
        );
        self.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, role = %user.role, is_approved, "User registered");
        Ok(user)
    }

    /// Verifies credentials and starts a new session, replacing any previous one.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                tracing::warn!("Login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if user.is_pending_approval() {
            tracing::warn!(user_id = %user.id, "Login rejected: organizer pending approval");
            return Err(AuthError::PendingApproval);
        }

        let access_token = self.tokens.issue_access_token(&user).map_err(issuance_error)?;
        let refresh_token = TokenIssuer::issue_refresh_token();
        let expires_at = Utc::now() + self.refresh_token_ttl;
        if !self
            .users
            .store_refresh_token(user.id, &refresh_token, expires_at)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            role: user.role,
        })
    }

    /// Exchanges a (possibly expired) access token and the current refresh
    /// token for a new pair. The presented refresh token stops working.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::BadRequest("Invalid client request"));
        }

        let claims = self
            .tokens
            .validate_expired_access_token(access_token)
            .map_err(|err| match err {
                TokenError::MissingSigningKey => AuthError::MissingSigningKey,
                TokenError::Invalid(e) => {
                    tracing::warn!(error = %e, "Refresh rejected: invalid access token");
                    AuthError::InvalidToken
                }
            })?;

        let now = Utc::now();
        let user = match self.users.find_by_email(&claims.email).await? {
            Some(user) if user.has_valid_refresh_token(refresh_token, now) => user,
            _ => {
                tracing::warn!(user_id = %claims.sub, "Refresh rejected: stale or unknown refresh token");
                return Err(AuthError::Unauthorized);
            }
        };

        let access_token = self.tokens.issue_access_token(&user).map_err(issuance_error)?;
        let next_refresh_token = TokenIssuer::issue_refresh_token();
        let rotated = self
            .users
            .rotate_refresh_token(
                user.id,
                refresh_token,
                &next_refresh_token,
                now + self.refresh_token_ttl,
                now,
            )
            .await?;
        if !rotated {
            tracing::warn!(user_id = %user.id, "Refresh rejected: token rotated concurrently");
            return Err(AuthError::Unauthorized);
        }

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token: next_refresh_token,
        })
    }

    /// Ends the caller's session. Safe to repeat.
    pub async fn logout(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;
        self.users.clear_refresh_token(user.id).await?;
        tracing::info!(user_id = %user.id, "User logged out");
        Ok(())
    }

    /// Replaces the password hash. Existing refresh tokens stay valid.
    pub async fn change_password(
        &self,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;
        if !verify_password(old_password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "Password change rejected: old password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(new_password)?;
        if !self.users.update_password_hash(user.id, &new_hash).await? {
            return Err(AuthError::NotFound("User not found"));
        }
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    pub async fn approve_organizer(&self, id: UserId) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .filter(|u| u.role == UserRole::Organizer)
            .ok_or(AuthError::NotFound("Organizer not found"))?;
        if user.is_approved {
            return Err(AuthError::BadRequest("Organizer is already approved"));
        }
        if !self.users.set_approved(user.id).await? {
            return Err(AuthError::NotFound("Organizer not found"));
        }
        tracing::info!(user_id = %user.id, "Organizer approved");
        Ok(())
    }

    pub async fn list_pending_organizers(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list_pending_organizers().await?)
    }

    /// Admin-only creation of organizer and admin accounts, approved up front.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: &str,
    ) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        let role = match role.parse::<UserRole>() {
            Ok(role @ (UserRole::Organizer | UserRole::Admin)) => role,
            Ok(UserRole::Attendee) | Err(_) => {
                return Err(AuthError::BadRequest("Only Organizer or Admin can be created"))
            }
        };

        let user = User::new(
            email.to_string(),
            hash_password(password)?,
            full_name.to_string(),
            role,
            true,
        );
        self.users.insert(&user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User created by admin");
        Ok(user)
    }

    pub async fn delete_user(&self, requester: UserId, target: UserId) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(target)
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;
        if user.id == requester {
            return Err(AuthError::BadRequest("You cannot delete your own account."));
        }
        if user.is_admin() && self.users.count_by_role(UserRole::Admin).await? <= 1 {
            return Err(AuthError::BadRequest("Cannot delete the last admin."));
        }
        if !self.users.delete(user.id).await? {
            return Err(AuthError::NotFound("User not found"));
        }
        tracing::info!(user_id = %user.id, requester = %requester, "User deleted");
        Ok(())
    }

    /// Creates the configured bootstrap admin if the email is not taken.
    /// Returns `true` when an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        let admin = User::new(
            email.to_string(),
            hash_password(password)?,
            "Administrator".to_string(),
            UserRole::Admin,
            true,
        );
        match self.users.insert(&admin).await {
            Ok(()) => {
                tracing::info!(user_id = %admin.id, "Bootstrap admin created");
                Ok(true)
            }
            Err(RepositoryError::DuplicateEmail) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
