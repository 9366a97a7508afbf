//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::types::UserId;

#[derive(Debug, Clone, Serialize)]
/// Credential store representation of a user account.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Login key. Compared exactly as stored.
    pub email: String,
    /// Human-readable full name.
    pub full_name: String,
    /// Argon2 PHC string of the user's password.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role describing the user's privileges.
    pub role: UserRole,
    /// Organizers must be approved by an admin before they can log in.
    pub is_approved: bool,
    /// The single active refresh token, if any.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Expiry of `refresh_token`. Absent or past means the token is unusable.
    pub refresh_token_expiry_time: Option<DateTime<Utc>>,
    /// Creation timestamp for auditing.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp for auditing.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Closed set of roles. Every authorization check matches on this exhaustively.
pub enum UserRole {
    /// Browses events, registers for tickets, saves events.
    #[default]
    Attendee,
    /// Creates and manages events once approved.
    Organizer,
    /// Approves organizers and events, manages accounts.
    Admin,
}

impl UserRole {
    /// Returns the canonical representation used on the wire and in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Attendee => "Attendee",
            UserRole::Organizer => "Organizer",
            UserRole::Admin => "Admin",
        }
    }

    /// Roles that may be chosen through public self-registration.
    pub fn is_self_registrable(&self) -> bool {
        match self {
            UserRole::Attendee | UserRole::Organizer => true,
            UserRole::Admin => false,
        }
    }

    /// Roles allowed to push event notices to realtime groups over REST.
    pub fn can_publish_event_notices(&self) -> bool {
        match self {
            UserRole::Organizer | UserRole::Admin => true,
            UserRole::Attendee => false,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Attendee" | "attendee" | "ATTENDEE" => Ok(UserRole::Attendee),
            "Organizer" | "organizer" | "ORGANIZER" => Ok(UserRole::Organizer),
            "Admin" | "admin" | "ADMIN" => Ok(UserRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            serde::de::Error::unknown_variant(&s, &["Attendee", "Organizer", "Admin"])
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
/// Public self-registration payload.
pub struct RegisterRequest {
    #[validate(email(message = "Email is incorrect"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    /// Kept as free text so that unknown roles are reported as an
    /// unauthorized role rather than a malformed body.
    pub role: String,
    #[validate(length(min = 1, max = 100, message = "Full name must not exceed 100 characters"))]
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
/// Admin-only account creation payload.
pub struct CreateUserRequest {
    #[validate(email(message = "Email is incorrect"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: String,
    #[validate(length(min = 1, max = 100, message = "Full name must not exceed 100 characters"))]
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Tokens returned after a successful login.
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub role: UserRole,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Body of a refresh request. Missing fields are treated as empty.
pub struct RefreshTokenRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A freshly rotated access/refresh pair.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
/// Payload submitted when a user requests to change their password.
pub struct ChangePasswordRequest {
    /// Optional. When present it must name the authenticated account.
    #[serde(default)]
    pub email: Option<String>,
    pub old_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_approved: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_approved: user.is_approved,
        }
    }
}

impl User {
    /// Constructs a new user with a freshly generated identifier and no session.
    pub fn new(
        email: String,
        password_hash: String,
        full_name: String,
        role: UserRole,
        is_approved: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            full_name,
            password_hash,
            role,
            is_approved,
            refresh_token: None,
            refresh_token_expiry_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when the user holds the `Admin` role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Organizers awaiting approval cannot complete a login.
    pub fn is_pending_approval(&self) -> bool {
        match self.role {
            UserRole::Organizer => !self.is_approved,
            UserRole::Attendee | UserRole::Admin => false,
        }
    }

    /// Returns `true` when `presented` is the stored refresh token and it has not expired.
    pub fn has_valid_refresh_token(&self, presented: &str, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_token_expiry_time) {
            (Some(stored), Some(expiry)) => stored == presented && expiry > now,
            _ => false,
        }
    }
}
