use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{
    config::Config,
    models::user::{User, UserRole},
    types::UserId,
};

/// Access tokens are signed and must be verified with this algorithm only.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
/// Entropy of an opaque refresh token before base64 encoding.
pub const REFRESH_TOKEN_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    pub iss: String,
    pub aud: String,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
    pub jti: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("JWT signing key is not configured")]
    MissingSigningKey,
    #[error("invalid access token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Issues and validates access tokens, and mints opaque refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Option<String>,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl", &self.access_token_ttl)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(
        secret: Option<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_token_ttl: Duration,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            issuer: issuer.into(),
            audience: audience.into(),
            access_token_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            config.access_token_ttl(),
        )
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    fn secret(&self) -> Result<&[u8], TokenError> {
        self.secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or(TokenError::MissingSigningKey)
    }

    /// Builds the claim set for `user`, expiring one TTL from now.
    pub fn claims_for(&self, user: &User) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + self.access_token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = EncodingKey::from_secret(self.secret()?);
        Ok(encode(&Header::new(SIGNING_ALGORITHM), claims, &key)?)
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, TokenError> {
        self.sign(&self.claims_for(user))
    }

    /// 64 random bytes, base64 encoded. Carries no reference to its owner.
    pub fn issue_refresh_token() -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        STANDARD.encode(bytes)
    }

    /// Full verification for request and realtime authentication: signature,
    /// algorithm, expiry, issuer and audience.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let key = DecodingKey::from_secret(self.secret()?);
        Ok(decode::<Claims>(token, &key, &validation)?.claims)
    }

    /// Verification used by the refresh flow. Signature and algorithm are
    /// enforced; expiry, issuer and audience are not.
    pub fn validate_expired_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let key = DecodingKey::from_secret(self.secret()?);
        Ok(decode::<Claims>(token, &key, &validation)?.claims)
    }
}
