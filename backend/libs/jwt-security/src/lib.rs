//! Signed session tokens scoped to a user and an application.
//!
//! **Token model**:
//! - HS256 with a single process-wide secret
//! - `iss` and `aud` are both the service's own identifier
//! - Access and refresh tokens carry the same identity; refresh tokens set `is_refresh`
//!
//! Validation is stateless: no blacklist, no shared session store.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod secret_validation;

pub use secret_validation::{validate_secret_strength, SecretStrength};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Token validation and issuance failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token signature verification failed")]
    BadSignature,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Invalid token configuration: {0}")]
    Configuration(String),
}

impl TokenError {
    /// Short machine-readable reason, recorded in audit details.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Expired => "token_expired",
            TokenError::BadSignature => "bad_signature",
            TokenError::Malformed(_) => "malformed_token",
            TokenError::Encoding(_) => "encoding_failed",
            TokenError::Configuration(_) => "invalid_configuration",
        }
    }
}

/// Identity embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// JWT claims as they appear on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub user: TokenUser,
    pub application_id: i64,
    #[serde(default)]
    pub is_refresh: bool,
}

/// Result of a successful login or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    /// Issuer and audience identifier
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Issues and validates token pairs
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::Configuration(
                "signing secret must not be empty".to_string(),
            ));
        }
        if config.access_ttl_secs <= 0 {
            return Err(TokenError::Configuration(
                "access token TTL must be positive".to_string(),
            ));
        }
        if config.refresh_ttl_secs <= config.access_ttl_secs {
            return Err(TokenError::Configuration(
                "refresh token TTL must exceed access token TTL".to_string(),
            ));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        })
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue an access/refresh pair for `user` in `application_id`.
    pub fn issue_pair(&self, user: &TokenUser, application_id: i64) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(user, application_id, Utc::now().timestamp())
    }

    pub fn issue_pair_at(
        &self,
        user: &TokenUser,
        application_id: i64,
        now: i64,
    ) -> Result<TokenPair, TokenError> {
        let access = self.claims(user, application_id, now, self.access_ttl_secs, false);
        let refresh = self.claims(user, application_id, now, self.refresh_ttl_secs, true);

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.access_ttl_secs,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    fn claims(
        &self,
        user: &TokenUser,
        application_id: i64,
        now: i64,
        ttl: i64,
        is_refresh: bool,
    ) -> Claims {
        Claims {
            iat: now,
            exp: now + ttl,
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            user: user.clone(),
            application_id,
            is_refresh,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate a token against the current time.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate a token as of `now`.
    ///
    /// Expiry is checked before the signature, so an expired token reports
    /// `Expired` whether or not it was signed with this service's secret.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let unverified = decode_unverified(token)?;
        if now >= unverified.exp {
            debug!(exp = unverified.exp, now, "Rejected expired token");
            return Err(TokenError::Expired);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidIssuer => TokenError::Malformed("issuer mismatch".to_string()),
                ErrorKind::InvalidAudience => {
                    TokenError::Malformed("audience mismatch".to_string())
                }
                _ => TokenError::Malformed(e.to_string()),
            })
    }

    pub fn is_refresh_token(claims: &Claims) -> bool {
        claims.is_refresh
    }

    pub fn user_id(claims: &Claims) -> i64 {
        claims.user.id
    }

    pub fn application_id(claims: &Claims) -> i64 {
        claims.application_id
    }
}

/// Decode claims without checking signature, expiry or audience.
fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| TokenError::Malformed(e.to_string()))
}
