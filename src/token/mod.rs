/// Token service: issuing, verifying and revoking signed session tokens
///
/// Every issued token carries a random identifier (`jti`) that keys a session
/// entry in the [`SessionStore`]. A token authorizes a request only while its
/// signature, claims and expiry check out *and* its session entry still exists,
/// which is what makes logout and refresh rotation effective.
///
/// Identifier lifecycle: `ISSUED -> LIVE -> CONSUMED | EXPIRED`. Identifiers
/// are random UUIDs and never reused.
pub mod session;

pub use session::{MemorySessionStore, RedisSessionStore, SessionStore};

use crate::metrics;
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Only HS256 is ever accepted, whatever the token header claims
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token verification and session errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, undecodable token or non-HMAC algorithm
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Required claims missing, mistyped, unknown or of the wrong class
    #[error("Malformed token claims: {0}")]
    MalformedClaims(String),

    /// `now >= exp`
    #[error("Token has expired")]
    Expired,

    /// Signature is fine but the session is gone (logged out, rotated, replayed)
    #[error("{0}")]
    Unauthorized(String),

    /// Session store failure
    #[error("Session store error: {0}")]
    Storage(String),

    /// Token could not be signed
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Token class; each class has its own signing secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

/// Signed token payload
///
/// Decoding is strict: any missing, extra or mistyped claim rejects the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Subject username
    pub sub: String,
    /// Session identifier
    pub jti: Uuid,
    pub typ: TokenClass,
    /// Expiry, Unix seconds
    pub exp: i64,
}

/// Access/refresh pair returned by login and refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_claims: TokenClaims,
    #[serde(skip)]
    pub refresh_claims: TokenClaims,
}

/// Token lifetimes and per-class secrets
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issues, verifies and revokes tokens
pub struct TokenService {
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    sessions: Arc<dyn SessionStore>,
}

impl TokenService {
    pub fn new(config: &TokenConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            access_keys: SigningKeys::from_secret(&config.access_secret),
            refresh_keys: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            sessions,
        }
    }

    fn keys(&self, class: TokenClass) -> &SigningKeys {
        match class {
            TokenClass::Access => &self.access_keys,
            TokenClass::Refresh => &self.refresh_keys,
        }
    }

    fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access_ttl,
            TokenClass::Refresh => self.refresh_ttl,
        }
    }

    /// Sign an arbitrary claim set with the secret of `class`
    pub(crate) fn sign(&self, class: TokenClass, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(
            &Header::new(SIGNING_ALGORITHM),
            claims,
            &self.keys(class).encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn mint(&self, class: TokenClass, subject: &str, now: i64) -> Result<(String, TokenClaims), TokenError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            jti: Uuid::new_v4(),
            typ: class,
            exp: now + self.ttl(class).as_secs() as i64,
        };
        let token = self.sign(class, &claims)?;
        Ok((token, claims))
    }

    async fn register(&self, claims: &TokenClaims, now: i64) -> Result<(), TokenError> {
        let remaining = Duration::from_secs((claims.exp - now).max(1) as u64);
        self.sessions
            .put(&claims.jti.to_string(), &claims.sub, remaining)
            .await
    }

    /// Issue an access/refresh pair for `subject` and register both sessions
    ///
    /// If the refresh session cannot be registered the access session is rolled
    /// back, so a failed issue never leaves half a pair live.
    pub async fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        let (access_token, access_claims) = self.mint(TokenClass::Access, subject, now)?;
        let (refresh_token, refresh_claims) = self.mint(TokenClass::Refresh, subject, now)?;

        self.register(&access_claims, now).await?;

        if let Err(e) = self.register(&refresh_claims, now).await {
            warn!(
                "Refresh session registration failed for {}, rolling back access session",
                subject
            );
            if let Err(rollback) = self.sessions.delete(&access_claims.jti.to_string()).await {
                warn!(
                    "Rollback of access session {} failed: {}",
                    access_claims.jti, rollback
                );
            }
            return Err(e);
        }

        metrics::record_token_operation("issue", "ok");
        debug!("Issued token pair for {}", subject);

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    /// Check signature, claim shape, class and expiry of a token
    ///
    /// Does not consult the session store.
    pub fn verify(&self, token: &str, expected: TokenClass) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::InvalidSignature)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::InvalidSignature);
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(token, &self.keys(expected).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::Json(inner) => TokenError::MalformedClaims(inner.to_string()),
                _ => TokenError::InvalidSignature,
            })?
            .claims;

        if claims.typ != expected {
            return Err(TokenError::MalformedClaims(format!(
                "expected {} token, got {}",
                expected.as_str(),
                claims.typ.as_str()
            )));
        }

        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Whether the session entry for `token_id` still exists
    pub async fn is_session_live(&self, token_id: &Uuid) -> Result<bool, TokenError> {
        Ok(self.sessions.get(&token_id.to_string()).await?.is_some())
    }

    /// Delete the session entry for `token_id`, returning the deleted count
    pub async fn revoke_session(&self, token_id: &Uuid) -> Result<u64, TokenError> {
        let deleted = self.sessions.delete(&token_id.to_string()).await?;
        metrics::record_token_operation("revoke", if deleted > 0 { "ok" } else { "miss" });
        Ok(deleted)
    }

    /// Verify an access token and require its session to be live and owned by
    /// the token's subject
    pub async fn authenticate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token, TokenClass::Access)?;

        match self.sessions.get(&claims.jti.to_string()).await? {
            Some(subject) if subject == claims.sub => Ok(claims),
            Some(_) => Err(TokenError::Unauthorized(
                "session does not belong to token subject".to_string(),
            )),
            None => Err(TokenError::Unauthorized("session revoked".to_string())),
        }
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented token's session is deleted first; a zero delete count means
    /// it was already exchanged (or never registered) and the call is refused.
    /// The old token stays burned even if issuing the new pair fails.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify(refresh_token, TokenClass::Refresh)?;

        let deleted = self.sessions.delete(&claims.jti.to_string()).await?;
        if deleted == 0 {
            metrics::record_token_operation("rotate", "replay");
            warn!("Refresh token {} for {} already consumed", claims.jti, claims.sub);
            return Err(TokenError::Unauthorized("unauthorized".to_string()));
        }

        let pair = self.issue_pair(&claims.sub).await?;
        metrics::record_token_operation("rotate", "ok");
        Ok(pair)
    }
}
