use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{SessionError, SessionResult};

// ============================================================================
// Access token claims
// ============================================================================

/// The subset of the provider's access-token claims the client relies on.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> SessionResult<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or_else(|| SessionError::InvalidToken(format!("exp out of range: {}", self.exp)))
    }
}

/// Reads the claims without checking the signature. The client cannot verify
/// provider tokens; it only needs the expiry to schedule refreshes.
pub fn read_claims(token: &str) -> SessionResult<TokenClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

pub fn expires_at(token: &str) -> SessionResult<DateTime<Utc>> {
    read_claims(token)?.expires_at()
}

/// Lifetime left at `now`; negative once expired.
pub fn remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    expires_at - now
}
