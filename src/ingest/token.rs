/// Bearer token lifecycle for the authenticated Copernicus layers.
///
/// A token is considered usable until five minutes before its stated
/// expiry; inside that margin it is "expiring" and gets replaced on the
/// next request, so no request ever goes out with a token about to lapse.
///
/// # Clock injection
/// Every function takes `now: DateTime<Utc>` rather than reading the clock,
/// which keeps state transitions deterministic in tests.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::model::IngestError;

/// Refresh this long before the upstream expiry.
pub const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Lifetime assumed when the token response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on a stated lifetime; longer claims are cut to one day.
pub const MAX_EXPIRES_IN_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token has been obtained, or the last exchange failed.
    Unauthenticated,
    /// A token is held and is outside the refresh margin.
    TokenValid,
    /// A token is held but expires within the margin (or already has).
    TokenExpiring,
}

impl AccessToken {
    /// True while `now < expires_at − margin`. Strictly less than: a token
    /// exactly at the margin boundary is already refreshed.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES)
    }
}

/// State of an optional cached token at `now`.
pub fn auth_state_at(token: Option<&AccessToken>, now: DateTime<Utc>) -> AuthState {
    match token {
        None => AuthState::Unauthenticated,
        Some(t) if t.is_fresh_at(now) => AuthState::TokenValid,
        Some(_) => AuthState::TokenExpiring,
    }
}

// ---------------------------------------------------------------------------
// Token response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Decodes an OAuth2 token response issued at `now`.
///
/// A missing or empty `access_token` is an auth failure; a missing
/// `expires_in` defaults to one hour and is capped at one day.
pub fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AccessToken, IngestError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| IngestError::ParseError(e.to_string()))?;

    let token = response
        .access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| IngestError::AuthFailed("response carried no access_token".to_string()))?;

    let expires_in = response
        .expires_in
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
        .clamp(0, MAX_EXPIRES_IN_SECS);

    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| IngestError::ParseError(format!("expires_in {} out of range", expires_in)))?;

    Ok(AccessToken { token, expires_at })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
