//! Token bundles returned by the auth server.
//!
//! This module provides:
//! - [`OAuthResponse`] - the JSON body of a successful token exchange
//! - [`TokenState`] - the token bundle a client holds between exchanges

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::Secret;
use crate::validate::PostconditionError;

/// Fraction of the token lifetime after which it is proactively refreshed.
///
/// Refreshing a little ahead of expiry keeps in-flight requests from racing
/// the deadline. The value is a compatibility choice, not a security bound.
pub const TOKEN_EXPIRY_RATIO: f64 = 0.95;

/// Successful response from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthResponse {
    pub access_token: Secret,
    pub token_type: String,
    pub scope: String,
    pub expires_in: i64,
    pub refresh_token: Secret,
}

/// The token bundle of an authenticated client.
///
/// Always built in one step from an [`OAuthResponse`] so that the access
/// token, refresh token and refresh deadline belong to the same exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: Secret,
    pub token_type: String,
    pub refresh_token: Secret,
    pub access_scope: String,
    pub expires_in: i64,
    pub refresh_at: DateTime<Utc>,
}

impl TokenState {
    /// Build the state for a response received at `now`.
    ///
    /// An `expires_in` whose refresh deadline cannot be represented is an
    /// [`PostconditionError::InvalidExpiresIn`].
    pub fn from_response(
        response: OAuthResponse,
        now: DateTime<Utc>,
    ) -> Result<Self, PostconditionError> {
        let refresh_at = refresh_delay(response.expires_in)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or(PostconditionError::InvalidExpiresIn {
                expires_in: response.expires_in,
            })?;

        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            access_scope: response.scope,
            expires_in: response.expires_in,
            refresh_at,
        })
    }

    /// Whether the refresh deadline has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now > self.refresh_at
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose())
    }
}

fn refresh_delay(expires_in: i64) -> Option<TimeDelta> {
    let millis = (expires_in as f64 * TOKEN_EXPIRY_RATIO * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}
