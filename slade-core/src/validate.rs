//! Credential and token sanity checks.
//!
//! [`check_preconditions`] runs before any network call and rejects credential
//! sets the auth server could never accept. [`check_postconditions`] runs after
//! every successful token exchange and rejects token bundles this client
//! cannot work with, even though the HTTP exchange itself succeeded.
//!
//! Both checks stop at the first failing field.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::token::TokenState;

/// Minimum length of client ids, client secrets, tokens and scopes.
pub const TOKEN_MIN_LENGTH: usize = 12;

/// Minimum password length. A non-empty check, not a password policy.
pub const API_PASSWORD_MIN_LENGTH: usize = 3;

/// The only OAuth2 grant this client speaks for initial authentication.
pub const PASSWORD_GRANT: &str = "password";

/// A credential field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error(
        "client_id is not valid, expected a non-blank alphanumeric string of at least {min_length} characters"
    )]
    InvalidClientId { min_length: usize },

    #[error(
        "client_secret is not valid, expected a non-blank alphanumeric string of at least {min_length} characters"
    )]
    InvalidClientSecret { min_length: usize },

    #[error("{url} is not a valid api_token_url, expected an http(s) URL")]
    InvalidTokenUrl { url: String },

    #[error("{host} is not a valid api_host, expected a valid IP or domain name")]
    InvalidHost { host: String },

    #[error("{scheme} is not a valid api_scheme, expected http or https")]
    InvalidScheme { scheme: String },

    #[error("unsupported grant_type `{grant_type}`: the only supported OAuth grant type for now is 'password'")]
    UnsupportedGrantType { grant_type: String },

    #[error("the username `{username}` is not a valid email")]
    InvalidUsername { username: String },

    #[error("the password should be a string of at least {min_length} characters")]
    InvalidPassword { min_length: usize },
}

impl PreconditionError {
    /// Name of the configuration field that failed.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidClientId { .. } => "client_id",
            Self::InvalidClientSecret { .. } => "client_secret",
            Self::InvalidTokenUrl { .. } => "api_token_url",
            Self::InvalidHost { .. } => "api_host",
            Self::InvalidScheme { .. } => "api_scheme",
            Self::UnsupportedGrantType { .. } => "grant_type",
            Self::InvalidUsername { .. } => "username",
            Self::InvalidPassword { .. } => "password",
        }
    }
}

/// A token bundle that violates the initialized-client invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostconditionError {
    #[error("invalid access token after initialization")]
    InvalidAccessToken,

    #[error("invalid token type `{token_type}` after initialization, expected 'Bearer'")]
    InvalidTokenType { token_type: String },

    #[error("invalid refresh token after initialization")]
    InvalidRefreshToken,

    #[error("invalid access scope text after initialization")]
    InvalidAccessScope,

    #[error("invalid expires_in {expires_in} after initialization")]
    InvalidExpiresIn { expires_in: i64 },

    #[error("invalid past refresh_at {refresh_at} after initialization")]
    RefreshAtNotInFuture { refresh_at: DateTime<Utc> },
}

/// Ensure the credentials passed to a server client make sense.
pub fn check_preconditions(config: &ClientConfig) -> Result<(), PreconditionError> {
    if !is_token_like(&config.client_id) {
        return Err(PreconditionError::InvalidClientId {
            min_length: TOKEN_MIN_LENGTH,
        });
    }

    if !is_token_like(config.client_secret.expose()) {
        return Err(PreconditionError::InvalidClientSecret {
            min_length: TOKEN_MIN_LENGTH,
        });
    }

    if !is_request_url(&config.api_token_url) {
        return Err(PreconditionError::InvalidTokenUrl {
            url: config.api_token_url.clone(),
        });
    }

    if !is_valid_host(&config.api_host) {
        return Err(PreconditionError::InvalidHost {
            host: config.api_host.clone(),
        });
    }

    if config.api_scheme != "http" && config.api_scheme != "https" {
        return Err(PreconditionError::InvalidScheme {
            scheme: config.api_scheme.clone(),
        });
    }

    if config.grant_type != PASSWORD_GRANT {
        return Err(PreconditionError::UnsupportedGrantType {
            grant_type: config.grant_type.clone(),
        });
    }

    if !is_valid_email(&config.username) {
        return Err(PreconditionError::InvalidUsername {
            username: config.username.clone(),
        });
    }

    if config.password.expose().len() < API_PASSWORD_MIN_LENGTH {
        return Err(PreconditionError::InvalidPassword {
            min_length: API_PASSWORD_MIN_LENGTH,
        });
    }

    Ok(())
}

/// Sanity check a token bundle as of `now`.
///
/// Pure: calling it repeatedly on the same state gives the same answer.
pub fn check_postconditions(
    state: &TokenState,
    now: DateTime<Utc>,
) -> Result<(), PostconditionError> {
    if !is_token_like(state.access_token.expose()) {
        return Err(PostconditionError::InvalidAccessToken);
    }

    if state.token_type != "Bearer" {
        return Err(PostconditionError::InvalidTokenType {
            token_type: state.token_type.clone(),
        });
    }

    if !is_token_like(state.refresh_token.expose()) {
        return Err(PostconditionError::InvalidRefreshToken);
    }

    if !is_ascii(&state.access_scope) || state.access_scope.len() < TOKEN_MIN_LENGTH {
        return Err(PostconditionError::InvalidAccessScope);
    }

    if state.expires_in < 1 {
        return Err(PostconditionError::InvalidExpiresIn {
            expires_in: state.expires_in,
        });
    }

    if state.refresh_at <= now {
        return Err(PostconditionError::RefreshAtNotInFuture {
            refresh_at: state.refresh_at,
        });
    }

    Ok(())
}

fn is_token_like(value: &str) -> bool {
    is_alphanumeric(value) && value.len() >= TOKEN_MIN_LENGTH
}

/// ASCII letters and digits only.
pub fn is_alphanumeric(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Non-empty and ASCII only.
pub fn is_ascii(value: &str) -> bool {
    !value.is_empty() && value.is_ascii()
}

/// An absolute `http` or `https` URL with a host.
pub fn is_request_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// An IP address or a syntactically valid DNS name, without a port.
pub fn is_valid_host(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok() || is_dns_name(value)
}

fn is_dns_name(value: &str) -> bool {
    let name = value.strip_suffix('.').unwrap_or(value);
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    name.split('.').all(|label| {
        let mut chars = label.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        first_ok
            && label.len() <= 63
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

/// Basic email validation: one `@`, a dot-atom local part and a dotted domain.
pub fn is_valid_email(value: &str) -> bool {
    if value.len() > 254 {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    if local.is_empty()
        || local.len() > 64
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
    {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));
    if !local_ok {
        return false;
    }

    domain.contains('.')
        && !domain.ends_with('.')
        && domain.parse::<IpAddr>().is_err()
        && is_dns_name(domain)
}
