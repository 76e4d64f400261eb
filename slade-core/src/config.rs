//! Server client configuration.
//!
//! A [`ClientConfig`] carries the credential set one [`ServerClient`](crate::ServerClient)
//! is built from. It can be read from the process environment, from any
//! injectable lookup, or from a TOML file.
//!
//! Missing mandatory values are reported as [`ConfigError::MissingEnvVar`];
//! deciding whether that should end the process is left to the binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::secret::Secret;

pub const CLIENT_ID_ENV_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_ENV_VAR: &str = "CLIENT_SECRET";
pub const USERNAME_ENV_VAR: &str = "USERNAME";
pub const PASSWORD_ENV_VAR: &str = "PASSWORD";
pub const GRANT_TYPE_ENV_VAR: &str = "GRANT_TYPE";
pub const API_SCHEME_ENV_VAR: &str = "API_SCHEME";
pub const TOKEN_URL_ENV_VAR: &str = "TOKEN_URL";
pub const API_HOST_ENV_VAR: &str = "HOST";

/// Optional workstation identifier forwarded on every authenticated request.
pub const WORKSTATION_ENV_VAR: &str = "DEFAULT_WORKSTATION_ID";

/// Header carrying the workstation identifier (used by Slade 360 ERP).
pub const WORKSTATION_HEADER: &str = "X-WORKSTATION";

/// Turns on wire-level debug logging when set to a true value.
pub const DEBUG_ENV_VAR: &str = "DEBUG";

/// Auth server endpoint used to check foreign access tokens.
pub const INTROSPECTION_URL_ENV_VAR: &str = "AUTH_SERVER_INTROSPECTION_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory environment variable is unset or empty.
    #[error("the environment variable '{name}' is not set")]
    MissingEnvVar { name: String },

    /// The configuration file could not be read.
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for a [`ClientConfig`].
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Credentials and endpoints for one OAuth2 password-grant server client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub api_token_url: String,
    pub api_host: String,
    pub api_scheme: String,
    pub grant_type: String,
    pub username: String,
    pub password: Secret,

    /// Headers applied to every authenticated request after the standard ones.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as missing. The workstation header is only added
    /// when [`WORKSTATION_ENV_VAR`] resolves to a non-empty value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar {
                    name: name.to_string(),
                })
        };

        let client_id = required(CLIENT_ID_ENV_VAR)?;
        let client_secret = required(CLIENT_SECRET_ENV_VAR)?;
        let username = required(USERNAME_ENV_VAR)?;
        let password = required(PASSWORD_ENV_VAR)?;
        let grant_type = required(GRANT_TYPE_ENV_VAR)?;
        let api_scheme = required(API_SCHEME_ENV_VAR)?;
        let api_token_url = required(TOKEN_URL_ENV_VAR)?;
        let api_host = required(API_HOST_ENV_VAR)?;

        let mut extra_headers = BTreeMap::new();
        match lookup(WORKSTATION_ENV_VAR).filter(|v| !v.is_empty()) {
            Some(workstation) => {
                extra_headers.insert(WORKSTATION_HEADER.to_string(), workstation);
            }
            None => tracing::debug!("{} env var not found", WORKSTATION_ENV_VAR),
        }

        Ok(Self {
            client_id,
            client_secret: Secret::new(client_secret),
            api_token_url,
            api_host,
            api_scheme,
            grant_type,
            username,
            password: Secret::new(password),
            extra_headers,
        })
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the login pair, keeping the client credentials and endpoints.
    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Secret::new(password);
        self
    }

    /// Add a header sent on every authenticated request.
    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

/// Retrieve a mandatory environment variable.
///
/// Unset and empty variables are both reported as missing.
pub fn get_env_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar {
            name: name.to_string(),
        })
}

/// Read a boolean environment variable, treating anything unparseable as `false`.
pub fn bool_env(name: &str) -> bool {
    get_env_var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(false)
}

/// Whether wire-level debug logging was requested through [`DEBUG_ENV_VAR`].
pub fn is_debug() -> bool {
    bool_env(DEBUG_ENV_VAR)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (CLIENT_ID_ENV_VAR, "ZXCVBNMASDFGHJKL"),
            (CLIENT_SECRET_ENV_VAR, "QWERTYUIOPASDFGHJKL"),
            (USERNAME_ENV_VAR, "test@bewell.co.ke"),
            (PASSWORD_ENV_VAR, "a1b2c3"),
            (GRANT_TYPE_ENV_VAR, "password"),
            (API_SCHEME_ENV_VAR, "https"),
            (TOKEN_URL_ENV_VAR, "https://auth.healthcloud.co.ke/oauth2/token/"),
            (API_HOST_ENV_VAR, "api.healthcloud.co.ke"),
        ])
    }

    #[test]
    fn test_from_lookup_reads_every_option() {
        let env = full_env();
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.client_id, "ZXCVBNMASDFGHJKL");
        assert_eq!(config.client_secret.expose(), "QWERTYUIOPASDFGHJKL");
        assert_eq!(config.api_host, "api.healthcloud.co.ke");
        assert_eq!(config.grant_type, "password");
        assert!(config.extra_headers.is_empty());
    }

    #[test]
    fn test_from_lookup_missing_variable() {
        let mut env = full_env();
        env.remove(TOKEN_URL_ENV_VAR);
        let err = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();

        match err {
            ConfigError::MissingEnvVar { name } => assert_eq!(name, TOKEN_URL_ENV_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_lookup_empty_counts_as_missing() {
        let mut env = full_env();
        env.insert(PASSWORD_ENV_VAR, "");
        let err = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV_VAR));
    }

    #[test]
    fn test_from_lookup_workstation_header() {
        let mut env = full_env();
        env.insert(WORKSTATION_ENV_VAR, "4d2f3b");
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(
            config.extra_headers.get(WORKSTATION_HEADER).map(String::as_str),
            Some("4d2f3b")
        );
    }

    #[test]
    fn test_from_toml_str() {
        let config = ClientConfig::from_toml_str(
            r#"
            client_id = "ZXCVBNMASDFGHJKL"
            client_secret = "QWERTYUIOPASDFGHJKL"
            api_token_url = "https://auth.healthcloud.co.ke/oauth2/token/"
            api_host = "api.healthcloud.co.ke"
            api_scheme = "https"
            grant_type = "password"
            username = "test@bewell.co.ke"
            password = "a1b2c3"

            [extra_headers]
            X-WORKSTATION = "4d2f3b"
            "#,
        )
        .unwrap();

        assert_eq!(config.password.expose(), "a1b2c3");
        assert_eq!(config.extra_headers.len(), 1);
    }

    #[test]
    fn test_load_from_path_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "client_id = 12").unwrap();

        let err = ClientConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let missing = ClientConfig::load_from_path(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn test_with_login() {
        let env = full_env();
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .unwrap()
            .with_login("other@bewell.co.ke", "pass");
        assert_eq!(config.username, "other@bewell.co.ke");
        assert_eq!(config.password.expose(), "pass");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("F"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
