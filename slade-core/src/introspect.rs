//! Access token introspection against the Slade 360 auth server.

use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::client::ServerClient;
use crate::config::{INTROSPECTION_URL_ENV_VAR, get_env_var};
use crate::error::{ClientError, ClientResult};

/// Timeout for a single introspection call.
pub const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct IntrospectionRequest<'a> {
    token: &'a str,
    token_type: &'static str,
}

fn introspection_error(message: impl Into<String>) -> ClientError {
    ClientError::Introspection {
        message: message.into(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Ask the auth server whether `access_token` is valid.
///
/// Returns `Ok(true)` for a valid token. A token the server reports as
/// invalid is an [`ClientError::Introspection`] error, as is an answer
/// without a boolean `is_valid` field.
pub async fn validate_access_token(
    client: &ServerClient,
    introspection_url: &str,
    access_token: &str,
) -> ClientResult<bool> {
    if access_token.is_empty() {
        return Err(introspection_error("no access token supplied"));
    }
    debug!(introspection_url, "introspecting access token");

    let response = client
        .http_client()
        .post(introspection_url)
        .timeout(INTROSPECTION_TIMEOUT)
        .json(&IntrospectionRequest {
            token: access_token,
            token_type: "access_token",
        })
        .send()
        .await
        .map_err(|e| ClientError::transport("unable to send introspection request", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::transport("unable to read introspection response", e))?;
    let answer: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ClientError::decode("unable to decode introspection response", e))?;

    match answer.get("is_valid") {
        None => Err(introspection_error(
            "expected is_valid key in the response, did not find one",
        )),
        Some(serde_json::Value::Bool(true)) => Ok(true),
        Some(serde_json::Value::Bool(false)) => {
            Err(introspection_error("the supplied access token is not valid"))
        }
        Some(other) => Err(introspection_error(format!(
            "expected is_valid to be a bool, got {}",
            json_type_name(other)
        ))),
    }
}

/// Introspect `access_token` with a client and endpoint taken from the environment.
pub async fn validate_access_token_from_env(access_token: &str) -> ClientResult<bool> {
    if access_token.is_empty() {
        return Err(introspection_error("no access token supplied"));
    }
    let client = ServerClient::from_env().await?;
    let url = get_env_var(INTROSPECTION_URL_ENV_VAR)?;
    validate_access_token(&client, &url, access_token).await
}
