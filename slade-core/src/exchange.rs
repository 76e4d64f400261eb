//! OAuth2 token endpoint exchanges.
//!
//! Both grants are sent as `application/x-www-form-urlencoded` POST bodies
//! with a fixed field order, which some auth servers depend on.

use tracing::{debug, error};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::token::OAuthResponse;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Body for the resource owner password grant.
pub fn password_grant_form(config: &ClientConfig) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", &config.client_id)
        .append_pair("client_secret", config.client_secret.expose())
        .append_pair("grant_type", &config.grant_type)
        .append_pair("username", &config.username)
        .append_pair("password", config.password.expose())
        .finish()
}

/// Body for the refresh token grant.
pub fn refresh_grant_form(config: &ClientConfig, refresh_token: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", &config.client_id)
        .append_pair("client_secret", config.client_secret.expose())
        .append_pair("grant_type", "refresh_token")
        .append_pair("refresh_token", refresh_token)
        .finish()
}

/// Posts grant forms to one token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: String,
}

impl TokenExchanger {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// POST `form` to the token endpoint and decode the token bundle.
    ///
    /// Any status outside `200..300` is an error carrying the status and,
    /// when it can be read, the raw body.
    pub async fn exchange(&self, form: String) -> ClientResult<OAuthResponse> {
        debug!(token_url = %self.token_url, "posting token exchange");

        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(form)
            .send()
            .await
            .map_err(|e| ClientError::transport("unable to send token request", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            error!(
                token_url = %self.token_url,
                status = status.as_u16(),
                "token exchange rejected"
            );
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::transport("unable to read token response", e))?;

        serde_json::from_str(&body)
            .map_err(|e| ClientError::decode("unable to decode token response", e))
    }
}
