//! Typed request helpers on top of a [`RequestDispatcher`].

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::RequestDispatcher;
use crate::error::{ClientError, ClientResult};

/// Auth server profile of the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: i64,
    pub guid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub other_names: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub organisation: i64,
    pub business_partner: String,
    pub roles: Vec<String>,
    pub bp_type: String,
}

/// Dispatch a request to `url` and decode the JSON response into `T`.
pub async fn perform_request<T, D>(
    dispatcher: &D,
    method: Method,
    url: &str,
    content: Option<Vec<u8>>,
) -> ClientResult<T>
where
    T: DeserializeOwned,
    D: RequestDispatcher + ?Sized,
{
    let response = dispatcher.make_request(method, url, content).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::transport(format!("unable to read response from {}", url), e))?;
    serde_json::from_slice(&body)
        .map_err(|e| ClientError::decode(format!("unable to decode response from {}", url), e))
}

/// Like [`perform_request`], for a path and query on the API host.
pub async fn read_request_to_target<T, D>(
    dispatcher: &D,
    method: Method,
    path: &str,
    query: &str,
    content: Option<Vec<u8>>,
) -> ClientResult<T>
where
    T: DeserializeOwned,
    D: RequestDispatcher + ?Sized,
{
    let url = dispatcher.compose_api_url(path, query)?;
    perform_request(dispatcher, method, &url, content).await
}

/// Fetch the auth server profile of the user the dispatcher is logged in as.
pub async fn fetch_user_profile<D>(dispatcher: &D) -> ClientResult<UserProfile>
where
    D: RequestDispatcher + ?Sized,
{
    let url = dispatcher.me_url()?;
    perform_request(dispatcher, Method::GET, &url, None).await
}
