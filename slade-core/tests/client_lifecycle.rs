//! Integration tests for the server client lifecycle.
//!
//! These tests verify that a ServerClient:
//! - Rejects invalid credentials without touching the network
//! - Initializes against a well-behaved token endpoint
//! - Stays uninitialized when the token endpoint fails or misbehaves
//! - Schedules its refresh at 95% of the token lifetime

use chrono::{Duration, Utc};
use slade_core::{
    Authenticator, ClientConfig, ClientError, PostconditionError, Secret, ServerClient,
    check_initialization, check_postconditions, get_access_token,
};
use std::collections::BTreeMap;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path},
};

/// Helper to build a valid configuration pointing at a mock token endpoint.
fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        client_id: "ZXCVBNMASDFGHJKL".to_string(),
        client_secret: Secret::new("QWERTYUIOPASDFGHJKL"),
        api_token_url: format!("{}/oauth2/token/", server.uri()),
        api_host: "127.0.0.1".to_string(),
        api_scheme: "http".to_string(),
        grant_type: "password".to_string(),
        username: "test@bewell.co.ke".to_string(),
        password: Secret::new("a1b2c3"),
        extra_headers: BTreeMap::new(),
    }
}

fn token_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "GJJGFDGJJGFGJHHJF",
        "scope": "this.is.some.dummy.scope",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "YHGFDSETGJKHFDD",
    }))
}

#[tokio::test]
async fn test_initialize_against_mock_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token/"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "client_id=ZXCVBNMASDFGHJKL&client_secret=QWERTYUIOPASDFGHJKL\
             &grant_type=password&username=test%40bewell.co.ke&password=a1b2c3",
        ))
        .respond_with(token_response())
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let client = ServerClient::connect(test_config(&server)).await.unwrap();
    let after = Utc::now();

    assert!(client.is_initialized());
    assert!(check_initialization(&client).is_ok());
    assert_eq!(client.access_token().as_deref(), Some("GJJGFDGJJGFGJHHJF"));
    assert_eq!(client.token_type().as_deref(), Some("Bearer"));
    assert_eq!(client.refresh_token().as_deref(), Some("YHGFDSETGJKHFDD"));
    assert_eq!(client.access_scope().as_deref(), Some("this.is.some.dummy.scope"));
    assert_eq!(client.expires_in(), Some(3600));

    let refresh_at = client.refresh_at().unwrap();
    assert!(refresh_at >= before + Duration::seconds(3420));
    assert!(refresh_at <= after + Duration::seconds(3420));
}

#[tokio::test]
async fn test_initialize_fails_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::new(test_config(&server)).unwrap();
    let err = client.initialize().await.unwrap_err();

    assert!(err.to_string().contains("500"));
    assert!(err.is_retryable());
    assert!(!client.is_initialized());
    assert!(client.access_token().is_none());
}

#[tokio::test]
async fn test_initialize_rejects_inconsistent_token_bundle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "GJJGFDGJJGFGJHHJF",
            "scope": "this.is.some.dummy.scope",
            "token_type": "MAC",
            "expires_in": 3600,
            "refresh_token": "YHGFDSETGJKHFDD",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::new(test_config(&server)).unwrap();
    let err = client.initialize().await.unwrap_err();

    assert!(matches!(err, ClientError::Postcondition(_)));
    assert!(!client.is_initialized());
}

#[tokio::test]
async fn test_invalid_credentials_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .expect(0)
        .mount(&server)
        .await;

    let invalid: Vec<(&str, ClientConfig)> = vec![
        ("client_id", ClientConfig { client_id: "abc".into(), ..test_config(&server) }),
        (
            "client_secret",
            ClientConfig { client_secret: Secret::new("abc"), ..test_config(&server) },
        ),
        ("api_token_url", ClientConfig { api_token_url: "token".into(), ..test_config(&server) }),
        ("api_host", ClientConfig { api_host: "127.0.0.1:80".into(), ..test_config(&server) }),
        ("api_scheme", ClientConfig { api_scheme: "ws".into(), ..test_config(&server) }),
        ("grant_type", ClientConfig { grant_type: "implicit".into(), ..test_config(&server) }),
        ("username", ClientConfig { username: "u".into(), ..test_config(&server) }),
        ("password", ClientConfig { password: Secret::new("p"), ..test_config(&server) }),
    ];

    for (field, config) in invalid {
        let client = ServerClient::new(config).unwrap();

        let err = client.initialize().await.unwrap_err();
        match &err {
            ClientError::Precondition(precondition) => assert_eq!(precondition.field(), field),
            other => panic!("expected a precondition error for {field}, got {other}"),
        }
        assert!(err.to_string().contains(field), "{err}");
        assert!(!client.is_initialized());

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }
}

#[tokio::test]
async fn test_login_error_names_the_username() {
    let server = MockServer::start().await;
    let config = test_config(&server).with_login("u", "p");
    let err = ServerClient::connect(config).await.unwrap_err();
    assert!(
        err.to_string()
            .contains("the username `u` is not a valid email")
    );
}

#[tokio::test]
async fn test_get_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .mount(&server)
        .await;

    let token = get_access_token(test_config(&server)).await.unwrap();
    assert_eq!(token, "GJJGFDGJJGFGJHHJF");
}

#[tokio::test]
async fn test_authenticate_replaces_token_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .expect(2)
        .mount(&server)
        .await;

    let client = ServerClient::connect(test_config(&server)).await.unwrap();
    let first = client.token_state().unwrap();

    client.authenticate().await.unwrap();
    let second = client.token_state().unwrap();

    assert!(second.refresh_at >= first.refresh_at);
    assert_eq!(second.access_token, first.access_token);
    assert!(client.is_initialized());
}

#[tokio::test]
async fn test_unrepresentable_expiry_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "GJJGFDGJJGFGJHHJF",
            "scope": "this.is.some.dummy.scope",
            "token_type": "Bearer",
            "expires_in": i64::MAX,
            "refresh_token": "YHGFDSETGJKHFDD",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::new(test_config(&server)).unwrap();
    let err = client.initialize().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Postcondition(PostconditionError::InvalidExpiresIn { expires_in: i64::MAX })
    ));
    assert!(!client.is_initialized());
    assert!(client.token_state().is_none());
}

#[tokio::test]
async fn test_authenticate_keeps_state_when_bundle_is_inconsistent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "OTHERACCESSTOKEN",
            "scope": "this.is.some.dummy.scope",
            "token_type": "MAC",
            "expires_in": 3600,
            "refresh_token": "YHGFDSETGJKHFDD",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::connect(test_config(&server)).await.unwrap();
    let before = client.token_state().unwrap();

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Postcondition(PostconditionError::InvalidTokenType { .. })
    ));

    assert!(client.is_initialized());
    assert_eq!(client.token_type().as_deref(), Some("Bearer"));
    assert_eq!(client.token_state().unwrap(), before);
    assert_eq!(check_postconditions(&client.token_state().unwrap(), Utc::now()), Ok(()));
}
