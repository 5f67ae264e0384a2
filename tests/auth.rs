//! Credential lifecycle tests against a local token endpoint

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wynbot::auth::{AuthPrompt, CredentialManager};
use wynbot::{Config, Error};

mod common;
use common::write_config;

/// Prompt that answers with a fixed authorization code
struct FixedPrompt(&'static str);

impl AuthPrompt for FixedPrompt {
    fn request_code(&self, _authorization_url: &str) -> wynbot::Result<String> {
        Ok(self.0.to_string())
    }
}

fn manager_for(server: &MockServer, config_path: &std::path::Path) -> CredentialManager {
    let config = Config::load(config_path).unwrap();
    CredentialManager::new(&config, config_path.to_path_buf(), Box::new(FixedPrompt("code-1")))
        .with_endpoints(
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
        )
}

fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> serde_json::Value {
    let mut body = json!({
        "access_token": access,
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

#[tokio::test]
async fn refresh_token_on_record_exchanges_once_then_reuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", None, 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "rt-stored");
    let mut manager = manager_for(&server, &config_path);

    // No access token held yet: one refresh exchange
    let first = manager.ensure_access_token().await.unwrap();
    assert_eq!(first.access_token, "at-1");

    // Token valid for another hour: no further exchange
    let second = manager.ensure_access_token().await.unwrap();
    assert_eq!(second.access_token, "at-1");
}

#[tokio::test]
async fn expired_access_token_triggers_a_refresh_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-short", None, 0)))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "rt-stored");
    let mut manager = manager_for(&server, &config_path);

    manager.ensure_access_token().await.unwrap();
    // expires_in of zero puts expiry in the past by the next call
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    manager.ensure_access_token().await.unwrap();
}

#[tokio::test]
async fn interactive_flow_persists_the_refresh_token_before_returning() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=code-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("at-1", Some("rt-new"), 3600)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "");
    let mut manager = manager_for(&server, &config_path);

    let credential = manager.ensure_access_token().await.unwrap();
    assert_eq!(credential.access_token, "at-1");

    // Losing the refresh token is unrecoverable, so it must already be on disk
    let persisted = Config::load(&config_path).unwrap();
    assert_eq!(persisted.auth.refresh_token, "rt-new");
}

#[tokio::test]
async fn interactive_flow_without_a_refresh_token_in_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", None, 3600)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "");
    let mut manager = manager_for(&server, &config_path);

    let err = manager.ensure_access_token().await.unwrap_err();
    assert!(matches!(err, Error::CredentialExchange(_)));
}

#[tokio::test]
async fn non_success_token_response_is_a_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "rt-stored");
    let mut manager = manager_for(&server, &config_path);

    let err = manager.ensure_access_token().await.unwrap_err();
    assert!(matches!(err, Error::CredentialExchange(_)));
}

#[tokio::test]
async fn token_response_missing_fields_is_a_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scope": "chat"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "rt-stored");
    let mut manager = manager_for(&server, &config_path);

    let err = manager.ensure_access_token().await.unwrap_err();
    assert!(matches!(err, Error::CredentialExchange(_)));
}

#[tokio::test]
async fn profile_lookup_returns_the_account_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", None, 3600)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"email": "wyn@example.com"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "rt-stored");
    let mut manager = manager_for(&server, &config_path);

    assert_eq!(manager.profile_email().await.unwrap(), "wyn@example.com");
}
