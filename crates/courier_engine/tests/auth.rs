use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use courier_engine::{AuthProvider, AuthSettings, CredentialCache};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn start_server() -> (tokio::runtime::Runtime, MockServer) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime");
    let server = runtime.block_on(MockServer::start());
    (runtime, server)
}

fn write_cache(path: &PathBuf, cache: &CredentialCache) {
    fs::write(path, serde_json::to_string(cache).unwrap()).unwrap();
}

fn read_cache(path: &PathBuf) -> CredentialCache {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn unexpired_cached_token_needs_no_network() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.json");
    write_cache(
        &cache_path,
        &CredentialCache {
            access_token: Some("cached-token".to_string()),
            expires_at: Some(Utc::now().timestamp() + 3600),
            refresh_token: Some("refresh".to_string()),
        },
    );

    let mut settings = AuthSettings::new("client-123", cache_path);
    // Nothing listens here; a network call would fail the test.
    settings.authority = "http://127.0.0.1:9".to_string();
    let mut provider = AuthProvider::new(settings).unwrap();

    assert_eq!(provider.get_token().as_deref(), Some("cached-token"));
}

#[test]
fn stale_token_is_refreshed_silently() {
    let (runtime, server) = start_server();
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "expires_in": 3600,
                "refresh_token": "rotated-refresh"
            })))
            .mount(&server),
    );

    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.json");
    write_cache(
        &cache_path,
        &CredentialCache {
            access_token: Some("stale".to_string()),
            expires_at: Some(Utc::now().timestamp() - 10),
            refresh_token: Some("refresh".to_string()),
        },
    );

    let mut settings = AuthSettings::new("client-123", cache_path.clone());
    settings.authority = server.uri();
    let mut provider = AuthProvider::new(settings).unwrap();

    assert_eq!(provider.get_token().as_deref(), Some("fresh-token"));

    let saved = read_cache(&cache_path);
    assert_eq!(saved.access_token.as_deref(), Some("fresh-token"));
    assert_eq!(saved.refresh_token.as_deref(), Some("rotated-refresh"));
}

#[test]
fn device_flow_polls_until_authorized() {
    let (runtime, server) = start_server();
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-code",
                "user_code": "ABC123",
                "verification_uri": "https://example.com/device",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "authorization_pending",
                "error_description": "user has not finished yet"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "device-token",
                "expires_in": 3600,
                "refresh_token": "device-refresh"
            })))
            .mount(&server)
            .await;
    });

    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.json");
    let mut settings = AuthSettings::new("client-123", cache_path.clone());
    settings.authority = server.uri();
    settings.unattended = true;
    let mut provider = AuthProvider::new(settings).unwrap();

    assert_eq!(provider.get_token().as_deref(), Some("device-token"));

    // A non-silent success persists the cache immediately, not at exit.
    let saved = read_cache(&cache_path);
    assert_eq!(saved.access_token.as_deref(), Some("device-token"));
    assert_eq!(saved.refresh_token.as_deref(), Some("device-refresh"));
}

#[test]
fn a_denied_device_flow_yields_no_token() {
    let (runtime, server) = start_server();
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-code",
                "user_code": "ABC123",
                "verification_uri": "https://example.com/device",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "access_denied"
            })))
            .mount(&server)
            .await;
    });

    let dir = TempDir::new().unwrap();
    let mut settings = AuthSettings::new("client-123", dir.path().join("cache.json"));
    settings.authority = server.uri();
    settings.unattended = true;
    let mut provider = AuthProvider::new(settings).unwrap();

    assert!(provider.get_token().is_none());
}

#[test]
fn failed_refresh_without_a_flow_available_is_fatal() {
    let (runtime, server) = start_server();
    runtime.block_on(async {
        // Refresh is rejected, and the subsequent device flow cannot start.
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
    });

    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.json");
    write_cache(
        &cache_path,
        &CredentialCache {
            access_token: None,
            expires_at: None,
            refresh_token: Some("revoked".to_string()),
        },
    );

    let mut settings = AuthSettings::new("client-123", cache_path);
    settings.authority = server.uri();
    settings.unattended = true;
    let mut provider = AuthProvider::new(settings).unwrap();

    assert!(provider.get_token().is_none());
}
