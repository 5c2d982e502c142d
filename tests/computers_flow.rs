//! Integration tests for the Secure Endpoint v1 endpoints and token cache
//! using wiremock.
//!
//! All v1 calls authenticate with the AMP Basic pair. The token cache tests
//! drive a manual clock so expiry can be crossed without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cscguard::audit::AuditLogQuery;
use cscguard::client::SecureEndpointClient;
use cscguard::config::ClientSettings;
use cscguard::error::{CscError, HttpOutcome, Result};
use cscguard::secrets::SecretReader;
use cscguard::token::{Clock, TokenKind};
use serde_json::json;
use wiremock::matchers::{basic_auth, bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct MapReader(HashMap<String, String>);

#[async_trait]
impl SecretReader for MapReader {
    async fn read(&self, reference: &str) -> Result<String> {
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| CscError::SecretBackend {
                message: format!("no item at {reference}"),
                source: None,
            })
    }
}

/// Clock that only moves when told to.
struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(ManualClock(Mutex::new(
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap()
    }
}

const PREFERENCES: &str = r#"
credentials:
  - name: amp
    load-from: 1password
    credentials-path: op://Security/amp
    id-key-name: username
    secret-key-name: credential
  - name: securex
    load-from: 1password
    credentials-path: op://Security/securex
    id-key-name: username
    secret-key-name: credential
"#;

/// Builds a client whose every base URL points at the mock server.
async fn mock_client(
    server: &MockServer,
    clock: Arc<dyn Clock>,
) -> (SecureEndpointClient, tempfile::TempDir) {
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let config = format!(
        "amp:\n  nam: {base}/v3\n  emea: {base}/v3\n  apjc: {base}/v3\n\
         securex:\n  nam: {base}\n  emea: {base}\n  apjc: {base}\n\
         umbrella:\n  global: {base}\n"
    );
    let settings = ClientSettings {
        region: "nam".to_string(),
        config_path: dir.path().join("config.yml"),
        preferences_path: dir.path().join("preferences.yml"),
    };
    std::fs::write(&settings.config_path, config).unwrap();
    std::fs::write(&settings.preferences_path, PREFERENCES).unwrap();

    let reader = MapReader(
        [
            ("op://Security/amp/username", "amp-id\n"),
            ("op://Security/amp/credential", "amp-secret\n"),
            ("op://Security/securex/username", "sx-id\n"),
            ("op://Security/securex/credential", "sx-secret\n"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    );

    let client = SecureEndpointClient::with_parts(&settings, Arc::new(reader), clock)
        .await
        .unwrap();
    (client, dir)
}

fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "version": "v1.2.0",
        "metadata": {"links": {"self": "..."}},
        "data": data
    }))
}

// ── URLs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn v1_and_v0_urls_are_derived_from_v3() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;
    assert_eq!(client.v3_url(), format!("{}/v3", server.uri()));
    assert_eq!(client.v1_url(), format!("{}/v1", server.uri()));
    assert_eq!(client.v0_url(), format!("{}/v0", server.uri()));
}

// ── computers ──────────────────────────────────────────────────────────

#[tokio::test]
async fn move_computer_patches_group_guid_with_basic_auth() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("PATCH"))
        .and(path("/v1/computers/conn-1"))
        .and(basic_auth("amp-id", "amp-secret"))
        .and(body_json(json!({"group_guid": "group-9"})))
        .respond_with(envelope(json!({
            "connector_guid": "conn-1",
            "group_guid": "group-9"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = client.move_computer("conn-1", "group-9").await.unwrap();
    assert_eq!(data, Some(json!({"connector_guid": "conn-1", "group_guid": "group-9"})));
}

#[tokio::test]
async fn list_computers_sends_paging_and_advanced_query() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers"))
        .and(query_param("offset", "100"))
        .and(query_param("limit", "50"))
        .and(query_param("hostname[]", "host1.example.com"))
        .respond_with(envelope(json!([
            {"connector_guid": "c-1", "hostname": "host1.example.com"}
        ])))
        .mount(&server)
        .await;

    let data = client
        .list_computers(100, 50, Some("hostname[]=host1.example.com"))
        .await
        .unwrap()
        .expect("envelope carries data");
    assert_eq!(data[0]["connector_guid"], "c-1");
}

#[tokio::test]
async fn envelope_without_data_returns_none() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "v1.2.0",
            "metadata": {}
        })))
        .mount(&server)
        .await;

    assert_eq!(client.get_computer("conn-2").await.unwrap(), None);
}

#[tokio::test]
async fn get_computer_not_found_is_outcome() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"error_code": 404, "description": "Not Found"}]
        })))
        .mount(&server)
        .await;

    assert_eq!(
        client.get_computer("missing").await,
        Err(HttpOutcome::NotFound)
    );
}

#[tokio::test]
async fn forbidden_is_auth_error() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-3/isolation"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert_eq!(
        client.get_isolation_status("conn-3").await,
        Err(HttpOutcome::AuthError { status: 403 })
    );
}

#[tokio::test]
async fn delete_computer_with_empty_body_is_none() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("DELETE"))
        .and(path("/v1/computers/conn-4"))
        .and(basic_auth("amp-id", "amp-secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.delete_computer("conn-4").await.unwrap(), None);
}

#[tokio::test]
async fn delete_computer_returns_deleted_flag() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("DELETE"))
        .and(path("/v1/computers/conn-5"))
        .respond_with(envelope(json!({"deleted": true})))
        .mount(&server)
        .await;

    assert_eq!(
        client.delete_computer("conn-5").await.unwrap(),
        Some(json!({"deleted": true}))
    );
}

#[tokio::test]
async fn device_trajectory_passes_time_window() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-6/trajectory"))
        .and(query_param("start_time", "2024-01-01T00:00:00Z"))
        .and(query_param("end_time", "2024-01-02T00:00:00Z"))
        .and(query_param("q", "10.0.0.5"))
        .and(query_param("limit", "25"))
        .respond_with(envelope(json!({"events": []})))
        .mount(&server)
        .await;

    let data = client
        .get_device_trajectory(
            "conn-6",
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-02T00:00:00Z"),
            Some("q=10.0.0.5"),
            25,
        )
        .await
        .unwrap();
    assert_eq!(data, Some(json!({"events": []})));
}

#[tokio::test]
async fn user_activity_and_trajectory_query_by_username() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/user_activity"))
        .and(query_param("q", "jdoe"))
        .and(query_param("limit", "10"))
        .respond_with(envelope(json!([{"connector_guid": "conn-7"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-7/user_trajectory"))
        .and(query_param("q", "jdoe"))
        .and(query_param("limit", "5"))
        .respond_with(envelope(json!({"events": [{"type": "Executed by"}]})))
        .mount(&server)
        .await;

    let activity = client.get_user_activity("jdoe", 10).await.unwrap().unwrap();
    assert_eq!(activity[0]["connector_guid"], "conn-7");

    let trajectory = client
        .get_user_trajectory("jdoe", "conn-7", 5, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trajectory["events"][0]["type"], "Executed by");
}

#[tokio::test]
async fn computer_activity_searches_by_indicator() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/activity"))
        .and(query_param("q", "evil.exe"))
        .and(query_param("offset", "0"))
        .respond_with(envelope(json!([{"connector_guid": "conn-8"}])))
        .mount(&server)
        .await;

    let data = client
        .get_computer_activity("evil.exe", 50, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data[0]["connector_guid"], "conn-8");
}

#[tokio::test]
async fn isolation_is_available_when_put_is_allowed() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("OPTIONS"))
        .and(path("/v1/computers/conn-11/isolation"))
        .and(basic_auth("amp-id", "amp-secret"))
        .respond_with(ResponseTemplate::new(200).insert_header("Allow", "GET, put, DELETE"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.check_isolation_availability("conn-11").await, Ok(true));
}

#[tokio::test]
async fn isolation_is_unavailable_without_put() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("OPTIONS"))
        .and(path("/v1/computers/conn-12/isolation"))
        .respond_with(ResponseTemplate::new(200).insert_header("Allow", "GET"))
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/v1/computers/conn-13/isolation"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert_eq!(client.check_isolation_availability("conn-12").await, Ok(false));
    assert_eq!(
        client.check_isolation_availability("conn-13").await,
        Ok(false),
        "no Allow header means nothing is allowed"
    );
}

#[tokio::test]
async fn isolation_availability_reports_not_found() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("OPTIONS"))
        .and(path("/v1/computers/gone/isolation"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(
        client.check_isolation_availability("gone").await,
        Err(HttpOutcome::NotFound)
    );
}

// ── audit log and vulnerabilities ──────────────────────────────────────

#[tokio::test]
async fn audit_log_sends_filters() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/audit_logs"))
        .and(query_param("audit_log_user", "analyst@example.com"))
        .and(query_param("audit_log_type", "Computer"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", "40"))
        .respond_with(envelope(json!([{"event": "update"}])))
        .mount(&server)
        .await;

    let filter = AuditLogQuery {
        user: Some("analyst@example.com".to_string()),
        log_type: Some("Computer".to_string()),
        limit: 20,
        offset: 40,
        ..Default::default()
    };
    let data = client.get_audit_log(&filter).await.unwrap().unwrap();
    assert_eq!(data[0]["event"], "update");
}

#[tokio::test]
async fn vulnerability_endpoints_page() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-9/vulnerabilities"))
        .and(query_param("start_time", "2024-03-01"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .respond_with(envelope(json!([{"application": "Firefox"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-9/os_vulnerabilities"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "100"))
        .respond_with(envelope(json!([{"cve": "CVE-2024-0001"}])))
        .mount(&server)
        .await;

    let apps = client
        .get_vulnerabilities("conn-9", Some("2024-03-01"), None, 100, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(apps[0]["application"], "Firefox");

    let os = client
        .get_os_vulnerabilities("conn-9", 100, 100)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(os[0]["cve"], "CVE-2024-0001");
}

#[tokio::test]
async fn server_error_is_reported_not_raised() {
    let server = MockServer::start().await;
    let (client, _dir) = mock_client(&server, ManualClock::new()).await;

    Mock::given(method("GET"))
        .and(path("/v1/computers/conn-10/os_vulnerabilities"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = client
        .get_os_vulnerabilities("conn-10", 10, 0)
        .await
        .unwrap_err();
    assert_eq!(outcome, HttpOutcome::ServerError { status: 503 });
}

// ── token cache ────────────────────────────────────────────────────────

async fn mount_securex_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/iroh/oauth2/token"))
        .and(basic_auth("sx-id", "sx-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "sx-token",
            "expires_in": 600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn token_is_reused_within_validity_window() {
    let server = MockServer::start().await;
    mount_securex_token(&server, 1).await;
    let clock = ManualClock::new();
    let (client, _dir) = mock_client(&server, clock.clone()).await;

    assert!(client.get_token(TokenKind::SecureX).await, "first call refreshes");
    clock.advance(Duration::from_secs(599));
    assert!(!client.get_token(TokenKind::SecureX).await, "still inside the window");
    assert_eq!(client.token(TokenKind::SecureX).await.as_deref(), Some("sx-token"));
}

#[tokio::test]
async fn token_is_refreshed_after_window_elapses() {
    let server = MockServer::start().await;
    mount_securex_token(&server, 2).await;
    let clock = ManualClock::new();
    let (client, _dir) = mock_client(&server, clock.clone()).await;

    assert!(client.get_token(TokenKind::SecureX).await);
    clock.advance(Duration::from_secs(600));
    assert!(client.get_token(TokenKind::SecureX).await, "expired token must refresh");
}

#[tokio::test]
async fn amp_token_goes_through_securex() {
    let server = MockServer::start().await;
    mount_securex_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v3/access_tokens"))
        .and(bearer_token("sx-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "v3-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _dir) = mock_client(&server, ManualClock::new()).await;
    assert_eq!(client.token(TokenKind::Amp).await.as_deref(), Some("v3-token"));
    // Cached: no further round trips.
    assert_eq!(client.token(TokenKind::Amp).await.as_deref(), Some("v3-token"));
}

#[tokio::test]
async fn failed_refresh_is_retried_on_next_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/iroh/oauth2/token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let (client, _dir) = mock_client(&server, ManualClock::new()).await;
    assert!(client.get_token(TokenKind::SecureX).await);
    assert!(
        client.get_token(TokenKind::SecureX).await,
        "a failed refresh must not be cached as a valid token"
    );
    // token() runs its own refresh attempt before reading the slot.
    assert!(client.token(TokenKind::SecureX).await.is_none());
}
