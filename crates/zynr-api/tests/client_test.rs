#![allow(clippy::unwrap_used)]
// Integration tests for `ZyxelClient` using wiremock.
//
// All flows here run with encryption disabled (the mock device reports
// no RSA key); the crypto channel has its own unit tests.

use std::time::Duration;

use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zynr_api::{ClientConfig, Error, ZyxelClient};

// ── Helpers ─────────────────────────────────────────────────────────

fn client_for(server: &MockServer) -> ZyxelClient {
    let config = ClientConfig::new(Url::parse(&server.uri()).unwrap(), "admin", "secret");
    ZyxelClient::new(&config).unwrap()
}

/// Mount the unauthenticated handshake: GetInfoNoLogin plus an RSA key
/// fetch reporting the "None" marker (unencrypted firmware).
async fn mount_bootstrap(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/GetInfoNoLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/getRSAPublickKey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"RSAPublicKey": "None"})))
        .mount(server)
        .await;
}

/// Mount a login endpoint that issues `session_key` at most `times`
/// times, and verifies it was consumed exactly that often.
async fn mount_login(server: &MockServer, session_key: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/UserLogin"))
        .and(body_string_contains("Input_Account"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"sessionkey": session_key})),
        )
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Mount a DAL sub-resource answering for the given session key.
async fn mount_dal(server: &MockServer, oid: &str, session_key: &str, object: Value) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/DAL"))
        .and(query_param("oid", oid))
        .and(query_param("sessionkey", session_key))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": "ZCFG_SUCCESS", "Object": [object]})),
        )
        .mount(server)
        .await;
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_negotiates_session() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    let client = client_for(&server);
    client.login().await.unwrap();
}

#[tokio::test]
async fn login_without_sessionkey_is_hard_failure() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;

    Mock::given(method("POST"))
        .and(path("/UserLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { .. }),
        "expected Authentication error, got: {err:?}"
    );
}

#[tokio::test]
async fn numeric_sessionkey_is_accepted() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;

    Mock::given(method("POST"))
        .and(path("/UserLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionkey": 872_641})))
        .mount(&server)
        .await;

    mount_dal(&server, "status", "872641", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    let record = client.get_status().await.unwrap();
    assert_eq!(record.get("device.ModelName"), Some(&json!("NR7101")));
}

// ── Status aggregation ──────────────────────────────────────────────

#[tokio::test]
async fn status_tolerates_partial_failures() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    // 7 of 9 sub-resources answer; lan and one_connect are left
    // unmounted, so they fail with 404 and must simply be omitted.
    mount_dal(&server, "cellwan_status", "SK1", json!({"INTF_RSSI": -71})).await;
    mount_dal(
        &server,
        "Traffic_Status",
        "SK1",
        json!({
            "ipIface": [{"X_ZYXEL_IfName": "wan0"}, {"X_ZYXEL_IfName": ""}],
            "ipIfaceSt": [{"tx": 1}, {"tx": 2}],
        }),
    )
    .await;
    mount_dal(&server, "cardpage_status", "SK1", json!({"SIM": "ready"})).await;
    mount_dal(&server, "lanhosts", "SK1", json!({"hosts": []})).await;
    mount_dal(&server, "wifi_easy_mesh", "SK1", json!({"enabled": false})).await;
    mount_dal(&server, "cellwan_sms", "SK1", json!({"unread": 2})).await;
    mount_dal(&server, "status", "SK1", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    let record = client.get_status().await.unwrap();

    for group in ["cellular", "traffic", "cardpage", "lanhosts", "wifi_mesh", "sms", "device"] {
        assert!(record.has_group(group), "missing group {group}");
    }
    assert!(!record.has_group("lan"));
    assert!(!record.has_group("one_connect"));

    // Traffic got reshaped and flattened; the unnamed interface is gone.
    assert_eq!(record.get("traffic.wan0.tx"), Some(&json!(1)));
    assert!(record.keys().all(|k| !k.contains("X_ZYXEL_IfName")));

    // Device identity keys come first.
    assert_eq!(record.keys().next(), Some("device.ModelName"));
}

#[tokio::test]
async fn empty_subresource_is_omitted_not_failed() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/DAL"))
        .and(query_param("oid", "cellwan_sms"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": "ZCFG_FAILURE"})),
        )
        .mount(&server)
        .await;
    mount_dal(&server, "status", "SK1", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    let record = client.get_status().await.unwrap();

    assert!(record.has_group("device"));
    assert!(!record.has_group("sms"));
}

#[tokio::test]
async fn status_fails_only_when_every_subresource_fails() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    // One login up front; each of the two passes reuses the session.
    mount_login(&server, "SK1", 1).await;
    // No DAL mocks at all: every sub-resource 404s.

    let client = client_for(&server);
    let err = client.get_status().await.unwrap_err();

    assert!(
        matches!(err, Error::AggregationFailed { attempts: 2 }),
        "expected AggregationFailed, got: {err:?}"
    );
    assert!(client.last_status_data().await.is_none());
}

// ── Session recovery ────────────────────────────────────────────────

#[tokio::test]
async fn relogin_once_on_401_with_fresh_token() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    // First login issues SK1, second login issues SK2.
    mount_login(&server, "SK1", 1).await;
    mount_login(&server, "SK2", 1).await;

    // Every call with the stale token is rejected.
    Mock::given(method("GET"))
        .and(path("/cgi-bin/DAL"))
        .and(query_param("sessionkey", "SK1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    // The retried pass must present the fresh token.
    mount_dal(&server, "cellwan_status", "SK2", json!({"INTF_RSSI": -80})).await;
    mount_dal(&server, "status", "SK2", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    let record = client.get_status().await.unwrap();

    assert_eq!(record.get("cellular.INTF_RSSI"), Some(&json!(-80)));
    // mount_login's expect(1) verifies exactly one re-login on drop.
}

#[tokio::test]
async fn server_fault_forces_full_reinitialization() {
    let server = MockServer::start().await;

    // The handshake must run twice: once for the initial login, once
    // after the hard reset.
    Mock::given(method("GET"))
        .and(path("/GetInfoNoLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getRSAPublickKey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"RSAPublicKey": "None"})))
        .expect(2)
        .mount(&server)
        .await;
    mount_login(&server, "SK1", 1).await;
    mount_login(&server, "SK2", 1).await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/DAL"))
        .and(query_param("sessionkey", "SK1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    mount_dal(&server, "status", "SK2", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    let record = client.get_status().await.unwrap();
    assert!(record.has_group("device"));
}

#[tokio::test]
async fn marked_session_reauthenticates_on_next_poll() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;
    mount_login(&server, "SK2", 1).await;
    mount_dal(&server, "status", "SK1", json!({"ModelName": "NR7101"})).await;
    mount_dal(&server, "status", "SK2", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    client.get_status().await.unwrap();

    // Scheduler timed out a cycle: the session can no longer be trusted.
    client.mark_session_invalid().await;
    client.get_status().await.unwrap();
    // mount_login expectations verify both tokens were negotiated.
}

// ── last_status_data ────────────────────────────────────────────────

#[tokio::test]
async fn raw_aggregation_is_retained_for_diagnostics() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;
    mount_dal(&server, "cellwan_status", "SK1", json!({"INTF_RSSI": -64})).await;
    mount_dal(&server, "status", "SK1", json!({"ModelName": "NR7101"})).await;

    let client = client_for(&server);
    client.get_status().await.unwrap();

    let raw = client.last_status_data().await.unwrap();
    let groups: Vec<_> = raw.keys().cloned().collect();
    assert_eq!(groups, vec!["device", "cellular"]);
    // Raw data is the nested pre-flatten shape.
    assert_eq!(raw["cellular"], json!({"INTF_RSSI": -64}));
}

// ── Reboot ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reboot_success() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/Reboot"))
        .and(query_param("sessionkey", "SK1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ZCFG_SUCCESS"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.reboot().await.unwrap();
}

#[tokio::test]
async fn rejected_reboot_is_distinct_from_timeout() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/Reboot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ZCFG_FAILURE"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.reboot().await.unwrap_err();
    assert!(
        matches!(err, Error::DeviceRejected { ref result } if result == "ZCFG_FAILURE"),
        "expected DeviceRejected, got: {err:?}"
    );
}

#[tokio::test]
async fn timed_out_reboot_is_a_transport_error() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/Reboot"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": "ZCFG_SUCCESS"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new(Url::parse(&server.uri()).unwrap(), "admin", "secret")
        .with_timeout(Duration::from_millis(250));
    let client = ZyxelClient::new(&config).unwrap();

    let err = client.reboot().await.unwrap_err();
    assert!(
        matches!(err, Error::Transport(ref e) if e.is_timeout()),
        "expected transport timeout, got: {err:?}"
    );
}

// ── Probe ───────────────────────────────────────────────────────────

#[tokio::test]
async fn probe_reports_answering_oids() {
    let server = MockServer::start().await;
    mount_bootstrap(&server).await;
    mount_login(&server, "SK1", 1).await;
    mount_dal(&server, "cellwan_status", "SK1", json!({"INTF_RSSI": -70})).await;
    mount_dal(&server, "eth_status", "SK1", json!({"link": "up"})).await;

    let client = client_for(&server);
    let available = client.probe_endpoints().await.unwrap();

    assert_eq!(available, vec!["cellwan_status", "eth_status"]);
}
