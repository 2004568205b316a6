#![allow(clippy::unwrap_used)]
// Integration tests for `Directory` using wiremock.

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opnsync_api::DeviceClient;
use opnsync_core::catalogue::{HAPROXY_ACL, TRUST_CRL, ZABBIX_AGENT};
use opnsync_core::{AttrMap, CoreError, DeviceConfig, DeviceRegistry, Directory};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Arc<DeviceClient>) {
    let server = MockServer::start().await;
    let registry = DeviceRegistry::new().with_device(
        "fw01",
        DeviceConfig::new(Url::parse(&server.uri()).unwrap(), None),
    );
    let client = registry.client_for("fw01").unwrap();
    (server, client)
}

fn attrs(value: Value) -> AttrMap {
    value.as_object().unwrap().clone()
}

// ── List ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_skips_unnamed_rows() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/haproxy/settings/searchAcls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "uuid": "a1", "name": "block-foo", "expression": "hdr_beg" },
                { "uuid": "a2", "name": "" },
                { "uuid": "a3" },
                { "uuid": "a4", "name": "allow-bar" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let objects = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .list()
        .await
        .unwrap();

    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["block-foo", "allow-bar"]);
    assert_eq!(objects[0].identifier, "a1");
    assert_eq!(objects[0].device, "fw01");
    assert_eq!(objects[0].attrs["expression"], json!("hdr_beg"));
}

#[tokio::test]
async fn test_list_without_rows_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total": 0 })))
        .mount(&server)
        .await;

    let err = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .list()
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::MalformedResponse { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_crl_list_fetches_details() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/trust/crl/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "refid": "ca01", "descr": "Root CA" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/trust/crl/get/ca01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crl": { "descr": "Root CA", "lifetime": "9999", "crlmethod": "internal" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let objects = Directory::new(&TRUST_CRL, "fw01", &client)
        .list()
        .await
        .unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].identifier, "ca01");
    assert_eq!(objects[0].name, "Root CA");
    assert_eq!(objects[0].attrs["lifetime"], json!("9999"));
}

#[tokio::test]
async fn test_settings_list_yields_one_object_named_after_device() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/zabbixagent/settings/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "zabbixagent": { "settings": { "main": { "enabled": "1" } } }
        })))
        .mount(&server)
        .await;

    let objects = Directory::new(&ZABBIX_AGENT, "fw01", &client)
        .list()
        .await
        .unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name, "fw01");
    assert_eq!(objects[0].identifier, "");
    assert_eq!(objects[0].attrs["settings"]["main"]["enabled"], json!("1"));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_wraps_payload_and_returns_identifier() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/haproxy/settings/addAcl"))
        .and(body_json(json!({ "acl": { "name": "block-foo", "expression": "hdr_beg" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "saved", "uuid": "new-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .create(
            "block-foo",
            &attrs(json!({ "name": "block-foo", "expression": "hdr_beg" })),
        )
        .await
        .unwrap();

    assert_eq!(id, "new-1");
}

#[tokio::test]
async fn test_saved_create_without_uuid_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/haproxy/settings/addAcl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "saved" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .create("block-foo", &attrs(json!({ "name": "block-foo" })))
        .await
        .unwrap_err();

    match err {
        CoreError::MalformedResponse {
            ref device,
            ref path,
            ref message,
        } => {
            assert_eq!(device, "fw01");
            assert_eq!(path, "haproxy/settings/addAcl");
            assert!(message.contains("uuid"), "got: {message}");
        }
        other => panic!("expected MalformedResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_status_check_ignores_case_and_whitespace() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/haproxy/settings/setAcl/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": " Saved\n" })))
        .expect(1)
        .mount(&server)
        .await;

    Directory::new(&HAPROXY_ACL, "fw01", &client)
        .update("block-foo", "a1", &attrs(json!({ "name": "block-foo" })))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_create_is_mutation_error_with_context() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/haproxy/settings/addAcl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "failed",
            "validations": { "acl.name": "Should be unique" }
        })))
        .mount(&server)
        .await;

    let err = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .create("block-foo", &attrs(json!({ "name": "block-foo" })))
        .await
        .unwrap_err();

    match err {
        CoreError::Mutation {
            ref kind,
            ref name,
            ref device,
            ref response,
            ..
        } => {
            assert_eq!(kind, "haproxy_acl");
            assert_eq!(name, "block-foo");
            assert_eq!(device, "fw01");
            assert!(response.contains("Should be unique"), "got: {response}");
        }
        other => panic!("expected Mutation error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_expects_deleted_verb() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/haproxy/settings/delAcl/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "saved" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = Directory::new(&HAPROXY_ACL, "fw01", &client)
        .delete("block-foo", "a1")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Mutation { ref identifier, .. } if identifier == "a1"));
}

#[tokio::test]
async fn test_crl_create_resolves_caref_and_reads_status_field() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/trust/ca/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "uuid": "u1", "refid": "ref-other", "descr": "Other CA" },
                { "uuid": "u2", "refid": "ref-root", "descr": "Root CA" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/trust/crl/set/ref-root"))
        .and(body_json(json!({ "crl": { "lifetime": "365" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "saved" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = Directory::new(&TRUST_CRL, "fw01", &client)
        .create("Root CA", &attrs(json!({ "lifetime": "365" })))
        .await
        .unwrap();

    assert_eq!(id, "ref-root");
}

#[tokio::test]
async fn test_crl_create_with_unknown_ca_is_lookup_error_and_sends_nothing() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/trust/ca/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "uuid": "u1", "descr": "Root CA" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "saved" })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = Directory::new(&TRUST_CRL, "fw01", &client);

    // No matching row.
    let err = dir
        .create("Missing CA", &attrs(json!({ "lifetime": "365" })))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Lookup { ref value, .. } if value == "Missing CA"));

    // Matching row without a refid.
    let err = dir
        .create("Root CA", &attrs(json!({ "lifetime": "365" })))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Lookup { ref field, .. } if field == "refid"));
}

#[tokio::test]
async fn test_settings_create_writes_in_place_and_delete_is_unsupported() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/zabbixagent/settings/set"))
        .and(body_json(json!({ "zabbixagent": { "settings": { "main": { "enabled": "1" } } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "saved" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = Directory::new(&ZABBIX_AGENT, "fw01", &client);
    let id = dir
        .create(
            "fw01",
            &attrs(json!({ "settings": { "main": { "enabled": "1" } } })),
        )
        .await
        .unwrap();
    assert_eq!(id, "");

    let err = dir.delete("fw01", "").await.unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { ref operation, .. } if operation == "delete"));
}
