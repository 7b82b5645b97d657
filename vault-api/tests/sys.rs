mod common;

use common::{client_for, envelope};
use serde_json::json;
use std::collections::HashMap;
use vault_api::sys::{GenerateRootKind, InitRequest, MountInput, UnsealOptions};
use wiremock::matchers::{body_json, body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_health_asks_for_non_error_codes() {
    let server = MockServer::start().await;
    let mut mock = Mock::given(method("GET")).and(path("/v1/sys/health"));
    for param in [
        "uninitcode",
        "sealedcode",
        "standbycode",
        "drsecondarycode",
        "performancestandbycode",
    ] {
        mock = mock.and(query_param(param, "299"));
    }
    mock.respond_with(ResponseTemplate::new(299).set_body_json(json!({
        "initialized": true,
        "sealed": true,
        "standby": true,
        "version": "1.15.2",
        "cluster_name": "vault-cluster-1"
    })))
    .expect(1)
    .mount(&server)
    .await;

    let client = client_for(&server);
    let health = client.sys().health().await.unwrap();
    assert!(health.sealed);
    assert!(health.standby);
    assert_eq!(health.version, "1.15.2");
}

#[tokio::test]
async fn test_seal_status_and_unseal() {
    let server = MockServer::start().await;
    let status = json!({
        "type": "shamir",
        "initialized": true,
        "sealed": true,
        "t": 3,
        "n": 5,
        "progress": 1,
        "nonce": "a1b2",
        "version": "1.15.2"
    });
    Mock::given(method("GET"))
        .and(path("/v1/sys/seal-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status.clone()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .and(body_json(json!({"key": "share-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(status))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .and(body_json(json!({"reset": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sealed": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let sys = client.sys();
    let status = sys.seal_status().await.unwrap();
    assert_eq!(status.seal_type, "shamir");
    assert_eq!((status.t, status.n, status.progress), (3, 5, 1));

    let status = sys.unseal("share-1").await.unwrap();
    assert!(status.sealed);
    sys.unseal_with_options(&UnsealOptions {
        reset: true,
        ..UnsealOptions::default()
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_init_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"initialized": true})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.sys().init_status().await.unwrap());
}

#[tokio::test]
async fn test_init_decodes_partial_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/init"))
        .and(body_json(json!({"secret_shares": 1, "secret_threshold": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": ["abcd"],
            "root_token": "s.root"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let resp = client
        .sys()
        .init(&InitRequest {
            secret_shares: 1,
            secret_threshold: 1,
            ..InitRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(resp.keys, ["abcd"]);
    assert!(resp.keys_base64.is_empty());
    assert_eq!(resp.root_token, "s.root");
}

#[tokio::test]
async fn test_mounts_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/mounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "secret/": {
                "type": "kv",
                "description": "key/value secret storage",
                "accessor": "kv_6b2b0c3e",
                "options": {"version": "2"},
                "config": {"default_lease_ttl": 0, "max_lease_ttl": 0}
            },
            "sys/": {"type": "system", "accessor": "system_1f2c"}
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/transit"))
        .and(body_partial_json(json!({"type": "transit", "description": "keys"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mounts = client.sys().list_mounts().await.unwrap();
    assert_eq!(mounts.len(), 2);
    let kv = &mounts["secret/"];
    assert_eq!(kv.mount_type, "kv");
    assert_eq!(kv.options.as_ref().unwrap()["version"], "2");

    client
        .sys()
        .mount(
            "transit",
            &MountInput {
                mount_type: "transit".into(),
                description: "keys".into(),
                ..MountInput::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_policies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/policy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({"policies": ["default", "root"]}))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/policy/dev"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({"name": "dev", "rules": "path \"*\" {}"}))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/policy/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/policy/dev"))
        .and(body_json(json!({"rules": "path \"secret/*\" {}"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let sys = client.sys();
    assert_eq!(sys.list_policies().await.unwrap(), ["default", "root"]);
    assert_eq!(sys.get_policy("dev").await.unwrap().as_deref(), Some("path \"*\" {}"));
    assert_eq!(sys.get_policy("ghost").await.unwrap(), None);
    sys.put_policy("dev", "path \"secret/*\" {}").await.unwrap();
}

#[tokio::test]
async fn test_lease_renew_and_revoke() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/renew"))
        .and(body_json(json!({"lease_id": "database/creds/ro/abc", "increment": 3600})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/ro/abc",
            "renewable": true,
            "lease_duration": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/revoke/database/creds/ro/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let renewed = client
        .sys()
        .renew("database/creds/ro/abc", 3600)
        .await
        .unwrap()
        .unwrap();
    assert!(renewed.renewable);
    assert_eq!(renewed.lease_duration, 1800);
    client.sys().revoke("database/creds/ro/abc").await.unwrap();
}

#[tokio::test]
async fn test_wrap_uses_default_ttl_header() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/wrapping/wrap"))
        .and(header("x-vault-wrap-ttl", "90s"))
        .and(body_json(json!({"secret": "value"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wrap_info": {
                "token": "s.wrapped",
                "accessor": "acc",
                "ttl": 90,
                "creation_time": "2024-03-01T10:00:00Z",
                "creation_path": "sys/wrapping/wrap"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let wrapped = client
        .sys()
        .wrap(&json!({"secret": "value"}), Some("90s"))
        .await
        .unwrap()
        .unwrap();
    let info = wrapped.wrap_info.unwrap();
    assert_eq!(info.token, "s.wrapped");
    assert_eq!(info.ttl, 90);
}

#[tokio::test]
async fn test_raft_snapshot_streams_into_writer() {
    let snapshot: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/storage/raft/snapshot"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(snapshot.clone()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut out = Vec::new();
    let written = client.sys().raft_snapshot(&mut out).await.unwrap();
    assert_eq!(written, snapshot.len() as u64);
    assert_eq!(out, snapshot);
}

#[tokio::test]
async fn test_raft_snapshot_restore_streams_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/storage/raft/snapshot-force"))
        .and(body_string("snapshot-bytes"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .sys()
        .raft_snapshot_restore(std::io::Cursor::new(b"snapshot-bytes".to_vec()), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_generate_root_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/replication/dr/secondary/generate-operation-token/attempt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "started": true,
            "nonce": "n-1",
            "progress": 1,
            "required": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/generate-root/attempt"))
        .and(body_json(json!({"otp": "otp-value"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"started": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let status = client
        .sys()
        .generate_root_status(GenerateRootKind::DrOperationToken)
        .await
        .unwrap();
    assert_eq!((status.progress, status.required), (1, 3));
    assert_eq!(status.nonce, "n-1");

    let started = client
        .sys()
        .generate_root_init(GenerateRootKind::Root, "otp-value", "")
        .await
        .unwrap();
    assert!(started.started);
}

#[tokio::test]
async fn test_mfa_validate_sends_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/mfa/validate"))
        .and(body_json(json!({
            "mfa_request_id": "req-1",
            "mfa_payload": {"method-id": ["123456"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::auth_envelope("s.mfa", 60, true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = HashMap::from([("method-id".to_string(), vec!["123456".to_string()])]);
    let secret = client
        .sys()
        .mfa_validate("req-1", &payload)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.auth.unwrap().client_token, "s.mfa");
}
