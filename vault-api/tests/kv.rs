mod common;

use common::{client_for, envelope};
use serde_json::{json, Map, Value};
use vault_api::kv::KvPatchMethod;
use vault_api::{ClientError, KvPutOptions};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn version_payload(data: Value, version: u64, deletion_time: &str, destroyed: bool) -> Value {
    json!({
        "data": data,
        "metadata": {
            "created_time": "2024-03-01T10:00:00.000000001Z",
            "custom_metadata": {"owner": "ops"},
            "deletion_time": deletion_time,
            "destroyed": destroyed,
            "version": version
        }
    })
}

#[tokio::test]
async fn test_kv_v1_get_and_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"user": "app"}))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/none"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let kv = client.kv_v1("kv");
    let secret = kv.get("app").await.unwrap();
    assert_eq!(secret.data.unwrap()["user"], "app");
    assert!(secret.version_metadata.is_none());

    let err = kv.get("none").await.unwrap_err();
    assert!(matches!(err, ClientError::SecretNotFound(p) if p == "kv/none"));
}

#[tokio::test]
async fn test_kv_v2_get_splits_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app/db"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"password": "hunter2"}),
            2,
            "",
            false,
        ))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let secret = client.kv_v2("secret").get("app/db").await.unwrap();
    assert_eq!(secret.data.unwrap()["password"], "hunter2");
    let meta = secret.version_metadata.unwrap();
    assert_eq!(meta.version, 2);
    assert!(meta.deletion_time.is_none());
    assert!(!meta.is_deleted());
    assert_eq!(secret.custom_metadata.unwrap()["owner"], "ops");
}

#[tokio::test]
async fn test_kv_v2_get_soft_deleted_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app/db"))
        .respond_with(ResponseTemplate::new(404).set_body_json(envelope(version_payload(
            Value::Null,
            3,
            "2024-03-02T00:00:00Z",
            false,
        ))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let secret = client.kv_v2("secret").get("app/db").await.unwrap();
    assert!(secret.data.is_none());
    let meta = secret.version_metadata.unwrap();
    assert_eq!(meta.version, 3);
    assert!(meta.is_deleted());
}

#[tokio::test]
async fn test_kv_v2_get_missing_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/nothing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.kv_v2("secret").get("nothing").await.unwrap_err();
    assert!(matches!(err, ClientError::SecretNotFound(_)));
}

#[tokio::test]
async fn test_kv_v2_get_version_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(query_param("version", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"v": 1}),
            1,
            "",
            false,
        ))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let secret = client.kv_v2("secret").get_version("app", 1).await.unwrap();
    assert_eq!(secret.version_metadata.unwrap().version, 1);
}

#[tokio::test]
async fn test_kv_v2_put_with_cas() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/secret/data/app"))
        .and(body_json(json!({"data": {"k": "v"}, "options": {"cas": 0}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "created_time": "2024-03-01T10:00:00Z",
            "custom_metadata": null,
            "deletion_time": "",
            "destroyed": false,
            "version": 1
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let written = client
        .kv_v2("secret")
        .put_with_options("app", &map(json!({"k": "v"})), &KvPutOptions::cas(0))
        .await
        .unwrap();
    assert!(written.data.is_none());
    assert_eq!(written.version_metadata.unwrap().version, 1);
}

#[tokio::test]
async fn test_kv_v2_put_without_options_omits_them() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/secret/data/app"))
        .and(body_json(json!({"data": {"k": "v"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"version": 5}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let written = client
        .kv_v2("secret")
        .put("app", &map(json!({"k": "v"})))
        .await
        .unwrap();
    assert_eq!(written.version_metadata.unwrap().version, 5);
}

#[tokio::test]
async fn test_kv_v2_metadata_versions_are_ordered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/metadata/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "cas_required": false,
            "created_time": "2024-03-01T10:00:00Z",
            "current_version": 10,
            "custom_metadata": null,
            "delete_version_after": "0s",
            "max_versions": 0,
            "oldest_version": 0,
            "updated_time": "2024-03-05T10:00:00Z",
            "versions": {
                "10": {"created_time": "2024-03-05T10:00:00Z", "deletion_time": "", "destroyed": false},
                "2": {"created_time": "2024-03-02T10:00:00Z", "deletion_time": "", "destroyed": true},
                "1": {"created_time": "2024-03-01T10:00:00Z", "deletion_time": "2024-03-03T00:00:00Z", "destroyed": false}
            }
        }))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let kv = client.kv_v2("secret");
    let metadata = kv.get_metadata("app").await.unwrap();
    assert_eq!(metadata.current_version, 10);
    assert!(metadata.versions[&2].destroyed);

    let versions = kv.get_versions_as_list("app").await.unwrap();
    let numbers: Vec<u64> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, [1, 2, 10]);
    assert!(versions[0].is_deleted());
}

#[tokio::test]
async fn test_kv_v2_version_operations() {
    let server = MockServer::start().await;
    for op in ["delete", "undelete", "destroy"] {
        Mock::given(method("PUT"))
            .and(path(format!("/v1/secret/{op}/app")))
            .and(body_json(json!({"versions": [1, 3]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    let kv = client.kv_v2("secret");
    kv.delete_versions("app", &[1, 3]).await.unwrap();
    kv.undelete_versions("app", &[1, 3]).await.unwrap();
    kv.destroy_versions("app", &[1, 3]).await.unwrap();
    kv.destroy_versions("app", &[]).await.unwrap();
}

#[tokio::test]
async fn test_kv_v2_patch_falls_back_to_read_write() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"a": "1", "b": "2"}),
            4,
            "",
            false,
        ))))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/secret/data/app"))
        .and(body_json(json!({"data": {"a": "1", "b": "3"}, "options": {"cas": 4}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"version": 5}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let patched = client
        .kv_v2("secret")
        .patch("app", &map(json!({"b": "3"})))
        .await
        .unwrap();
    assert_eq!(patched.version_metadata.unwrap().version, 5);
}

#[tokio::test]
async fn test_kv_v2_merge_patch_does_not_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .kv_v2("secret")
        .patch_with_method(
            "app",
            &map(json!({"b": "3"})),
            KvPatchMethod::MergePatch,
            &KvPutOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(405));
}

#[tokio::test]
async fn test_kv_v2_rollback_refuses_destroyed_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(query_param("version", "1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(envelope(version_payload(
            Value::Null,
            1,
            "",
            true,
        ))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"a": "2"}),
            2,
            "",
            false,
        ))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.kv_v2("secret").rollback("app", 1).await.unwrap_err();
    assert!(matches!(err, ClientError::Precondition(msg) if msg.contains("destroyed")));
}

#[tokio::test]
async fn test_kv_v2_rollback_writes_old_data_with_cas() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(query_param("version", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"a": "1"}),
            1,
            "",
            false,
        ))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_payload(
            json!({"a": "2"}),
            2,
            "",
            false,
        ))))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/secret/data/app"))
        .and(body_json(json!({"data": {"a": "1"}, "options": {"cas": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"version": 3}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let written = client.kv_v2("secret").rollback("app", 1).await.unwrap();
    assert_eq!(written.version_metadata.unwrap().version, 3);
}
