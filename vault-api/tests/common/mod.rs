#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use vault_api::{Client, ClientBuilder};
use wiremock::MockServer;

pub const ROOT_TOKEN: &str = "root";

/// A builder pointed at `server` with a root token and near-instant retries.
pub fn builder_for(server: &MockServer) -> ClientBuilder {
    ClientBuilder::new()
        .address(server.uri())
        .token(ROOT_TOKEN)
        .retry_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

pub fn client_for(server: &MockServer) -> Client {
    builder_for(server).build().unwrap()
}

/// A response envelope carrying `data`.
pub fn envelope(data: Value) -> Value {
    json!({
        "request_id": "6d2c7f0e-5a3b-4b1e-9c55-3f9a3f2b8c11",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": data,
        "wrap_info": null,
        "warnings": null,
        "auth": null
    })
}

/// A response envelope carrying an auth block for `token`.
pub fn auth_envelope(token: &str, ttl: u64, renewable: bool) -> Value {
    json!({
        "request_id": "0b8e1d7c-4f2a-4c8e-8d0b-2a6b5f9e7c33",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "auth": {
            "client_token": token,
            "accessor": "acc-1234",
            "policies": ["default"],
            "token_policies": ["default"],
            "metadata": {"user": "alice"},
            "lease_duration": ttl,
            "renewable": renewable,
            "entity_id": "",
            "token_type": "service",
            "orphan": false
        }
    })
}
