use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parameters for mounting a secrets engine (or enabling an auth method).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MountInput {
    /// Engine type, e.g. `kv` or `transit`.
    #[serde(rename = "type")]
    pub mount_type: String,
    /// Human readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Engine configuration.
    pub config: MountConfigInput,
    /// Engine-specific options, e.g. `{"version": "2"}` for KV.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
    /// Mount the engine node-local (not replicated).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
    /// Enable seal wrapping.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub seal_wrap: bool,
    /// External entropy access.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external_entropy_access: bool,
    /// Pinned plugin version.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plugin_version: String,
}

/// Tunable configuration of a mount. Unset fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MountConfigInput {
    /// Default lease TTL, as a duration string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_lease_ttl: Option<String>,
    /// Maximum lease TTL, as a duration string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lease_ttl: Option<String>,
    /// Description override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Force the engine to never issue leases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_no_cache: Option<bool>,
    /// Request keys whose values are HMAC'd in audit logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_non_hmac_request_keys: Option<Vec<String>>,
    /// Response keys whose values are HMAC'd in audit logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_non_hmac_response_keys: Option<Vec<String>>,
    /// `unauth` or `hidden`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_visibility: Option<String>,
    /// Request headers passed through to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passthrough_request_headers: Option<Vec<String>>,
    /// Response headers the engine may set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_response_headers: Option<Vec<String>>,
    /// Token type issued by an auth method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Engine-specific options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HashMap<String, String>>,
    /// Pinned plugin version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
}

/// A mounted engine as reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MountOutput {
    /// Unique identifier of the mount.
    pub uuid: String,
    /// Engine type.
    #[serde(rename = "type")]
    pub mount_type: String,
    /// Human readable description.
    pub description: String,
    /// Accessor of the mount.
    pub accessor: String,
    /// Effective configuration.
    pub config: MountConfigOutput,
    /// Engine-specific options.
    pub options: Option<HashMap<String, String>>,
    /// Whether the mount is node-local.
    pub local: bool,
    /// Whether seal wrapping is enabled.
    pub seal_wrap: bool,
    /// Whether external entropy access is enabled.
    pub external_entropy_access: bool,
    /// Requested plugin version.
    pub plugin_version: String,
    /// Plugin version actually running.
    pub running_plugin_version: String,
    /// Whether the mount is deprecated.
    pub deprecation_status: String,
}

/// Effective configuration of a mount.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MountConfigOutput {
    /// Default lease TTL in seconds.
    pub default_lease_ttl: u64,
    /// Maximum lease TTL in seconds.
    pub max_lease_ttl: u64,
    /// Whether the engine never issues leases.
    pub force_no_cache: bool,
    /// Request keys HMAC'd in audit logs.
    pub audit_non_hmac_request_keys: Vec<String>,
    /// Response keys HMAC'd in audit logs.
    pub audit_non_hmac_response_keys: Vec<String>,
    /// Listing visibility.
    pub listing_visibility: String,
    /// Passed-through request headers.
    pub passthrough_request_headers: Vec<String>,
    /// Allowed response headers.
    pub allowed_response_headers: Vec<String>,
    /// Token type issued by an auth method.
    pub token_type: String,
}

#[derive(Serialize)]
struct RemountBody<'a> {
    from: &'a str,
    to: &'a str,
}

/// The server answers mount listings with mounts both in `data` and at the
/// top level. Only `data` is read; anything that is not a mount is skipped.
pub(super) fn mounts_from_data(
    data: Map<String, Value>,
) -> Result<HashMap<String, MountOutput>, ClientError> {
    data.into_iter()
        .filter(|(_, v)| v.is_object())
        .map(|(k, v)| Ok((k, serde_json::from_value(v)?)))
        .collect()
}

impl Sys<'_> {
    /// Lists mounted secrets engines keyed by path (with trailing slash).
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_mounts(&self) -> Result<HashMap<String, MountOutput>, ClientError> {
        let data: Map<String, Value> = self.send_data(self.request(Method::GET, "sys/mounts")).await?;
        mounts_from_data(data)
    }

    /// Mounts a secrets engine at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn mount(&self, path: &str, input: &MountInput) -> Result<(), ClientError> {
        let req = self.request_with_body(Method::POST, &format!("sys/mounts/{path}"), input)?;
        self.send_discard(req).await
    }

    /// Unmounts the engine at `path`, revoking its leases.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn unmount(&self, path: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::DELETE, &format!("sys/mounts/{path}")))
            .await
    }

    /// Returns the engine mounted at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error; a missing mount is a `404` error.
    pub async fn get_mount(&self, path: &str) -> Result<MountOutput, ClientError> {
        self.send_data(self.request(Method::GET, &format!("sys/mounts/{path}")))
            .await
    }

    /// Moves the mount at `from` to `to`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn remount(&self, from: &str, to: &str) -> Result<(), ClientError> {
        let req = self.request_with_body(Method::POST, "sys/remount", &RemountBody { from, to })?;
        self.send_discard(req).await
    }

    /// Updates the tunable configuration of the mount at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn tune_mount(&self, path: &str, config: &MountConfigInput) -> Result<(), ClientError> {
        let req =
            self.request_with_body(Method::POST, &format!("sys/mounts/{path}/tune"), config)?;
        self.send_discard(req).await
    }

    /// Returns the effective configuration of the mount at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn mount_config(&self, path: &str) -> Result<MountConfigOutput, ClientError> {
        self.send_data(self.request(Method::GET, &format!("sys/mounts/{path}/tune")))
            .await
    }
}
