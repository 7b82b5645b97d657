use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::Deserialize;

// Status reported for non-active states, so they decode instead of failing.
const NON_ERROR_STATUS: &str = "299";

/// Health of the answering node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    /// Whether the server has been initialized.
    pub initialized: bool,
    /// Whether the server is sealed.
    pub sealed: bool,
    /// Whether the node is a standby.
    pub standby: bool,
    /// Whether the node is a performance standby.
    pub performance_standby: bool,
    /// Performance replication mode.
    pub replication_performance_mode: String,
    /// DR replication mode.
    pub replication_dr_mode: String,
    /// Server time as a Unix timestamp.
    pub server_time_utc: i64,
    /// Server version.
    pub version: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Cluster id.
    pub cluster_id: String,
    /// Last WAL index.
    pub last_wal: u64,
    /// Whether the server is an enterprise build.
    pub enterprise: bool,
    /// Time taken by the last echo to the active node.
    pub echo_duration_ms: i64,
    /// Clock skew to the active node.
    pub clock_skew_ms: i64,
}

impl Sys<'_> {
    /// Returns the node's health.
    ///
    /// Sealed, uninitialized and standby nodes answer normally instead of
    /// with an error status.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let mut req = self.request(Method::GET, "sys/health");
        for param in [
            "uninitcode",
            "sealedcode",
            "standbycode",
            "drsecondarycode",
            "performancestandbycode",
        ] {
            req.set_param(param, NON_ERROR_STATUS);
        }
        self.send_json(req).await
    }
}
