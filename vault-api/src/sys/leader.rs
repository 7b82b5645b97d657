use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::Deserialize;
use time::OffsetDateTime;

/// High-availability status of the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LeaderResponse {
    /// Whether HA is enabled.
    pub ha_enabled: bool,
    /// Whether the answering node is the active node.
    pub is_self: bool,
    /// Since when the active node is active.
    #[serde(with = "time::serde::rfc3339::option")]
    pub active_time: Option<OffsetDateTime>,
    /// API address of the active node.
    pub leader_address: String,
    /// Cluster address of the active node.
    pub leader_cluster_address: String,
    /// Whether the answering node is a performance standby.
    pub performance_standby: bool,
    /// Last remote WAL index seen by a performance standby.
    pub performance_standby_last_remote_wal: u64,
    /// Last WAL index.
    pub last_wal: u64,
    /// Raft committed index.
    pub raft_committed_index: u64,
    /// Raft applied index.
    pub raft_applied_index: u64,
}

impl Sys<'_> {
    /// Returns the HA status.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn leader(&self) -> Result<LeaderResponse, ClientError> {
        self.send_json(self.request(Method::GET, "sys/leader")).await
    }
}
