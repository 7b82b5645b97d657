use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};

/// Seal state of the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SealStatusResponse {
    /// Seal type (`shamir`, `awskms`, ...).
    #[serde(rename = "type")]
    pub seal_type: String,
    /// Whether the server has been initialized.
    pub initialized: bool,
    /// Whether the server is sealed.
    pub sealed: bool,
    /// Unseal key threshold.
    pub t: u32,
    /// Number of unseal key shares.
    pub n: u32,
    /// Key shares supplied so far in the current unseal attempt.
    pub progress: u32,
    /// Identifier of the current unseal attempt.
    pub nonce: String,
    /// Server version.
    pub version: String,
    /// Build date of the server binary.
    pub build_date: String,
    /// Whether a seal migration is in progress.
    pub migration: bool,
    /// Cluster name, once unsealed.
    pub cluster_name: String,
    /// Cluster id, once unsealed.
    pub cluster_id: String,
    /// Whether recovery keys are in use.
    pub recovery_seal: bool,
    /// Storage backend type.
    pub storage_type: String,
    /// Warnings reported by the server.
    pub warnings: Vec<String>,
}

/// Options for one unseal step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnsealOptions {
    /// Unseal key share.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Discard the key shares supplied so far.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
    /// Use the key share for a seal migration.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub migrate: bool,
}

impl Sys<'_> {
    /// Returns the seal state.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn seal_status(&self) -> Result<SealStatusResponse, ClientError> {
        self.send_json(self.request(Method::GET, "sys/seal-status"))
            .await
    }

    /// Seals the server.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn seal(&self) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::PUT, "sys/seal")).await
    }

    /// Supplies one unseal key share.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn unseal(&self, key: &str) -> Result<SealStatusResponse, ClientError> {
        self.unseal_with_options(&UnsealOptions {
            key: key.to_string(),
            ..UnsealOptions::default()
        })
        .await
    }

    /// Discards the key shares supplied so far.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn reset_unseal_process(&self) -> Result<SealStatusResponse, ClientError> {
        self.unseal_with_options(&UnsealOptions {
            reset: true,
            ..UnsealOptions::default()
        })
        .await
    }

    /// Runs one unseal step with explicit options.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn unseal_with_options(
        &self,
        options: &UnsealOptions,
    ) -> Result<SealStatusResponse, ClientError> {
        let req = self.request_with_body(Method::PUT, "sys/unseal", options)?;
        self.send_json(req).await
    }
}
