use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which key set a rekey replaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RekeyTarget {
    /// The unseal (barrier) keys.
    #[default]
    Barrier,
    /// The recovery keys of an auto-unsealed server.
    Recovery,
}

impl RekeyTarget {
    fn base_path(self) -> &'static str {
        match self {
            RekeyTarget::Barrier => "sys/rekey",
            RekeyTarget::Recovery => "sys/rekey-recovery-key",
        }
    }
}

/// Parameters of a rekey.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RekeyInitRequest {
    /// Number of new key shares.
    pub secret_shares: u32,
    /// Shares required to reconstruct the key.
    pub secret_threshold: u32,
    /// Shares stored by an auto-unseal mechanism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_shares: Option<u32>,
    /// PGP keys encrypting each new share.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pgp_keys: Vec<String>,
    /// Keep a backup of the PGP-encrypted shares on the server.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub backup: bool,
    /// Require the new shares to be verified before they take effect.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub require_verification: bool,
}

/// Progress of a rekey.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RekeyStatus {
    /// Identifier of the rekey.
    pub nonce: String,
    /// Whether a rekey is in progress.
    pub started: bool,
    /// New threshold.
    pub t: u32,
    /// New number of shares.
    pub n: u32,
    /// Existing shares supplied so far.
    pub progress: u32,
    /// Existing shares required.
    pub required: u32,
    /// Fingerprints of the PGP keys in use.
    pub pgp_fingerprints: Vec<String>,
    /// Whether a backup is kept.
    pub backup: bool,
    /// Whether verification is required.
    pub verification_required: bool,
}

/// Answer to a rekey key share. Once `complete`, carries the new shares.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RekeyUpdateResponse {
    /// Identifier of the rekey.
    pub nonce: String,
    /// Whether the rekey finished.
    pub complete: bool,
    /// New key shares, hex encoded.
    pub keys: Vec<String>,
    /// New key shares, base64 encoded.
    #[serde(rename = "keys_base64")]
    pub keys_b64: Vec<String>,
    /// Fingerprints of the PGP keys in use.
    pub pgp_fingerprints: Vec<String>,
    /// Whether a backup was kept.
    pub backup: bool,
    /// Whether the new shares must be verified.
    pub verification_required: bool,
    /// Identifier of the verification, when required.
    pub verification_nonce: String,
}

/// Progress of a rekey verification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RekeyVerificationStatus {
    /// Identifier of the verification.
    pub nonce: String,
    /// Whether a verification is in progress.
    pub started: bool,
    /// New threshold.
    pub t: u32,
    /// New number of shares.
    pub n: u32,
    /// New shares supplied so far.
    pub progress: u32,
    /// Set once the verification finished.
    pub complete: bool,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    key: &'a str,
    nonce: &'a str,
}

#[derive(Deserialize)]
struct Backup {
    #[serde(default)]
    keys: HashMap<String, Vec<String>>,
}

impl Sys<'_> {
    /// Returns the progress of a rekey.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_status(&self, target: RekeyTarget) -> Result<RekeyStatus, ClientError> {
        let path = format!("{}/init", target.base_path());
        self.send_json(self.request(Method::GET, &path)).await
    }

    /// Starts a rekey.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_init(
        &self,
        target: RekeyTarget,
        request: &RekeyInitRequest,
    ) -> Result<RekeyStatus, ClientError> {
        let path = format!("{}/init", target.base_path());
        let req = self.request_with_body(Method::PUT, &path, request)?;
        self.send_json(req).await
    }

    /// Supplies one existing key share to the rekey identified by `nonce`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_update(
        &self,
        target: RekeyTarget,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyUpdateResponse, ClientError> {
        let path = format!("{}/update", target.base_path());
        let req = self.request_with_body(Method::PUT, &path, &UpdateBody { key, nonce })?;
        self.send_json(req).await
    }

    /// Cancels the rekey in progress.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn rekey_cancel(&self, target: RekeyTarget) -> Result<(), ClientError> {
        let path = format!("{}/init", target.base_path());
        self.send_discard(self.request(Method::DELETE, &path)).await
    }

    /// Returns the PGP-encrypted backup of the new shares, keyed by fingerprint.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_retrieve_backup(
        &self,
        target: RekeyTarget,
    ) -> Result<HashMap<String, Vec<String>>, ClientError> {
        let path = format!("{}/backup", target.base_path());
        let backup: Backup = self.send_data(self.request(Method::GET, &path)).await?;
        Ok(backup.keys)
    }

    /// Returns the progress of a rekey verification.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_verification_status(
        &self,
        target: RekeyTarget,
    ) -> Result<RekeyVerificationStatus, ClientError> {
        let path = format!("{}/verify", target.base_path());
        self.send_json(self.request(Method::GET, &path)).await
    }

    /// Supplies one new key share to the verification identified by `nonce`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rekey_verification_update(
        &self,
        target: RekeyTarget,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyVerificationStatus, ClientError> {
        let path = format!("{}/verify", target.base_path());
        let req = self.request_with_body(Method::PUT, &path, &UpdateBody { key, nonce })?;
        self.send_json(req).await
    }

    /// Restarts the verification, discarding the new shares supplied so far.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn rekey_verification_cancel(&self, target: RekeyTarget) -> Result<(), ClientError> {
        let path = format!("{}/verify", target.base_path());
        self.send_discard(self.request(Method::DELETE, &path)).await
    }
}
