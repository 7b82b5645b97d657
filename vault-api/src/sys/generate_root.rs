use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};

/// Which privileged token a generation produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GenerateRootKind {
    /// A root token.
    #[default]
    Root,
    /// A DR operation batch token, on a DR secondary.
    DrOperationToken,
    /// A recovery token.
    Recovery,
}

impl GenerateRootKind {
    fn base_path(self) -> &'static str {
        match self {
            GenerateRootKind::Root => "sys/generate-root",
            GenerateRootKind::DrOperationToken => {
                "sys/replication/dr/secondary/generate-operation-token"
            }
            GenerateRootKind::Recovery => "sys/generate-recovery-token",
        }
    }
}

/// Progress of a token generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenerateRootStatus {
    /// Whether a generation is in progress.
    pub started: bool,
    /// Identifier of the generation.
    pub nonce: String,
    /// Key shares supplied so far.
    pub progress: u32,
    /// Key shares required.
    pub required: u32,
    /// Whether the generation finished.
    pub complete: bool,
    /// The generated token, encoded with the OTP or PGP key.
    pub encoded_token: String,
    /// Older servers name the encoded token this way.
    pub encoded_root_token: String,
    /// Fingerprint of the PGP key in use.
    pub pgp_fingerprint: String,
    /// One-time password generated by the server.
    pub otp: String,
    /// Expected OTP length.
    pub otp_length: u32,
}

#[derive(Serialize)]
struct InitBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pgp_key: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    key: &'a str,
    nonce: &'a str,
}

impl Sys<'_> {
    /// Returns the progress of a token generation.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn generate_root_status(
        &self,
        kind: GenerateRootKind,
    ) -> Result<GenerateRootStatus, ClientError> {
        let path = format!("{}/attempt", kind.base_path());
        self.send_json(self.request(Method::GET, &path)).await
    }

    /// Starts a token generation, encoding the result with `otp` or `pgp_key`.
    ///
    /// With both empty the server generates an OTP and returns it.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn generate_root_init(
        &self,
        kind: GenerateRootKind,
        otp: &str,
        pgp_key: &str,
    ) -> Result<GenerateRootStatus, ClientError> {
        let path = format!("{}/attempt", kind.base_path());
        let body = InitBody {
            otp: Some(otp).filter(|s| !s.is_empty()),
            pgp_key: Some(pgp_key).filter(|s| !s.is_empty()),
        };
        let req = self.request_with_body(Method::PUT, &path, &body)?;
        self.send_json(req).await
    }

    /// Supplies one key share to the generation identified by `nonce`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn generate_root_update(
        &self,
        kind: GenerateRootKind,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatus, ClientError> {
        let path = format!("{}/update", kind.base_path());
        let req = self.request_with_body(Method::PUT, &path, &UpdateBody { key, nonce })?;
        self.send_json(req).await
    }

    /// Cancels the generation in progress.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn generate_root_cancel(&self, kind: GenerateRootKind) -> Result<(), ClientError> {
        let path = format!("{}/attempt", kind.base_path());
        self.send_discard(self.request(Method::DELETE, &path)).await
    }
}
