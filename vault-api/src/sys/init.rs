use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Parameters of server initialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InitRequest {
    /// Number of unseal key shares.
    pub secret_shares: u32,
    /// Shares required to unseal.
    pub secret_threshold: u32,
    /// Shares stored by an auto-unseal mechanism.
    #[serde(skip_serializing_if = "is_zero")]
    pub stored_shares: u32,
    /// PGP keys encrypting each unseal share.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pgp_keys: Vec<String>,
    /// Number of recovery key shares (auto-unseal).
    #[serde(skip_serializing_if = "is_zero")]
    pub recovery_shares: u32,
    /// Recovery shares required.
    #[serde(skip_serializing_if = "is_zero")]
    pub recovery_threshold: u32,
    /// PGP keys encrypting each recovery share.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recovery_pgp_keys: Vec<String>,
    /// PGP key encrypting the initial root token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub root_token_pgp_key: String,
}

/// Key material returned by initialization. Zeroed on drop.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct InitResponse {
    /// Unseal key shares, hex encoded.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Unseal key shares, base64 encoded.
    #[serde(default)]
    pub keys_base64: Vec<String>,
    /// Recovery key shares, hex encoded.
    #[serde(default)]
    pub recovery_keys: Vec<String>,
    /// Recovery key shares, base64 encoded.
    #[serde(default)]
    pub recovery_keys_base64: Vec<String>,
    /// Initial root token.
    #[serde(default)]
    pub root_token: String,
}

impl std::fmt::Debug for InitResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitResponse")
            .field("keys", &self.keys.len())
            .field("recovery_keys", &self.recovery_keys.len())
            .field("root_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct InitStatus {
    initialized: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Sys<'_> {
    /// Whether the server has been initialized.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn init_status(&self) -> Result<bool, ClientError> {
        let status: InitStatus = self.send_json(self.request(Method::GET, "sys/init")).await?;
        Ok(status.initialized)
    }

    /// Initializes the server.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn init(&self, request: &InitRequest) -> Result<InitResponse, ClientError> {
        let req = self.request_with_body(Method::PUT, "sys/init", request)?;
        self.send_json(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_response_partial_body() {
        let resp: InitResponse = serde_json::from_str(
            r#"{"keys":["aa11"],"root_token":"s.root","unknown":true}"#,
        )
        .unwrap();
        assert_eq!(resp.keys, ["aa11"]);
        assert!(resp.keys_base64.is_empty());
        assert!(resp.recovery_keys.is_empty());
        assert!(resp.recovery_keys_base64.is_empty());
        assert_eq!(resp.root_token, "s.root");
    }

    #[test]
    fn test_init_response_empty_body() {
        let resp: InitResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp, InitResponse::default());
    }

    #[test]
    fn test_init_response_debug_redacts_root_token() {
        let resp: InitResponse = serde_json::from_str(r#"{"root_token":"s.secret"}"#).unwrap();
        assert!(!format!("{resp:?}").contains("s.secret"));
    }

    #[test]
    fn test_init_request_omits_unset_fields() {
        let req = InitRequest {
            secret_shares: 5,
            secret_threshold: 3,
            ..InitRequest::default()
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"secret_shares": 5, "secret_threshold": 3})
        );
    }
}
