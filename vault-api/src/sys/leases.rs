use super::Sys;
use crate::client::LIST;
use crate::error::ClientError;
use crate::secret::Secret;
use http::Method;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct RenewBody<'a> {
    lease_id: &'a str,
    increment: u64,
}

#[derive(Serialize)]
struct LookupBody<'a> {
    lease_id: &'a str,
}

#[derive(Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<String>,
}

impl Sys<'_> {
    /// Renews lease `lease_id`, asking for `increment` more seconds.
    ///
    /// The server may grant less than asked; the returned secret carries the
    /// granted duration.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn renew(&self, lease_id: &str, increment: u64) -> Result<Option<Secret>, ClientError> {
        let req = self.request_with_body(
            Method::PUT,
            "sys/leases/renew",
            &RenewBody { lease_id, increment },
        )?;
        self.send_secret(req).await
    }

    /// Returns the metadata of lease `lease_id`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn lookup_lease(&self, lease_id: &str) -> Result<Option<Secret>, ClientError> {
        let req = self.request_with_body(Method::PUT, "sys/leases/lookup", &LookupBody { lease_id })?;
        self.send_secret(req).await
    }

    /// Lists lease ids under `prefix`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_leases(&self, prefix: &str) -> Result<Vec<String>, ClientError> {
        let req = self.request(LIST.clone(), &format!("sys/leases/lookup/{prefix}"));
        let keys: KeyList = self.send_data(req).await?;
        Ok(keys.keys)
    }

    /// Revokes lease `lease_id`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke(&self, lease_id: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::PUT, &format!("sys/leases/revoke/{lease_id}")))
            .await
    }

    /// Revokes every lease under `prefix`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_prefix(&self, prefix: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(
            Method::PUT,
            &format!("sys/leases/revoke-prefix/{prefix}"),
        ))
        .await
    }

    /// Removes every lease under `prefix`, ignoring backend revocation errors.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_force(&self, prefix: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(
            Method::PUT,
            &format!("sys/leases/revoke-force/{prefix}"),
        ))
        .await
    }
}
