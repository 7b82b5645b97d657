use super::mounts::{mounts_from_data, MountInput, MountOutput};
use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

impl Sys<'_> {
    /// Lists enabled auth methods keyed by path (with trailing slash).
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_auth(&self) -> Result<HashMap<String, MountOutput>, ClientError> {
        let data: Map<String, Value> = self.send_data(self.request(Method::GET, "sys/auth")).await?;
        mounts_from_data(data)
    }

    /// Enables an auth method at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn enable_auth(&self, path: &str, input: &MountInput) -> Result<(), ClientError> {
        let req = self.request_with_body(Method::POST, &format!("sys/auth/{path}"), input)?;
        self.send_discard(req).await
    }

    /// Disables the auth method at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn disable_auth(&self, path: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::DELETE, &format!("sys/auth/{path}")))
            .await
    }

    /// Returns the auth method enabled at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn get_auth(&self, path: &str) -> Result<MountOutput, ClientError> {
        self.send_data(self.request(Method::GET, &format!("sys/auth/{path}")))
            .await
    }
}
