//! The system backend (`/v1/sys/...`): server lifecycle, mounts, policies,
//! leases, wrapping, plugins and storage.
//!
//! Each area lives in its own file and adds methods to [`Sys`]. Endpoints that
//! answer with a bare JSON object (`seal-status`, `health`, `leader`, `init`)
//! are decoded directly; the others are decoded from the `data` of the
//! response envelope.

mod auth_mounts;
mod generate_root;
mod health;
mod init;
mod leader;
mod leases;
mod mfa;
mod mounts;
mod plugin_runtimes;
mod plugins;
mod policy;
mod raft;
mod rekey;
mod seal;
mod wrapping;

pub use generate_root::{GenerateRootKind, GenerateRootStatus};
pub use health::HealthResponse;
pub use init::{InitRequest, InitResponse};
pub use leader::LeaderResponse;
pub use mounts::{MountConfigInput, MountConfigOutput, MountInput, MountOutput};
pub use plugin_runtimes::{PluginRuntimeDetails, PluginRuntimeInput};
pub use plugins::{PluginDetails, PluginRegisterInput, PluginType, PluginsList};
pub use rekey::{RekeyInitRequest, RekeyStatus, RekeyTarget, RekeyUpdateResponse, RekeyVerificationStatus};
pub use seal::{SealStatusResponse, UnsealOptions};

use crate::client::{Client, Request, Response};
use crate::context::Context;
use crate::error::ClientError;
use crate::secret::Secret;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// The system backend. Obtained from [`Client::sys`].
#[derive(Debug, Clone)]
pub struct Sys<'a> {
    client: &'a Client,
    ctx: Context,
}

impl Client {
    /// The system backend.
    pub fn sys(&self) -> Sys<'_> {
        Sys {
            client: self,
            ctx: Context::background(),
        }
    }
}

impl<'a> Sys<'a> {
    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    fn request(&self, method: Method, path: &str) -> Request {
        self.client.new_request(method, path)
    }

    fn request_with_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Request, ClientError> {
        let mut req = self.client.new_request(method, path);
        req.set_json_body(body)?;
        Ok(req)
    }

    async fn send(&self, req: Request) -> Result<Response, ClientError> {
        self.client.raw_request_with_context(&self.ctx, req).await
    }

    async fn send_discard(&self, req: Request) -> Result<(), ClientError> {
        self.send(req).await?;
        Ok(())
    }

    /// Decodes a bare JSON response body.
    async fn send_json<T: DeserializeOwned>(&self, req: Request) -> Result<T, ClientError> {
        self.send(req).await?.json().await
    }

    async fn send_secret(&self, req: Request) -> Result<Option<Secret>, ClientError> {
        self.send(req).await?.parse_secret().await
    }

    /// Decodes the `data` of the response envelope.
    async fn send_data<T: DeserializeOwned>(&self, req: Request) -> Result<T, ClientError> {
        let secret = self
            .send_secret(req)
            .await?
            .ok_or_else(|| ClientError::schema("empty response body"))?;
        decode_data(secret)
    }
}

pub(crate) fn decode_data<T: DeserializeOwned>(secret: Secret) -> Result<T, ClientError> {
    let data = secret
        .data
        .ok_or_else(|| ClientError::schema("response carries no data"))?;
    Ok(serde_json::from_value(Value::Object(data))?)
}
