use crate::client::{Client, Request};
use crate::context::Context;
use crate::error::ClientError;
use crate::secret::Secret;
use http::Method;
use serde::Serialize;
use std::collections::HashMap;

/// Parameters of a new token. Unset fields take the server's defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenCreateRequest {
    /// Explicit token id (root tokens only).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Policies attached to the token.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    /// Metadata recorded with the token.
    #[serde(rename = "meta", skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Initial TTL, as a duration string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ttl: String,
    /// Hard TTL cap, as a duration string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub explicit_max_ttl: String,
    /// Renewal period for periodic tokens, as a duration string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub period: String,
    /// Create an orphan token.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_parent: bool,
    /// Leave the `default` policy off.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_default_policy: bool,
    /// Display name of the token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Maximum number of uses, zero for unlimited.
    #[serde(skip_serializing_if = "is_zero")]
    pub num_uses: u64,
    /// Whether the token may be renewed; server default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
    /// `service` or `batch`.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    /// Entity alias to attach the token to (role-based creation only).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub entity_alias: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    increment: Option<u64>,
}

#[derive(Serialize)]
struct AccessorBody<'a> {
    accessor: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    increment: Option<u64>,
}

#[derive(Serialize)]
struct IncrementBody {
    increment: u64,
}

/// The token engine (`/v1/auth/token/...`). Obtained from [`crate::Auth::token`].
///
/// Renewal increments are in seconds and passed to the server as given; the
/// server may grant less.
#[derive(Debug, Clone)]
pub struct TokenAuth<'a> {
    client: &'a Client,
    ctx: Context,
}

impl<'a> TokenAuth<'a> {
    pub(super) fn new(client: &'a Client, ctx: Context) -> Self {
        Self { client, ctx }
    }

    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Creates a child of the client token.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn create(&self, request: &TokenCreateRequest) -> Result<Option<Secret>, ClientError> {
        self.post("auth/token/create", request).await
    }

    /// Creates an orphan token.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn create_orphan(
        &self,
        request: &TokenCreateRequest,
    ) -> Result<Option<Secret>, ClientError> {
        self.post("auth/token/create-orphan", request).await
    }

    /// Creates a token against token role `role`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn create_with_role(
        &self,
        request: &TokenCreateRequest,
        role: &str,
    ) -> Result<Option<Secret>, ClientError> {
        self.post(&format!("auth/token/create/{role}"), request).await
    }

    /// Looks up `token`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn lookup(&self, token: &str) -> Result<Option<Secret>, ClientError> {
        self.post("auth/token/lookup", &TokenBody { token, increment: None })
            .await
    }

    /// Looks up the token behind `accessor`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn lookup_accessor(&self, accessor: &str) -> Result<Option<Secret>, ClientError> {
        self.post(
            "auth/token/lookup-accessor",
            &AccessorBody { accessor, increment: None },
        )
        .await
    }

    /// Looks up the client token.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn lookup_self(&self) -> Result<Option<Secret>, ClientError> {
        let req = self.client.new_request(Method::GET, "auth/token/lookup-self");
        self.send(req).await
    }

    /// Renews `token` by `increment` seconds.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn renew(&self, token: &str, increment: u64) -> Result<Option<Secret>, ClientError> {
        self.put(
            "auth/token/renew",
            &TokenBody {
                token,
                increment: Some(increment),
            },
        )
        .await
    }

    /// Renews the token behind `accessor` by `increment` seconds.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn renew_accessor(
        &self,
        accessor: &str,
        increment: u64,
    ) -> Result<Option<Secret>, ClientError> {
        self.post(
            "auth/token/renew-accessor",
            &AccessorBody {
                accessor,
                increment: Some(increment),
            },
        )
        .await
    }

    /// Renews the client token by `increment` seconds.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn renew_self(&self, increment: u64) -> Result<Option<Secret>, ClientError> {
        self.put("auth/token/renew-self", &IncrementBody { increment })
            .await
    }

    /// Renews `token` through `renew-self`, authenticating as that token.
    ///
    /// Needs no permission on `auth/token/renew`. The client token is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn renew_token_as_self(
        &self,
        token: &str,
        increment: u64,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(Method::PUT, "auth/token/renew-self");
        req.set_token(token);
        req.set_json_body(&IncrementBody { increment })?;
        self.send(req).await
    }

    /// Revokes the token behind `accessor`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_accessor(&self, accessor: &str) -> Result<(), ClientError> {
        self.post(
            "auth/token/revoke-accessor",
            &AccessorBody { accessor, increment: None },
        )
        .await?;
        Ok(())
    }

    /// Revokes `token`, leaving its children as orphans.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_orphan(&self, token: &str) -> Result<(), ClientError> {
        self.put("auth/token/revoke-orphan", &TokenBody { token, increment: None })
            .await?;
        Ok(())
    }

    /// Revokes the client token and its children.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_self(&self) -> Result<(), ClientError> {
        let req = self.client.new_request(Method::PUT, "auth/token/revoke-self");
        self.send(req).await?;
        Ok(())
    }

    /// Revokes `token` and all of its children.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn revoke_tree(&self, token: &str) -> Result<(), ClientError> {
        self.put("auth/token/revoke", &TokenBody { token, increment: None })
            .await?;
        Ok(())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Secret>, ClientError> {
        self.with_body(Method::POST, path, body).await
    }

    async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Secret>, ClientError> {
        self.with_body(Method::PUT, path, body).await
    }

    async fn with_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(method, path);
        req.set_json_body(body)?;
        self.send(req).await
    }

    async fn send(&self, req: Request) -> Result<Option<Secret>, ClientError> {
        self.client
            .raw_request_with_context(&self.ctx, req)
            .await?
            .parse_secret()
            .await
    }
}
