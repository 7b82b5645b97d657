//! Generic read/write access to any path under `/v1/`.

use crate::client::{Client, Request, Response, LIST};
use crate::context::Context;
use crate::error::ClientError;
use crate::secret::Secret;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

const UNWRAP_PATH: &str = "sys/wrapping/unwrap";
const CUBBYHOLE_RESPONSE_PATH: &str = "cubbyhole/response";
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// Untyped access to the logical family (`/v1/<mount>/...`).
///
/// Obtained from [`Client::logical`].
#[derive(Debug, Clone)]
pub struct Logical<'a> {
    client: &'a Client,
    ctx: Context,
}

impl Client {
    /// Untyped reads and writes.
    pub fn logical(&self) -> Logical<'_> {
        Logical {
            client: self,
            ctx: Context::background(),
        }
    }
}

impl<'a> Logical<'a> {
    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Reads `path`.
    ///
    /// A `404` yields `Ok(None)` unless its body carries data or warnings (a
    /// soft-deleted KV version, for instance), in which case that secret is
    /// returned.
    ///
    /// # Errors
    ///
    /// Any pipeline error other than a `404`, or a body that is not a valid
    /// envelope.
    pub async fn read(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        self.read_with_data(path, std::iter::empty::<(&str, &str)>())
            .await
    }

    /// Reads `path` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Logical::read`].
    pub async fn read_with_data<I, K, V>(
        &self,
        path: &str,
        params: I,
    ) -> Result<Option<Secret>, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut req = self.client.new_request(Method::GET, path);
        for (k, v) in params {
            req.add_param(k, v);
        }
        self.read_request(req).await
    }

    /// Reads `path` and returns the raw response.
    ///
    /// # Errors
    ///
    /// Any pipeline error, including a `404`.
    pub async fn read_raw(&self, path: &str) -> Result<Response, ClientError> {
        let req = self.client.new_request(Method::GET, path);
        self.client.raw_request_with_context(&self.ctx, req).await
    }

    /// Lists the keys under `path`.
    ///
    /// # Errors
    ///
    /// See [`Logical::read`].
    pub async fn list(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        let req = self.client.new_request(LIST.clone(), path);
        self.read_request(req).await
    }

    /// Writes `data` (JSON-encoded) to `path`.
    ///
    /// A `404` whose body carries data or warnings is returned as a secret;
    /// any other `404` is an error.
    ///
    /// # Errors
    ///
    /// Any pipeline error, or a body that is not a valid envelope.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(Method::PUT, path);
        req.set_json_body(data)?;
        self.write_request(req).await
    }

    /// Writes a pre-encoded body to `path`.
    ///
    /// # Errors
    ///
    /// See [`Logical::write`].
    pub async fn write_bytes(
        &self,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(Method::PUT, path);
        req.set_body(body);
        self.write_request(req).await
    }

    /// Applies a JSON merge patch to `path`.
    ///
    /// # Errors
    ///
    /// See [`Logical::write`].
    pub async fn json_merge_patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(Method::PATCH, path);
        req.add_header(CONTENT_TYPE.as_str(), MERGE_PATCH_CONTENT_TYPE)?;
        req.set_json_body(data)?;
        self.write_request(req).await
    }

    /// Deletes `path`.
    ///
    /// # Errors
    ///
    /// See [`Logical::write`].
    pub async fn delete(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        self.delete_with_data(path, std::iter::empty::<(&str, &str)>())
            .await
    }

    /// Deletes `path` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Logical::write`].
    pub async fn delete_with_data<I, K, V>(
        &self,
        path: &str,
        params: I,
    ) -> Result<Option<Secret>, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut req = self.client.new_request(Method::DELETE, path);
        for (k, v) in params {
            req.add_param(k, v);
        }
        self.write_request(req).await
    }

    /// Returns the secret wrapped by `wrapping_token`.
    ///
    /// If the client has no token, the wrapping token authenticates the
    /// request; otherwise it is sent in the body and the client token is used.
    /// Servers that answer `404` are asked for the legacy
    /// `cubbyhole/response` instead. The client token is never modified.
    ///
    /// # Errors
    ///
    /// Any pipeline error, or [`ClientError::Unwrap`] when the legacy response
    /// is missing or malformed.
    pub async fn unwrap(&self, wrapping_token: &str) -> Result<Option<Secret>, ClientError> {
        let wrapping_token = wrapping_token.trim();
        let mut req = self.client.new_request(Method::PUT, UNWRAP_PATH);
        if !wrapping_token.is_empty() {
            let authenticated = req.token().is_some();
            if !authenticated {
                req.set_token(wrapping_token);
            } else if req.token() != Some(wrapping_token) {
                let mut body = Map::new();
                body.insert("token".to_string(), Value::from(wrapping_token));
                req.set_json_body(&body)?;
            }
        }

        let err = match self.client.raw_request_with_context(&self.ctx, req).await {
            Ok(resp) => return resp.parse_secret().await,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => err,
            Err(err) => return Err(err),
        };
        if let Some(secret) = secret_in_not_found(&err)? {
            return Ok(Some(secret));
        }

        self.unwrap_from_cubbyhole(wrapping_token).await
    }

    async fn unwrap_from_cubbyhole(
        &self,
        wrapping_token: &str,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.client.new_request(Method::GET, CUBBYHOLE_RESPONSE_PATH);
        if !wrapping_token.is_empty() {
            req.set_token(wrapping_token);
        }

        let secret = self.read_request(req).await?.ok_or_else(|| {
            ClientError::Unwrap(format!("no secret found at {CUBBYHOLE_RESPONSE_PATH}"))
        })?;
        let data = secret
            .data
            .ok_or_else(|| ClientError::Unwrap("\"data\" not found in wrapping response".into()))?;
        let response = data.get("response").ok_or_else(|| {
            ClientError::Unwrap("\"response\" not found in wrapping response \"data\" map".into())
        })?;
        let response = response.as_str().ok_or_else(|| {
            ClientError::Unwrap("\"response\" in wrapping response is not a string".into())
        })?;
        Secret::parse(response.as_bytes())
    }

    async fn read_request(&self, req: Request) -> Result<Option<Secret>, ClientError> {
        match self.client.raw_request_with_context(&self.ctx, req).await {
            Ok(resp) => resp.parse_secret().await,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => secret_in_not_found(&err),
            Err(err) => Err(err),
        }
    }

    async fn write_request(&self, req: Request) -> Result<Option<Secret>, ClientError> {
        match self.client.raw_request_with_context(&self.ctx, req).await {
            Ok(resp) => resp.parse_secret().await,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                match secret_in_not_found(&err)? {
                    Some(secret) => Ok(Some(secret)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// The secret carried by a `404` body, when it has data or warnings.
pub(crate) fn secret_in_not_found(err: &ClientError) -> Result<Option<Secret>, ClientError> {
    match err {
        ClientError::Response(resp) if resp.status() == StatusCode::NOT_FOUND => {
            Ok(Secret::parse(resp.body())?.filter(|s| !s.is_empty_payload()))
        }
        _ => Ok(None),
    }
}
