use crate::error::{ClientError, ResponseError};
use crate::secret::Secret;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// A successful (status below 400) response.
///
/// Error statuses never reach callers as a `Response`; the pipeline turns them
/// into [`ClientError::Response`].
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner }
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Final URL (after a followed redirect).
    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// [`ClientError::Body`] if the body cannot be read.
    pub async fn bytes(self) -> Result<Bytes, ClientError> {
        self.inner.bytes().await.map_err(ClientError::Body)
    }

    /// Reads the whole body as text.
    ///
    /// # Errors
    ///
    /// [`ClientError::Body`] if the body cannot be read.
    pub async fn text(self) -> Result<String, ClientError> {
        self.inner.text().await.map_err(ClientError::Body)
    }

    /// Decodes the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Body`] if the body cannot be read, [`ClientError::Decode`]
    /// if it is not valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let body = self.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Decodes the body as a [`Secret`] envelope.
    ///
    /// Returns `Ok(None)` for an empty body (e.g. `204 No Content`).
    ///
    /// # Errors
    ///
    /// See [`Secret::parse`].
    pub async fn parse_secret(self) -> Result<Option<Secret>, ClientError> {
        let body = self.bytes().await?;
        Secret::parse(&body)
    }

    /// Streams the body in chunks.
    pub fn bytes_stream(self) -> impl Stream<Item = Result<Bytes, ClientError>> {
        self.inner.bytes_stream().map_err(ClientError::Body)
    }

    /// Returns the underlying transport response.
    pub fn into_inner(self) -> reqwest::Response {
        self.inner
    }
}

/// Turns error statuses into [`ResponseError`]s.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    method: &str,
    namespace: Option<&str>,
) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.as_u16() < 400 {
        return Ok(Response::new(resp));
    }
    let url = resp.url().to_string();
    // A body that fails mid-read still produces an error carrying the status.
    let body = resp.bytes().await.unwrap_or_default();
    Err(ResponseError::new(
        method.to_string(),
        url,
        status,
        namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
        body,
    )
    .into())
}
