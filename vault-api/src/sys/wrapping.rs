use super::Sys;
use crate::error::ClientError;
use crate::secret::Secret;
use http::Method;
use serde::Serialize;

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

impl Sys<'_> {
    /// Wraps `data` in a single-use wrapping token.
    ///
    /// `ttl` overrides the TTL chosen by the client's wrapping lookup.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn wrap<T: Serialize + ?Sized>(
        &self,
        data: &T,
        ttl: Option<&str>,
    ) -> Result<Option<Secret>, ClientError> {
        let mut req = self.request_with_body(Method::PUT, "sys/wrapping/wrap", data)?;
        if let Some(ttl) = ttl {
            req.set_wrap_ttl(Some(ttl.to_string()));
        }
        self.send_secret(req).await
    }

    /// Returns the properties of `wrapping_token` without consuming it.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn wrap_lookup(&self, wrapping_token: &str) -> Result<Option<Secret>, ClientError> {
        let req = self.request_with_body(
            Method::PUT,
            "sys/wrapping/lookup",
            &TokenBody { token: wrapping_token },
        )?;
        self.send_secret(req).await
    }

    /// Exchanges `wrapping_token` for a fresh one wrapping the same response.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn rewrap(&self, wrapping_token: &str) -> Result<Option<Secret>, ClientError> {
        let req = self.request_with_body(
            Method::PUT,
            "sys/wrapping/rewrap",
            &TokenBody { token: wrapping_token },
        )?;
        self.send_secret(req).await
    }

    /// Unwraps `wrapping_token`. See [`crate::Logical::unwrap`].
    ///
    /// # Errors
    ///
    /// See [`crate::Logical::unwrap`].
    pub async fn unwrap(&self, wrapping_token: &str) -> Result<Option<Secret>, ClientError> {
        self.client
            .logical()
            .with_context(self.ctx.clone())
            .unwrap(wrapping_token)
            .await
    }
}
