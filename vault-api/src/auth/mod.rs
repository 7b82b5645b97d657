//! The auth family (`/v1/auth/...`): logging in and the token engine.

mod token;

pub use token::{TokenAuth, TokenCreateRequest};

use crate::client::Client;
use crate::context::Context;
use crate::error::ClientError;
use crate::prelude::debug;
use crate::secret::Secret;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;

/// A way of obtaining a token from the server.
///
/// Implementations send whatever request their auth engine expects, usually a
/// write to `auth/<mount>/login`, and return the resulting secret. Storing the
/// token is left to [`Auth::login`].
///
/// # Example
///
/// ```no_run
/// use serde_json::json;
/// use vault_api::{AuthMethod, Client, ClientError, Context, Secret};
///
/// #[derive(Debug)]
/// struct UserPass {
///     username: String,
///     password: String,
/// }
///
/// impl AuthMethod for UserPass {
///     async fn login(&self, client: &Client, ctx: &Context) -> Result<Option<Secret>, ClientError> {
///         client
///             .logical()
///             .with_context(ctx.clone())
///             .write(
///                 &format!("auth/userpass/login/{}", self.username),
///                 &json!({ "password": self.password }),
///             )
///             .await
///     }
/// }
/// ```
pub trait AuthMethod: Send + Sync {
    /// Performs the login request.
    fn login(
        &self,
        client: &Client,
        ctx: &Context,
    ) -> impl Future<Output = Result<Option<Secret>, ClientError>> + Send;
}

/// Login helpers and the token engine. Obtained from [`Client::auth`].
#[derive(Debug, Clone)]
pub struct Auth<'a> {
    client: &'a Client,
    ctx: Context,
}

impl Client {
    /// Login helpers and the token engine.
    pub fn auth(&self) -> Auth<'_> {
        Auth {
            client: self,
            ctx: Context::background(),
        }
    }
}

impl<'a> Auth<'a> {
    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// The token engine mounted at `auth/token`.
    pub fn token(&self) -> TokenAuth<'a> {
        TokenAuth::new(self.client, self.ctx.clone())
    }

    /// Logs in through `method` and stores the returned token on the client.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Precondition`] if the client carries MFA credentials
    ///   (use [`Auth::mfa_login`]) or the server asks for MFA validation,
    /// - [`ClientError::MissingClientToken`] if the response has no token,
    /// - any error of the auth method.
    pub async fn login<M: AuthMethod>(&self, method: &M) -> Result<Secret, ClientError> {
        if !self.client.mfa_creds().is_empty() {
            return Err(ClientError::Precondition(
                "client has MFA credentials set; use mfa_login instead".into(),
            ));
        }
        self.login_and_store(method).await
    }

    /// Logs in through an auth method protected by multi-factor authentication.
    ///
    /// With `creds`, they are attached to the client and sent with the login
    /// (single phase), and the returned token is stored. Without them the
    /// login is expected to answer with an MFA requirement, which is returned
    /// unvalidated so the caller can pass it to [`Auth::mfa_validate`].
    ///
    /// # Errors
    ///
    /// As [`Auth::login`]; in the two-phase flow, [`ClientError::Precondition`]
    /// if the response carries no MFA requirement.
    pub async fn mfa_login<M: AuthMethod>(
        &self,
        method: &M,
        creds: &[String],
    ) -> Result<Secret, ClientError> {
        if !creds.is_empty() {
            self.client.set_mfa_creds(creds.to_vec());
            return self.login_and_store(method).await;
        }

        let secret = method
            .login(self.client, &self.ctx)
            .await?
            .ok_or(ClientError::MissingClientToken)?;
        if secret.mfa_requirement().is_none() {
            return Err(ClientError::Precondition(
                "two-phase MFA login expected an MFA requirement in the response".into(),
            ));
        }
        Ok(secret)
    }

    /// Validates the MFA requirement of a two-phase login and stores the
    /// resulting token.
    ///
    /// `payload` maps each MFA method id to its passcodes.
    ///
    /// # Errors
    ///
    /// [`ClientError::Precondition`] if `mfa_secret` has no MFA requirement,
    /// [`ClientError::MissingClientToken`] if validation returns no token, or
    /// any pipeline error.
    pub async fn mfa_validate(
        &self,
        mfa_secret: &Secret,
        payload: &HashMap<String, Vec<String>>,
    ) -> Result<Secret, ClientError> {
        let requirement = mfa_secret.mfa_requirement().ok_or_else(|| {
            ClientError::Precondition("secret does not carry an MFA requirement".into())
        })?;

        let secret = self
            .client
            .sys()
            .with_context(self.ctx.clone())
            .mfa_validate(&requirement.mfa_request_id, payload)
            .await?;
        self.store_token(secret)
    }

    /// Enables the auth method of type `method_type` at `path`. Shortcut for
    /// [`crate::Sys::enable_auth`].
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn enable(&self, path: &str, method_type: &str) -> Result<(), ClientError> {
        let input = crate::sys::MountInput {
            mount_type: method_type.to_string(),
            ..Default::default()
        };
        self.client
            .sys()
            .with_context(self.ctx.clone())
            .enable_auth(path, &input)
            .await
    }

    /// Logs in with a raw body at `auth/<mount>/login` and stores the token.
    ///
    /// # Errors
    ///
    /// As [`Auth::login`].
    pub async fn login_with_data(
        &self,
        mount: &str,
        data: &Map<String, Value>,
    ) -> Result<Secret, ClientError> {
        let path = format!("auth/{}/login", mount.trim_matches('/'));
        let secret = self
            .client
            .logical()
            .with_context(self.ctx.clone())
            .write(&path, data)
            .await?;
        self.store_token(secret)
    }

    async fn login_and_store<M: AuthMethod>(&self, method: &M) -> Result<Secret, ClientError> {
        let secret = method.login(self.client, &self.ctx).await?;
        self.store_token(secret)
    }

    fn store_token(&self, secret: Option<Secret>) -> Result<Secret, ClientError> {
        let secret = secret.ok_or(ClientError::MissingClientToken)?;
        let token = secret.token_id();
        if token.is_empty() {
            if secret.mfa_requirement().is_some() {
                return Err(ClientError::Precondition(
                    "login requires multi-factor authentication; use mfa_login".into(),
                ));
            }
            return Err(ClientError::MissingClientToken);
        }
        self.client.set_token(token);
        debug!("Stored token from login: accessor={}", secret.token_accessor());
        Ok(secret)
    }
}
