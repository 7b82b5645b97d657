use super::mount_path;
use super::types::KvSecret;
use crate::client::Client;
use crate::context::Context;
use crate::error::ClientError;
use serde_json::{Map, Value};

/// Access to a KV v1 mount. Obtained from [`Client::kv_v1`].
#[derive(Debug, Clone)]
pub struct KvV1<'a> {
    client: &'a Client,
    mount: String,
    ctx: Context,
}

impl Client {
    /// Access to the KV v1 engine mounted at `mount`.
    pub fn kv_v1(&self, mount: impl Into<String>) -> KvV1<'_> {
        KvV1 {
            client: self,
            mount: mount.into(),
            ctx: Context::background(),
        }
    }
}

impl KvV1<'_> {
    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Reads the secret at `path`.
    ///
    /// # Errors
    ///
    /// [`ClientError::SecretNotFound`] when nothing is stored at `path`, or any
    /// pipeline error.
    pub async fn get(&self, path: &str) -> Result<KvSecret, ClientError> {
        let full = mount_path(&self.mount, None, path);
        let secret = self
            .client
            .logical()
            .with_context(self.ctx.clone())
            .read(&full)
            .await?
            .ok_or_else(|| ClientError::SecretNotFound(full))?;

        Ok(KvSecret {
            data: secret.data.clone(),
            version_metadata: None,
            custom_metadata: None,
            raw: secret,
        })
    }

    /// Replaces the secret at `path` with `data`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn put(&self, path: &str, data: &Map<String, Value>) -> Result<(), ClientError> {
        let full = mount_path(&self.mount, None, path);
        self.client
            .logical()
            .with_context(self.ctx.clone())
            .write(&full, data)
            .await?;
        Ok(())
    }

    /// Deletes the secret at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let full = mount_path(&self.mount, None, path);
        self.client
            .logical()
            .with_context(self.ctx.clone())
            .delete(&full)
            .await?;
        Ok(())
    }
}
