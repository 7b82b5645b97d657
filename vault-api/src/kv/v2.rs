use super::mount_path;
use super::types::{
    kv_metadata_from_read, kv_secret_from_read, kv_secret_from_write, KvMetadata,
    KvMetadataPatchInput, KvMetadataPutInput, KvPatchMethod, KvPutOptions, KvSecret,
    KvVersionMetadata,
};
use crate::client::Client;
use crate::context::Context;
use crate::error::ClientError;
use crate::logical::Logical;
use crate::prelude::debug;
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Access to a KV v2 mount. Obtained from [`Client::kv_v2`].
///
/// # Example
///
/// ```no_run
/// use serde_json::{json, Map, Value};
/// use vault_api::{Client, KvPutOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new()?;
/// let kv = client.kv_v2("secret");
///
/// let mut data = Map::new();
/// data.insert("password".into(), json!("hunter2"));
/// kv.put_with_options("app/db", &data, &KvPutOptions::cas(0)).await?;
///
/// let secret = kv.get("app/db").await?;
/// assert_eq!(secret.version_metadata.unwrap().version, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KvV2<'a> {
    client: &'a Client,
    mount: String,
    ctx: Context,
}

#[derive(Serialize)]
struct WriteBody<'a> {
    data: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a KvPutOptions>,
}

impl Client {
    /// Access to the KV v2 engine mounted at `mount`.
    pub fn kv_v2(&self, mount: impl Into<String>) -> KvV2<'_> {
        KvV2 {
            client: self,
            mount: mount.into(),
            ctx: Context::background(),
        }
    }
}

impl KvV2<'_> {
    /// Runs the following calls under `ctx`.
    #[must_use]
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    fn logical(&self) -> Logical<'_> {
        self.client.logical().with_context(self.ctx.clone())
    }

    fn path(&self, segment: &str, path: &str) -> String {
        mount_path(&self.mount, Some(segment), path)
    }

    /// Reads the newest version of the secret at `path`.
    ///
    /// A soft-deleted or destroyed newest version is returned with
    /// `data == None` and its metadata populated.
    ///
    /// # Errors
    ///
    /// [`ClientError::SecretNotFound`] when the secret does not exist,
    /// [`ClientError::Schema`] for a response without the KV v2 shape, or any
    /// pipeline error.
    pub async fn get(&self, path: &str) -> Result<KvSecret, ClientError> {
        let full = self.path("data", path);
        let secret = self
            .logical()
            .read(&full)
            .await?
            .ok_or_else(|| ClientError::SecretNotFound(full))?;
        kv_secret_from_read(secret)
    }

    /// Reads a specific version of the secret at `path`.
    ///
    /// # Errors
    ///
    /// See [`KvV2::get`].
    pub async fn get_version(&self, path: &str, version: u64) -> Result<KvSecret, ClientError> {
        let full = self.path("data", path);
        let secret = self
            .logical()
            .read_with_data(&full, [("version", version.to_string())])
            .await?
            .ok_or_else(|| ClientError::SecretNotFound(format!("{full} (version {version})")))?;
        kv_secret_from_read(secret)
    }

    /// Reads the metadata of the secret at `path`, including every version.
    ///
    /// # Errors
    ///
    /// [`ClientError::SecretNotFound`] when the secret does not exist, or any
    /// pipeline or decoding error.
    pub async fn get_metadata(&self, path: &str) -> Result<KvMetadata, ClientError> {
        let full = self.path("metadata", path);
        let secret = self
            .logical()
            .read(&full)
            .await?
            .ok_or_else(|| ClientError::SecretNotFound(full))?;
        kv_metadata_from_read(secret)
    }

    /// Returns the metadata of every version, ordered by version number.
    ///
    /// # Errors
    ///
    /// See [`KvV2::get_metadata`].
    pub async fn get_versions_as_list(
        &self,
        path: &str,
    ) -> Result<Vec<KvVersionMetadata>, ClientError> {
        let metadata = self.get_metadata(path).await?;
        Ok(metadata.versions.into_values().collect())
    }

    /// Writes a new version of the secret at `path`.
    ///
    /// The returned secret has no data; its version metadata describes the
    /// version just written.
    ///
    /// # Errors
    ///
    /// Any pipeline error, or [`ClientError::Schema`] if the server returns
    /// no version metadata.
    pub async fn put(&self, path: &str, data: &Map<String, Value>) -> Result<KvSecret, ClientError> {
        self.put_with_options(path, data, &KvPutOptions::default())
            .await
    }

    /// Writes a new version with options such as check-and-set.
    ///
    /// # Errors
    ///
    /// See [`KvV2::put`]. A failed check-and-set is a `400`
    /// [`ClientError::Response`].
    pub async fn put_with_options(
        &self,
        path: &str,
        data: &Map<String, Value>,
        options: &KvPutOptions,
    ) -> Result<KvSecret, ClientError> {
        let full = self.path("data", path);
        let body = WriteBody {
            data,
            options: (!options.is_empty()).then_some(options),
        };
        let secret = self
            .logical()
            .write(&full, &body)
            .await?
            .ok_or_else(|| ClientError::schema(format!("no secret was written to {full}")))?;
        kv_secret_from_write(secret)
    }

    /// Merges `data` into the newest version, creating a new version.
    ///
    /// # Errors
    ///
    /// See [`KvV2::patch_with_method`].
    pub async fn patch(&self, path: &str, data: &Map<String, Value>) -> Result<KvSecret, ClientError> {
        self.patch_with_method(path, data, KvPatchMethod::Auto, &KvPutOptions::default())
            .await
    }

    /// Merges `data` into the newest version using `method`.
    ///
    /// # Errors
    ///
    /// [`ClientError::SecretNotFound`] when there is nothing to patch, or any
    /// pipeline error.
    pub async fn patch_with_method(
        &self,
        path: &str,
        data: &Map<String, Value>,
        method: KvPatchMethod,
        options: &KvPutOptions,
    ) -> Result<KvSecret, ClientError> {
        match method {
            KvPatchMethod::MergePatch => self.merge_patch(path, data, options).await,
            KvPatchMethod::ReadWrite => self.read_then_write(path, data).await,
            KvPatchMethod::Auto => match self.merge_patch(path, data, options).await {
                Err(err)
                    if matches!(
                        err.status(),
                        Some(StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED)
                    ) =>
                {
                    debug!(
                        "Merge patch refused; falling back to read-then-write: status={:?}",
                        err.status()
                    );
                    self.read_then_write(path, data).await
                }
                other => other,
            },
        }
    }

    async fn merge_patch(
        &self,
        path: &str,
        data: &Map<String, Value>,
        options: &KvPutOptions,
    ) -> Result<KvSecret, ClientError> {
        let full = self.path("data", path);
        let body = WriteBody {
            data,
            options: (!options.is_empty()).then_some(options),
        };
        let secret = match self.logical().json_merge_patch(&full, &body).await {
            Ok(secret) => secret,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => None,
            Err(err) => return Err(err),
        };
        let secret = secret.ok_or_else(|| ClientError::SecretNotFound(full))?;
        kv_secret_from_write(secret)
    }

    async fn read_then_write(
        &self,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<KvSecret, ClientError> {
        let existing = self.get(path).await?;
        let mut combined = existing.data.ok_or_else(|| {
            ClientError::SecretNotFound(format!("{} (no existing data to patch)", self.path("data", path)))
        })?;
        let version = existing
            .version_metadata
            .ok_or_else(|| {
                ClientError::Precondition(format!(
                    "no metadata found at {path}; patch can only be used on existing data"
                ))
            })?
            .version;

        combined.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.put_with_options(path, &combined, &KvPutOptions::cas(version))
            .await
    }

    /// Writes the metadata settings of the secret at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn put_metadata(
        &self,
        path: &str,
        input: &KvMetadataPutInput,
    ) -> Result<(), ClientError> {
        let full = self.path("metadata", path);
        self.logical().write(&full, input).await?;
        Ok(())
    }

    /// Updates only the metadata settings present in `input`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn patch_metadata(
        &self,
        path: &str,
        input: &KvMetadataPatchInput,
    ) -> Result<(), ClientError> {
        let full = self.path("metadata", path);
        self.logical().json_merge_patch(&full, input).await?;
        Ok(())
    }

    /// Soft-deletes the newest version of the secret at `path`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let full = self.path("data", path);
        self.logical().delete(&full).await?;
        Ok(())
    }

    /// Soft-deletes specific versions. An empty list is a no-op.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn delete_versions(&self, path: &str, versions: &[u64]) -> Result<(), ClientError> {
        self.version_operation("delete", path, versions).await
    }

    /// Restores soft-deleted versions. An empty list is a no-op.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn undelete_versions(&self, path: &str, versions: &[u64]) -> Result<(), ClientError> {
        self.version_operation("undelete", path, versions).await
    }

    /// Permanently destroys versions. An empty list is a no-op.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<(), ClientError> {
        self.version_operation("destroy", path, versions).await
    }

    async fn version_operation(
        &self,
        segment: &str,
        path: &str,
        versions: &[u64],
    ) -> Result<(), ClientError> {
        if versions.is_empty() {
            return Ok(());
        }
        let full = self.path(segment, path);
        self.logical()
            .write(&full, &json!({ "versions": versions }))
            .await?;
        Ok(())
    }

    /// Deletes the secret at `path` with all its versions and metadata.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn delete_metadata(&self, path: &str) -> Result<(), ClientError> {
        let full = self.path("metadata", path);
        self.logical().delete(&full).await?;
        Ok(())
    }

    /// Writes the data of `version` back as a new version.
    ///
    /// The write is a check-and-set against the newest version, so a
    /// concurrent write makes the rollback fail instead of being overwritten.
    ///
    /// # Errors
    ///
    /// [`ClientError::Precondition`] when the target version is deleted,
    /// destroyed or has no data, [`ClientError::SecretNotFound`] when the
    /// secret does not exist, or any pipeline error.
    pub async fn rollback(&self, path: &str, version: u64) -> Result<KvSecret, ClientError> {
        let latest = self.get(path).await?;
        let current = latest
            .version_metadata
            .ok_or_else(|| {
                ClientError::Precondition(
                    "no metadata found; rollback can only be used on existing data".to_string(),
                )
            })?
            .version;

        let target = self.get_version(path, version).await?;
        let target_meta = target.version_metadata.ok_or_else(|| {
            ClientError::Precondition(format!("no metadata found for version {version}"))
        })?;
        if target_meta.is_deleted() {
            return Err(ClientError::Precondition(
                "cannot roll back to a version that has been deleted".to_string(),
            ));
        }
        if target_meta.destroyed {
            return Err(ClientError::Precondition(
                "cannot roll back to a version that has been destroyed".to_string(),
            ));
        }
        let data = target.data.ok_or_else(|| {
            ClientError::Precondition(
                "no data found; rollback only works on existing data".to_string(),
            )
        })?;

        self.put_with_options(path, &data, &KvPutOptions::cas(current))
            .await
    }
}
