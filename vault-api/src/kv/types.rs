use crate::duration::deserialize_duration;
use crate::error::ClientError;
use crate::secret::Secret;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A secret read from or written to a KV engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KvSecret {
    /// User data. `None` for a deleted or destroyed version, and for writes.
    pub data: Option<Map<String, Value>>,
    /// Metadata of this version (KV v2 only).
    pub version_metadata: Option<KvVersionMetadata>,
    /// Custom metadata of the secret (KV v2 only).
    pub custom_metadata: Option<Map<String, Value>>,
    /// The envelope the server returned.
    pub raw: Secret,
}

/// Metadata of one version of a KV v2 secret.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct KvVersionMetadata {
    /// Version number, starting at 1.
    #[serde(default)]
    pub version: u64,
    /// When the version was written.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_time: Option<OffsetDateTime>,
    /// When the version was soft-deleted; `None` while it is live.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub deletion_time: Option<OffsetDateTime>,
    /// Whether the version was permanently destroyed.
    #[serde(default)]
    pub destroyed: bool,
}

impl KvVersionMetadata {
    /// Whether the version is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deletion_time.is_some()
    }
}

/// Metadata of a KV v2 secret, across all its versions.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct KvMetadata {
    /// Whether every write must carry a `cas` option.
    #[serde(default)]
    pub cas_required: bool,
    /// When the first version was written.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_time: Option<OffsetDateTime>,
    /// Newest version number.
    #[serde(default)]
    pub current_version: u64,
    /// Free-form metadata attached to the secret.
    #[serde(default)]
    pub custom_metadata: Option<Map<String, Value>>,
    /// Age after which versions are deleted; zero means never.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub delete_version_after: Duration,
    /// Number of versions kept; zero means the engine default.
    #[serde(default)]
    pub max_versions: u64,
    /// Oldest version still kept.
    #[serde(default)]
    pub oldest_version: u64,
    /// When the metadata last changed.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub updated_time: Option<OffsetDateTime>,
    /// Per-version metadata keyed by version number.
    #[serde(default, deserialize_with = "versions_by_number")]
    pub versions: BTreeMap<u64, KvVersionMetadata>,
    /// The envelope the server returned.
    #[serde(skip)]
    pub raw: Secret,
}

/// Settings written to a KV v2 secret's metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KvMetadataPutInput {
    /// Require a `cas` option on every write.
    pub cas_required: bool,
    /// Free-form metadata attached to the secret.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub custom_metadata: Map<String, Value>,
    /// Age after which versions are deleted; zero means never.
    #[serde(serialize_with = "duration_as_seconds")]
    pub delete_version_after: Duration,
    /// Number of versions kept; zero means the engine default.
    pub max_versions: u64,
}

/// Partial update of a KV v2 secret's metadata. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KvMetadataPatchInput {
    /// Require a `cas` option on every write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas_required: Option<bool>,
    /// Replaces the custom metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Map<String, Value>>,
    /// Age after which versions are deleted.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "optional_duration_as_seconds"
    )]
    pub delete_version_after: Option<Duration>,
    /// Number of versions kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<u64>,
}

/// Options sent next to the data of a KV v2 write.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KvPutOptions {
    /// Check-and-set: `0` requires the secret to be absent, `n` requires the
    /// current version to be `n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas: Option<u64>,
    /// Any other option understood by the engine.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KvPutOptions {
    /// Options with only a check-and-set version.
    pub fn cas(version: u64) -> Self {
        Self {
            cas: Some(version),
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cas.is_none() && self.extra.is_empty()
    }
}

/// How [`KvV2::patch`](super::KvV2::patch) applies a partial update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KvPatchMethod {
    /// Try a JSON merge patch; fall back to read-then-write when the server
    /// refuses `PATCH` (`403` or `405`).
    #[default]
    Auto,
    /// JSON merge patch only.
    MergePatch,
    /// Read the current version, merge locally, write back with `cas`.
    ReadWrite,
}

/// Splits a KV v2 `data/` read into user data, version metadata and custom
/// metadata.
pub(crate) fn kv_secret_from_read(secret: Secret) -> Result<KvSecret, ClientError> {
    let envelope = secret
        .data
        .as_ref()
        .ok_or_else(|| ClientError::schema("missing expected 'data' element"))?;

    let data = match envelope.get("data") {
        None => return Err(ClientError::schema("missing expected 'data' element")),
        Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => return Err(ClientError::schema("'data' element is not an object")),
    };

    let (version_metadata, custom_metadata) = match envelope.get("metadata") {
        None | Some(Value::Null) => (None, None),
        Some(Value::Object(meta)) => (
            Some(KvVersionMetadata::deserialize(&Value::Object(meta.clone()))?),
            custom_metadata(meta.get("custom_metadata"))?,
        ),
        Some(_) => return Err(ClientError::schema("'metadata' element is not an object")),
    };

    Ok(KvSecret {
        data,
        version_metadata,
        custom_metadata,
        raw: secret,
    })
}

/// Builds the result of a KV v2 write, whose data is the new version's
/// metadata.
pub(crate) fn kv_secret_from_write(secret: Secret) -> Result<KvSecret, ClientError> {
    let envelope = secret
        .data
        .as_ref()
        .ok_or_else(|| ClientError::schema("no version metadata returned by the write"))?;
    let version_metadata = KvVersionMetadata::deserialize(&Value::Object(envelope.clone()))?;

    let custom_metadata = match envelope.get("custom_metadata") {
        Some(value) => custom_metadata(Some(value))?,
        None => match envelope.get("metadata") {
            Some(Value::Object(meta)) => custom_metadata(meta.get("custom_metadata"))?,
            _ => None,
        },
    };

    Ok(KvSecret {
        data: None,
        version_metadata: Some(version_metadata),
        custom_metadata,
        raw: secret,
    })
}

pub(crate) fn kv_metadata_from_read(secret: Secret) -> Result<KvMetadata, ClientError> {
    let data = secret
        .data
        .clone()
        .ok_or_else(|| ClientError::schema("metadata response carries no data"))?;
    let mut metadata = KvMetadata::deserialize(&Value::Object(data))?;
    metadata.raw = secret;
    Ok(metadata)
}

fn custom_metadata(value: Option<&Value>) -> Result<Option<Map<String, Value>>, ClientError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ClientError::schema("'custom_metadata' is not an object")),
    }
}

// Live versions report `deletion_time` as an empty string.
fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => OffsetDateTime::parse(&s, &Rfc3339)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn versions_by_number<'de, D>(deserializer: D) -> Result<BTreeMap<u64, KvVersionMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, KvVersionMetadata>>::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, mut meta)| {
            let version: u64 = key
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid version key {key:?}")))?;
            meta.version = version;
            Ok((version, meta))
        })
        .collect()
}

fn duration_as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{}s", d.as_secs()))
}

fn optional_duration_as_seconds<S: serde::Serializer>(
    d: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => duration_as_seconds(d, s),
        None => s.serialize_none(),
    }
}
