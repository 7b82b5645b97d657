//! Typed access to the key/value secrets engines.
//!
//! KV v1 stores data directly at `<mount>/<path>`. KV v2 versions every write:
//! data lives under `<mount>/data/<path>`, metadata under
//! `<mount>/metadata/<path>`, and version management under `delete/`,
//! `undelete/` and `destroy/`. Both façades take paths relative to the mount.

mod types;
mod v1;
mod v2;

pub use types::{
    KvMetadata, KvMetadataPatchInput, KvMetadataPutInput, KvPatchMethod, KvPutOptions, KvSecret,
    KvVersionMetadata,
};
pub use v1::KvV1;
pub use v2::KvV2;

fn mount_path(mount: &str, segment: Option<&str>, path: &str) -> String {
    let mount = mount.trim_matches('/');
    let path = path.trim_matches('/');
    match segment {
        Some(segment) => format!("{mount}/{segment}/{path}"),
        None => format!("{mount}/{path}"),
    }
}
