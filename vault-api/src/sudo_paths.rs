//! Classifier for paths whose operations require the `sudo` capability.
//!
//! The table is hardcoded: it answers for engines mounted at their default
//! paths in the root namespace. A `pki` engine mounted at `pki-int/`, or any
//! path inside a child namespace, is not recognized.
//!
//! `/sys/leases/lookup` and `/sys/leases/lookup/` differ on the server (only the
//! trailing-slash listing form needs `sudo`). [`is_sudo_path`] answers for the
//! form without a trailing slash, so it reports `true` for both.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

const SUDO_PATH_PATTERNS: &[(&str, &str)] = &[
    ("/auth/token/accessors/", r"^/auth/token/accessors/?$"),
    ("/auth/token/revoke-orphan", r"^/auth/token/revoke-orphan$"),
    ("/pki/root", r"^/pki/root$"),
    ("/pki/root/sign-self-issued", r"^/pki/root/sign-self-issued$"),
    ("/sys/audit", r"^/sys/audit$"),
    ("/sys/audit/{path}", r"^/sys/audit/.+$"),
    ("/sys/auth/{path}", r"^/sys/auth/.+$"),
    ("/sys/auth/{path}/tune", r"^/sys/auth/.+/tune$"),
    (
        "/sys/config/auditing/request-headers",
        r"^/sys/config/auditing/request-headers$",
    ),
    (
        "/sys/config/auditing/request-headers/{header}",
        r"^/sys/config/auditing/request-headers/.+$",
    ),
    ("/sys/config/cors", r"^/sys/config/cors$"),
    ("/sys/config/ui/headers/", r"^/sys/config/ui/headers/?$"),
    ("/sys/config/ui/headers/{header}", r"^/sys/config/ui/headers/.+$"),
    (
        "/sys/internal/inspect/router/{tag}",
        r"^/sys/internal/inspect/router/.+$",
    ),
    ("/sys/leases", r"^/sys/leases$"),
    ("/sys/leases/lookup/{prefix}", r"^/sys/leases/lookup(?:/.+)?$"),
    (
        "/sys/leases/revoke-force/{prefix}",
        r"^/sys/leases/revoke-force/.+$",
    ),
    (
        "/sys/leases/revoke-prefix/{prefix}",
        r"^/sys/leases/revoke-prefix/.+$",
    ),
    ("/sys/plugins/catalog/{name}", r"^/sys/plugins/catalog/[^/]+$"),
    ("/sys/plugins/catalog/{type}", r"^/sys/plugins/catalog/[\w-]+$"),
    (
        "/sys/plugins/catalog/{type}/{name}",
        r"^/sys/plugins/catalog/[\w-]+/[^/]+$",
    ),
    (
        "/sys/plugins/runtimes/catalog",
        r"^/sys/plugins/runtimes/catalog/?$",
    ),
    (
        "/sys/plugins/runtimes/catalog/{type}/{name}",
        r"^/sys/plugins/runtimes/catalog/[\w-]+/[^/]+$",
    ),
    ("/sys/raw/{path}", r"^/sys/raw(?:/.+)?$"),
    ("/sys/remount", r"^/sys/remount$"),
    ("/sys/revoke-force/{prefix}", r"^/sys/revoke-force/.+$"),
    ("/sys/revoke-prefix/{prefix}", r"^/sys/revoke-prefix/.+$"),
    ("/sys/rotate", r"^/sys/rotate$"),
    (
        "/sys/internal/counters/activity/export",
        r"^/sys/internal/counters/activity/export$",
    ),
    // Enterprise-only.
    (
        "/sys/replication/dr/primary/secondary-token",
        r"^/sys/replication/dr/primary/secondary-token$",
    ),
    (
        "/sys/replication/performance/primary/secondary-token",
        r"^/sys/replication/performance/primary/secondary-token$",
    ),
    (
        "/sys/replication/primary/secondary-token",
        r"^/sys/replication/primary/secondary-token$",
    ),
    ("/sys/replication/reindex", r"^/sys/replication/reindex$"),
    (
        "/sys/storage/raft/snapshot-auto/config/",
        r"^/sys/storage/raft/snapshot-auto/config/?$",
    ),
    (
        "/sys/storage/raft/snapshot-auto/config/{name}",
        r"^/sys/storage/raft/snapshot-auto/config/[^/]+$",
    ),
];

#[allow(clippy::expect_used)]
static SUDO_PATHS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    SUDO_PATH_PATTERNS
        .iter()
        .map(|(template, pattern)| {
            let re = Regex::new(pattern).expect("sudo path patterns are valid regular expressions");
            (*template, re)
        })
        .collect()
});

/// Reports whether `path` requires the `sudo` capability.
///
/// `path` must start with `/` and must not end with one. Literal table entries
/// are checked first; templated entries are matched by their compiled pattern.
///
/// # Examples
///
/// ```
/// use vault_api::is_sudo_path;
///
/// assert!(is_sudo_path("/sys/revoke-prefix/aws/creds"));
/// assert!(!is_sudo_path("/secret/data/app"));
/// ```
pub fn is_sudo_path(path: &str) -> bool {
    if SUDO_PATHS.contains_key(path) {
        return true;
    }
    SUDO_PATHS.values().any(|re| re.is_match(path))
}

/// Returns the templates of every path known to require `sudo`.
pub fn sudo_path_templates() -> impl Iterator<Item = &'static str> {
    SUDO_PATH_PATTERNS.iter().map(|(template, _)| *template)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! sudo_cases {
        ($($name:ident: $path:expr => $expected:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(is_sudo_path($path), $expected, "path: {}", $path);
                }
            )*
        };
    }

    sudo_cases! {
        test_literal_path: "/sys/rotate" => true,
        test_literal_audit: "/sys/audit" => true,
        test_revoke_prefix_with_prefix: "/sys/revoke-prefix/foo/bar" => true,
        test_revoke_prefix_without_prefix: "/sys/revoke-prefix" => false,
        test_plugin_catalog_type_and_name: "/sys/plugins/catalog/database/mysql-database-plugin" => true,
        test_plugin_catalog_too_deep: "/sys/plugins/catalog/database/a/b" => false,
        test_plugin_catalog_name_only: "/sys/plugins/catalog/my-plugin" => true,
        test_auth_tune: "/sys/auth/userpass/tune" => true,
        test_auth_mount: "/sys/auth/approle" => true,
        test_auth_listing: "/sys/auth" => false,
        test_accessors_without_slash: "/auth/token/accessors" => true,
        test_leases_lookup_bare: "/sys/leases/lookup" => true,
        test_leases_lookup_prefix: "/sys/leases/lookup/aws/creds" => true,
        test_raw_root: "/sys/raw" => true,
        test_raw_nested: "/sys/raw/sys/policy" => true,
        test_runtime_catalog: "/sys/plugins/runtimes/catalog" => true,
        test_runtime_catalog_entry: "/sys/plugins/runtimes/catalog/container/gvisor" => true,
        test_kv_path: "/secret/data/foo" => false,
        test_token_create: "/auth/token/create" => false,
        test_seal_status: "/sys/seal-status" => false,
    }

    #[test]
    fn test_every_template_is_compiled() {
        assert_eq!(SUDO_PATHS.len(), SUDO_PATH_PATTERNS.len());
        assert_eq!(sudo_path_templates().count(), SUDO_PATH_PATTERNS.len());
    }

    #[test]
    fn test_classifier_is_pure() {
        for _ in 0..3 {
            assert!(is_sudo_path("/sys/leases/revoke-force/aws"));
            assert!(!is_sudo_path("/sys/leases/revoke-force"));
        }
    }
}
