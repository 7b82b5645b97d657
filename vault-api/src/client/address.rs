//! Server address parsing.

use crate::error::ConfigError;
use url::Url;

const HTTP_SCHEME: &str = "http";
const HTTPS_SCHEME: &str = "https";
const UNIX_SCHEME: &str = "unix";

/// Parses and validates a server address.
///
/// Only `http` and `https` are accepted. Query and fragment are dropped; a path
/// is kept and becomes the prefix of every request path (for servers behind a
/// path-routing proxy).
pub(crate) fn parse_address(address: &str) -> Result<Url, ConfigError> {
    let address = address.trim();
    let mut url = Url::parse(address).map_err(|source| ConfigError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    match url.scheme() {
        HTTP_SCHEME | HTTPS_SCHEME => {}
        UNIX_SCHEME => return Err(ConfigError::UnsupportedScheme(UNIX_SCHEME.to_string())),
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidAddress {
            address: address.to_string(),
            source: url::ParseError::EmptyHost,
        });
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Joins a request path onto the address path.
///
/// Leading slashes and a leading `v1/` are stripped from `path`, empty segments
/// are collapsed and a trailing slash is dropped, so `"sys/health"`,
/// `"/v1/sys/health"` and `"/sys/health/"` all yield `<base>/v1/sys/health`.
/// Returns the full path and the path relative to `/v1/`.
pub(crate) fn join_api_path(base: &Url, path: &str) -> (String, String) {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_prefix("v1/").unwrap_or(trimmed);
    let relative = trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let prefix = base.path().trim_end_matches('/');
    (format!("{prefix}/v1/{relative}"), relative)
}
