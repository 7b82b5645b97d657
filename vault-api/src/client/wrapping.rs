//! Response-wrapping TTL selection.

use crate::constants::{DEFAULT_WRAPPING_TTL, ENV_VAULT_WRAP_TTL};
use std::fmt::Debug;

/// Chooses the response-wrapping TTL for a request.
///
/// Called once per request with the HTTP method and the path relative to
/// `/v1/` (e.g. `"sys/wrapping/wrap"`). Returning `Some(ttl)` makes the server
/// wrap the response; `None` leaves it unwrapped.
///
/// # Example
///
/// ```
/// use vault_api::WrappingLookup;
///
/// #[derive(Debug)]
/// struct WrapSecretIds;
///
/// impl WrappingLookup for WrapSecretIds {
///     fn wrap_ttl(&self, method: &str, path: &str) -> Option<String> {
///         (method == "POST" && path.ends_with("/secret-id")).then(|| "2m".to_string())
///     }
/// }
/// ```
pub trait WrappingLookup: Debug + Send + Sync + 'static {
    /// Returns the wrap TTL for `method` on `path`, if the response should be wrapped.
    fn wrap_ttl(&self, method: &str, path: &str) -> Option<String>;
}

/// Lookup used unless a client installs its own.
///
/// A non-empty `VAULT_WRAP_TTL` wraps every response with that TTL. Otherwise
/// only `PUT`/`POST` to `sys/wrapping/wrap` are wrapped, with the default TTL.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultWrappingLookup;

impl WrappingLookup for DefaultWrappingLookup {
    fn wrap_ttl(&self, method: &str, path: &str) -> Option<String> {
        if let Ok(ttl) = std::env::var(ENV_VAULT_WRAP_TTL) {
            if !ttl.is_empty() {
                return Some(ttl);
            }
        }
        default_wrap_ttl(method, path)
    }
}

fn default_wrap_ttl(method: &str, path: &str) -> Option<String> {
    let writes = method.eq_ignore_ascii_case("PUT") || method.eq_ignore_ascii_case("POST");
    (writes && path == "sys/wrapping/wrap").then(|| DEFAULT_WRAPPING_TTL.to_string())
}
