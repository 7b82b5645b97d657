//! Environment variable names, wire header names and client defaults.

use std::time::Duration;

/// Address of the server, e.g. `https://127.0.0.1:8200`.
pub const ENV_VAULT_ADDRESS: &str = "VAULT_ADDR";
/// Address of a local agent; takes precedence over [`ENV_VAULT_ADDRESS`].
pub const ENV_VAULT_AGENT_ADDR: &str = "VAULT_AGENT_ADDR";
/// Token used for every request unless overridden.
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
/// Namespace sent on every request.
pub const ENV_VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
/// Maximum number of retries for a request.
pub const ENV_VAULT_MAX_RETRIES: &str = "VAULT_MAX_RETRIES";
/// Overall request timeout, in seconds or as a duration string.
pub const ENV_VAULT_CLIENT_TIMEOUT: &str = "VAULT_CLIENT_TIMEOUT";
/// Disable TLS certificate verification.
pub const ENV_VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";
/// Deprecated alias of [`ENV_VAULT_SKIP_VERIFY`].
pub const ENV_VAULT_INSECURE: &str = "VAULT_INSECURE";
/// Path to a PEM-encoded CA bundle.
pub const ENV_VAULT_CACERT: &str = "VAULT_CACERT";
/// PEM-encoded CA bundle, inline.
pub const ENV_VAULT_CACERT_BYTES: &str = "VAULT_CACERT_BYTES";
/// Directory of PEM-encoded CA certificates.
pub const ENV_VAULT_CAPATH: &str = "VAULT_CAPATH";
/// Path to a PEM-encoded client certificate.
pub const ENV_VAULT_CLIENT_CERT: &str = "VAULT_CLIENT_CERT";
/// Path to the PEM-encoded private key of the client certificate.
pub const ENV_VAULT_CLIENT_KEY: &str = "VAULT_CLIENT_KEY";
/// Response-wrapping TTL applied to every request by the default lookup.
pub const ENV_VAULT_WRAP_TTL: &str = "VAULT_WRAP_TTL";
/// Disable following of redirect responses.
pub const ENV_VAULT_DISABLE_REDIRECTS: &str = "VAULT_DISABLE_REDIRECTS";
/// Comma separated MFA credentials attached to every request.
pub const ENV_VAULT_MFA: &str = "VAULT_MFA";
/// Proxy address for outgoing requests (legacy name).
pub const ENV_VAULT_HTTP_PROXY: &str = "VAULT_HTTP_PROXY";
/// Proxy address for outgoing requests. Wins over [`ENV_VAULT_HTTP_PROXY`].
pub const ENV_VAULT_PROXY_ADDR: &str = "VAULT_PROXY_ADDR";

/// Header carrying the client token.
pub const HEADER_TOKEN: &str = "x-vault-token";
/// Header carrying the request namespace.
pub const HEADER_NAMESPACE: &str = "x-vault-namespace";
/// Header requesting a response-wrapped reply.
pub const HEADER_WRAP_TTL: &str = "x-vault-wrap-ttl";
/// Header carrying MFA credentials (may repeat).
pub const HEADER_MFA: &str = "x-vault-mfa";
/// Header requesting a soft-mandatory policy override.
pub const HEADER_POLICY_OVERRIDE: &str = "x-vault-policy-override";
/// Header marking the request as an API request.
pub const HEADER_REQUEST: &str = "x-vault-request";
/// Header carrying a caller-chosen request identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";
/// Header carrying replication states (read-your-writes).
pub const HEADER_INDEX: &str = "x-vault-index";
/// Header asking a standby to forward when it lags behind the requested state.
pub const HEADER_INCONSISTENT: &str = "x-vault-inconsistent";
/// Header asking a standby to always forward to the active node.
pub const HEADER_FORWARD: &str = "x-vault-forward";

/// Headers owned by the request pipeline. Callers can never set these directly.
pub const RESERVED_HEADERS: [&str; 6] = [
    HEADER_TOKEN,
    HEADER_NAMESPACE,
    HEADER_WRAP_TTL,
    HEADER_MFA,
    HEADER_POLICY_OVERRIDE,
    HEADER_REQUEST,
];

/// Cookie name the server may use to hand out a token.
pub const AUTH_COOKIE_NAME: &str = "token";

/// Address used when nothing else is configured.
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";
/// TTL used when wrapping through `sys/wrapping/wrap` without an explicit TTL.
pub const DEFAULT_WRAPPING_TTL: &str = "5m";
/// Default overall request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default minimum wait between retries.
pub const DEFAULT_MIN_RETRY_WAIT: Duration = Duration::from_millis(1000);
/// Default maximum wait between retries.
pub const DEFAULT_MAX_RETRY_WAIT: Duration = Duration::from_millis(1500);
