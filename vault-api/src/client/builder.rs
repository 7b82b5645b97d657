use super::address::parse_address;
use super::output::CurlTlsFlags;
use super::replication::ReplicationStateStore;
use super::request::caller_header;
use super::retry::{DefaultRetryPolicy, RetryConfig, RetryPolicy};
use super::wrapping::{DefaultWrappingLookup, WrappingLookup};
use super::{Client, ClientState, Shared};
use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_TIMEOUT, ENV_VAULT_ADDRESS, ENV_VAULT_AGENT_ADDR, ENV_VAULT_CACERT,
    ENV_VAULT_CACERT_BYTES, ENV_VAULT_CAPATH, ENV_VAULT_CLIENT_CERT, ENV_VAULT_CLIENT_KEY,
    ENV_VAULT_CLIENT_TIMEOUT, ENV_VAULT_DISABLE_REDIRECTS, ENV_VAULT_HTTP_PROXY,
    ENV_VAULT_INSECURE, ENV_VAULT_MAX_RETRIES, ENV_VAULT_MFA, ENV_VAULT_NAMESPACE,
    ENV_VAULT_PROXY_ADDR, ENV_VAULT_SKIP_VERIFY, ENV_VAULT_TOKEN,
};
use crate::duration::parse_duration;
use crate::error::{ClientError, ConfigError};
use http::HeaderMap;
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use zeroize::Zeroizing;

/// TLS settings for the HTTP transport.
///
/// CA material from every source is added to the trust store. A client
/// certificate needs both `client_cert` and `client_key`.
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    /// PEM bundle of trusted CA certificates.
    pub ca_cert: Option<PathBuf>,
    /// PEM bundle of trusted CA certificates, inline.
    pub ca_cert_bytes: Option<Vec<u8>>,
    /// Directory of PEM files with trusted CA certificates.
    pub ca_path: Option<PathBuf>,
    /// PEM client certificate.
    pub client_cert: Option<PathBuf>,
    /// PEM private key of `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Skip server certificate verification. Never use in production.
    pub insecure: bool,
}

/// Supplies the TLS client identity from an external credential store
/// (smart card, TPM, ...).
///
/// [`close`](Self::close) runs once, when the last handle of the client that
/// loaded the identity is dropped.
pub trait ClientIdentityProvider: Debug + Send + Sync + 'static {
    /// Loads the identity presented during the TLS handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the credential cannot be loaded.
    fn identity(&self) -> Result<reqwest::Identity, ConfigError>;

    /// Releases the underlying credential.
    fn close(&self) {}
}

/// Builder for [`Client`].
///
/// [`ClientBuilder::new`] starts from built-in defaults and ignores the
/// environment; [`ClientBuilder::from_env`] starts from the `VAULT_*`
/// environment variables.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use vault_api::Client;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .address("https://vault.example.com:8200")
///     .token("s.example")
///     .namespace("team-a/")
///     .timeout(Duration::from_secs(10))
///     .max_retries(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    address: Option<String>,
    token: Option<Zeroizing<String>>,
    namespace: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
    retry_policy: Arc<dyn RetryPolicy>,
    tls: TlsConfig,
    identity_provider: Option<Arc<dyn ClientIdentityProvider>>,
    proxy: Option<String>,
    disable_redirects: bool,
    read_your_writes: bool,
    clone_headers: bool,
    clone_token: bool,
    headers: HeaderMap,
    mfa_creds: Vec<String>,
    wrapping_lookup: Arc<dyn WrappingLookup>,
    http_client: Option<reqwest::Client>,
}

impl Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_policy", &self.retry_policy)
            .field("tls", &self.tls)
            .field("identity_provider", &self.identity_provider)
            .field("proxy", &self.proxy)
            .field("disable_redirects", &self.disable_redirects)
            .field("read_your_writes", &self.read_your_writes)
            .field("clone_headers", &self.clone_headers)
            .field("clone_token", &self.clone_token)
            .field("headers", &self.headers)
            .field("mfa_creds", &self.mfa_creds.len())
            .field("wrapping_lookup", &self.wrapping_lookup)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "<reqwest::Client>"),
            )
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Creates a builder with built-in defaults.
    pub fn new() -> Self {
        Self {
            address: None,
            token: None,
            namespace: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            retry_policy: Arc::new(DefaultRetryPolicy),
            tls: TlsConfig::default(),
            identity_provider: None,
            proxy: None,
            disable_redirects: false,
            read_your_writes: false,
            clone_headers: false,
            clone_token: false,
            headers: HeaderMap::new(),
            mfa_creds: Vec::new(),
            wrapping_lookup: Arc::new(DefaultWrappingLookup),
            http_client: None,
        }
    }

    /// Creates a builder seeded from the `VAULT_*` environment variables.
    ///
    /// Empty variables are ignored. `VAULT_AGENT_ADDR` wins over `VAULT_ADDR`
    /// and `VAULT_PROXY_ADDR` over `VAULT_HTTP_PROXY`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for a variable whose value cannot be
    /// interpreted (e.g. a non-numeric `VAULT_MAX_RETRIES`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::new();

        builder.address = env(ENV_VAULT_AGENT_ADDR).or_else(|| env(ENV_VAULT_ADDRESS));
        builder.token = env(ENV_VAULT_TOKEN).map(Zeroizing::new);
        builder.namespace = env(ENV_VAULT_NAMESPACE);
        builder.proxy = env(ENV_VAULT_PROXY_ADDR).or_else(|| env(ENV_VAULT_HTTP_PROXY));

        if let Some(value) = env(ENV_VAULT_MAX_RETRIES) {
            builder.retry.max_retries = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_VAULT_MAX_RETRIES,
                value,
            })?;
        }
        if let Some(value) = env(ENV_VAULT_CLIENT_TIMEOUT) {
            builder.timeout = parse_duration(&value).ok_or(ConfigError::InvalidEnv {
                name: ENV_VAULT_CLIENT_TIMEOUT,
                value,
            })?;
        }
        for name in [ENV_VAULT_INSECURE, ENV_VAULT_SKIP_VERIFY] {
            if let Some(value) = env(name) {
                builder.tls.insecure = parse_bool(name, value)?;
            }
        }
        if let Some(value) = env(ENV_VAULT_DISABLE_REDIRECTS) {
            builder.disable_redirects = parse_bool(ENV_VAULT_DISABLE_REDIRECTS, value)?;
        }

        builder.tls.ca_cert = env(ENV_VAULT_CACERT).map(PathBuf::from);
        builder.tls.ca_cert_bytes = env(ENV_VAULT_CACERT_BYTES).map(String::into_bytes);
        builder.tls.ca_path = env(ENV_VAULT_CAPATH).map(PathBuf::from);
        builder.tls.client_cert = env(ENV_VAULT_CLIENT_CERT).map(PathBuf::from);
        builder.tls.client_key = env(ENV_VAULT_CLIENT_KEY).map(PathBuf::from);

        if let Some(value) = env(ENV_VAULT_MFA) {
            builder.mfa_creds = value
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(builder)
    }

    /// Sets the server address (`http` or `https`).
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the initial token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    /// Sets the namespace sent with every request.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the overall timeout of one HTTP attempt. Zero disables it.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the wait bounds between retries.
    #[must_use]
    pub fn retry_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.retry.min_backoff = min;
        self.retry.max_backoff = max;
        self
    }

    /// Replaces the whole retry configuration.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Installs a custom retry policy.
    #[must_use]
    pub fn retry_policy<P: RetryPolicy>(mut self, policy: P) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Loads the TLS client identity from `provider` instead of PEM files.
    #[must_use]
    pub fn identity_provider<P: ClientIdentityProvider>(mut self, provider: P) -> Self {
        self.identity_provider = Some(Arc::new(provider));
        self
    }

    /// Routes every request through an HTTP proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Stops the client from following `301`/`302`/`307` responses.
    #[must_use]
    pub fn disable_redirects(mut self, disable: bool) -> Self {
        self.disable_redirects = disable;
        self
    }

    /// Tracks replication states and sends them with every request.
    #[must_use]
    pub fn read_your_writes(mut self, enabled: bool) -> Self {
        self.read_your_writes = enabled;
        self
    }

    /// Makes [`Client::fork`] copy custom headers.
    #[must_use]
    pub fn clone_headers(mut self, enabled: bool) -> Self {
        self.clone_headers = enabled;
        self
    }

    /// Makes [`Client::fork`] copy the token.
    #[must_use]
    pub fn clone_token(mut self, enabled: bool) -> Self {
        self.clone_token = enabled;
        self
    }

    /// Adds a custom header sent with every request.
    ///
    /// # Errors
    ///
    /// [`ClientError::ReservedHeader`] for a header managed by the client,
    /// [`ClientError::InvalidHeader`] for a malformed name or value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let (name, value) = caller_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets the MFA credentials sent with every request.
    #[must_use]
    pub fn mfa_creds(mut self, creds: Vec<String>) -> Self {
        self.mfa_creds = creds;
        self
    }

    /// Installs a custom response-wrapping lookup.
    #[must_use]
    pub fn wrapping_lookup<W: WrappingLookup>(mut self, lookup: W) -> Self {
        self.wrapping_lookup = Arc::new(lookup);
        self
    }

    /// Uses a preconfigured HTTP client instead of building one.
    ///
    /// TLS, proxy and timeout settings of this builder are then ignored. The
    /// client should not follow redirects itself.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid address, unreadable or
    /// inconsistent TLS material, an invalid proxy, or a transport that
    /// cannot be constructed.
    pub fn build(self) -> Result<Client, ConfigError> {
        let address = parse_address(self.address.as_deref().unwrap_or(DEFAULT_ADDRESS))?;

        let http = match self.http_client {
            Some(client) => client,
            None => build_http_client(
                self.timeout,
                &self.tls,
                self.identity_provider.as_deref(),
                self.proxy.as_deref(),
            )?,
        };

        let shared = Shared {
            http,
            address,
            retry: self.retry.normalize(),
            retry_policy: self.retry_policy,
            disable_redirects: self.disable_redirects,
            read_your_writes: self.read_your_writes,
            clone_headers: self.clone_headers,
            clone_token: self.clone_token,
            curl_tls: CurlTlsFlags {
                insecure: self.tls.insecure,
                ca_cert: self.tls.ca_cert,
                ca_path: self.tls.ca_path,
                client_cert: self.tls.client_cert,
                client_key: self.tls.client_key,
            },
            replication: ReplicationStateStore::default(),
            identity: self.identity_provider,
        };
        let state = ClientState {
            token: self.token.filter(|t| !t.is_empty()),
            namespace: self.namespace.filter(|ns| !ns.is_empty()),
            headers: self.headers,
            mfa_creds: self.mfa_creds,
            policy_override: false,
            wrapping_lookup: self.wrapping_lookup,
            output_curl: false,
            output_policy: false,
            last_output: None,
            forwarding: Default::default(),
        };

        Ok(Client {
            shared: Arc::new(shared),
            state: Arc::new(RwLock::new(state)),
        })
    }
}

fn build_http_client(
    timeout: Duration,
    tls: &TlsConfig,
    identity: Option<&dyn ClientIdentityProvider>,
    proxy: Option<&str>,
) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::none());
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    if tls.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    let mut roots = Vec::new();
    if let Some(path) = &tls.ca_cert {
        roots.extend(pem_bundle(&read_file(path)?)?);
    }
    if let Some(bytes) = &tls.ca_cert_bytes {
        roots.extend(pem_bundle(bytes)?);
    }
    if let Some(dir) = &tls.ca_path {
        roots.extend(pem_directory(dir)?);
    }
    for cert in roots {
        builder = builder.add_root_certificate(cert);
    }

    match (&tls.client_cert, &tls.client_key, identity) {
        (Some(_), Some(_), Some(_)) => {
            return Err(ConfigError::Tls(
                "client certificate files and an identity provider are mutually exclusive"
                    .to_string(),
            ));
        }
        (Some(cert), Some(key), None) => {
            let mut pem = read_file(cert)?;
            pem.push(b'\n');
            pem.extend(read_file(key)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| ConfigError::Tls(format!("invalid client certificate or key: {e}")))?;
            builder = builder.identity(identity);
        }
        (Some(_), None, _) | (None, Some(_), _) => {
            return Err(ConfigError::Tls(
                "client certificate and client key must be set together".to_string(),
            ));
        }
        (None, None, Some(provider)) => {
            builder = builder.identity(provider.identity()?);
        }
        (None, None, None) => {}
    }

    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(ConfigError::Proxy)?);
    }

    builder.build().map_err(ConfigError::HttpClient)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn pem_bundle(pem: &[u8]) -> Result<Vec<reqwest::Certificate>, ConfigError> {
    let certs = reqwest::Certificate::from_pem_bundle(pem)
        .map_err(|e| ConfigError::Tls(format!("invalid CA certificate: {e}")))?;
    if certs.is_empty() {
        return Err(ConfigError::Tls(
            "CA bundle contains no certificates".to_string(),
        ));
    }
    Ok(certs)
}

fn pem_directory(dir: &Path) -> Result<Vec<reqwest::Certificate>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::ReadFile {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut certs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() {
            certs.extend(pem_bundle(&read_file(&path)?)?);
        }
    }
    Ok(certs)
}

// Spellings accepted by the server CLI for boolean flags.
fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    let parsed = match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    };
    parsed.ok_or(ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ClientBuilder, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientBuilder::from_lookup(|name| vars.get(name).cloned().filter(|v| !v.is_empty()))
    }

    #[test]
    fn test_env_settings() {
        let builder = from_vars(&[
            (ENV_VAULT_ADDRESS, "http://172.168.2.1:8300"),
            (ENV_VAULT_MAX_RETRIES, "5"),
            (ENV_VAULT_CLIENT_TIMEOUT, "10"),
            (ENV_VAULT_SKIP_VERIFY, "true"),
            (ENV_VAULT_DISABLE_REDIRECTS, "1"),
            (ENV_VAULT_MFA, "m1:123, m2:456"),
            (ENV_VAULT_NAMESPACE, "team-a/"),
        ])
        .unwrap();

        assert_eq!(builder.address.as_deref(), Some("http://172.168.2.1:8300"));
        assert_eq!(builder.retry.max_retries, 5);
        assert_eq!(builder.timeout, Duration::from_secs(10));
        assert!(builder.tls.insecure);
        assert!(builder.disable_redirects);
        assert_eq!(builder.mfa_creds, ["m1:123", "m2:456"]);
        assert_eq!(builder.namespace.as_deref(), Some("team-a/"));
    }

    #[test]
    fn test_agent_address_wins() {
        let builder = from_vars(&[
            (ENV_VAULT_ADDRESS, "https://vault:8200"),
            (ENV_VAULT_AGENT_ADDR, "http://127.0.0.1:8100"),
        ])
        .unwrap();
        assert_eq!(builder.address.as_deref(), Some("http://127.0.0.1:8100"));
    }

    #[test]
    fn test_proxy_addr_wins_over_http_proxy() {
        let builder = from_vars(&[
            (ENV_VAULT_HTTP_PROXY, "http://old-proxy:3128"),
            (ENV_VAULT_PROXY_ADDR, "http://new-proxy:3128"),
        ])
        .unwrap();
        assert_eq!(builder.proxy.as_deref(), Some("http://new-proxy:3128"));
    }

    #[test]
    fn test_invalid_env_values() {
        let err = from_vars(&[(ENV_VAULT_MAX_RETRIES, "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name, .. } if name == ENV_VAULT_MAX_RETRIES));

        let err = from_vars(&[(ENV_VAULT_SKIP_VERIFY, "sure")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name, .. } if name == ENV_VAULT_SKIP_VERIFY));

        let err = from_vars(&[(ENV_VAULT_CLIENT_TIMEOUT, "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_timeout_accepts_duration_string() {
        let builder = from_vars(&[(ENV_VAULT_CLIENT_TIMEOUT, "1m30s")]).unwrap();
        assert_eq!(builder.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_defaults() {
        let client = ClientBuilder::new().build().unwrap();
        assert_eq!(client.address().as_str(), "https://127.0.0.1:8200/");
        assert_eq!(client.retry_config(), RetryConfig::default());
        assert!(client.token().is_none());
    }

    #[test]
    fn test_unix_address_is_rejected() {
        let err = ClientBuilder::new()
            .address("unix:///var/run/vault.sock")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_client_cert_without_key_is_rejected() {
        let err = ClientBuilder::new()
            .tls(TlsConfig {
                client_cert: Some("/nonexistent/cert.pem".into()),
                ..TlsConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Tls(_)));
    }

    #[test]
    fn test_missing_ca_file_is_reported() {
        let err = ClientBuilder::new()
            .tls(TlsConfig {
                ca_cert: Some("/nonexistent/ca.pem".into()),
                ..TlsConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_reserved_builder_header_is_refused() {
        let err = ClientBuilder::new()
            .header("X-Vault-Namespace", "x")
            .unwrap_err();
        assert!(matches!(err, ClientError::ReservedHeader(_)));
    }
}
