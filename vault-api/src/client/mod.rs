//! The HTTP client and its request pipeline.
//!
//! A [`Client`] owns the transport and the mutable session state (token,
//! namespace, custom headers, MFA credentials). Every endpoint family is a thin
//! wrapper that builds a [`Request`], hands it to the pipeline and decodes the
//! [`Response`].

mod address;
mod builder;
mod output;
mod pipeline;
mod replication;
mod request;
mod response;
mod retry;
mod wrapping;

pub use builder::{ClientBuilder, ClientIdentityProvider, TlsConfig};
pub use replication::{
    merge_replication_states, ReplicationForwarding, ReplicationState, ReplicationStateError,
};
pub use request::{Request, LIST};
pub use response::Response;
pub use retry::{AttemptOutcome, DefaultRetryPolicy, RetryConfig, RetryPolicy};
pub use wrapping::{DefaultWrappingLookup, WrappingLookup};

use crate::error::{ClientError, ConfigError};
use address::join_api_path;
use http::{HeaderMap, Method};
use output::CurlTlsFlags;
use replication::ReplicationStateStore;
use request::is_reserved;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;
use zeroize::Zeroizing;

/// Client for the server's HTTP API.
///
/// Cloning a `Client` is cheap and the clones share everything, including the
/// token: a [`set_token`](Self::set_token) on one clone is seen by all. Use
/// [`fork`](Self::fork) or [`with_namespace`](Self::with_namespace) for an
/// independent session over the same transport.
///
/// # Example
///
/// ```no_run
/// use vault_api::Client;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new()?;
/// if let Some(secret) = client.logical().read("secret/data/app").await? {
///     println!("{:?}", secret.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) shared: Arc<Shared>,
    state: Arc<RwLock<ClientState>>,
}

/// Settings fixed at build time, shared by every fork.
pub(crate) struct Shared {
    pub(crate) http: reqwest::Client,
    pub(crate) address: Url,
    pub(crate) retry: RetryConfig,
    pub(crate) retry_policy: Arc<dyn RetryPolicy>,
    pub(crate) disable_redirects: bool,
    pub(crate) read_your_writes: bool,
    pub(crate) clone_headers: bool,
    pub(crate) clone_token: bool,
    pub(crate) curl_tls: CurlTlsFlags,
    pub(crate) replication: ReplicationStateStore,
    pub(crate) identity: Option<Arc<dyn ClientIdentityProvider>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(identity) = self.identity.take() {
            identity.close();
        }
    }
}

/// Session state, mutable through the client's setters.
#[derive(Clone)]
pub(crate) struct ClientState {
    pub(crate) token: Option<Zeroizing<String>>,
    pub(crate) namespace: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) mfa_creds: Vec<String>,
    pub(crate) policy_override: bool,
    pub(crate) wrapping_lookup: Arc<dyn WrappingLookup>,
    pub(crate) output_curl: bool,
    pub(crate) output_policy: bool,
    pub(crate) last_output: Option<String>,
    pub(crate) forwarding: ReplicationForwarding,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("Client")
            .field("address", &self.shared.address.as_str())
            .field("token", &state.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &state.namespace)
            .field("headers", &state.headers)
            .field("retry", &self.shared.retry)
            .field("disable_redirects", &self.shared.disable_redirects)
            .field("read_your_writes", &self.shared.read_your_writes)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds a client from the `VAULT_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::from_env`] and [`ClientBuilder::build`].
    pub fn new() -> Result<Self, ConfigError> {
        ClientBuilder::from_env()?.build()
    }

    /// Returns a builder with built-in defaults (the environment is not read).
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Server address.
    pub fn address(&self) -> &Url {
        &self.shared.address
    }

    /// Retry configuration in effect.
    pub fn retry_config(&self) -> RetryConfig {
        self.shared.retry
    }

    /// Current token, if any.
    pub fn token(&self) -> Option<String> {
        self.read_state().token.as_ref().map(|t| t.as_str().to_owned())
    }

    /// Replaces the token used by every later request. An empty token clears it.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.write_state().token = (!token.is_empty()).then(|| Zeroizing::new(token));
    }

    /// Sends later requests without a token.
    pub fn clear_token(&self) {
        self.write_state().token = None;
    }

    /// Current namespace, if any.
    pub fn namespace(&self) -> Option<String> {
        self.read_state().namespace.clone()
    }

    /// Sets the namespace of every later request. An empty value clears it.
    pub fn set_namespace(&self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        self.write_state().namespace = (!namespace.is_empty()).then_some(namespace);
    }

    /// Sends later requests in the root namespace.
    pub fn clear_namespace(&self) {
        self.write_state().namespace = None;
    }

    /// An independent client in `namespace`, keeping this client's token and
    /// headers.
    ///
    /// The returned client shares the transport and the replication-state
    /// store with `self`; later changes on either side are not seen by the
    /// other.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        let mut state = self.read_state().clone();
        let namespace = namespace.into();
        state.namespace = (!namespace.is_empty()).then_some(namespace);
        state.last_output = None;
        self.with_state(state)
    }

    /// An independent client over the same transport.
    ///
    /// The token and custom headers are copied only when the builder enabled
    /// [`clone_token`](ClientBuilder::clone_token) and
    /// [`clone_headers`](ClientBuilder::clone_headers).
    pub fn fork(&self) -> Self {
        let mut state = self.read_state().clone();
        if !self.shared.clone_token {
            state.token = None;
        }
        if !self.shared.clone_headers {
            state.headers = HeaderMap::new();
        }
        state.output_curl = false;
        state.output_policy = false;
        state.last_output = None;
        self.with_state(state)
    }

    fn with_state(&self, state: ClientState) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Custom headers sent with every request.
    pub fn headers(&self) -> HeaderMap {
        self.read_state().headers.clone()
    }

    /// Replaces the custom headers sent with every request.
    ///
    /// # Errors
    ///
    /// [`ClientError::ReservedHeader`] if `headers` contains a header managed
    /// by the client; the current headers are then left unchanged.
    pub fn set_headers(&self, headers: HeaderMap) -> Result<(), ClientError> {
        if let Some(name) = headers.keys().find(|name| is_reserved(name)) {
            return Err(ClientError::ReservedHeader(name.to_string()));
        }
        self.write_state().headers = headers;
        Ok(())
    }

    /// Adds one custom header sent with every request.
    ///
    /// # Errors
    ///
    /// See [`Request::add_headers`].
    pub fn add_header(&self, name: &str, value: &str) -> Result<(), ClientError> {
        let (name, value) = request::caller_header(name, value)?;
        self.write_state().headers.append(name, value);
        Ok(())
    }

    /// MFA credentials sent with every request.
    pub fn mfa_creds(&self) -> Vec<String> {
        self.read_state().mfa_creds.clone()
    }

    /// Replaces the MFA credentials sent with every request.
    pub fn set_mfa_creds(&self, creds: Vec<String>) {
        self.write_state().mfa_creds = creds;
    }

    /// Requests a soft-mandatory policy override on every request.
    pub fn set_policy_override(&self, value: bool) {
        self.write_state().policy_override = value;
    }

    /// Installs the response-wrapping lookup.
    pub fn set_wrapping_lookup(&self, lookup: Arc<dyn WrappingLookup>) {
        self.write_state().wrapping_lookup = lookup;
    }

    /// In this mode requests are not sent: the pipeline returns
    /// [`ClientError::OutputCurlString`] with an equivalent `curl` command.
    pub fn set_output_curl_string(&self, enabled: bool) {
        self.write_state().output_curl = enabled;
    }

    /// In this mode requests are not sent: the pipeline returns
    /// [`ClientError::OutputPolicy`] with a policy granting the request.
    pub fn set_output_policy(&self, enabled: bool) {
        self.write_state().output_policy = enabled;
    }

    /// Output recorded by the last request made in a dry-run mode.
    pub fn last_output_string(&self) -> Option<String> {
        self.read_state().last_output.clone()
    }

    /// Sets the forwarding hint sent to performance standbys.
    pub fn set_replication_forwarding(&self, forwarding: ReplicationForwarding) {
        self.write_state().forwarding = forwarding;
    }

    /// Whether replication states are tracked and sent.
    pub fn read_your_writes(&self) -> bool {
        self.shared.read_your_writes
    }

    /// Newest replication states observed so far.
    pub fn replication_states(&self) -> Vec<String> {
        self.shared.replication.states()
    }

    /// Creates a request for `path` (relative to `/v1/`; a leading `/v1/` is
    /// accepted and stripped).
    ///
    /// The request carries the client's token, custom headers, MFA
    /// credentials, policy override and wrap TTL. The namespace is applied when
    /// the request is sent, by the client that sends it.
    pub fn new_request(&self, method: Method, path: &str) -> Request {
        let (full_path, relative) = join_api_path(&self.shared.address, path);
        let mut url = self.shared.address.clone();
        url.set_path(&full_path);

        let state = self.read_state();
        let mut req = Request::new(method, url, state.headers.clone());
        if let Some(token) = &state.token {
            req.set_token(token.as_str());
        }
        req.set_mfa_creds(state.mfa_creds.clone());
        req.set_policy_override(state.policy_override);
        let wrap_ttl = state
            .wrapping_lookup
            .wrap_ttl(req.method().as_str(), &relative);
        req.set_wrap_ttl(wrap_ttl);
        req
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, ClientState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, ClientState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HEADER_NAMESPACE, HEADER_TOKEN, HEADER_WRAP_TTL};

    fn client() -> Client {
        Client::builder()
            .address("http://127.0.0.1:8200")
            .token("s.root")
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_request_strips_v1_prefix() {
        let client = client();
        let req = client.new_request(Method::GET, "/v1/secret/foo");
        assert_eq!(req.url().as_str(), "http://127.0.0.1:8200/v1/secret/foo");
        let req = client.new_request(Method::GET, "secret/foo");
        assert_eq!(req.url().as_str(), "http://127.0.0.1:8200/v1/secret/foo");
    }

    #[test]
    fn test_new_request_carries_session_state() {
        let client = client();
        client.set_mfa_creds(vec!["m:1".into()]);
        let req = client.new_request(Method::PUT, "sys/wrapping/wrap");
        assert_eq!(req.token(), Some("s.root"));
        assert_eq!(req.mfa_creds(), ["m:1"]);
        let headers = req.header_map().unwrap();
        assert_eq!(headers.get(HEADER_WRAP_TTL).unwrap(), "5m");
        assert!(headers.get(HEADER_NAMESPACE).is_none());
    }

    #[test]
    fn test_clones_share_token() {
        let client = client();
        let clone = client.clone();
        clone.set_token("s.other");
        assert_eq!(client.token().as_deref(), Some("s.other"));
        client.set_token("");
        assert!(clone.token().is_none());
    }

    #[test]
    fn test_fork_drops_token_unless_configured() {
        let client = client();
        client.add_header("X-Custom", "1").unwrap();
        let fork = client.fork();
        assert!(fork.token().is_none());
        assert!(fork.headers().is_empty());

        let client = Client::builder()
            .address("http://127.0.0.1:8200")
            .token("s.root")
            .clone_token(true)
            .clone_headers(true)
            .build()
            .unwrap();
        client.add_header("X-Custom", "1").unwrap();
        let fork = client.fork();
        assert_eq!(fork.token().as_deref(), Some("s.root"));
        assert_eq!(fork.headers().get("x-custom").unwrap(), "1");

        fork.set_token("s.fork");
        assert_eq!(client.token().as_deref(), Some("s.root"));
    }

    #[test]
    fn test_with_namespace_keeps_token_and_isolates_namespace() {
        let client = client();
        client.set_namespace("parent/");
        let child = client.with_namespace("parent/child/");
        assert_eq!(child.namespace().as_deref(), Some("parent/child/"));
        assert_eq!(child.token().as_deref(), Some("s.root"));
        assert_eq!(client.namespace().as_deref(), Some("parent/"));
    }

    #[test]
    fn test_set_headers_refuses_reserved() {
        let client = client();
        client.add_header("X-Keep", "yes").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_TOKEN, "override".parse().unwrap());
        let err = client.set_headers(headers).unwrap_err();
        assert!(matches!(err, ClientError::ReservedHeader(_)));
        assert_eq!(client.headers().get("x-keep").unwrap(), "yes");
    }

    #[derive(Debug)]
    struct CountingIdentity(Arc<std::sync::atomic::AtomicUsize>);

    impl ClientIdentityProvider for CountingIdentity {
        fn identity(&self) -> Result<reqwest::Identity, ConfigError> {
            Err(ConfigError::Tls("no hardware token".into()))
        }

        fn close(&self) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_identity_provider_error_fails_build() {
        let closed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let err = Client::builder()
            .identity_provider(CountingIdentity(Arc::clone(&closed)))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Tls(_)));
        assert_eq!(closed.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identity_provider_closed_with_last_handle() {
        let closed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let client = Client::builder()
            .http_client(reqwest::Client::new())
            .identity_provider(CountingIdentity(Arc::clone(&closed)))
            .build()
            .unwrap();
        let fork = client.fork();
        drop(client);
        assert_eq!(closed.load(std::sync::atomic::Ordering::SeqCst), 0);
        drop(fork);
        assert_eq!(closed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
