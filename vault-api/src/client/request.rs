use super::replication::ReplicationForwarding;
use crate::constants::{
    HEADER_FORWARD, HEADER_INCONSISTENT, HEADER_INDEX, HEADER_MFA, HEADER_NAMESPACE,
    HEADER_POLICY_OVERRIDE, HEADER_REQUEST, HEADER_REQUEST_ID, HEADER_TOKEN, HEADER_WRAP_TTL,
    RESERVED_HEADERS,
};
use crate::error::ClientError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use url::Url;
use zeroize::Zeroizing;

/// The `LIST` verb. Sent on the wire as `GET` with `list=true`.
#[allow(clippy::expect_used)]
pub static LIST: LazyLock<Method> =
    LazyLock::new(|| Method::from_bytes(b"LIST").expect("LIST is a valid method token"));

pub(crate) enum RequestBody {
    Empty,
    Buffered(Bytes),
    // Taken on first send.
    Stream(Option<reqwest::Body>),
}

/// A request ready to be sent through [`Client::raw_request_with_context`].
///
/// Created by [`Client::new_request`], which fills in the client's token,
/// custom headers, MFA credentials and wrap TTL. Headers owned by the pipeline
/// (token, namespace, wrap TTL, MFA, policy override, request marker) are set
/// through dedicated methods and can never be supplied as raw headers.
///
/// [`Client::raw_request_with_context`]: crate::Client::raw_request_with_context
/// [`Client::new_request`]: crate::Client::new_request
pub struct Request {
    method: Method,
    url: Url,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
    token: Option<Zeroizing<String>>,
    namespace: Option<String>,
    wrap_ttl: Option<String>,
    mfa_creds: Vec<String>,
    policy_override: bool,
    request_id: Option<String>,
    idempotent: Option<bool>,
    pub(crate) replication_states: Vec<String>,
    pub(crate) forwarding: ReplicationForwarding,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("body_len", &self.content_length())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("wrap_ttl", &self.wrap_ttl)
            .field("mfa_creds", &self.mfa_creds.len())
            .field("policy_override", &self.policy_override)
            .field("request_id", &self.request_id)
            .field("idempotent", &self.is_idempotent())
            .finish_non_exhaustive()
    }
}

impl Request {
    pub(crate) fn new(method: Method, url: Url, headers: HeaderMap) -> Self {
        Self {
            method,
            url,
            params: Vec::new(),
            headers,
            body: RequestBody::Empty,
            token: None,
            namespace: None,
            wrap_ttl: None,
            mfa_creds: Vec::new(),
            policy_override: false,
            request_id: None,
            idempotent: None,
            replication_states: Vec::new(),
            forwarding: ReplicationForwarding::None,
        }
    }

    /// Method as requested (`LIST` stays `LIST`).
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL, without query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Query parameters in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Replaces every value of the query parameter `key` with `value`.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.params.retain(|(k, _)| *k != key);
        self.params.push((key, value.into()));
    }

    /// Appends a value to the query parameter `key`.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    /// JSON-encodes `body` and uses it as the request body.
    ///
    /// The encoded bytes are kept so the body can be replayed on retry or
    /// redirect.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] if `body` cannot be serialized.
    pub fn set_json_body<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<(), ClientError> {
        let encoded = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.body = RequestBody::Buffered(Bytes::from(encoded));
        Ok(())
    }

    /// Uses raw bytes as the request body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = RequestBody::Buffered(body.into());
    }

    /// Uses a stream as the request body.
    ///
    /// A streamed request is sent exactly once: it is neither retried nor
    /// redirected.
    pub fn set_body_stream(&mut self, body: reqwest::Body) {
        self.body = RequestBody::Stream(Some(body));
    }

    /// Buffered body, if any.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            RequestBody::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Length of the buffered body.
    pub fn content_length(&self) -> Option<usize> {
        self.body_bytes().map(Bytes::len)
    }

    /// Token sent with this request.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(String::as_str)
    }

    /// Overrides the token for this request only.
    pub fn set_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.token = (!token.is_empty()).then(|| Zeroizing::new(token));
    }

    /// Sends this request without a token.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Namespace override for this request.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Sends this request in `namespace` regardless of the client's namespace.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    /// Requested response-wrapping TTL.
    pub fn wrap_ttl(&self) -> Option<&str> {
        self.wrap_ttl.as_deref()
    }

    /// Sets or clears the response-wrapping TTL.
    pub fn set_wrap_ttl(&mut self, ttl: Option<String>) {
        self.wrap_ttl = ttl.filter(|t| !t.is_empty());
    }

    /// MFA credentials sent with this request.
    pub fn mfa_creds(&self) -> &[String] {
        &self.mfa_creds
    }

    /// Replaces the MFA credentials sent with this request.
    pub fn set_mfa_creds(&mut self, creds: Vec<String>) {
        self.mfa_creds = creds;
    }

    /// Requests a soft-mandatory policy override.
    pub fn set_policy_override(&mut self, value: bool) {
        self.policy_override = value;
    }

    /// Attaches a caller-chosen request identifier.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = Some(id.into());
    }

    /// Whether the request may be replayed after a failure.
    ///
    /// Defaults to the method's semantics: `POST` and `PATCH` are not
    /// idempotent, every other method is.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
            .unwrap_or_else(|| !matches!(self.method, Method::POST | Method::PATCH))
    }

    /// Overrides the idempotency derived from the method.
    pub fn set_idempotent(&mut self, idempotent: bool) {
        self.idempotent = Some(idempotent);
    }

    /// Caller-supplied headers (without the managed ones).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Adds caller-supplied headers.
    ///
    /// Either all headers are added or none: if any name is reserved for the
    /// pipeline, or any name or value is invalid, the request is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ReservedHeader`] for a managed header name and
    /// [`ClientError::InvalidHeader`] for malformed names or values.
    pub fn add_headers<I, K, V>(&mut self, headers: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let staged = headers
            .into_iter()
            .map(|(k, v)| caller_header(k.as_ref(), v.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        for (name, value) in staged {
            self.headers.append(name, value);
        }
        Ok(())
    }

    /// Adds a single caller-supplied header.
    ///
    /// # Errors
    ///
    /// See [`Request::add_headers`].
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
        self.add_headers([(name, value)])
    }

    /// Headers as they will be sent: caller headers plus managed headers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] if the token, namespace or another
    /// managed value cannot be represented as a header (for example a token
    /// with non-printable characters).
    pub fn header_map(&self) -> Result<HeaderMap, ClientError> {
        let mut headers = self.headers.clone();
        headers.insert(managed(HEADER_REQUEST), HeaderValue::from_static("true"));

        if let Some(token) = self.token() {
            let mut value = HeaderValue::from_str(token).map_err(|_| {
                ClientError::InvalidHeader(
                    "client token contains non-printable characters".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(managed(HEADER_TOKEN), value);
        }
        if let Some(ns) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            headers.insert(managed(HEADER_NAMESPACE), managed_value("namespace", ns)?);
        }
        if let Some(ttl) = &self.wrap_ttl {
            headers.insert(managed(HEADER_WRAP_TTL), managed_value("wrap TTL", ttl)?);
        }
        for cred in &self.mfa_creds {
            let mut value = managed_value("MFA credential", cred)?;
            value.set_sensitive(true);
            headers.append(managed(HEADER_MFA), value);
        }
        if self.policy_override {
            headers.insert(
                managed(HEADER_POLICY_OVERRIDE),
                HeaderValue::from_static("true"),
            );
        }
        if let Some(id) = &self.request_id {
            headers.insert(managed(HEADER_REQUEST_ID), managed_value("request id", id)?);
        }
        for state in &self.replication_states {
            headers.append(managed(HEADER_INDEX), managed_value("replication state", state)?);
        }
        match self.forwarding {
            ReplicationForwarding::None => {}
            ReplicationForwarding::Inconsistent => {
                headers.insert(
                    managed(HEADER_INCONSISTENT),
                    HeaderValue::from_static("forward-active-node"),
                );
            }
            ReplicationForwarding::Always => {
                headers.insert(
                    managed(HEADER_FORWARD),
                    HeaderValue::from_static("active-node"),
                );
            }
        }
        Ok(headers)
    }

    /// Method put on the wire: `LIST` travels as `GET`.
    pub(crate) fn wire_method(&self) -> Method {
        if self.method == *LIST {
            Method::GET
        } else {
            self.method.clone()
        }
    }

    /// URL put on the wire, with query parameters (and `list=true` for `LIST`).
    pub(crate) fn wire_url(&self) -> Url {
        let mut url = self.url.clone();
        let listing = self.method == *LIST;
        let params = self
            .params
            .iter()
            .filter(|(k, _)| !(listing && k == "list"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(listing.then_some(("list", "true")));

        let mut params = params.peekable();
        if params.peek().is_none() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
        url
    }

    pub(crate) fn is_streaming(&self) -> bool {
        matches!(self.body, RequestBody::Stream(_))
    }

    pub(crate) fn redirect_to(&mut self, mut location: Url) {
        location.set_query(None);
        location.set_fragment(None);
        self.url = location;
    }

    pub(crate) fn namespace_or(&mut self, fallback: Option<String>) {
        if self.namespace.is_none() {
            self.namespace = fallback;
        }
    }

    pub(crate) fn build(
        &mut self,
        http: &reqwest::Client,
        headers: HeaderMap,
    ) -> reqwest::RequestBuilder {
        let builder = http
            .request(self.wire_method(), self.wire_url())
            .headers(headers);
        match &mut self.body {
            RequestBody::Empty => builder,
            RequestBody::Buffered(bytes) => builder.body(bytes.clone()),
            RequestBody::Stream(stream) => match stream.take() {
                Some(body) => builder.body(body),
                None => builder,
            },
        }
    }
}

pub(crate) fn is_reserved(name: &HeaderName) -> bool {
    RESERVED_HEADERS.contains(&name.as_str())
}

pub(crate) fn caller_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ClientError::InvalidHeader(format!("invalid header name {name:?}")))?;
    if is_reserved(&header) {
        return Err(ClientError::ReservedHeader(name.to_string()));
    }
    let value = HeaderValue::from_str(value)
        .map_err(|_| ClientError::InvalidHeader(format!("invalid value for header {name:?}")))?;
    Ok((header, value))
}

fn managed(name: &'static str) -> HeaderName {
    HeaderName::from_static(name)
}

fn managed_value(what: &str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value)
        .map_err(|_| ClientError::InvalidHeader(format!("{what} contains invalid characters")))
}
