//! Error types returned by the client and the endpoint families.

use bytes::Bytes;
use http::StatusCode;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Longest body prefix quoted in a [`ResponseError`] that is not an error envelope.
const RAW_BODY_PREFIX_LIMIT: usize = 1024;

/// Errors produced while building a [`Client`](crate::Client).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The server address could not be parsed as a URL.
    #[error("invalid server address {address:?}: {source}")]
    InvalidAddress {
        /// The rejected input.
        address: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The address uses a scheme the HTTP transport cannot dial.
    #[error("unsupported address scheme {0:?}: expected http or https")]
    UnsupportedScheme(String),

    /// An environment variable holds a value that cannot be interpreted.
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// A certificate or key file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TLS material was rejected.
    #[error("invalid TLS configuration: {0}")]
    Tls(String),

    /// The proxy address was rejected.
    #[error("invalid proxy address: {0}")]
    Proxy(#[source] reqwest::Error),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// A failure reported by the server (any status code of 400 or above).
///
/// The display form mirrors the server's own error report, so it always carries
/// the status code, the request URL and the individual error strings.
#[derive(Debug, Clone)]
pub struct ResponseError {
    method: String,
    url: String,
    status: StatusCode,
    namespace: Option<String>,
    errors: Vec<String>,
    raw: bool,
    body: Bytes,
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Option<Vec<String>>,
}

impl ResponseError {
    pub(crate) fn new(
        method: String,
        url: String,
        status: StatusCode,
        namespace: Option<String>,
        body: Bytes,
    ) -> Self {
        let (errors, raw) = match serde_json::from_slice::<ErrorEnvelope>(&body) {
            Ok(ErrorEnvelope { errors: Some(errors) }) => (errors, false),
            _ => (Vec::new(), true),
        };
        Self {
            method,
            url,
            status,
            namespace,
            errors,
            raw,
            body,
        }
    }

    /// HTTP method of the failed request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full URL of the failed request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Status code returned by the server.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Namespace the request was sent in, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Error strings from the server's `{"errors": [...]}` envelope.
    ///
    /// Empty when the body was not an error envelope.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn body_prefix(&self) -> String {
        let end = self.body.len().min(RAW_BODY_PREFIX_LIMIT);
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error making API request.")?;
        writeln!(f)?;
        if let Some(ns) = &self.namespace {
            writeln!(f, "Namespace: {ns}")?;
        }
        writeln!(f, "URL: {} {}", self.method, self.url)?;
        if self.raw {
            write!(
                f,
                "Code: {}. Raw Message:\n\n{}",
                self.status.as_u16(),
                self.body_prefix()
            )
        } else {
            write!(f, "Code: {}. Errors:\n\n", self.status.as_u16())?;
            for (i, err) in self.errors.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "* {err}")?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ResponseError {}

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request never produced a response (connection, TLS, timeout).
    #[error("{method} {url}: giving up after {attempts} attempt(s): {source}")]
    Transport {
        /// HTTP method of the request.
        method: String,
        /// URL of the last attempt.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The server answered with a status code of 400 or above.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// A response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A response decoded but lacked a required field or had the wrong shape.
    #[error("unexpected response shape: {0}")]
    Schema(String),

    /// A request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A KV read found nothing at the path.
    #[error("no secret found at {0}")]
    SecretNotFound(String),

    /// A multi-step operation found the server in a state it cannot proceed
    /// from (e.g. rolling back to a destroyed version).
    #[error("{0}")]
    Precondition(String),

    /// The caller's context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The caller's context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A caller tried to set a header the pipeline manages.
    #[error("header {0:?} is managed by the client and cannot be set directly")]
    ReservedHeader(String),

    /// A header name or value is not valid on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A redirect pointed from `https` to a weaker scheme.
    #[error("redirect from {from} to {to} would cause protocol downgrade")]
    RedirectDowngrade {
        /// URL that answered with the redirect.
        from: String,
        /// Location the server redirected to.
        to: String,
    },

    /// A redirect response had no usable `Location` header.
    #[error("redirect response from {0} has no valid Location header")]
    InvalidRedirect(String),

    /// A streaming body cannot be replayed for a redirect.
    #[error("redirect from {0} cannot be followed: request body is a stream")]
    BodyNotReplayable(String),

    /// Login through an auth method returned no client token.
    #[error("login response from auth method did not return a client token")]
    MissingClientToken,

    /// A payload was supplied where the server expects a wrapped secret.
    #[error("invalid wrapping response: {0}")]
    Unwrap(String),

    /// Dry-run mode: the equivalent `curl` command instead of a request.
    #[error("{0}")]
    OutputCurlString(String),

    /// Dry-run mode: a sample policy granting access to the request.
    #[error("{0}")]
    OutputPolicy(String),

    /// Local I/O failed while streaming a body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Transport { .. } | Self::Body(_) => ErrorKind::Transport,
            Self::Response(_) => ErrorKind::Protocol,
            Self::Decode(_) | Self::Schema(_) | Self::MissingClientToken | Self::Unwrap(_) => {
                ErrorKind::Schema
            }
            Self::Encode(_) | Self::InvalidHeader(_) | Self::Io(_) | Self::Precondition(_) => {
                ErrorKind::Request
            }
            Self::SecretNotFound(_) => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::ReservedHeader(_) => ErrorKind::ReservedHeader,
            Self::RedirectDowngrade { .. }
            | Self::InvalidRedirect(_)
            | Self::BodyNotReplayable(_) => ErrorKind::Redirect,
            Self::OutputCurlString(_) | Self::OutputPolicy(_) => ErrorKind::Output,
        }
    }

    /// Returns the status code when the server produced this error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response(e) => Some(e.status()),
            _ => None,
        }
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }
}

/// Coarse error categories with stable labels.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invalid configuration.
    Config,
    /// Connection, TLS or timeout failure.
    Transport,
    /// The server returned an error status.
    Protocol,
    /// A response could not be decoded.
    Schema,
    /// A request could not be built locally.
    Request,
    /// Nothing exists at the requested path.
    NotFound,
    /// The caller cancelled.
    Cancelled,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
    /// A managed header was supplied by the caller.
    ReservedHeader,
    /// A redirect could not be followed safely.
    Redirect,
    /// A dry-run helper produced output instead of a request.
    Output,
}

impl ErrorKind {
    /// Returns a stable string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Schema => "schema",
            Self::Request => "request",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ReservedHeader => "reserved_header",
            Self::Redirect => "redirect",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
