//! Error types for operation construction, request assembly and transport.
//!
//! Failures produced while *executing* an operation are values of
//! [`Failure`](crate::Failure); the types here describe the pieces that feed
//! into it.

use thiserror::Error;

/// Result type for construction-time operations.
pub type Result<T> = std::result::Result<T, ConstructionError>;

/// Errors raised while declaring an operation or building a client.
///
/// These are programming mistakes in the static operation definitions or
/// client configuration. They are surfaced immediately and never retried.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// The operation's input shape carries no HTTP trait.
    #[error("Operation `{operation}` has no HTTP trait (method + URI template)")]
    MissingHttpTrait {
        /// Operation name.
        operation: String,
    },

    /// The URI template could not be parsed.
    #[error("Invalid URI template `{template}`: {reason}")]
    InvalidUriTemplate {
        /// The offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A template label has no field bound to it.
    #[error("Operation `{operation}`: label `{{{label}}}` has no PathLabel binding")]
    UnboundLabel {
        /// Operation name.
        operation: String,
        /// Label name.
        label: String,
    },

    /// A PathLabel binding names a label that is not in the template.
    #[error("Operation `{operation}`: field `{field}` is bound to unknown label `{label}`")]
    UnknownLabel {
        /// Operation name.
        operation: String,
        /// Field name.
        field: String,
        /// Label name.
        label: String,
    },

    /// A field was bound more than once.
    #[error("Operation `{operation}`: field `{field}` is bound more than once")]
    DuplicateBinding {
        /// Operation name.
        operation: String,
        /// Field name.
        field: String,
    },

    /// More than one field is bound as the raw payload.
    #[error("Operation `{operation}`: fields `{first}` and `{second}` are both bound as payload")]
    MultiplePayloads {
        /// Operation name.
        operation: String,
        /// First payload field.
        first: String,
        /// Second payload field.
        second: String,
    },

    /// The configured base URL is not a valid absolute URL.
    #[error("Invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        /// The configured URL.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },

    /// A header name or value is invalid.
    #[error("Invalid header `{name}`")]
    InvalidHeader {
        /// Header name.
        name: String,
    },

    /// The underlying HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised while rendering a concrete input into a request.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The input could not be serialized.
    #[error("Failed to serialize input: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The input did not serialize to a JSON object.
    #[error("Input must serialize to a JSON object, got {0}")]
    InputNotObject(&'static str),

    /// A path label field had no value.
    #[error("Missing value for path label `{label}`")]
    MissingLabel {
        /// Label name.
        label: String,
    },

    /// A header-bound field produced an invalid header.
    #[error("Invalid value for header `{name}`")]
    InvalidHeader {
        /// Header name.
        name: String,
    },

    /// The request URL could not be resolved against the base URL.
    #[error("Invalid request URL `{url}`: {source}")]
    InvalidUrl {
        /// The URL that failed to parse.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },
}

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request or response timed out.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// Host name resolution failed.
    Dns,
    /// TLS handshake or certificate failure.
    Tls,
    /// The connection was reset or closed mid-exchange.
    Reset,
    /// The response body stream failed.
    Body,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Get the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Dns => "dns",
            Self::Tls => "tls",
            Self::Reset => "reset",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The network call itself did not complete.
#[derive(Debug, Clone, Error)]
#[error("Transport error ({kind}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Create a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Get the error kind.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if the failure is worth retrying.
    ///
    /// Connection-level problems are transient; `Other` covers request
    /// construction and protocol errors that a retry cannot fix.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Other)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            connect_kind(&err)
        } else if is_reset(&err) {
            TransportErrorKind::Reset
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Narrow a connect failure by its source chain.
///
/// The resolver reports as `dns error`; rustls failures surface as
/// `InvalidData` io errors from the TLS stream.
fn connect_kind(err: &(dyn std::error::Error + 'static)) -> TransportErrorKind {
    let mut current = err.source();
    while let Some(source) = current {
        if source.to_string().starts_with("dns error") {
            return TransportErrorKind::Dns;
        }
        if let Some(io) = source.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::InvalidData
        {
            return TransportErrorKind::Tls;
        }
        current = source.source();
    }
    TransportErrorKind::Connect
}

/// Walk the source chain looking for a connection reset.
fn is_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = err.source();
    while let Some(source) = current {
        if let Some(io) = source.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            );
        }
        current = source.source();
    }
    false
}
