//! The typed failure half of an operation outcome.

use std::borrow::Cow;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::category::{tags, Category, CategorySet};
use crate::error::{BuildError, TransportError, TransportErrorKind};

/// Result of invoking an operation.
pub type Outcome<T> = std::result::Result<T, Failure>;

/// What produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The input could not be rendered into a request.
    Request,
    /// The network call did not complete.
    Transport(TransportErrorKind),
    /// The response body did not decode into the expected shape.
    Parse,
    /// An error response matched one of the operation's declared error shapes.
    Api,
    /// An error response matched no declared error shape.
    UnknownApi,
}

/// A failed operation call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{tag}: {message}")]
pub struct Failure {
    kind: FailureKind,
    tag: Cow<'static, str>,
    code: Option<String>,
    message: String,
    categories: CategorySet,
    details: Option<Value>,
    retry_after: Option<Duration>,
    raw_body: Option<String>,
}

impl Failure {
    fn new(kind: FailureKind, tag: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            kind,
            tag: tag.into(),
            code: None,
            message: message.into(),
            categories: CategorySet::empty(),
            details: None,
            retry_after: None,
            raw_body: None,
        }
    }

    /// A request-assembly failure.
    pub fn request(err: &BuildError) -> Self {
        Self::new(FailureKind::Request, tags::REQUEST, err.to_string())
    }

    /// A transport failure.
    pub fn transport(err: &TransportError) -> Self {
        Self::new(FailureKind::Transport(err.kind()), tags::TRANSPORT, err.message())
    }

    /// A body that did not decode into the expected success shape.
    pub fn parse(status: u16, message: impl Into<String>, raw_body: impl Into<String>) -> Self {
        let mut failure = Self::new(FailureKind::Parse, tags::PARSE, message);
        failure.code = Some(status.to_string());
        failure.raw_body = Some(raw_body.into());
        failure
    }

    /// An HTTP error response.
    pub fn api(
        kind: FailureKind,
        tag: impl Into<Cow<'static, str>>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        let mut failure = Self::new(kind, tag, message);
        failure.code = Some(status.to_string());
        failure
    }

    /// Set the categories.
    pub fn with_categories(mut self, categories: CategorySet) -> Self {
        self.categories = categories;
        self
    }

    /// Set the decoded error body.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Set the server-requested retry delay.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Set the raw response body.
    pub fn with_raw_body(mut self, raw_body: impl Into<String>) -> Self {
        self.raw_body = Some(raw_body.into());
        self
    }

    /// Get the failure kind.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Get the discriminant tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get the failure code (the HTTP status, for response failures).
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Get the HTTP status, for response failures.
    pub fn status(&self) -> Option<u16> {
        self.code.as_deref().and_then(|c| c.parse().ok())
    }

    /// Get the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the categories.
    pub fn categories(&self) -> CategorySet {
        self.categories
    }

    /// Check for a category.
    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(category)
    }

    /// Get the decoded error body, if any.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Decode the error body into its declared type.
    pub fn details_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.details
            .as_ref()
            .and_then(|details| T::deserialize(details).ok())
    }

    /// Get the server-requested retry delay.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Get the raw response body, for parse and unmatched failures.
    pub fn raw_body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }

    /// Check if this is a transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, FailureKind::Transport(_))
    }

    /// Check if the transport failure is transient.
    pub fn is_transient_transport(&self) -> bool {
        match self.kind {
            FailureKind::Transport(kind) => !matches!(kind, TransportErrorKind::Other),
            _ => false,
        }
    }

    /// Check if the failure is safe to retry: throttling, server-side, or a
    /// transient transport failure.
    pub fn is_transient(&self) -> bool {
        self.has_category(Category::Throttling)
            || self.has_category(Category::Server)
            || self.is_transient_transport()
    }
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        Failure::transport(&err)
    }
}

impl From<BuildError> for Failure {
    fn from(err: BuildError) -> Self {
        Failure::request(&err)
    }
}
