//! Operation declarations.
//!
//! An [`Operation`] is the static description of one endpoint: its HTTP
//! trait, how each input field binds to the wire, the error shapes it may
//! answer with, and optionally how it paginates. Operations are declared
//! once through [`OperationBuilder`] and never mutated; every structural
//! mistake is reported by [`OperationBuilder::build`].
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use wirebind_client::{ErrorShape, Operation, Category};
//!
//! #[derive(Serialize)]
//! struct ListRecords {
//!     object: String,
//!     limit: Option<u32>,
//!     offset: Option<u32>,
//! }
//!
//! #[derive(Deserialize)]
//! struct RecordPage {
//!     data: Vec<serde_json::Value>,
//!     next: Option<String>,
//! }
//!
//! #[derive(Deserialize)]
//! struct Conflict {
//!     message: String,
//! }
//!
//! let op = Operation::<ListRecords, RecordPage>::builder("ListRecords")
//!     .get("/v2/objects/{object}/records")
//!     .path_label("object")
//!     .query("limit")
//!     .query("offset")
//!     .error(ErrorShape::new::<Conflict>("ConflictError").status(409).category(Category::Validation))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(op.name(), "ListRecords");
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;

use http::Method;
use http::header::HeaderName;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::binding::{Binding, Bindings, HttpTrait};
use crate::category::{CategorySet, CategoryTable};
use crate::error::{ConstructionError, Result};

/// A declared error response shape.
///
/// A shape matches an error response when the status is accepted and the
/// body decodes as `T`. Shapes are tried in declaration order.
#[derive(Clone)]
pub struct ErrorShape {
    tag: Cow<'static, str>,
    statuses: Vec<u16>,
    categories: CategorySet,
    matches: fn(&Value) -> bool,
}

fn decodes_as<T: DeserializeOwned>(value: &Value) -> bool {
    T::deserialize(value).is_ok()
}

impl ErrorShape {
    /// Declare a shape whose body decodes as `T`.
    pub fn new<T: DeserializeOwned>(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tag: tag.into(),
            statuses: Vec::new(),
            categories: CategorySet::empty(),
            matches: decodes_as::<T>,
        }
    }

    /// Only match responses with this status. May be repeated.
    pub fn status(mut self, status: u16) -> Self {
        self.statuses.push(status);
        self
    }

    /// Attach categories to this shape's tag.
    pub fn category(mut self, categories: impl Into<CategorySet>) -> Self {
        self.categories = self.categories.union(categories.into());
        self
    }

    /// The discriminant tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The tag as declared.
    pub(crate) fn tag_cow(&self) -> Cow<'static, str> {
        self.tag.clone()
    }

    /// Categories declared on the shape.
    pub fn categories(&self) -> CategorySet {
        self.categories
    }

    /// Check whether an error response matches this shape.
    pub fn matches(&self, status: u16, body: &Value) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&status)) && (self.matches)(body)
    }
}

impl std::fmt::Debug for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorShape")
            .field("tag", &self.tag)
            .field("statuses", &self.statuses)
            .field("categories", &self.categories)
            .finish_non_exhaustive()
    }
}

/// How a list operation pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Query parameter of the continuation link that holds the next offset.
    pub offset_param: Cow<'static, str>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            offset_param: Cow::Borrowed("offset"),
        }
    }
}

impl PaginationConfig {
    /// Read the next offset from a different query parameter.
    pub fn offset_param(param: impl Into<Cow<'static, str>>) -> Self {
        Self {
            offset_param: param.into(),
        }
    }
}

/// A declared endpoint taking `I` and answering `O`.
pub struct Operation<I, O> {
    name: Cow<'static, str>,
    http: HttpTrait,
    bindings: Bindings,
    errors: Vec<ErrorShape>,
    categories: CategoryTable,
    pagination: Option<PaginationConfig>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> Operation<I, O> {
    /// Start declaring an operation.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> OperationBuilder<I, O> {
        OperationBuilder::new(name)
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP method and URI template.
    pub fn http(&self) -> &HttpTrait {
        &self.http
    }

    /// Field bindings.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Declared error shapes, in declaration order.
    pub fn error_shapes(&self) -> &[ErrorShape] {
        &self.errors
    }

    /// Category table: the standard entries plus those of the declared shapes.
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Pagination configuration, for list operations.
    pub fn pagination(&self) -> Option<&PaginationConfig> {
        self.pagination.as_ref()
    }
}

impl<I, O> Clone for Operation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            http: self.http.clone(),
            bindings: self.bindings.clone(),
            errors: self.errors.clone(),
            categories: self.categories.clone(),
            pagination: self.pagination.clone(),
            _marker: PhantomData,
        }
    }
}

impl<I, O> std::fmt::Debug for Operation<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("http", &self.http)
            .field("bindings", &self.bindings)
            .field("errors", &self.errors)
            .field("pagination", &self.pagination)
            .finish()
    }
}

/// Builder for [`Operation`].
pub struct OperationBuilder<I, O> {
    name: Cow<'static, str>,
    http: Option<(Method, String)>,
    bindings: Vec<(String, Binding)>,
    errors: Vec<ErrorShape>,
    pagination: Option<PaginationConfig>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> OperationBuilder<I, O> {
    fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            http: None,
            bindings: Vec::new(),
            errors: Vec::new(),
            pagination: None,
            _marker: PhantomData,
        }
    }

    /// Set the HTTP method and URI template.
    pub fn http(mut self, method: Method, uri: impl Into<String>) -> Self {
        self.http = Some((method, uri.into()));
        self
    }

    /// `GET` the URI template.
    pub fn get(self, uri: impl Into<String>) -> Self {
        self.http(Method::GET, uri)
    }

    /// `POST` to the URI template.
    pub fn post(self, uri: impl Into<String>) -> Self {
        self.http(Method::POST, uri)
    }

    /// `PUT` to the URI template.
    pub fn put(self, uri: impl Into<String>) -> Self {
        self.http(Method::PUT, uri)
    }

    /// `PATCH` the URI template.
    pub fn patch(self, uri: impl Into<String>) -> Self {
        self.http(Method::PATCH, uri)
    }

    /// `DELETE` the URI template.
    pub fn delete(self, uri: impl Into<String>) -> Self {
        self.http(Method::DELETE, uri)
    }

    /// `HEAD` the URI template.
    pub fn head(self, uri: impl Into<String>) -> Self {
        self.http(Method::HEAD, uri)
    }

    /// Bind a field.
    pub fn bind(mut self, field: impl Into<String>, binding: Binding) -> Self {
        self.bindings.push((field.into(), binding));
        self
    }

    /// Bind a field to the template label of the same name.
    pub fn path_label(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let binding = Binding::PathLabel(Cow::Owned(field.clone()));
        self.bind(field, binding)
    }

    /// Bind a field to the query parameter of the same name.
    pub fn query(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let binding = Binding::Query(Cow::Owned(field.clone()));
        self.bind(field, binding)
    }

    /// Bind a field to a query parameter with a different name.
    pub fn query_as(self, field: impl Into<String>, key: impl Into<Cow<'static, str>>) -> Self {
        self.bind(field, Binding::Query(key.into()))
    }

    /// Bind a field to a header.
    pub fn header(self, field: impl Into<String>, name: impl Into<Cow<'static, str>>) -> Self {
        self.bind(field, Binding::Header(name.into()))
    }

    /// Bind a field as the raw request body.
    pub fn payload(self, field: impl Into<String>) -> Self {
        self.bind(field, Binding::Payload)
    }

    /// Declare an error shape. Shapes are tried in declaration order.
    pub fn error(mut self, shape: ErrorShape) -> Self {
        self.errors.push(shape);
        self
    }

    /// Mark the operation as paginated.
    pub fn paginated(mut self, config: PaginationConfig) -> Self {
        self.pagination = Some(config);
        self
    }

    /// Validate the declaration and freeze it.
    pub fn build(self) -> Result<Operation<I, O>> {
        let operation = self.name.to_string();

        let (method, uri) = self.http.ok_or_else(|| ConstructionError::MissingHttpTrait {
            operation: operation.clone(),
        })?;
        let http = HttpTrait::new(method, &uri)?;

        let mut bindings = Bindings::default();
        let mut payload: Option<String> = None;
        for (field, binding) in self.bindings {
            if matches!(binding, Binding::Payload) {
                if let Some(first) = &payload {
                    return Err(ConstructionError::MultiplePayloads {
                        operation,
                        first: first.clone(),
                        second: field,
                    });
                }
                payload = Some(field.clone());
            }

            if let Binding::PathLabel(label) = &binding
                && !http.uri().labels().any(|l| l == label)
            {
                return Err(ConstructionError::UnknownLabel {
                    operation,
                    label: label.to_string(),
                    field,
                });
            }

            if let Binding::Header(name) = &binding
                && HeaderName::from_bytes(name.as_bytes()).is_err()
            {
                return Err(ConstructionError::InvalidHeader {
                    name: name.to_string(),
                });
            }

            if !bindings.insert(field.clone(), binding) {
                return Err(ConstructionError::DuplicateBinding { operation, field });
            }
        }

        for label in http.uri().labels() {
            let bound = bindings
                .iter()
                .any(|(_, b)| matches!(b, Binding::PathLabel(l) if l == label));
            if !bound {
                return Err(ConstructionError::UnboundLabel {
                    operation,
                    label: label.to_string(),
                });
            }
        }

        let categories = self
            .errors
            .iter()
            .filter(|shape| !shape.categories().is_empty())
            .fold(CategoryTable::extend_standard(), |table, shape| {
                table.entry(shape.tag_cow(), shape.categories())
            })
            .build();

        tracing::trace!(
            operation = %self.name,
            method = %http.method(),
            uri = http.uri().as_str(),
            bindings = bindings.len(),
            errors = self.errors.len(),
            "Declared operation"
        );

        Ok(Operation {
            name: self.name,
            http,
            bindings,
            errors: self.errors,
            categories,
            pagination: self.pagination,
            _marker: PhantomData,
        })
    }
}
