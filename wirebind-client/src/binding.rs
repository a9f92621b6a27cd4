//! Wire-binding metadata: the HTTP trait and per-field binding descriptors.
//!
//! Everything here is schema-level. Nothing inspects request data; the
//! [`RequestBuilder`](crate::RequestBuilder) consumes these descriptors to
//! render concrete inputs.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use http::Method;

use crate::error::ConstructionError;

/// Where one input field goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Binding {
    /// Substituted into the URI template label of this name.
    PathLabel(Cow<'static, str>),
    /// Sent as the query parameter of this name.
    Query(Cow<'static, str>),
    /// Sent as the header of this name.
    Header(Cow<'static, str>),
    /// The field's value alone is the request body.
    Payload,
    /// Collected into the JSON body object under the field's name.
    #[default]
    Body,
}

impl Binding {
    /// Bind to a path label.
    pub fn path_label(name: impl Into<Cow<'static, str>>) -> Self {
        Self::PathLabel(name.into())
    }

    /// Bind to a query parameter.
    pub fn query(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Query(name.into())
    }

    /// Bind to a header.
    pub fn header(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Header(name.into())
    }
}

/// One piece of a parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, copied as is.
    Literal(String),
    /// A `{name}` or `{name+}` label.
    Label {
        /// Label name.
        name: String,
        /// `{name+}`: inserted without percent-encoding, slashes preserved.
        greedy: bool,
    },
}

/// A parsed URI template such as `/v2/objects/{object}/records/{record_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template.
    pub fn parse(template: &str) -> Result<Self, ConstructionError> {
        let invalid = |reason: &str| ConstructionError::InvalidUriTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested '{'")),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'"));
                    }

                    let (name, greedy) = match name.strip_suffix('+') {
                        Some(stripped) => (stripped.to_string(), true),
                        None => (name, false),
                    };
                    if name.is_empty() {
                        return Err(invalid("empty label"));
                    }
                    if name.contains('+') {
                        return Err(invalid("'+' is only allowed as a greedy suffix"));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Label { name, greedy });
                }
                '}' => return Err(invalid("unmatched '}'")),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all labels, in template order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Label { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

/// The HTTP method and URI template of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTrait {
    method: Method,
    uri: UriTemplate,
}

impl HttpTrait {
    /// Create an HTTP trait, parsing the URI template.
    pub fn new(method: Method, uri: &str) -> Result<Self, ConstructionError> {
        Ok(Self {
            method,
            uri: UriTemplate::parse(uri)?,
        })
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI template.
    pub fn uri(&self) -> &UriTemplate {
        &self.uri
    }

    /// Whether a request without an explicit payload binding carries no body.
    pub fn is_bodyless(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD || self.method == Method::DELETE
    }
}

/// Immutable field → binding map. Undeclared fields bind to [`Binding::Body`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    fields: BTreeMap<String, Binding>,
}

impl Bindings {
    /// Record a binding. Returns `false`, keeping the first binding, if the
    /// field is already bound.
    pub(crate) fn insert(&mut self, field: String, binding: Binding) -> bool {
        match self.fields.entry(field) {
            Entry::Vacant(slot) => {
                slot.insert(binding);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// The binding of a field.
    pub fn binding_for(&self, field: &str) -> &Binding {
        static BODY: Binding = Binding::Body;
        self.fields.get(field).unwrap_or(&BODY)
    }

    /// Explicitly declared bindings, ordered by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.fields.iter().map(|(field, binding)| (field.as_str(), binding))
    }

    /// The field bound as the raw payload, if any.
    pub fn payload_field(&self) -> Option<&str> {
        self.iter()
            .find(|(_, binding)| matches!(binding, Binding::Payload))
            .map(|(field, _)| field)
    }

    /// Number of explicitly declared bindings.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no binding was declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template() {
        let template = UriTemplate::parse("/v2/objects/{object}/records/{record_id}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("/v2/objects/".to_string()),
                Segment::Label { name: "object".to_string(), greedy: false },
                Segment::Literal("/records/".to_string()),
                Segment::Label { name: "record_id".to_string(), greedy: false },
            ]
        );
        assert_eq!(template.labels().collect::<Vec<_>>(), vec!["object", "record_id"]);
    }

    #[test]
    fn test_parse_greedy_label() {
        let template = UriTemplate::parse("/files/{key+}").unwrap();
        assert_eq!(
            template.segments()[1],
            Segment::Label { name: "key".to_string(), greedy: true }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_templates() {
        for bad in ["/a/{id", "/a/id}", "/a/{}", "/a/{+}", "/a/{a+b}", "/a/{{id}}"] {
            assert!(
                matches!(
                    UriTemplate::parse(bad),
                    Err(ConstructionError::InvalidUriTemplate { .. })
                ),
                "template {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_binding_is_body() {
        let mut bindings = Bindings::default();
        assert!(bindings.insert("limit".to_string(), Binding::query("limit")));
        assert_eq!(bindings.binding_for("limit"), &Binding::Query("limit".into()));
        assert_eq!(bindings.binding_for("name"), &Binding::Body);
        assert!(!bindings.insert("limit".to_string(), Binding::Body));
        assert_eq!(bindings.binding_for("limit"), &Binding::Query("limit".into()));
    }

    #[test]
    fn test_bodyless_methods() {
        assert!(HttpTrait::new(Method::GET, "/a").unwrap().is_bodyless());
        assert!(HttpTrait::new(Method::HEAD, "/a").unwrap().is_bodyless());
        assert!(HttpTrait::new(Method::DELETE, "/a").unwrap().is_bodyless());
        assert!(!HttpTrait::new(Method::PUT, "/a").unwrap().is_bodyless());
        assert!(!HttpTrait::new(Method::POST, "/a").unwrap().is_bodyless());
    }
}
