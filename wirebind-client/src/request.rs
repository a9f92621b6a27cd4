//! Request synthesis from operation bindings.

use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::binding::{Binding, Segment};
use crate::error::BuildError;
use crate::operation::Operation;

/// Characters left unescaped in a single path segment (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// A single `key=value` entry.
    Single(String),
    /// Repeated `key=value` entries, in order.
    Multi(Vec<String>),
}

impl QueryValue {
    /// All values, in order.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                let first = std::mem::take(first);
                *self = Self::Multi(vec![first, value]);
            }
            Self::Multi(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// A rendered request, relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Path with all labels substituted.
    pub path: String,
    /// Query parameters, ordered by key.
    pub query: BTreeMap<String, QueryValue>,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Query parameters as `(key, value)` pairs, repeated keys in order.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().flat_map(|(key, value)| {
            value
                .values()
                .iter()
                .map(move |v| (key.as_str(), v.as_str()))
        })
    }

    /// The form-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body back into JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// Renders inputs of one operation into [`HttpRequest`]s.
///
/// Compiled once from the operation's static shape; rendering never
/// re-inspects the declaration.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    template: Vec<Segment>,
    labels: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    payload: Option<String>,
    non_body: HashSet<String>,
    bodyless: bool,
}

impl RequestBuilder {
    /// Compile the request plan of an operation.
    pub fn compile<I, O>(operation: &Operation<I, O>) -> Self {
        let mut labels = HashMap::new();
        let mut query = Vec::new();
        let mut headers = Vec::new();
        let mut payload = None;
        let mut non_body = HashSet::new();

        for (field, binding) in operation.bindings().iter() {
            match binding {
                Binding::PathLabel(label) => {
                    labels.insert(label.to_string(), field.to_string());
                }
                Binding::Query(key) => query.push((field.to_string(), key.to_string())),
                Binding::Header(name) => headers.push((field.to_string(), name.to_string())),
                Binding::Payload => payload = Some(field.to_string()),
                Binding::Body => continue,
            }
            non_body.insert(field.to_string());
        }

        tracing::trace!(operation = operation.name(), "Compiled request builder");

        Self {
            method: operation.http().method().clone(),
            template: operation.http().uri().segments().to_vec(),
            labels,
            query,
            headers,
            payload,
            non_body,
            bodyless: operation.http().is_bodyless(),
        }
    }

    /// Render a serializable input.
    pub fn build<I: Serialize + ?Sized>(&self, input: &I) -> Result<HttpRequest, BuildError> {
        self.build_value(serde_json::to_value(input)?)
    }

    /// Render an input already converted to JSON.
    pub fn build_value(&self, input: Value) -> Result<HttpRequest, BuildError> {
        let fields = match input {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => return Err(BuildError::InputNotObject(json_type(&other))),
        };

        let path = self.render_path(&fields)?;
        let query = self.render_query(&fields);

        let omit_body = self.bodyless && self.payload.is_none();
        let mut headers = HeaderMap::new();
        for (field, name) in &self.headers {
            let Some(value) = present(&fields, field) else {
                continue;
            };
            let invalid = || BuildError::InvalidHeader { name: name.clone() };
            let name = HeaderName::try_from(name.as_str()).map_err(|_| invalid())?;
            let value = HeaderValue::try_from(stringify(value)).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        let body = match &self.payload {
            Some(field) => present(&fields, field)
                .map(|value| serde_json::to_vec(&strip_nulls(value.clone())))
                .transpose()?,
            None if omit_body => None,
            None => {
                let object: Map<String, Value> = fields
                    .into_iter()
                    .filter(|(field, value)| !self.non_body.contains(field) && !value.is_null())
                    .map(|(field, value)| (field, strip_nulls(value)))
                    .collect();
                if object.is_empty() {
                    None
                } else {
                    Some(serde_json::to_vec(&Value::Object(object))?)
                }
            }
        };

        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(HttpRequest {
            method: self.method.clone(),
            path,
            query,
            headers,
            body: body.map(Bytes::from),
        })
    }

    fn render_path(&self, fields: &Map<String, Value>) -> Result<String, BuildError> {
        let mut path = String::new();
        for segment in &self.template {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Label { name, greedy } => {
                    let value = self
                        .labels
                        .get(name)
                        .and_then(|field| present(fields, field))
                        .ok_or_else(|| BuildError::MissingLabel { label: name.clone() })?;
                    let value = stringify(value);
                    if *greedy {
                        path.push_str(&value);
                    } else {
                        path.extend(utf8_percent_encode(&value, SEGMENT));
                    }
                }
            }
        }
        Ok(path)
    }

    fn render_query(&self, fields: &Map<String, Value>) -> BTreeMap<String, QueryValue> {
        let mut query: BTreeMap<String, QueryValue> = BTreeMap::new();
        for (field, key) in &self.query {
            let values: Vec<String> = match present(fields, field) {
                None => continue,
                Some(Value::Array(items)) => items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(stringify)
                    .collect(),
                Some(value) => vec![stringify(value)],
            };
            for value in values {
                match query.get_mut(key) {
                    Some(existing) => existing.push(value),
                    None => {
                        query.insert(key.clone(), QueryValue::Single(value));
                    }
                }
            }
        }
        query
    }
}

/// A field's value, treating null as absent.
fn present<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    fields.get(field).filter(|value| !value.is_null())
}

/// Render a value for a path label, query parameter or header.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Drop null members from objects, recursively.
pub(crate) fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
