//! Response classification and decoding.

use std::marker::PhantomData;
use std::time::Duration;

use http::header::RETRY_AFTER;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::category::{Category, CategoryTable, tag_for_status};
use crate::failure::{Failure, FailureKind, Outcome};
use crate::operation::{ErrorShape, Operation};
use crate::transport::RawResponse;

/// Output of operations whose success response carries nothing of interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EmptyOutput {}

/// Turns raw responses of one operation into outcomes.
pub struct ResponseDecoder<O> {
    shapes: Vec<ErrorShape>,
    categories: CategoryTable,
    _output: PhantomData<fn() -> O>,
}

impl<O: DeserializeOwned> ResponseDecoder<O> {
    /// Compile the decoder of an operation.
    pub fn compile<I>(operation: &Operation<I, O>) -> Self {
        tracing::trace!(
            operation = operation.name(),
            shapes = operation.error_shapes().len(),
            "Compiled response decoder"
        );
        Self {
            shapes: operation.error_shapes().to_vec(),
            categories: operation.categories().clone(),
            _output: PhantomData,
        }
    }

    /// Read the body and decode. A failed body read is a transport failure.
    pub async fn classify(&self, response: RawResponse) -> Outcome<O> {
        let RawResponse {
            status,
            headers,
            body,
        } = response;
        let body = body.collect().await?;
        self.decode(status, &headers, &body)
    }

    /// Decode a fully-read response.
    pub fn decode(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Outcome<O> {
        if status.as_u16() < 400 {
            self.decode_success(status.as_u16(), body)
        } else {
            Err(self.decode_failure(status.as_u16(), headers, body))
        }
    }

    fn decode_success(&self, status: u16, body: &[u8]) -> Outcome<O> {
        let text = std::str::from_utf8(body).map_err(|err| {
            Failure::parse(
                status,
                format!("Response body is not valid UTF-8: {err}"),
                String::from_utf8_lossy(body),
            )
        })?;

        let decoded = if text.trim().is_empty() {
            O::deserialize(Value::Object(Map::new()))
        } else {
            serde_json::from_str(text)
        };
        decoded.map_err(|err| {
            Failure::parse(status, format!("Failed to decode response: {err}"), text)
        })
    }

    fn decode_failure(&self, status: u16, headers: &HeaderMap, body: &[u8]) -> Failure {
        let text = String::from_utf8_lossy(body);
        let value = if text.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| json!({ "rawText": text }))
        };
        let message = probe_message(&value);

        let mut failure = match self.shapes.iter().find(|shape| shape.matches(status, &value)) {
            Some(shape) => {
                let tag = shape.tag_cow();
                Failure::api(FailureKind::Api, tag.clone(), status, message)
                    .with_categories(self.categories.categories_of(&tag))
            }
            None => {
                let tag = tag_for_status(status);
                Failure::api(FailureKind::UnknownApi, tag, status, message)
                    .with_categories(self.categories.categories_of(tag))
                    .with_raw_body(text.to_string())
            }
        };

        if failure.has_category(Category::Throttling)
            && let Some(delay) = retry_after(headers, &value)
        {
            failure = failure.with_retry_after(delay);
        }
        failure.with_details(value)
    }
}

impl<O> std::fmt::Debug for ResponseDecoder<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDecoder")
            .field("shapes", &self.shapes)
            .finish_non_exhaustive()
    }
}

/// First non-empty string among the conventional message fields.
fn probe_message(body: &Value) -> String {
    const KEYS: [&str; 5] = ["message", "error", "detail", "details", "error_description"];

    KEYS.iter()
        .filter_map(|key| body.get(key))
        .chain(body.get("error").and_then(|error| error.get("message")))
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()))
        .unwrap_or("Unknown error")
        .to_string()
}

/// Server-requested delay: `Retry-After` in seconds, else a numeric
/// `retry_after`/`retryAfter` body field.
fn retry_after(headers: &HeaderMap, body: &Value) -> Option<Duration> {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok());
    let from_body = || {
        ["retry_after", "retryAfter"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_f64))
    };

    from_header
        .or_else(from_body)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{tags, CategorySet};
    use crate::error::{TransportError, TransportErrorKind};
    use crate::transport::ResponseBody;
    use bytes::Bytes;
    use futures::stream;
    use http::HeaderValue;
    use serde::Serialize;

    #[derive(Serialize)]
    struct GetRecord {
        id: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Conflict {
        #[allow(dead_code)]
        existing_id: String,
    }

    #[derive(Debug, Deserialize)]
    struct AnyError {}

    fn decoder_with(shapes: Vec<ErrorShape>) -> ResponseDecoder<Record> {
        let mut builder = Operation::<GetRecord, Record>::builder("GetRecord")
            .get("/records/{id}")
            .path_label("id");
        for shape in shapes {
            builder = builder.error(shape);
        }
        ResponseDecoder::compile(&builder.build().unwrap())
    }

    fn decode<O: DeserializeOwned>(decoder: &ResponseDecoder<O>, status: u16, body: &str) -> Outcome<O> {
        decoder.decode(StatusCode::from_u16(status).unwrap(), &HeaderMap::new(), body.as_bytes())
    }

    #[test]
    fn test_success_decodes_output() {
        let decoder = decoder_with(vec![]);
        let record = decode(&decoder, 200, r#"{"id":"r1","name":"Ada","extra":true}"#).unwrap();
        assert_eq!(record, Record { id: "r1".into(), name: "Ada".into() });
    }

    #[test]
    fn test_empty_body_decodes_as_empty_object() {
        let op = Operation::<GetRecord, EmptyOutput>::builder("DeleteRecord")
            .delete("/records/{id}")
            .path_label("id")
            .build()
            .unwrap();
        let decoder = ResponseDecoder::compile(&op);
        assert_eq!(decode(&decoder, 204, "").unwrap(), EmptyOutput {});
        assert_eq!(decode(&decoder, 200, "  \n").unwrap(), EmptyOutput {});

        let op = Operation::<GetRecord, Value>::builder("Raw")
            .get("/records/{id}")
            .path_label("id")
            .build()
            .unwrap();
        assert_eq!(decode(&ResponseDecoder::compile(&op), 204, "").unwrap(), json!({}));
    }

    #[test]
    fn test_success_shape_mismatch_is_parse_failure() {
        let decoder = decoder_with(vec![]);
        let failure = decode(&decoder, 200, r#"{"id":"r1"}"#).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Parse);
        assert_eq!(failure.tag(), tags::PARSE);
        assert_eq!(failure.raw_body(), Some(r#"{"id":"r1"}"#));
        assert!(failure.message().contains("name"));
        assert!(!failure.is_transient());

        let failure = decode(&decoder, 200, "<html>").unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Parse);
        assert_eq!(failure.raw_body(), Some("<html>"));
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let decoder = decoder_with(vec![]);
        let failure = decoder
            .decode(StatusCode::OK, &HeaderMap::new(), &[0xff, 0xfe])
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_unmatched_400() {
        let decoder = decoder_with(vec![]);
        let failure = decode(&decoder, 400, r#"{"message":"Invalid request"}"#).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::UnknownApi);
        assert_eq!(failure.code(), Some("400"));
        assert_eq!(failure.message(), "Invalid request");
        assert_eq!(failure.tag(), tags::VALIDATION);
        assert!(failure.has_category(Category::Validation));
        assert_eq!(failure.raw_body(), Some(r#"{"message":"Invalid request"}"#));
    }

    #[test]
    fn test_malformed_error_body() {
        let decoder = decoder_with(vec![]);
        let failure = decode(&decoder, 400, "{not json").unwrap_err();
        assert_eq!(failure.code(), Some("400"));
        assert_eq!(failure.message(), "Unknown error");
        assert_eq!(failure.details(), Some(&json!({"rawText": "{not json"})));
    }

    #[test]
    fn test_message_probe_order() {
        let decoder = decoder_with(vec![]);
        let cases = [
            (r#"{"error":"bad","detail":"worse"}"#, "bad"),
            (r#"{"detail":"d","details":"ds"}"#, "d"),
            (r#"{"details":"ds"}"#, "ds"),
            (r#"{"error_description":"expired"}"#, "expired"),
            (r#"{"error":{"message":"nested"}}"#, "nested"),
            (r#"{"code":7}"#, "Unknown error"),
        ];
        for (body, expected) in cases {
            assert_eq!(decode(&decoder, 422, body).unwrap_err().message(), expected, "{body}");
        }
    }

    #[test]
    fn test_status_defaults() {
        let decoder = decoder_with(vec![]);
        let cases = [
            (401, tags::AUTHENTICATION, Some(Category::Auth)),
            (403, tags::AUTHORIZATION, Some(Category::Auth)),
            (404, tags::NOT_FOUND, Some(Category::NotFound)),
            (422, tags::VALIDATION, Some(Category::Validation)),
            (429, tags::RATE_LIMIT, Some(Category::Throttling)),
            (502, tags::SERVER, Some(Category::Server)),
            (418, tags::UNKNOWN, None),
        ];
        for (status, tag, category) in cases {
            let failure = decode(&decoder, status, "{}").unwrap_err();
            assert_eq!(failure.tag(), tag);
            match category {
                Some(category) => assert_eq!(failure.categories(), CategorySet::from(category)),
                None => assert!(failure.categories().is_empty()),
            }
        }
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let decoder = decoder_with(vec![]);
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        let failure = decoder
            .decode(StatusCode::TOO_MANY_REQUESTS, &headers, br#"{"message":"Rate limit exceeded"}"#)
            .unwrap_err();
        assert!(failure.has_category(Category::Throttling));
        assert_eq!(failure.message(), "Rate limit exceeded");
        assert_eq!(failure.retry_after(), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        let failure = decoder
            .decode(StatusCode::TOO_MANY_REQUESTS, &headers, b"")
            .unwrap_err();
        assert_eq!(failure.retry_after(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_retry_after_body_fallback() {
        let decoder = decoder_with(vec![]);
        let failure = decode(&decoder, 429, r#"{"retryAfter":2}"#).unwrap_err();
        assert_eq!(failure.retry_after(), Some(Duration::from_secs(2)));

        let failure = decode(&decoder, 503, r#"{"retry_after":2}"#).unwrap_err();
        assert_eq!(failure.retry_after(), None);
    }

    #[test]
    fn test_out_of_range_retry_after_is_ignored() {
        let decoder = decoder_with(vec![]);
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e20"));
        let failure = decoder
            .decode(StatusCode::TOO_MANY_REQUESTS, &headers, b"{}")
            .unwrap_err();
        assert!(failure.has_category(Category::Throttling));
        assert_eq!(failure.retry_after(), None);

        let failure = decode(&decoder, 429, r#"{"retryAfter":1e300}"#).unwrap_err();
        assert_eq!(failure.retry_after(), None);

        let failure = decode(&decoder, 429, r#"{"retryAfter":-3}"#).unwrap_err();
        assert_eq!(failure.retry_after(), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("NaN"));
        let failure = decoder
            .decode(StatusCode::TOO_MANY_REQUESTS, &headers, b"")
            .unwrap_err();
        assert_eq!(failure.retry_after(), None);
    }

    #[test]
    fn test_declared_shapes_first_match_wins() {
        let decoder = decoder_with(vec![
            ErrorShape::new::<Conflict>("ConflictError").status(409),
            ErrorShape::new::<AnyError>("OtherError").category(Category::Server),
        ]);

        let failure = decode(&decoder, 409, r#"{"message":"exists","existing_id":"r1"}"#).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Api);
        assert_eq!(failure.tag(), "ConflictError");
        assert_eq!(failure.code(), Some("409"));
        assert_eq!(failure.message(), "exists");
        assert!(failure.categories().is_empty());
        assert!(failure.raw_body().is_none());
        assert_eq!(failure.details().unwrap()["existing_id"], "r1");

        // Wrong status for the first shape: falls through to the second.
        let failure = decode(&decoder, 400, r#"{"existing_id":"r1"}"#).unwrap_err();
        assert_eq!(failure.tag(), "OtherError");
        assert!(failure.has_category(Category::Server));
        assert!(failure.is_transient());
    }

    #[tokio::test]
    async fn test_classify_body_read_failure_is_transport() {
        let decoder = decoder_with(vec![]);
        let body = ResponseBody::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"{\"id\":")),
            Err(TransportError::new(TransportErrorKind::Body, "reset mid-body")),
        ]));
        let response = RawResponse::new(StatusCode::OK, HeaderMap::new(), body);

        let failure = decoder.classify(response).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Transport(TransportErrorKind::Body));
        assert!(failure.is_transient());
    }

    #[tokio::test]
    async fn test_classify_reads_full_body() {
        let decoder = decoder_with(vec![]);
        let response = RawResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            ResponseBody::from_bytes(r#"{"id":"r1","name":"Ada"}"#),
        );
        assert_eq!(decoder.classify(response).await.unwrap().name, "Ada");
    }
}
