//! # Wirebind Client
//!
//! A runtime for typed HTTP API clients built from declarative operation
//! definitions.
//!
//! ## Features
//!
//! - **Declarative Bindings**: Each input field maps to a path label, query
//!   parameter, header, raw payload or JSON body field
//! - **Deterministic Requests**: Path, query, headers and body rendered from
//!   the bindings alone
//! - **Typed Outcomes**: Every response becomes the output type or a
//!   categorized [`Failure`]
//! - **Retry with Backoff**: Throttling, server and transient transport
//!   failures retried with jittered exponential backoff, honoring `Retry-After`
//! - **Pagination**: Lazy page and item streams over offset-paginated lists
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use wirebind_client::{ApiClient, ClientConfig, Operation};
//!
//! #[derive(Serialize)]
//! struct GetRecord {
//!     object: String,
//!     record_id: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Record {
//!     id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .bearer_token("sk_live_...")
//!         .build();
//!     let client = ApiClient::new(config)?;
//!
//!     let get_record = client.operation(
//!         Operation::<GetRecord, Record>::builder("GetRecord")
//!             .get("/v2/objects/{object}/records/{record_id}")
//!             .path_label("object")
//!             .path_label("record_id")
//!             .build()?,
//!     );
//!
//!     let record = get_record
//!         .call(&GetRecord {
//!             object: "people".into(),
//!             record_id: "rec_123".into(),
//!         })
//!         .await?;
//!
//!     println!("Fetched {}", record.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Handling Failures
//!
//! ```rust,no_run
//! use wirebind_client::{Category, Failure};
//!
//! fn report(failure: &Failure) {
//!     if failure.has_category(Category::NotFound) {
//!         println!("missing: {}", failure.message());
//!     } else if failure.is_transient() {
//!         println!("gave up after retries: {failure}");
//!     }
//! }
//! ```

mod binding;
mod category;
mod client;
mod config;
mod error;
mod failure;
mod operation;
mod pagination;
mod request;
mod response;
mod retry;
mod transport;

pub use binding::{Binding, Bindings, HttpTrait, Segment, UriTemplate};
pub use category::{Category, CategorySet, CategoryTable, CategoryTableBuilder, tag_for_status, tags};
pub use client::{ApiClient, OperationClient};
pub use config::{ClientConfig, ClientConfigBuilder, Credential};
pub use error::{BuildError, ConstructionError, Result, TransportError, TransportErrorKind};
pub use failure::{Failure, FailureKind, Outcome};
pub use operation::{ErrorShape, Operation, OperationBuilder, PaginationConfig};
pub use pagination::{Page, PageRequest};
pub use request::{HttpRequest, QueryValue, RequestBuilder};
pub use response::{EmptyOutput, ResponseDecoder};
pub use retry::{BackoffStrategy, RetryPolicy, RetryPredicate, with_retry};
pub use transport::{RawResponse, ReqwestTransport, ResponseBody, Transport, TransportRequest};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use wirebind_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::binding::Binding;
    pub use crate::category::{Category, CategorySet};
    pub use crate::client::{ApiClient, OperationClient};
    pub use crate::config::{ClientConfig, ClientConfigBuilder, Credential};
    pub use crate::error::{ConstructionError, Result};
    pub use crate::failure::{Failure, FailureKind, Outcome};
    pub use crate::operation::{ErrorShape, Operation, PaginationConfig};
    pub use crate::pagination::{Page, PageRequest};
    pub use crate::response::EmptyOutput;
    pub use crate::retry::{BackoffStrategy, RetryPolicy};
    pub use http::Method;
}
