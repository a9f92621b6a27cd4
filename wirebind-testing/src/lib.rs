//! Testing utilities for wirebind operation clients.
//!
//! ## Features
//!
//! - **MockTransport** - Scripted transport replaying queued responses and
//!   transport errors, recording every request
//! - **MockResponse** - Canned responses, including failing body streams
//! - **Fixtures** - Common error responses, list pages and a preconfigured
//!   client
//!
//! ## Quick Start
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use wirebind_client::Operation;
//! use wirebind_testing::*;
//!
//! #[derive(Serialize)]
//! struct GetRecord {
//!     id: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Record {
//!     name: String,
//! }
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.push_json(200, json!({ "name": "Ada" }));
//!
//! let client = test_client(&transport).unwrap();
//! let get_record = client.operation(
//!     Operation::<GetRecord, Record>::builder("GetRecord")
//!         .get("/records/{id}")
//!         .path_label("id")
//!         .build()
//!         .unwrap(),
//! );
//!
//! let record = get_record.call(&GetRecord { id: "r1".into() }).await.unwrap();
//! assert_eq!(record.name, "Ada");
//! assert_eq!(transport.last_request().unwrap().path(), "/records/r1");
//! # });
//! ```

mod fixtures;
mod mock;

pub use fixtures::{
    TEST_BASE_URL, TEST_TOKEN, no_content, page, rate_limited, server_error, test_client,
    test_config,
};
pub use mock::{MockResponse, MockTransport, RecordedRequest};
