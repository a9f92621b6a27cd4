//! Response fixtures and a preconfigured client.

use serde_json::{Value, json};
use wirebind_client::{ApiClient, ClientConfig, Result};

use crate::mock::{MockResponse, MockTransport};

/// Base URL used by [`test_client`].
pub const TEST_BASE_URL: &str = "https://api.test";

/// Bearer token used by [`test_client`].
pub const TEST_TOKEN: &str = "test-token";

/// Client configuration pointing at [`TEST_BASE_URL`] with [`TEST_TOKEN`].
pub fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .base_url(TEST_BASE_URL)
        .bearer_token(TEST_TOKEN)
        .build()
}

/// An [`ApiClient`] sending through `transport`.
pub fn test_client(transport: &MockTransport) -> Result<ApiClient> {
    ApiClient::with_transport(test_config(), transport.clone())
}

/// `429` with a `Retry-After` header.
pub fn rate_limited(retry_after_secs: u64) -> MockResponse {
    MockResponse::json(429, json!({ "message": "Rate limit exceeded" }))
        .header("retry-after", &retry_after_secs.to_string())
}

/// `5xx` with a generic message.
pub fn server_error(status: u16) -> MockResponse {
    MockResponse::json(status, json!({ "message": "Internal server error" }))
}

/// `204` with an empty body.
pub fn no_content() -> MockResponse {
    MockResponse::new(204)
}

/// A list page in the `{ data, next }` layout.
pub fn page(items: Vec<Value>, next: Option<&str>) -> MockResponse {
    MockResponse::json(200, json!({ "data": items, "next": next }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        let client = test_client(&MockTransport::new()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.test/");
    }
}
