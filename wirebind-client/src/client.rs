//! API client and per-operation clients.

use std::sync::{Arc, OnceLock};

use http::header::{AUTHORIZATION, HeaderName, HeaderValue, USER_AGENT};
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{BuildError, ConstructionError, Result};
use crate::failure::Outcome;
use crate::operation::Operation;
use crate::request::{HttpRequest, RequestBuilder};
use crate::response::ResponseDecoder;
use crate::retry::{RetryPolicy, with_retry};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

/// Everything shared read-only by the operation clients of one API.
struct ClientContext {
    base_url: Url,
    headers: HeaderMap,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
}

/// Client for one API endpoint.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct ApiClient {
    context: Arc<ClientContext>,
}

impl ApiClient {
    /// Create a client sending requests through `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Create a client sending requests through the given transport.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|source| {
            ConstructionError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            }
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let invalid = || ConstructionError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.append(header_name, header_value);
        }

        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|_| {
            ConstructionError::InvalidHeader {
                name: USER_AGENT.to_string(),
            }
        })?;
        headers.insert(USER_AGENT, user_agent);

        if let Some(credential) = &config.credential {
            let value = credential
                .header_value()
                .ok_or_else(|| ConstructionError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                })?;
            headers.insert(AUTHORIZATION, value);
        }

        debug!(base_url = %base_url, "Created API client");

        Ok(Self {
            context: Arc::new(ClientContext {
                base_url,
                headers,
                retry: config.retry,
                transport: Arc::new(transport),
            }),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.context.base_url
    }

    /// Get the client-wide default retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.context.retry
    }

    /// Bind an operation to this client.
    pub fn operation<I, O>(&self, operation: Operation<I, O>) -> OperationClient<I, O> {
        OperationClient {
            operation: Arc::new(operation),
            context: self.context.clone(),
            compiled: Arc::new(OnceLock::new()),
            retry: None,
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.context.base_url.as_str())
            .field("retry", &self.context.retry)
            .finish_non_exhaustive()
    }
}

struct Compiled<O> {
    request: RequestBuilder,
    response: ResponseDecoder<O>,
}

/// A callable bound to one operation.
///
/// The request builder and response decoder are compiled on the first call
/// and shared by all clones.
pub struct OperationClient<I, O> {
    operation: Arc<Operation<I, O>>,
    context: Arc<ClientContext>,
    compiled: Arc<OnceLock<Compiled<O>>>,
    retry: Option<RetryPolicy>,
}

impl<I, O> Clone for OperationClient<I, O> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            context: self.context.clone(),
            compiled: self.compiled.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<I, O> OperationClient<I, O> {
    /// Get the operation.
    pub fn operation(&self) -> &Operation<I, O> {
        &self.operation
    }

    /// Retry with this policy instead of the client-wide default.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Never retry.
    pub fn without_retry(self) -> Self {
        self.with_retry(RetryPolicy::never())
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.as_ref().unwrap_or(&self.context.retry)
    }
}

impl<I, O> OperationClient<I, O>
where
    I: Serialize,
    O: DeserializeOwned,
{
    fn compiled(&self) -> &Compiled<O> {
        self.compiled.get_or_init(|| Compiled {
            request: RequestBuilder::compile(&self.operation),
            response: ResponseDecoder::compile(&self.operation),
        })
    }

    /// Render an input into the relative request, without sending it.
    pub fn build_request(&self, input: &I) -> Outcome<HttpRequest> {
        Ok(self.compiled().request.build(input)?)
    }

    /// Render an input into the request that would go on the wire.
    pub fn prepare(&self, input: &I) -> Outcome<TransportRequest> {
        let request = self.build_request(input)?;
        Ok(self.resolve(request)?)
    }

    fn resolve(&self, request: HttpRequest) -> std::result::Result<TransportRequest, BuildError> {
        let raw = format!(
            "{}{}",
            self.context.base_url.as_str().trim_end_matches('/'),
            request.path
        );
        let mut url = Url::parse(&raw).map_err(|source| BuildError::InvalidUrl { url: raw, source })?;
        if !request.query.is_empty() {
            url.set_query(Some(&request.query_string()));
        }

        let mut headers = self.context.headers.clone();
        headers.extend(request.headers);

        Ok(TransportRequest {
            method: request.method,
            url,
            headers,
            body: request.body,
        })
    }

    /// Invoke the operation, retrying per the policy in effect.
    ///
    /// The request is built once and re-sent unchanged on every attempt.
    pub async fn call(&self, input: &I) -> Outcome<O> {
        let request = self.prepare(input)?;
        with_retry(self.retry_policy(), || self.send(request.clone())).await
    }

    /// Invoke the operation exactly once.
    pub async fn call_once(&self, input: &I) -> Outcome<O> {
        let request = self.prepare(input)?;
        self.send(request).await
    }

    async fn send(&self, request: TransportRequest) -> Outcome<O> {
        debug!(
            operation = self.operation.name(),
            method = %request.method,
            url = %request.url,
            "Sending request"
        );

        let response = self.context.transport.send(request).await?;
        debug!(
            operation = self.operation.name(),
            status = response.status.as_u16(),
            "Received response"
        );

        self.compiled().response.classify(response).await
    }
}

impl<I, O> std::fmt::Debug for OperationClient<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationClient")
            .field("operation", &self.operation.name())
            .field("compiled", &self.compiled.get().is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
