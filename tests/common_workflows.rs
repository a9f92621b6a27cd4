//! Integration tests for common wirebind workflows.
//!
//! Two APIs with different conventions are driven through the same runtime:
//! a CRM-style API (records under objects, offset-paginated lists, a declared
//! conflict error) and a deployment API (raw payload bodies, header-bound
//! fields, nested error messages).

use std::time::Duration;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wirebind::prelude::*;
use wirebind::{ClientConfig, tags};
use wirebind_testing::{MockResponse, MockTransport, no_content, page, rate_limited, test_client};

// =============================================================================
// CRM API
// =============================================================================

#[derive(Debug, Clone, Serialize)]
struct ListRecords {
    object: String,
    limit: Option<u32>,
    offset: Option<u64>,
}

impl PageRequest for ListRecords {
    fn with_offset(&self, offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    data: Vec<Record>,
    next: Option<String>,
}

impl Page for RecordPage {
    type Item = Record;

    fn next_link(&self) -> Option<&str> {
        self.next.as_deref()
    }

    fn into_items(self) -> Vec<Record> {
        self.data
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Record {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct CreateRecord {
    object: String,
    name: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Conflict {
    message: String,
    existing_id: String,
}

#[derive(Serialize)]
struct DeleteRecord {
    object: String,
    record_id: String,
}

fn crm(transport: &MockTransport) -> ApiClient {
    test_client(transport).unwrap()
}

#[tokio::test]
async fn test_crm_create_and_conflict() {
    let transport = MockTransport::new();
    transport
        .push_json(201, json!({ "id": "rec_1", "name": "Ada" }))
        .push_json(409, json!({ "message": "Record exists", "existing_id": "rec_1" }));

    let create = crm(&transport).operation(
        Operation::<CreateRecord, Record>::builder("CreateRecord")
            .post("/v2/objects/{object}/records")
            .path_label("object")
            .error(ErrorShape::new::<Conflict>("ConflictError").status(409))
            .build()
            .unwrap(),
    );

    let input = CreateRecord {
        object: "people".into(),
        name: "Ada".into(),
        email: None,
    };
    let record = create.call(&input).await.unwrap();
    assert_eq!(record.id, "rec_1");

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path(), "/v2/objects/people/records");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.body_json(), Some(json!({ "name": "Ada" })));

    let failure = create.call(&input).await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Api);
    assert_eq!(failure.tag(), "ConflictError");
    assert_eq!(failure.code(), Some("409"));
    let conflict = failure.details_as::<Conflict>().unwrap();
    assert_eq!(conflict.existing_id, "rec_1");
    assert_eq!(conflict.message, "Record exists");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_crm_delete_is_bodyless() {
    let transport = MockTransport::new();
    transport.push_response(no_content());

    let delete = crm(&transport).operation(
        Operation::<DeleteRecord, EmptyOutput>::builder("DeleteRecord")
            .delete("/v2/objects/{object}/records/{record_id}")
            .path_label("object")
            .path_label("record_id")
            .build()
            .unwrap(),
    );

    delete
        .call(&DeleteRecord {
            object: "people".into(),
            record_id: "rec 1/a".into(),
        })
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.url.path(), "/v2/objects/people/records/rec%201%2Fa");
    assert!(request.body.is_none());
    assert!(request.header("content-type").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_crm_paginated_listing_with_throttling() {
    let transport = MockTransport::new();
    transport
        .push_response(page(
            vec![json!({ "id": "a" }), json!({ "id": "b" })],
            Some("https://api.test/v2/objects/people/records?limit=2&offset=2"),
        ))
        .push_response(rate_limited(3))
        .push_response(page(vec![json!({ "id": "c" })], None));

    let list = crm(&transport).operation(
        Operation::<ListRecords, RecordPage>::builder("ListRecords")
            .get("/v2/objects/{object}/records")
            .path_label("object")
            .query("limit")
            .query("offset")
            .paginated(PaginationConfig::default())
            .build()
            .unwrap(),
    );

    let records: Vec<Record> = list
        .items(ListRecords {
            object: "people".into(),
            limit: Some(2),
            offset: None,
        })
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].query("offset").as_deref(), Some("2"));
    assert_eq!(requests[1].url, requests[2].url);
    assert!(requests[2].sent_at - requests[1].sent_at >= Duration::from_secs(3));
}

// =============================================================================
// Deployment API
// =============================================================================

#[derive(Debug, Serialize)]
struct Manifest {
    image: String,
    replicas: u32,
    labels: Option<Vec<String>>,
}

#[derive(Serialize)]
struct Deploy {
    project: String,
    idempotency_key: String,
    dry_run: Option<bool>,
    manifest: Manifest,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct QuotaExceeded {
    #[allow(dead_code)]
    quota: String,
}

fn deploy_op() -> Operation<Deploy, Deployment> {
    Operation::builder("Deploy")
        .post("/projects/{project}/deployments")
        .path_label("project")
        .header("idempotency_key", "Idempotency-Key")
        .query_as("dry_run", "dryRun")
        .payload("manifest")
        .error(ErrorShape::new::<QuotaExceeded>("QuotaExceededError").category(Category::Throttling))
        .build()
        .unwrap()
}

fn deploy_input() -> Deploy {
    Deploy {
        project: "web".into(),
        idempotency_key: "key-1".into(),
        dry_run: Some(true),
        manifest: Manifest {
            image: "web:1.2".into(),
            replicas: 3,
            labels: None,
        },
    }
}

fn deploy_client(transport: &MockTransport) -> ApiClient {
    let config = ClientConfig::builder()
        .base_url("https://deploy.test/api/")
        .bearer_token("deploy-token")
        .default_header("X-Client", "workflow-tests")
        .build();
    ApiClient::with_transport(config, transport.clone()).unwrap()
}

#[tokio::test]
async fn test_deploy_payload_header_and_query() {
    let transport = MockTransport::new();
    transport.push_json(202, json!({ "id": "dep_1", "status": "queued" }));

    let deploy = deploy_client(&transport).operation(deploy_op());
    let deployment = deploy.call(&deploy_input()).await.unwrap();
    assert_eq!(deployment.id, "dep_1");
    assert_eq!(deployment.status, "queued");

    let request = transport.last_request().unwrap();
    assert_eq!(request.url.as_str(), "https://deploy.test/api/projects/web/deployments?dryRun=true");
    assert_eq!(request.header("idempotency-key"), Some("key-1"));
    assert_eq!(request.header("authorization"), Some("Bearer deploy-token"));
    assert_eq!(request.header("x-client"), Some("workflow-tests"));
    assert_eq!(
        request.body_json(),
        Some(json!({ "image": "web:1.2", "replicas": 3 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_deploy_declared_throttling_shape_is_retried() {
    let transport = MockTransport::new();
    transport
        .push_json(403, json!({ "quota": "deployments", "error": { "message": "Quota exceeded" } }))
        .push_json(202, json!({ "id": "dep_2", "status": "queued" }));

    let deploy = deploy_client(&transport).operation(deploy_op());
    let deployment = deploy.call(&deploy_input()).await.unwrap();

    assert_eq!(deployment.id, "dep_2");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_deploy_unmatched_errors_are_generic() {
    let transport = MockTransport::new();
    transport
        .push_json(401, json!({ "error": { "message": "Token expired" } }))
        .push_response(MockResponse::new(400).body("not json"));

    let deploy = deploy_client(&transport).operation(deploy_op());

    let failure = deploy.call(&deploy_input()).await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::UnknownApi);
    assert_eq!(failure.tag(), tags::AUTHENTICATION);
    assert!(failure.has_category(Category::Auth));
    assert_eq!(failure.message(), "Token expired");

    let failure = deploy.call(&deploy_input()).await.unwrap_err();
    assert_eq!(failure.code(), Some("400"));
    assert_eq!(failure.message(), "Unknown error");
    assert_eq!(failure.raw_body(), Some("not json"));
    assert_eq!(transport.call_count(), 2);
}
