//! Behavioral tests for the API client over an in-memory transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use atrium_client::{
    ApiClient, ApiError, ApiRequest, ApiResponse, AuthEvent, TokenProvider, Transport,
    TOKEN_EXPIRED_HEADER,
};

struct MockTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    fn new(responses: Vec<ApiResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Transport("no scripted response".to_string()))
    }
}

fn ok(body: &str) -> ApiResponse {
    ApiResponse {
        status: 200,
        reason: Some("OK".to_string()),
        headers: Vec::new(),
        body: body.to_string(),
    }
}

fn status(code: u16, body: &str) -> ApiResponse {
    ApiResponse {
        status: code,
        reason: None,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

fn client_with(responses: Vec<ApiResponse>) -> (ApiClient, Arc<MockTransport>) {
    let transport = MockTransport::new(responses);
    let client = ApiClient::new(transport.clone(), "https://api.example.test/");
    (client, transport)
}

#[derive(Debug, Deserialize, PartialEq)]
struct Widget {
    id: u32,
    name: String,
}

#[tokio::test]
async fn bearer_token_round_trip() {
    let (client, transport) = client_with(vec![ok("{}"), ok("{}"), ok("{}")]);

    client.get_value("widgets", &[]).await.unwrap();
    client.set_bearer_token("abc").unwrap();
    client.get_value("widgets", &[]).await.unwrap();
    client.clear_bearer_token();
    client.get_value("widgets", &[]).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].header("authorization"), None);
    assert_eq!(requests[1].header("authorization"), Some("Bearer abc"));
    assert_eq!(requests[2].header("authorization"), None);
}

#[tokio::test]
async fn blank_bearer_token_is_rejected() {
    let (client, _) = client_with(vec![]);
    assert_eq!(client.set_bearer_token("   "), Err(ApiError::InvalidToken));
    assert_eq!(client.set_bearer_token(""), Err(ApiError::InvalidToken));
}

#[tokio::test]
async fn token_provider_fills_header_unless_overridden() {
    struct Fixed;
    impl TokenProvider for Fixed {
        fn token(&self) -> Option<String> {
            Some("from-provider".to_string())
        }
    }

    let transport = MockTransport::new(vec![ok("{}"), ok("{}")]);
    let client = ApiClient::new(transport.clone(), "https://api.example.test")
        .with_token_provider(Arc::new(Fixed));

    client.get_value("a", &[]).await.unwrap();
    client.set_bearer_token("override").unwrap();
    client.get_value("a", &[]).await.unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0].header("authorization"),
        Some("Bearer from-provider")
    );
    assert_eq!(requests[1].header("authorization"), Some("Bearer override"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
    let (client, transport) = client_with(vec![
        status(503, ""),
        status(503, ""),
        ok(r#"{"id":1,"name":"w"}"#),
    ]);

    let start = tokio::time::Instant::now();
    let widget: Option<Widget> = client.get("widgets/1", &[], 2).await.unwrap();
    assert_eq!(
        widget,
        Some(Widget {
            id: 1,
            name: "w".to_string()
        })
    );
    assert_eq!(transport.requests().len(), 3);
    // 250ms then 500ms, nothing else awaited under paused time.
    assert_eq!(start.elapsed(), Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_surfaces_the_last_error() {
    let (client, transport) = client_with(vec![status(503, ""), status(503, "")]);
    let err = client.get::<Widget>("widgets/1", &[], 1).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn non_transient_failures_do_not_retry() {
    let (client, transport) = client_with(vec![status(404, "")]);
    let err = client.get::<Widget>("widgets/9", &[], 5).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn structured_error_extracts_message_from_body() {
    let (client, _) = client_with(vec![status(404, r#"{"detail":"not found"}"#)]);
    let err = client.get_value("missing", &[]).await.unwrap_err();
    match err {
        ApiError::Status {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not found");
            assert_eq!(body.as_deref(), Some(r#"{"detail":"not found"}"#));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn structured_error_falls_back_to_reason_phrase() {
    let (client, _) = client_with(vec![status(404, "<html>nope</html>")]);
    let err = client.get_value("missing", &[]).await.unwrap_err();
    match err {
        ApiError::Status { message, .. } => assert_eq!(message, "Not Found"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_fires_the_expiry_signal() {
    let transport = MockTransport::new(vec![ApiResponse {
        status: 401,
        reason: None,
        headers: vec![(TOKEN_EXPIRED_HEADER.to_string(), "true".to_string())],
        body: String::new(),
    }]);
    let client = ApiClient::new(transport, "https://api.example.test");
    let mut signals = client.subscribe();

    let err = client.get::<Widget>("secure", &[], 0).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(signals.try_recv(), Ok(AuthEvent::TokenExpired)));
    assert!(signals.try_recv().is_err());
}

#[tokio::test]
async fn plain_unauthorized_fires_the_unauthorized_signal() {
    let (client, _) = client_with(vec![status(401, "")]);
    let mut signals = client.subscribe();

    let err = client.get_value("secure", &[]).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(signals.try_recv(), Ok(AuthEvent::Unauthorized)));
}

#[tokio::test]
async fn empty_query_values_are_dropped() {
    let (client, transport) = client_with(vec![ok("{}")]);
    client
        .get_value("search", &[("q", "cats"), ("page", ""), ("sort", "asc")])
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0].query,
        vec![
            ("q".to_string(), "cats".to_string()),
            ("sort".to_string(), "asc".to_string())
        ]
    );
    assert_eq!(requests[0].url, "https://api.example.test/search");
    assert_eq!(requests[0].header("accept"), Some("application/json"));
}

#[tokio::test]
async fn empty_success_body_decodes_to_none() {
    let (client, _) = client_with(vec![ok("")]);
    let widget: Option<Widget> = client.get("widgets/1", &[], 0).await.unwrap();
    assert_eq!(widget, None);
}

#[tokio::test]
async fn typed_fields_decode_leniently() {
    let (client, _) = client_with(vec![ok(r#"{"ID":"3","Name":"lamp"}"#)]);
    let widget: Option<Widget> = client.get("widgets/3", &[], 0).await.unwrap();
    assert_eq!(
        widget,
        Some(Widget {
            id: 3,
            name: "lamp".to_string()
        })
    );
}

#[tokio::test]
async fn paged_get_discovers_unknown_envelopes() {
    let (client, _) = client_with(vec![ok(
        r#"{"data":{"results":[{"id":1,"name":"a"},{"id":2,"name":"b"}],"meta":{"total":12}}}"#,
    )]);
    let page = client.get_paged::<Widget>("widgets", &[]).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 12);
}

#[tokio::test]
async fn paged_get_without_any_array_is_no_data() {
    let (client, _) = client_with(vec![ok(r#"{"status":"empty"}"#)]);
    let err = client.get_paged::<Widget>("widgets", &[]).await.unwrap_err();
    assert_eq!(err, ApiError::NoData);
}

#[tokio::test]
async fn post_serializes_body_and_decodes_response() {
    let (client, transport) = client_with(vec![ok(r#"{"id":5,"name":"new"}"#)]);
    let created: Option<Widget> = client
        .post("widgets", &json!({"name": "new"}))
        .await
        .unwrap();
    assert_eq!(created.map(|w| w.id), Some(5));

    let requests = transport.requests();
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"name":"new"}"#));
}

#[tokio::test]
async fn put_failure_is_a_structured_error_without_retry() {
    let (client, transport) = client_with(vec![status(500, "")]);
    let err = client
        .put::<_, Widget>("widgets/5", &json!({"name": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn delete_ignores_the_response_body() {
    let (client, _) = client_with(vec![status(204, "")]);
    client.delete("widgets/5", &[]).await.unwrap();

    let (client, _) = client_with(vec![status(409, r#"{"message":"in use"}"#)]);
    let err = client.delete("widgets/5", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 409: in use");
}

#[tokio::test]
async fn get_text_returns_the_body_verbatim() {
    let (client, _) = client_with(vec![ok("plain text, not json")]);
    let text = client.get_text("blob", &[]).await.unwrap();
    assert_eq!(text.as_deref(), Some("plain text, not json"));

    let (client, _) = client_with(vec![ok("")]);
    assert_eq!(client.get_text("blob", &[]).await.unwrap(), None);
}

#[tokio::test]
async fn get_value_parses_empty_body_as_null() {
    let (client, _) = client_with(vec![ok("")]);
    assert_eq!(
        client.get_value("nothing", &[]).await.unwrap(),
        serde_json::Value::Null
    );
}
