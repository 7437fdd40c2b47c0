//! Retry-loop and extraction tests against a local wiremock server.

mod common;

use common::{closed_port_url, fast_config, fast_policy, png_bytes, setup_tracing, PNG_B64, TEST_KEY};
use edgequake_extract::{
    build_payload, extract, extract_image, extract_to_file, DataType, EndpointClient, ExtractError,
    ExtractionProgressCallback, ImageInput, SchemaField,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn invoice_schema() -> Vec<SchemaField> {
    vec![
        SchemaField::new("InvoiceNumber", DataType::String).description("Invoice identifier"),
        SchemaField::new("Total", DataType::Number),
    ]
}

async fn client_for(server: &MockServer) -> EndpointClient {
    EndpointClient::new(format!("{}/extract", server.uri()), TEST_KEY).unwrap()
}

#[tokio::test]
async fn test_success_sends_bearer_and_payload() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(header("authorization", format!("Bearer {TEST_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"InvoiceNumber": "INV123"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let payload = build_payload(PNG_B64, &invoice_schema());
    let value = client.call_endpoint(&payload, &fast_policy()).await.unwrap();
    assert_eq!(value, json!([{"InvoiceNumber": "INV123"}]));

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["inputs"], PNG_B64);
    assert_eq!(body["parameters"]["schema"][0]["key"], "InvoiceNumber");
    assert_eq!(body["parameters"]["schema"][1]["type"], "Number");
}

#[tokio::test]
async fn test_http_500_is_retried_until_exhausted() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server Error"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &fast_policy())
        .await
        .unwrap_err();

    match &err {
        ExtractError::Http { attempts, status, body } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*status, 500);
            assert_eq!(body, "Server Error");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("after 3 attempts"), "got: {msg}");
    assert!(msg.contains("500 - Server Error"), "got: {msg}");
}

#[tokio::test]
async fn test_timeout_is_retried_until_exhausted() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"a": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut policy = fast_policy();
    policy.timeout = Duration::from_millis(200);

    let err = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Timeout { attempts: 3, .. }), "got {err:?}");
}

#[tokio::test]
async fn test_401_fails_after_single_attempt() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &fast_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Auth { .. }), "got {err:?}");
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"extracted_data": {"Total": 42}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let attempted = client
        .call_endpoint_counted(&build_payload("img", &invoice_schema()), &fast_policy())
        .await
        .unwrap();
    assert_eq!(attempted.attempts, 2);
    assert_eq!(attempted.value, json!({"extracted_data": {"Total": 42}}));
}

#[tokio::test]
async fn test_non_json_body_is_unexpected() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &fast_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Unexpected { attempts: 3, .. }), "got {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_retried_until_exhausted() {
    setup_tracing();
    let client = EndpointClient::new(format!("{}/extract", closed_port_url()), TEST_KEY).unwrap();
    let err = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &fast_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Request { attempts: 3, .. }), "got {err:?}");
    assert!(err.to_string().contains("after 3 attempts"), "got: {err}");
}

#[derive(Default)]
struct Recorder {
    starts: AtomicU32,
    failures: AtomicU32,
    backoffs: AtomicU32,
    successes: AtomicU32,
}

impl ExtractionProgressCallback for Recorder {
    fn on_attempt_start(&self, _attempt: u32, _max: u32) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_attempt_failed(&self, _attempt: u32, _max: u32, _error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
    fn on_backoff(&self, _next: u32, _delay: Duration) {
        self.backoffs.fetch_add(1, Ordering::SeqCst);
    }
    fn on_success(&self, _attempt: u32) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_progress_callback_sees_every_attempt() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let client = client_for(&server).await.with_progress(recorder.clone());
    let _ = client
        .call_endpoint(&build_payload("img", &invoice_schema()), &fast_policy())
        .await;

    assert_eq!(recorder.starts.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.failures.load(Ordering::SeqCst), 3);
    // No sleep after the last attempt.
    assert_eq!(recorder.backoffs.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.successes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extract_local_file() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"predictions": [{"InvoiceNumber": "INV123", "Total": 100.5}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("invoice.png");
    std::fs::write(&image_path, png_bytes()).unwrap();

    let config = fast_config(&format!("{}/extract", server.uri()));
    let output = extract(image_path.to_str().unwrap(), &invoice_schema(), &config)
        .await
        .unwrap();

    assert_eq!(output.fields["InvoiceNumber"], "INV123");
    assert_eq!(output.fields["Total"], 100.5);
    assert_eq!(output.stats.attempts, 1);
    assert_eq!(output.stats.strategy, "candidate_keys");
    assert_eq!(output.stats.schema_fields, 2);

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["inputs"], PNG_B64);
}

#[tokio::test]
async fn test_extract_url_input_is_passed_through() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Name": "John Doe"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = fast_config(&format!("{}/extract", server.uri()));
    let image = ImageInput::Url("https://images.example.com/scan.png".into());
    let output = extract_image(&image, &invoice_schema(), &config).await.unwrap();
    assert_eq!(output.fields["Name"], "John Doe");

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["inputs"], "https://images.example.com/scan.png");
}

#[tokio::test]
async fn test_error_body_is_not_retried() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Model failed"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = fast_config(&format!("{}/extract", server.uri()));
    let image = ImageInput::from_bytes(png_bytes(), "a.png");
    let err = extract_image(&image, &invoice_schema(), &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::Parse { .. }));
    assert!(err.to_string().contains("Model failed"));
}

#[tokio::test]
async fn test_invalid_schema_sends_nothing() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let config = fast_config(&format!("{}/extract", server.uri()));
    let image = ImageInput::from_bytes(png_bytes(), "a.png");
    let schema = vec![
        SchemaField::new("Total", DataType::Number),
        SchemaField::new("Total", DataType::Number),
    ];
    let err = extract_image(&image, &schema, &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::InvalidSchema(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_input_file() {
    setup_tracing();
    let config = fast_config("http://127.0.0.1:9/extract");
    let err = extract("/definitely/not/here.png", &invoice_schema(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::InputNotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_extract_to_file_writes_json() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"InvoiceNumber": "INV9"}])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("invoice.png");
    std::fs::write(&image_path, png_bytes()).unwrap();
    let out_path = dir.path().join("out/result.json");

    let config = fast_config(&format!("{}/extract", server.uri()));
    let stats = extract_to_file(image_path.to_str().unwrap(), &invoice_schema(), &out_path, &config)
        .await
        .unwrap();
    assert_eq!(stats.attempts, 1);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, json!({"InvoiceNumber": "INV9"}));
    assert!(!out_path.with_extension("json.tmp").exists());
}
