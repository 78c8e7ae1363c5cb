use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pipeline_trigger::client::PipelineClient;
use pipeline_trigger::error::TriggerError;
use pipeline_trigger::registry::ConfigRegistry;
use pipeline_trigger::trigger::TriggerRequestBuilder;
use pipeline_trigger::{AppState, TriggerConfig, app};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "glptt-test-token-1234";
const TRIGGER_PATH: &str = "/api/v4/projects/1/trigger/pipeline";

fn state_for(endpoint_url: String) -> Arc<AppState> {
    let config = TriggerConfig {
        endpoint_url,
        git_ref: "main".to_string(),
        ..TriggerConfig::default()
    };
    Arc::new(AppState::new(config, SecretString::from(TOKEN.to_string())).unwrap())
}

async fn call(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_trigger(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submit_sends_form_fields_and_reads_pipeline_url() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(format!("token={TOKEN}")))
        .and(body_string_contains("ref=main"))
        .and(body_string_contains("variables%5BREPO_NAME%5D=cosmos-transfer1"))
        .and(body_string_contains("variables%5BPR_NUMBER%5D=42"))
        .and(body_string_contains("variables%5BCLONE_METHOD%5D=https"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 7,
            "web_url": "https://x/y"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = ConfigRegistry::builtin();
    let payload = TriggerRequestBuilder::new(registry)
        .build_payload(
            "cosmos-transfer1",
            &HashMap::from([("PR_NUMBER".to_string(), "42".to_string())]),
            TOKEN,
            "main",
        )
        .unwrap();

    let client = PipelineClient::new(None).unwrap();
    let result = client
        .submit(&payload, &format!("{}{}", mock_server.uri(), TRIGGER_PATH))
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(result.status_code, 201);
    assert_eq!(result.pipeline_url.as_deref(), Some("https://x/y"));
}

#[tokio::test]
async fn submit_reports_rejection_with_raw_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let payload = TriggerRequestBuilder::new(ConfigRegistry::builtin())
        .build_payload("cosmos-predict1", &HashMap::new(), TOKEN, "main")
        .unwrap();
    let result = PipelineClient::new(None)
        .unwrap()
        .submit(&payload, &format!("{}{}", mock_server.uri(), TRIGGER_PATH))
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert!(result.pipeline_url.is_none());
    assert_eq!(result.status_code, 403);
    assert_eq!(result.raw_body, "forbidden");
}

#[tokio::test]
async fn submit_surfaces_transport_errors() {
    // Bind then drop a listener so the port is closed
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let payload = TriggerRequestBuilder::new(ConfigRegistry::builtin())
        .build_payload("cosmos-predict2", &HashMap::new(), TOKEN, "main")
        .unwrap();
    let err = PipelineClient::new(None)
        .unwrap()
        .submit(&payload, &format!("http://{addr}{TRIGGER_PATH}"))
        .await
        .unwrap_err();

    assert!(matches!(err, TriggerError::Transport(_)));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn list_repos_in_declared_order() {
    let (status, body) = call(state_for("http://unused".into()), get("/api/repos")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["repos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["cosmos-transfer1", "cosmos-predict1", "cosmos-predict2"]);
    assert_eq!(body["ref"], "main");
}

#[tokio::test]
async fn get_repo_returns_form_fields() {
    let (status, body) = call(
        state_for("http://unused".into()),
        get("/api/repos/cosmos-transfer1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let vars = body["variables"].as_array().unwrap();
    assert_eq!(vars.len(), 4);
    assert_eq!(vars[0]["name"], "PR_NUMBER");
    assert!(vars[0]["options"].is_null());
    assert_eq!(vars[1]["default_value"], "https");
    assert_eq!(vars[1]["options"], json!(["ssh", "https", "https-with-token"]));

    let (status, _) = call(state_for("http://unused".into()), get("/api/repos/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trigger_endpoint_returns_masked_payload_and_link() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER_PATH))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "web_url": "https://x/y" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = state_for(format!("{}{}", mock_server.uri(), TRIGGER_PATH));
    let (status, body) = call(
        state,
        post_trigger(
            "/api/trigger",
            json!({ "repo_id": "cosmos-predict2", "values": { "DUMMY_VARIABLE3": "slow" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], true);
    assert_eq!(body["result"]["pipeline_url"], "https://x/y");
    assert_eq!(body["payload"]["token"], "****MASKED****");
    assert_eq!(body["payload"]["variables[REPO_NAME]"], "cosmos-predict2");
    assert_eq!(body["payload"]["variables[DUMMY_VARIABLE3]"], "slow");
    assert_eq!(body["payload"]["variables[DUMMY_VARIABLE4]"], "true");
    assert!(!body.to_string().contains(TOKEN));
}

#[tokio::test]
async fn trigger_endpoint_reports_rejection() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("{\"message\":\"bad ref\"}"))
        .mount(&mock_server)
        .await;

    let state = state_for(format!("{}{}", mock_server.uri(), TRIGGER_PATH));
    let (status, body) = call(
        state,
        post_trigger("/api/trigger", json!({ "repo_id": "cosmos-predict1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["succeeded"], false);
    assert_eq!(body["result"]["status_code"], 400);
    assert_eq!(body["result"]["raw_body"], "{\"message\":\"bad ref\"}");
    assert!(!body.to_string().contains(TOKEN));
}

#[tokio::test]
async fn dry_run_makes_no_network_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = state_for(format!("{}{}", mock_server.uri(), TRIGGER_PATH));
    let (status, body) = call(
        state,
        post_trigger(
            "/api/trigger?dry_run=true",
            json!({ "repo_id": "cosmos-transfer1", "values": {} }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["payload"]["variables[PR_NUMBER]"], "-1");
    assert_eq!(body["payload"]["token"], "****MASKED****");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dry_run_is_not_blocked_by_slow_submission() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "web_url": "https://x/y" }))
                .set_delay(Duration::from_secs(4)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = state_for(format!("{}{}", mock_server.uri(), TRIGGER_PATH));
    let slow = tokio::spawn(call(
        state.clone(),
        post_trigger("/api/trigger", json!({ "repo_id": "cosmos-transfer1" })),
    ));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let (status, body) = call(
        state,
        post_trigger(
            "/api/trigger?dry_run=true",
            json!({ "repo_id": "cosmos-predict1" }),
        ),
    )
    .await;
    let waited = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert!(waited < Duration::from_secs(1), "dry run waited {waited:?}");

    let (status, body) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], true);
}

#[tokio::test]
async fn unknown_repo_is_rejected_without_network_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = state_for(format!("{}{}", mock_server.uri(), TRIGGER_PATH));
    let (status, body) = call(
        state,
        post_trigger("/api/trigger", json!({ "repo_id": "cosmos-reason1" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["succeeded"], false);
    assert!(body["error"].as_str().unwrap().contains("cosmos-reason1"));
}

#[tokio::test]
async fn strict_mode_rejects_values_outside_options() {
    let config = TriggerConfig {
        endpoint_url: "http://unused".to_string(),
        strict_options: true,
        ..TriggerConfig::default()
    };
    let state = Arc::new(AppState::new(config, SecretString::from(TOKEN.to_string())).unwrap());
    let (status, body) = call(
        state,
        post_trigger(
            "/api/trigger",
            json!({ "repo_id": "cosmos-transfer1", "values": { "CLONE_METHOD": "ftp" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("CLONE_METHOD"));
}

#[tokio::test]
async fn health_and_ui_are_served() {
    let (status, body) = call(state_for("http://unused".into()), get("/health?format=json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["total_repos"], 3);

    let response = app(state_for("http://unused".into()))
        .oneshot(get("/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/html");
}
