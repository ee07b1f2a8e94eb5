//! End-to-end tests of the init/run protocol through the HTTP router

use std::io::{Cursor, Write};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;
use whisk_sdk::prelude::*;
use zip::write::SimpleFileOptions;

use whisk_proxy::runtime::loader::library_file_name;
use whisk_proxy::runtime::{CountingSink, StaticLoader};
use whisk_proxy::{create_router, ActionRuntime, ProxyConfig, RuntimeState};

#[derive(Default)]
struct Action;

impl Action {
    fn echo(&mut self, args: ActionArgs) -> ActionResult {
        Ok(Some(args.value.into_value()))
    }

    fn maybe(&mut self, args: ActionArgs) -> ActionResult {
        if args.param("none").is_some() {
            return Ok(None);
        }
        Ok(Some(json!({"ok": true})))
    }

    fn environment(&mut self, args: ActionArgs) -> ActionResult {
        Ok(Some(json!({
            "process": std::env::var("__OW_ACTIVATIONID").ok(),
            "bindings": args.env.get("__OW_ACTIVATIONID"),
            "init_var": std::env::var("PROTOCOL_TEST_INIT_VAR").ok(),
        })))
    }

    async fn greet(&mut self, args: ActionArgs) -> ActionResult {
        let name = args.require_str("name")?.to_string();
        tokio::task::yield_now().await;
        Ok(Some(json!({"greeting": format!("Hello {}!", name)})))
    }
}

static MODULE: ActionModule = ActionModule {
    name: "protocol_action",
    types: &[ActionType {
        name: "Action",
        constructor: Some(construct::<Action>),
        methods: &[
            blocking_method!("Echo", Object, Action, echo),
            blocking_method!("Maybe", Object, Action, maybe),
            blocking_method!("Environment", Any, Action, environment),
            awaitable_method!("Greet", Object, Action, greet),
        ],
    }],
};

struct Harness {
    app: Router,
    runtime: Arc<ActionRuntime>,
    markers: Arc<CountingSink>,
    _work: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let work = tempfile::tempdir().unwrap();
        let config = ProxyConfig::with_work_dir(work.path());
        let markers = Arc::new(CountingSink::new());
        let loader = StaticLoader::new().with_module("protocol_action", &MODULE);
        let runtime = Arc::new(ActionRuntime::new(&config, Arc::new(loader)).with_log_sink(markers.clone()));
        let app = create_router(Arc::clone(&runtime), &config);

        Self {
            app,
            runtime,
            markers,
            _work: work,
        }
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, body)
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, body) = self.post(uri, body).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn init(&self, main: &str) -> (StatusCode, Vec<u8>) {
        self.post("/init", init_envelope(main, json!({}))).await
    }
}

fn package() -> String {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(library_file_name("protocol_action"), SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"\x7fELF").unwrap();
    let bytes = writer.finish().unwrap().into_inner();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn init_envelope(main: &str, env: Value) -> Value {
    json!({
        "value": {
            "name": "protocol-test",
            "main": main,
            "code": package(),
            "binary": true,
            "env": env,
        }
    })
}

#[tokio::test]
async fn test_exactly_one_init_succeeds() {
    let harness = Harness::new();

    let (status, body) = harness.init("protocol_action::Action::Echo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = harness.init("protocol_action::Action::Maybe").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"error": "Cannot initialize the action more than once."})
    );

    // Still bound to the first entry point
    let (status, body) = harness.post_json("/run", json!({"value": {"none": 1}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"none": 1}));
}

#[tokio::test]
async fn test_run_before_init_always_fails() {
    let harness = Harness::new();

    for body in [json!({"value": {"a": 1}}), json!({}), json!({"value": [1, 2, 3]})] {
        let (status, body) = harness.post_json("/run", body).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"error": "Cannot invoke an uninitialized action."}));
    }
    assert_eq!(harness.runtime.state(), RuntimeState::Uninitialized);
}

#[tokio::test]
async fn test_echo_action() {
    let harness = Harness::new();
    harness.init("protocol_action::Action::Echo").await;

    let (status, body) = harness.post("/run", json!({"value": {"a": 1}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"a":1}"#);
}

#[tokio::test]
async fn test_two_part_main_is_rejected() {
    let harness = Harness::new();

    let (status, body) = harness.post_json("/init", init_envelope("Foo::Bar", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body,
        json!({"error": "main required format is \"Module::Type::Function\"."})
    );
    assert_eq!(harness.runtime.state(), RuntimeState::Uninitialized);
}

#[tokio::test]
async fn test_non_binary_code_is_rejected() {
    let harness = Harness::new();

    let (status, body) = harness
        .post_json(
            "/init",
            json!({"value": {"main": "protocol_action::Action::Echo", "code": "not a zip", "binary": false}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"error": "code must be binary (zip file)."}));
    assert_eq!(harness.runtime.state(), RuntimeState::Uninitialized);
}

#[tokio::test]
async fn test_missing_symbols_have_distinct_errors() {
    let harness = Harness::new();

    let (_, body) = harness.post_json("/init", init_envelope("protocol_action::Nope::Echo", json!({}))).await;
    assert_eq!(body, json!({"error": "Unable to locate requested type (\"Nope\")."}));

    let (_, body) = harness.post_json("/init", init_envelope("protocol_action::Action::Nope", json!({}))).await;
    assert_eq!(body, json!({"error": "Unable to locate requested method (\"Nope\")."}));

    let (_, body) = harness.post_json("/init", init_envelope("missing_module::Action::Echo", json!({}))).await;
    assert_eq!(
        body,
        json!({"error": format!("Unable to locate requested module (\"{}\").", library_file_name("missing_module"))})
    );
}

#[tokio::test]
async fn test_activation_metadata_visible_to_action() {
    let harness = Harness::new();
    let (status, _) = harness
        .post(
            "/init",
            init_envelope("protocol_action::Action::Environment", json!({"PROTOCOL_TEST_INIT_VAR": "from-init"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness
        .post_json("/run", json!({"value": {}, "activationId": "abc123"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["process"], "abc123");
    assert_eq!(body["bindings"], "abc123");
    assert_eq!(body["init_var"], "from-init");
}

#[tokio::test]
async fn test_null_result_then_success() {
    let harness = Harness::new();
    harness.init("protocol_action::Action::Maybe").await;

    let (status, body) = harness.post_json("/run", json!({"value": {"none": true}})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"error": "The action returned null"}));

    let (status, body) = harness.post_json("/run", json!({"value": {}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_awaitable_action_and_action_errors() {
    let harness = Harness::new();
    harness.init("protocol_action::Action::Greet").await;

    let (status, body) = harness.post_json("/run", json!({"value": {"name": "whisk"}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"greeting": "Hello whisk!"}));

    let (status, body) = harness.post_json("/run", json!({"value": {}})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body,
        json!({"error": "Invalid arguments: Missing required string parameter: name"})
    );
}

#[tokio::test]
async fn test_one_marker_per_activation() {
    let harness = Harness::new();

    harness.post("/run", json!({"value": {}})).await;
    assert_eq!(harness.markers.count(), 1);

    harness.post("/init", init_envelope("Foo::Bar", json!({}))).await;
    assert_eq!(harness.markers.count(), 2);

    harness.init("protocol_action::Action::Maybe").await;
    assert_eq!(harness.markers.count(), 2);

    harness.post("/run", json!({"value": {}})).await;
    harness.post("/run", json!({"value": {"none": true}})).await;
    assert_eq!(harness.markers.count(), 4);
}
