//! End-to-end pipeline tests against the router, with a scripted engine.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use plotgpt::llm::{EngineReply, GenerativeEngine};
use plotgpt::render::PLOTLY_CDN;
use plotgpt::server::{app, AppState};

const ORIGINS: &[&str] = &[
    "http://localhost",
    "http://localhost:3000",
    "http://localhost:5173",
];

/// Engine double: returns a scripted outcome and counts invocations, so
/// tests can assert the pipeline stopped before the generation step.
struct ScriptedEngine {
    outcome: Result<EngineReply, String>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn text(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(EngineReply::Text(reply.to_string())),
            calls: AtomicUsize::new(0),
        })
    }

    fn blocked(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(EngineReply::Blocked {
                reason: reason.to_string(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeEngine for ScriptedEngine {
    async fn generate(&self, _instruction: &str) -> Result<EngineReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(reply) => Ok(reply.clone()),
            Err(message) => anyhow::bail!("{message}"),
        }
    }
}

fn test_app(engine: Option<Arc<ScriptedEngine>>) -> Router {
    let engine = engine.map(|e| e as Arc<dyn GenerativeEngine>);
    let origins: Vec<String> = ORIGINS.iter().map(|o| o.to_string()).collect();
    app(AppState { engine }, &origins)
}

async fn post_prompt(router: Router, prompt: &str) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "prompt": prompt }).to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-plot")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request should build");
    let response = router.oneshot(request).await.expect("request should complete");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    let value = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, value)
}

/// A well-formed reply: one fenced scene document whose single surface
/// trace carries an empty name.
const SPHERE_REPLY: &str = r#"Sure, here is the scene:
```json
{
  "u": {"op": "linspace", "start": 0, "stop": 6.2831853, "num": 16},
  "v": {"op": "linspace", "start": 0, "stop": 3.1415927, "num": 9},
  "uu": {"op": "gridx", "u": {"ref": "u"}, "v": {"ref": "v"}},
  "vv": {"op": "gridy", "u": {"ref": "u"}, "v": {"ref": "v"}},
  "x": {"op": "mul", "lhs": {"op": "cos", "of": {"ref": "uu"}}, "rhs": {"op": "sin", "of": {"ref": "vv"}}},
  "y": {"op": "mul", "lhs": {"op": "sin", "of": {"ref": "uu"}}, "rhs": {"op": "sin", "of": {"ref": "vv"}}},
  "z": {"op": "cos", "of": {"ref": "vv"}},
  "fig": {"figure": {"traces": [{"type": "surface", "x": {"ref": "x"}, "y": {"ref": "y"}, "z": {"ref": "z"}, "colorscale": "Blues", "showscale": false, "opacity": 1.0, "name": ""}], "layout": {"title": "Sphere"}}}
}
```
"#;

#[tokio::test]
async fn blue_sphere_round_trip() {
    let engine = ScriptedEngine::text(SPHERE_REPLY);
    let (status, body) = post_prompt(test_app(Some(engine.clone())), "a blue sphere").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.calls(), 1);

    let html = body["html"].as_str().expect("html field");
    assert!(!html.is_empty());
    assert!(html.contains(PLOTLY_CDN));
    // The empty-named trace got its deterministic placeholder.
    assert!(html.contains("Trace 1"));
    // Reduced toolbar: the embedded config lists the dropped controls.
    assert!(html.contains("modeBarButtonsToRemove"));
    assert!(html.contains("lasso2d"));
    assert!(html.contains("select2d"));

    let code = body["code"].as_str().expect("code field");
    assert!(code.starts_with('{') && code.ends_with('}'));
    assert!(code.contains("\"fig\""));
    assert_eq!(body["code_type"], "json");
}

#[tokio::test]
async fn blocked_generation_surfaces_the_reason_code() {
    let engine = ScriptedEngine::blocked("SAFETY");
    let (status, body) = post_prompt(test_app(Some(engine)), "something disallowed").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("SAFETY"));
}

#[tokio::test]
async fn reply_without_fence_is_a_no_code_failure() {
    let engine = ScriptedEngine::text("I would rather describe the sphere in prose.");
    let (status, body) = post_prompt(test_app(Some(engine)), "a sphere").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("no valid code"));
}

#[tokio::test]
async fn evaluation_fault_is_a_500_with_the_message() {
    let reply = "```json\n{\"fig\": {\"ref\": \"missing\"}}\n```";
    let engine = ScriptedEngine::text(reply);
    let (status, body) = post_prompt(test_app(Some(engine)), "a sphere").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("missing"));
}

#[tokio::test]
async fn document_without_fig_is_an_invalid_artifact_not_a_fault() {
    let reply = "```json\n{\"radius\": 2}\n```";
    let engine = ScriptedEngine::text(reply);
    let (status, body) = post_prompt(test_app(Some(engine)), "a sphere").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("valid chart"));
}

#[tokio::test]
async fn engine_transport_failure_is_a_generic_500() {
    let engine = ScriptedEngine::failing("connection reset by peer");
    let (status, body) = post_prompt(test_app(Some(engine)), "a sphere").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("engine request failed"));
}

#[tokio::test]
async fn empty_prompt_never_reaches_the_engine() {
    let engine = ScriptedEngine::text(SPHERE_REPLY);
    let (status, _) = post_prompt(test_app(Some(engine.clone())), "   ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn unconfigured_engine_fails_fast() {
    let (status, body) = post_prompt(test_app(None), "a sphere").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().expect("detail field");
    assert!(detail.contains("not configured"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");
    let response = test_app(None)
        .oneshot(request)
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn allowed_origin_is_echoed_back() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .expect("request should build");
    let response = test_app(None)
        .oneshot(request)
        .await
        .expect("request should complete");

    let allow_origin = response
        .headers()
        .get("access-control-allow-origin")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(allow_origin, "http://localhost:5173");
    let allow_credentials = response
        .headers()
        .get("access-control-allow-credentials")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(allow_credentials, "true");
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_grant() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .expect("request should build");
    let response = test_app(None)
        .oneshot(request)
        .await
        .expect("request should complete");

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
