//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (shared-secret check, CORS, per-request trace id,
//!   panic recovery)
//! - Optional Swagger UI / OpenAPI document (disable with `KIARA_ENABLE_SWAGGER=false`)
//! - Health, ask and chat-log routes under `/api/v1`

mod chat;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::handle_panic;
use crate::middleware::{auth, cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(chat::router());

    let mut app = Router::new().nest("/api/v1", api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Layers added later wrap the earlier ones, so the panic guard is
        // outermost and the token check runs last, after CORS preflight.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::check_internal_token,
        ))
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{Script, TOKEN, TestApp};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use kiara_core::ChatLogStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use tracing_test::traced_test;

    fn reply(text: &str) -> Script {
        Script::Reply(text.into())
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let response = build(app.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn ask_request(body: impl Into<Body>) -> Request<Body> {
        Request::post("/api/v1/ask")
            .header("x-internal-token", TOKEN)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn ask_json(message: &str) -> Request<Body> {
        ask_request(json!({ "message": message }).to_string())
    }

    fn get(path: &str) -> Request<Body> {
        Request::get(path)
            .header("x-internal-token", TOKEN)
            .body(Body::empty())
            .unwrap()
    }

    // ── auth ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn missing_token_is_401() {
        let app = TestApp::new(false, reply("hai")).await;
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn wrong_token_is_401_and_never_reaches_the_model() {
        let app = TestApp::new(false, reply("hai")).await;
        let req = Request::post("/api/v1/ask")
            .header("x-internal-token", "guess")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"message":"halo"}"#))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.generations(), 0);
        assert!(app.store.list_all().await.unwrap().is_empty());
    }

    // ── ask ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ask_returns_cleaned_reply_and_records_it() {
        let app = TestApp::new(false, reply("Halo juga!<|endofanswer|><|user|>lagi")).await;
        let (status, body) = send(&app, ask_json("Halo")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["error"], false);
        assert_eq!(body["message"], "Halo juga!");
        assert_eq!(body["data"], json!([{ "role": "assistant", "content": "Halo juga!" }]));
        assert_eq!(body["logged"], true);

        let log = app.store.list_all().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].question, "Halo");
        assert_eq!(log[0].answer.as_deref(), Some("Halo juga!"));
    }

    #[tokio::test]
    async fn ask_reports_unlogged_exchange_when_the_store_fails() {
        let app = TestApp::new(false, reply("Siap.")).await;
        app.store.close().await;

        let (status, body) = send(&app, ask_json("Tolong")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Siap.");
        assert_eq!(body["logged"], false);
    }

    #[tokio::test]
    #[traced_test]
    async fn generation_failure_is_generic_500_without_log_row() {
        let app = TestApp::new(false, Script::Fail).await;
        let (status, body) = send(&app, ask_json("Halo")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Unhandled Exception");
        assert_eq!(body["data"], json!([]));
        assert!(!body.to_string().contains("model offline"));
        assert!(logs_contain("model offline"));
        assert!(app.store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_backend_is_caught_as_500() {
        let app = TestApp::new(false, Script::Panic).await;
        let (status, body) = send(&app, ask_json("Halo")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "Unhandled Exception");
        assert_eq!(body["error"], true);
    }

    // ── validation ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_message_is_422_with_details_in_development() {
        let app = TestApp::new(false, reply("x")).await;
        let (status, body) = send(&app, ask_json("")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Unprocessable Entity");
        assert!(body["details"]["message"].is_array());
        assert_eq!(app.generations(), 0);
    }

    #[tokio::test]
    async fn blank_and_oversized_messages_are_422() {
        let app = TestApp::new(false, reply("x")).await;

        let (status, body) = send(&app, ask_json("   \n")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["message"][0]["code"], "blank");

        let too_long = "a".repeat(app.state.config.max_message_bytes + 1);
        let (status, body) = send(&app, ask_json(&too_long)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["message"][0]["code"], "length");

        assert_eq!(app.generations(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_422() {
        let app = TestApp::new(false, reply("x")).await;

        let (status, body) = send(&app, ask_request("{not json")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["body"][0]["code"], "invalid_json");

        let (status, _) = send(&app, ask_request(r#"{"text":"halo"}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn production_hides_validation_details() {
        let app = TestApp::new(true, reply("x")).await;
        let (status, body) = send(&app, ask_json("")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
        assert!(body.get("details").is_none());
    }

    // ── logs & health ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn logs_are_listed_oldest_first() {
        let app = TestApp::new(false, reply("ok")).await;
        for question in ["satu", "dua", "tiga"] {
            let (status, _) = send(&app, ask_json(question)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&app, get("/api/v1/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        let questions: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["question"].as_str().unwrap())
            .collect();
        assert_eq!(questions, ["satu", "dua", "tiga"]);
        assert_eq!(body["data"][0]["answer"], "ok");
    }

    #[tokio::test]
    async fn health_with_token_is_ok_and_echoes_trace_id() {
        let app = TestApp::new(false, reply("x")).await;
        let trace_id = "6f1c2a0e-8d1b-4c47-9a53-2f3c1d7e9b10";
        let req = Request::get("/api/v1/health")
            .header("x-internal-token", TOKEN)
            .header("x-trace-id", trace_id)
            .body(Body::empty())
            .unwrap();

        let response = build(app.state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-trace-id"], trace_id);
    }

    #[tokio::test]
    async fn swagger_document_follows_config() {
        let app = TestApp::new(false, reply("x")).await;
        let (status, body) = send(&app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/ask"].is_object());

        let app = TestApp::new(true, reply("x")).await;
        let response = build(app.state.clone())
            .oneshot(get("/api-docs/openapi.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
