//! Shared-secret check for every request.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ServerError;
use crate::state::AppState;

pub static X_INTERNAL_TOKEN: &str = "x-internal-token";

/// Rejects the request with 401 unless `X-Internal-Token` matches the
/// configured secret.
pub async fn check_internal_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get(X_INTERNAL_TOKEN)
        .and_then(|v| v.to_str().ok());
    // `ct_eq` on slices of different length is false without a byte scan.
    let authorized = provided.is_some_and(|token| {
        token
            .as_bytes()
            .ct_eq(state.config.internal_token.as_bytes())
            .into()
    });

    if !authorized {
        warn!(
            path = %req.uri().path(),
            token_present = provided.is_some(),
            "rejected request with bad internal token"
        );
        return ServerError::Unauthorized.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod test {
    use crate::routes;
    use crate::test_support::{Script, TOKEN, TestApp};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn status_with_token(token: &str) -> StatusCode {
        let app = TestApp::new(false, Script::Reply("ok".into())).await;
        let req = Request::get("/api/v1/health")
            .header(super::X_INTERNAL_TOKEN, token)
            .body(Body::empty())
            .unwrap();
        routes::build(app.state.clone()).oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn equal_tokens_match() {
        assert_eq!(status_with_token(TOKEN).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn different_tokens_do_not_match() {
        let mut flipped = TOKEN.to_owned();
        flipped.replace_range(..1, "T");
        assert_eq!(status_with_token(&flipped).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with_token(&format!("{TOKEN}!")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with_token(&TOKEN[..TOKEN.len() - 1]).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with_token("").await, StatusCode::UNAUTHORIZED);
    }
}
