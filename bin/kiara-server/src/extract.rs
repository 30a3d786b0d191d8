//! Request extractors.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::extract::rejection::JsonRejection;
use serde::de::DeserializeOwned;
use serde_json::json;
use validator::Validate;

use crate::error::ServerError;
use crate::state::AppState;

/// JSON body that is deserialized and then checked with [`Validate`].
///
/// Both a malformed body and a failed rule produce a 422 with the same
/// envelope; field details are attached outside production only.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let production = state.config.production;

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                let details = json!({
                    "body": [{ "code": "invalid_json", "message": rejection.body_text() }]
                });
                ServerError::validation(details, production)
            })?;

        value.validate().map_err(|errors| {
            ServerError::validation(json!(errors), production)
        })?;

        Ok(Self(value))
    }
}
