//! Submission webhook handlers.

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::application::error::HttpError;
use crate::domain::submissions::SubmissionRef;

use super::HookState;

const SOURCE: &str = "infra::http::hooks";

#[derive(Debug, Deserialize)]
pub struct SubmissionPayload {
    pub form_id: String,
    pub response_id: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    submission: String,
}

/// Validate the payload and run the pipeline in the background.
pub async fn receive_submission(
    State(state): State<HookState>,
    payload: Result<Json<SubmissionPayload>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(payload) = payload.map_err(|rejection| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid submission payload",
            rejection.body_text(),
        )
    })?;
    let reference = SubmissionRef::new(payload.form_id, payload.response_id)?;

    info!(
        target = "bulletin::http::hooks",
        submission = %reference,
        "submission queued"
    );

    let body = Accepted {
        status: "accepted",
        submission: reference.to_string(),
    };
    let trigger = state.trigger.clone();
    tokio::spawn(async move {
        trigger.fire(reference).await;
    });

    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

pub async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Require `Authorization: Bearer <secret>` when a hook secret is configured.
pub async fn require_hook_secret(
    State(state): State<HookState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(secret) = state.secret.as_deref() else {
        return next.run(request).await;
    };

    let presented = extract_bearer(request.headers().get(AUTHORIZATION)).unwrap_or_default();
    if presented.as_bytes().ct_eq(secret.as_bytes()).unwrap_u8() == 0 {
        return HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "missing or invalid hook secret",
        )
        .into_response();
    }

    next.run(request).await
}

fn extract_bearer(header: Option<&HeaderValue>) -> Option<&str> {
    header?.to_str().ok()?.strip_prefix("Bearer ")
}
