//! Pipeline trigger endpoint

use axum::{
    Json,
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::SharedState;
use crate::error::TriggerError;
use crate::trigger::{TriggerRequestBuilder, redact_for_display};

/// Body posted by the form
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub repo_id: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

fn status_for(err: &TriggerError) -> StatusCode {
    match err {
        TriggerError::UnknownRepo(_) => StatusCode::NOT_FOUND,
        TriggerError::InvalidOption { .. } | TriggerError::UnknownVariable { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TriggerError::Transport(_) | TriggerError::RemoteRejection { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(submission_id: &str, err: &TriggerError, payload: Option<Value>) -> Response {
    (
        status_for(err),
        Json(json!({
            "submission_id": submission_id,
            "succeeded": false,
            "error": err.to_string(),
            "payload": payload,
        })),
    )
        .into_response()
}

/// POST /api/trigger - Build the payload and send it to the pipeline endpoint
/// `?dry_run=true` returns the masked payload without sending anything
pub async fn trigger_pipeline(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    Json(request): Json<TriggerRequest>,
) -> Response {
    let dry_run = params.get("dry_run").map(|v| v == "true").unwrap_or(false);
    let submission_id = Uuid::now_v7().to_string();

    let builder =
        TriggerRequestBuilder::new(&state.registry).with_policy(state.config.option_policy());
    let payload = match builder.build_payload(
        &request.repo_id,
        &request.values,
        state.secret_token.expose_secret(),
        &state.config.git_ref,
    ) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Submission {} rejected: {}", submission_id, e);
            return error_response(&submission_id, &e, None);
        }
    };

    let masked = Value::Object(redact_for_display(&payload));
    info!("Submission {} payload: {}", submission_id, masked);

    if dry_run {
        info!("[DRY_RUN] Submission {} not sent", submission_id);
        return Json(json!({
            "submission_id": submission_id,
            "dry_run": true,
            "payload": masked,
        }))
        .into_response();
    }

    match state
        .client
        .submit(&payload, &state.config.endpoint_url)
        .await
    {
        Ok(result) if result.succeeded => Json(json!({
            "submission_id": submission_id,
            "succeeded": true,
            "payload": masked,
            "result": result,
        }))
        .into_response(),
        Ok(result) => {
            let body = json!({
                "submission_id": submission_id,
                "succeeded": false,
                "payload": masked,
                "result": result,
            });
            if let Err(e) = result.error_for_status() {
                error!("Submission {} failed: {}", submission_id, e);
            }
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
        Err(e) => {
            error!("Submission {} failed: {}", submission_id, e);
            error_response(&submission_id, &e, Some(masked))
        }
    }
}
