//! Request handlers.

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, State},
    http::{HeaderMap, StatusCode},
    response::{Html, Response},
    Form,
};
use serde::Deserialize;
use serde_json::Value;

use crate::http::response::{self, GENERIC_FAILURE, INVALID_BODY, NAME_REQUIRED};
use crate::http::server::AppState;
use crate::http::X_REQUEST_ID;
use crate::workflow::{workflow_id, GetAddressFromIp, StartWorkflowOptions, WorkflowError};

/// Prefix of ids given to address workflows.
pub const WORKFLOW_ID_PREFIX: &str = "getAddressFromIP";

#[derive(Debug, Default, Deserialize)]
pub struct LocateRequest {
    #[serde(default)]
    pub name: String,
}

/// `POST /submit`: form field `name`, HTML fragment response.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<LocateRequest>, FormRejection>,
) -> Html<String> {
    let name = form.map(|Form(f)| f.name).unwrap_or_default();
    let name = name.trim();
    if name.is_empty() {
        return response::html_error(NAME_REQUIRED);
    }

    match locate(&state, &headers, name).await {
        Ok(result) => response::html_success(&result),
        Err(_) => response::html_error(&format!("Error: {GENERIC_FAILURE}")),
    }
}

/// `POST /api`: JSON `{"name": ...}`, JSON response.
pub async fn api(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: LocateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected API request body");
            return response::json_error(StatusCode::BAD_REQUEST, INVALID_BODY);
        }
    };

    let name = request.name.trim();
    if name.is_empty() {
        return response::json_error(StatusCode::BAD_REQUEST, NAME_REQUIRED);
    }

    match locate(&state, &headers, name).await {
        Ok(result) => response::json_result(&result),
        Err(_) => response::json_error(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE),
    }
}

/// Run the address workflow for `name`. Failures are logged here in full.
async fn locate(state: &AppState, headers: &HeaderMap, name: &str) -> Result<String, WorkflowError> {
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let options = StartWorkflowOptions::new(workflow_id(WORKFLOW_ID_PREFIX), state.workflows.task_queue());
    let id = options.id.clone();

    let result = state
        .workflows
        .execute_workflow(options, GetAddressFromIp::NAME, Value::String(name.to_string()))
        .await;

    match result {
        Ok(Value::String(greeting)) => Ok(greeting),
        Ok(other) => Ok(other.to_string()),
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                workflow_id = %id,
                error = %err,
                "Address workflow failed"
            );
            Err(err)
        }
    }
}
