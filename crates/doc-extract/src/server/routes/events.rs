//! Inbound event endpoints

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use serde::Serialize;

use crate::adapters::{notification, storage_event};
use crate::error::Error;
use crate::server::state::AppState;
use crate::types::Response;

#[derive(Debug, Serialize)]
pub struct DispatchSummary {
    pub processed: usize,
    pub failed: usize,
}

fn summarize(result: crate::error::Result<Vec<Response>>) -> HttpResponse {
    match result {
        Ok(responses) => {
            let failed = responses.iter().filter(|r| !r.is_ok()).count();
            Json(DispatchSummary {
                processed: responses.len(),
                failed,
            })
            .into_response()
        }
        Err(Error::Json(e)) => {
            Error::invalid("Invalid event payload", "body", &e.to_string()).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// POST /events/storage - Object-created events
pub async fn storage_event(State(state): State<AppState>, body: Bytes) -> HttpResponse {
    summarize(storage_event::dispatch(state.orchestrator(), &body).await)
}

/// POST /events/notification - OCR job completion
pub async fn notification(State(state): State<AppState>, body: Bytes) -> HttpResponse {
    summarize(notification::dispatch(state.orchestrator(), &body).await)
}
