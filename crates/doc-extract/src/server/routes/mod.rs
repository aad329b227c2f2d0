//! HTTP routes for the extraction server

pub mod documents;
pub mod events;

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;
use crate::types::{Document, Response};

pub const HEADER_DOCUMENT_ID: &str = "x-document-id";
pub const HEADER_FILE_NAME: &str = "x-file-name";
pub const HEADER_EXTRACT_STATUS: &str = "x-extract-status";
pub const HEADER_JOB_ID: &str = "x-job-id";
pub const HEADER_CONTENT_LENGTH: &str = "x-content-length";

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(documents::create_document))
        .route(
            "/documents/:id",
            get(documents::get_document)
                .head(documents::head_document)
                .put(documents::replace_document)
                .delete(documents::delete_document),
        )
        .route("/documents/:id/submit", post(documents::submit_document))
        .route("/text/:id", get(documents::get_text))
        .route("/presigned", get(documents::presign_new))
        .route("/presigned/:id", get(documents::presign))
        .route("/events/storage", post(events::storage_event))
        .route("/events/notification", post(events::notification))
}

/// Document metadata as response headers; values that are not valid header text are skipped
pub(crate) fn metadata_headers(doc: &Document) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut put = |name: &'static str, value: Option<String>| {
        if let Some(v) = value.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(HeaderName::from_static(name), v);
        }
    };
    put(HEADER_DOCUMENT_ID, doc.identifier().map(str::to_string));
    put(HEADER_FILE_NAME, doc.filename.clone());
    put(HEADER_EXTRACT_STATUS, Some(doc.status.to_string()));
    put(HEADER_JOB_ID, doc.job_id.clone());
    put(HEADER_CONTENT_LENGTH, doc.content_length.map(|l| l.to_string()));
    headers
}

/// Error response for a non-Ok orchestrator response
pub(crate) fn failure(response: Response) -> HttpResponse {
    let status = response.code.http_status();
    match response.error {
        Some(err) => err.into_response(),
        None => status.into_response(),
    }
}
