//! Document API endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use futures::TryStreamExt;
use http_body_util::LengthLimitError;
use serde::Serialize;

use super::{failure, metadata_headers, HEADER_DOCUMENT_ID, HEADER_FILE_NAME};
use crate::error::Error;
use crate::server::state::AppState;
use crate::types::{Document, Method, Request, Response};

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// Whether a body read failed because the request body limit was reached
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn upload_error(err: axum::Error) -> std::io::Error {
    if exceeds_limit(&err) {
        std::io::Error::other(Error::PayloadTooLarge(err.to_string()))
    } else {
        std::io::Error::other(err)
    }
}

/// Uploaded content is streamed through; an explicit zero length means no body
fn upload_document(identifier: Option<String>, headers: &HeaderMap, body: Body) -> Document {
    let empty = header_str(headers, header::CONTENT_LENGTH).as_deref() == Some("0");
    let builder = Document::builder()
        .maybe_identifier(identifier)
        .maybe_filename(header_str(headers, HEADER_FILE_NAME))
        .maybe_content_type(header_str(headers, header::CONTENT_TYPE));
    if empty {
        builder.build()
    } else {
        let stream = body.into_data_stream().map_err(upload_error);
        builder.stream(Box::pin(stream)).build()
    }
}

async fn run(state: &AppState, request: crate::error::Result<Request>) -> Response {
    match request {
        Ok(request) => state.orchestrator().handle(request).await,
        Err(err) => Response::failure(err),
    }
}

/// Metadata as JSON body plus headers
fn metadata_reply(response: Response) -> HttpResponse {
    if !response.is_ok() {
        return failure(response);
    }
    let status = response.code.http_status();
    match response.into_document() {
        Some(doc) => (status, metadata_headers(&doc), Json(doc)).into_response(),
        None => status.into_response(),
    }
}

/// Body with its content type plus metadata headers
async fn content_reply(response: Response) -> HttpResponse {
    if !response.is_ok() {
        return failure(response);
    }
    let Some(mut doc) = response.into_document() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let headers = metadata_headers(&doc);
    let content_type = doc
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let body = match doc.take_body() {
        Some(body) => match body.into_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Error::from(e).into_response(),
        },
        None => bytes::Bytes::new(),
    };
    (
        StatusCode::OK,
        headers,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}

/// POST /documents - Store a new document (identifier optional via x-document-id)
pub async fn create_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> HttpResponse {
    let doc = upload_document(header_str(&headers, HEADER_DOCUMENT_ID), &headers, body);
    metadata_reply(run(&state, Request::new(Method::Create, doc)).await)
}

/// PUT /documents/:id - Replace an existing document
pub async fn replace_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> HttpResponse {
    let doc = upload_document(Some(id), &headers, body);
    metadata_reply(run(&state, Request::new(Method::Replace, doc)).await)
}

/// GET /documents/:id - Document content
pub async fn get_document(State(state): State<AppState>, Path(id): Path<String>) -> HttpResponse {
    content_reply(run(&state, Request::by_identifier(Method::Fetch, id)).await).await
}

/// HEAD /documents/:id - Metadata headers only
pub async fn head_document(State(state): State<AppState>, Path(id): Path<String>) -> HttpResponse {
    let response = run(&state, Request::by_identifier(Method::Metadata, id)).await;
    if !response.is_ok() {
        return response.code.http_status().into_response();
    }
    match response.document() {
        Some(doc) => (StatusCode::OK, metadata_headers(doc)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// DELETE /documents/:id - Delete, returning the removed metadata
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HttpResponse {
    metadata_reply(run(&state, Request::by_identifier(Method::Delete, id)).await)
}

/// POST /documents/:id/submit - Start extraction
pub async fn submit_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HttpResponse {
    metadata_reply(run(&state, Request::by_identifier(Method::Submit, id)).await)
}

/// GET /text/:id - Extracted text (`Accept: text/plain`) or structured JSON
pub async fn get_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> HttpResponse {
    let wants_text = header_str(&headers, header::ACCEPT)
        .is_some_and(|accept| accept.contains("text/plain"));
    let method = if wants_text {
        Method::FetchText
    } else {
        Method::FetchStructured
    };
    content_reply(run(&state, Request::by_identifier(method, id)).await).await
}

#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub identifier: String,
    pub url: String,
    pub expires_in: u64,
}

async fn presign_reply(state: &AppState, identifier: Option<String>) -> HttpResponse {
    let doc = Document::builder().maybe_identifier(identifier).build();
    let response = run(state, Request::new(Method::Presign, doc)).await;
    if !response.is_ok() {
        return failure(response);
    }
    let identifier = response
        .document()
        .and_then(|d| d.identifier())
        .unwrap_or_default()
        .to_string();
    match response.presigned_url {
        Some(url) => Json(PresignedUrlResponse {
            identifier,
            url,
            expires_in: state.orchestrator().config().presigned_url_expiration_secs,
        })
        .into_response(),
        None => Error::internal("object store returned no presigned URL").into_response(),
    }
}

/// GET /presigned - Upload URL for a new generated identifier
pub async fn presign_new(State(state): State<AppState>) -> HttpResponse {
    presign_reply(&state, None).await
}

/// GET /presigned/:id - Upload URL for `id`
pub async fn presign(State(state): State<AppState>, Path(id): Path<String>) -> HttpResponse {
    presign_reply(&state, Some(id)).await
}
