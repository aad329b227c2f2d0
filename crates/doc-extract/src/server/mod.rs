//! HTTP server for the extraction service

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::ExtractConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Extraction HTTP server
pub struct ExtractServer {
    config: Arc<ExtractConfig>,
    state: AppState,
}

impl ExtractServer {
    /// Create a new server for the configured backend
    pub async fn new(config: Arc<ExtractConfig>) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    pub fn with_state(config: Arc<ExtractConfig>, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), self.config.server.max_upload_size)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting extraction server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over `state`
pub fn build_router(state: AppState, max_upload_size: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .merge(routes::api_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ExtractionOrchestrator;
    use crate::providers::{Block, InMemoryObjectStore, InMemoryOcrService};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        ocr: Arc<InMemoryOcrService>,
        _temp: tempfile::TempDir,
    }

    fn app() -> TestApp {
        app_with_limit(1024 * 1024)
    }

    fn app_with_limit(max_upload_size: usize) -> TestApp {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Arc::new(ExtractConfig {
            temp_dir: Some(temp.path().to_path_buf()),
            ..Default::default()
        });
        let ocr = Arc::new(InMemoryOcrService::new());
        let orchestrator = ExtractionOrchestrator::new(
            config,
            Arc::new(InMemoryObjectStore::new()),
            ocr.clone(),
        );
        let state = AppState::from_orchestrator(Arc::new(orchestrator));
        TestApp {
            router: build_router(state, max_upload_size),
            ocr,
            _temp: temp,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
        router.clone().oneshot(request).await.unwrap()
    }

    fn upload(method: &str, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-document-id", "memo")
            .header("x-file-name", "memo.txt")
            .header("content-type", "text/plain")
            .header("content-length", body.len().to_string())
            .body(Body::from(body))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let resp = send(&app.router, empty("GET", "/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_document_lifecycle_over_http() {
        let app = app();

        let resp = send(&app.router, upload("POST", "/documents", "hello there")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-extract-status"], "New");
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(json["identifier"], "memo");
        assert_eq!(json["content_length"], 11);

        let resp = send(&app.router, upload("POST", "/documents", "again")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = send(&app.router, empty("HEAD", "/documents/memo")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-file-name"], "memo.txt");
        assert_eq!(resp.headers()["x-content-length"], "11");

        let resp = send(&app.router, empty("GET", "/documents/memo")).await;
        assert_eq!(resp.headers()["content-type"], "text/plain");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello there");

        app.ocr.set_blocks("memo", vec![Block::page(1, "hello there")]);
        let resp = send(&app.router, empty("POST", "/documents/memo/submit")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-extract-status"], "Submitted");
        let job = resp.headers()["x-job-id"].to_str().unwrap().to_string();

        let message = serde_json::json!({
            "Message": serde_json::json!({
                "JobId": job,
                "Status": "SUCCEEDED",
                "JobTag": "memo"
            }).to_string()
        });
        let resp = send(
            &app.router,
            Request::builder()
                .method("POST")
                .uri("/events/notification")
                .body(Body::from(message.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(
            &app.router,
            Request::builder()
                .uri("/text/memo")
                .header("accept", "text/plain")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let text = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&text[..], b"hello there");

        let resp = send(&app.router, empty("DELETE", "/documents/memo")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = send(&app.router, empty("DELETE", "/documents/memo")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_without_body_is_bad_request() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/documents")
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        let resp = send(&app.router, request).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(json["error"]["type"], "validation_error");
    }

    fn chunked(chunks: Vec<&'static [u8]>) -> Request<Body> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(bytes::Bytes::from_static(c))),
        );
        Request::builder()
            .method("POST")
            .uri("/documents")
            .header("x-document-id", "streamed")
            .header("x-file-name", "streamed.txt")
            .body(Body::from_stream(stream))
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_chunked_upload_is_rejected() {
        let app = app_with_limit(16);
        let resp = send(&app.router, chunked(vec![b"0123456789", b"0123456789"])).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = send(&app.router, empty("HEAD", "/documents/streamed")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chunked_upload_within_limit_is_stored() {
        let app = app_with_limit(16);
        let resp = send(&app.router, chunked(vec![b"01234", b"56789"])).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-content-length"], "10");
    }

    #[tokio::test]
    async fn test_empty_chunked_upload_is_bad_request() {
        let app = app();
        let resp = send(&app.router, chunked(Vec::new())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&app.router, empty("HEAD", "/documents/streamed")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_replace_missing_is_not_found() {
        let app = app();
        let resp = send(&app.router, upload("PUT", "/documents/absent", "x")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_presigned_url() {
        let app = app();
        let resp = send(&app.router, empty("GET", "/presigned/abc")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(json["identifier"], "abc");
        assert_eq!(json["expires_in"], 120);
        assert!(json["url"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/events/storage")
            .body(Body::from("{"))
            .unwrap();
        let resp = send(&app.router, request).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
