//! Error types for the extraction service

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed constraint on a request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub constraint: String,
}

/// All constraint failures found while validating one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub context: String,
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            violations: Vec::new(),
        }
    }

    /// Record a violation; validation keeps going after this
    pub fn push(&mut self, field: impl Into<String>, constraint: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            constraint: constraint.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok(())` if nothing was recorded, otherwise the accumulated error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.context)?;
        for (i, v) in self.violations.iter().enumerate() {
            let sep = if i == 0 { " " } else { "; " };
            write!(f, "{}{} {}", sep, v.field, v.constraint)?;
        }
        Ok(())
    }
}

/// How a failure is surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or incomplete request (4xx)
    Client,
    /// The addressed object does not exist
    NotFound,
    /// A collaborator failed (5xx)
    Service,
}

/// Extraction service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Request failed validation
    #[error("Invalid request. {0}")]
    Validation(ValidationError),

    /// Document not found
    #[error("Document not found: {identifier}")]
    NotFound { identifier: String },

    /// Document already exists
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// Uploaded body exceeds the configured size limit
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Object store communication failure
    #[error("Object store error: {context}: {cause}")]
    ObjectStore { context: String, cause: String },

    /// OCR service communication failure
    #[error("OCR service error: {context}: {cause}")]
    OcrService { context: String, cause: String },

    /// Embedded text could not be read from a PDF
    #[error("Failed to analyze PDF '{identifier}': {cause}")]
    PdfParse { identifier: String, cause: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an object store error wrapping its cause
    pub fn object_store(context: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::ObjectStore {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    /// Create an OCR service error wrapping its cause
    pub fn ocr_service(context: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::OcrService {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    pub fn pdf_parse(identifier: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::PdfParse {
            identifier: identifier.into(),
            cause: cause.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify a failure while reading an uploaded body. Reading stops at the
    /// uploader's side, so anything but a wrapped crate error is a bad request.
    pub fn upload(err: std::io::Error) -> Self {
        let message = err.to_string();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::invalid(
                "Invalid store request",
                "body",
                &format!("could not be read: {}", message),
            ),
        }
    }

    /// Single-field validation failure
    pub fn invalid(context: &str, field: &str, constraint: &str) -> Self {
        let mut v = ValidationError::new(context);
        v.push(field, constraint);
        Self::Validation(v)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Conflict(_) | Error::PayloadTooLarge(_) => {
                ErrorKind::Client
            }
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::ObjectStore { .. }
            | Error::OcrService { .. }
            | Error::PdfParse { .. }
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => ErrorKind::Service,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound { .. } => "not_found",
            Error::Conflict(_) => "conflict",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::ObjectStore { .. } => "object_store_error",
            Error::OcrService { .. } => "ocr_service_error",
            Error::PdfParse { .. } => "pdf_parse_error",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut error = json!({
            "type": self.error_type(),
            "message": self.to_string(),
        });
        if let Error::Validation(v) = &self {
            error["violations"] = json!(v.violations);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_accumulates() {
        let mut v = ValidationError::new("Create request");
        v.push("identifier", "must not be empty");
        v.push("body", "must be present");

        let err = v.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        let msg = err.to_string();
        assert!(msg.contains("identifier must not be empty"));
        assert!(msg.contains("body must be present"));
    }

    #[test]
    fn test_empty_validation_is_ok() {
        assert!(ValidationError::new("Fetch request").into_result().is_ok());
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::not_found("abc").kind(), ErrorKind::NotFound);
        assert_eq!(Error::Conflict("abc".into()).kind(), ErrorKind::Client);
        assert_eq!(
            Error::object_store("put failed", "timeout").kind(),
            ErrorKind::Service
        );
        assert_eq!(Error::pdf_parse("abc", "bad xref").kind(), ErrorKind::Service);
    }

    #[test]
    fn test_upload_failures_are_client_errors() {
        let limited = std::io::Error::other(Error::PayloadTooLarge("limit 10 bytes".into()));
        let err = Error::upload(limited);
        assert!(matches!(err, Error::PayloadTooLarge(_)));
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away");
        let err = Error::upload(reset);
        assert_eq!(err.kind(), ErrorKind::Client);
        assert!(err.to_string().contains("peer went away"));
    }

    #[test]
    fn test_service_error_carries_cause() {
        let err = Error::ocr_service("Failed to submit document for text detection", "throttled");
        assert!(err.to_string().contains("throttled"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
