//! Operation responses

use axum::http::StatusCode;
use bytes::Bytes;

use super::document::Document;
use crate::error::{Error, ErrorKind, Result};

/// Outcome class of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    BadRequest,
    NotFound,
    Conflict,
    PayloadTooLarge,
    ServiceError,
}

impl ResultCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            ResultCode::Ok => StatusCode::OK,
            ResultCode::BadRequest => StatusCode::BAD_REQUEST,
            ResultCode::NotFound => StatusCode::NOT_FOUND,
            ResultCode::Conflict => StatusCode::CONFLICT,
            ResultCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ResultCode::ServiceError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn of(error: &Error) -> Self {
        match (error.kind(), error) {
            (_, Error::Conflict(_)) => ResultCode::Conflict,
            (_, Error::PayloadTooLarge(_)) => ResultCode::PayloadTooLarge,
            (ErrorKind::Client, _) => ResultCode::BadRequest,
            (ErrorKind::NotFound, _) => ResultCode::NotFound,
            (ErrorKind::Service, _) => ResultCode::ServiceError,
        }
    }
}

/// Result code, resulting documents and the error that caused a non-Ok code
#[derive(Debug)]
pub struct Response {
    pub code: ResultCode,
    pub documents: Vec<Document>,
    pub error: Option<Error>,
    pub presigned_url: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            code: ResultCode::Ok,
            documents: Vec::new(),
            error: None,
            presigned_url: None,
        }
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            documents: vec![document],
            ..Self::ok()
        }
    }

    pub fn presigned(document: Document, url: String) -> Self {
        Self {
            presigned_url: Some(url),
            ..Self::with_document(document)
        }
    }

    pub fn failure(error: Error) -> Self {
        Self {
            code: ResultCode::of(&error),
            documents: Vec::new(),
            error: Some(error),
            presigned_url: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResultCode::Ok
    }

    pub fn document(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub fn into_document(self) -> Option<Document> {
        self.documents.into_iter().next()
    }

    /// Materialize the first document's body
    pub async fn into_body_bytes(self) -> Result<Option<Bytes>> {
        match self.into_document() {
            Some(mut doc) => match doc.take_body() {
                Some(body) => Ok(Some(body.into_bytes().await?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

impl From<Result<Response>> for Response {
    fn from(result: Result<Response>) -> Self {
        result.unwrap_or_else(Response::failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        assert_eq!(Response::failure(Error::not_found("x")).code, ResultCode::NotFound);
        assert_eq!(
            Response::failure(Error::Conflict("x".into())).code,
            ResultCode::Conflict
        );
        assert_eq!(
            Response::failure(Error::invalid("ctx", "identifier", "missing")).code,
            ResultCode::BadRequest
        );
        let resp = Response::failure(Error::object_store("get", "boom"));
        assert_eq!(resp.code, ResultCode::ServiceError);
        assert_eq!(resp.code.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.error.is_some());
    }

    #[test]
    fn test_from_result() {
        let resp: Response = Ok(Response::with_document(Document::with_identifier("a"))).into();
        assert!(resp.is_ok());
        assert_eq!(resp.document().and_then(|d| d.identifier()), Some("a"));
    }
}
