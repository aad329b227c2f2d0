//! Validated operation requests

use std::fmt;

use super::document::Document;
use super::status::ExtractStatus;
use crate::error::{Result, ValidationError};

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Create,
    Replace,
    Fetch,
    Metadata,
    Delete,
    Submit,
    Complete,
    FetchText,
    FetchStructured,
    Presign,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Create => "create",
            Method::Replace => "replace",
            Method::Fetch => "fetch",
            Method::Metadata => "metadata",
            Method::Delete => "delete",
            Method::Submit => "submit",
            Method::Complete => "complete",
            Method::FetchText => "fetch-text",
            Method::FetchStructured => "fetch-structured",
            Method::Presign => "presign",
        };
        f.write_str(name)
    }
}

/// A request that has passed validation.
///
/// Variants that address an existing object carry its identifier directly;
/// only construction through [`Request::new`] (or the typed constructors) is possible.
#[derive(Debug)]
pub enum Request {
    /// Store a new document; identifier generated when absent
    Create(Document),
    /// Overwrite an existing document
    Replace(Document),
    Fetch(String),
    Metadata(String),
    Delete(String),
    Submit(String),
    /// Terminal job status reported by a notification
    Complete {
        identifier: String,
        status: ExtractStatus,
        job_id: Option<String>,
    },
    FetchText(String),
    FetchStructured(String),
    /// Presigned upload URL; identifier generated when absent
    Presign(Option<String>),
}

impl Request {
    /// Validate `document` against the needs of `method`.
    ///
    /// Every violated constraint is reported together.
    pub fn new(method: Method, mut document: Document) -> Result<Self> {
        let mut errors = ValidationError::new(format!("Invalid {} request", method));
        let identifier = document.identifier().map(str::to_string);

        let needs_identifier = !matches!(method, Method::Create | Method::Presign);
        if needs_identifier && identifier.is_none() {
            errors.push("identifier", "must not be null or empty");
        }
        if matches!(method, Method::Create | Method::Replace) && !document.has_body() {
            errors.push("body", "must not be null or empty");
        }
        errors.into_result()?;

        let id = identifier.unwrap_or_default();
        Ok(match method {
            Method::Create => {
                document.apply_defaults();
                Request::Create(document)
            }
            Method::Replace => {
                document.apply_defaults();
                Request::Replace(document)
            }
            Method::Fetch => Request::Fetch(id),
            Method::Metadata => Request::Metadata(id),
            Method::Delete => Request::Delete(id),
            Method::Submit => Request::Submit(id),
            Method::Complete => Request::Complete {
                identifier: id,
                status: document.status,
                job_id: document.job_id.take(),
            },
            Method::FetchText => Request::FetchText(id),
            Method::FetchStructured => Request::FetchStructured(id),
            Method::Presign => Request::Presign(document.identifier().map(str::to_string)),
        })
    }

    /// Identifier-only request
    pub fn by_identifier(method: Method, identifier: impl Into<String>) -> Result<Self> {
        Self::new(method, Document::with_identifier(identifier))
    }

    /// Completion request as built from a job notification
    pub fn complete(
        identifier: impl Into<String>,
        status: ExtractStatus,
        job_id: Option<String>,
    ) -> Result<Self> {
        let doc = Document::builder()
            .identifier(identifier)
            .status(status)
            .job_id(job_id)
            .build();
        Self::new(Method::Complete, doc)
    }

    pub fn method(&self) -> Method {
        match self {
            Request::Create(_) => Method::Create,
            Request::Replace(_) => Method::Replace,
            Request::Fetch(_) => Method::Fetch,
            Request::Metadata(_) => Method::Metadata,
            Request::Delete(_) => Method::Delete,
            Request::Submit(_) => Method::Submit,
            Request::Complete { .. } => Method::Complete,
            Request::FetchText(_) => Method::FetchText,
            Request::FetchStructured(_) => Method::FetchStructured,
            Request::Presign(_) => Method::Presign,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_replace_reports_all_violations() {
        let err = Request::new(Method::Replace, Document::builder().build()).unwrap_err();
        match err {
            Error::Validation(v) => {
                let fields: Vec<_> = v.violations.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(fields, vec!["identifier", "body"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_requires_body_only() {
        assert!(Request::new(Method::Create, Document::builder().build()).is_err());
        let req = Request::new(Method::Create, Document::builder().body("x").build()).unwrap();
        match req {
            Request::Create(doc) => assert!(doc.identifier().is_some()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_identifier_required() {
        for method in [
            Method::Fetch,
            Method::Metadata,
            Method::Delete,
            Method::Submit,
            Method::Complete,
            Method::FetchText,
        ] {
            assert!(Request::by_identifier(method, "").is_err(), "{method}");
            assert_eq!(Request::by_identifier(method, "id").unwrap().method(), method);
        }
    }

    #[test]
    fn test_complete_carries_status_and_job() {
        let req = Request::complete("doc", ExtractStatus::Failed, Some("job-1".into())).unwrap();
        match req {
            Request::Complete {
                identifier,
                status,
                job_id,
            } => {
                assert_eq!(identifier, "doc");
                assert_eq!(status, ExtractStatus::Failed);
                assert_eq!(job_id.as_deref(), Some("job-1"));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_presign_identifier_optional() {
        let req = Request::new(Method::Presign, Document::builder().build()).unwrap();
        assert!(matches!(req, Request::Presign(None)));
    }
}
