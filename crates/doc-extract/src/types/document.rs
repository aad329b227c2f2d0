//! Document value object and builder

use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;

use super::status::ExtractStatus;

/// MIME type that triggers the local text evaluation
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Stream of body chunks
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Document content, either materialized or streamed
pub enum DocumentBody {
    Bytes(Bytes),
    Stream(BodyStream),
}

impl DocumentBody {
    /// Length when the content is already in memory
    pub fn known_len(&self) -> Option<u64> {
        match self {
            DocumentBody::Bytes(b) => Some(b.len() as u64),
            DocumentBody::Stream(_) => None,
        }
    }

    /// Materialize the content, draining a stream if needed
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            DocumentBody::Bytes(b) => Ok(b),
            DocumentBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl From<Bytes> for DocumentBody {
    fn from(b: Bytes) -> Self {
        DocumentBody::Bytes(b)
    }
}

impl From<Vec<u8>> for DocumentBody {
    fn from(v: Vec<u8>) -> Self {
        DocumentBody::Bytes(Bytes::from(v))
    }
}

impl From<&'static str> for DocumentBody {
    fn from(s: &'static str) -> Self {
        DocumentBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for DocumentBody {
    fn from(s: String) -> Self {
        DocumentBody::Bytes(Bytes::from(s))
    }
}

impl fmt::Debug for DocumentBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            DocumentBody::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// A document, its content metadata and its extraction status
#[derive(Serialize)]
pub struct Document {
    identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip)]
    body: Option<DocumentBody>,
    pub status: ExtractStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// Shorthand for a document carrying only an identifier
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self::builder().identifier(identifier).build()
    }

    /// The identifier, if one has been assigned
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref().filter(|id| !id.is_empty())
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn body(&self) -> Option<&DocumentBody> {
        self.body.as_ref()
    }

    pub fn take_body(&mut self) -> Option<DocumentBody> {
        self.body.take()
    }

    /// Assign a fresh identifier if none is set. An existing identifier is never replaced.
    pub fn identifier_if_absent(&mut self) -> &str {
        if self.identifier().is_none() {
            self.identifier = Some(uuid::Uuid::new_v4().to_string());
        }
        self.identifier.as_deref().unwrap_or_default()
    }

    /// Fill in identifier, filename, content type and (for in-memory bodies) length
    pub fn apply_defaults(&mut self) {
        let id = self.identifier_if_absent().to_string();
        if self.filename.as_deref().map_or(true, str::is_empty) {
            self.filename = Some(id);
        }
        if self.content_type.as_deref().map_or(true, str::is_empty) {
            self.content_type = self.filename.as_deref().map(guess_content_type);
        }
        if self.content_length.is_none() {
            self.content_length = self.body.as_ref().and_then(DocumentBody::known_len);
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .is_some_and(|ct| ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("identifier", &self.identifier)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("body", &self.body.is_some())
            .field("status", &self.status)
            .field("job_id", &self.job_id)
            .finish()
    }
}

/// Content type from the filename extension, `application/octet-stream` if unknown
pub fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[derive(Default)]
pub struct DocumentBuilder {
    identifier: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Option<DocumentBody>,
    status: ExtractStatus,
    job_id: Option<String>,
}

impl DocumentBuilder {
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn maybe_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn maybe_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn maybe_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }

    pub fn body(mut self, body: impl Into<DocumentBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn stream(mut self, stream: BodyStream) -> Self {
        self.body = Some(DocumentBody::Stream(stream));
        self
    }

    pub fn status(mut self, status: ExtractStatus) -> Self {
        self.status = status;
        self
    }

    pub fn job_id(mut self, job_id: Option<String>) -> Self {
        self.job_id = job_id;
        self
    }

    /// Copy metadata (not body) from an existing document
    pub fn with_metadata_of(mut self, other: &Document) -> Self {
        self.identifier = other.identifier.clone();
        self.filename = other.filename.clone();
        self.content_type = other.content_type.clone();
        self.content_length = other.content_length;
        self.status = other.status;
        self.job_id = other.job_id.clone();
        self
    }

    pub fn build(self) -> Document {
        Document {
            identifier: self.identifier,
            filename: self.filename,
            content_type: self.content_type,
            content_length: self.content_length,
            body: self.body,
            status: self.status,
            job_id: self.job_id,
        }
    }
}

/// Text pulled from a PDF's text layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdfText {
    pub text: String,
    pub page_count: usize,
}

impl ExtractedPdfText {
    pub fn new(text: impl Into<String>, page_count: usize) -> Self {
        Self {
            text: text.into(),
            page_count,
        }
    }

    /// Length in characters
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}
