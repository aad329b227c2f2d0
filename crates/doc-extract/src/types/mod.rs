//! Core types for the extraction service

pub mod document;
pub mod request;
pub mod response;
pub mod status;

pub use document::{
    guess_content_type, BodyStream, Document, DocumentBody, DocumentBuilder, ExtractedPdfText,
    PDF_CONTENT_TYPE,
};
pub use request::{Method, Request};
pub use response::{Response, ResultCode};
pub use status::ExtractStatus;
