//! doc-extract: document storage with asynchronous text extraction
//!
//! Documents are stored in an object store and tracked through a small
//! status lifecycle (`New`, `Submitted`, `Succeeded`, `Failed`) kept in
//! object tags. Text-bearing PDFs are resolved locally; everything else is
//! handed to an OCR service whose completion notifications persist the
//! extracted text next to the source document.

pub mod adapters;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

pub use config::{ExtractConfig, OcrMode};
pub use error::{Error, Result};
pub use orchestrator::ExtractionOrchestrator;
pub use types::{Document, ExtractStatus, Method, Request, Response, ResultCode};
