//! Provider abstractions for object storage and the OCR job service
//!
//! Trait-based seams that allow switching between in-memory, local filesystem
//! and AWS backends.

pub mod local;
pub mod memory;
pub mod object_store;
pub mod ocr_service;

#[cfg(feature = "aws")]
pub mod aws;

pub use local::{LocalObjectStore, LocalOcrService};
pub use memory::{InMemoryObjectStore, InMemoryOcrService};
pub use object_store::{ObjectMetadata, ObjectStoreProvider, ObjectUpload, StoredObject, Tag};
pub use ocr_service::{
    Block, BlockType, NotificationChannel, ObjectLocation, OcrJobRequest, OcrServiceProvider,
    ResultPage,
};
