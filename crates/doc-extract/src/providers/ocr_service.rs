//! Asynchronous OCR job service trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where the source document lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Channel the service publishes job completion to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub topic_arn: String,
    pub role_arn: String,
}

/// Parameters for starting a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrJobRequest {
    pub location: ObjectLocation,
    pub notification: Option<NotificationChannel>,
    /// Echoed back in the completion notification; the document identifier
    pub job_tag: String,
}

/// Kind of a result block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Line,
    Word,
    #[serde(untagged)]
    Other(String),
}

impl BlockType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PAGE" => BlockType::Page,
            "LINE" => BlockType::Line,
            "WORD" => BlockType::Word,
            other => BlockType::Other(other.to_string()),
        }
    }
}

/// One unit of job output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_type: BlockType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Block {
    pub fn page(page: u32, text: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Page,
            text: Some(text.into()),
            page: Some(page),
            id: None,
        }
    }

    pub fn line(page: u32, text: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Line,
            text: Some(text.into()),
            page: Some(page),
            id: None,
        }
    }
}

/// One page of job results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub blocks: Vec<Block>,
    pub next_token: Option<String>,
}

/// Trait for the asynchronous OCR service
///
/// Implementations:
/// - `InMemoryOcrService`: scripted results
/// - `LocalOcrService`: PDF text layer, served in pages
/// - `TextractService`: Amazon Textract (feature `aws`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrServiceProvider: Send + Sync {
    /// Start a text detection job, returns the job id
    async fn start_text_detection(&self, request: &OcrJobRequest) -> Result<String>;

    /// Start a layout analysis job, returns the job id
    async fn start_document_analysis(&self, request: &OcrJobRequest) -> Result<String>;

    /// Fetch one page of detection results
    async fn get_text_detection(&self, job_id: &str, next_token: Option<String>)
        -> Result<ResultPage>;

    /// Fetch one page of analysis results
    async fn get_document_analysis(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage>;

    /// Get provider name for logging
    fn name(&self) -> &'static str;
}
