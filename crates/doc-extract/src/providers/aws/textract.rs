//! Amazon Textract asynchronous OCR client

use async_trait::async_trait;

use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::types::{
    DocumentLocation, FeatureType, NotificationChannel as TextractChannel, S3Object,
};
use aws_sdk_textract::Client as TextractClient;

use crate::error::{Error, Result};
use crate::providers::ocr_service::{
    Block, BlockType, OcrJobRequest, OcrServiceProvider, ResultPage,
};

/// Analysis mode runs layout analysis; the layout blocks carry reading order
const ANALYSIS_FEATURES: [FeatureType; 1] = [FeatureType::Layout];

/// Textract job client
pub struct TextractService {
    client: TextractClient,
}

impl TextractService {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: TextractClient::new(sdk_config),
        }
    }

    fn location(request: &OcrJobRequest) -> DocumentLocation {
        DocumentLocation::builder()
            .s3_object(
                S3Object::builder()
                    .bucket(&request.location.bucket)
                    .name(&request.location.key)
                    .build(),
            )
            .build()
    }

    fn channel(request: &OcrJobRequest) -> Result<Option<TextractChannel>> {
        request
            .notification
            .as_ref()
            .map(|n| {
                TextractChannel::builder()
                    .sns_topic_arn(&n.topic_arn)
                    .role_arn(&n.role_arn)
                    .build()
                    .map_err(|e| Error::ocr_service("Invalid notification channel", e))
            })
            .transpose()
    }
}

fn convert_block(block: &aws_sdk_textract::types::Block) -> Block {
    Block {
        block_type: block
            .block_type()
            .map(|t| BlockType::parse(t.as_str()))
            .unwrap_or_else(|| BlockType::Other(String::new())),
        text: block.text().map(str::to_string),
        page: block.page().and_then(|p| u32::try_from(p).ok()),
        id: block.id().map(str::to_string),
    }
}

#[async_trait]
impl OcrServiceProvider for TextractService {
    async fn start_text_detection(&self, request: &OcrJobRequest) -> Result<String> {
        let output = self
            .client
            .start_document_text_detection()
            .document_location(Self::location(request))
            .set_notification_channel(Self::channel(request)?)
            .job_tag(&request.job_tag)
            .send()
            .await
            .map_err(|e| {
                Error::ocr_service(
                    "Failed to submit document for text detection",
                    DisplayErrorContext(e),
                )
            })?;

        output
            .job_id()
            .map(str::to_string)
            .ok_or_else(|| Error::ocr_service("Failed to submit document for text detection", "no job id returned"))
    }

    async fn start_document_analysis(&self, request: &OcrJobRequest) -> Result<String> {
        let output = self
            .client
            .start_document_analysis()
            .document_location(Self::location(request))
            .set_feature_types(Some(ANALYSIS_FEATURES.to_vec()))
            .set_notification_channel(Self::channel(request)?)
            .job_tag(&request.job_tag)
            .send()
            .await
            .map_err(|e| {
                Error::ocr_service(
                    "Failed to submit document for text analysis",
                    DisplayErrorContext(e),
                )
            })?;

        output
            .job_id()
            .map(str::to_string)
            .ok_or_else(|| Error::ocr_service("Failed to submit document for text analysis", "no job id returned"))
    }

    async fn get_text_detection(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage> {
        let output = self
            .client
            .get_document_text_detection()
            .job_id(job_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                Error::ocr_service("failed to retrieve detected text", DisplayErrorContext(e))
            })?;

        Ok(ResultPage {
            blocks: output.blocks().iter().map(convert_block).collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_document_analysis(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage> {
        let output = self
            .client
            .get_document_analysis()
            .job_id(job_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                Error::ocr_service("failed to retrieve analyzed text", DisplayErrorContext(e))
            })?;

        Ok(ResultPage {
            blocks: output.blocks().iter().map(convert_block).collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    fn name(&self) -> &'static str {
        "textract"
    }
}
