//! Amazon Web Services provider implementations
//!
//! - Amazon S3 for documents, artifacts and status tags
//! - Amazon Textract for asynchronous text detection and document analysis

mod s3_store;
mod textract;

pub use s3_store::S3ObjectStore;
pub use textract::TextractService;

/// Shared SDK configuration from the default credential chain
pub async fn load_sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    loader.load().await
}
