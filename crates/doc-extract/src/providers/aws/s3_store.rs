//! Amazon S3 object store

use async_trait::async_trait;
use std::time::Duration;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Tag as S3Tag, Tagging};
use aws_sdk_s3::Client as S3Client;

use crate::error::{Error, Result};
use crate::providers::object_store::{
    ObjectMetadata, ObjectStoreProvider, ObjectUpload, StoredObject, Tag,
};

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: S3Client::new(sdk_config),
        }
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl ObjectStoreProvider for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<ObjectMetadata> {
        let content_length = upload.body.len() as u64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length as i64)
            .set_content_type(upload.content_type.clone())
            .set_metadata(Some(upload.user_metadata.clone()))
            .body(ByteStream::from(upload.body))
            .send()
            .await
            .map_err(|e| {
                Error::object_store(
                    format!("Failed to put {}/{}", bucket, key),
                    DisplayErrorContext(e),
                )
            })?;

        Ok(ObjectMetadata {
            content_type: upload.content_type,
            content_length,
            user_metadata: upload.user_metadata,
            last_modified: Some(chrono::Utc::now()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(Error::object_store(
                    format!("Failed to get {}/{}", bucket, key),
                    DisplayErrorContext(service_err),
                ));
            }
        };

        let metadata = ObjectMetadata {
            content_type: output.content_type().map(str::to_string),
            content_length: output.content_length().unwrap_or_default().max(0) as u64,
            user_metadata: output.metadata().cloned().unwrap_or_default(),
            last_modified: output.last_modified().and_then(to_chrono),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::object_store(format!("Failed to read body of {}", key), e))?
            .into_bytes();

        Ok(Some(StoredObject { metadata, body }))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectMetadata {
                content_type: output.content_type().map(str::to_string),
                content_length: output.content_length().unwrap_or_default().max(0) as u64,
                user_metadata: output.metadata().cloned().unwrap_or_default(),
                last_modified: output.last_modified().and_then(to_chrono),
            })),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(Error::object_store(
                        format!("Failed to get metadata of {}/{}", bucket, key),
                        DisplayErrorContext(service_err),
                    ))
                }
            }
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::object_store(
                    format!("Failed to delete {}/{}", bucket, key),
                    DisplayErrorContext(e),
                )
            })?;
        Ok(())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Vec<Tag>> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::object_store(
                    format!("Failed to get tags of {}/{}", bucket, key),
                    DisplayErrorContext(e),
                )
            })?;

        Ok(output
            .tag_set()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect())
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: Vec<Tag>) -> Result<()> {
        let tag_set = tags
            .into_iter()
            .map(|t| S3Tag::builder().key(t.key).value(t.value).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::object_store("Invalid tag", e))?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| Error::object_store("Invalid tag set", e))?;

        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| {
                Error::object_store(
                    format!("Failed to set tags of {}/{}", bucket, key),
                    DisplayErrorContext(e),
                )
            })?;
        Ok(())
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::object_store("Invalid presigned URL expiration", e))?;
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                Error::object_store(
                    format!("Error generating presigned URL for {}", key),
                    DisplayErrorContext(e),
                )
            })?;
        Ok(request.uri().to_string())
    }

    fn name(&self) -> &str {
        "s3"
    }
}
