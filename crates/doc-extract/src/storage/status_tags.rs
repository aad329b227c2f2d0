//! Extraction status held as tags on the stored source object
//!
//! Content headers are written once at creation; status and job ids are the only
//! mutable state and live in the object's tag set. The in-flight job id is kept
//! while `Submitted`; once terminal, the job that produced the outcome is kept as
//! the completed job id. Writes replace by key and keep unrelated tags. Concurrent writers for the same object race with
//! last-writer-wins semantics.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{ObjectStoreProvider, Tag};
use crate::types::ExtractStatus;

pub const TAG_KEY_STATUS: &str = "ocr-status";
pub const TAG_KEY_JOB_ID: &str = "job-id";
pub const TAG_KEY_COMPLETED_JOB_ID: &str = "completed-job-id";

const STATUS_TAG_KEYS: [&str; 3] = [TAG_KEY_STATUS, TAG_KEY_JOB_ID, TAG_KEY_COMPLETED_JOB_ID];

/// Status and job ids as read from the tag set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusRecord {
    pub status: ExtractStatus,
    /// Job in flight, only while `Submitted`
    pub job_id: Option<String>,
    /// Job whose outcome the terminal status records
    pub completed_job_id: Option<String>,
}

impl StatusRecord {
    pub fn from_tags(tags: &[Tag]) -> Self {
        let value_of = |key: &str| {
            tags.iter()
                .rev()
                .find(|t| t.key == key)
                .map(|t| t.value.clone())
        };
        Self {
            status: value_of(TAG_KEY_STATUS)
                .map(|s| ExtractStatus::of(&s))
                .unwrap_or_default(),
            job_id: value_of(TAG_KEY_JOB_ID).filter(|j| !j.is_empty()),
            completed_job_id: value_of(TAG_KEY_COMPLETED_JOB_ID).filter(|j| !j.is_empty()),
        }
    }
}

/// Reads and writes status records for objects in one bucket
#[derive(Clone)]
pub struct StatusTagStore {
    store: Arc<dyn ObjectStoreProvider>,
    bucket: String,
}

impl StatusTagStore {
    pub fn new(store: Arc<dyn ObjectStoreProvider>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Current record; an untagged object is `New` without a job id
    pub async fn read(&self, identifier: &str) -> Result<StatusRecord> {
        let tags = self.store.get_tags(&self.bucket, identifier).await?;
        Ok(StatusRecord::from_tags(&tags))
    }

    /// Replace the status and job id tags.
    ///
    /// With `Submitted` (which requires one) the job id is the job in flight; with
    /// a terminal status it is the job that completed. `New` clears both.
    pub async fn write(
        &self,
        identifier: &str,
        status: ExtractStatus,
        job_id: Option<&str>,
    ) -> Result<()> {
        let job_tag = match (status, job_id.filter(|j| !j.is_empty())) {
            (ExtractStatus::Submitted, Some(job)) => Some(Tag::new(TAG_KEY_JOB_ID, job)),
            (ExtractStatus::Submitted, None) => {
                return Err(Error::internal(format!(
                    "refusing to mark {} Submitted without a job id",
                    identifier
                )))
            }
            (ExtractStatus::Succeeded | ExtractStatus::Failed, Some(job)) => {
                Some(Tag::new(TAG_KEY_COMPLETED_JOB_ID, job))
            }
            _ => None,
        };

        let mut tags = self.store.get_tags(&self.bucket, identifier).await?;
        tags.retain(|t| !STATUS_TAG_KEYS.contains(&t.key.as_str()));
        tags.push(Tag::new(TAG_KEY_STATUS, status.as_str()));
        tags.extend(job_tag);

        self.store.put_tags(&self.bucket, identifier, tags).await?;
        tracing::debug!(
            "{} status tag set to {} (job {:?})",
            identifier,
            status,
            job_id
        );
        Ok(())
    }
}
