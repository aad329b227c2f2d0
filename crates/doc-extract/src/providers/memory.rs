//! In-process providers backed by concurrent maps
//!
//! Used by tests and the `memory` backend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::OcrMode;
use crate::error::{Error, Result};

use super::object_store::{ObjectMetadata, ObjectStoreProvider, ObjectUpload, StoredObject, Tag};
use super::ocr_service::{Block, OcrJobRequest, OcrServiceProvider, ResultPage};

#[derive(Debug, Clone)]
struct Entry {
    object: StoredObject,
    tags: Vec<Tag>,
}

/// Object store keeping everything in memory
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), Entry>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn key(bucket: &str, key: &str) -> (String, String) {
        (bucket.to_string(), key.to_string())
    }
}

#[async_trait]
impl ObjectStoreProvider for InMemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<ObjectMetadata> {
        let metadata = ObjectMetadata {
            content_type: upload.content_type,
            content_length: upload.body.len() as u64,
            user_metadata: upload.user_metadata,
            last_modified: Some(Utc::now()),
        };
        let entry = Entry {
            object: StoredObject {
                metadata: metadata.clone(),
                body: upload.body,
            },
            tags: Vec::new(),
        };
        self.objects.insert(Self::key(bucket, key), entry);
        Ok(metadata)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>> {
        Ok(self
            .objects
            .get(&Self::key(bucket, key))
            .map(|e| e.object.clone()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        Ok(self
            .objects
            .get(&Self::key(bucket, key))
            .map(|e| e.object.metadata.clone()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects.remove(&Self::key(bucket, key));
        Ok(())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Vec<Tag>> {
        self.objects
            .get(&Self::key(bucket, key))
            .map(|e| e.tags.clone())
            .ok_or_else(|| Error::object_store("Failed to read tags", format!("no such key {}", key)))
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: Vec<Tag>) -> Result<()> {
        match self.objects.get_mut(&Self::key(bucket, key)) {
            Some(mut entry) => {
                entry.tags = tags;
                Ok(())
            }
            None => Err(Error::object_store(
                "Failed to write tags",
                format!("no such key {}", key),
            )),
        }
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            urlencoding::encode(key),
            expires
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Clone)]
struct Job {
    mode: OcrMode,
    tag: String,
}

/// OCR service returning scripted blocks
///
/// Blocks are registered per job tag (document identifier) and served
/// `page_size` at a time with offset continuation tokens.
#[derive(Debug)]
pub struct InMemoryOcrService {
    blocks: DashMap<String, Vec<Block>>,
    jobs: DashMap<String, Job>,
    submissions: Mutex<Vec<(OcrMode, OcrJobRequest)>>,
    next_job: AtomicUsize,
    result_calls: AtomicUsize,
    page_size: usize,
    fail_submissions: AtomicBool,
}

impl Default for InMemoryOcrService {
    fn default() -> Self {
        Self::with_page_size(1000)
    }
}

impl InMemoryOcrService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            blocks: DashMap::new(),
            jobs: DashMap::new(),
            submissions: Mutex::new(Vec::new()),
            next_job: AtomicUsize::new(1),
            result_calls: AtomicUsize::new(0),
            page_size: page_size.max(1),
            fail_submissions: AtomicBool::new(false),
        }
    }

    /// Blocks any job tagged `tag` will yield
    pub fn set_blocks(&self, tag: impl Into<String>, blocks: Vec<Block>) {
        self.blocks.insert(tag.into(), blocks);
    }

    /// Make every subsequent job start fail
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Every accepted job start, in order
    pub fn submissions(&self) -> Vec<(OcrMode, OcrJobRequest)> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Number of result page fetches served
    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    fn start(&self, mode: OcrMode, request: &OcrJobRequest) -> Result<String> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(Error::ocr_service(
                "Failed to start job",
                "service unavailable",
            ));
        }
        let job_id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        self.jobs.insert(
            job_id.clone(),
            Job {
                mode,
                tag: request.job_tag.clone(),
            },
        );
        if let Ok(mut subs) = self.submissions.lock() {
            subs.push((mode, request.clone()));
        }
        Ok(job_id)
    }

    fn page(&self, mode: OcrMode, job_id: &str, next_token: Option<String>) -> Result<ResultPage> {
        let context = "Failed to retrieve job results";
        let job = self
            .jobs
            .get(job_id)
            .map(|j| j.clone())
            .ok_or_else(|| Error::ocr_service(context, format!("invalid job id {}", job_id)))?;
        if job.mode != mode {
            return Err(Error::ocr_service(
                context,
                format!("job {} was started in {} mode", job_id, job.mode),
            ));
        }
        self.result_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::ocr_service(context, format!("invalid token {}", token)))?,
            None => 0,
        };
        let all = self
            .blocks
            .get(&job.tag)
            .map(|b| b.clone())
            .unwrap_or_default();
        let end = (offset + self.page_size).min(all.len());
        let blocks = all.get(offset..end).map(<[Block]>::to_vec).unwrap_or_default();
        let next_token = (end < all.len()).then(|| end.to_string());

        Ok(ResultPage { blocks, next_token })
    }
}

#[async_trait]
impl OcrServiceProvider for InMemoryOcrService {
    async fn start_text_detection(&self, request: &OcrJobRequest) -> Result<String> {
        self.start(OcrMode::Detection, request)
    }

    async fn start_document_analysis(&self, request: &OcrJobRequest) -> Result<String> {
        self.start(OcrMode::Analysis, request)
    }

    async fn get_text_detection(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage> {
        self.page(OcrMode::Detection, job_id, next_token)
    }

    async fn get_document_analysis(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage> {
        self.page(OcrMode::Analysis, job_id, next_token)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ocr_service::ObjectLocation;

    fn job_request(tag: &str) -> OcrJobRequest {
        OcrJobRequest {
            location: ObjectLocation {
                bucket: "src".into(),
                key: tag.into(),
            },
            notification: None,
            job_tag: tag.into(),
        }
    }

    #[tokio::test]
    async fn test_object_round_trip() {
        let store = InMemoryObjectStore::new();
        let upload = ObjectUpload::new("hello")
            .content_type("text/plain")
            .user_metadata("file-name", "a.txt");
        store.put_object("b", "k", upload).await.unwrap();

        let obj = store.get_object("b", "k").await.unwrap().unwrap();
        assert_eq!(&obj.body[..], b"hello");
        assert_eq!(obj.metadata.content_length, 5);
        assert_eq!(obj.metadata.user_metadata["file-name"], "a.txt");
        assert!(store.get_object("other", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_resets_tags() {
        let store = InMemoryObjectStore::new();
        store.put_object("b", "k", ObjectUpload::new("1")).await.unwrap();
        store
            .put_tags("b", "k", vec![Tag::new("ocr-status", "Submitted")])
            .await
            .unwrap();
        store.put_object("b", "k", ObjectUpload::new("2")).await.unwrap();
        assert!(store.get_tags("b", "k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tags_on_missing_object_fail() {
        let store = InMemoryObjectStore::new();
        assert!(store.put_tags("b", "missing", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_ocr_pages_by_offset() {
        let ocr = InMemoryOcrService::with_page_size(2);
        ocr.set_blocks(
            "doc",
            vec![Block::page(1, "a"), Block::page(2, "b"), Block::page(3, "c")],
        );
        let job = ocr.start_text_detection(&job_request("doc")).await.unwrap();

        let first = ocr.get_text_detection(&job, None).await.unwrap();
        assert_eq!(first.blocks.len(), 2);
        let second = ocr
            .get_text_detection(&job, first.next_token)
            .await
            .unwrap();
        assert_eq!(second.blocks.len(), 1);
        assert!(second.next_token.is_none());
        assert_eq!(ocr.result_calls(), 2);
    }

    #[tokio::test]
    async fn test_ocr_mode_mismatch() {
        let ocr = InMemoryOcrService::new();
        let job = ocr.start_document_analysis(&job_request("doc")).await.unwrap();
        assert!(ocr.get_text_detection(&job, None).await.is_err());
        assert!(ocr.get_document_analysis(&job, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_submissions() {
        let ocr = InMemoryOcrService::new();
        ocr.fail_submissions(true);
        let err = ocr.start_text_detection(&job_request("doc")).await.unwrap_err();
        assert!(matches!(err, Error::OcrService { .. }));
        assert!(ocr.submissions().is_empty());
    }
}
