//! Local provider implementations using the filesystem and lopdf
//!
//! Objects live under `<root>/<bucket>/objects/<key>`; headers and tags live in a JSON
//! sidecar under `<root>/<bucket>/meta/<key>.json`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::OcrMode;
use crate::error::{Error, Result};

use super::object_store::{ObjectMetadata, ObjectStoreProvider, ObjectUpload, StoredObject, Tag};
use super::ocr_service::{Block, BlockType, OcrJobRequest, OcrServiceProvider, ResultPage};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    metadata: ObjectMetadata,
    #[serde(default)]
    tags: Vec<Tag>,
}

/// Filesystem object store
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local store rooted at `root`
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn checked_key(key: &str) -> Result<&Path> {
        let path = Path::new(key);
        let valid = !key.is_empty()
            && !key.contains('\\')
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if valid {
            Ok(path)
        } else {
            Err(Error::object_store(
                "Invalid object key",
                format!("key [{}] is not a relative path", key),
            ))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let bucket = Self::checked_key(bucket)?;
        Ok(self.root.join(bucket).join("objects").join(Self::checked_key(key)?))
    }

    fn sidecar_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let bucket = Self::checked_key(bucket)?;
        Self::checked_key(key)?;
        Ok(self
            .root
            .join(bucket)
            .join("meta")
            .join(format!("{}.json", key)))
    }

    async fn read_sidecar(&self, bucket: &str, key: &str) -> Result<Option<Sidecar>> {
        let path = self.sidecar_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::object_store(
                format!("Failed to read metadata for {}", key),
                e,
            )),
        }
    }

    async fn write_sidecar(&self, bucket: &str, key: &str, sidecar: &Sidecar) -> Result<()> {
        let path = self.sidecar_path(bucket, key)?;
        write_file(&path, serde_json::to_vec_pretty(sidecar)?).await
    }
}

async fn write_file(path: &Path, data: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| Error::object_store(format!("Failed to write {}", path.display()), e))
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::object_store(
            format!("Failed to delete {}", path.display()),
            e,
        )),
    }
}

#[async_trait]
impl ObjectStoreProvider for LocalObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        upload: ObjectUpload,
    ) -> Result<ObjectMetadata> {
        let path = self.object_path(bucket, key)?;
        write_file(&path, &upload.body).await?;

        let metadata = ObjectMetadata {
            content_type: upload.content_type,
            content_length: upload.body.len() as u64,
            user_metadata: upload.user_metadata,
            last_modified: Some(Utc::now()),
        };
        let sidecar = Sidecar {
            metadata: metadata.clone(),
            tags: Vec::new(),
        };
        self.write_sidecar(bucket, key, &sidecar).await?;

        tracing::debug!("Stored {}/{} at {:?}", bucket, key, path);
        Ok(metadata)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>> {
        let Some(sidecar) = self.read_sidecar(bucket, key).await? else {
            return Ok(None);
        };
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(StoredObject {
                metadata: sidecar.metadata,
                body: Bytes::from(body),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::object_store(format!("Failed to read {}", key), e)),
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        Ok(self.read_sidecar(bucket, key).await?.map(|s| s.metadata))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        remove_if_present(&self.object_path(bucket, key)?).await?;
        remove_if_present(&self.sidecar_path(bucket, key)?).await
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Vec<Tag>> {
        self.read_sidecar(bucket, key)
            .await?
            .map(|s| s.tags)
            .ok_or_else(|| Error::object_store("Failed to read tags", format!("no such key {}", key)))
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: Vec<Tag>) -> Result<()> {
        let mut sidecar = self.read_sidecar(bucket, key).await?.ok_or_else(|| {
            Error::object_store("Failed to write tags", format!("no such key {}", key))
        })?;
        sidecar.tags = tags;
        self.write_sidecar(bucket, key, &sidecar).await
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let path = self.object_path(bucket, key)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("file://{}?expires={}", path.display(), expires))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// OCR service reading the PDF text layer of the source object
///
/// Jobs run to completion when started; results are served `page_size`
/// blocks at a time. Documents without a readable text layer yield no blocks.
/// Results are retained for the most recent `retained_jobs` jobs only.
pub struct LocalOcrService {
    store: Arc<dyn ObjectStoreProvider>,
    jobs: DashMap<String, (OcrMode, Vec<Block>)>,
    started: Mutex<VecDeque<String>>,
    page_size: usize,
    retained_jobs: usize,
}

const DEFAULT_RETAINED_JOBS: usize = 256;

impl LocalOcrService {
    pub fn new(store: Arc<dyn ObjectStoreProvider>) -> Self {
        Self::with_retained_jobs(store, DEFAULT_RETAINED_JOBS)
    }

    pub fn with_retained_jobs(store: Arc<dyn ObjectStoreProvider>, retained_jobs: usize) -> Self {
        Self {
            store,
            jobs: DashMap::new(),
            started: Mutex::new(VecDeque::new()),
            page_size: 100,
            retained_jobs: retained_jobs.max(1),
        }
    }

    /// Store results, evicting the oldest jobs beyond the retention limit
    fn retain(&self, job_id: String, mode: OcrMode, blocks: Vec<Block>) {
        self.jobs.insert(job_id.clone(), (mode, blocks));
        let mut started = self
            .started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        started.push_back(job_id);
        while started.len() > self.retained_jobs {
            if let Some(expired) = started.pop_front() {
                self.jobs.remove(&expired);
                tracing::debug!("Local job {} results expired", expired);
            }
        }
    }

    async fn start(&self, mode: OcrMode, request: &OcrJobRequest) -> Result<String> {
        let location = &request.location;
        let object = self
            .store
            .get_object(&location.bucket, &location.key)
            .await?
            .ok_or_else(|| {
                Error::ocr_service(
                    "Failed to start job",
                    format!("unable to get object {}/{}", location.bucket, location.key),
                )
            })?;

        let blocks = tokio::task::spawn_blocking(move || page_blocks(&object.body, mode))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?;

        let job_id = uuid::Uuid::new_v4().simple().to_string();
        tracing::info!(
            "Local {} job {} for {} produced {} blocks",
            mode,
            job_id,
            request.job_tag,
            blocks.len()
        );
        self.retain(job_id.clone(), mode, blocks);
        Ok(job_id)
    }

    fn page(&self, mode: OcrMode, job_id: &str, next_token: Option<String>) -> Result<ResultPage> {
        let context = "Failed to retrieve job results";
        let job = self
            .jobs
            .get(job_id)
            .ok_or_else(|| Error::ocr_service(context, format!("invalid job id {}", job_id)))?;
        let (job_mode, blocks) = job.value();
        if *job_mode != mode {
            return Err(Error::ocr_service(context, format!("job {} mode mismatch", job_id)));
        }

        let offset = next_token
            .map(|t| t.parse::<usize>())
            .transpose()
            .map_err(|e| Error::ocr_service(context, e))?
            .unwrap_or(0);
        let end = (offset + self.page_size).min(blocks.len());
        Ok(ResultPage {
            blocks: blocks.get(offset..end).map(<[Block]>::to_vec).unwrap_or_default(),
            next_token: (end < blocks.len()).then(|| end.to_string()),
        })
    }
}

/// One PAGE block per page, plus LINE blocks in analysis mode
fn page_blocks(data: &[u8], mode: OcrMode) -> Vec<Block> {
    let doc = match lopdf::Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("No text layer available: {}", e);
            return Vec::new();
        }
    };

    let mut blocks = Vec::new();
    for (page_num, _) in doc.get_pages() {
        let text = doc.extract_text(&[page_num]).unwrap_or_default();
        if mode == OcrMode::Analysis {
            blocks.extend(
                text.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| Block::line(page_num, l.trim())),
            );
        }
        blocks.push(Block {
            block_type: BlockType::Page,
            text: Some(text),
            page: Some(page_num),
            id: Some(format!("page-{}", page_num)),
        });
    }
    blocks
}

#[async_trait]
impl OcrServiceProvider for LocalOcrService {
    async fn start_text_detection(&self, request: &OcrJobRequest) -> Result<String> {
        self.start(OcrMode::Detection, request).await
    }

    async fn start_document_analysis(&self, request: &OcrJobRequest) -> Result<String> {
        self.start(OcrMode::Analysis, request).await
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
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ocr_service::ObjectLocation;
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, store) = store().await;
        let upload = ObjectUpload::new("body")
            .content_type("text/plain")
            .user_metadata("file-name", "notes.txt");
        let meta = store.put_object("src", "doc-1", upload).await.unwrap();
        assert_eq!(meta.content_length, 4);

        let obj = store.get_object("src", "doc-1").await.unwrap().unwrap();
        assert_eq!(&obj.body[..], b"body");
        assert_eq!(obj.metadata.content_type.as_deref(), Some("text/plain"));

        store.delete_object("src", "doc-1").await.unwrap();
        assert!(store.head_object("src", "doc-1").await.unwrap().is_none());
        // deleting twice is fine
        store.delete_object("src", "doc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_tags_persist_in_sidecar() {
        let (dir, store) = store().await;
        store.put_object("src", "d", ObjectUpload::new("x")).await.unwrap();
        store
            .put_tags("src", "d", vec![Tag::new("ocr-status", "Submitted")])
            .await
            .unwrap();

        let reopened = LocalObjectStore::new(dir.path()).await.unwrap();
        let tags = reopened.get_tags("src", "d").await.unwrap();
        assert_eq!(tags, vec![Tag::new("ocr-status", "Submitted")]);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (_dir, store) = store().await;
        assert!(store
            .put_object("src", "../escape", ObjectUpload::new("x"))
            .await
            .is_err());
        assert!(store.head_object("src", "/abs").await.is_err());
    }

    #[tokio::test]
    async fn test_ocr_on_non_pdf_yields_no_blocks() {
        let (_dir, store) = store().await;
        let store: Arc<dyn ObjectStoreProvider> = Arc::new(store);
        store
            .put_object("src", "img", ObjectUpload::new("not a pdf"))
            .await
            .unwrap();

        let ocr = LocalOcrService::new(store);
        let request = OcrJobRequest {
            location: ObjectLocation {
                bucket: "src".into(),
                key: "img".into(),
            },
            notification: None,
            job_tag: "img".into(),
        };
        let job = ocr.start_text_detection(&request).await.unwrap();
        let page = ocr.get_text_detection(&job, None).await.unwrap();
        assert!(page.blocks.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_ocr_missing_object() {
        let (_dir, store) = store().await;
        let ocr = LocalOcrService::new(Arc::new(store));
        let request = OcrJobRequest {
            location: ObjectLocation {
                bucket: "src".into(),
                key: "nope".into(),
            },
            notification: None,
            job_tag: "nope".into(),
        };
        assert!(matches!(
            ocr.start_text_detection(&request).await,
            Err(Error::OcrService { .. })
        ));
    }

    #[tokio::test]
    async fn test_ocr_results_expire_beyond_retention() {
        let (_dir, store) = store().await;
        let store: Arc<dyn ObjectStoreProvider> = Arc::new(store);
        store
            .put_object("src", "img", ObjectUpload::new("not a pdf"))
            .await
            .unwrap();
        let ocr = LocalOcrService::with_retained_jobs(store, 2);
        let request = OcrJobRequest {
            location: ObjectLocation {
                bucket: "src".into(),
                key: "img".into(),
            },
            notification: None,
            job_tag: "img".into(),
        };

        let mut jobs = Vec::new();
        for _ in 0..3 {
            jobs.push(ocr.start_text_detection(&request).await.unwrap());
        }
        assert_eq!(ocr.jobs.len(), 2);
        assert!(ocr.get_text_detection(&jobs[0], None).await.is_err());
        // retained results can be read more than once
        for job in &jobs[1..] {
            assert!(ocr.get_text_detection(job, None).await.is_ok());
            assert!(ocr.get_text_detection(job, None).await.is_ok());
        }
    }
}
