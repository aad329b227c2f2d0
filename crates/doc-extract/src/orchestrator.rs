//! Document extraction orchestrator
//!
//! Stores documents, decides per document whether remote OCR is needed, submits
//! and tracks OCR jobs, and moves finished results to the destination bucket.
//! Status transitions:
//!
//! ```text
//! New ──submit──▶ Submitted ──complete──▶ Succeeded | Failed
//!  └────submit (local text shortcut)────▶ Succeeded
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::{ExtractConfig, OcrMode};
use crate::error::{Error, ErrorKind, Result};
use crate::processing::{OcrResultRetriever, PdfShortcutEvaluator, PdfTextExtractor};
use crate::providers::object_store::{METADATA_KEY_FILE_NAME, METADATA_KEY_IDENTIFIER};
use crate::providers::{
    NotificationChannel, ObjectLocation, ObjectMetadata, ObjectStoreProvider, ObjectUpload,
    OcrJobRequest, OcrServiceProvider,
};
use crate::storage::{structured_key, text_key, StatusRecord, StatusTagStore};
use crate::types::{Document, ExtractStatus, Request, Response};

const TEXT_CONTENT_TYPE: &str = "text/plain";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreMode {
    Create,
    Replace,
}

/// What to do with a completion notification
#[derive(Debug, PartialEq, Eq)]
enum CompletionAction {
    Persist { job_id: String },
    MarkFailed { job_id: String },
    Ignore(String),
}

/// Single entry point for every document operation
pub struct ExtractionOrchestrator {
    config: Arc<ExtractConfig>,
    store: Arc<dyn ObjectStoreProvider>,
    ocr: Arc<dyn OcrServiceProvider>,
    status: StatusTagStore,
    evaluator: PdfShortcutEvaluator,
    retriever: OcrResultRetriever,
}

impl ExtractionOrchestrator {
    pub fn new(
        config: Arc<ExtractConfig>,
        store: Arc<dyn ObjectStoreProvider>,
        ocr: Arc<dyn OcrServiceProvider>,
    ) -> Self {
        let status = StatusTagStore::new(store.clone(), config.source_bucket.clone());
        let evaluator = PdfShortcutEvaluator::new(
            store.clone(),
            config.source_bucket.clone(),
            config.temp_dir(),
            config.min_text_percentage_to_skip_ocr,
        );
        let retriever = OcrResultRetriever::new(ocr.clone(), config.ocr_mode);
        Self {
            config,
            store,
            ocr,
            status,
            evaluator,
            retriever,
        }
    }

    /// Replace the PDF text extractor used by the local shortcut
    pub fn with_pdf_extractor(mut self, extractor: Arc<dyn PdfTextExtractor>) -> Self {
        self.evaluator = self.evaluator.with_extractor(extractor);
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Run one request to completion. Failures become typed responses.
    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method();
        let result = match request {
            Request::Create(doc) => self.store_document(doc, StoreMode::Create).await,
            Request::Replace(doc) => self.store_document(doc, StoreMode::Replace).await,
            Request::Fetch(id) => self.fetch(&id).await,
            Request::Metadata(id) => self.metadata(&id).await.map(Response::with_document),
            Request::Delete(id) => self.delete(&id).await,
            Request::Submit(id) => self.submit(&id).await,
            Request::Complete {
                identifier,
                status,
                job_id,
            } => self.complete(&identifier, status, job_id).await,
            Request::FetchText(id) => {
                self.fetch_artifact(&id, text_key(&id), TEXT_CONTENT_TYPE).await
            }
            Request::FetchStructured(id) => {
                self.fetch_artifact(&id, structured_key(&id), JSON_CONTENT_TYPE)
                    .await
            }
            Request::Presign(id) => self.presign(id).await,
        };

        match result {
            Ok(response) => response,
            Err(err) => {
                match err.kind() {
                    ErrorKind::Service => tracing::error!("{} failed: {}", method, err),
                    ErrorKind::NotFound => tracing::info!("{}: {}", method, err),
                    ErrorKind::Client => tracing::debug!("{} rejected: {}", method, err),
                }
                Response::failure(err)
            }
        }
    }

    fn source(&self) -> &str {
        &self.config.source_bucket
    }

    fn destination(&self) -> &str {
        &self.config.destination_bucket
    }

    fn document_from(identifier: &str, meta: &ObjectMetadata, record: StatusRecord) -> Document {
        Document::builder()
            .identifier(identifier)
            .maybe_filename(meta.user_metadata.get(METADATA_KEY_FILE_NAME).cloned())
            .maybe_content_type(meta.content_type.clone())
            .content_length(meta.content_length)
            .status(record.status)
            .job_id(record.job_id)
            .build()
    }

    /// Content first, then the `New` status tag. The two writes are not atomic;
    /// an untagged object reads as `New`.
    async fn store_document(&self, mut doc: Document, mode: StoreMode) -> Result<Response> {
        let id = doc.identifier_if_absent().to_string();
        tracing::debug!("store({}, {:?})", id, mode);

        let exists = self.store.head_object(self.source(), &id).await?.is_some();
        match (mode, exists) {
            (StoreMode::Create, true) => return Err(Error::Conflict(id)),
            (StoreMode::Replace, false) => return Err(Error::not_found(id)),
            _ => {}
        }

        let body = match doc.take_body() {
            Some(body) => body.into_bytes().await.map_err(Error::upload)?,
            None => Bytes::new(),
        };
        if body.is_empty() {
            return Err(Error::invalid(
                "Invalid store request",
                "body",
                "must not be null or empty",
            ));
        }

        let mut upload = ObjectUpload::new(body).user_metadata(METADATA_KEY_IDENTIFIER, &id);
        upload.content_type = doc.content_type.clone();
        if let Some(filename) = &doc.filename {
            upload = upload.user_metadata(METADATA_KEY_FILE_NAME, filename);
        }

        let meta = self.store.put_object(self.source(), &id, upload).await?;
        self.status.write(&id, ExtractStatus::New, None).await?;

        tracing::info!(
            "Stored {} ({} bytes, {:?})",
            id,
            meta.content_length,
            meta.content_type
        );
        Ok(Response::with_document(Self::document_from(
            &id,
            &meta,
            StatusRecord::default(),
        )))
    }

    async fn fetch(&self, id: &str) -> Result<Response> {
        tracing::debug!("fetch({})", id);
        let object = self
            .store
            .get_object(self.source(), id)
            .await?
            .ok_or_else(|| Error::not_found(id))?;
        let record = self.status.read(id).await?;

        let doc = Document::builder()
            .with_metadata_of(&Self::document_from(id, &object.metadata, record))
            .body(object.body)
            .build();
        Ok(Response::with_document(doc))
    }

    /// Metadata, status and job id without the body
    pub async fn metadata(&self, id: &str) -> Result<Document> {
        tracing::debug!("metadata({})", id);
        let meta = self
            .store
            .head_object(self.source(), id)
            .await?
            .ok_or_else(|| Error::not_found(id))?;
        let record = self.status.read(id).await?;
        Ok(Self::document_from(id, &meta, record))
    }

    async fn delete(&self, id: &str) -> Result<Response> {
        let existing = self.metadata(id).await?;
        self.store.delete_object(self.source(), id).await?;
        tracing::info!("Deleted {}", id);
        Ok(Response::with_document(existing))
    }

    async fn submit(&self, id: &str) -> Result<Response> {
        let mut doc = self.metadata(id).await?;
        if !doc.status.can_transition_to(ExtractStatus::Submitted) {
            tracing::warn!("{} submitted while {}, ignoring", id, doc.status);
            return Err(Error::Conflict(format!(
                "{} is already {}",
                id, doc.status
            )));
        }

        if doc.is_pdf() {
            let size = doc.content_length.unwrap_or_default();
            if size > self.config.large_file_threshold {
                tracing::info!(
                    "{} is {} bytes (> {}), skipping local text evaluation",
                    id,
                    size,
                    self.config.large_file_threshold
                );
            } else {
                let outcome = self.evaluator.evaluate(id).await?;
                if outcome.applies {
                    self.put_artifact(&text_key(id), outcome.extracted.text, TEXT_CONTENT_TYPE)
                        .await?;
                    self.status.write(id, ExtractStatus::Succeeded, None).await?;
                    tracing::info!("{} has sufficient embedded text, OCR skipped", id);

                    doc.status = ExtractStatus::Succeeded;
                    doc.job_id = None;
                    return Ok(Response::with_document(doc));
                }
            }
        }

        let job_request = self.job_request(id);
        let job_id = match self.config.ocr_mode {
            OcrMode::Detection => self.ocr.start_text_detection(&job_request).await?,
            OcrMode::Analysis => self.ocr.start_document_analysis(&job_request).await?,
        };
        self.status
            .write(id, ExtractStatus::Submitted, Some(&job_id))
            .await?;
        tracing::info!(
            "{} submitted for {} as job {}",
            id,
            self.config.ocr_mode,
            job_id
        );

        doc.status = ExtractStatus::Submitted;
        doc.job_id = Some(job_id);
        Ok(Response::with_document(doc))
    }

    fn job_request(&self, id: &str) -> OcrJobRequest {
        let notification = match (
            &self.config.notification.topic_arn,
            &self.config.notification.role_arn,
        ) {
            (Some(topic_arn), Some(role_arn)) => Some(NotificationChannel {
                topic_arn: topic_arn.clone(),
                role_arn: role_arn.clone(),
            }),
            _ => None,
        };
        OcrJobRequest {
            location: ObjectLocation {
                bucket: self.source().to_string(),
                key: id.to_string(),
            },
            notification,
            job_tag: id.to_string(),
        }
    }

    /// Completions move a `Submitted` document to a terminal status, or repeat the
    /// outcome a document already has. Either way the notified job must be the job
    /// on record, so results of a superseded job are never persisted.
    fn completion_action(
        record: &StatusRecord,
        reported: ExtractStatus,
        notified_job: Option<String>,
    ) -> CompletionAction {
        if !reported.is_terminal() {
            return CompletionAction::Ignore(format!("status {} is not terminal", reported));
        }
        let expected = match record.status {
            ExtractStatus::Submitted if record.status.can_transition_to(reported) => {
                record.job_id.as_ref()
            }
            // redelivered notification
            current if current == reported => record.completed_job_id.as_ref(),
            current => {
                return CompletionAction::Ignore(format!(
                    "cannot move from {} to {}",
                    current, reported
                ))
            }
        };

        let job_id = match (notified_job, expected) {
            (Some(notified), Some(expected)) if &notified != expected => {
                return CompletionAction::Ignore(format!(
                    "job {} is stale, job on record is {}",
                    notified, expected
                ))
            }
            (Some(notified), None) => {
                return CompletionAction::Ignore(format!("job {} is not on record", notified))
            }
            (_, Some(expected)) => expected.clone(),
            (None, None) => return CompletionAction::Ignore("no job id known".to_string()),
        };
        match reported {
            ExtractStatus::Failed => CompletionAction::MarkFailed { job_id },
            _ => CompletionAction::Persist { job_id },
        }
    }

    async fn complete(
        &self,
        id: &str,
        reported: ExtractStatus,
        job_id: Option<String>,
    ) -> Result<Response> {
        tracing::debug!("complete({}, {}, {:?})", id, reported, job_id);
        let mut doc = self.metadata(id).await?;
        let record = self.status.read(id).await?;

        match Self::completion_action(&record, reported, job_id) {
            CompletionAction::Persist { job_id } => {
                tracing::info!("{} OCR status SUCCEEDED, moving results to destination", id);
                let results = self.retriever.retrieve(&job_id).await?;
                self.put_artifact(&text_key(id), results.text, TEXT_CONTENT_TYPE)
                    .await?;
                if self.config.ocr_mode == OcrMode::Analysis {
                    let json = serde_json::to_vec(&results.blocks)?;
                    self.put_artifact(&structured_key(id), json, JSON_CONTENT_TYPE)
                        .await?;
                }
                self.status
                    .write(id, ExtractStatus::Succeeded, Some(&job_id))
                    .await?;
                doc.status = ExtractStatus::Succeeded;
                doc.job_id = None;
                Ok(Response::with_document(doc))
            }
            CompletionAction::MarkFailed { job_id } => {
                tracing::info!("{} OCR job {} FAILED, no results available", id, job_id);
                self.status
                    .write(id, ExtractStatus::Failed, Some(&job_id))
                    .await?;
                doc.status = ExtractStatus::Failed;
                doc.job_id = None;
                // the notification was handled even though the document failed
                Ok(Response::with_document(doc))
            }
            CompletionAction::Ignore(reason) => {
                tracing::warn!(
                    "Ignoring {} completion for document [{}]: {}",
                    reported,
                    id,
                    reason
                );
                Ok(Response::with_document(doc))
            }
        }
    }

    async fn put_artifact(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<()> {
        let upload = ObjectUpload::new(body).content_type(content_type);
        let meta = self.store.put_object(self.destination(), key, upload).await?;
        tracing::info!(
            "Saved {} ({} bytes) to {}",
            key,
            meta.content_length,
            self.destination()
        );
        Ok(())
    }

    async fn fetch_artifact(&self, id: &str, key: String, content_type: &str) -> Result<Response> {
        tracing::debug!("fetch_artifact({})", key);
        let object = self
            .store
            .get_object(self.destination(), &key)
            .await?
            .ok_or_else(|| Error::not_found(&key))?;

        let doc = Document::builder()
            .identifier(id)
            .filename(key)
            .content_type(
                object
                    .metadata
                    .content_type
                    .unwrap_or_else(|| content_type.to_string()),
            )
            .content_length(object.metadata.content_length)
            .status(ExtractStatus::Succeeded)
            .body(object.body)
            .build();
        Ok(Response::with_document(doc))
    }

    async fn presign(&self, id: Option<String>) -> Result<Response> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let ttl = Duration::from_secs(self.config.presigned_url_expiration_secs);
        let url = self.store.presign_put(self.source(), &id, ttl).await?;
        tracing::debug!("presigned upload for {} valid {}s", id, ttl.as_secs());
        Ok(Response::presigned(Document::with_identifier(id), url))
    }
}
