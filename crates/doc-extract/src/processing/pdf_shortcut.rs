//! Local text shortcut for PDFs with a real text layer
//!
//! A PDF whose embedded text is dense enough relative to its page count is
//! assumed to be born-digital (not a scan), so its text is used directly and
//! no remote OCR job is started.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::ObjectStoreProvider;
use crate::types::ExtractedPdfText;

/// Characters on an assumed dense page of text
pub const ASSUMED_MAX_CHARS_PER_PAGE: usize = 528;

/// Whether `text_len` characters over `page_count` pages exceed
/// `threshold_percent` percent of a dense page per page.
///
/// Equality does not trigger the shortcut.
pub fn shortcut_applies(text_len: usize, page_count: usize, threshold_percent: u32) -> bool {
    let found = text_len as u128 * 100;
    let required =
        threshold_percent as u128 * page_count as u128 * ASSUMED_MAX_CHARS_PER_PAGE as u128;
    found > required
}

/// Reads the text layer and page count of a PDF file
pub trait PdfTextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> std::result::Result<ExtractedPdfText, String>;
}

/// pdf-extract for text (lopdf as fallback), lopdf for the page count
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPdfTextExtractor;

impl PdfTextExtractor for DefaultPdfTextExtractor {
    fn extract(&self, path: &Path) -> std::result::Result<ExtractedPdfText, String> {
        let data = std::fs::read(path).map_err(|e| e.to_string())?;
        let doc = lopdf::Document::load_mem(&data).map_err(|e| format!("Failed to load PDF: {}", e))?;
        let pages = doc.get_pages();

        let text = match pdf_extract::extract_text_from_mem(&data) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("pdf-extract failed ({}), falling back to lopdf", e);
                let numbers: Vec<u32> = pages.keys().copied().collect();
                doc.extract_text(&numbers)
                    .map_err(|e| format!("Failed to extract text: {}", e))?
            }
        };

        Ok(ExtractedPdfText::new(text, pages.len()))
    }
}

/// Result of evaluating one document
#[derive(Debug, Clone)]
pub struct ShortcutOutcome {
    pub extracted: ExtractedPdfText,
    pub applies: bool,
}

/// Downloads a PDF to a transient file, reads its text and applies the threshold
pub struct PdfShortcutEvaluator {
    store: Arc<dyn ObjectStoreProvider>,
    bucket: String,
    temp_dir: PathBuf,
    threshold_percent: u32,
    extractor: Arc<dyn PdfTextExtractor>,
}

impl PdfShortcutEvaluator {
    pub fn new(
        store: Arc<dyn ObjectStoreProvider>,
        bucket: impl Into<String>,
        temp_dir: impl Into<PathBuf>,
        threshold_percent: u32,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            temp_dir: temp_dir.into(),
            threshold_percent,
            extractor: Arc::new(DefaultPdfTextExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfTextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Extract and decide. Parse failures are errors, never "no shortcut".
    pub async fn evaluate(&self, identifier: &str) -> Result<ShortcutOutcome> {
        let extracted = self.extract(identifier).await?;
        let applies = shortcut_applies(
            extracted.text_len(),
            extracted.page_count,
            self.threshold_percent,
        );
        tracing::debug!(
            "{}: {} chars over {} pages, threshold {}%, shortcut={}",
            identifier,
            extracted.text_len(),
            extracted.page_count,
            self.threshold_percent,
            applies
        );
        Ok(ShortcutOutcome { extracted, applies })
    }

    /// The transient copy is removed on every exit path when it drops
    async fn extract(&self, identifier: &str) -> Result<ExtractedPdfText> {
        let object = self
            .store
            .get_object(&self.bucket, identifier)
            .await?
            .ok_or_else(|| Error::not_found(identifier))?;

        let temp_dir = self.temp_dir.clone();
        let extractor = self.extractor.clone();
        let id = identifier.to_string();

        tokio::task::spawn_blocking(move || {
            let mut temp = tempfile::Builder::new()
                .prefix("doc-extract-")
                .suffix(".pdf")
                .tempfile_in(&temp_dir)
                .map_err(|e| Error::pdf_parse(&id, format!("Failed to create temp file: {}", e)))?;
            temp.write_all(&object.body)
                .and_then(|_| temp.flush())
                .map_err(|e| Error::pdf_parse(&id, format!("Failed to write temp file: {}", e)))?;

            extractor
                .extract(temp.path())
                .map_err(|cause| Error::pdf_parse(&id, cause))
        })
        .await
        .map_err(|e| Error::pdf_parse(identifier, format!("Extraction task failed: {}", e)))?
    }
}
