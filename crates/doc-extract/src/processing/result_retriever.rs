//! Paged retrieval of finished OCR job results

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::OcrMode;
use crate::error::{Error, Result};
use crate::providers::{Block, BlockType, OcrServiceProvider, ResultPage};

/// Everything a finished job produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedResults {
    /// Page block text, concatenated in arrival order
    pub text: String,
    /// Every block from every page of results
    pub blocks: Vec<Block>,
    /// Number of result pages fetched
    pub calls: usize,
}

/// Walks a job's continuation tokens until exhausted
pub struct OcrResultRetriever {
    ocr: Arc<dyn OcrServiceProvider>,
    mode: OcrMode,
}

impl OcrResultRetriever {
    pub fn new(ocr: Arc<dyn OcrServiceProvider>, mode: OcrMode) -> Self {
        Self { ocr, mode }
    }

    async fn fetch(&self, job_id: &str, token: Option<String>) -> Result<ResultPage> {
        match self.mode {
            OcrMode::Detection => self.ocr.get_text_detection(job_id, token).await,
            OcrMode::Analysis => self.ocr.get_document_analysis(job_id, token).await,
        }
    }

    /// Fetch all result pages for `job_id`. A job with no blocks yields empty text.
    pub async fn retrieve(&self, job_id: &str) -> Result<RetrievedResults> {
        let mut results = RetrievedResults::default();
        let mut seen = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.fetch(job_id, token.take()).await?;
            results.calls += 1;

            for block in &page.blocks {
                if block.block_type == BlockType::Page {
                    results.text.push_str(block.text.as_deref().unwrap_or_default());
                }
            }
            results.blocks.extend(page.blocks);

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(Error::ocr_service(
                            format!("Failed to retrieve results of job {}", job_id),
                            format!("continuation token {} returned twice", next),
                        ));
                    }
                    token = Some(next);
                }
                None => break,
            }
        }

        tracing::debug!(
            "Job {} ({}): {} blocks in {} result pages",
            job_id,
            self.mode,
            results.blocks.len(),
            results.calls
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ocr_service::MockOcrServiceProvider;
    use crate::providers::{InMemoryOcrService, ObjectLocation, OcrJobRequest};

    fn fixture() -> Vec<Block> {
        vec![
            Block::page(1, "first page. "),
            Block::line(1, "first page."),
            Block::page(2, "second page. "),
            Block::line(2, "second page."),
            Block {
                block_type: BlockType::Page,
                text: None,
                page: Some(3),
                id: None,
            },
            Block::page(4, "fourth page."),
        ]
    }

    async fn retrieve_with_page_size(page_size: usize, mode: OcrMode) -> RetrievedResults {
        let ocr = Arc::new(InMemoryOcrService::with_page_size(page_size));
        ocr.set_blocks("doc", fixture());
        let request = OcrJobRequest {
            location: ObjectLocation {
                bucket: "src".into(),
                key: "doc".into(),
            },
            notification: None,
            job_tag: "doc".into(),
        };
        let job = match mode {
            OcrMode::Detection => ocr.start_text_detection(&request).await.unwrap(),
            OcrMode::Analysis => ocr.start_document_analysis(&request).await.unwrap(),
        };
        OcrResultRetriever::new(ocr, mode).retrieve(&job).await.unwrap()
    }

    #[tokio::test]
    async fn test_split_pages_match_single_page() {
        let whole = retrieve_with_page_size(1000, OcrMode::Detection).await;
        assert_eq!(whole.calls, 1);
        assert_eq!(whole.text, "first page. second page. fourth page.");

        for size in 1..=5 {
            let split = retrieve_with_page_size(size, OcrMode::Detection).await;
            assert_eq!(split.text, whole.text, "page size {size}");
            assert_eq!(split.blocks, whole.blocks, "page size {size}");
            assert!(split.calls > 1);
        }
    }

    #[tokio::test]
    async fn test_analysis_mode_uses_analysis_results() {
        let results = retrieve_with_page_size(2, OcrMode::Analysis).await;
        assert_eq!(results.blocks.len(), 6);
        assert_eq!(results.calls, 3);
    }

    #[tokio::test]
    async fn test_empty_results() {
        let mut mock = MockOcrServiceProvider::new();
        mock.expect_get_text_detection()
            .withf(|job, token| job.to_string() == "job-1" && token.is_none())
            .times(1)
            .returning(|_, _| Ok(ResultPage::default()));

        let results = OcrResultRetriever::new(Arc::new(mock), OcrMode::Detection)
            .retrieve("job-1")
            .await
            .unwrap();
        assert!(results.text.is_empty());
        assert!(results.blocks.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_token_is_an_error() {
        let mut mock = MockOcrServiceProvider::new();
        mock.expect_get_text_detection().returning(|_, _| {
            Ok(ResultPage {
                blocks: vec![Block::page(1, "again")],
                next_token: Some("same".into()),
            })
        });

        let err = OcrResultRetriever::new(Arc::new(mock), OcrMode::Detection)
            .retrieve("job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OcrService { .. }));
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let mut mock = MockOcrServiceProvider::new();
        mock.expect_get_document_analysis()
            .returning(|_, _| Err(Error::ocr_service("failed to retrieve analyzed text", "throttled")));

        let result = OcrResultRetriever::new(Arc::new(mock), OcrMode::Analysis)
            .retrieve("job-1")
            .await;
        assert!(matches!(result, Err(Error::OcrService { .. })));
    }
}
