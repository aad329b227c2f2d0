//! Application state for the extraction server

use std::sync::Arc;

use crate::config::{BackendProvider, ExtractConfig};
#[cfg(not(feature = "aws"))]
use crate::error::Error;
use crate::error::Result;
use crate::orchestrator::ExtractionOrchestrator;
use crate::providers::{
    InMemoryObjectStore, InMemoryOcrService, LocalObjectStore, LocalOcrService,
    ObjectStoreProvider, OcrServiceProvider,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ExtractionOrchestrator>,
}

impl AppState {
    /// Build providers for the configured backend
    pub async fn new(config: Arc<ExtractConfig>) -> Result<Self> {
        tracing::info!(
            "Initializing extraction state (backend: {:?}, mode: {})...",
            config.backend,
            config.ocr_mode
        );

        let (store, ocr): (Arc<dyn ObjectStoreProvider>, Arc<dyn OcrServiceProvider>) =
            match config.backend {
                BackendProvider::Memory => {
                    tracing::warn!("Using in-memory backend, nothing is persisted");
                    (
                        Arc::new(InMemoryObjectStore::new()),
                        Arc::new(InMemoryOcrService::new()),
                    )
                }
                BackendProvider::Local => {
                    let store: Arc<dyn ObjectStoreProvider> =
                        Arc::new(LocalObjectStore::new(&config.storage_root).await?);
                    tracing::info!("Using local backend at {:?}", config.storage_root);
                    let ocr = Arc::new(LocalOcrService::new(store.clone()));
                    (store, ocr)
                }
                BackendProvider::Aws => {
                    #[cfg(feature = "aws")]
                    {
                        use crate::providers::aws::{load_sdk_config, S3ObjectStore, TextractService};

                        let sdk_config = load_sdk_config(config.region.clone()).await;
                        tracing::info!(
                            "Using AWS backend (source: {}, destination: {})",
                            config.source_bucket,
                            config.destination_bucket
                        );
                        (
                            Arc::new(S3ObjectStore::new(&sdk_config)),
                            Arc::new(TextractService::new(&sdk_config)),
                        )
                    }
                    #[cfg(not(feature = "aws"))]
                    {
                        return Err(Error::Config(
                            "AWS backend selected but aws feature is not enabled. \
                             Rebuild with --features aws"
                                .to_string(),
                        ));
                    }
                }
            };

        tracing::info!("Providers ready (store: {}, ocr: {})", store.name(), ocr.name());
        Ok(Self::from_orchestrator(Arc::new(ExtractionOrchestrator::new(
            config, store, ocr,
        ))))
    }

    pub fn from_orchestrator(orchestrator: Arc<ExtractionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &ExtractionOrchestrator {
        &self.orchestrator
    }
}
