//! Configuration for the extraction service
//!
//! Loaded once at startup (TOML file plus environment overrides) and handed to the
//! orchestrator by `Arc`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main extraction service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Backend provider (memory, local or aws)
    #[serde(default)]
    pub backend: BackendProvider,
    /// Bucket holding the submitted documents and their status tags
    #[serde(default = "default_source_bucket")]
    pub source_bucket: String,
    /// Bucket receiving the `.txt` / `.json` extraction artifacts
    #[serde(default = "default_destination_bucket")]
    pub destination_bucket: String,
    /// Lifetime of presigned upload URLs in seconds (default: 120)
    #[serde(default = "default_presigned_url_expiration")]
    pub presigned_url_expiration_secs: u64,
    /// Remote OCR mode (default: DETECTION)
    #[serde(default)]
    pub ocr_mode: OcrMode,
    /// PDFs larger than this many bytes skip the local text evaluation
    #[serde(default = "default_large_file_threshold")]
    pub large_file_threshold: u64,
    /// Percent of an assumed dense page of text at which OCR is skipped (default: 50)
    #[serde(default = "default_min_text_percentage")]
    pub min_text_percentage_to_skip_ocr: u32,
    /// Job completion notification channel
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Directory for transient downloads (default: system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Root directory for the local backend
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Region for the AWS backend
    #[serde(default)]
    pub region: Option<String>,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_source_bucket() -> String {
    "doc-extract-source".to_string()
}

fn default_destination_bucket() -> String {
    "doc-extract-destination".to_string()
}

fn default_presigned_url_expiration() -> u64 {
    120
}

fn default_large_file_threshold() -> u64 {
    1_046_528
}

fn default_min_text_percentage() -> u32 {
    50
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            backend: BackendProvider::default(),
            source_bucket: default_source_bucket(),
            destination_bucket: default_destination_bucket(),
            presigned_url_expiration_secs: default_presigned_url_expiration(),
            ocr_mode: OcrMode::default(),
            large_file_threshold: default_large_file_threshold(),
            min_text_percentage_to_skip_ocr: default_min_text_percentage(),
            notification: NotificationConfig::default(),
            temp_dir: None,
            storage_root: default_storage_root(),
            region: None,
            server: ServerConfig::default(),
        }
    }
}

impl ExtractConfig {
    /// Load from a TOML file, apply environment overrides and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Environment variables take precedence over file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SOURCE_BUCKET") {
            self.source_bucket = v;
        }
        if let Some(v) = lookup("DESTINATION_BUCKET") {
            self.destination_bucket = v;
        }
        if let Some(v) = lookup("TEXTRACT_STATUS_TOPIC") {
            self.notification.topic_arn = Some(v);
        }
        if let Some(v) = lookup("TEXTRACT_SERVICE_ROLE") {
            self.notification.role_arn = Some(v);
        }
        if let Some(v) = lookup("AWS_REGION") {
            self.region = Some(v);
        }
        match lookup("PRESIGNED_URL_EXPIRATION").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) => self.presigned_url_expiration_secs = secs,
            Some(Err(e)) => tracing::warn!("Ignoring PRESIGNED_URL_EXPIRATION: {}", e),
            None => {}
        }
        if let Some(v) = lookup("OCR_MODE") {
            match OcrMode::parse(&v) {
                Some(mode) => self.ocr_mode = mode,
                None => tracing::warn!("Ignoring unknown OCR_MODE [{}]", v),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_bucket.trim().is_empty() {
            return Err(Error::Config("source_bucket must not be empty".into()));
        }
        if self.destination_bucket.trim().is_empty() {
            return Err(Error::Config("destination_bucket must not be empty".into()));
        }
        if self.source_bucket == self.destination_bucket {
            return Err(Error::Config(
                "source_bucket and destination_bucket must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Remote OCR job flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OcrMode {
    /// Plain text detection
    #[default]
    Detection,
    /// Full layout analysis
    Analysis,
}

impl OcrMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DETECTION" => Some(Self::Detection),
            "ANALYSIS" => Some(Self::Analysis),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrMode::Detection => write!(f, "DETECTION"),
            OcrMode::Analysis => write!(f, "ANALYSIS"),
        }
    }
}

/// Where the OCR service publishes job completion
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    /// Topic receiving completion messages
    pub topic_arn: Option<String>,
    /// Role the OCR service assumes to publish
    pub role_arn: Option<String>,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Process-local maps (tests, demos)
    Memory,
    /// Filesystem object store and local PDF text OCR
    #[default]
    Local,
    /// S3 + Textract
    Aws,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}
