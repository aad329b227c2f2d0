//! Extraction status of a stored document

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Progress of text extraction for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ExtractStatus {
    /// Stored, not yet submitted
    #[default]
    New,
    /// OCR job in flight
    Submitted,
    /// Terminal, results available
    Succeeded,
    /// Terminal, no results
    Failed,
}

impl ExtractStatus {
    /// Parse a status string. Anything unrecognized is `New`.
    ///
    /// Matching ignores case so OCR service statuses (`SUCCEEDED`, `FAILED`) map
    /// onto the same variants.
    pub fn of(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }

    /// Strict variant of [`ExtractStatus::of`]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "submitted" => Some(Self::Submitted),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Submitted => "Submitted",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: ExtractStatus) -> bool {
        use ExtractStatus::*;
        matches!(
            (self, next),
            (New, Submitted) | (New, Succeeded) | (Submitted, Succeeded) | (Submitted, Failed)
        )
    }
}

impl fmt::Display for ExtractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExtractStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::of(&raw))
    }
}
