//! Extraction processing: local PDF text shortcut and OCR result paging

pub mod pdf_shortcut;
pub mod result_retriever;

pub use pdf_shortcut::{
    shortcut_applies, DefaultPdfTextExtractor, PdfShortcutEvaluator, PdfTextExtractor,
    ShortcutOutcome, ASSUMED_MAX_CHARS_PER_PAGE,
};
pub use result_retriever::{OcrResultRetriever, RetrievedResults};
