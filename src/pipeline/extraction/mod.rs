pub mod types;
pub mod confidence;
pub mod sanitize;
pub mod pdf;
pub mod layout;
pub mod table_detect;
pub mod ocr;
pub mod pdf_renderer;
pub mod fields;
pub mod registry;
pub mod selector;
pub mod strategy;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_pdf;

pub use types::*;
pub use fields::FieldRecognizer;
pub use registry::StrategyRegistry;
pub use selector::select_method;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported format for '{filename}'. Supported: {allowed}")]
    UnsupportedFormat { filename: String, allowed: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Extraction method '{0}' is not available in this environment")]
    StrategyUnavailable(ExtractionMethod),

    #[error("Failed to open document: {0}")]
    DocumentOpen(String),

    #[error("Page {page} extraction failed: {reason}")]
    PageExtraction { page: usize, reason: String },

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("{method} backend panicked: {message}")]
    BackendPanic {
        method: ExtractionMethod,
        message: String,
    },

    #[error("Extraction worker failed: {0}")]
    Worker(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtractionError {
    /// True for errors that reject the request before any extraction runs.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::FileTooLarge { .. } | Self::StrategyUnavailable(_)
        )
    }
}
