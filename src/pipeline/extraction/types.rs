use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExtractionError;

/// Extraction method requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedMethod {
    /// Let the method selector probe the document and choose.
    Auto,
    FastText,
    TableAware,
    Ocr,
}

impl RequestedMethod {
    /// The concrete method for an explicit request, `None` for `Auto`.
    pub fn explicit(self) -> Option<ExtractionMethod> {
        match self {
            Self::Auto => None,
            Self::FastText => Some(ExtractionMethod::FastText),
            Self::TableAware => Some(ExtractionMethod::TableAware),
            Self::Ocr => Some(ExtractionMethod::Ocr),
        }
    }
}

impl fmt::Display for RequestedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::FastText => write!(f, "fast_text"),
            Self::TableAware => write!(f, "table_aware"),
            Self::Ocr => write!(f, "ocr"),
        }
    }
}

impl FromStr for RequestedMethod {
    type Err = ExtractionError;

    /// Accepts the canonical names, short aliases and `-` for `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "fast_text" | "fast" | "text" => Ok(Self::FastText),
            "table_aware" | "table" | "tables" => Ok(Self::TableAware),
            "ocr" => Ok(Self::Ocr),
            other => Err(ExtractionError::Config(format!(
                "unknown extraction method '{other}'"
            ))),
        }
    }
}

/// The strategy that actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Embedded text layer, page by page.
    FastText,
    /// Positioned text runs grouped into lines, cells and tables.
    TableAware,
    /// Page rasterization followed by optical character recognition.
    Ocr,
    /// No backend available: succeeds with nothing extracted.
    Basic,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastText => "fast_text",
            Self::TableAware => "table_aware",
            Self::Ocr => "ocr",
            Self::Basic => "basic",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FastText => "Fast Text Extraction",
            Self::TableAware => "Table & Text Extraction",
            Self::Ocr => "OCR Text Recognition",
            Self::Basic => "Basic Processing (Limited functionality)",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "basic" => Ok(Self::Basic),
            other => other
                .parse::<RequestedMethod>()?
                .explicit()
                .ok_or_else(|| {
                    ExtractionError::Config("'auto' is not a concrete extraction method".into())
                }),
        }
    }
}

/// One document submitted for extraction.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub document_id: Uuid,
    pub content: Vec<u8>,
    pub filename: String,
    pub requested_method: RequestedMethod,
}

impl ExtractionRequest {
    pub fn new(content: Vec<u8>, filename: impl Into<String>, method: RequestedMethod) -> Self {
        Self {
            document_id: Uuid::new_v4(),
            content,
            filename: filename.into(),
            requested_method: method,
        }
    }
}

/// Where a recognized field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Text,
    Table,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Table => write!(f, "table"),
        }
    }
}

/// A medication-like entity recognized in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedField {
    pub name: String,
    /// Dosage as displayed: "10 mg" for text matches, the raw cell for tables.
    pub dosage: String,
    pub dosage_amount: Option<String>,
    pub dosage_unit: Option<String>,
    pub provenance: Provenance,
}

/// A table found on a page. Rows are padded to `column_count` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub page: usize,
    /// 1-based index within the page.
    pub index: usize,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl ExtractedTable {
    pub fn new(page: usize, index: usize, rows: Vec<Vec<String>>) -> Self {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(column_count, String::new());
                row
            })
            .collect();
        Self {
            page,
            index,
            row_count: rows.len(),
            column_count,
            rows,
        }
    }
}

/// Per-page extraction report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page_number: usize,
    pub char_count: usize,
    pub table_count: usize,
    pub ocr_confidence: Option<f32>,
    pub error: Option<String>,
}

impl PageReport {
    pub fn text(page_number: usize, text: &str) -> Self {
        Self {
            page_number,
            char_count: text.chars().count(),
            table_count: 0,
            ocr_confidence: None,
            error: None,
        }
    }

    pub fn failed(page_number: usize, reason: impl Into<String>) -> Self {
        Self {
            page_number,
            char_count: 0,
            table_count: 0,
            ocr_confidence: None,
            error: Some(reason.into()),
        }
    }
}

/// Document information dictionary, when readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<String>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.creator.is_none()
            && self.creation_date.is_none()
    }
}

/// Non-fatal issues noticed during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    PageExtractionFailed { page: usize, reason: String },
    LowOcrConfidence { page: usize, confidence: f32 },
    NoExtractionBackend,
}

/// Outcome of one extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub filename: String,
    pub success: bool,
    pub method_used: ExtractionMethod,
    pub pages_processed: usize,
    pub raw_text: String,
    pub pages: Vec<PageReport>,
    pub tables: Vec<ExtractedTable>,
    pub fields: Vec<RecognizedField>,
    /// Average OCR confidence (0.0-1.0). Diagnostic only.
    pub ocr_confidence: Option<f32>,
    pub metadata: Option<DocumentMetadata>,
    pub warnings: Vec<ExtractionWarning>,
    pub error: Option<String>,
}

impl ExtractionResult {
    /// A failed result: no text, no fields, `error` populated.
    pub fn failure(
        document_id: Uuid,
        filename: &str,
        method: ExtractionMethod,
        error: &ExtractionError,
    ) -> Self {
        Self {
            document_id,
            filename: filename.to_string(),
            success: false,
            method_used: method,
            pages_processed: 0,
            raw_text: String::new(),
            pages: vec![],
            tables: vec![],
            fields: vec![],
            ocr_confidence: None,
            metadata: None,
            warnings: vec![],
            error: Some(format!("Processing failed: {error}")),
        }
    }
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean confidence over recognized words (0.0-1.0).
    pub confidence: f32,
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Text and tables recovered from one page by a table-aware parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPage {
    pub page_number: usize,
    pub text: String,
    pub tables: Vec<Vec<Vec<String>>>,
}

/// Embedded text layer extraction.
pub trait TextLayerParser {
    /// One string per page, in page order.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;

    /// Text of the first page, `None` when the document has no pages.
    fn first_page_text(&self, pdf_bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        Ok(self.extract_pages(pdf_bytes)?.into_iter().next())
    }
}

/// Text plus table geometry, page by page.
///
/// The outer `Result` fails only when the document cannot be opened;
/// individual pages fail independently.
pub trait TableParser {
    fn parse_pages(
        &self,
        pdf_bytes: &[u8],
    ) -> Result<Vec<Result<LayoutPage, ExtractionError>>, ExtractionError>;
}

/// Renders PDF pages to PNG images.
pub trait PageRasterizer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render a 0-based page at the given DPI.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}
