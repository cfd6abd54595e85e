//! The extraction strategies. Each turns document bytes into page text,
//! per-page reports and (for table-aware parsing) tables.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::confidence::{analyze_ocr_quality, average_ocr_confidence};
use super::sanitize::normalize_page_text;
use super::types::{
    ExtractedTable, ExtractionMethod, ExtractionWarning, OcrEngine, PageRasterizer, PageReport,
    TableParser, TextLayerParser,
};
use super::ExtractionError;

/// What a strategy produced, before field recognition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub pages_processed: usize,
    pub raw_text: String,
    pub pages: Vec<PageReport>,
    pub tables: Vec<ExtractedTable>,
    pub ocr_confidence: Option<f32>,
    pub warnings: Vec<ExtractionWarning>,
}

fn push_page(raw_text: &mut String, marker: &str, text: &str) {
    raw_text.push('\n');
    raw_text.push_str(marker);
    raw_text.push('\n');
    raw_text.push_str(text);
    raw_text.push('\n');
}

/// Embedded text layer, page by page. Any parser error fails the document.
pub fn run_fast_text(
    parser: &dyn TextLayerParser,
    pdf_bytes: &[u8],
) -> Result<StrategyOutput, ExtractionError> {
    let pages = parser.extract_pages(pdf_bytes)?;
    let mut output = StrategyOutput {
        pages_processed: pages.len(),
        ..StrategyOutput::default()
    };

    for (idx, raw) in pages.iter().enumerate() {
        let page_number = idx + 1;
        let text = normalize_page_text(raw);
        push_page(&mut output.raw_text, &format!("--- Page {page_number} ---"), &text);
        output.pages.push(PageReport::text(page_number, &text));
    }

    Ok(output)
}

/// Text plus tables. Pages fail independently; opening the document does not.
pub fn run_table_aware(
    parser: &dyn TableParser,
    pdf_bytes: &[u8],
) -> Result<StrategyOutput, ExtractionError> {
    let pages = parser.parse_pages(pdf_bytes)?;
    let mut output = StrategyOutput {
        pages_processed: pages.len(),
        ..StrategyOutput::default()
    };

    for (idx, page) in pages.into_iter().enumerate() {
        let page_number = idx + 1;
        match page {
            Ok(layout) => {
                let text = normalize_page_text(&layout.text);
                if !text.is_empty() {
                    push_page(&mut output.raw_text, &format!("--- Page {page_number} ---"), &text);
                }

                let mut report = PageReport::text(page_number, &text);
                report.table_count = layout.tables.len();
                output.pages.push(report);

                output.tables.extend(
                    layout
                        .tables
                        .into_iter()
                        .enumerate()
                        .map(|(i, rows)| ExtractedTable::new(page_number, i + 1, rows)),
                );
            }
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "Page extraction failed, continuing");
                let reason = e.to_string();
                output.pages.push(PageReport::failed(page_number, reason.clone()));
                output.warnings.push(ExtractionWarning::PageExtractionFailed {
                    page: page_number,
                    reason,
                });
            }
        }
    }

    Ok(output)
}

/// Rasterize each page and OCR it. Any render or OCR failure fails the
/// document; no partial results are returned.
pub fn run_ocr(
    rasterizer: &dyn PageRasterizer,
    engine: &dyn OcrEngine,
    pdf_bytes: &[u8],
    dpi: u32,
) -> Result<StrategyOutput, ExtractionError> {
    let page_count = rasterizer.page_count(pdf_bytes)?;
    let mut output = StrategyOutput {
        pages_processed: page_count,
        ..StrategyOutput::default()
    };

    for page_index in 0..page_count {
        let page_number = page_index + 1;
        let image = rasterizer.render_page(pdf_bytes, page_index, dpi)?;
        let ocr = engine.ocr_image(&image)?;
        let text = normalize_page_text(&ocr.text);

        tracing::debug!(
            page = page_number,
            confidence = ocr.confidence,
            chars = text.len(),
            "OCR page complete"
        );

        push_page(
            &mut output.raw_text,
            &format!("--- Page {page_number} (OCR) ---"),
            &text,
        );

        let mut report = PageReport::text(page_number, &text);
        report.ocr_confidence = Some(ocr.confidence);
        output.pages.push(report);
        output
            .warnings
            .extend(analyze_ocr_quality(page_number, ocr.confidence));
    }

    output.ocr_confidence = average_ocr_confidence(&output.pages);
    Ok(output)
}

/// No backend at all: succeed with nothing.
pub fn run_basic() -> StrategyOutput {
    StrategyOutput {
        warnings: vec![ExtractionWarning::NoExtractionBackend],
        ..StrategyOutput::default()
    }
}

/// Run a strategy, converting a backend panic into an error.
pub fn guarded<F>(method: ExtractionMethod, run: F) -> Result<StrategyOutput, ExtractionError>
where
    F: FnOnce() -> Result<StrategyOutput, ExtractionError>,
{
    catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(method = %method, panic = %message, "Extraction backend panicked");
        Err(ExtractionError::BackendPanic { method, message })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
