//! Automatic method selection from a first-page probe.

use super::types::{ExtractionMethod, TextLayerParser};

/// First-page text longer than this (trimmed chars) is a digital document.
pub const DIGITAL_TEXT_THRESHOLD: usize = 50;

/// First-page text longer than this, up to the digital threshold, is
/// sparse enough to suggest a tabular layout.
pub const SPARSE_TEXT_THRESHOLD: usize = 10;

/// Result of probing the text layer on the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Trimmed character count of the first page.
    Text(usize),
    /// The parser failed (or panicked) on the document.
    Failed,
    /// No text-layer parser is available.
    Unavailable,
    /// The document has no pages.
    NoPages,
}

/// Strategies that have a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub fast_text: bool,
    pub table_aware: bool,
    pub ocr: bool,
}

impl Capabilities {
    pub fn has(&self, method: ExtractionMethod) -> bool {
        match method {
            ExtractionMethod::FastText => self.fast_text,
            ExtractionMethod::TableAware => self.table_aware,
            ExtractionMethod::Ocr => self.ocr,
            ExtractionMethod::Basic => true,
        }
    }

    fn first_available(&self, preference: &[ExtractionMethod]) -> ExtractionMethod {
        preference
            .iter()
            .copied()
            .find(|m| self.has(*m))
            .unwrap_or(ExtractionMethod::FastText)
    }
}

/// Probe the first page of the text layer.
pub fn probe_first_page(parser: Option<&dyn TextLayerParser>, pdf_bytes: &[u8]) -> ProbeOutcome {
    let Some(parser) = parser else {
        return ProbeOutcome::Unavailable;
    };

    let probed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        parser.first_page_text(pdf_bytes)
    }));

    match probed {
        Ok(Ok(Some(text))) => ProbeOutcome::Text(text.trim().chars().count()),
        Ok(Ok(None)) => ProbeOutcome::NoPages,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "First-page probe failed");
            ProbeOutcome::Failed
        }
        Err(_) => {
            tracing::warn!("Text layer parser panicked during first-page probe");
            ProbeOutcome::Failed
        }
    }
}

/// Choose a strategy from the probe outcome and the available backends.
///
/// Pure and infallible. When the preferred strategies are all missing the
/// result falls back to fast text; the caller substitutes the basic
/// strategy if that has no backend either.
pub fn select_method(capabilities: Capabilities, probe: ProbeOutcome) -> ExtractionMethod {
    use ExtractionMethod::*;

    match probe {
        ProbeOutcome::Failed | ProbeOutcome::Unavailable | ProbeOutcome::NoPages => {
            capabilities.first_available(&[TableAware, Ocr])
        }
        ProbeOutcome::Text(chars) if chars > DIGITAL_TEXT_THRESHOLD => FastText,
        ProbeOutcome::Text(chars) if chars > SPARSE_TEXT_THRESHOLD => {
            capabilities.first_available(&[TableAware])
        }
        ProbeOutcome::Text(_) => capabilities.first_available(&[Ocr, TableAware]),
    }
}
