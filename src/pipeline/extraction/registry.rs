//! Extraction backends available in this process.
//!
//! Built once at start-up and immutable afterwards. Strategies whose
//! backend failed to load are simply absent.

use crate::config::ExtractionConfig;

use super::layout::LopdfLayoutParser;
use super::pdf::PdfTextExtractor;
use super::selector::{probe_first_page, Capabilities, ProbeOutcome};
use super::strategy::{guarded, run_basic, run_fast_text, run_ocr, run_table_aware, StrategyOutput};
use super::types::{ExtractionMethod, OcrEngine, PageRasterizer, TableParser, TextLayerParser};
use super::ExtractionError;

/// Rasterizer and OCR engine; OCR needs both.
pub struct OcrBackend {
    pub rasterizer: Box<dyn PageRasterizer + Send + Sync>,
    pub engine: Box<dyn OcrEngine + Send + Sync>,
}

#[derive(Default)]
pub struct StrategyRegistry {
    text_layer: Option<Box<dyn TextLayerParser + Send + Sync>>,
    tables: Option<Box<dyn TableParser + Send + Sync>>,
    ocr: Option<OcrBackend>,
}

impl StrategyRegistry {
    /// A registry with no backends. Every request falls back to basic.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the real backends, skipping disabled methods and any that fail
    /// to initialize.
    pub fn detect(config: &ExtractionConfig) -> Self {
        let mut registry = Self::empty();

        if config.is_enabled(ExtractionMethod::FastText) {
            registry = registry.with_text_layer(PdfTextExtractor);
        }
        if config.is_enabled(ExtractionMethod::TableAware) {
            registry = registry.with_table_parser(LopdfLayoutParser);
        }
        if config.is_enabled(ExtractionMethod::Ocr) {
            registry.ocr = load_ocr_backend(config);
        }

        tracing::info!(
            available = ?registry.available_methods(),
            "Extraction backends ready"
        );
        registry
    }

    pub fn with_text_layer(mut self, parser: impl TextLayerParser + Send + Sync + 'static) -> Self {
        self.text_layer = Some(Box::new(parser));
        self
    }

    pub fn with_table_parser(mut self, parser: impl TableParser + Send + Sync + 'static) -> Self {
        self.tables = Some(Box::new(parser));
        self
    }

    pub fn with_ocr(
        mut self,
        rasterizer: impl PageRasterizer + Send + Sync + 'static,
        engine: impl OcrEngine + Send + Sync + 'static,
    ) -> Self {
        self.ocr = Some(OcrBackend {
            rasterizer: Box::new(rasterizer),
            engine: Box::new(engine),
        });
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            fast_text: self.text_layer.is_some(),
            table_aware: self.tables.is_some(),
            ocr: self.ocr.is_some(),
        }
    }

    pub fn is_available(&self, method: ExtractionMethod) -> bool {
        self.capabilities().has(method)
    }

    /// Strategies with a backend, excluding basic.
    pub fn available_methods(&self) -> Vec<ExtractionMethod> {
        [
            ExtractionMethod::FastText,
            ExtractionMethod::TableAware,
            ExtractionMethod::Ocr,
        ]
        .into_iter()
        .filter(|m| self.is_available(*m))
        .collect()
    }

    /// Probe the first page with the text-layer parser.
    pub fn probe(&self, pdf_bytes: &[u8]) -> ProbeOutcome {
        let parser = self
            .text_layer
            .as_deref()
            .map(|p| p as &dyn TextLayerParser);
        probe_first_page(parser, pdf_bytes)
    }

    /// Run one strategy. Panics inside a backend come back as `BackendPanic`.
    pub fn run(
        &self,
        method: ExtractionMethod,
        pdf_bytes: &[u8],
        ocr_dpi: u32,
    ) -> Result<StrategyOutput, ExtractionError> {
        match method {
            ExtractionMethod::FastText => {
                let parser = self
                    .text_layer
                    .as_deref()
                    .ok_or(ExtractionError::StrategyUnavailable(method))?;
                guarded(method, || run_fast_text(parser, pdf_bytes))
            }
            ExtractionMethod::TableAware => {
                let parser = self
                    .tables
                    .as_deref()
                    .ok_or(ExtractionError::StrategyUnavailable(method))?;
                guarded(method, || run_table_aware(parser, pdf_bytes))
            }
            ExtractionMethod::Ocr => {
                let backend = self
                    .ocr
                    .as_ref()
                    .ok_or(ExtractionError::StrategyUnavailable(method))?;
                guarded(method, || {
                    run_ocr(&*backend.rasterizer, &*backend.engine, pdf_bytes, ocr_dpi)
                })
            }
            ExtractionMethod::Basic => Ok(run_basic()),
        }
    }
}

#[cfg(feature = "ocr")]
fn load_ocr_backend(config: &ExtractionConfig) -> Option<OcrBackend> {
    use super::ocr::BundledTesseract;
    use super::pdf_renderer::PdfiumRasterizer;

    let rasterizer = match PdfiumRasterizer::new(config.pdfium_library.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, OCR disabled");
            return None;
        }
    };
    let engine = match BundledTesseract::new(&config.tessdata_dir, &config.ocr_languages) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::warn!(error = %e, "Tesseract unavailable, OCR disabled");
            return None;
        }
    };

    Some(OcrBackend {
        rasterizer: Box::new(rasterizer),
        engine: Box::new(engine),
    })
}

#[cfg(not(feature = "ocr"))]
fn load_ocr_backend(_config: &ExtractionConfig) -> Option<OcrBackend> {
    tracing::info!("Built without the `ocr` feature, OCR disabled");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdf_renderer::MockPageRasterizer;
    use crate::pipeline::extraction::selector::select_method;
    use crate::pipeline::extraction::test_pdf::{content_for, make_pdf_from_contents, make_text_pdf};
    use crate::pipeline::extraction::types::ExtractionWarning;

    struct PanickingText;

    impl TextLayerParser for PanickingText {
        fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            panic!("glyph table corrupt")
        }
    }

    #[test]
    fn empty_registry_offers_nothing() {
        let registry = StrategyRegistry::empty();
        assert!(registry.available_methods().is_empty());
        assert!(registry.is_available(ExtractionMethod::Basic));
        assert_eq!(registry.probe(b"%PDF"), ProbeOutcome::Unavailable);
    }

    #[test]
    fn builder_registers_backends() {
        let registry = StrategyRegistry::empty()
            .with_text_layer(PdfTextExtractor)
            .with_ocr(MockPageRasterizer::new(1), MockOcrEngine::new("x", 0.9));
        assert_eq!(
            registry.available_methods(),
            vec![ExtractionMethod::FastText, ExtractionMethod::Ocr]
        );
        assert!(!registry.is_available(ExtractionMethod::TableAware));
    }

    #[test]
    fn detect_respects_disabled_methods() {
        let config = ExtractionConfig {
            disabled_methods: vec![ExtractionMethod::TableAware, ExtractionMethod::Ocr],
            ..ExtractionConfig::default()
        };
        let registry = StrategyRegistry::detect(&config);
        assert_eq!(registry.available_methods(), vec![ExtractionMethod::FastText]);
    }

    #[test]
    fn missing_backend_is_unavailable() {
        let registry = StrategyRegistry::empty();
        let err = registry
            .run(ExtractionMethod::TableAware, b"", 144)
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::StrategyUnavailable(ExtractionMethod::TableAware)
        ));
    }

    #[test]
    fn basic_always_runs() {
        let output = StrategyRegistry::empty()
            .run(ExtractionMethod::Basic, b"", 144)
            .unwrap();
        assert_eq!(output.warnings, vec![ExtractionWarning::NoExtractionBackend]);
    }

    #[test]
    fn run_dispatches_to_real_parsers() {
        let registry = StrategyRegistry::empty()
            .with_text_layer(PdfTextExtractor)
            .with_table_parser(LopdfLayoutParser);
        let pdf = make_text_pdf("Aspirin 81 mg");

        let fast = registry.run(ExtractionMethod::FastText, &pdf, 144).unwrap();
        assert!(fast.raw_text.starts_with("\n--- Page 1 ---\n"));
        assert!(fast.raw_text.contains("Aspirin"));

        let tables = registry.run(ExtractionMethod::TableAware, &pdf, 144).unwrap();
        assert_eq!(tables.raw_text, "\n--- Page 1 ---\nAspirin 81 mg\n");
    }

    #[test]
    fn long_first_page_selects_fast_text_despite_broken_second_page() {
        let registry = StrategyRegistry::empty()
            .with_text_layer(PdfTextExtractor)
            .with_table_parser(LopdfLayoutParser);
        let pdf = make_pdf_from_contents(
            &[
                content_for(&[(72, 700, "Metformin 500 mg twice daily with meals for blood sugar control")]),
                b"BT /F9 12 Tf 72 700 Td (Undefined font) Tj ET".to_vec(),
            ],
            None,
        );
        let probe = registry.probe(&pdf);
        assert!(matches!(probe, ProbeOutcome::Text(n) if n > 50), "got {probe:?}");
        assert_eq!(
            select_method(registry.capabilities(), probe),
            ExtractionMethod::FastText
        );
    }

    #[test]
    fn backend_panic_becomes_error() {
        let registry = StrategyRegistry::empty().with_text_layer(PanickingText);
        let err = registry.run(ExtractionMethod::FastText, b"", 144).unwrap_err();
        assert!(matches!(err, ExtractionError::BackendPanic { .. }));
        assert_eq!(registry.probe(b""), ProbeOutcome::Failed);
    }
}
