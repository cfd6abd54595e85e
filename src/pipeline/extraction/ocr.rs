use super::types::{OcrEngine, OcrPageResult, OcrWord};
use super::ExtractionError;

/// Tesseract page segmentation mode: a single uniform block of text.
pub const PAGE_SEGMENTATION_MODE: &str = "6";

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
    languages: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory and a `+`-joined language list.
    /// Every requested language needs its traineddata file.
    pub fn new(tessdata_dir: &std::path::Path, languages: &str) -> Result<Self, ExtractionError> {
        for lang in languages.split('+').filter(|l| !l.is_empty()) {
            if !tessdata_dir.join(format!("{lang}.traineddata")).exists() {
                return Err(ExtractionError::TessdataNotFound(
                    tessdata_dir.join(format!("{lang}.traineddata")),
                ));
            }
        }

        tracing::info!(
            tessdata = %tessdata_dir.display(),
            languages,
            "Tesseract OCR engine ready"
        );

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            languages: languages.to_string(),
        })
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.languages))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?
            .set_variable("tessedit_pageseg_mode", PAGE_SEGMENTATION_MODE)
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let page_confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        // TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
        let words = match tess.get_tsv_text(0) {
            Ok(tsv) => parse_tsv_words(&tsv),
            Err(e) => {
                tracing::debug!(error = ?e, "TSV output unavailable, using page confidence per word");
                words_with_confidence(&text, page_confidence)
            }
        };

        let mut result = OcrPageResult {
            text,
            confidence: page_confidence,
            words,
        };
        if let Some(mean) = super::confidence::mean_word_confidence(&result) {
            result.confidence = mean;
        }

        Ok(result)
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    /// Fail on the nth call (0-based), to exercise mid-document failures.
    pub fail_on_call: Option<usize>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail_on_call: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let call = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            return Err(ExtractionError::OcrProcessing(format!(
                "mock failure on call {call}"
            )));
        }

        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
            words: words_with_confidence(&self.text, self.confidence),
        })
    }
}

fn words_with_confidence(text: &str, confidence: f32) -> Vec<OcrWord> {
    text.split_whitespace()
        .map(|w| OcrWord {
            text: w.to_string(),
            confidence,
        })
        .collect()
}

/// Parse Tesseract TSV output into word-level confidences.
/// Level 5 rows are words; confidence is 0-100, scaled to 0.0-1.0.
fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    const WORD_LEVEL: &str = "5";

    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            let [level, .., conf, word] = cols.as_slice() else {
                return None;
            };
            if cols.len() < 12 || level.trim() != WORD_LEVEL || word.trim().is_empty() {
                return None;
            }
            let conf: f32 = conf.trim().parse().ok()?;
            Some(OcrWord {
                text: word.trim().to_string(),
                // Unscored words report -1.
                confidence: (conf / 100.0).max(0.0),
            })
        })
        .collect()
}
