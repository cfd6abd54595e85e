use super::types::{ExtractionWarning, OcrPageResult, PageReport};

/// OCR confidence thresholds. Confidence is diagnostic and never filters fields.
pub mod thresholds {
    /// Below this a page gets a `LowOcrConfidence` warning.
    pub const LOW: f32 = 0.50;

    /// Words below this are treated as noise when averaging word scores.
    pub const WORD_NOISE: f32 = 0.0;
}

/// Mean of word confidences above the noise floor, if any words scored.
pub fn mean_word_confidence(result: &OcrPageResult) -> Option<f32> {
    let scored: Vec<f32> = result
        .words
        .iter()
        .map(|w| w.confidence)
        .filter(|c| *c > thresholds::WORD_NOISE)
        .collect();

    if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f32>() / scored.len() as f32)
    }
}

/// Average OCR confidence across pages that carry one.
pub fn average_ocr_confidence(pages: &[PageReport]) -> Option<f32> {
    let scores: Vec<f32> = pages.iter().filter_map(|p| p.ocr_confidence).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f32>() / scores.len() as f32)
}

/// Warn when a page's OCR confidence is below [`thresholds::LOW`].
pub fn analyze_ocr_quality(page_number: usize, confidence: f32) -> Option<ExtractionWarning> {
    (confidence < thresholds::LOW).then_some(ExtractionWarning::LowOcrConfidence {
        page: page_number,
        confidence,
    })
}
