//! Content statistics for a successful extraction.

use std::collections::HashMap;

use serde::Serialize;

use super::extraction::{ExtractionMethod, ExtractionResult};

const TOP_KEYWORDS: usize = 10;
const MIN_KEYWORD_CHARS: usize = 4;
const SHORT_DOCUMENT_WORDS: usize = 500;
const MEDIUM_DOCUMENT_WORDS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentLength {
    Short,
    Medium,
    Long,
}

impl DocumentLength {
    fn from_words(words: usize) -> Self {
        if words < SHORT_DOCUMENT_WORDS {
            Self::Short
        } else if words < MEDIUM_DOCUMENT_WORDS {
            Self::Medium
        } else {
            Self::Long
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_pages: usize,
    pub total_characters: usize,
    pub total_words: usize,
    pub avg_chars_per_page: f64,
    pub avg_words_per_page: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentInsights {
    /// `(word, count)`, most frequent first; ties keep first-seen order.
    pub top_keywords: Vec<(String, usize)>,
    pub document_length: DocumentLength,
    pub has_tables: bool,
    pub table_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub extraction_method: ExtractionMethod,
    pub avg_confidence: Option<f32>,
    pub pages_with_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentAnalysis {
    pub statistics: Statistics,
    pub content_insights: ContentInsights,
    pub quality_metrics: QualityMetrics,
}

/// Analyze a result. `None` unless the extraction succeeded.
pub fn analyze_content(result: &ExtractionResult) -> Option<ContentAnalysis> {
    if !result.success {
        return None;
    }

    let body: Vec<&str> = result
        .raw_text
        .lines()
        .filter(|line| !is_page_marker(line))
        .collect();
    let words: Vec<&str> = body.iter().flat_map(|l| l.split_whitespace()).collect();

    let total_pages = result.pages.len();
    let total_characters: usize = result.pages.iter().map(|p| p.char_count).sum();
    let total_words = words.len();
    let per_page = |n: usize| {
        if total_pages == 0 {
            0.0
        } else {
            n as f64 / total_pages as f64
        }
    };

    Some(ContentAnalysis {
        statistics: Statistics {
            total_pages,
            total_characters,
            total_words,
            avg_chars_per_page: per_page(total_characters),
            avg_words_per_page: per_page(total_words),
        },
        content_insights: ContentInsights {
            top_keywords: top_keywords(&words),
            document_length: DocumentLength::from_words(total_words),
            has_tables: !result.tables.is_empty(),
            table_count: result.tables.len(),
        },
        quality_metrics: QualityMetrics {
            extraction_method: result.method_used,
            avg_confidence: result.ocr_confidence,
            pages_with_errors: result.pages.iter().filter(|p| p.error.is_some()).count(),
        },
    })
}

fn is_page_marker(line: &str) -> bool {
    line.starts_with("--- Page ") && line.ends_with(" ---")
}

fn top_keywords(words: &[&str]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for word in words {
        let word = word.to_lowercase();
        if word.chars().count() < MIN_KEYWORD_CHARS {
            continue;
        }
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|w| {
            let n = counts.get(&w).copied().unwrap_or(0);
            (w, n)
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_KEYWORDS);
    ranked
}
