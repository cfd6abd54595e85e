//! Process configuration, read from `PHARMASSIST_*` environment variables.

use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::extraction::{ExtractionError, ExtractionMethod};

/// Application-level constants
pub const APP_NAME: &str = "PharmAssist";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default upload ceiling: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 16;

/// Default Tesseract data directory (Debian/Ubuntu tesseract 5 layout).
pub const DEFAULT_TESSDATA_DIR: &str = "/usr/share/tesseract-ocr/5/tessdata";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "pharmassist=info,pharmassist_lib=info"
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Extraction pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionConfig {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Accepted filename extensions, lower-case, without the dot.
    pub allowed_extensions: Vec<String>,
    /// Rendering resolution for OCR.
    pub ocr_dpi: u32,
    /// Tesseract languages, `+`-joined (e.g. "eng+fra").
    pub ocr_languages: String,
    pub tessdata_dir: PathBuf,
    /// Explicit PDFium library file, if not on the default search path.
    pub pdfium_library: Option<PathBuf>,
    /// Strategies never offered, even when their backend loads.
    pub disabled_methods: Vec<ExtractionMethod>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            allowed_extensions: vec!["pdf".into()],
            ocr_dpi: crate::pipeline::extraction::pdf_renderer::OCR_RENDER_DPI,
            ocr_languages: "eng".into(),
            tessdata_dir: PathBuf::from(DEFAULT_TESSDATA_DIR),
            pdfium_library: None,
            disabled_methods: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl ExtractionConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ExtractionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a key lookup. Unset or blank keys keep
    /// their defaults; malformed values are `Config` errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExtractionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(mb) = get("PHARMASSIST_MAX_UPLOAD_MB") {
            let mb: usize = mb.parse().map_err(|_| {
                ExtractionError::Config(format!("PHARMASSIST_MAX_UPLOAD_MB must be a positive integer, got '{mb}'"))
            })?;
            if mb == 0 {
                return Err(ExtractionError::Config(
                    "PHARMASSIST_MAX_UPLOAD_MB must be greater than zero".into(),
                ));
            }
            config.max_upload_bytes = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                ExtractionError::Config(format!("PHARMASSIST_MAX_UPLOAD_MB is too large: {mb}"))
            })?;
        }

        if let Some(exts) = get("PHARMASSIST_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = exts
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if config.allowed_extensions.is_empty() {
                return Err(ExtractionError::Config(
                    "PHARMASSIST_ALLOWED_EXTENSIONS lists no extensions".into(),
                ));
            }
        }

        if let Some(dpi) = get("PHARMASSIST_OCR_DPI") {
            config.ocr_dpi = dpi
                .parse()
                .ok()
                .filter(|d| (36..=600).contains(d))
                .ok_or_else(|| {
                    ExtractionError::Config(format!("PHARMASSIST_OCR_DPI must be 36-600, got '{dpi}'"))
                })?;
        }

        if let Some(langs) = get("PHARMASSIST_OCR_LANG") {
            config.ocr_languages = langs;
        }

        if let Some(dir) = get("PHARMASSIST_TESSDATA_DIR") {
            config.tessdata_dir = PathBuf::from(dir);
        }

        if let Some(path) = get("PDFIUM_DYNAMIC_LIB_PATH") {
            config.pdfium_library = Some(PathBuf::from(path));
        }

        if let Some(methods) = get("PHARMASSIST_DISABLED_METHODS") {
            config.disabled_methods = methods
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| {
                    m.parse::<ExtractionMethod>().map_err(|_| {
                        ExtractionError::Config(format!("Unknown extraction method '{m}' in PHARMASSIST_DISABLED_METHODS"))
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(config)
    }

    pub fn is_enabled(&self, method: ExtractionMethod) -> bool {
        !self.disabled_methods.contains(&method)
    }

    /// Human-readable list of allowed extensions, e.g. ".pdf".
    pub fn allowed_extensions_display(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
