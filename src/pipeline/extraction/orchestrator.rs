use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ExtractionConfig;

use super::fields::FieldRecognizer;
use super::pdf::read_document_metadata;
use super::registry::StrategyRegistry;
use super::selector::select_method;
use super::types::{ExtractionMethod, ExtractionRequest, ExtractionResult, RequestedMethod};
use super::ExtractionError;

/// Validates a request, picks a strategy, runs it and recognizes fields.
///
/// Immutable after construction; share it behind an `Arc` across threads.
pub struct DocumentPipeline {
    registry: StrategyRegistry,
    recognizer: FieldRecognizer,
    config: ExtractionConfig,
}

impl DocumentPipeline {
    pub fn new(
        registry: StrategyRegistry,
        recognizer: FieldRecognizer,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            registry,
            recognizer,
            config,
        }
    }

    /// Pipeline with every backend that loads in this environment.
    pub fn from_config(config: ExtractionConfig) -> Self {
        let registry = StrategyRegistry::detect(&config);
        Self::new(registry, FieldRecognizer::default(), config)
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Reject unsupported extensions and oversize content.
    pub fn validate(&self, request: &ExtractionRequest) -> Result<(), ExtractionError> {
        let extension = Path::new(&request.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let allowed = extension
            .as_deref()
            .is_some_and(|ext| self.config.allowed_extensions.iter().any(|a| a == ext));
        if !allowed {
            return Err(ExtractionError::UnsupportedFormat {
                filename: request.filename.clone(),
                allowed: self.config.allowed_extensions_display(),
            });
        }

        if request.content.len() > self.config.max_upload_bytes {
            return Err(ExtractionError::FileTooLarge {
                size: request.content.len(),
                max: self.config.max_upload_bytes,
            });
        }

        Ok(())
    }

    /// Resolve the strategy to run. Explicit requests for a missing
    /// backend fail; `auto` never does.
    pub fn choose_method(&self, request: &ExtractionRequest) -> Result<ExtractionMethod, ExtractionError> {
        if let Some(method) = request.requested_method.explicit() {
            if !self.registry.is_available(method) {
                return Err(ExtractionError::StrategyUnavailable(method));
            }
            return Ok(method);
        }

        let probe = self.registry.probe(&request.content);
        let selected = select_method(self.registry.capabilities(), probe);
        let method = if self.registry.is_available(selected) {
            selected
        } else {
            ExtractionMethod::Basic
        };

        tracing::debug!(
            document_id = %request.document_id,
            probe = ?probe,
            method = %method,
            "Auto-selected extraction method"
        );
        Ok(method)
    }

    /// Run one request end to end.
    ///
    /// `Err` only for rejections (`UnsupportedFormat`, `FileTooLarge`,
    /// `StrategyUnavailable`). Extraction failures come back as a result
    /// with `success == false`.
    pub fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ExtractionError> {
        tracing::info!(
            document_id = %request.document_id,
            filename = %request.filename,
            size = request.content.len(),
            requested = %request.requested_method,
            "Starting extraction"
        );

        if let Err(e) = self.validate(request) {
            tracing::warn!(document_id = %request.document_id, error = %e, "Request rejected");
            return Err(e);
        }
        let method = self.choose_method(request)?;

        let started = Instant::now();
        let output = match self.registry.run(method, &request.content, self.config.ocr_dpi) {
            Ok(output) => output,
            Err(e) if e.is_rejection() => return Err(e),
            Err(e) => {
                tracing::error!(
                    document_id = %request.document_id,
                    method = %method,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Extraction failed"
                );
                return Ok(ExtractionResult::failure(
                    request.document_id,
                    &request.filename,
                    method,
                    &e,
                ));
            }
        };

        let fields = self.recognizer.recognize(&output.raw_text, &output.tables);
        let metadata = read_document_metadata(&request.content);

        tracing::info!(
            document_id = %request.document_id,
            method = %method,
            pages = output.pages_processed,
            tables = output.tables.len(),
            fields = fields.len(),
            warnings = output.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );

        Ok(ExtractionResult {
            document_id: request.document_id,
            filename: request.filename.clone(),
            success: true,
            method_used: method,
            pages_processed: output.pages_processed,
            raw_text: output.raw_text,
            pages: output.pages,
            tables: output.tables,
            fields,
            ocr_confidence: output.ocr_confidence,
            metadata,
            warnings: output.warnings,
            error: None,
        })
    }

    /// Convenience wrapper building the request from parts.
    pub fn extract_bytes(
        &self,
        content: Vec<u8>,
        filename: &str,
        method: RequestedMethod,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract(&ExtractionRequest::new(content, filename, method))
    }
}

/// Run a request on tokio's blocking pool, for async hosts.
pub async fn extract_on_worker(
    pipeline: Arc<DocumentPipeline>,
    request: ExtractionRequest,
) -> Result<ExtractionResult, ExtractionError> {
    tokio::task::spawn_blocking(move || pipeline.extract(&request))
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))?
}
