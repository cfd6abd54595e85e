use lopdf::{Document, Object};

use super::types::{DocumentMetadata, TextLayerParser};
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl TextLayerParser for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::DocumentOpen(e.to_string()))
    }

    /// Decodes only page 1's content, so broken later pages cannot fail it.
    fn first_page_text(&self, pdf_bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        let mut doc = pdf_extract::Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::DocumentOpen(e.to_string()))?;
        if doc.is_encrypted() {
            // Empty user password, as pdf-extract does for whole documents.
            doc.decrypt("")
                .map_err(|e| ExtractionError::DocumentOpen(format!("encrypted document: {e}")))?;
        }

        let Some(&first) = doc.get_pages().keys().next() else {
            return Ok(None);
        };

        let mut text = String::new();
        {
            let mut output = pdf_extract::PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(&doc, &mut output, first).map_err(|e| {
                ExtractionError::PageExtraction {
                    page: 1,
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(Some(text))
    }
}

/// Read the document information dictionary.
///
/// Best effort: returns `None` when the document cannot be loaded, has no
/// `/Info` entry, or every field is empty.
pub fn read_document_metadata(pdf_bytes: &[u8]) -> Option<DocumentMetadata> {
    let doc = Document::load_mem(pdf_bytes).ok()?;
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    let field = |key: &[u8]| -> Option<String> {
        match info.get(key).ok()? {
            Object::String(bytes, _) => decode_pdf_string(bytes).filter(|s| !s.trim().is_empty()),
            _ => None,
        }
    };

    let metadata = DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        creation_date: field(b"CreationDate"),
    };

    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

/// Decode PDF string bytes: UTF-16BE with BOM, UTF-8, else Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}
