//! PDF text extraction, with an OCR fallback hook for scanned documents.

use crate::types::{NodeKind, ParsedDocument, ParsedNode, ParserStep};

/// Implemented by whatever OCR engine is configured; the default build ships
/// no concrete provider (OCR is opt-in via `Config::ocr_enabled`).
pub trait OcrProvider: Send + Sync {
    fn recognize(&self, page_bytes: &[u8]) -> anyhow::Result<String>;
}

pub fn extract(pdf_bytes: &[u8]) -> ParsedDocument {
    let text = pdf_extract::extract_text_from_mem(pdf_bytes).unwrap_or_default();

    let nodes = if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![ParsedNode {
            kind: NodeKind::Text,
            text,
            path: Some("pdf".into()),
        }]
    };

    ParsedDocument {
        step: ParserStep::Pdf,
        nodes,
    }
}

/// Run OCR over `pdf_bytes` when the primary text layer was empty (scanned
/// documents have no extractable text layer at all).
pub fn extract_with_ocr(pdf_bytes: &[u8], ocr: &dyn OcrProvider) -> ParsedDocument {
    let primary = extract(pdf_bytes);
    if !primary.is_empty() {
        return primary;
    }

    match ocr.recognize(pdf_bytes) {
        Ok(text) if !text.trim().is_empty() => ParsedDocument {
            step: ParserStep::OcrFallback,
            nodes: vec![ParsedNode {
                kind: NodeKind::Text,
                text,
                path: Some("ocr".into()),
            }],
        },
        _ => ParsedDocument {
            step: ParserStep::OcrFallback,
            nodes: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubOcr(&'static str);

    impl OcrProvider for StubOcr {
        fn recognize(&self, _page_bytes: &[u8]) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn ocr_only_runs_when_primary_text_layer_is_empty() {
        // Not a real PDF, so the primary extractor yields nothing and OCR
        // fallback should take over.
        let doc = extract_with_ocr(b"not a real pdf", &StubOcr("scanned label text"));
        assert_eq!(doc.step, ParserStep::OcrFallback);
        assert!(!doc.is_empty());
    }
}
