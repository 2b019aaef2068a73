//! The parser ladder: try structured sources first, fall back to prose.

use crate::pdf::OcrProvider;
use crate::types::{NodeKind, ParseInput, ParsedDocument, ParsedNode, ParserStep};
use crate::{embedded_state, jsonld, pdf, readability, table};

pub struct ParserBank {
    ocr: Option<Box<dyn OcrProvider>>,
}

impl ParserBank {
    pub fn new(ocr: Option<Box<dyn OcrProvider>>) -> Self {
        Self { ocr }
    }

    /// Walk the ladder in order, returning the first non-empty result.
    /// Falls through to raw whitespace-collapsed text if nothing structured
    /// was found, so every document yields something for the retriever.
    pub fn extract(&self, input: &ParseInput) -> ParsedDocument {
        if let Some(bytes) = input.pdf_bytes {
            let doc = match &self.ocr {
                Some(ocr) => pdf::extract_with_ocr(bytes, ocr.as_ref()),
                None => pdf::extract(bytes),
            };
            if !doc.is_empty() {
                return doc;
            }
            return empty(ParserStep::Pdf);
        }

        let Some(html) = input.html else {
            return empty(ParserStep::RawText);
        };

        let ladder: [fn(&str) -> ParsedDocument; 3] = [jsonld::extract, embedded_state::extract, table::extract];
        for step_fn in ladder {
            let doc = step_fn(html);
            if !doc.is_empty() {
                return doc;
            }
        }

        let doc = readability::extract(html, input.url);
        if !doc.is_empty() {
            return doc;
        }

        raw_text(html)
    }
}

fn empty(step: ParserStep) -> ParsedDocument {
    ParsedDocument { step, nodes: Vec::new() }
}

/// Last-resort fallback: strip tags crudely and collapse whitespace.
fn raw_text(html: &str) -> ParsedDocument {
    let stripped = strip_tags(html);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let nodes = if collapsed.is_empty() {
        Vec::new()
    } else {
        vec![ParsedNode {
            kind: NodeKind::Text,
            text: collapsed,
            path: Some("raw_text".into()),
        }]
    };

    ParsedDocument {
        step: ParserStep::RawText,
        nodes,
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_json_ld_over_readability() {
        let html = r#"
            <html><body>
            <script type="application/ld+json">{"@type": "Product", "name": "Widget"}</script>
            <p>Some unrelated prose that readability would otherwise pick up.</p>
            </body></html>
        "#;
        let bank = ParserBank::new(None);
        let doc = bank.extract(&ParseInput {
            html: Some(html),
            ..Default::default()
        });
        assert_eq!(doc.step, ParserStep::JsonLd);
    }

    #[test]
    fn falls_back_to_raw_text_when_nothing_structured_found() {
        let html = "<html><body><div>just some <b>plain</b> text here</div></body></html>";
        let bank = ParserBank::new(None);
        let doc = bank.extract(&ParseInput {
            html: Some(html),
            ..Default::default()
        });
        assert!(!doc.is_empty());
    }
}
