use serde::{Deserialize, Serialize};

/// The parser ladder (§4.4). `ParserBank::extract` walks these in order and
/// returns the first step that yields content, so a page with JSON-LD never
/// pays for headless-grade table scraping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParserStep {
    JsonLd,
    EmbeddedState,
    Table,
    ReadabilityHtml,
    Pdf,
    OcrFallback,
    RawText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Json,
    TableRow,
    Text,
}

/// One unit of extracted content, ready to be indexed by the Evidence Store
/// and later packaged for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub text: String,
    /// A selector/JSON-pointer-ish hint at where this came from, for debugging.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub step: ParserStep,
    pub nodes: Vec<ParsedNode>,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.text.trim().is_empty())
    }
}

/// What's handed to each parser in the ladder. Not every field is populated
/// by every caller: `pdf_bytes` only for PDF sources, `html` for web sources.
#[derive(Debug, Clone, Default)]
pub struct ParseInput<'a> {
    pub url: Option<&'a str>,
    pub html: Option<&'a str>,
    pub pdf_bytes: Option<&'a [u8]>,
}
