//! Embedded SPA state: `window.__NEXT_DATA__ = {...}`, `__NUXT__`, etc.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{NodeKind, ParsedDocument, ParsedNode, ParserStep};

static STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:window\.)?__(?:NEXT_DATA__|NUXT__|INITIAL_STATE__|APOLLO_STATE__)__?\s*=\s*(\{.*\});?"#)
        .expect("valid regex")
});

pub fn extract(html: &str) -> ParsedDocument {
    let mut nodes = Vec::new();

    for (i, cap) in STATE_RE.captures_iter(html).enumerate() {
        let Some(blob) = cap.get(1) else { continue };
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(blob.as_str()) {
            nodes.push(ParsedNode {
                kind: NodeKind::Json,
                text: value.to_string(),
                path: Some(format!("embedded_state[{i}]")),
            });
        }
    }

    ParsedDocument {
        step: ParserStep::EmbeddedState,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_next_data_blob() {
        let html = r#"<script>window.__NEXT_DATA__ = {"props": {"pageProps": {"sku": "ABC123"}}}</script>"#;
        let doc = extract(html);
        assert!(!doc.is_empty());
        assert!(doc.nodes.iter().any(|n| n.text.contains("ABC123")));
    }

    #[test]
    fn no_match_returns_empty() {
        let doc = extract("<html><body>plain</body></html>");
        assert!(doc.is_empty());
    }
}
