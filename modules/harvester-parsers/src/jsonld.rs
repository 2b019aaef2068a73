//! JSON-LD extraction: `<script type="application/ld+json">` blocks.

use scraper::{Html, Selector};

use crate::types::{NodeKind, ParsedDocument, ParsedNode, ParserStep};

pub fn extract(html: &str) -> ParsedDocument {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    let mut nodes = Vec::new();
    for (i, element) in document.select(&selector).enumerate() {
        let raw: String = element.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        flatten(&value, &format!("ld+json[{i}]"), &mut nodes);
    }

    ParsedDocument {
        step: ParserStep::JsonLd,
        nodes,
    }
}

fn flatten(value: &serde_json::Value, path: &str, out: &mut Vec<ParsedNode>) {
    match value {
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(item, &format!("{path}[{i}]"), out);
            }
        }
        serde_json::Value::Object(_) => {
            out.push(ParsedNode {
                kind: NodeKind::Json,
                text: value.to_string(),
                path: Some(path.to_string()),
            });
        }
        _ => {}
    }
}
