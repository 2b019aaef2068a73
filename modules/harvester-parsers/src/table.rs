//! Spec/dimension table extraction, common on product detail pages.

use scraper::{Html, Selector};

use crate::types::{NodeKind, ParsedDocument, ParsedNode, ParserStep};

pub fn extract(html: &str) -> ParsedDocument {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("th, td").unwrap();

    let mut nodes = Vec::new();
    for (ti, table) in document.select(&table_selector).enumerate() {
        for (ri, row) in table.select(&row_selector).enumerate() {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|c| c.text().collect::<Vec<_>>().join(" ").trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if cells.len() < 2 {
                continue;
            }

            nodes.push(ParsedNode {
                kind: NodeKind::TableRow,
                text: cells.join(": "),
                path: Some(format!("table[{ti}]/tr[{ri}]")),
            });
        }
    }

    ParsedDocument {
        step: ParserStep::Table,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_two_column_spec_rows() {
        let html = r#"
            <table>
                <tr><th>Weight</th><td>1.2 kg</td></tr>
                <tr><th>Color</th><td>Graphite</td></tr>
            </table>
        "#;
        let doc = extract(html);
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].text, "Weight: 1.2 kg");
    }

    #[test]
    fn skips_single_cell_rows() {
        let html = r#"<table><tr><td colspan="2">Section header</td></tr></table>"#;
        let doc = extract(html);
        assert!(doc.is_empty());
    }
}
