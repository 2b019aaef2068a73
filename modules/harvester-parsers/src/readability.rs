//! Main-content extraction via Readability, for pages with no structured data.

use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};

use crate::types::{NodeKind, ParsedDocument, ParsedNode, ParserStep};

pub fn extract(html: &str, url: Option<&str>) -> ParsedDocument {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let markdown = transform_content_input(input, &config);

    let nodes = if markdown.trim().is_empty() {
        Vec::new()
    } else {
        vec![ParsedNode {
            kind: NodeKind::Text,
            text: markdown,
            path: Some("readability".into()),
        }]
    };

    ParsedDocument {
        step: ParserStep::ReadabilityHtml,
        nodes,
    }
}
