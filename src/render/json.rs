//! JSON renderer: structured output for tooling integration.

use crate::model::*;
use crate::render::{display_source, Renderer};
use serde::Serialize;

pub struct JsonRenderer;

#[derive(Serialize)]
struct PageJson<'a> {
    entity: &'a str,
    fields: Vec<FieldJson<'a>>,
    body: &'a str,
    sources: Vec<String>,
}

#[derive(Serialize)]
struct FieldJson<'a> {
    key: &'a str,
    value: &'a str,
}

impl Renderer for JsonRenderer {
    fn render(&self, page: &DocumentPage) -> String {
        let json = PageJson {
            entity: &page.entity,
            fields: page
                .fields
                .iter()
                .map(|(key, value)| FieldJson { key, value })
                .collect(),
            body: &page.body,
            sources: page.sources.iter().map(|p| display_source(p)).collect(),
        };
        // Serializing borrowed strings into a String cannot fail
        let mut out = serde_json::to_string_pretty(&json).unwrap_or_default();
        out.push('\n');
        out
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
