//! Markdown renderer with YAML front matter for static site generators.

use crate::model::*;
use crate::render::{display_source, Renderer};

pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, page: &DocumentPage) -> String {
        let mut out = String::new();

        if !page.fields.is_empty() {
            out.push_str("---\n");
            for (key, value) in &page.fields {
                out.push_str(&format!("{}: {}\n", key, yaml_scalar(value)));
            }
            out.push_str("---\n\n");
        }

        if !page.sources.is_empty() {
            let sources: Vec<String> = page.sources.iter().map(|p| display_source(p)).collect();
            out.push_str(&format!("<!-- Generated from {}. Do not edit. -->\n\n", sources.join(", ")));
        }

        out.push_str(&format!("# {}\n\n", page.entity));

        if !page.body.is_empty() {
            out.push_str(&page.body);
            out.push('\n');
        }

        out
    }

    fn file_extension(&self) -> &str {
        "md"
    }
}

/// Plain scalars pass through; anything YAML would misread is double-quoted.
fn yaml_scalar(value: &str) -> String {
    let needs_quotes = value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.starts_with(|c: char| "!&*[]{}|>'\"%@`#,?-".contains(c));
    if needs_quotes {
        serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
    } else {
        value.to_string()
    }
}
