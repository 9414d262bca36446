//! reStructuredText renderer, the default page format.

use crate::model::*;
use crate::render::{display_source, Renderer};

pub struct RstRenderer;

impl Renderer for RstRenderer {
    fn render(&self, page: &DocumentPage) -> String {
        let mut out = String::new();

        if !page.sources.is_empty() {
            let sources: Vec<String> = page.sources.iter().map(|p| display_source(p)).collect();
            out.push_str(&format!(".. Generated from {}. Do not edit.\n\n", sources.join(", ")));
        }

        // Title, underlined to its full width
        out.push_str(&page.entity);
        out.push('\n');
        out.push_str(&"=".repeat(page.entity.chars().count()));
        out.push_str("\n\n");

        if !page.fields.is_empty() {
            for (key, value) in &page.fields {
                out.push_str(&format!(":{}: {}\n", key, value));
            }
            out.push('\n');
        }

        if !page.body.is_empty() {
            out.push_str(&page.body);
            out.push('\n');
        }

        out
    }

    fn file_extension(&self) -> &str {
        "rst"
    }
}
