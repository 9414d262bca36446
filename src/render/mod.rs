//! Page renderers with trait-based format dispatch.

pub mod json;
pub mod markdown;
pub mod rst;

use crate::error::PipelineError;
use crate::model::DocumentPage;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Trait for rendering a merged page into a specific output format.
pub trait Renderer {
    fn render(&self, page: &DocumentPage) -> String;
    fn file_extension(&self) -> &str;
}

/// Output format of documentation pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageFormat {
    #[default]
    Rst,
    Markdown,
    Json,
}

impl PageFormat {
    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            PageFormat::Rst => Box::new(rst::RstRenderer),
            PageFormat::Markdown => Box::new(markdown::MarkdownRenderer),
            PageFormat::Json => Box::new(json::JsonRenderer),
        }
    }
}

impl FromStr for PageFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rst" => Ok(PageFormat::Rst),
            "markdown" | "md" => Ok(PageFormat::Markdown),
            "json" => Ok(PageFormat::Json),
            other => Err(PipelineError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageFormat::Rst => "rst",
            PageFormat::Markdown => "markdown",
            PageFormat::Json => "json",
        })
    }
}

/// Source path as shown on a page, with forward slashes on every platform.
pub(crate) fn display_source(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
