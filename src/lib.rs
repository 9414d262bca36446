//! userdoc: extract user documentation from annotated headers and
//! synthesize an importable stand-in for a native extension module.
//!
//! Two independent pipelines:
//!
//! - [`extract_docs`]: headers -> documentation blocks -> merged pages on disk.
//! - [`synthesize_mock`]: interface definition -> declarations -> Python mock.

pub mod config;
pub mod emit;
pub mod error;
pub mod mock;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod sources;

pub use error::{MalformedBlockError, PipelineError, SourceReadError, Warning};
pub use model::{DocumentPage, EmittedPage, MockEntity, MockModule, PageStatus};
pub use pipeline::{
    extract_docs, extract_docs_with, synthesize_mock, synthesize_mock_with, ExtractOptions,
    ExtractReport, MockOptions,
};
pub use render::PageFormat;
