//! Pipeline entry points.
//!
//! Each call is self-contained: no state survives between calls, and the
//! two pipelines may run in any order.

use crate::emit;
use crate::error::{PipelineError, SourceReadError, Warning};
use crate::mock;
use crate::model::*;
use crate::parser::{self, docblock, interface, merge};
use crate::render::PageFormat;
use crate::sources;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for [`extract_docs_with`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub format: PageFormat,
}

/// Outcome of a documentation run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub pages: Vec<EmittedPage>,
    /// Per-file problems that were skipped over.
    pub warnings: Vec<Warning>,
}

impl ExtractReport {
    pub fn written(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Written)
            .count()
    }
}

/// Options for [`synthesize_mock_with`].
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Module name in the generated header; defaults to the interface file stem.
    pub module_name: Option<String>,
    /// Files copied verbatim ahead of the stand-ins.
    pub preludes: Vec<PathBuf>,
}

/// Extract documentation blocks from the headers matched by `sources` and
/// write one reStructuredText page per entity into `out_dir`.
pub fn extract_docs<S: AsRef<str>>(
    sources: &[S],
    base_dir: &Path,
    out_dir: &Path,
) -> Result<ExtractReport, PipelineError> {
    extract_docs_with(sources, base_dir, out_dir, &ExtractOptions::default())
}

/// [`extract_docs`] with a selectable page format.
///
/// A header that cannot be read or holds a malformed block contributes
/// nothing and is reported in [`ExtractReport::warnings`]; the other
/// headers are processed normally.
pub fn extract_docs_with<S: AsRef<str>>(
    sources: &[S],
    base_dir: &Path,
    out_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport, PipelineError> {
    let files = sources::resolve(sources, base_dir)?;
    let base = fs::canonicalize(base_dir).unwrap_or_else(|_| base_dir.to_path_buf());
    debug!("{} source file(s) under {}", files.len(), base.display());

    let mut warnings = Vec::new();
    let mut blocks = Vec::new();
    for path in &files {
        let source = match parser::read_source(path, SourceFormat::HeaderDoc) {
            Ok(source) => source,
            Err(e) => {
                warn!("{}", e);
                warnings.push(Warning::from(e));
                continue;
            }
        };
        match docblock::extract(&source) {
            Ok(found) => {
                if found.is_empty() {
                    debug!("no documentation blocks in {}", path.display());
                }
                blocks.extend(found);
            }
            Err(e) => {
                warn!("{}", e);
                warnings.push(Warning::from(e));
            }
        }
    }

    let mut pages = merge::merge(blocks);
    for page in &mut pages {
        for source in &mut page.sources {
            if let Ok(relative) = source.strip_prefix(&base) {
                *source = relative.to_path_buf();
            }
        }
    }

    let renderer = options.format.renderer();
    let (emitted, collisions) = emit::emit_pages(&pages, out_dir, renderer.as_ref())?;
    warnings.extend(collisions);

    let report = ExtractReport {
        pages: emitted,
        warnings,
    };
    info!(
        "extracted {} page(s) from {} file(s) into {} ({} written, {} warning(s))",
        report.pages.len(),
        files.len(),
        out_dir.display(),
        report.written(),
        report.warnings.len()
    );
    Ok(report)
}

/// Build a Python stand-in for the native module described by
/// `interface_source` and write it to `out_file`.
pub fn synthesize_mock(interface_source: &Path, out_file: &Path) -> Result<MockModule, PipelineError> {
    synthesize_mock_with(interface_source, out_file, &MockOptions::default())
}

/// [`synthesize_mock`] with module naming and prelude files.
pub fn synthesize_mock_with(
    interface_source: &Path,
    out_file: &Path,
    options: &MockOptions,
) -> Result<MockModule, PipelineError> {
    let module = build_mock(interface_source, options)?;

    if let Some(parent) = out_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::OutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(out_file, &module.source).map_err(|source| PipelineError::Write {
        path: out_file.to_path_buf(),
        source,
    })?;

    info!(
        "wrote mock module `{}` with {} stand-in(s) to {}",
        module.module_name,
        module.entities.len(),
        out_file.display()
    );
    Ok(module)
}

/// Parse and synthesize without writing anything.
pub fn build_mock(interface_source: &Path, options: &MockOptions) -> Result<MockModule, PipelineError> {
    let source = parser::read_source(interface_source, SourceFormat::InterfaceDefinition)?;
    if source.text.trim().is_empty() {
        return Err(SourceReadError::Empty {
            path: interface_source.to_path_buf(),
        }
        .into());
    }

    let preludes = options
        .preludes
        .iter()
        .map(|path| parser::read_source(path, SourceFormat::InterfaceDefinition).map(|s| s.text))
        .collect::<Result<Vec<_>, _>>()?;

    let decls = interface::parse(&source.text);
    let demoted = decls.iter().filter(|d| d.demoted).count();
    if demoted > 0 {
        debug!("{} declaration(s) without an owner moved to module level", demoted);
    }

    let module_name = options.module_name.clone().unwrap_or_else(|| {
        interface_source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "module".to_string())
    });
    let origin = interface_source
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(mock::synthesize(&decls, &module_name, &origin, &preludes))
}
