//! Page emitter: one file per documented entity.
//!
//! Pages whose rendered content matches what is already on disk are left
//! alone, so rerunning on unchanged input touches nothing. Files belonging
//! to entities that have since disappeared from the sources are not
//! removed; clean the output directory to drop them.

use crate::error::{PipelineError, Warning};
use crate::model::*;
use crate::render::Renderer;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// File stem for an entity: lowercase, with every character outside
/// `[a-z0-9_]` replaced by `_`.
pub fn normalize(entity: &str) -> String {
    entity
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render and write `pages` into `out_dir`.
///
/// When two entities normalize to the same stem, the later one gets a
/// `-2`, `-3`, ... suffix and a [`Warning::NameCollision`] is returned
/// alongside the emitted pages.
pub fn emit_pages(
    pages: &[DocumentPage],
    out_dir: &Path,
    renderer: &dyn Renderer,
) -> Result<(Vec<EmittedPage>, Vec<Warning>), PipelineError> {
    fs::create_dir_all(out_dir).map_err(|source| PipelineError::OutputDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut emitted = Vec::with_capacity(pages.len());
    let mut warnings = Vec::new();
    // stem -> entity that claimed it
    let mut claimed: HashMap<String, String> = HashMap::new();

    for page in pages {
        let base = normalize(&page.entity);
        let mut stem = base.clone();
        let mut n = 1;
        while claimed.contains_key(&stem) {
            n += 1;
            stem = format!("{}-{}", base, n);
        }
        let path = out_dir.join(format!("{}.{}", stem, renderer.file_extension()));
        if n > 1 {
            let warning = Warning::NameCollision {
                entity: page.entity.clone(),
                existing: claimed[&base].clone(),
                path: path.clone(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
        claimed.insert(stem, page.entity.clone());

        let content = renderer.render(page);
        let status = match fs::read(&path) {
            Ok(current) if current == content.as_bytes() => PageStatus::Unchanged,
            _ => {
                fs::write(&path, &content).map_err(|source| PipelineError::Write {
                    path: path.clone(),
                    source,
                })?;
                PageStatus::Written
            }
        };
        debug!("{} -> {} ({:?})", page.entity, path.display(), status);

        emitted.push(EmittedPage {
            entity: page.entity.clone(),
            path,
            status,
        });
    }

    Ok((emitted, warnings))
}
