//! Source set resolution: glob patterns relative to a base directory.

use crate::error::PipelineError;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header extensions picked up when a pattern names a directory.
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];

/// Expand `patterns` against `base_dir` into absolute file paths, sorted
/// and deduplicated. Every path is canonical.
///
/// Relative patterns are joined onto the base directory. A pattern naming
/// a directory expands to the headers directly inside it. A pattern that
/// matches nothing is not an error.
pub fn resolve<S: AsRef<str>>(patterns: &[S], base_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !base_dir.is_dir() {
        return Err(PipelineError::NotFound(base_dir.to_path_buf()));
    }
    let base = fs::canonicalize(base_dir)
        .map_err(|_| PipelineError::NotFound(base_dir.to_path_buf()))?;

    let mut files = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let full = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            base.join(pattern)
        };

        if full.is_file() {
            files.insert(canonical(full));
            continue;
        }
        // A directory: scan for headers (non-recursive)
        if full.is_dir() {
            let entries = match fs::read_dir(&full) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("cannot read directory {}: {}", full.display(), e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let p = entry.path();
                let is_header = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| HEADER_EXTENSIONS.contains(&ext));
                if p.is_file() && is_header {
                    files.insert(canonical(p));
                }
            }
            continue;
        }

        // Try as glob; the base directory itself is matched literally
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            format!(
                "{}/{}",
                glob::Pattern::escape(&base.to_string_lossy()),
                pattern
            )
        };
        let paths = glob::glob(&full_pattern).map_err(|source| PipelineError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let before = files.len();
        for entry in paths {
            match entry {
                Ok(p) if p.is_file() => {
                    files.insert(canonical(p));
                }
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable path while matching `{}`: {}", pattern, e),
            }
        }
        if files.len() == before {
            debug!("no files matched: {}", pattern);
        }
    }

    Ok(files.into_iter().collect())
}

/// Resolve `.`/`..` and links so one file never appears under two spellings.
fn canonical(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}
