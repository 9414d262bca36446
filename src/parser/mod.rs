//! Parser module: source reading and format dispatch.

pub mod docblock;
pub mod interface;
pub mod merge;

use crate::error::SourceReadError;
use crate::model::{SourceFile, SourceFormat};
use std::fs;
use std::path::Path;

/// File extensions read as interface definitions; everything else is a header.
const INTERFACE_EXTENSIONS: &[&str] = &["pyx", "pxd", "pyi", "py"];

impl SourceFormat {
    /// Guess the format from a file's extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if INTERFACE_EXTENSIONS.contains(&ext) => Self::InterfaceDefinition,
            _ => Self::HeaderDoc,
        }
    }
}

/// Read a source file as UTF-8 text. A leading byte-order mark is dropped.
pub fn read_source(path: &Path, format: SourceFormat) -> Result<SourceFile, SourceReadError> {
    let bytes = fs::read(path).map_err(|source| SourceReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut text = String::from_utf8(bytes).map_err(|e| SourceReadError::Encoding {
        path: path.to_path_buf(),
        offset: e.utf8_error().valid_up_to(),
    })?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(SourceFile {
        path: path.to_path_buf(),
        text,
        format,
    })
}
