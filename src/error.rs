//! Error taxonomy.
//!
//! Failures local to one input file are [`Warning`]s and never stop a run.
//! Resource-level failures are [`PipelineError`]s and abort it.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// A source file could not be turned into text.
#[derive(Debug, thiserror::Error)]
pub enum SourceReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid UTF-8 (invalid byte at offset {offset})", path.display())]
    Encoding { path: PathBuf, offset: usize },

    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },
}

impl SourceReadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Encoding { path, .. } | Self::Empty { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// End of file before the close marker.
    Unterminated,
    /// An open marker inside an open block.
    Nested,
    /// A close marker naming a different entity.
    MismatchedClose,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unterminated => "block is not terminated before end of file",
            Self::Nested => "block contains a nested block",
            Self::MismatchedClose => "block is closed by a marker for another entity",
        })
    }
}

/// A documentation block without a well-formed open/close pair.
/// `line` is where the offending block starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{line}: malformed block for `{entity}`: {reason}", path.display())]
pub struct MalformedBlockError {
    pub path: PathBuf,
    pub line: usize,
    pub entity: String,
    pub reason: MalformedReason,
}

/// Non-fatal problem collected during a run.
#[derive(Debug, thiserror::Error)]
pub enum Warning {
    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    #[error(transparent)]
    MalformedBlock(#[from] MalformedBlockError),

    #[error("entities `{entity}` and `{existing}` map to the same page name; writing `{entity}` to {}", path.display())]
    NameCollision {
        entity: String,
        existing: String,
        path: PathBuf,
    },
}

/// Fatal failure of a pipeline entry point.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("base directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    #[error("unknown format: {0}. Use rst, markdown, or json")]
    UnknownFormat(String),
}
