//! Data model shared by the documentation and mocking sides.

use serde::Serialize;
use std::path::PathBuf;

/// Which grammar a source file is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// C/C++ header carrying tag-delimited documentation blocks.
    HeaderDoc,
    /// Cython-style interface definition of the native module.
    InterfaceDefinition,
}

/// A source file read into memory. Immutable once read.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub format: SourceFormat,
}

/// One tag-delimited documentation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlock {
    /// Path of the header the block was found in.
    pub source: PathBuf,
    /// Target entity name from the open marker.
    pub entity: String,
    /// `key: value` lines, in appearance order.
    pub fields: Vec<(String, String)>,
    /// Everything else, verbatim.
    pub body: String,
    /// 1-based inclusive line range of the block.
    pub lines: (usize, usize),
}

impl DocBlock {
    /// Last value recorded for `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// All blocks of one entity, merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPage {
    pub entity: String,
    /// First-appearance order, last value wins.
    pub fields: Vec<(String, String)>,
    pub body: String,
    /// Contributing headers, in scan order.
    pub sources: Vec<PathBuf>,
}

impl DocumentPage {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Whether the emitter had to touch a page on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Written,
    Unchanged,
}

/// A page as it landed in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedPage {
    pub entity: String,
    pub path: PathBuf,
    pub status: PageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Class,
    Function,
    Attribute,
}

/// Role of a parameter within a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    /// The bare `/` separator.
    PositionalOnlyMarker,
    /// `*args`
    VarArgs,
    /// The bare `*` separator.
    KeywordOnlyMarker,
    KeywordOnly,
    /// `**kwargs`
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Empty for the `/` and `*` markers.
    pub name: String,
    pub kind: ParamKind,
    /// Opaque default expression, never evaluated.
    pub default: Option<String>,
    /// Opaque type annotation or Cython type prefix.
    pub annotation: Option<String>,
}

impl Param {
    /// True for parameters that carry a name a caller can bind.
    pub fn is_named(&self) -> bool {
        !matches!(
            self.kind,
            ParamKind::PositionalOnlyMarker | ParamKind::KeywordOnlyMarker
        )
    }
}

/// A class, function or attribute declared by the interface source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDeclaration {
    pub kind: DeclKind,
    pub name: String,
    /// Raw parameter list, base list or attribute annotation/value.
    pub signature: String,
    pub params: Vec<Param>,
    /// Dotted path of the owning class, if any.
    pub enclosing: Option<String>,
    /// Number of enclosing classes; 0 at module level.
    pub depth: usize,
    pub line: usize,
    pub decorators: Vec<String>,
    pub doc: Option<String>,
    /// Set when an indented declaration had no owner and was moved to the top level.
    pub demoted: bool,
}

impl InterfaceDeclaration {
    /// Dotted nesting path, e.g. `Kernel.step`.
    pub fn path(&self) -> String {
        match &self.enclosing {
            Some(owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }
}

/// Introspection metadata for one synthesized stand-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockEntity {
    pub kind: DeclKind,
    /// Name as emitted (keywords escaped).
    pub name: String,
    pub declared_name: String,
    /// Dotted path in the mock module.
    pub path: String,
    /// Emitted parameter names, without the appended `*args`/`**kwargs`.
    pub params: Vec<String>,
    /// Number of declared named parameters.
    pub arity: usize,
    pub enclosing: Option<String>,
}

/// Synthesized stand-in module, handed back to the caller for registration.
#[derive(Debug, Clone)]
pub struct MockModule {
    pub module_name: String,
    pub source: String,
    pub entities: Vec<MockEntity>,
}

impl MockModule {
    pub fn entity(&self, path: &str) -> Option<&MockEntity> {
        self.entities.iter().find(|e| e.path == path)
    }
}
