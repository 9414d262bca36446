//! Interface-definition parser for the native kernel module.
//!
//! Reads Cython/Python-style source structurally, never semantically:
//! expressions, defaults and annotations are kept as opaque text.
//!
//! Two stages:
//!
//! 1. physical lines are folded into logical lines (comments removed,
//!    bracketed and backslash continuations joined, triple-quoted strings
//!    kept whole);
//! 2. a stack of open frames keyed by indentation decides ownership.
//!    Class frames collect members; opaque frames (function bodies, control
//!    blocks, `cdef extern` sections) swallow everything nested in them.
//!
//! Recovery is best-effort: an indented declaration with nothing to own it
//! is demoted to the top level instead of failing the parse.

use crate::model::*;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// -- Regex patterns -----------------------------------------------------------

static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:cdef|cpdef)\s+(?:(?:public|api|final|inline|readonly)\s+)*)?class\s+([A-Za-z_]\w*)")
        .unwrap()
});

static RE_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+def|def|cpdef)\s").unwrap());

static RE_CDEF_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cdef\s[^:=]*?\(").unwrap());

static RE_CDEF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cdef\s+(?:public|readonly)\s+(.+)$").unwrap());

static RE_OLD_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^property\s+([A-Za-z_]\w*)\s*:$").unwrap());

static RE_ANNOTATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*:\s*([^=:]*[^=:\s])\s*(?:=\s*(.*))?$").unwrap()
});

static RE_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*=\s*([^=].*)$").unwrap()
});

static RE_TRAILING_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*$").unwrap());

static RE_NONE_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:not|or)\s+None\s*$").unwrap());

static RE_STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^[rRuUbB]{0,2}("""|'''|"|')(.*)$"#).unwrap()
});

// -- Logical lines ------------------------------------------------------------

#[derive(Debug)]
struct LogicalLine {
    indent: usize,
    line: usize,
    text: String,
}

impl LogicalLine {
    /// Content of a statement that is nothing but a string literal.
    fn string_literal(&self) -> Option<String> {
        let caps = RE_STRING_LITERAL.captures(&self.text)?;
        let quote = caps.get(1)?.as_str();
        let rest = caps.get(2)?.as_str();
        let inner = rest.strip_suffix(quote)?;
        if quote.len() == 3 {
            if inner.contains(quote) {
                return None;
            }
        } else if has_unescaped(inner, quote) {
            // `"a" + "b"` is an expression, not one literal
            return None;
        }
        Some(inner.to_string())
    }
}

/// True when `quote` occurs in `text` without a preceding backslash.
fn has_unescaped(text: &str, quote: &str) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if quote.starts_with(c) {
            return true;
        }
    }
    false
}

/// Width of leading whitespace; tabs advance to the next multiple of 8.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / 8 + 1) * 8,
            '\x0c' => width = 0,
            _ => break,
        }
    }
    width
}

#[derive(Default)]
struct Folder {
    lines: Vec<LogicalLine>,
    text: String,
    indent: usize,
    start: usize,
    depth: usize,
    triple: Option<&'static str>,
    open: bool,
}

impl Folder {
    fn feed(&mut self, line_no: usize, raw: &str) {
        if !self.open {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return;
            }
            self.open = true;
            self.indent = indent_width(raw);
            self.start = line_no;
            self.text.clear();
            self.scan(trimmed);
        } else if self.triple.is_some() {
            self.scan(raw);
        } else {
            self.scan(raw.trim_start());
        }

        if self.triple.is_some() {
            self.text.push('\n');
        } else if self.depth > 0 {
            self.text.push(' ');
        } else if self.text.ends_with('\\') {
            self.text.pop();
            self.text.push(' ');
        } else {
            self.flush();
        }
    }

    /// Append one physical line's worth of code, dropping comments.
    fn scan(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];

            if let Some(quote) = self.triple {
                if starts_with_at(&chars, i, quote) {
                    self.text.push_str(quote);
                    self.triple = None;
                    i += 3;
                } else {
                    self.text.push(c);
                    i += 1;
                }
                continue;
            }

            match c {
                '#' => break,
                '"' | '\'' => {
                    let triple = if c == '"' { "\"\"\"" } else { "'''" };
                    if starts_with_at(&chars, i, triple) {
                        self.text.push_str(triple);
                        self.triple = Some(triple);
                        i += 3;
                        continue;
                    }
                    // Single-line string: copy through the closing quote
                    self.text.push(c);
                    i += 1;
                    while i < chars.len() {
                        let s = chars[i];
                        self.text.push(s);
                        i += 1;
                        if s == '\\' && i < chars.len() {
                            self.text.push(chars[i]);
                            i += 1;
                        } else if s == c {
                            break;
                        }
                    }
                    continue;
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            self.text.push(c);
            i += 1;
        }
    }

    fn flush(&mut self) {
        if self.open {
            let text = self.text.trim().to_string();
            if !text.is_empty() {
                self.lines.push(LogicalLine {
                    indent: self.indent,
                    line: self.start,
                    text,
                });
            }
        }
        self.open = false;
        self.depth = 0;
        self.triple = None;
        self.text.clear();
    }
}

fn starts_with_at(chars: &[char], i: usize, pat: &str) -> bool {
    let mut j = i;
    for p in pat.chars() {
        if chars.get(j) != Some(&p) {
            return false;
        }
        j += 1;
    }
    true
}

fn logical_lines(input: &str) -> Vec<LogicalLine> {
    let mut folder = Folder::default();
    for (idx, raw) in input.lines().enumerate() {
        folder.feed(idx + 1, raw);
    }
    // Unclosed brackets or strings at end of file end the statement
    folder.flush();
    folder.lines
}

// -- Frame stack --------------------------------------------------------------

#[derive(Debug)]
enum FrameKind {
    /// Dotted path of the class.
    Class(String),
    Opaque,
}

#[derive(Debug)]
struct Frame {
    indent: usize,
    kind: FrameKind,
}

#[derive(Default)]
struct ParserState {
    decls: Vec<InterfaceDeclaration>,
    frames: Vec<Frame>,
    decorators: Vec<String>,
    /// Declaration waiting for a docstring, with its header indent.
    doc_target: Option<(usize, usize)>,
}

// -- Public API ---------------------------------------------------------------

/// Parse interface-definition text into declarations, in source order.
pub fn parse(input: &str) -> Vec<InterfaceDeclaration> {
    let mut state = ParserState::default();
    for line in logical_lines(input) {
        state.process(&line);
    }
    state.decls
}

impl ParserState {
    fn process(&mut self, line: &LogicalLine) {
        // Dedent closes every frame opened at this indent or deeper
        while self
            .frames
            .last()
            .is_some_and(|frame| line.indent <= frame.indent)
        {
            self.frames.pop();
        }

        if let Some((idx, header_indent)) = self.doc_target.take() {
            if line.indent > header_indent {
                if let Some(doc) = line.string_literal() {
                    self.decls[idx].doc = Some(clean_doc(&doc));
                    return;
                }
            }
        }

        let owner = match self.frames.last() {
            Some(Frame {
                kind: FrameKind::Opaque,
                ..
            }) => return,
            Some(Frame {
                kind: FrameKind::Class(path),
                ..
            }) => Some(path.clone()),
            None => None,
        };
        let text = line.text.as_str();

        if let Some(decorator) = text.strip_prefix('@') {
            self.decorators.push(decorator.trim().to_string());
            return;
        }
        let decorators = std::mem::take(&mut self.decorators);

        if let Some(caps) = RE_CLASS.captures(text) {
            let name = caps[1].to_string();
            let rest = &text[caps[0].len()..];
            let bases = balanced_group(rest.trim_start()).unwrap_or_default();
            let path = match &owner {
                Some(owner) => format!("{}.{}", owner, name),
                None => name.clone(),
            };
            let idx = self.declare(line, owner, DeclKind::Class, name, bases, Vec::new(), decorators);
            self.doc_target = Some((idx, line.indent));
            self.push_frame(line, FrameKind::Class(path));
            return;
        }

        if RE_DEF.is_match(text) {
            if let Some((name, params_text)) = split_callable(text) {
                let params = parse_params(&params_text);
                let idx = self.declare(
                    line,
                    owner,
                    DeclKind::Function,
                    name,
                    params_text,
                    params,
                    decorators,
                );
                self.doc_target = Some((idx, line.indent));
            }
            self.push_frame(line, FrameKind::Opaque);
            return;
        }

        if RE_CDEF_FUNC.is_match(text) {
            // C-level function: not visible from Python
            self.push_frame(line, FrameKind::Opaque);
            return;
        }

        if let Some(caps) = RE_OLD_PROPERTY.captures(text) {
            let name = caps[1].to_string();
            self.declare(line, owner, DeclKind::Attribute, name, String::new(), Vec::new(), decorators);
            self.push_frame(line, FrameKind::Opaque);
            return;
        }

        if let Some(caps) = RE_CDEF_ATTR.captures(text) {
            let (type_text, names) = split_cdef_attribute(&caps[1]);
            for name in names {
                self.declare(line, owner.clone(), DeclKind::Attribute, name, type_text.clone(), Vec::new(), Vec::new());
            }
            return;
        }

        if !text.ends_with(':') && !is_statement_keyword(text) {
            if let Some(caps) = RE_ANNOTATED.captures(text) {
                let name = caps[1].to_string();
                let annotation = caps[2].to_string();
                self.declare(line, owner, DeclKind::Attribute, name, annotation, Vec::new(), Vec::new());
                return;
            }
            if let Some(caps) = RE_ASSIGN.captures(text) {
                let value = caps[2].trim().to_string();
                for name in caps[1].split(',').map(str::trim) {
                    self.declare(line, owner.clone(), DeclKind::Attribute, name.to_string(), value.clone(), Vec::new(), Vec::new());
                }
                return;
            }
        }

        if text.ends_with(':') {
            self.push_frame(line, FrameKind::Opaque);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn declare(
        &mut self,
        line: &LogicalLine,
        owner: Option<String>,
        kind: DeclKind,
        name: String,
        signature: String,
        params: Vec<Param>,
        decorators: Vec<String>,
    ) -> usize {
        let demoted = owner.is_none() && line.indent > 0;
        if demoted {
            debug!(
                "line {}: `{}` is indented with no enclosing class, treating as top-level",
                line.line, name
            );
        }
        let depth = if owner.is_some() { self.frames.len() } else { 0 };
        self.decls.push(InterfaceDeclaration {
            kind,
            name,
            signature,
            params,
            enclosing: owner,
            depth,
            line: line.line,
            decorators,
            doc: None,
            demoted,
        });
        self.decls.len() - 1
    }

    fn push_frame(&mut self, line: &LogicalLine, kind: FrameKind) {
        self.frames.push(Frame {
            indent: line.indent,
            kind,
        });
    }
}

// -- Helpers ------------------------------------------------------------------

/// Lines starting with these words are statements, never attributes.
fn is_statement_keyword(text: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "import", "from", "cimport", "include", "ctypedef", "cdef", "return", "raise", "assert",
        "del", "global", "nonlocal", "print", "pass",
    ];
    let first = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("");
    KEYWORDS.contains(&first)
}

/// Content of the bracket group `text` starts with, if it starts with `(`.
fn balanced_group(text: &str) -> Option<String> {
    if !text.starts_with('(') {
        return None;
    }
    let close = matching_paren(text, 0)?;
    Some(text[1..close].trim().to_string())
}

/// Byte index of the `)` that closes the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `def name(params) -> ret:` into name and raw parameter text.
fn split_callable(text: &str) -> Option<(String, String)> {
    let open = text.find('(')?;
    let name = RE_TRAILING_IDENT.captures(&text[..open])?[1].to_string();
    let params = match matching_paren(text, open) {
        Some(close) => &text[open + 1..close],
        // Unbalanced: take what is there
        None => text[open + 1..].trim_end_matches(':'),
    };
    Some((name, collapse_whitespace(params)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on commas outside brackets and string literals.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the first top-level `=` that is not part of `==`, `<=`, `>=` or `!=`.
fn top_level_equals(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if next != Some(b'=') && !matches!(prev, Some(b'=' | b'<' | b'>' | b'!')) {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a raw parameter list. Python annotations (`x: int`) and Cython
/// type prefixes (`int x`, `object x not None`) both yield the name.
pub fn parse_params(text: &str) -> Vec<Param> {
    let mut params = Vec::new();
    let mut keyword_only = false;

    for (idx, piece) in split_top_level(text, ',').into_iter().enumerate() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if piece == "/" {
            params.push(marker_param(ParamKind::PositionalOnlyMarker));
            continue;
        }
        if piece == "*" {
            keyword_only = true;
            params.push(marker_param(ParamKind::KeywordOnlyMarker));
            continue;
        }

        let (kind, rest) = if let Some(rest) = piece.strip_prefix("**") {
            (ParamKind::VarKeyword, rest)
        } else if let Some(rest) = piece.strip_prefix('*') {
            keyword_only = true;
            (ParamKind::VarArgs, rest)
        } else if keyword_only {
            (ParamKind::KeywordOnly, piece)
        } else {
            (ParamKind::Positional, piece)
        };

        let (head, default) = match top_level_equals(rest) {
            Some(eq) => (rest[..eq].trim(), Some(rest[eq + 1..].trim().to_string())),
            None => (rest.trim(), None),
        };

        let colon = split_top_level(head, ':');
        let (name, annotation) = if colon.len() > 1 {
            let annotation = head[colon[0].len() + 1..].trim();
            (
                colon[0].trim().to_string(),
                Some(annotation.to_string()).filter(|a| !a.is_empty()),
            )
        } else {
            let head = RE_NONE_CHECK.replace(head, "");
            match RE_TRAILING_IDENT.captures(&head) {
                Some(caps) => {
                    let m = caps.get(1).map_or(0, |m| m.start());
                    let prefix = head[..m].trim();
                    (
                        caps[1].to_string(),
                        Some(prefix.to_string()).filter(|p| !p.is_empty()),
                    )
                }
                None => (format!("arg{}", idx), Some(head.trim().to_string())),
            }
        };

        params.push(Param {
            name,
            kind,
            default,
            annotation,
        });
    }

    params
}

fn marker_param(kind: ParamKind) -> Param {
    Param {
        name: String::new(),
        kind,
        default: None,
        annotation: None,
    }
}

/// `int a, b` → (`int`, [a, b]); `double x = 1.0` → (`double`, [x]).
fn split_cdef_attribute(text: &str) -> (String, Vec<String>) {
    let mut pieces = split_top_level(text, ',').into_iter();
    let first = pieces.next().unwrap_or("");
    let first = match top_level_equals(first) {
        Some(eq) => &first[..eq],
        None => first,
    };
    let Some(caps) = RE_TRAILING_IDENT.captures(first) else {
        return (String::new(), Vec::new());
    };
    let start = caps.get(1).map_or(0, |m| m.start());
    let type_text = first[..start].trim().to_string();
    let mut names = vec![caps[1].to_string()];
    for piece in pieces {
        let piece = match top_level_equals(piece) {
            Some(eq) => &piece[..eq],
            None => piece,
        };
        if let Some(caps) = RE_TRAILING_IDENT.captures(piece) {
            names.push(caps[1].to_string());
        }
    }
    (type_text, names)
}

/// Docstring cleanup: first line stripped, common indentation of the rest
/// removed, surrounding blank lines dropped.
fn clean_doc(doc: &str) -> String {
    let lines: Vec<&str> = doc.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };
    // Margins count ASCII blanks only, so every cut lands on a char boundary
    let blank_prefix = |l: &str| l.len() - l.trim_start_matches([' ', '\t']).len();
    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| blank_prefix(*l))
        .min()
        .unwrap_or(0);

    let mut out: Vec<String> = vec![first.trim().to_string()];
    for line in rest {
        let cut = margin.min(blank_prefix(*line));
        out.push(line[cut..].trim_end().to_string());
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    out.join("\n")
}
