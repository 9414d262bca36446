//! Python stand-in module synthesis.
//!
//! Turns parsed interface declarations into importable, behaviorally inert
//! Python source: classes keep their nesting, callables keep their
//! parameter names, every body returns one opaque placeholder.

use crate::model::*;
use std::collections::HashSet;

/// Python keywords. Soft keywords (`match`, `case`, `type`, `_`) are valid
/// identifiers and are left alone.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Helper names the synthesized module defines for itself.
const PLACEHOLDER_CLASS: &str = "_Placeholder";
const PLACEHOLDER_VALUE: &str = "_PLACEHOLDER";
const BUILTINS_ALIAS: &str = "_builtins";

/// Decorators that change how a stand-in is introspected. They are emitted
/// through the builtins alias, so stand-ins of the same name cannot shadow them.
const KEPT_DECORATORS: &[&str] = &["staticmethod", "classmethod", "property"];

const PLACEHOLDER_DEFINITION: &str = r#"import builtins as _builtins


class _Placeholder(_builtins.object):
    """Opaque value returned by every stand-in."""

    def __init__(self, *args, **kwargs):
        pass

    def __call__(self, *args, **kwargs):
        return self

    def __getattr__(self, name):
        if name.startswith("__") and name.endswith("__"):
            raise _builtins.AttributeError(name)
        return self

    def __iter__(self):
        return _builtins.iter(())

    def __enter__(self):
        return self

    def __exit__(self, *args):
        return False

    def __bool__(self):
        return False

    def __repr__(self):
        return "<placeholder>"


_PLACEHOLDER = _Placeholder()
"#;

const INDENT: &str = "    ";

/// Build the stand-in module for `decls`.
///
/// `origin` names the interface file in the generated header; `preludes`
/// are copied verbatim ahead of the stand-ins.
pub fn synthesize(
    decls: &[InterfaceDeclaration],
    module_name: &str,
    origin: &str,
    preludes: &[String],
) -> MockModule {
    let tree = Tree::build(decls);
    let mut synth = Synthesizer {
        decls,
        tree: &tree,
        out: String::new(),
        entities: Vec::new(),
        top_level_classes: HashSet::new(),
    };

    synth.out.push_str(&format!(
        "# Stand-in for the native `{}` module, synthesized from {}.\n",
        module_name, origin
    ));
    synth
        .out
        .push_str("# Every callable accepts any arguments and returns an opaque placeholder.\n");
    synth.out.push_str("# Generated file: do not edit.\n\n");

    for prelude in preludes {
        synth.out.push_str(prelude.trim_end());
        synth.out.push_str("\n\n\n");
    }
    synth.out.push_str(PLACEHOLDER_DEFINITION);

    let mut reserved: HashSet<String> = [PLACEHOLDER_CLASS, PLACEHOLDER_VALUE, BUILTINS_ALIAS]
        .into_iter()
        .map(String::from)
        .collect();
    synth.emit_scope(&tree.roots, 0, None, &mut reserved);

    MockModule {
        module_name: module_name.to_string(),
        source: synth.out,
        entities: synth.entities,
    }
}

/// Escape a name that Python would reject, then suffix `_` until it is
/// unique among `taken`.
pub fn escape_name(name: &str, taken: &HashSet<String>) -> String {
    let mut escaped = name.to_string();
    if PYTHON_KEYWORDS.contains(&name) {
        escaped.push('_');
    }
    while taken.contains(&escaped) {
        escaped.push('_');
    }
    escaped
}

// -- Declaration tree ---------------------------------------------------------

/// Ownership tree over the flat declaration list, by index.
struct Tree {
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
}

impl Tree {
    fn build(decls: &[InterfaceDeclaration]) -> Self {
        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); decls.len()];
        for (idx, decl) in decls.iter().enumerate() {
            // The owner is the latest class declared at the enclosing path
            let owner = decl.enclosing.as_ref().and_then(|path| {
                decls[..idx]
                    .iter()
                    .rposition(|d| d.kind == DeclKind::Class && d.path() == *path)
            });
            match owner {
                Some(owner) => children[owner].push(idx),
                None => roots.push(idx),
            }
        }
        Self { roots, children }
    }
}

// -- Emission -----------------------------------------------------------------

struct Synthesizer<'a> {
    decls: &'a [InterfaceDeclaration],
    tree: &'a Tree,
    out: String,
    entities: Vec<MockEntity>,
    /// Emitted names of module-level classes, usable as bases.
    top_level_classes: HashSet<String>,
}

impl Synthesizer<'_> {
    /// Emit the members of one scope. `prefix` is the emitted dotted path
    /// of the owning class; `taken` starts with names reserved in it.
    fn emit_scope(
        &mut self,
        members: &[usize],
        level: usize,
        prefix: Option<&str>,
        taken: &mut HashSet<String>,
    ) {
        // Every declared name in the scope is claimed before escaping
        let declared: HashSet<String> = members
            .iter()
            .map(|&idx| self.decls[idx].name.clone())
            .collect();
        taken.extend(declared.iter().filter(|n| !PYTHON_KEYWORDS.contains(&n.as_str())).cloned());

        for &idx in members {
            let decl = &self.decls[idx];
            let name = if PYTHON_KEYWORDS.contains(&decl.name.as_str())
                || (level == 0
                    && [PLACEHOLDER_CLASS, PLACEHOLDER_VALUE, BUILTINS_ALIAS].contains(&decl.name.as_str()))
            {
                let mut others = taken.clone();
                others.insert(decl.name.clone());
                let escaped = escape_name(&decl.name, &others);
                taken.insert(escaped.clone());
                escaped
            } else {
                decl.name.clone()
            };
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };

            match decl.kind {
                DeclKind::Class => self.emit_class(idx, &name, &path, level),
                DeclKind::Function => self.emit_function(decl, &name, &path, level, prefix.is_some()),
                DeclKind::Attribute => {
                    self.line(level, &format!("{} = {}", name, PLACEHOLDER_VALUE));
                    self.entities.push(MockEntity {
                        kind: DeclKind::Attribute,
                        name: name.clone(),
                        declared_name: decl.name.clone(),
                        path,
                        params: Vec::new(),
                        arity: 0,
                        enclosing: prefix.map(String::from),
                    });
                }
            }
        }
    }

    fn emit_class(&mut self, idx: usize, name: &str, path: &str, level: usize) {
        let decl = &self.decls[idx];
        let prefix = path.rsplit_once('.').map(|(p, _)| p.to_string());

        // Keep bases that name stand-ins already defined at module level
        let bases: Vec<&str> = decl
            .signature
            .split(',')
            .map(str::trim)
            .filter(|b| self.top_level_classes.contains(*b))
            .collect();
        let bases = if bases.is_empty() {
            format!("{}.object", BUILTINS_ALIAS)
        } else {
            bases.join(", ")
        };

        self.blank_lines(level);
        self.line(level, &format!("class {}({}):", name, bases));
        if let Some(doc) = &decl.doc {
            self.docstring(level + 1, doc);
        }
        let members = self.tree.children[idx].clone();
        if members.is_empty() && decl.doc.is_none() {
            self.line(level + 1, "pass");
        }

        self.entities.push(MockEntity {
            kind: DeclKind::Class,
            name: name.to_string(),
            declared_name: decl.name.clone(),
            path: path.to_string(),
            params: Vec::new(),
            arity: 0,
            enclosing: prefix,
        });
        if level == 0 {
            self.top_level_classes.insert(name.to_string());
        }

        let mut taken = HashSet::new();
        self.emit_scope(&members, level + 1, Some(path), &mut taken);
    }

    fn emit_function(
        &mut self,
        decl: &InterfaceDeclaration,
        name: &str,
        path: &str,
        level: usize,
        is_method: bool,
    ) {
        let decorators: Vec<&str> = decl
            .decorators
            .iter()
            .map(String::as_str)
            .filter(|d| KEPT_DECORATORS.contains(d))
            .collect();
        let is_static = decorators.contains(&"staticmethod");
        let signature = stand_in_params(&decl.params, is_method && !is_static);

        self.blank_lines(level);
        for decorator in &decorators {
            self.line(level, &format!("@{}.{}", BUILTINS_ALIAS, decorator));
        }
        self.line(level, &format!("def {}({}):", name, signature.rendered.join(", ")));
        if let Some(doc) = &decl.doc {
            self.docstring(level + 1, doc);
        }
        self.line(level + 1, &format!("return {}", PLACEHOLDER_VALUE));

        self.entities.push(MockEntity {
            kind: DeclKind::Function,
            name: name.to_string(),
            declared_name: decl.name.clone(),
            path: path.to_string(),
            params: signature.names,
            arity: decl.params.iter().filter(|p| p.is_named()).count(),
            enclosing: path.rsplit_once('.').map(|(p, _)| p.to_string()),
        });
    }

    fn line(&mut self, level: usize, text: &str) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Two blank lines before module-level definitions, one inside classes.
    fn blank_lines(&mut self, level: usize) {
        let wanted = if level == 0 { 2 } else { 1 };
        // Not directly after a `class ...:` header
        if self.out.trim_end().ends_with(':') {
            return;
        }
        let trailing = self.out.len() - self.out.trim_end_matches('\n').len();
        for _ in trailing.saturating_sub(1)..wanted {
            self.out.push('\n');
        }
    }

    fn docstring(&mut self, level: usize, doc: &str) {
        let escaped = doc.replace('\\', "\\\\").replace('"', "\\\"");
        let mut lines = escaped.lines();
        let first = lines.next().unwrap_or("");
        let rest: Vec<&str> = lines.collect();
        if rest.is_empty() {
            self.line(level, &format!("\"\"\"{}\"\"\"", first));
            return;
        }
        self.line(level, &format!("\"\"\"{}", first));
        for line in rest {
            if line.is_empty() {
                self.out.push('\n');
            } else {
                self.line(level, line);
            }
        }
        self.line(level, "\"\"\"");
    }
}

// -- Signatures ---------------------------------------------------------------

struct StandInSignature {
    /// Parameter list entries as written.
    rendered: Vec<String>,
    /// Names of the declared parameters, after escaping.
    names: Vec<String>,
}

/// Rewrite a declared parameter list so that it keeps names and order but
/// binds any call: named parameters default to `None` (except a method's
/// leading `self`/`cls`), and `*args`/`**kwargs` are added when missing.
fn stand_in_params(params: &[Param], is_method: bool) -> StandInSignature {
    let mut taken: HashSet<String> = HashSet::new();
    let mut rendered = Vec::new();
    let mut names = Vec::new();
    let mut has_var_args = false;
    let mut var_keyword: Option<String> = None;
    let mut first_named = true;

    for (i, param) in params.iter().enumerate() {
        match param.kind {
            ParamKind::PositionalOnlyMarker => {
                // Only valid after at least one positional parameter
                if !names.is_empty() && !has_var_args {
                    rendered.push("/".to_string());
                }
            }
            ParamKind::KeywordOnlyMarker | ParamKind::VarArgs => {
                if has_var_args {
                    continue;
                }
                has_var_args = true;
                let followed_by_keyword = params[i + 1..]
                    .iter()
                    .any(|p| p.kind == ParamKind::KeywordOnly);
                if param.kind == ParamKind::VarArgs {
                    let name = escape_name(&param.name, &taken);
                    taken.insert(name.clone());
                    rendered.push(format!("*{}", name));
                    names.push(name);
                } else if followed_by_keyword {
                    rendered.push("*".to_string());
                } else {
                    let name = escape_name("args", &reserved_for(params, &taken));
                    taken.insert(name.clone());
                    rendered.push(format!("*{}", name));
                }
            }
            ParamKind::VarKeyword => {
                if var_keyword.is_none() {
                    let name = escape_name(&param.name, &taken);
                    taken.insert(name.clone());
                    names.push(name.clone());
                    var_keyword = Some(name);
                }
            }
            ParamKind::Positional | ParamKind::KeywordOnly => {
                let name = escape_name(&param.name, &taken);
                taken.insert(name.clone());
                let receiver = is_method
                    && first_named
                    && param.kind == ParamKind::Positional
                    && (name == "self" || name == "cls");
                if receiver {
                    rendered.push(name.clone());
                } else {
                    rendered.push(format!("{}=None", name));
                }
                names.push(name);
            }
        }
        if param.is_named() {
            first_named = false;
        }
    }

    if !has_var_args {
        let name = escape_name("args", &reserved_for(params, &taken));
        taken.insert(name.clone());
        rendered.push(format!("*{}", name));
    }
    match var_keyword {
        Some(name) => rendered.push(format!("**{}", name)),
        None => {
            let name = escape_name("kwargs", &reserved_for(params, &taken));
            rendered.push(format!("**{}", name));
        }
    }

    StandInSignature { rendered, names }
}

/// Names an added `*args`/`**kwargs` must avoid: everything declared.
fn reserved_for(params: &[Param], taken: &HashSet<String>) -> HashSet<String> {
    let mut reserved = taken.clone();
    reserved.extend(params.iter().map(|p| p.name.clone()));
    reserved
}
