use crate::model::Fidelity;
use anyhow::Result;

pub mod pattern;
pub mod python;
pub mod rust;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Function,
    Method,
}

/// A raw declaration as reported by a parser, before the symbol table
/// assigns it a globally unique qualified name.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Bare name of the enclosing class, when this is a method.
    pub parent: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
}

impl Declaration {
    /// File-local qualified name: `Class.method` for methods, bare name
    /// otherwise. The symbol table may further qualify on collision.
    pub fn local_qualname(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A call expression found inside a function or method body. The callee is
/// the literal identifier text, unresolved.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// File-local qualified name of the innermost enclosing function/method.
    pub scope: String,
    pub callee: String,
    /// Bare class name when the call goes through an instance variable
    /// assigned from a constructor call earlier in the same scope.
    pub receiver_class: Option<String>,
    pub line: i64,
}

#[derive(Debug, Clone)]
pub struct Import {
    /// Dotted module path (`pkg.mod`), when the statement names one.
    pub module: Option<String>,
    /// Names pulled from the module by `from ... import a, b`.
    pub names: Vec<String>,
    pub line: i64,
}

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub decls: Vec<Declaration>,
    pub calls: Vec<CallSite>,
    pub imports: Vec<Import>,
    pub fidelity: Fidelity,
}

/// One capability, two implementations: a full syntax-tree walk where a
/// grammar exists, and a pattern scanner where none does. The fidelity flag
/// in the result records which path ran.
pub trait SourceParser {
    fn parse(&mut self, source: &str) -> Result<ParsedFile>;
}

/// Select a parser for a scanned language. Starlark has no grammar in the
/// build; its Python-shaped syntax goes through the pattern scanner.
pub fn for_language(language: &str) -> Option<Box<dyn SourceParser>> {
    match language {
        "python" => python::PythonParser::new()
            .ok()
            .map(|p| Box::new(p) as Box<dyn SourceParser>),
        "rust" => rust::RustParser::new()
            .ok()
            .map(|p| Box::new(p) as Box<dyn SourceParser>),
        "starlark" => Some(Box::new(pattern::PatternParser::new())),
        _ => None,
    }
}

/// Textual parse of a Python-style import statement. `import a.b, c`
/// yields one entry per module; `from a.b import x, y as z` yields one
/// entry carrying the pulled names.
pub(crate) fn parse_import_text(text: &str, line: i64) -> Vec<Import> {
    let cleaned = text.replace('\n', " ");
    let cleaned = cleaned.trim().trim_end_matches(';');
    if let Some(rest) = cleaned.strip_prefix("from ") {
        let Some((module, names_part)) = rest.split_once(" import ") else {
            return Vec::new();
        };
        let names: Vec<String> = names_part
            .split(',')
            .filter_map(|part| {
                let name = part.trim().split_whitespace().next()?;
                let name = name.trim_matches(|c| c == '(' || c == ')');
                if name.is_empty() || name == "*" {
                    None
                } else {
                    Some(name.to_string())
                }
            })
            .collect();
        return vec![Import {
            module: Some(module.trim().to_string()),
            names,
            line,
        }];
    }
    if let Some(rest) = cleaned.strip_prefix("import ") {
        return rest
            .split(',')
            .filter_map(|part| {
                let module = part.trim().split_whitespace().next()?;
                if module.is_empty() {
                    return None;
                }
                Some(Import {
                    module: Some(module.to_string()),
                    names: Vec::new(),
                    line,
                })
            })
            .collect();
    }
    Vec::new()
}

pub(crate) fn node_text(node: tree_sitter::Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

pub(crate) fn span(node: tree_sitter::Node<'_>) -> (i64, i64) {
    (
        node.start_position().row as i64 + 1,
        node.end_position().row as i64 + 1,
    )
}

/// Last dotted segment of a callee expression.
pub(crate) fn base_name(callee: &str) -> &str {
    callee.rsplit('.').next().unwrap_or(callee)
}

pub(crate) fn is_pascal_case(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}
