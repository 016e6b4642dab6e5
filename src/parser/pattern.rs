use crate::model::Fidelity;
use crate::parser::{DeclKind, Declaration, ParsedFile, SourceParser, parse_import_text};
use crate::util;
use anyhow::Result;

/// Structural fallback scanner for Python-shaped source. Recognizes
/// class/def/import lines by keyword and indentation anchors only, so it
/// cannot attribute call sites to enclosing scopes or see nested
/// declarations; its output is flagged `Fidelity::Pattern`.
pub struct PatternParser;

impl PatternParser {
    pub fn new() -> Self {
        PatternParser
    }
}

impl Default for PatternParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for PatternParser {
    fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let mut out = ParsedFile {
            fidelity: Fidelity::Pattern,
            ..Default::default()
        };

        let lines: Vec<&str> = source.lines().collect();
        let total = lines.len() as i64;
        let mut current_class: Option<String> = None;
        // Indexes into out.decls of the class/function whose end line is
        // still open.
        let mut open_class: Option<usize> = None;
        let mut open_fn: Option<usize> = None;

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx as i64 + 1;
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = raw.len() - trimmed.len();

            if indent == 0 {
                if let Some(name) = decl_name(trimmed, "class ") {
                    close(&mut out, &mut open_fn, line_no - 1);
                    close(&mut out, &mut open_class, line_no - 1);
                    out.decls.push(Declaration {
                        kind: DeclKind::Class,
                        name: name.clone(),
                        parent: None,
                        start_line: line_no,
                        end_line: total,
                        text: String::new(),
                    });
                    open_class = Some(out.decls.len() - 1);
                    current_class = Some(name);
                    continue;
                }
                if let Some(name) = def_name(trimmed) {
                    close(&mut out, &mut open_fn, line_no - 1);
                    close(&mut out, &mut open_class, line_no - 1);
                    current_class = None;
                    out.decls.push(Declaration {
                        kind: DeclKind::Function,
                        name,
                        parent: None,
                        start_line: line_no,
                        end_line: total,
                        text: String::new(),
                    });
                    open_fn = Some(out.decls.len() - 1);
                    continue;
                }
                if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
                    out.imports.extend(parse_import_text(trimmed, line_no));
                    continue;
                }
                // Any other top-level statement ends whatever was open.
                close(&mut out, &mut open_fn, line_no - 1);
                close(&mut out, &mut open_class, line_no - 1);
                current_class = None;
                continue;
            }

            // Indented def inside a class body becomes a method.
            if let Some(name) = def_name(trimmed) {
                if let Some(class_name) = current_class.clone() {
                    close(&mut out, &mut open_fn, line_no - 1);
                    out.decls.push(Declaration {
                        kind: DeclKind::Method,
                        name,
                        parent: Some(class_name),
                        start_line: line_no,
                        end_line: total,
                        text: String::new(),
                    });
                    open_fn = Some(out.decls.len() - 1);
                }
            }
        }

        for decl in &mut out.decls {
            decl.text = util::slice_lines(source, decl.start_line, decl.end_line);
        }
        Ok(out)
    }
}

fn close(out: &mut ParsedFile, open: &mut Option<usize>, end_line: i64) {
    if let Some(idx) = open.take() {
        let decl = &mut out.decls[idx];
        decl.end_line = end_line.max(decl.start_line);
    }
}

fn decl_name(trimmed: &str, keyword: &str) -> Option<String> {
    let rest = trimmed.strip_prefix(keyword)?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

fn def_name(trimmed: &str) -> Option<String> {
    let rest = trimmed
        .strip_prefix("async def ")
        .or_else(|| trimmed.strip_prefix("def "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}
