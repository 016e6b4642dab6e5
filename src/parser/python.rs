use crate::parser::{
    CallSite, DeclKind, Declaration, ParsedFile, SourceParser, base_name, is_pascal_case,
    node_text, parse_import_text, pattern, span,
};
use crate::util;
use anyhow::Result;
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl SourceParser for PythonParser {
    fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => return pattern::PatternParser::new().parse(source),
        };
        let root = tree.root_node();
        if root.has_error() {
            // Salvage what the pattern scanner can see instead of dropping
            // the file; the fidelity flag marks the degraded path.
            return pattern::PatternParser::new().parse(source);
        }
        let mut output = ParsedFile::default();
        let mut class_stack = Vec::new();
        walk_children(root, &mut class_stack, source, &mut output);
        Ok(output)
    }
}

fn walk_children(node: Node<'_>, stack: &mut Vec<String>, source: &str, out: &mut ParsedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, stack, source, out);
    }
}

fn walk_node(node: Node<'_>, stack: &mut Vec<String>, source: &str, out: &mut ParsedFile) {
    match node.kind() {
        "decorated_definition" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(
                    child.kind(),
                    "class_definition" | "function_definition" | "async_function_definition"
                ) {
                    walk_node(child, stack, source, out);
                }
            }
        }
        "class_definition" => handle_class(node, stack, source, out),
        "function_definition" | "async_function_definition" => {
            handle_function(node, stack, source, out);
        }
        "import_statement" | "import_from_statement" => handle_import(node, source, out),
        _ => walk_children(node, stack, source, out),
    }
}

fn handle_class(node: Node<'_>, stack: &mut Vec<String>, source: &str, out: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let (start_line, end_line) = span(node);
    out.decls.push(Declaration {
        kind: DeclKind::Class,
        name: name.clone(),
        parent: None,
        start_line,
        end_line,
        text: util::slice_lines(source, start_line, end_line),
    });
    if let Some(body) = node.child_by_field_name("body") {
        stack.push(name);
        walk_children(body, stack, source, out);
        stack.pop();
    }
}

fn handle_function(node: Node<'_>, stack: &mut Vec<String>, source: &str, out: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let (start_line, end_line) = span(node);
    let parent = stack.last().cloned();
    let kind = if parent.is_some() {
        DeclKind::Method
    } else {
        DeclKind::Function
    };
    let decl = Declaration {
        kind,
        name,
        parent,
        start_line,
        end_line,
        text: util::slice_lines(source, start_line, end_line),
    };
    let scope = decl.local_qualname();
    out.decls.push(decl);
    if let Some(body) = node.child_by_field_name("body") {
        // Each body gets its own instance map; calls are attributed to the
        // innermost enclosing function only.
        let mut instances = HashMap::new();
        walk_body(body, &scope, stack, &mut instances, source, out);
    }
}

fn walk_body(
    node: Node<'_>,
    scope: &str,
    stack: &mut Vec<String>,
    instances: &mut HashMap<String, String>,
    source: &str,
    out: &mut ParsedFile,
) {
    match node.kind() {
        "call" => {
            handle_call(node, scope, instances, source, out);
            // Arguments may hold further calls.
        }
        "assignment" => track_instance(node, instances, source),
        "function_definition" | "async_function_definition" => {
            handle_function(node, stack, source, out);
            return;
        }
        "class_definition" => {
            handle_class(node, stack, source, out);
            return;
        }
        "import_statement" | "import_from_statement" => {
            handle_import(node, source, out);
            return;
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_body(child, scope, stack, instances, source, out);
    }
}

fn handle_call(
    node: Node<'_>,
    scope: &str,
    instances: &HashMap<String, String>,
    source: &str,
    out: &mut ParsedFile,
) {
    let Some(function_node) = node.child_by_field_name("function") else {
        return;
    };
    let callee = node_text(function_node, source);
    if callee.is_empty() {
        return;
    }
    let receiver_class = callee
        .split_once('.')
        .and_then(|(var, _)| instances.get(var).cloned());
    out.calls.push(CallSite {
        scope: scope.to_string(),
        callee,
        receiver_class,
        line: node.start_position().row as i64 + 1,
    });
}

/// Remember `x = Cls(...)` so that a later `x.meth(...)` in the same scope
/// can be tied back to `Cls.meth`.
fn track_instance(node: Node<'_>, instances: &mut HashMap<String, String>, source: &str) {
    let (Some(left), Some(right)) = (
        node.child_by_field_name("left"),
        node.child_by_field_name("right"),
    ) else {
        return;
    };
    if left.kind() != "identifier" || right.kind() != "call" {
        return;
    }
    let Some(function_node) = right.child_by_field_name("function") else {
        return;
    };
    let callee = node_text(function_node, source);
    let base = base_name(&callee);
    if is_pascal_case(base) {
        instances.insert(node_text(left, source), base.to_string());
    }
}

fn handle_import(node: Node<'_>, source: &str, out: &mut ParsedFile) {
    let text = node_text(node, source);
    let line = node.start_position().row as i64 + 1;
    out.imports.extend(parse_import_text(&text, line));
}
