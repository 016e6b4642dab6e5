use crate::parser::{
    CallSite, DeclKind, Declaration, ParsedFile, SourceParser, node_text, span,
};
use crate::parser::{Import, base_name, is_pascal_case};
use crate::util;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_rust::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl SourceParser for RustParser {
    fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("tree-sitter produced no tree"))?;
        let mut output = ParsedFile::default();
        walk_items(tree.root_node(), None, source, &mut output);
        Ok(output)
    }
}

fn walk_items(node: Node<'_>, impl_type: Option<&str>, source: &str, out: &mut ParsedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "struct_item" | "enum_item" | "trait_item" | "union_item" => {
                handle_type_item(child, source, out);
            }
            "function_item" => handle_function(child, impl_type, source, out),
            "impl_item" => handle_impl(child, source, out),
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk_items(body, None, source, out);
                }
            }
            "use_declaration" => handle_use(child, source, out),
            _ => {}
        }
    }
}

fn handle_type_item(node: Node<'_>, source: &str, out: &mut ParsedFile) {
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
        name,
        parent: None,
        start_line,
        end_line,
        text: util::slice_lines(source, start_line, end_line),
    });
}

fn handle_impl(node: Node<'_>, source: &str, out: &mut ParsedFile) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let raw = node_text(type_node, source);
    let type_name = raw.split('<').next().unwrap_or(&raw).trim().to_string();
    if type_name.is_empty() {
        return;
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if child.kind() == "function_item" {
                handle_function(child, Some(&type_name), source, out);
            }
        }
    }
}

fn handle_function(node: Node<'_>, impl_type: Option<&str>, source: &str, out: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let (start_line, end_line) = span(node);
    let decl = Declaration {
        kind: if impl_type.is_some() {
            DeclKind::Method
        } else {
            DeclKind::Function
        },
        name,
        parent: impl_type.map(|t| t.to_string()),
        start_line,
        end_line,
        text: util::slice_lines(source, start_line, end_line),
    };
    let scope = decl.local_qualname();
    out.decls.push(decl);
    if let Some(body) = node.child_by_field_name("body") {
        let mut instances = HashMap::new();
        walk_body(body, &scope, &mut instances, source, out);
    }
}

fn walk_body(
    node: Node<'_>,
    scope: &str,
    instances: &mut HashMap<String, String>,
    source: &str,
    out: &mut ParsedFile,
) {
    match node.kind() {
        "call_expression" => handle_call(node, scope, instances, source, out),
        "let_declaration" => track_instance(node, instances, source),
        // Nested items keep their own scopes; skip them here.
        "function_item" | "impl_item" | "struct_item" | "enum_item" | "trait_item" => return,
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_body(child, scope, instances, source, out);
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
    let raw = node_text(function_node, source);
    if raw.is_empty() {
        return;
    }
    // Normalize path calls so `Type::method` resolves like `Type.method`.
    let callee = raw.replace("::", ".");
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

/// `let x = Type::new(...)` ties `x` to `Type` for later `x.method()` calls.
fn track_instance(node: Node<'_>, instances: &mut HashMap<String, String>, source: &str) {
    let (Some(pattern), Some(value)) = (
        node.child_by_field_name("pattern"),
        node.child_by_field_name("value"),
    ) else {
        return;
    };
    if pattern.kind() != "identifier" || value.kind() != "call_expression" {
        return;
    }
    let Some(function_node) = value.child_by_field_name("function") else {
        return;
    };
    let callee = node_text(function_node, source).replace("::", ".");
    let Some((ty, _)) = callee.rsplit_once('.') else {
        return;
    };
    let base = base_name(ty);
    if is_pascal_case(base) {
        instances.insert(node_text(pattern, source), base.to_string());
    }
}

fn handle_use(node: Node<'_>, source: &str, out: &mut ParsedFile) {
    let Some(arg) = node.child_by_field_name("argument") else {
        return;
    };
    let text = node_text(arg, source);
    if text.is_empty() {
        return;
    }
    let line = node.start_position().row as i64 + 1;
    if let Some((prefix, list)) = text.split_once('{') {
        let module = prefix.trim_end_matches("::").replace("::", ".");
        let names = list
            .trim_end_matches('}')
            .split(',')
            .filter_map(|part| {
                let name = part.trim().split_whitespace().next()?;
                let name = name.rsplit("::").next().unwrap_or(name);
                if name.is_empty() || name == "*" || name == "self" {
                    None
                } else {
                    Some(name.to_string())
                }
            })
            .collect();
        out.imports.push(Import {
            module: if module.is_empty() { None } else { Some(module) },
            names,
            line,
        });
        return;
    }
    let path = text.replace("::", ".");
    let (module, name) = match path.rsplit_once('.') {
        Some((module, name)) => (Some(module.to_string()), name.to_string()),
        None => (Some(path.clone()), path),
    };
    out.imports.push(Import {
        module,
        names: vec![name],
        line,
    });
}
