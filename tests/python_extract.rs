use gidx::model::Fidelity;
use gidx::parser::python::PythonParser;
use gidx::parser::{DeclKind, SourceParser};

#[test]
fn extract_declarations_and_calls() {
    let source = r#"
import os
from pkg import util, helpers

class Router:
    def handle(self, request):
        return Depends()

    def reset(self):
        self.handle(None)

def Depends():
    pass
"#;
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();
    assert_eq!(parsed.fidelity, Fidelity::TreeWalk);

    let names: Vec<(DeclKind, &str, Option<&str>)> = parsed
        .decls
        .iter()
        .map(|d| (d.kind, d.name.as_str(), d.parent.as_deref()))
        .collect();
    assert!(names.contains(&(DeclKind::Class, "Router", None)));
    assert!(names.contains(&(DeclKind::Method, "handle", Some("Router"))));
    assert!(names.contains(&(DeclKind::Method, "reset", Some("Router"))));
    assert!(names.contains(&(DeclKind::Function, "Depends", None)));

    let calls: Vec<(&str, &str)> = parsed
        .calls
        .iter()
        .map(|c| (c.scope.as_str(), c.callee.as_str()))
        .collect();
    assert!(calls.contains(&("Router.handle", "Depends")));
    assert!(calls.contains(&("Router.reset", "self.handle")));

    let modules: Vec<Option<&str>> = parsed.imports.iter().map(|i| i.module.as_deref()).collect();
    assert!(modules.contains(&Some("os")));
    assert!(modules.contains(&Some("pkg")));
    let from_pkg = parsed
        .imports
        .iter()
        .find(|i| i.module.as_deref() == Some("pkg"))
        .unwrap();
    assert_eq!(from_pkg.names, vec!["util", "helpers"]);
}

#[test]
fn spans_are_one_indexed_and_inclusive() {
    let source = "class A:\n    def m(self):\n        pass\n";
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();
    let class = parsed.decls.iter().find(|d| d.name == "A").unwrap();
    let method = parsed.decls.iter().find(|d| d.name == "m").unwrap();
    assert_eq!(class.start_line, 1);
    assert!(class.end_line >= method.end_line);
    assert_eq!(method.start_line, 2);
    assert!(method.start_line >= class.start_line && method.end_line <= class.end_line);
}

#[test]
fn calls_attributed_to_innermost_function() {
    let source = r#"
def outer():
    def inner():
        target()
    inner()
"#;
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();

    let inner_calls: Vec<&str> = parsed
        .calls
        .iter()
        .filter(|c| c.scope == "inner")
        .map(|c| c.callee.as_str())
        .collect();
    assert_eq!(inner_calls, vec!["target"]);

    let outer_calls: Vec<&str> = parsed
        .calls
        .iter()
        .filter(|c| c.scope == "outer")
        .map(|c| c.callee.as_str())
        .collect();
    assert_eq!(outer_calls, vec!["inner"]);
}

#[test]
fn instance_calls_carry_receiver_class() {
    let source = r#"
def main():
    w = Worker()
    w.run()
    other.run()
"#;
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();

    let run_call = parsed
        .calls
        .iter()
        .find(|c| c.callee == "w.run")
        .unwrap();
    assert_eq!(run_call.receiver_class.as_deref(), Some("Worker"));

    let other_call = parsed
        .calls
        .iter()
        .find(|c| c.callee == "other.run")
        .unwrap();
    assert!(other_call.receiver_class.is_none());
}

#[test]
fn nested_calls_in_arguments_are_collected() {
    let source = r#"
def wrap():
    outer(inner())
"#;
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();
    let callees: Vec<&str> = parsed.calls.iter().map(|c| c.callee.as_str()).collect();
    assert!(callees.contains(&"outer"));
    assert!(callees.contains(&"inner"));
}

#[test]
fn malformed_source_degrades_to_pattern_fidelity() {
    let source = "class Broken(:\n    def still_found(self):\n        pass\n";
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();
    assert_eq!(parsed.fidelity, Fidelity::Pattern);
    assert!(parsed.decls.iter().any(|d| d.name == "Broken"));
    assert!(parsed.decls.iter().any(|d| d.name == "still_found"));
}

#[test]
fn decorated_definitions_are_walked() {
    let source = r#"
@route("/users")
def list_users():
    return query()
"#;
    let mut parser = PythonParser::new().unwrap();
    let parsed = parser.parse(source).unwrap();
    assert!(parsed.decls.iter().any(|d| d.name == "list_users"));
    assert!(parsed
        .calls
        .iter()
        .any(|c| c.scope == "list_users" && c.callee == "query"));
}
