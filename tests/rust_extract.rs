use gidx::model::Fidelity;
use gidx::parser::rust::RustParser;
use gidx::parser::{DeclKind, SourceParser};

const SOURCE: &str = r#"
use std::fmt;
use crate::store::{Store, open_store};

pub struct Cache {
    entries: usize,
}

impl Cache {
    pub fn new() -> Self {
        Cache { entries: 0 }
    }

    pub fn insert(&mut self) {
        self.bump();
    }

    fn bump(&mut self) {
        self.entries += 1;
    }
}

pub fn rebuild() -> Cache {
    let cache = Cache::new();
    cache.insert();
    cache
}
"#;

#[test]
fn extracts_types_and_impl_methods() {
    let mut parser = RustParser::new().unwrap();
    let parsed = parser.parse(SOURCE).unwrap();
    assert_eq!(parsed.fidelity, Fidelity::TreeWalk);

    let names: Vec<(DeclKind, &str, Option<&str>)> = parsed
        .decls
        .iter()
        .map(|d| (d.kind, d.name.as_str(), d.parent.as_deref()))
        .collect();
    assert!(names.contains(&(DeclKind::Class, "Cache", None)));
    assert!(names.contains(&(DeclKind::Method, "new", Some("Cache"))));
    assert!(names.contains(&(DeclKind::Method, "insert", Some("Cache"))));
    assert!(names.contains(&(DeclKind::Function, "rebuild", None)));
}

#[test]
fn path_calls_are_normalized_to_dots() {
    let mut parser = RustParser::new().unwrap();
    let parsed = parser.parse(SOURCE).unwrap();
    assert!(parsed
        .calls
        .iter()
        .any(|c| c.scope == "rebuild" && c.callee == "Cache.new"));
}

#[test]
fn constructor_binding_tracks_receiver() {
    let mut parser = RustParser::new().unwrap();
    let parsed = parser.parse(SOURCE).unwrap();
    let insert_call = parsed
        .calls
        .iter()
        .find(|c| c.callee == "cache.insert")
        .unwrap();
    assert_eq!(insert_call.receiver_class.as_deref(), Some("Cache"));
}

#[test]
fn use_declarations_become_imports() {
    let mut parser = RustParser::new().unwrap();
    let parsed = parser.parse(SOURCE).unwrap();

    let std_fmt = parsed
        .imports
        .iter()
        .find(|i| i.module.as_deref() == Some("std"))
        .unwrap();
    assert_eq!(std_fmt.names, vec!["fmt"]);

    let store = parsed
        .imports
        .iter()
        .find(|i| i.module.as_deref() == Some("crate.store"))
        .unwrap();
    assert_eq!(store.names, vec!["Store", "open_store"]);
}
