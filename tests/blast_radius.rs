use gidx::error::QueryError;
use gidx::model::EdgeKind;
use gidx::service::Service;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
    dir
}

fn built(dir: &TempDir) -> Service {
    let mut service = Service::new(dir.path().to_path_buf());
    service.init_project(None, None).unwrap();
    service
}

const ROUTER_PY: &str = "\
class Router:
    def handle(self):
        return Depends()


def Depends():
    pass
";

#[test]
fn scenario_depends_dependents() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let service = built(&dir);

    let blast = service.query_blast_radius("Depends", Some(1), None).unwrap();
    assert_eq!(blast.dependents, vec!["Router.handle"]);
    assert!(blast.dependencies.is_empty());
    assert_eq!(blast.affected_files, vec!["app.py"]);
}

#[test]
fn depth_two_adds_exactly_one_more_hop() {
    let dir = project(&[(
        "chain.py",
        "\
def leaf():
    pass


def mid():
    leaf()


def top():
    mid()
",
    )]);
    let service = built(&dir);

    let one = service.query_blast_radius("leaf", Some(1), None).unwrap();
    assert_eq!(one.dependents, vec!["mid"]);

    let two = service.query_blast_radius("leaf", Some(2), None).unwrap();
    assert_eq!(two.dependents, vec!["mid", "top"]);
    assert!(!two.dependents.contains(&"leaf".to_string()));
    assert!(!two.dependencies.contains(&"leaf".to_string()));

    // depth=2 is depth=1 plus one hop, deduplicated.
    for dep in &one.dependents {
        assert!(two.dependents.contains(dep));
    }
}

#[test]
fn edge_kind_filter_excludes_references() {
    let dir = project(&[
        ("a.py", "def special_target():\n    pass\n"),
        (
            "b.py",
            "def unrelated():\n    pass\n\n# special_target mentioned only in text\n",
        ),
    ]);
    let service = built(&dir);

    let all = service
        .query_blast_radius("special_target", Some(1), None)
        .unwrap();
    assert!(all.dependents.contains(&"b.py".to_string()));

    let confirmed_only: HashSet<EdgeKind> =
        [EdgeKind::Calls, EdgeKind::Contains, EdgeKind::Imports]
            .into_iter()
            .collect();
    let filtered = service
        .query_blast_radius("special_target", Some(1), Some(&confirmed_only))
        .unwrap();
    assert!(filtered.dependents.is_empty());
}

#[test]
fn instantiated_methods_reported_separately() {
    let dir = project(&[(
        "app.py",
        "\
class Worker:
    def __init__(self):
        pass

    def run(self):
        pass


def main():
    w = Worker()
    w.run()
",
    )]);
    let service = built(&dir);

    let blast = service.query_blast_radius("main", Some(1), None).unwrap();
    assert!(blast.dependencies.contains(&"Worker".to_string()));
    assert!(blast
        .instantiated_methods
        .contains(&"Worker.__init__".to_string()));
    assert!(blast.instantiated_methods.contains(&"Worker.run".to_string()));
    assert!(!blast.dependencies.contains(&"Worker.run".to_string()));
}

#[test]
fn partial_match_resolves_like_exact() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let service = built(&dir);
    let blast = service.query_blast_radius("router.han", Some(1), None).unwrap();
    assert_eq!(blast.symbol.qualname, "Router.handle");
}

#[test]
fn unknown_symbol_reports_suggestions() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let service = built(&dir);
    let err = service
        .query_blast_radius("NoSuchThing", Some(1), None)
        .unwrap_err();
    match err {
        QueryError::SymbolNotFound { name, suggestions } => {
            assert_eq!(name, "NoSuchThing");
            assert!(!suggestions.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn queries_fail_not_ready_before_first_build() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let service = Service::new(dir.path().to_path_buf());
    let err = service
        .query_blast_radius("Depends", Some(1), None)
        .unwrap_err();
    assert!(matches!(err, QueryError::NotReady));
    assert_eq!(err.code(), "not_ready");

    let err = service.find_symbols("Depends", None).unwrap_err();
    assert!(matches!(err, QueryError::NotReady));
}

#[test]
fn find_symbols_and_code_lookup() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let service = built(&dir);

    let found = service.find_symbols("handle", None).unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.matches[0].symbol, "Router.handle");

    let code = service.get_symbol_code("Router.handle").unwrap();
    assert_eq!(code.file, "app.py");
    assert!(code.code.contains("def handle"));
    assert_eq!(code.start_line, 2);

    let file = service.get_file_symbols("app.py").unwrap();
    let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Router", "Router.handle", "Depends"]);
}

#[test]
fn file_symbols_follow_source_order() {
    let dir = project(&[(
        "app.py",
        "def early():\n    pass\n\n\nclass Late:\n    def m(self):\n        pass\n",
    )]);
    let service = built(&dir);

    // A function declared before a class stays first in the listing.
    let file = service.get_file_symbols("app.py").unwrap();
    let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["early", "Late", "Late.m"]);
}
