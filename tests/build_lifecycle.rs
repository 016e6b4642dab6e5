use gidx::error::QueryError;
use gidx::indexer::BuildOptions;
use gidx::service::Service;
use std::fs;
use std::time::Duration;
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

const ROUTER_PY: &str = "\
class Router:
    def handle(self):
        return Depends()


def Depends():
    pass
";

#[test]
fn unreadable_file_is_skipped_and_reported() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    // Not valid UTF-8; reading it as text fails.
    fs::write(dir.path().join("broken.py"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

    let mut service = Service::new(dir.path().to_path_buf());
    let stats = service.init_project(None, None).unwrap();

    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.failed_paths, vec!["broken.py"]);
    assert_eq!(stats.files_parsed, 1);

    // Every other file's symbols are present and queryable.
    let blast = service.query_blast_radius("Depends", Some(1), None).unwrap();
    assert_eq!(blast.dependents, vec!["Router.handle"]);
}

#[test]
fn invalid_root_fails_the_whole_build() {
    let mut service = Service::new("/no/such/root".into());
    assert!(service.init_project(None, None).is_err());
    // And the service stays unready.
    let err = service
        .query_blast_radius("anything", Some(1), None)
        .unwrap_err();
    assert!(matches!(err, QueryError::NotReady));
}

#[test]
fn snapshot_cache_round_trips() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let options = BuildOptions {
        use_cache: true,
        ..Default::default()
    };

    let mut first = Service::with_options(dir.path().to_path_buf(), options);
    let stats = first.init_project(None, None).unwrap();
    assert!(!stats.from_cache);
    assert!(dir.path().join(".gidx/snapshot.json").is_file());

    // Unchanged tree: the second build loads the snapshot instead of
    // reparsing, and queries behave identically.
    let mut second = Service::with_options(dir.path().to_path_buf(), options);
    let stats = second.init_project(None, None).unwrap();
    assert!(stats.from_cache);
    assert_eq!(stats.symbols, 4);

    let blast = second.query_blast_radius("Depends", Some(1), None).unwrap();
    assert_eq!(blast.dependents, vec!["Router.handle"]);
}

#[test]
fn snapshot_cache_invalidated_by_content_change() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let options = BuildOptions {
        use_cache: true,
        ..Default::default()
    };

    let mut service = Service::with_options(dir.path().to_path_buf(), options);
    service.init_project(None, None).unwrap();

    fs::write(
        dir.path().join("app.py"),
        format!("{ROUTER_PY}\ndef extra():\n    pass\n"),
    )
    .unwrap();

    let mut service = Service::with_options(dir.path().to_path_buf(), options);
    let stats = service.init_project(None, None).unwrap();
    assert!(!stats.from_cache);
    assert!(service.find_symbols("extra", None).unwrap().total >= 1);
}

#[test]
fn own_state_dir_is_never_indexed() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let options = BuildOptions {
        use_cache: true,
        ..Default::default()
    };
    let mut service = Service::with_options(dir.path().to_path_buf(), options);
    let first = service.init_project(None, None).unwrap();

    // The cache file written under .gidx must not change the scan set.
    let mut service = Service::with_options(dir.path().to_path_buf(), options);
    let second = service.init_project(None, None).unwrap();
    assert_eq!(first.files_scanned, second.files_scanned);
}

#[test]
fn starlark_rides_the_pattern_fallback() {
    let dir = project(&[
        ("app.py", ROUTER_PY),
        (
            "defs.bzl",
            "def my_rule_impl(ctx):\n    pass\n\ndef my_rule():\n    pass\n",
        ),
    ]);
    let mut service = Service::new(dir.path().to_path_buf());
    let stats = service.init_project(None, None).unwrap();

    // No grammar for Starlark; the file is scanned through the pattern
    // fallback and the degraded path stays visible in the stats.
    assert_eq!(stats.files_parsed, 2);
    assert_eq!(stats.fallback_files, 1);

    let found = service.find_symbols("my_rule_impl", None).unwrap();
    assert_eq!(found.total, 1);
    let code = service.get_symbol_code("my_rule_impl").unwrap();
    assert_eq!(code.file, "defs.bzl");
}

#[test]
fn timed_out_rebuild_keeps_previous_snapshot() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let mut service = Service::new(dir.path().to_path_buf());
    service.init_project(None, None).unwrap();

    service.set_build_timeout(Some(Duration::ZERO));
    let err = service.init_project(None, None).unwrap_err();
    let timeout = err
        .downcast_ref::<QueryError>()
        .map(|e| matches!(e, QueryError::BuildTimeout { .. }))
        .unwrap_or(false);
    assert!(timeout, "expected BuildTimeout, got: {err}");

    // The last good graph is still served.
    let blast = service.query_blast_radius("Depends", Some(1), None).unwrap();
    assert_eq!(blast.dependents, vec!["Router.handle"]);
}

#[test]
fn rebuild_swaps_snapshot_for_new_content() {
    let dir = project(&[("app.py", ROUTER_PY)]);
    let mut service = Service::new(dir.path().to_path_buf());
    service.init_project(None, None).unwrap();

    fs::write(
        dir.path().join("extra.py"),
        "def late_arrival():\n    Depends()\n",
    )
    .unwrap();
    service.init_project(None, None).unwrap();

    let blast = service.query_blast_radius("Depends", Some(1), None).unwrap();
    assert!(blast.dependents.contains(&"Router.handle".to_string()));
    assert!(blast.dependents.contains(&"late_arrival".to_string()));
}
