use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const TEST_DIRS: &[&str] = &["tests", "test", "spec", "specs"];

#[derive(Debug, Serialize, Clone)]
pub struct TestFileInfo {
    pub file: String,
    pub test_count: usize,
    pub test_functions: Vec<String>,
    pub fixtures: Vec<String>,
    pub patterns: Vec<String>,
    pub matched_symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RelatedTests {
    pub test_files: Vec<TestFileInfo>,
    pub total_tests: usize,
    pub fixtures_used: Vec<String>,
    pub patterns_detected: Vec<String>,
    pub coverage_hint: String,
}

/// Finds test files relevant to a set of affected files and symbols by
/// scanning conventional test locations. Internal heuristics are opaque to
/// the graph core; only this input/output contract is relied on.
#[derive(Debug)]
pub struct TestLocator {
    root: PathBuf,
}

impl TestLocator {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn find_tests(&self, affected_files: &[String], symbols: &[String]) -> RelatedTests {
        let mut relevant = Vec::new();
        let mut fixtures_used: BTreeSet<String> = BTreeSet::new();
        let mut patterns_detected: BTreeSet<String> = BTreeSet::new();

        for path in self.scan_test_files() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(rel_path) = crate::util::normalize_rel_path(&self.root, &path) else {
                continue;
            };

            let mut is_relevant = false;
            let mut matched_symbols = Vec::new();

            for affected in affected_files {
                let module_name = affected
                    .trim_end_matches(".py")
                    .trim_end_matches(".rs")
                    .replace('/', ".");
                let base_name = Path::new(affected)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(affected);
                if content.contains(&module_name) || content.contains(base_name) {
                    is_relevant = true;
                    break;
                }
            }
            for symbol in symbols {
                let bare = symbol.rsplit('.').next().unwrap_or(symbol);
                if content.contains(bare) {
                    is_relevant = true;
                    matched_symbols.push(symbol.clone());
                }
            }

            if is_relevant {
                let mut info = analyze_test_file(&content, &rel_path);
                info.matched_symbols = matched_symbols;
                fixtures_used.extend(info.fixtures.iter().cloned());
                patterns_detected.extend(info.patterns.iter().cloned());
                relevant.push(info);
            }
        }

        relevant.sort_by(|a, b| a.file.cmp(&b.file));
        let total_tests = relevant.iter().map(|t| t.test_count).sum();
        let coverage_hint = estimate_coverage(&relevant, symbols);
        RelatedTests {
            test_files: relevant,
            total_tests,
            fixtures_used: fixtures_used.into_iter().collect(),
            patterns_detected: patterns_detected.into_iter().collect(),
            coverage_hint,
        }
    }

    fn scan_test_files(&self) -> Vec<PathBuf> {
        let mut found: BTreeSet<PathBuf> = BTreeSet::new();

        for dir in TEST_DIRS {
            let dir_path = self.root.join(dir);
            if !dir_path.is_dir() {
                continue;
            }
            let walker = WalkBuilder::new(&dir_path).hidden(false).build();
            for entry in walker.flatten() {
                let path = entry.path();
                if path.is_file() && is_test_file_name(path) {
                    found.insert(path.to_path_buf());
                }
            }
        }

        // Test files sitting at the project root.
        if let Ok(entries) = std::fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && is_test_file_name(&path) {
                    found.insert(path);
                }
            }
        }

        found.into_iter().collect()
    }
}

fn is_test_file_name(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !matches!(ext, "py" | "rs") {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    stem.starts_with("test") || stem.ends_with("_test")
}

fn analyze_test_file(content: &str, rel_path: &str) -> TestFileInfo {
    let mut info = TestFileInfo {
        file: rel_path.to_string(),
        test_count: 0,
        test_functions: Vec::new(),
        fixtures: Vec::new(),
        patterns: Vec::new(),
        matched_symbols: Vec::new(),
    };

    let mut fixtures: BTreeSet<String> = BTreeSet::new();
    let mut patterns: BTreeSet<String> = BTreeSet::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(name) = test_fn_name(trimmed) {
            info.test_count += 1;
            info.test_functions.push(name);
        }
        if trimmed.contains("@pytest.fixture") || trimmed.contains("@fixture") {
            patterns.insert("pytest-fixtures".to_string());
        }
        if trimmed.to_lowercase().contains("mock") || trimmed.contains("@patch") {
            patterns.insert("mocking".to_string());
        }
        if trimmed.contains("parametrize") {
            patterns.insert("parametrized".to_string());
        }
    }

    if content.contains("import pytest") {
        fixtures.insert("pytest".to_string());
    }
    if content.contains("import unittest") {
        fixtures.insert("unittest".to_string());
    }
    if content.contains("from django.test") {
        fixtures.insert("django-test".to_string());
    }
    if content.contains("#[test]") {
        fixtures.insert("rust-test".to_string());
    }

    info.fixtures = fixtures.into_iter().collect();
    info.patterns = patterns.into_iter().collect();
    info
}

fn test_fn_name(trimmed: &str) -> Option<String> {
    let rest = trimmed
        .strip_prefix("async def ")
        .or_else(|| trimmed.strip_prefix("def "))
        .or_else(|| trimmed.strip_prefix("fn "))?;
    if !rest.starts_with("test_") {
        return None;
    }
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

fn estimate_coverage(tests: &[TestFileInfo], symbols: &[String]) -> String {
    if tests.is_empty() {
        return "NO_TESTS".to_string();
    }
    let total_tests: usize = tests.iter().map(|t| t.test_count).sum();
    let matched = tests.iter().filter(|t| !t.matched_symbols.is_empty()).count();
    if total_tests == 0 {
        "NO_TESTS".to_string()
    } else if matched == 0 {
        "INDIRECT_COVERAGE".to_string()
    } else if total_tests < symbols.len() {
        "PARTIAL_COVERAGE".to_string()
    } else {
        "GOOD_COVERAGE".to_string()
    }
}
