use crate::error::QueryError;
use crate::graph::query::QueryEngine;
use crate::indexer::{BuildOptions, Indexer};
use crate::model::{
    BlastRadius, BuildStats, CodeExcerpt, DiffImpact, EdgeKind, FileSymbolEntry, FileSymbols,
    FindSymbolsResult, FullContext, SymbolCode, SymbolKind, SymbolMatch,
};
use crate::rules::{MatchedRule, RuleMatcher};
use crate::snapshot::{self, Snapshot, SnapshotStore};
use crate::testloc::{RelatedTests, TestLocator};
use crate::util;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

const MAX_LISTED_MATCHES: usize = 30;
const MAX_LISTED_NEIGHBORS: usize = 20;
const MAX_CONTEXT_NEIGHBORS: usize = 5;
const TARGET_CODE_BYTES: usize = 2000;
const NEIGHBOR_CODE_BYTES: usize = 1000;

#[derive(Debug, Serialize)]
pub struct MatchedRules {
    pub matched_rules: Vec<MatchedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The logical operations wrapped 1:1 by the protocol layer. Holds the
/// atomically swapped current snapshot plus the two collaborators.
pub struct Service {
    root: PathBuf,
    options: BuildOptions,
    store: SnapshotStore,
    rules: Option<RuleMatcher>,
    tests: TestLocator,
}

impl Service {
    pub fn new(root: PathBuf) -> Self {
        Self::with_options(root, BuildOptions::default())
    }

    pub fn with_options(root: PathBuf, options: BuildOptions) -> Self {
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        let tests = TestLocator::new(root.clone());
        Service {
            root,
            options,
            store: SnapshotStore::new(),
            rules: None,
            tests,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Deadline applied to subsequent builds; a timed-out rebuild keeps the
    /// last good snapshot.
    pub fn set_build_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.options.timeout = timeout;
    }

    pub fn load_rules(&mut self, path: &PathBuf) -> Result<()> {
        self.rules = Some(RuleMatcher::load(path)?);
        Ok(())
    }

    /// Run a full build and publish the snapshot. On failure the previous
    /// snapshot stays visible, so a timed-out rebuild never leaves the
    /// service unready.
    pub fn init_project(
        &mut self,
        path: Option<PathBuf>,
        rules_path: Option<PathBuf>,
    ) -> Result<BuildStats> {
        if let Some(path) = path {
            let root = std::fs::canonicalize(&path).unwrap_or(path);
            self.tests = TestLocator::new(root.clone());
            self.root = root;
        }
        if let Some(rules_path) = rules_path {
            self.load_rules(&rules_path)?;
        }

        let indexer = Indexer::with_options(self.root.clone(), self.options);
        let built = indexer.build()?;
        let stats = built.stats.clone();
        if self.options.use_cache && !stats.from_cache {
            if let Err(err) = snapshot::store_cached(&self.root, &built) {
                eprintln!("gidx: snapshot cache write failed: {err}");
            }
        }
        self.store.publish(built);
        Ok(stats)
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.store.current()
    }

    fn ready(&self) -> Result<Arc<Snapshot>, QueryError> {
        self.store.current().ok_or(QueryError::NotReady)
    }

    pub fn query_blast_radius(
        &self,
        symbol: &str,
        depth: Option<usize>,
        kinds: Option<&HashSet<EdgeKind>>,
    ) -> Result<BlastRadius, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        let mut blast = engine.blast_radius(symbol, depth.unwrap_or(1), kinds)?;
        blast.dependents.truncate(MAX_LISTED_NEIGHBORS);
        blast.dependencies.truncate(MAX_LISTED_NEIGHBORS);
        Ok(blast)
    }

    pub fn find_symbols(
        &self,
        pattern: &str,
        kind: Option<SymbolKind>,
    ) -> Result<FindSymbolsResult, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        let matches: Vec<SymbolMatch> = engine
            .symbol_lookup(pattern)
            .into_iter()
            .filter(|s| kind.is_none_or(|k| s.kind == k))
            .map(|s| SymbolMatch {
                symbol: s.qualname.clone(),
                kind: s.kind,
                file: s.file_path.clone(),
                line: s.start_line,
            })
            .collect();
        let total = matches.len();
        let mut matches = matches;
        matches.truncate(MAX_LISTED_MATCHES);
        Ok(FindSymbolsResult {
            query: pattern.to_string(),
            matches,
            total,
        })
    }

    pub fn get_symbol_code(&self, symbol: &str) -> Result<SymbolCode, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        let resolved = engine.resolve_symbol(symbol)?;
        Ok(SymbolCode {
            symbol: resolved.qualname.clone(),
            kind: resolved.kind,
            file: resolved.file_path.clone(),
            start_line: resolved.start_line,
            end_line: resolved.end_line,
            code: resolved.source_text.clone(),
        })
    }

    pub fn get_file_symbols(&self, file_path: &str) -> Result<FileSymbols, QueryError> {
        let snapshot = self.ready()?;
        let mut path = file_path.to_string();
        let mut quals = snapshot.table.symbols_in_file(&path);
        if quals.is_empty() {
            // Accept a suffix of the indexed path, the way callers pass
            // bare file names.
            let mut files: Vec<&String> = snapshot
                .table
                .files()
                .filter(|file| file.contains(file_path))
                .collect();
            files.sort();
            match files.first() {
                Some(found) => {
                    path = (*found).clone();
                    quals = snapshot.table.symbols_in_file(&path);
                }
                None => {
                    return Err(QueryError::UnknownFile {
                        path: file_path.to_string(),
                    });
                }
            }
        }
        let symbols = quals
            .iter()
            .filter_map(|qual| snapshot.table.get(qual))
            .filter(|s| s.kind != SymbolKind::Module)
            .map(|s| FileSymbolEntry {
                name: s.qualname.clone(),
                kind: s.kind,
                line: s.start_line,
            })
            .collect();
        Ok(FileSymbols { file: path, symbols })
    }

    pub fn get_related_tests(
        &self,
        symbols: &[String],
        files: &[String],
    ) -> Result<RelatedTests, QueryError> {
        self.ready()?;
        Ok(self.tests.find_tests(files, symbols))
    }

    /// Pure function of its inputs; usable before the first build, matching
    /// the collaborator boundary.
    pub fn match_coding_rules(&self, symbols: &[String], files: &[String]) -> MatchedRules {
        let Some(rules) = &self.rules else {
            return MatchedRules {
                matched_rules: Vec::new(),
                engine: None,
                message: Some("no rules file loaded".to_string()),
            };
        };
        let mut context: Vec<String> = Vec::new();
        context.extend(symbols.iter().cloned());
        context.extend(files.iter().cloned());
        MatchedRules {
            matched_rules: rules.match_rules(&context, 10),
            engine: Some(rules.engine().to_string()),
            message: None,
        }
    }

    pub fn get_full_context(
        &self,
        symbol: &str,
        include_code: bool,
    ) -> Result<FullContext, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        let mut blast = engine.blast_radius(symbol, 1, None)?;
        blast.dependents.truncate(MAX_LISTED_NEIGHBORS);
        blast.dependencies.truncate(MAX_LISTED_NEIGHBORS);

        let mut target_code = None;
        let mut dependents_code = Vec::new();
        let mut dependencies_code = Vec::new();
        if include_code {
            if let Some(target) = snapshot.table.get(&blast.symbol.qualname) {
                target_code = Some(util::truncate_str_bytes(
                    &target.source_text,
                    TARGET_CODE_BYTES,
                ));
            }
            dependents_code = excerpts(&snapshot, &blast.dependents);
            dependencies_code = excerpts(&snapshot, &blast.dependencies);
        }

        let mut rule_context = vec![blast.symbol.qualname.clone()];
        rule_context.extend(blast.affected_files.iter().cloned());
        rule_context.extend(blast.dependents.iter().take(5).cloned());
        let rules = self
            .rules
            .as_ref()
            .map(|r| r.match_rules(&rule_context, 10))
            .unwrap_or_default();

        let tests = Some(self.tests.find_tests(
            &blast.affected_files,
            std::slice::from_ref(&blast.symbol.qualname),
        ));

        Ok(FullContext {
            target: blast,
            target_code,
            dependents_code,
            dependencies_code,
            rules,
            tests,
        })
    }

    /// Parse a unified diff into per-file changed ranges, harvest
    /// declarations named in the diff text, and union the blast radii.
    pub fn analyze_diff(&self, diff_text: &str, depth: Option<usize>) -> Result<DiffImpact, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        let changes: Vec<(String, Vec<(i64, i64)>)> = crate::diff::parse_diff(diff_text)
            .into_iter()
            .map(|file| {
                let ranges = file
                    .changed_ranges
                    .iter()
                    .map(|hunk| (hunk.start_line, hunk.end_line()))
                    .collect();
                (file.path, ranges)
            })
            .collect();
        let names = crate::diff::harvest_decl_names(diff_text);
        Ok(engine.diff_impact_with_names(&changes, &names, depth.unwrap_or(1)))
    }

    pub fn diff_impact(
        &self,
        changes: &[(String, Vec<(i64, i64)>)],
        depth: Option<usize>,
    ) -> Result<DiffImpact, QueryError> {
        let snapshot = self.ready()?;
        let engine = QueryEngine::new(&snapshot.table, &snapshot.graph);
        Ok(engine.diff_impact(changes, depth.unwrap_or(1)))
    }
}

fn excerpts(snapshot: &Snapshot, quals: &[String]) -> Vec<CodeExcerpt> {
    quals
        .iter()
        .take(MAX_CONTEXT_NEIGHBORS)
        .filter_map(|qual| snapshot.table.get(qual))
        .filter(|s| !s.source_text.is_empty())
        .map(|s| CodeExcerpt {
            symbol: s.qualname.clone(),
            file: s.file_path.clone(),
            code: util::truncate_str_bytes(&s.source_text, NEIGHBOR_CODE_BYTES),
        })
        .collect()
}
