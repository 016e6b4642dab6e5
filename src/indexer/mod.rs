use crate::error::QueryError;
use crate::graph::builder::{self, FileUnit};
use crate::model::{BuildStats, Fidelity};
use crate::parser::{self, DeclKind, ParsedFile};
use crate::snapshot::{self, Snapshot};
use crate::symbols::SymbolTable;
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub mod scan;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub no_ignore: bool,
    /// Whole-build deadline, checked between file units.
    pub timeout: Option<Duration>,
    pub use_cache: bool,
}

/// Runs one full build: scan, parallel per-file parse, sequential symbol
/// registration, then the barrier-synchronized edge-emission phase.
pub struct Indexer {
    root: PathBuf,
    options: BuildOptions,
}

impl Indexer {
    pub fn new(root: PathBuf) -> Self {
        Self::with_options(root, BuildOptions::default())
    }

    pub fn with_options(root: PathBuf, options: BuildOptions) -> Self {
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self { root, options }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn build(&self) -> Result<Snapshot> {
        let started = Instant::now();
        if !self.root.is_dir() {
            return Err(anyhow!("project root is not a directory: {}", self.root.display()));
        }
        let scanned = scan::scan_repo(&self.root, scan::ScanOptions::new(self.options.no_ignore))
            .with_context(|| format!("scan {}", self.root.display()))?;
        let content_hash = scan::content_hash(&scanned);

        if self.options.use_cache {
            if let Some(mut cached) = snapshot::load_cached(&self.root, &content_hash) {
                cached.stats.from_cache = true;
                cached.stats.duration_ms = started.elapsed().as_millis() as u64;
                return Ok(cached);
            }
        }

        let deadline = self.options.timeout.map(|t| started + t);
        let expired = AtomicBool::new(false);

        // Per-file parsing is independent; fan out and construct one parser
        // per file because tree-sitter parsers are not shareable.
        let parsed: Vec<(scan::ScannedFile, Result<(String, ParsedFile)>)> = scanned
            .par_iter()
            .map(|file| {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    expired.store(true, Ordering::Relaxed);
                    return (file.clone(), Err(anyhow!("build deadline expired")));
                }
                (file.clone(), parse_one(file))
            })
            .collect();

        if expired.load(Ordering::Relaxed) {
            return Err(QueryError::BuildTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
            .into());
        }

        let mut stats = BuildStats {
            files_scanned: scanned.len(),
            ..Default::default()
        };
        let mut table = SymbolTable::new();
        let mut units: Vec<FileUnit> = Vec::new();

        for (file, outcome) in parsed {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(QueryError::BuildTimeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
                .into());
            }
            let (source, parsed_file) = match outcome {
                Ok(value) => value,
                Err(err) => {
                    eprintln!("gidx: parse error {}: {err}", file.rel_path);
                    stats.files_failed += 1;
                    stats.failed_paths.push(file.rel_path.clone());
                    continue;
                }
            };
            stats.files_parsed += 1;
            if parsed_file.fidelity == Fidelity::Pattern {
                stats.fallback_files += 1;
            }
            let unit = register_file(&mut table, &file.rel_path, &source, parsed_file);
            units.push(unit);
        }

        let graph = builder::build_graph(&table, &units);

        stats.symbols = table.len();
        stats.edges = graph.edge_count();
        stats.duration_ms = started.elapsed().as_millis() as u64;

        Ok(Snapshot {
            table,
            graph,
            stats,
            content_hash,
        })
    }
}

fn parse_one(file: &scan::ScannedFile) -> Result<(String, ParsedFile)> {
    let source = crate::util::read_to_string(&file.abs_path)?;
    let mut parser = parser::for_language(&file.language)
        .ok_or_else(|| anyhow!("no parser for language {}", file.language))?;
    let parsed = parser.parse(&source)?;
    Ok((source, parsed))
}

/// Register a file's declarations, classes before functions so methods can
/// follow their class's final qualified name even when declaration order
/// puts the class later in the file.
fn register_file(
    table: &mut SymbolTable,
    rel_path: &str,
    source: &str,
    parsed: ParsedFile,
) -> FileUnit {
    let fidelity = parsed.fidelity;
    let module_qualname = table.register_module(rel_path, source, fidelity);
    let mut locals: HashMap<String, String> = HashMap::new();

    for decl in parsed.decls.iter().filter(|d| d.kind == DeclKind::Class) {
        let qualname = table.register(rel_path, decl, None, fidelity);
        locals.insert(decl.local_qualname(), qualname);
    }
    for decl in parsed.decls.iter().filter(|d| d.kind != DeclKind::Class) {
        let parent_qualname = decl
            .parent
            .as_ref()
            .and_then(|class| locals.get(class).cloned());
        let qualname = table.register(rel_path, decl, parent_qualname.as_deref(), fidelity);
        locals.insert(decl.local_qualname(), qualname);
    }
    table.finish_file(rel_path);

    FileUnit {
        rel_path: rel_path.to_string(),
        module_qualname,
        locals,
        parsed,
    }
}
