use crate::error::QueryError;
use crate::graph::CodeGraph;
use crate::model::{
    BlastRadius, ChangedSymbol, DiffImpact, EdgeKind, Symbol, SymbolImpact, SymbolKind,
};
use crate::symbols::SymbolTable;
use std::collections::{BTreeSet, HashSet};

/// Read-only view over one build's table and graph. All operations are
/// side-effect-free and safe to run concurrently against the same snapshot.
pub struct QueryEngine<'a> {
    pub table: &'a SymbolTable,
    pub graph: &'a CodeGraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Dependents,
    Dependencies,
}

impl<'a> QueryEngine<'a> {
    pub fn new(table: &'a SymbolTable, graph: &'a CodeGraph) -> Self {
        QueryEngine { table, graph }
    }

    /// Exact qualified-name match, then case-insensitive substring match in
    /// registration order.
    pub fn resolve_symbol(&self, name: &str) -> Result<&'a Symbol, QueryError> {
        if let Some(symbol) = self.table.get(name) {
            return Ok(symbol);
        }
        let needle = name.to_lowercase();
        if let Some(symbol) = self
            .table
            .iter()
            .find(|s| s.qualname.to_lowercase().contains(&needle))
        {
            return Ok(symbol);
        }
        let suggestions: Vec<String> = self
            .table
            .iter()
            .take(5)
            .map(|s| s.qualname.clone())
            .collect();
        Err(QueryError::SymbolNotFound {
            name: name.to_string(),
            suggestions,
        })
    }

    pub fn blast_radius(
        &self,
        name: &str,
        depth: usize,
        kinds: Option<&HashSet<EdgeKind>>,
    ) -> Result<BlastRadius, QueryError> {
        let symbol = self.resolve_symbol(name)?;
        let depth = depth.max(1);
        let target = &symbol.qualname;

        let dependents = self.walk(target, depth, kinds, Direction::Dependents);
        let instantiated_methods = self.instantiated_methods(target, kinds);
        let dependencies: Vec<String> = self
            .walk(target, depth, kinds, Direction::Dependencies)
            .into_iter()
            .filter(|qual| !instantiated_methods.contains(qual))
            .collect();

        let mut affected: BTreeSet<String> = BTreeSet::new();
        affected.insert(symbol.file_path.clone());
        for qual in dependents
            .iter()
            .chain(dependencies.iter())
            .chain(instantiated_methods.iter())
        {
            if let Some(s) = self.table.get(qual) {
                affected.insert(s.file_path.clone());
            }
        }

        let instantiated_methods: Vec<String> = instantiated_methods.into_iter().collect();
        let blast_radius_size =
            dependents.len() + dependencies.len() + instantiated_methods.len();
        Ok(BlastRadius {
            symbol: symbol.into(),
            dependents,
            dependencies,
            instantiated_methods,
            affected_files: affected.into_iter().collect(),
            blast_radius_size,
            depth,
        })
    }

    /// Bounded BFS over predecessor or successor edges; the start node is
    /// never part of the result.
    fn walk(
        &self,
        start: &str,
        depth: usize,
        kinds: Option<&HashSet<EdgeKind>>,
        direction: Direction,
    ) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(start.to_string());
        let mut frontier = vec![start.to_string()];
        let mut out = Vec::new();
        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                let neighbors: Vec<String> = match direction {
                    Direction::Dependents => self
                        .graph
                        .predecessors(node, kinds)
                        .map(|e| e.source.clone())
                        .collect(),
                    Direction::Dependencies => self
                        .graph
                        .successors(node, kinds)
                        .map(|e| e.target.clone())
                        .collect(),
                };
                for neighbor in neighbors {
                    if seen.insert(neighbor.clone()) {
                        out.push(neighbor.clone());
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        out.sort();
        out
    }

    /// Methods reached through instantiation: direct `instantiates_uses`
    /// targets, plus every method of a class the symbol instantiates.
    fn instantiated_methods(
        &self,
        target: &str,
        kinds: Option<&HashSet<EdgeKind>>,
    ) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let permits = |kind: EdgeKind| kinds.is_none_or(|set| set.contains(&kind));
        for edge in self.graph.edges_from(target) {
            match edge.kind {
                EdgeKind::InstantiatesUses if permits(EdgeKind::InstantiatesUses) => {
                    out.insert(edge.target.clone());
                }
                EdgeKind::Instantiates if permits(EdgeKind::Instantiates) => {
                    for method_edge in self.graph.edges_from(&edge.target) {
                        if method_edge.kind == EdgeKind::Contains {
                            out.insert(method_edge.target.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    pub fn affected_files(
        &self,
        name: &str,
        depth: usize,
        kinds: Option<&HashSet<EdgeKind>>,
    ) -> Result<Vec<String>, QueryError> {
        Ok(self.blast_radius(name, depth, kinds)?.affected_files)
    }

    pub fn symbol_lookup(&self, pattern: &str) -> Vec<&'a Symbol> {
        self.table.lookup_by_name(pattern)
    }

    /// Map changed line ranges to the symbols they overlap and union the
    /// blast radii. A range overlapping no symbol degrades to file-level
    /// impact: every symbol in that file, conservatively. A file with no
    /// ranges at all is treated the same way.
    pub fn diff_impact(&self, changes: &[(String, Vec<(i64, i64)>)], depth: usize) -> DiffImpact {
        let (changed, warnings, _) = self.changed_from_ranges(changes);
        self.impact_for(changed, warnings, depth)
    }

    /// diff_impact plus declarations named directly in the diff text, which
    /// may live outside any hunk's line range.
    pub fn diff_impact_with_names(
        &self,
        changes: &[(String, Vec<(i64, i64)>)],
        names: &[String],
        depth: usize,
    ) -> DiffImpact {
        let (mut changed, warnings, mut seen) = self.changed_from_ranges(changes);
        for name in names {
            for qual in self.table.by_bare_name(name) {
                let Some(symbol) = self.table.get(qual) else {
                    continue;
                };
                if symbol.kind != SymbolKind::Module && seen.insert(qual.clone()) {
                    changed.push((qual.clone(), "named_in_diff".to_string()));
                }
            }
        }
        self.impact_for(changed, warnings, depth)
    }

    fn changed_from_ranges(
        &self,
        changes: &[(String, Vec<(i64, i64)>)],
    ) -> (Vec<(String, String)>, Vec<String>, HashSet<String>) {
        let mut warnings = Vec::new();
        let mut changed: Vec<(String, String)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (file, ranges) in changes {
            let in_file: Vec<&Symbol> = self
                .table
                .symbols_in_file(file)
                .iter()
                .filter_map(|qual| self.table.get(qual))
                .filter(|s| s.kind != SymbolKind::Module)
                .collect();
            if in_file.is_empty() {
                warnings.push(format!("path not found in graph: {file}"));
                continue;
            }
            if ranges.is_empty() {
                for symbol in &in_file {
                    if seen.insert(symbol.qualname.clone()) {
                        changed.push((symbol.qualname.clone(), "file_level".to_string()));
                    }
                }
                continue;
            }
            for (start, end) in ranges {
                let overlapping: Vec<&&Symbol> = in_file
                    .iter()
                    .filter(|s| s.start_line <= *end && s.end_line >= *start)
                    .collect();
                if overlapping.is_empty() {
                    for symbol in &in_file {
                        if seen.insert(symbol.qualname.clone()) {
                            changed.push((symbol.qualname.clone(), "file_level".to_string()));
                        }
                    }
                    continue;
                }
                // Keep the innermost overlapping symbols: a class whose only
                // overlap is through one of its methods stays out, and shows
                // up in the method's blast radius instead.
                for symbol in &overlapping {
                    let contains_other = overlapping.iter().any(|other| {
                        other.qualname != symbol.qualname
                            && symbol.start_line <= other.start_line
                            && symbol.end_line >= other.end_line
                    });
                    if !contains_other && seen.insert(symbol.qualname.clone()) {
                        changed.push((symbol.qualname.clone(), "range".to_string()));
                    }
                }
            }
        }

        (changed, warnings, seen)
    }

    /// Shared tail for diff_impact and analyze_diff: blast every changed
    /// symbol and union the results.
    pub fn impact_for(
        &self,
        changed: Vec<(String, String)>,
        mut warnings: Vec<String>,
        depth: usize,
    ) -> DiffImpact {
        let mut changed_symbols = Vec::new();
        let mut impacts = Vec::new();
        let mut affected: BTreeSet<String> = BTreeSet::new();
        let mut dependents: HashSet<String> = HashSet::new();

        for (qualname, reason) in changed {
            let Some(symbol) = self.table.get(&qualname) else {
                warnings.push(format!("symbol vanished from graph: {qualname}"));
                continue;
            };
            changed_symbols.push(ChangedSymbol {
                symbol: symbol.into(),
                reason,
            });
            match self.blast_radius(&qualname, depth, None) {
                Ok(blast) => {
                    affected.extend(blast.affected_files.iter().cloned());
                    dependents.extend(blast.dependents.iter().cloned());
                    impacts.push(SymbolImpact {
                        symbol: qualname,
                        blast_radius_size: blast.blast_radius_size,
                    });
                }
                Err(err) => warnings.push(err.to_string()),
            }
        }

        DiffImpact {
            changed_symbols,
            impacts,
            affected_files: affected.into_iter().collect(),
            total_dependents: dependents.len(),
            warnings,
        }
    }
}
