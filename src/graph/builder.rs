use crate::graph::CodeGraph;
use crate::model::{Edge, EdgeKind, SymbolKind};
use crate::parser::{CallSite, ParsedFile, base_name, is_pascal_case};
use crate::symbols::SymbolTable;
use crate::util;
use std::collections::HashMap;

/// Methods conventionally invoked on a freshly constructed instance; an
/// `instantiates` edge fans out to whichever of these the class defines.
const ENTRY_POINT_METHODS: &[&str] = &[
    "__init__",
    "__call__",
    "handle",
    "run",
    "execute",
    "process",
    "get_route_handler",
];

/// Per-file parser output plus the name mapping the symbol table assigned
/// during registration.
#[derive(Debug)]
pub struct FileUnit {
    pub rel_path: String,
    pub module_qualname: String,
    /// File-local qualified name (`Router.handle`, `helper`) -> final
    /// table qualified name.
    pub locals: HashMap<String, String>,
    pub parsed: ParsedFile,
}

/// Second build phase: runs after every file has been parsed and
/// registered, because call and import resolution need the complete table.
pub fn build_graph(table: &SymbolTable, units: &[FileUnit]) -> CodeGraph {
    let mut graph = CodeGraph::new();
    for unit in units {
        emit_contains(&mut graph, unit);
        emit_imports(&mut graph, table, unit);
        for call in &unit.parsed.calls {
            resolve_call(&mut graph, table, unit, call);
        }
    }
    emit_references(&mut graph, table);
    graph
}

/// Classes contain their methods. Top-level symbols hang off the file
/// index, not off containment edges, so a symbol's dependents are exactly
/// the code that uses it.
fn emit_contains(graph: &mut CodeGraph, unit: &FileUnit) {
    for decl in &unit.parsed.decls {
        let Some(class) = &decl.parent else {
            continue;
        };
        let local = decl.local_qualname();
        let (Some(qualname), Some(class_qual)) =
            (unit.locals.get(&local), unit.locals.get(class))
        else {
            continue;
        };
        graph.add_edge(Edge::new(
            class_qual.clone(),
            qualname.clone(),
            EdgeKind::Contains,
        ));
    }
}

fn emit_imports(graph: &mut CodeGraph, table: &SymbolTable, unit: &FileUnit) {
    for import in &unit.parsed.imports {
        let module_file = import
            .module
            .as_deref()
            .and_then(|module| resolve_module_file(table, module));

        if let Some(target_file) = &module_file {
            if *target_file != unit.module_qualname {
                graph.add_edge(
                    Edge::new(
                        unit.module_qualname.clone(),
                        target_file.clone(),
                        EdgeKind::Imports,
                    )
                    .with_evidence(None, Some(import.line)),
                );
            }
        }

        for name in &import.names {
            let candidates = table.by_bare_name(name);
            let chosen = match candidates.len() {
                0 => None,
                1 => Some(&candidates[0]),
                // Ambiguous bare name: keep it only when the resolved module
                // file pins down which one was meant.
                _ => module_file.as_deref().and_then(|file| {
                    candidates
                        .iter()
                        .find(|qual| table.get(qual).is_some_and(|s| s.file_path == file))
                }),
            };
            if let Some(target) = chosen {
                if *target != unit.module_qualname {
                    graph.add_edge(
                        Edge::new(unit.module_qualname.clone(), target.clone(), EdgeKind::Imports)
                            .with_evidence(None, Some(import.line)),
                    );
                }
            }
        }
    }
}

/// Map a dotted module path to a registered file, or None for external
/// imports (which stay out of the graph).
fn resolve_module_file(table: &SymbolTable, module: &str) -> Option<String> {
    let module = module.strip_prefix("crate.").unwrap_or(module);
    let stem = module.replace('.', "/");
    let candidates = [
        format!("{stem}.py"),
        format!("{stem}/__init__.py"),
        format!("{stem}.rs"),
        format!("src/{stem}.rs"),
    ];
    for candidate in &candidates {
        if !table.symbols_in_file(candidate).is_empty() {
            return Some(candidate.clone());
        }
    }
    // Tolerate a package prefix the import spells out but the scan root
    // does not include.
    let mut files: Vec<&String> = table
        .files()
        .filter(|file| {
            candidates
                .iter()
                .any(|candidate| file.ends_with(&format!("/{candidate}")))
        })
        .collect();
    files.sort();
    files.first().map(|f| f.to_string())
}

fn resolve_call(graph: &mut CodeGraph, table: &SymbolTable, unit: &FileUnit, call: &CallSite) {
    let Some(source) = unit.locals.get(&call.scope) else {
        return;
    };
    let evidence = call_evidence(table, unit, call);

    // Call through a tracked instance: x = Cls(...); x.meth() binds to
    // Cls.meth as instance-method use, not as a plain call.
    if let Some(class_name) = &call.receiver_class {
        let method = base_name(&call.callee);
        if let Some(class_qual) = single_class(table, class_name) {
            let target = format!("{class_qual}.{method}");
            if table.contains(&target) && target != *source {
                graph.add_edge(
                    Edge::new(source.clone(), target, EdgeKind::InstantiatesUses)
                        .with_evidence(evidence.clone(), Some(call.line)),
                );
                return;
            }
        }
    }

    let confirmed = resolve_confirmed_target(table, unit, source, call);
    match confirmed {
        Some(target) => {
            if target != *source {
                graph.add_edge(
                    Edge::new(source.clone(), target, EdgeKind::Calls)
                        .with_evidence(evidence.clone(), Some(call.line)),
                );
            }
        }
        None => {
            // Bare-name fan-out: every candidate gets an unconfirmed edge.
            let base = base_name(&call.callee);
            let candidates: Vec<String> = table
                .by_bare_name(base)
                .iter()
                .filter(|qual| *qual != source)
                .filter(|qual| {
                    table
                        .get(qual)
                        .is_some_and(|s| s.kind != SymbolKind::Module)
                })
                .cloned()
                .collect();
            for target in candidates {
                graph.add_edge(
                    Edge::new(source.clone(), target, EdgeKind::MayCall)
                        .with_evidence(evidence.clone(), Some(call.line)),
                );
            }
        }
    }

    emit_instantiation(graph, table, source, call, &evidence);
}

/// A call target is confirmed when structure leaves exactly one candidate.
fn resolve_confirmed_target(
    table: &SymbolTable,
    unit: &FileUnit,
    source: &str,
    call: &CallSite,
) -> Option<String> {
    let callee = call.callee.trim();

    // `self.meth()` / `cls.meth()` resolve against the enclosing class.
    if let Some(rest) = callee
        .strip_prefix("self.")
        .or_else(|| callee.strip_prefix("cls."))
    {
        if let Some((class_local, _)) = call.scope.rsplit_once('.') {
            if let Some(class_qual) = unit.locals.get(class_local) {
                let target = format!("{class_qual}.{}", base_name(rest));
                if table.contains(&target) {
                    return Some(target);
                }
            }
        }
        return None;
    }

    // Same-file declaration wins outright: the name is provably in scope.
    if let Some(local) = unit.locals.get(callee) {
        return Some(local.clone());
    }

    if let Some((head, method)) = callee.rsplit_once('.') {
        // A dotted callee that is itself a registered qualified name
        // carries class-plus-method evidence.
        if table.contains(callee) {
            return Some(callee.to_string());
        }
        // `a.b` where `a` names exactly one class with a method `b`.
        if let Some(class_qual) = single_class(table, base_name(head)) {
            let target = format!("{class_qual}.{method}");
            if table.contains(&target) {
                return Some(target);
            }
        }
        return None;
    }

    // A bare name is only confirmed when exactly one symbol carries it; a
    // literal qualname match proves nothing if other files share the name.
    let candidates: Vec<&String> = table
        .by_bare_name(callee)
        .iter()
        .filter(|qual| *qual != source)
        .filter(|qual| {
            table
                .get(qual)
                .is_some_and(|s| s.kind != SymbolKind::Module)
        })
        .collect();
    if candidates.len() == 1 {
        return Some(candidates[0].clone());
    }
    None
}

/// PascalCase callee matching registered classes records construction, and
/// fans out to the class's conventional entry points.
fn emit_instantiation(
    graph: &mut CodeGraph,
    table: &SymbolTable,
    source: &str,
    call: &CallSite,
    evidence: &Option<String>,
) {
    let base = base_name(&call.callee);
    if !is_pascal_case(base) {
        return;
    }
    let classes: Vec<String> = table
        .by_bare_name(base)
        .iter()
        .filter(|qual| {
            table
                .get(qual)
                .is_some_and(|s| s.kind == SymbolKind::Class)
        })
        .filter(|qual| *qual != source)
        .cloned()
        .collect();
    for class_qual in classes {
        graph.add_edge(
            Edge::new(source.to_string(), class_qual.clone(), EdgeKind::Instantiates)
                .with_evidence(evidence.clone(), Some(call.line)),
        );
        for method in ENTRY_POINT_METHODS {
            let target = format!("{class_qual}.{method}");
            if table.contains(&target) {
                graph.add_edge(
                    Edge::new(source.to_string(), target, EdgeKind::InstantiatesUses)
                        .with_evidence(evidence.clone(), Some(call.line)),
                );
            }
        }
    }
}

fn single_class(table: &SymbolTable, name: &str) -> Option<String> {
    let mut classes = table.by_bare_name(name).iter().filter(|qual| {
        table
            .get(qual)
            .is_some_and(|s| s.kind == SymbolKind::Class)
    });
    let first = classes.next()?;
    if classes.next().is_some() {
        return None;
    }
    Some(first.clone())
}

fn call_evidence(table: &SymbolTable, unit: &FileUnit, call: &CallSite) -> Option<String> {
    let module = table.get(&unit.module_qualname)?;
    let line = util::slice_lines(&module.source_text, call.line, call.line);
    util::evidence_snippet(&line)
}

/// Final pass: a symbol's bare name occurring literally in another file's
/// text, with no call or import edge already connecting them, yields a
/// low-confidence `references` edge from that file's module symbol.
fn emit_references(graph: &mut CodeGraph, table: &SymbolTable) {
    let modules: Vec<(String, String)> = table
        .iter()
        .filter(|s| s.kind == SymbolKind::Module)
        .map(|s| (s.qualname.clone(), s.file_path.clone()))
        .collect();

    let targets: Vec<(String, String, String)> = table
        .iter()
        .filter(|s| s.kind != SymbolKind::Module)
        .map(|s| (s.qualname.clone(), s.name.clone(), s.file_path.clone()))
        .collect();

    for (module_qual, module_file) in &modules {
        let Some(module) = table.get(module_qual) else {
            continue;
        };
        for (target_qual, target_name, target_file) in &targets {
            if target_file == module_file {
                continue;
            }
            if !module.source_text.contains(target_name.as_str()) {
                continue;
            }
            if already_linked(graph, table, module_qual, module_file, target_qual) {
                continue;
            }
            graph.add_edge(Edge::new(
                module_qual.clone(),
                target_qual.clone(),
                EdgeKind::References,
            ));
        }
    }
}

/// True when the module, or any symbol declared in its file, already holds
/// a non-reference edge to the target.
fn already_linked(
    graph: &CodeGraph,
    table: &SymbolTable,
    module_qual: &str,
    module_file: &str,
    target: &str,
) -> bool {
    if graph.connects(module_qual, target) {
        return true;
    }
    table
        .symbols_in_file(module_file)
        .iter()
        .any(|qual| graph.connects(qual, target))
}
