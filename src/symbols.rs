use crate::model::{Fidelity, Symbol, SymbolKind};
use crate::parser::Declaration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry of every symbol in one build. Qualified names are unique within
/// the table; registration is deterministic because files are processed in
/// sorted path order and declarations in source order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    /// Registration order, for deterministic iteration.
    order: Vec<String>,
    /// File path -> qualified names declared there, in source order.
    by_file: HashMap<String, Vec<String>>,
    /// Bare name -> qualified names sharing it.
    by_bare: HashMap<String, Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file's module symbol. The relative path doubles as the
    /// qualified name, which is unique by construction.
    pub fn register_module(&mut self, file_path: &str, source: &str, fidelity: Fidelity) -> String {
        let name = std::path::Path::new(file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_path)
            .to_string();
        let end_line = source.lines().count().max(1) as i64;
        let symbol = Symbol {
            qualname: file_path.to_string(),
            name,
            kind: SymbolKind::Module,
            file_path: file_path.to_string(),
            start_line: 1,
            end_line,
            source_text: source.to_string(),
            fidelity,
        };
        self.insert(symbol);
        file_path.to_string()
    }

    /// Register a declaration, assigning its globally unique qualified name.
    ///
    /// The local name is `Class.method` for methods and the bare name
    /// otherwise. When that name is already taken by a symbol from a
    /// *different* file, the new symbol is qualified by its defining file
    /// (`path/to/file.py::Name`) so that colliding names coexist instead of
    /// silently overwriting. A same-file re-registration replaces the
    /// earlier span.
    ///
    /// `parent_qualname` is the already-registered qualified name of the
    /// enclosing class, so methods of a file-qualified class stay under
    /// their class's final name.
    pub fn register(
        &mut self,
        file_path: &str,
        decl: &Declaration,
        parent_qualname: Option<&str>,
        fidelity: Fidelity,
    ) -> String {
        let candidate = match parent_qualname {
            Some(parent) => format!("{parent}.{}", decl.name),
            None => decl.name.clone(),
        };
        let qualname = match self.symbols.get(&candidate) {
            Some(existing) if existing.file_path != file_path => {
                format!("{file_path}::{candidate}")
            }
            _ => candidate,
        };
        let symbol = Symbol {
            qualname: qualname.clone(),
            name: decl.name.clone(),
            kind: match decl.kind {
                crate::parser::DeclKind::Class => SymbolKind::Class,
                crate::parser::DeclKind::Function => SymbolKind::Function,
                crate::parser::DeclKind::Method => SymbolKind::Method,
            },
            file_path: file_path.to_string(),
            start_line: decl.start_line,
            end_line: decl.end_line,
            source_text: decl.text.clone(),
            fidelity,
        };
        self.insert(symbol);
        qualname
    }

    fn insert(&mut self, symbol: Symbol) {
        let qualname = symbol.qualname.clone();
        if self.symbols.insert(qualname.clone(), symbol.clone()).is_none() {
            self.order.push(qualname.clone());
            self.by_bare
                .entry(symbol.name.clone())
                .or_default()
                .push(qualname.clone());
            self.by_file
                .entry(symbol.file_path.clone())
                .or_default()
                .push(qualname);
        }
    }

    pub fn get(&self, qualname: &str) -> Option<&Symbol> {
        self.symbols.get(qualname)
    }

    pub fn contains(&self, qualname: &str) -> bool {
        self.symbols.contains_key(qualname)
    }

    /// Qualified names sharing a bare name, in registration order.
    pub fn by_bare_name(&self, name: &str) -> &[String] {
        self.by_bare.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-insensitive substring match over qualified and bare names.
    pub fn lookup_by_name(&self, pattern: &str) -> Vec<&Symbol> {
        let needle = pattern.to_lowercase();
        self.order
            .iter()
            .filter(|qualname| {
                let symbol = &self.symbols[*qualname];
                qualname.to_lowercase().contains(&needle)
                    || symbol.name.to_lowercase().contains(&needle)
            })
            .map(|qualname| &self.symbols[qualname])
            .collect()
    }

    /// Ordered qualified names declared in a file.
    pub fn symbols_in_file(&self, path: &str) -> &[String] {
        self.by_file.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Restore source order for a file's symbol list. Registration runs
    /// classes first so methods can follow their class's final name, which
    /// scrambles declaration order.
    pub fn finish_file(&mut self, path: &str) {
        if let Some(quals) = self.by_file.get_mut(path) {
            quals.sort_by_key(|qual| {
                self.symbols
                    .get(qual)
                    .map(|s| (s.start_line, s.end_line))
                    .unwrap_or((i64::MAX, i64::MAX))
            });
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &String> {
        self.by_file.keys()
    }

    /// All symbols in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().map(|qualname| &self.symbols[qualname])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{DeclKind, Declaration};

    fn decl(kind: DeclKind, name: &str, parent: Option<&str>) -> Declaration {
        Declaration {
            kind,
            name: name.to_string(),
            parent: parent.map(|p| p.to_string()),
            start_line: 1,
            end_line: 2,
            text: String::new(),
        }
    }

    #[test]
    fn collision_qualifies_by_file() {
        let mut table = SymbolTable::new();
        let first = table.register(
            "app/config.py",
            &decl(DeclKind::Class, "Config", None),
            None,
            Fidelity::TreeWalk,
        );
        let second = table.register(
            "lib/config.py",
            &decl(DeclKind::Class, "Config", None),
            None,
            Fidelity::TreeWalk,
        );
        assert_eq!(first, "Config");
        assert_eq!(second, "lib/config.py::Config");
        assert_eq!(table.lookup_by_name("Config").len(), 2);
    }

    #[test]
    fn method_follows_qualified_class() {
        let mut table = SymbolTable::new();
        table.register(
            "a.py",
            &decl(DeclKind::Class, "Config", None),
            None,
            Fidelity::TreeWalk,
        );
        let class_b = table.register(
            "b.py",
            &decl(DeclKind::Class, "Config", None),
            None,
            Fidelity::TreeWalk,
        );
        let method = table.register(
            "b.py",
            &decl(DeclKind::Method, "load", Some("Config")),
            Some(&class_b),
            Fidelity::TreeWalk,
        );
        assert_eq!(method, "b.py::Config.load");
    }
}
