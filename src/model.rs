use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "module" => Ok(SymbolKind::Module),
            "class" => Ok(SymbolKind::Class),
            "function" => Ok(SymbolKind::Function),
            "method" => Ok(SymbolKind::Method),
            other => Err(format!("unknown symbol kind: {other}")),
        }
    }
}

/// How a file's declarations were obtained. Pattern-scanned files cannot
/// attribute call sites to nested scopes, so their inferred edges carry
/// less weight.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    TreeWalk,
    Pattern,
}

impl Default for Fidelity {
    fn default() -> Self {
        Fidelity::TreeWalk
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Symbol {
    pub qualname: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub source_text: String,
    pub fidelity: Fidelity,
}

#[derive(Debug, Serialize, Clone)]
pub struct SymbolCompact {
    pub qualname: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
}

impl From<&Symbol> for SymbolCompact {
    fn from(s: &Symbol) -> Self {
        SymbolCompact {
            qualname: s.qualname.clone(),
            name: s.name.clone(),
            kind: s.kind,
            file_path: s.file_path.clone(),
            start_line: s.start_line,
            end_line: s.end_line,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
    MayCall,
    Instantiates,
    InstantiatesUses,
    References,
}

impl EdgeKind {
    /// Confirmed edges were proven from structure; the rest record a name
    /// match without a resolved binding.
    pub fn confirmed(&self) -> bool {
        matches!(
            self,
            EdgeKind::Contains | EdgeKind::Imports | EdgeKind::Calls | EdgeKind::Instantiates
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Imports => "imports",
            EdgeKind::Calls => "calls",
            EdgeKind::MayCall => "may_call",
            EdgeKind::Instantiates => "instantiates",
            EdgeKind::InstantiatesUses => "instantiates_uses",
            EdgeKind::References => "references",
        }
    }

    pub fn all() -> &'static [EdgeKind] {
        &[
            EdgeKind::Contains,
            EdgeKind::Imports,
            EdgeKind::Calls,
            EdgeKind::MayCall,
            EdgeKind::Instantiates,
            EdgeKind::InstantiatesUses,
            EdgeKind::References,
        ]
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "contains" => Ok(EdgeKind::Contains),
            "imports" => Ok(EdgeKind::Imports),
            "calls" => Ok(EdgeKind::Calls),
            "may_call" => Ok(EdgeKind::MayCall),
            "instantiates" => Ok(EdgeKind::Instantiates),
            "instantiates_uses" => Ok(EdgeKind::InstantiatesUses),
            "references" => Ok(EdgeKind::References),
            other => Err(format!("unknown edge kind: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evidence_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evidence_line: Option<i64>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Edge {
            source: source.into(),
            target: target.into(),
            kind,
            confirmed: kind.confirmed(),
            evidence_snippet: None,
            evidence_line: None,
        }
    }

    pub fn with_evidence(mut self, snippet: Option<String>, line: Option<i64>) -> Self {
        self.evidence_snippet = snippet;
        self.evidence_line = line;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BuildStats {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub fallback_files: usize,
    pub symbols: usize,
    pub edges: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_paths: Vec<String>,
    #[serde(default)]
    pub from_cache: bool,
}

// Query result types

#[derive(Debug, Serialize)]
pub struct BlastRadius {
    pub symbol: SymbolCompact,
    pub dependents: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instantiated_methods: Vec<String>,
    pub affected_files: Vec<String>,
    pub blast_radius_size: usize,
    pub depth: usize,
}

#[derive(Debug, Serialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub kind: SymbolKind,
    pub file: String,
    pub line: i64,
}

#[derive(Debug, Serialize)]
pub struct FindSymbolsResult {
    pub query: String,
    pub matches: Vec<SymbolMatch>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SymbolCode {
    pub symbol: String,
    pub kind: SymbolKind,
    pub file: String,
    pub start_line: i64,
    pub end_line: i64,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct FileSymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub line: i64,
}

#[derive(Debug, Serialize)]
pub struct FileSymbols {
    pub file: String,
    pub symbols: Vec<FileSymbolEntry>,
}

// diff_impact types

#[derive(Debug, Serialize)]
pub struct ChangedSymbol {
    pub symbol: SymbolCompact,
    /// "range" when a hunk overlapped the symbol's span, "file_level" when a
    /// hunk matched no symbol and the whole file is affected conservatively,
    /// "named_in_diff" when the declaration was harvested from diff text.
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SymbolImpact {
    pub symbol: String,
    pub blast_radius_size: usize,
}

#[derive(Debug, Serialize)]
pub struct DiffImpact {
    pub changed_symbols: Vec<ChangedSymbol>,
    pub impacts: Vec<SymbolImpact>,
    pub affected_files: Vec<String>,
    pub total_dependents: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// get_full_context types

#[derive(Debug, Serialize)]
pub struct FullContext {
    pub target: BlastRadius,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_code: Option<String>,
    pub dependents_code: Vec<CodeExcerpt>,
    pub dependencies_code: Vec<CodeExcerpt>,
    pub rules: Vec<crate::rules::MatchedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<crate::testloc::RelatedTests>,
}

#[derive(Debug, Serialize)]
pub struct CodeExcerpt {
    pub symbol: String,
    pub file: String,
    pub code: String,
}
