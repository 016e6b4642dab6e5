use crate::model::{Edge, EdgeKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod builder;
pub mod query;

/// Directed multi-edge graph keyed by qualified name. Built once per build
/// and read-only afterwards; a rebuild produces a fresh graph.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CodeGraph {
    outgoing: HashMap<String, Vec<Edge>>,
    incoming: HashMap<String, Vec<Edge>>,
    edge_count: usize,
    #[serde(skip)]
    seen: HashSet<(String, String, EdgeKind)>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge, deduplicating identical (source, target, kind)
    /// triples and applying the tie-break: a confirmed `calls` edge subsumes
    /// `may_call` for the same pair, in either arrival order.
    pub fn add_edge(&mut self, edge: Edge) {
        if edge.kind == EdgeKind::Contains && edge.source == edge.target {
            return;
        }
        let key = (edge.source.clone(), edge.target.clone(), edge.kind);
        if self.seen.contains(&key) {
            return;
        }
        match edge.kind {
            EdgeKind::MayCall
                if self.seen.contains(&(
                    edge.source.clone(),
                    edge.target.clone(),
                    EdgeKind::Calls,
                )) =>
            {
                return;
            }
            EdgeKind::Calls => {
                let inferred = (edge.source.clone(), edge.target.clone(), EdgeKind::MayCall);
                if self.seen.remove(&inferred) {
                    self.remove_edge(&edge.source, &edge.target, EdgeKind::MayCall);
                }
            }
            _ => {}
        }
        self.seen.insert(key);
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(edge.clone());
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge);
        self.edge_count += 1;
    }

    fn remove_edge(&mut self, source: &str, target: &str, kind: EdgeKind) {
        let mut removed = false;
        if let Some(edges) = self.outgoing.get_mut(source) {
            let before = edges.len();
            edges.retain(|e| !(e.target == target && e.kind == kind));
            removed = edges.len() != before;
        }
        if let Some(edges) = self.incoming.get_mut(target) {
            edges.retain(|e| !(e.source == source && e.kind == kind));
        }
        if removed {
            self.edge_count -= 1;
        }
    }

    pub fn edges_from(&self, qualname: &str) -> &[Edge] {
        self.outgoing.get(qualname).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges_to(&self, qualname: &str) -> &[Edge] {
        self.incoming.get(qualname).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, source: &str, target: &str, kind: EdgeKind) -> bool {
        self.edges_from(source)
            .iter()
            .any(|e| e.target == target && e.kind == kind)
    }

    /// Any edge connecting source -> target, regardless of kind.
    pub fn connects(&self, source: &str, target: &str) -> bool {
        self.edges_from(source).iter().any(|e| e.target == target)
    }

    pub fn successors<'a>(
        &'a self,
        qualname: &str,
        kinds: Option<&'a HashSet<EdgeKind>>,
    ) -> impl Iterator<Item = &'a Edge> {
        self.edges_from(qualname)
            .iter()
            .filter(move |e| kinds.is_none_or(|set| set.contains(&e.kind)))
    }

    pub fn predecessors<'a>(
        &'a self,
        qualname: &str,
        kinds: Option<&'a HashSet<EdgeKind>>,
    ) -> impl Iterator<Item = &'a Edge> {
        self.edges_to(qualname)
            .iter()
            .filter(move |e| kinds.is_none_or(|set| set.contains(&e.kind)))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        let mut sources: Vec<&String> = self.outgoing.keys().collect();
        sources.sort();
        sources
            .into_iter()
            .flat_map(|source| self.outgoing[source].iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_subsumes_may_call_either_order() {
        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "b", EdgeKind::MayCall));
        graph.add_edge(Edge::new("a", "b", EdgeKind::Calls));
        let kinds: Vec<EdgeKind> = graph.edges_from("a").iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Calls]);

        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "b", EdgeKind::Calls));
        graph.add_edge(Edge::new("a", "b", EdgeKind::MayCall));
        let kinds: Vec<EdgeKind> = graph.edges_from("a").iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Calls]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn contains_never_self_referential() {
        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "a", EdgeKind::Contains));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn duplicate_triples_dedup() {
        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "b", EdgeKind::Imports));
        graph.add_edge(Edge::new("a", "b", EdgeKind::Imports));
        graph.add_edge(Edge::new("a", "b", EdgeKind::References));
        assert_eq!(graph.edge_count(), 2);
    }
}
