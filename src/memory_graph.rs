//! Adjacency-indexed in-memory subgraph.
//!
//! Built once per hybrid query from bulk-fetched rows, traversed by the
//! chain executor, and dropped when the query finishes. Node lookup is
//! O(1); adjacency scans are O(degree) and preserve edge insertion order,
//! which makes path enumeration deterministic.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct MemNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

impl MemNode {
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct MemEdge {
    pub id: String,
    pub edge_type: String,
    pub source_id: String,
    pub target_id: String,
    pub properties: Map<String, Value>,
}

/// Traversal direction relative to the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    Outgoing,
    Incoming,
    Both,
}

/// A raw node row: (id, label JSON, properties JSON).
pub type NodeRow = (String, String, String);
/// A raw edge row: (id, type, source_id, target_id, properties JSON).
pub type EdgeRow = (String, String, String, String, String);

#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: HashMap<String, MemNode>,
    edges: Vec<MemEdge>,
    out_index: HashMap<String, Vec<usize>>,
    in_index: HashMap<String, Vec<usize>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        MemoryGraph::default()
    }

    /// Parse raw store rows and populate the adjacency maps in one pass.
    pub fn from_rows(
        node_rows: Vec<NodeRow>,
        edge_rows: Vec<EdgeRow>,
    ) -> Result<Self, serde_json::Error> {
        let mut graph = MemoryGraph::new();
        for (id, label_json, properties_json) in node_rows {
            let labels: Vec<String> = serde_json::from_str(&label_json)?;
            let properties: Map<String, Value> = serde_json::from_str(&properties_json)?;
            graph.nodes.insert(
                id.clone(),
                MemNode {
                    id,
                    labels,
                    properties,
                },
            );
        }
        for (id, edge_type, source_id, target_id, properties_json) in edge_rows {
            let properties: Map<String, Value> = serde_json::from_str(&properties_json)?;
            graph.insert_edge(MemEdge {
                id,
                edge_type,
                source_id,
                target_id,
                properties,
            });
        }
        Ok(graph)
    }

    fn insert_edge(&mut self, edge: MemEdge) {
        let index = self.edges.len();
        self.out_index
            .entry(edge.source_id.clone())
            .or_default()
            .push(index);
        self.in_index
            .entry(edge.target_id.clone())
            .or_default()
            .push(index);
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&MemNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn out_edges<'a>(
        &'a self,
        id: &str,
        edge_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a MemEdge> + 'a {
        self.out_index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
            .filter(move |e| edge_type.map(|t| e.edge_type == t).unwrap_or(true))
    }

    pub fn in_edges<'a>(
        &'a self,
        id: &str,
        edge_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a MemEdge> + 'a {
        self.in_index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
            .filter(move |e| edge_type.map(|t| e.edge_type == t).unwrap_or(true))
    }

    /// Neighbor node ids under a direction and optional type filter.
    pub fn neighbors<'a>(
        &'a self,
        id: &str,
        direction: TraversalDirection,
        edge_type: Option<&'a str>,
    ) -> Vec<&'a str> {
        let mut out = Vec::new();
        if direction != TraversalDirection::Incoming {
            out.extend(self.out_edges(id, edge_type).map(|e| e.target_id.as_str()));
        }
        if direction != TraversalDirection::Outgoing {
            out.extend(self.in_edges(id, edge_type).map(|e| e.source_id.as_str()));
        }
        out
    }

    /// Lazily enumerate simple paths (no edge reused within a path) from
    /// `start` whose edge count lies in `[min_depth, max_depth]`.
    ///
    /// Enumeration is depth-first in edge insertion order (outgoing before
    /// incoming when direction is Both). With `min_depth == 0` the
    /// zero-length path is yielded first. Nodes may repeat along a path;
    /// edges never do, so enumeration terminates on cyclic graphs.
    pub fn traverse_paths<'a>(
        &'a self,
        start: &str,
        edge_type: Option<&'a str>,
        min_depth: u32,
        max_depth: u32,
        direction: TraversalDirection,
    ) -> PathIter<'a> {
        PathIter::new(self, start, edge_type, min_depth, max_depth, direction)
    }

    /// Candidate (edge index, neighbor id) pairs from a node.
    fn candidates(
        &self,
        id: &str,
        direction: TraversalDirection,
        edge_type: Option<&str>,
    ) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let matches = |index: &usize| {
            edge_type
                .map(|t| self.edges[*index].edge_type == t)
                .unwrap_or(true)
        };
        if direction != TraversalDirection::Incoming {
            if let Some(indices) = self.out_index.get(id) {
                for &index in indices.iter().filter(|i| matches(i)) {
                    out.push((index, self.edges[index].target_id.clone()));
                }
            }
        }
        if direction != TraversalDirection::Outgoing {
            if let Some(indices) = self.in_index.get(id) {
                for &index in indices.iter().filter(|i| matches(i)) {
                    out.push((index, self.edges[index].source_id.clone()));
                }
            }
        }
        out
    }
}

/// One enumerated path.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalPath {
    /// Visited node ids, start first; one more entry than `edge_ids`.
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
}

impl TraversalPath {
    pub fn end(&self) -> &str {
        self.node_ids.last().expect("paths contain the start node")
    }

    pub fn depth(&self) -> usize {
        self.edge_ids.len()
    }
}

struct Frame {
    candidates: Vec<(usize, String)>,
    cursor: usize,
}

/// Explicit-stack DFS path iterator.
pub struct PathIter<'a> {
    graph: &'a MemoryGraph,
    edge_type: Option<&'a str>,
    min_depth: u32,
    max_depth: u32,
    direction: TraversalDirection,
    stack: Vec<Frame>,
    path_nodes: Vec<String>,
    path_edges: Vec<usize>,
    used: HashSet<usize>,
    pending_zero: bool,
}

impl<'a> PathIter<'a> {
    fn new(
        graph: &'a MemoryGraph,
        start: &str,
        edge_type: Option<&'a str>,
        min_depth: u32,
        max_depth: u32,
        direction: TraversalDirection,
    ) -> Self {
        let exists = graph.nodes.contains_key(start);
        let mut iter = PathIter {
            graph,
            edge_type,
            min_depth,
            max_depth,
            direction,
            stack: Vec::new(),
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
            used: HashSet::new(),
            pending_zero: false,
        };
        if exists {
            iter.path_nodes.push(start.to_string());
            iter.pending_zero = min_depth == 0;
            let candidates = if max_depth > 0 {
                graph.candidates(start, direction, edge_type)
            } else {
                Vec::new()
            };
            iter.stack.push(Frame {
                candidates,
                cursor: 0,
            });
        }
        iter
    }

    fn snapshot(&self) -> TraversalPath {
        TraversalPath {
            node_ids: self.path_nodes.clone(),
            edge_ids: self
                .path_edges
                .iter()
                .map(|&i| self.graph.edges[i].id.clone())
                .collect(),
        }
    }
}

impl Iterator for PathIter<'_> {
    type Item = TraversalPath;

    fn next(&mut self) -> Option<TraversalPath> {
        if self.pending_zero {
            self.pending_zero = false;
            return Some(self.snapshot());
        }

        loop {
            let frame = self.stack.last_mut()?;
            if frame.cursor >= frame.candidates.len() {
                self.stack.pop();
                if !self.stack.is_empty() {
                    if let Some(edge_index) = self.path_edges.pop() {
                        self.used.remove(&edge_index);
                        self.path_nodes.pop();
                    }
                }
                continue;
            }

            let (edge_index, neighbor) = frame.candidates[frame.cursor].clone();
            frame.cursor += 1;
            if self.used.contains(&edge_index) {
                continue;
            }

            self.used.insert(edge_index);
            self.path_edges.push(edge_index);
            self.path_nodes.push(neighbor.clone());
            let depth = self.path_edges.len() as u32;

            let candidates = if depth < self.max_depth {
                self.graph
                    .candidates(&neighbor, self.direction, self.edge_type)
            } else {
                Vec::new()
            };
            self.stack.push(Frame {
                candidates,
                cursor: 0,
            });

            if depth >= self.min_depth {
                return Some(self.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_row(id: &str, label: &str) -> NodeRow {
        (
            id.to_string(),
            format!("[\"{label}\"]"),
            format!("{{\"name\":\"{id}\"}}"),
        )
    }

    fn edge_row(id: &str, t: &str, from: &str, to: &str) -> EdgeRow {
        (
            id.to_string(),
            t.to_string(),
            from.to_string(),
            to.to_string(),
            "{}".to_string(),
        )
    }

    fn chain_graph() -> MemoryGraph {
        // a -> b -> c, a -> d
        MemoryGraph::from_rows(
            vec![
                node_row("a", "N"),
                node_row("b", "N"),
                node_row("c", "N"),
                node_row("d", "N"),
            ],
            vec![
                edge_row("e1", "L", "a", "b"),
                edge_row("e2", "L", "b", "c"),
                edge_row("e3", "L", "a", "d"),
            ],
        )
        .expect("graph")
    }

    #[test]
    fn test_from_rows_parses_json() {
        let graph = chain_graph();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        let a = graph.node("a").expect("a");
        assert_eq!(a.primary_label(), Some("N"));
        assert_eq!(a.properties["name"], serde_json::json!("a"));
    }

    #[test]
    fn test_adjacency_lookup() {
        let graph = chain_graph();
        let out: Vec<&str> = graph.out_edges("a", None).map(|e| e.id.as_str()).collect();
        assert_eq!(out, vec!["e1", "e3"]);
        let incoming: Vec<&str> = graph.in_edges("c", None).map(|e| e.id.as_str()).collect();
        assert_eq!(incoming, vec!["e2"]);
        assert!(graph.out_edges("a", Some("MISSING")).next().is_none());
    }

    #[test]
    fn test_neighbors_both_directions() {
        let graph = chain_graph();
        let neighbors = graph.neighbors("b", TraversalDirection::Both, None);
        assert_eq!(neighbors, vec!["c", "a"]);
    }

    #[test]
    fn test_traverse_paths_depth_window() {
        let graph = chain_graph();
        let paths: Vec<TraversalPath> = graph
            .traverse_paths("a", Some("L"), 1, 2, TraversalDirection::Outgoing)
            .collect();
        let ends: Vec<&str> = paths.iter().map(|p| p.end()).collect();
        // DFS in insertion order: a-b, a-b-c, a-d.
        assert_eq!(ends, vec!["b", "c", "d"]);
        assert_eq!(paths[1].edge_ids, vec!["e1", "e2"]);
    }

    #[test]
    fn test_min_depth_filters_short_paths() {
        let graph = chain_graph();
        let ends: Vec<String> = graph
            .traverse_paths("a", Some("L"), 2, 2, TraversalDirection::Outgoing)
            .map(|p| p.end().to_string())
            .collect();
        assert_eq!(ends, vec!["c"]);
    }

    #[test]
    fn test_zero_depth_yields_start_first() {
        let graph = chain_graph();
        let paths: Vec<TraversalPath> = graph
            .traverse_paths("a", None, 0, 1, TraversalDirection::Outgoing)
            .collect();
        assert_eq!(paths[0].end(), "a");
        assert_eq!(paths[0].depth(), 0);
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_cycle_terminates_with_edge_disjoint_paths() {
        // A -> B -> C -> A
        let graph = MemoryGraph::from_rows(
            vec![node_row("A", "N"), node_row("B", "N"), node_row("C", "N")],
            vec![
                edge_row("e1", "L", "A", "B"),
                edge_row("e2", "L", "B", "C"),
                edge_row("e3", "L", "C", "A"),
            ],
        )
        .expect("graph");

        let paths: Vec<TraversalPath> = graph
            .traverse_paths("A", Some("L"), 1, 10, TraversalDirection::Outgoing)
            .collect();
        // Exactly three simple paths: A-B, A-B-C, A-B-C-A.
        assert_eq!(paths.len(), 3);
        let ends: Vec<&str> = paths.iter().map(|p| p.end()).collect();
        assert_eq!(ends, vec!["B", "C", "A"]);
        for path in &paths {
            let unique: HashSet<&String> = path.edge_ids.iter().collect();
            assert_eq!(unique.len(), path.edge_ids.len(), "edge reused in path");
        }
    }

    #[test]
    fn test_node_revisit_allowed_when_edges_differ() {
        // Two parallel edges a -> b and one back edge b -> a.
        let graph = MemoryGraph::from_rows(
            vec![node_row("a", "N"), node_row("b", "N")],
            vec![
                edge_row("e1", "L", "a", "b"),
                edge_row("e2", "L", "b", "a"),
                edge_row("e3", "L", "a", "b"),
            ],
        )
        .expect("graph");
        let paths: Vec<TraversalPath> = graph
            .traverse_paths("a", Some("L"), 1, 3, TraversalDirection::Outgoing)
            .collect();
        // a-b, a-b-a, a-b-a-b(e3), a-b(e3), a-b(e3)-a, a-b(e3)-a-b(e1)
        assert_eq!(paths.len(), 6);
        // The same node may appear twice as long as edges differ.
        assert!(paths.iter().any(|p| p.node_ids == vec!["a", "b", "a", "b"]));
    }

    #[test]
    fn test_missing_start_yields_nothing() {
        let graph = chain_graph();
        assert_eq!(
            graph
                .traverse_paths("zzz", None, 0, 5, TraversalDirection::Both)
                .count(),
            0
        );
    }

    #[test]
    fn test_both_direction_traversal() {
        let graph = chain_graph();
        // From b: outgoing e2 to c, incoming e1 to a.
        let ends: Vec<String> = graph
            .traverse_paths("b", Some("L"), 1, 1, TraversalDirection::Both)
            .map(|p| p.end().to_string())
            .collect();
        assert_eq!(ends, vec!["c", "a"]);
    }
}
