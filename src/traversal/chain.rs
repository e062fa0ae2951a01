//! Chain matching: backtracking DFS over the materialized subgraph.

use std::collections::HashMap;

use crate::memory_graph::MemoryGraph;

use super::planner::PatternChainParams;

/// One match: pattern variable name to bound node id.
pub type ChainBindings = HashMap<String, String>;

/// Evaluate the chain against the graph, seeding from the anchor ids.
/// Each satisfied leaf emits one bindings row; multiple distinct paths to
/// the same endpoints emit multiple rows (multiset semantics).
pub fn execute_chain(
    graph: &MemoryGraph,
    params: &PatternChainParams,
    anchor_ids: &[String],
) -> Vec<ChainBindings> {
    let mut results = Vec::new();

    for anchor_id in anchor_ids {
        let node = match graph.node(anchor_id) {
            Some(node) => node,
            None => continue,
        };
        if node.primary_label() != Some(params.anchor.label.as_str()) {
            continue;
        }
        if let Some(predicate) = &params.anchor.predicate {
            if !predicate.matches(&node.properties) {
                continue;
            }
        }

        let mut bindings = ChainBindings::new();
        if let Some(var) = &params.anchor.variable {
            bindings.insert(var.clone(), anchor_id.clone());
        }
        match_hops(graph, params, 0, anchor_id, &mut bindings, &mut results);
    }

    results
}

fn match_hops(
    graph: &MemoryGraph,
    params: &PatternChainParams,
    hop_index: usize,
    current: &str,
    bindings: &mut ChainBindings,
    results: &mut Vec<ChainBindings>,
) {
    let hop = match params.hops.get(hop_index) {
        Some(hop) => hop,
        None => {
            results.push(bindings.clone());
            return;
        }
    };

    for path in graph.traverse_paths(
        current,
        hop.edge_type.as_deref(),
        hop.min_hops,
        hop.max_hops,
        hop.direction,
    ) {
        let end_id = path.end();
        let node = match graph.node(end_id) {
            Some(node) => node,
            None => continue,
        };
        if node.primary_label() != Some(hop.node.label.as_str()) {
            continue;
        }
        if let Some(predicate) = &hop.node.predicate {
            if !predicate.matches(&node.properties) {
                continue;
            }
        }

        let end_id = end_id.to_string();
        let previous = hop
            .node
            .variable
            .as_ref()
            .map(|var| (var.clone(), bindings.insert(var.clone(), end_id.clone())));

        match_hops(graph, params, hop_index + 1, &end_id, bindings, results);

        if let Some((var, old)) = previous {
            match old {
                Some(value) => {
                    bindings.insert(var, value);
                }
                None => {
                    bindings.remove(&var);
                }
            }
        }
    }
}
