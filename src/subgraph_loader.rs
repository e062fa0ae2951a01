//! Subgraph materialization: anchor discovery plus bounded BFS expansion
//! over the store, ending in one bulk fetch into a `MemoryGraph`.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::memory_graph::{EdgeRow, MemoryGraph, NodeRow, TraversalDirection};
use crate::properties::SqlParam;
use crate::store::{StoreAdapter, StoreError};

pub struct SubgraphSpec {
    pub anchor_ids: Vec<String>,
    pub max_depth: u32,
    pub edge_types: Option<Vec<String>>,
    pub direction: TraversalDirection,
}

pub struct SubgraphLoader<'a> {
    adapter: &'a StoreAdapter,
    config: &'a EngineConfig,
}

impl<'a> SubgraphLoader<'a> {
    pub fn new(adapter: &'a StoreAdapter, config: &'a EngineConfig) -> Self {
        SubgraphLoader { adapter, config }
    }

    /// Label-indexed anchor lookup with equality predicates on extracted
    /// properties. Returns deduplicated ids.
    pub fn find_anchors(
        &self,
        label: &str,
        prop_filter: &Map<String, Value>,
    ) -> Result<Vec<String>, StoreError> {
        let mut sql =
            String::from("SELECT DISTINCT id FROM nodes WHERE json_extract(label, '$[0]') = ?");
        let mut params = vec![SqlParam::Text(label.to_string())];
        for (key, value) in prop_filter {
            let key_escaped = key.replace('\'', "''");
            match value {
                Value::Null => {
                    sql.push_str(&format!(
                        " AND json_extract(properties, '$.{key_escaped}') IS NULL"
                    ));
                }
                other => {
                    sql.push_str(&format!(
                        " AND json_extract(properties, '$.{key_escaped}') = ?"
                    ));
                    params.push(SqlParam::from_json(other));
                }
            }
        }

        let outcome = self.adapter.execute(&sql, &params)?;
        Ok(outcome
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|cell| cell.as_str().map(str::to_string))
            .collect())
    }

    /// BFS from the anchors up to `max_depth`, then one bulk fetch of all
    /// reached nodes. Only edges with both endpoints inside the reached set
    /// are materialized, so the graph contains no dangling edges.
    pub fn load_subgraph(&self, spec: &SubgraphSpec) -> Result<MemoryGraph, StoreError> {
        let mut visited: HashSet<String> = spec.anchor_ids.iter().cloned().collect();
        let mut frontier: Vec<String> = spec.anchor_ids.clone();
        // BTreeMap keeps edge iteration order deterministic.
        let mut edges: BTreeMap<String, EdgeRow> = BTreeMap::new();

        let mut depth = 0;
        while depth < spec.max_depth && !frontier.is_empty() {
            let mut next_frontier: Vec<String> = Vec::new();
            for chunk in frontier.chunks(self.config.id_chunk_size) {
                for row in self.fetch_incident_edges(chunk, spec)? {
                    let (ref _id, ref _t, ref source, ref target, ref _props) = row;
                    for endpoint in [source.clone(), target.clone()] {
                        if visited.insert(endpoint.clone()) {
                            next_frontier.push(endpoint);
                        }
                    }
                    edges.entry(row.0.clone()).or_insert(row);
                }
            }
            frontier = next_frontier;
            depth += 1;
        }

        let node_rows = self.fetch_nodes(&visited)?;
        let edge_rows: Vec<EdgeRow> = edges
            .into_values()
            .filter(|(_, _, source, target, _)| {
                visited.contains(source) && visited.contains(target)
            })
            .collect();

        debug!(
            "subgraph: {} nodes, {} edges from {} anchors (depth {})",
            node_rows.len(),
            edge_rows.len(),
            spec.anchor_ids.len(),
            spec.max_depth
        );

        MemoryGraph::from_rows(node_rows, edge_rows)
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn fetch_incident_edges(
        &self,
        frontier_chunk: &[String],
        spec: &SubgraphSpec,
    ) -> Result<Vec<EdgeRow>, StoreError> {
        let placeholders = placeholder_list(frontier_chunk.len());
        let mut params: Vec<SqlParam> = Vec::new();

        let incidence = match spec.direction {
            TraversalDirection::Outgoing => {
                params.extend(frontier_chunk.iter().cloned().map(SqlParam::Text));
                format!("source_id IN ({placeholders})")
            }
            TraversalDirection::Incoming => {
                params.extend(frontier_chunk.iter().cloned().map(SqlParam::Text));
                format!("target_id IN ({placeholders})")
            }
            TraversalDirection::Both => {
                params.extend(frontier_chunk.iter().cloned().map(SqlParam::Text));
                params.extend(frontier_chunk.iter().cloned().map(SqlParam::Text));
                format!("(source_id IN ({placeholders}) OR target_id IN ({placeholders}))")
            }
        };

        let mut sql = format!(
            "SELECT id, type, source_id, target_id, properties FROM edges WHERE {incidence}"
        );
        if let Some(types) = &spec.edge_types {
            sql.push_str(&format!(" AND type IN ({})", placeholder_list(types.len())));
            params.extend(types.iter().cloned().map(SqlParam::Text));
        }

        let outcome = self.adapter.execute(&sql, &params)?;
        Ok(outcome
            .rows
            .into_iter()
            .map(|row| {
                (
                    string_cell(&row[0]),
                    string_cell(&row[1]),
                    string_cell(&row[2]),
                    string_cell(&row[3]),
                    string_cell(&row[4]),
                )
            })
            .collect())
    }

    fn fetch_nodes(&self, ids: &HashSet<String>) -> Result<Vec<NodeRow>, StoreError> {
        let mut rows = Vec::with_capacity(ids.len());
        let ordered: Vec<&String> = {
            let mut v: Vec<&String> = ids.iter().collect();
            v.sort();
            v
        };
        for chunk in ordered.chunks(self.config.id_chunk_size) {
            let sql = format!(
                "SELECT id, label, properties FROM nodes WHERE id IN ({})",
                placeholder_list(chunk.len())
            );
            let params: Vec<SqlParam> =
                chunk.iter().map(|id| SqlParam::Text((*id).clone())).collect();
            let outcome = self.adapter.execute(&sql, &params)?;
            for row in outcome.rows {
                rows.push((
                    string_cell(&row[0]),
                    string_cell(&row[1]),
                    string_cell(&row[2]),
                ));
            }
        }
        Ok(rows)
    }
}

fn placeholder_list(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn string_cell(value: &Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_default()
}
