//! Top-level query execution: parse, plan, translate or traverse, execute,
//! format.

pub mod errors;
pub mod format;
pub mod multi_phase;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use serde_json::{Map, Value};

pub use errors::EngineError;

use crate::config::EngineConfig;
use crate::cypher_parser::{self, ast::CypherStatement};
use crate::memory_graph::{MemNode, TraversalDirection};
use crate::sqlite_query_generator::{self, StatementKind, Translation};
use crate::store::StoreAdapter;
use crate::subgraph_loader::{SubgraphLoader, SubgraphSpec};
use crate::traversal::{self, PatternChainParams, PlanOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMeta {
    pub count: usize,
    pub time_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub data: Vec<Map<String, Value>>,
    pub meta: QueryMeta,
}

/// Per-tenant query engine. Owns the parser, planner and translator
/// invocations it makes; the store handle is shared with nothing else.
pub struct QueryEngine {
    adapter: Arc<StoreAdapter>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(adapter: Arc<StoreAdapter>, config: EngineConfig) -> Self {
        QueryEngine { adapter, config }
    }

    pub fn execute(
        &self,
        cypher: &str,
        params: Map<String, Value>,
    ) -> Result<QueryResult, EngineError> {
        let started = Instant::now();

        if cypher.len() > self.config.max_query_length {
            return Err(EngineError::QueryTooLong {
                max: self.config.max_query_length,
            });
        }

        let statement = cypher_parser::parse(cypher)?;

        if let Some(plan) = multi_phase::detect(&statement.query) {
            debug!("multi-phase execution for {} variable(s)", plan.variables.len());
            return self.run_multi_phase(&statement, &plan, &params, started);
        }

        match traversal::planner::plan(&statement, &params, &self.config) {
            PlanOutcome::Suitable(chain) => {
                debug!("hybrid traversal path chosen ({} hops)", chain.hops.len());
                return self.run_hybrid(&statement, &chain, started);
            }
            PlanOutcome::Unsuitable { reason } => {
                debug!("translator path: {reason}");
            }
        }

        let translation = sqlite_query_generator::translate(&statement, &params, &self.config)?;
        self.run_translation(translation, started)
    }

    /// Run the translator's statement list in one transaction; the `Query`
    /// statement's rows become the result.
    fn run_translation(
        &self,
        translation: Translation,
        started: Instant,
    ) -> Result<QueryResult, EngineError> {
        let rows = self.adapter.transaction::<_, EngineError>(|tx| {
            let mut query_rows = Vec::new();
            for statement in &translation.statements {
                let outcome = tx.execute(&statement.sql, &statement.params)?;
                match &statement.kind {
                    StatementKind::Execute => {}
                    StatementKind::Query => query_rows = outcome.rows,
                    StatementKind::GuardEmpty { message } => {
                        if !outcome.rows.is_empty() {
                            return Err(EngineError::Constraint((*message).to_string()));
                        }
                    }
                }
            }
            Ok(query_rows)
        })?;

        let data = match &translation.return_columns {
            Some(columns) => format::format_rows(rows, columns),
            None => Vec::new(),
        };
        Ok(finish(data, started))
    }

    /// Phase 1 materializes matched ids; phase 2 inserts per returned row.
    /// Both share one transaction and roll back together.
    fn run_multi_phase(
        &self,
        statement: &CypherStatement<'_>,
        plan: &multi_phase::MultiPhasePlan<'_>,
        params: &Map<String, Value>,
        started: Instant,
    ) -> Result<QueryResult, EngineError> {
        let phase1 = multi_phase::compile_phase1(&statement.query, plan, params, &self.config)?;
        let columns: Vec<String> = phase1
            .return_columns
            .as_ref()
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();

        self.adapter.transaction::<_, EngineError>(|tx| {
            let mut matched_rows = Vec::new();
            for stmt in &phase1.statements {
                let outcome = tx.execute(&stmt.sql, &stmt.params)?;
                if stmt.kind == StatementKind::Query {
                    matched_rows = outcome.rows;
                }
            }

            for row in matched_rows {
                let mut row_ids = HashMap::new();
                for (index, name) in columns.iter().enumerate() {
                    if let Some(Value::String(id)) = row.get(index) {
                        row_ids.insert(name.clone(), id.clone());
                    }
                }
                let inserts = multi_phase::compile_phase2_row(
                    &statement.query,
                    &row_ids,
                    params,
                    &self.config,
                )?;
                for stmt in inserts {
                    tx.execute(&stmt.sql, &stmt.params)?;
                }
            }
            Ok(())
        })?;

        // Writes surface an empty result set.
        Ok(finish(Vec::new(), started))
    }

    /// Subgraph materialization plus in-memory chain matching.
    fn run_hybrid(
        &self,
        statement: &CypherStatement<'_>,
        chain: &PatternChainParams,
        started: Instant,
    ) -> Result<QueryResult, EngineError> {
        let loader = SubgraphLoader::new(&self.adapter, &self.config);
        let anchors = loader.find_anchors(&chain.anchor.label, &chain.anchor_prop_filter)?;
        let graph = loader.load_subgraph(&SubgraphSpec {
            anchor_ids: anchors.clone(),
            max_depth: chain.total_max_depth(),
            edge_types: None,
            direction: TraversalDirection::Both,
        })?;
        let bindings = traversal::execute_chain(&graph, chain, &anchors);

        let return_clause = statement
            .query
            .return_clause
            .as_ref()
            .expect("planner requires RETURN");

        let mut data = Vec::with_capacity(bindings.len());
        for row_bindings in &bindings {
            let mut row = Map::new();
            for item in &return_clause.items {
                use crate::cypher_parser::ast::Expression;
                let value = match &item.expression {
                    Expression::Variable(var) => row_bindings
                        .get(*var)
                        .and_then(|id| graph.node(id))
                        .map(node_value)
                        .unwrap_or(Value::Null),
                    Expression::PropertyAccess(access) => row_bindings
                        .get(access.base)
                        .and_then(|id| graph.node(id))
                        .and_then(|node| node.properties.get(access.key).cloned())
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                row.insert(item.column_name().to_string(), value);
            }
            data.push(row);
        }

        if return_clause.distinct {
            data = dedupe_rows(data);
        }

        Ok(finish(data, started))
    }
}

/// Node projection shaped exactly like the translator's json_object
/// assembly: id, labels, properties.
fn node_value(node: &MemNode) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::String(node.id.clone()));
    out.insert(
        "labels".to_string(),
        Value::Array(node.labels.iter().cloned().map(Value::String).collect()),
    );
    out.insert(
        "properties".to_string(),
        Value::Object(node.properties.clone()),
    );
    Value::Object(out)
}

fn dedupe_rows(rows: Vec<Map<String, Value>>) -> Vec<Map<String, Value>> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(Value::Object(row.clone()).to_string()))
        .collect()
}

fn finish(data: Vec<Map<String, Value>>, started: Instant) -> QueryResult {
    let count = data.len();
    QueryResult {
        data,
        meta: QueryMeta {
            count,
            time_ms: started.elapsed().as_millis() as u64,
        },
    }
}
