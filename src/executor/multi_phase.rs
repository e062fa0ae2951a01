//! Multi-phase MATCH→CREATE execution.
//!
//! A query of the shape `MATCH ... CREATE ...` (nothing else) whose CREATE
//! references matched variables cannot be compiled into one statement list:
//! the inserts need concrete node ids. Phase 1 compiles a synthetic RETURN
//! that projects `id(v)` for every such variable; phase 2 iterates the
//! returned rows and emits parameterized inserts with those ids bound.
//! Both phases run in one transaction and roll back together.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::cypher_parser::ast::{
    CypherQuery, CypherStatement, Expression, FunctionCall, ReturnClause, ReturnItem,
};
use crate::sqlite_query_generator::context::{Binding, TranslationCtx};
use crate::sqlite_query_generator::errors::SqlGeneratorError;
use crate::sqlite_query_generator::{translate, write_clauses, Statement, Translation};

/// The variables phase 1 must resolve, in deterministic order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPhasePlan<'a> {
    pub variables: Vec<&'a str>,
}

/// Detect the multi-phase shape: one or more MATCH (with optional WHEREs),
/// one or more CREATE, nothing else, and at least one CREATE node that has
/// no label but names a previously matched variable.
pub fn detect<'a>(query: &CypherQuery<'a>) -> Option<MultiPhasePlan<'a>> {
    if query.reading_clauses.is_empty() || query.create_clauses.is_empty() {
        return None;
    }
    if query.return_clause.is_some()
        || query.set_clause.is_some()
        || query.delete_clause.is_some()
        || query.with_clause.is_some()
        || !query.merge_clauses.is_empty()
        || !query.unwind_clauses.is_empty()
        || query.order_by_clause.is_some()
        || query.skip_clause.is_some()
        || query.limit_clause.is_some()
    {
        return None;
    }
    if query.reading_clauses.iter().any(|r| r.is_optional()) {
        return None;
    }

    // Variables bound by the MATCH patterns.
    let mut matched: Vec<&str> = Vec::new();
    for reading in &query.reading_clauses {
        for pattern in &reading.clause().patterns {
            for node in pattern.nodes() {
                if let Some(var) = node.variable {
                    if !matched.contains(&var) {
                        matched.push(var);
                    }
                }
            }
        }
    }

    // CREATE nodes without a label that reference a matched variable.
    let mut referenced: Vec<&str> = Vec::new();
    for create in &query.create_clauses {
        for pattern in &create.patterns {
            for node in pattern.nodes() {
                if node.label.is_none() {
                    if let Some(var) = node.variable {
                        if matched.contains(&var) && !referenced.contains(&var) {
                            referenced.push(var);
                        }
                    }
                }
            }
        }
    }

    if referenced.is_empty() {
        return None;
    }
    Some(MultiPhasePlan {
        variables: referenced,
    })
}

/// Compile phase 1: the original reading clauses with a synthetic RETURN
/// projecting `id(v)` per referenced variable, column-named by the variable.
pub fn compile_phase1(
    query: &CypherQuery<'_>,
    plan: &MultiPhasePlan<'_>,
    params: &Map<String, Value>,
    config: &EngineConfig,
) -> Result<Translation, SqlGeneratorError> {
    let synthetic = CypherStatement {
        query: CypherQuery {
            reading_clauses: query.reading_clauses.clone(),
            return_clause: Some(ReturnClause {
                distinct: false,
                items: plan
                    .variables
                    .iter()
                    .map(|&var| ReturnItem {
                        expression: Expression::FunctionCall(FunctionCall {
                            name: "id",
                            args: vec![Expression::Variable(var)],
                            star: false,
                        }),
                        alias: Some(var),
                        text: var,
                    })
                    .collect(),
            }),
            ..CypherQuery::default()
        },
        unions: Vec::new(),
    };
    translate(&synthetic, params, config)
}

/// Compile phase 2 for one phase-1 row: the CREATE clauses with the matched
/// variables pre-bound to the concrete ids from that row.
pub fn compile_phase2_row(
    query: &CypherQuery<'_>,
    row_ids: &HashMap<String, String>,
    params: &Map<String, Value>,
    config: &EngineConfig,
) -> Result<Vec<Statement>, SqlGeneratorError> {
    let mut ctx = TranslationCtx::new(params, config);
    for (var, id) in row_ids {
        ctx.bind(var, Binding::NewNode { id: id.clone() });
    }

    let mut statements = Vec::new();
    for create in &query.create_clauses {
        write_clauses::translate_create(create, &mut ctx, &mut statements)?;
    }
    Ok(statements)
}
