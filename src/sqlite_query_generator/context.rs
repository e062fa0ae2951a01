//! Translation context: the variable table, registered pattern joins and
//! pending modifiers carried between clause translations.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::cypher_parser::ast::{Direction, VarLengthSpec};
use crate::properties::SqlParam;

use super::errors::SqlGeneratorError;

/// A rendered SQL fragment plus the parameters it binds, in order.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<SqlParam>,
    /// The fragment yields JSON text (needs decoding in result formatting).
    pub is_json: bool,
    /// The fragment contains an aggregate function call.
    pub has_aggregate: bool,
}

impl Rendered {
    pub fn plain(sql: impl Into<String>) -> Self {
        Rendered {
            sql: sql.into(),
            ..Default::default()
        }
    }
}

/// What a logical variable is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Node created in this query; the UUID is already decided.
    NewNode { id: String },
    /// Edge created in this query.
    NewEdge { id: String, rel_type: String },
    /// Node matched from the store under a table alias.
    Node { alias: String },
    /// Edge matched from the store under a table alias.
    Edge { alias: String },
    /// UNWIND element exposed by a json_each join.
    Unwind { alias: String },
    /// WITH projection of an arbitrary expression, kept in both rendering
    /// modes so downstream use picks the right one.
    Projected {
        value: Rendered,
        projection: Rendered,
    },
}

/// One relationship pattern registered by MATCH, to be expanded into joins
/// when a SELECT is synthesized.
#[derive(Debug, Clone)]
pub struct RegisteredRelationship {
    pub source_alias: String,
    pub edge_alias: String,
    pub target_alias: String,
    pub direction: Direction,
    pub rel_type: Option<String>,
    pub var_length: Option<VarLengthSpec>,
    pub optional: bool,
}

/// A node table source together with where it appears.
#[derive(Debug, Clone)]
pub struct NodeSource {
    pub alias: String,
    pub optional: bool,
}

/// A json_each expansion produced by UNWIND.
#[derive(Debug, Clone)]
pub struct UnwindSource {
    pub alias: String,
    pub list: Rendered,
}

/// Modifiers stored by WITH for the next RETURN to apply.
#[derive(Debug, Clone, Default)]
pub struct PendingWith {
    pub distinct: bool,
    pub order_by: Vec<(Rendered, &'static str)>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    /// Filter over plain columns.
    pub where_cond: Option<Rendered>,
    /// Filter over aggregate projections (rendered as HAVING).
    pub having_cond: Option<Rendered>,
}

pub struct TranslationCtx<'a> {
    pub params: &'a Map<String, Value>,
    pub config: &'a EngineConfig,
    /// Logical name -> binding.
    pub variables: HashMap<String, Binding>,
    /// Node table sources in first-use order.
    pub node_sources: Vec<NodeSource>,
    /// Relationship patterns in registration order.
    pub relationships: Vec<RegisteredRelationship>,
    /// UNWIND expansions in clause order.
    pub unwinds: Vec<UnwindSource>,
    /// Standalone edge scans (created edges re-read by RETURN).
    pub edge_scans: Vec<String>,
    /// Conditions for required matches (WHERE).
    pub conditions: Vec<Rendered>,
    /// Conditions for OPTIONAL matches, keyed by the alias they belong to;
    /// pattern conditions go into join ON clauses.
    pub optional_conditions: HashMap<String, Vec<Rendered>>,
    /// WHERE conditions from OPTIONAL MATCH clauses, wrapped at SELECT time.
    pub optional_where: Vec<(String, Rendered)>,
    pub pending_with: Option<PendingWith>,
    alias_counter: usize,
}

impl<'a> TranslationCtx<'a> {
    pub fn new(params: &'a Map<String, Value>, config: &'a EngineConfig) -> Self {
        TranslationCtx {
            params,
            config,
            variables: HashMap::new(),
            node_sources: Vec::new(),
            relationships: Vec::new(),
            unwinds: Vec::new(),
            edge_scans: Vec::new(),
            conditions: Vec::new(),
            optional_conditions: HashMap::new(),
            optional_where: Vec::new(),
            pending_with: None,
            alias_counter: 0,
        }
    }

    pub fn fresh_alias(&mut self, prefix: &str) -> String {
        let alias = format!("{prefix}{}", self.alias_counter);
        self.alias_counter += 1;
        alias
    }

    pub fn lookup(&self, name: &str) -> Result<&Binding, SqlGeneratorError> {
        self.variables
            .get(name)
            .ok_or_else(|| SqlGeneratorError::UnknownVariable(name.to_string()))
    }

    pub fn bind(&mut self, name: &str, binding: Binding) {
        self.variables.insert(name.to_string(), binding);
    }

    /// Resolve a parameter reference against the query parameter map.
    pub fn parameter(&self, name: &str) -> Result<&'a Value, SqlGeneratorError> {
        self.params
            .get(name)
            .ok_or_else(|| SqlGeneratorError::MissingParameter(name.to_string()))
    }

    /// Register a node table source, returning its alias.
    pub fn add_node_source(&mut self, optional: bool) -> String {
        let alias = self.fresh_alias("n");
        self.node_sources.push(NodeSource {
            alias: alias.clone(),
            optional,
        });
        alias
    }

    pub fn add_condition(&mut self, optional_owner: Option<&str>, cond: Rendered) {
        match optional_owner {
            Some(alias) => self
                .optional_conditions
                .entry(alias.to_string())
                .or_default()
                .push(cond),
            None => self.conditions.push(cond),
        }
    }

    /// The single variable-length relationship, if one was registered.
    pub fn var_length_relationship(&self) -> Option<&RegisteredRelationship> {
        self.relationships.iter().find(|r| r.var_length.is_some())
    }
}
