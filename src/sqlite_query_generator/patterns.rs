//! MATCH / OPTIONAL MATCH registration.
//!
//! Reading clauses emit no statements; they bind variables to table aliases,
//! record relationship patterns for the join builder, and accumulate label,
//! property and WHERE predicates. Required predicates end up in the SELECT's
//! WHERE; predicates of optional patterns attach to their join ON clause so
//! a failed optional match still yields a row.

use serde_json::Value;

use crate::cypher_parser::ast::{
    MatchClause, NodePattern, PathPattern, PropertyEntry, ReadingClause, RelationshipPattern,
};
use crate::properties::SqlParam;

use super::context::{Binding, RegisteredRelationship, Rendered, TranslationCtx};
use super::errors::SqlGeneratorError;
use super::expression::{render_expr, static_value, Mode};

pub fn register_reading_clause(
    reading: &ReadingClause<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    let optional = reading.is_optional();
    register_match(reading.clause(), optional, ctx)
}

fn register_match(
    clause: &MatchClause<'_>,
    optional: bool,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    // The first alias introduced by an optional clause carries the
    // null-or-condition wrapping for its WHERE.
    let mut first_fresh_alias: Option<String> = None;

    for pattern in &clause.patterns {
        let alias = register_pattern(pattern, optional, ctx)?;
        if first_fresh_alias.is_none() {
            first_fresh_alias = alias;
        }
    }

    if let Some(where_clause) = &clause.where_clause {
        let rendered = render_expr(&where_clause.condition, ctx, Mode::Value)?;
        if rendered.has_aggregate {
            return Err(SqlGeneratorError::MisplacedAggregate("WHERE".into()));
        }
        if optional {
            let alias = first_fresh_alias.ok_or(SqlGeneratorError::Unsupported(
                "OPTIONAL MATCH WHERE requires a pattern",
            ))?;
            ctx.optional_where.push((alias, rendered));
        } else {
            ctx.conditions.push(rendered);
        }
    }

    Ok(())
}

/// Register one path pattern; returns the first alias it introduced.
fn register_pattern(
    pattern: &PathPattern<'_>,
    optional: bool,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Option<String>, SqlGeneratorError> {
    let (source_alias, mut first_fresh) = ensure_node(&pattern.start, optional, ctx)?;

    let mut current = source_alias;
    for segment in &pattern.segments {
        let edge_alias = register_relationship(&segment.relationship, &current, optional, ctx)?;
        if first_fresh.is_none() {
            first_fresh = Some(edge_alias.clone());
        }

        let (target_alias, target_fresh) = ensure_node(&segment.node, optional, ctx)?;
        if first_fresh.is_none() {
            first_fresh = target_fresh;
        }

        // Tie the registered relationship to its endpoints.
        let rel = ctx
            .relationships
            .last_mut()
            .expect("relationship was just registered");
        rel.target_alias = target_alias.clone();

        current = target_alias;
    }

    Ok(first_fresh)
}

/// Bind (or re-use) a node pattern's table alias and record its predicates.
fn ensure_node(
    node: &NodePattern<'_>,
    optional: bool,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(String, Option<String>), SqlGeneratorError> {
    if let Some(var) = node.variable {
        if let Some(binding) = ctx.variables.get(var) {
            let alias = match binding {
                Binding::Node { alias } => alias.clone(),
                _ => {
                    return Err(SqlGeneratorError::Unsupported(
                        "pattern variable is already bound to a non-node value",
                    ))
                }
            };
            // Additional predicates on an already-bound variable still apply.
            register_node_predicates(node, &alias, optional, ctx)?;
            return Ok((alias, None));
        }
    }

    let alias = ctx.add_node_source(optional);
    if let Some(var) = node.variable {
        ctx.bind(var, Binding::Node {
            alias: alias.clone(),
        });
    }
    register_node_predicates(node, &alias, optional, ctx)?;
    Ok((alias.clone(), Some(alias)))
}

fn register_node_predicates(
    node: &NodePattern<'_>,
    alias: &str,
    optional: bool,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    let owner = optional.then_some(alias);

    if let Some(label) = node.label {
        ctx.add_condition(
            owner,
            Rendered {
                sql: format!("json_extract({alias}.label, '$[0]') = ?"),
                params: vec![SqlParam::Text(label.to_string())],
                ..Default::default()
            },
        );
    }

    if let Some(props) = &node.properties {
        register_property_predicates(props, alias, "properties", owner, ctx)?;
    }
    Ok(())
}

fn register_property_predicates(
    props: &[PropertyEntry<'_>],
    alias: &str,
    column: &str,
    owner: Option<&str>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    for entry in props {
        let key = entry.key.replace('\'', "''");
        let cond = match static_value(&entry.value, ctx) {
            Ok(Value::Null) => Rendered::plain(format!(
                "json_extract({alias}.{column}, '$.{key}') IS NULL"
            )),
            Ok(value) => Rendered {
                sql: format!("json_extract({alias}.{column}, '$.{key}') = ?"),
                params: vec![SqlParam::from_json(&value)],
                ..Default::default()
            },
            // Dynamic values (e.g. an UNWIND element) compile to an
            // equality against the rendered expression.
            Err(SqlGeneratorError::Unsupported(_)) => {
                let rendered = render_expr(&entry.value, ctx, Mode::Value)?;
                Rendered {
                    sql: format!(
                        "json_extract({alias}.{column}, '$.{key}') = {}",
                        rendered.sql
                    ),
                    params: rendered.params,
                    is_json: false,
                    has_aggregate: rendered.has_aggregate,
                }
            }
            Err(other) => return Err(other),
        };
        ctx.add_condition(owner, cond);
    }
    Ok(())
}

fn register_relationship(
    rel: &RelationshipPattern<'_>,
    source_alias: &str,
    optional: bool,
    ctx: &mut TranslationCtx<'_>,
) -> Result<String, SqlGeneratorError> {
    if rel.var_length.is_some() {
        if ctx.var_length_relationship().is_some() {
            return Err(SqlGeneratorError::MultipleVariableLength);
        }
        if rel.variable.is_some() {
            return Err(SqlGeneratorError::Unsupported(
                "variable-length relationships cannot be bound to a variable",
            ));
        }
        if rel.properties.is_some() {
            return Err(SqlGeneratorError::Unsupported(
                "variable-length relationships cannot carry property predicates",
            ));
        }
    }

    let edge_alias = ctx.fresh_alias("e");
    if let Some(var) = rel.variable {
        if ctx.variables.contains_key(var) {
            return Err(SqlGeneratorError::DuplicateVariable(var.to_string()));
        }
        ctx.bind(var, Binding::Edge {
            alias: edge_alias.clone(),
        });
    }

    let owner = optional.then_some(edge_alias.as_str());
    if rel.var_length.is_none() {
        if let Some(rel_type) = rel.rel_type {
            ctx.add_condition(
                owner,
                Rendered {
                    sql: format!("{edge_alias}.type = ?"),
                    params: vec![SqlParam::Text(rel_type.to_string())],
                    ..Default::default()
                },
            );
        }
        if let Some(props) = &rel.properties {
            register_property_predicates(props, &edge_alias, "properties", owner, ctx)?;
        }
    }

    ctx.relationships.push(RegisteredRelationship {
        source_alias: source_alias.to_string(),
        edge_alias: edge_alias.clone(),
        // Fixed up by register_pattern once the target node is known.
        target_alias: String::new(),
        direction: rel.direction,
        rel_type: rel.rel_type.map(str::to_string),
        var_length: rel.var_length,
        optional,
    });

    Ok(edge_alias)
}
