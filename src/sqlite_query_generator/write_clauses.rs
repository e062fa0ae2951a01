//! CREATE / MERGE / SET / DELETE statement emission.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::cypher_parser::ast::{
    CreateClause, DeleteClause, Direction, MergeClause, NodePattern, PropertyEntry, SetClause,
};
use crate::properties::{validate_properties, SqlParam};

use super::context::{Binding, Rendered, TranslationCtx};
use super::errors::SqlGeneratorError;
use super::expression::{render_json_arg, static_value};
use super::select_builder::build_binding_id_select;
use super::{Statement, StatementKind};

/// Evaluate inline `{key: value}` entries to a concrete, validated map.
fn evaluate_properties(
    entries: Option<&Vec<PropertyEntry<'_>>>,
    ctx: &TranslationCtx<'_>,
) -> Result<Map<String, Value>, SqlGeneratorError> {
    let mut map = Map::new();
    if let Some(entries) = entries {
        for entry in entries {
            map.insert(entry.key.to_string(), static_value(&entry.value, ctx)?);
        }
    }
    validate_properties(&map)?;
    Ok(map)
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

fn node_insert(id: &str, label: &str, props: &Map<String, Value>) -> Statement {
    Statement {
        sql: "INSERT INTO nodes (id, label, properties) VALUES (?, json(?), json(?))".into(),
        params: vec![
            SqlParam::Text(id.to_string()),
            SqlParam::Text(Value::Array(vec![Value::String(label.to_string())]).to_string()),
            SqlParam::Text(Value::Object(props.clone()).to_string()),
        ],
        kind: StatementKind::Execute,
    }
}

pub fn translate_create(
    clause: &CreateClause<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<(), SqlGeneratorError> {
    for pattern in &clause.patterns {
        if pattern.is_single_node() {
            create_node(&pattern.start, ctx, statements)?;
            continue;
        }

        let mut source_id = resolve_create_endpoint(&pattern.start, ctx, statements)?;
        for segment in &pattern.segments {
            let target_id = resolve_create_endpoint(&segment.node, ctx, statements)?;
            let rel = &segment.relationship;

            if rel.var_length.is_some() {
                return Err(SqlGeneratorError::Unsupported(
                    "variable-length relationships cannot be created",
                ));
            }
            let rel_type = rel.rel_type.ok_or(SqlGeneratorError::EdgeTypeRequired)?;

            // Left-directed patterns swap source and target.
            let (from_id, to_id) = match rel.direction {
                Direction::Outgoing => (source_id.clone(), target_id.clone()),
                Direction::Incoming => (target_id.clone(), source_id.clone()),
                Direction::Either => {
                    return Err(SqlGeneratorError::Unsupported(
                        "undirected relationships cannot be created",
                    ))
                }
            };

            let edge_id = new_uuid();
            let props = evaluate_properties(rel.properties.as_ref(), ctx)?;
            statements.push(Statement {
                sql: "INSERT INTO edges (id, type, source_id, target_id, properties) \
                      VALUES (?, ?, ?, ?, json(?))"
                    .into(),
                params: vec![
                    SqlParam::Text(edge_id.clone()),
                    SqlParam::Text(rel_type.to_string()),
                    SqlParam::Text(from_id),
                    SqlParam::Text(to_id),
                    SqlParam::Text(Value::Object(props).to_string()),
                ],
                kind: StatementKind::Execute,
            });

            if let Some(var) = rel.variable {
                ctx.bind(var, Binding::NewEdge {
                    id: edge_id,
                    rel_type: rel_type.to_string(),
                });
            }

            source_id = target_id;
        }
    }
    Ok(())
}

fn create_node(
    node: &NodePattern<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<String, SqlGeneratorError> {
    let label = node.label.ok_or(SqlGeneratorError::Unsupported(
        "CREATE requires a label on every new node",
    ))?;
    if let Some(var) = node.variable {
        if ctx.variables.contains_key(var) {
            return Err(SqlGeneratorError::DuplicateVariable(var.to_string()));
        }
    }

    let id = new_uuid();
    let props = evaluate_properties(node.properties.as_ref(), ctx)?;
    statements.push(node_insert(&id, label, &props));

    if let Some(var) = node.variable {
        ctx.bind(var, Binding::NewNode { id: id.clone() });
    }
    Ok(id)
}

/// Resolve one endpoint of a CREATE relationship to a concrete node id.
/// Endpoints carrying a label are created; bare references must resolve to
/// nodes created earlier in this query.
fn resolve_create_endpoint(
    node: &NodePattern<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<String, SqlGeneratorError> {
    if node.label.is_some() {
        return create_node(node, ctx, statements);
    }

    let var = node.variable.ok_or(SqlGeneratorError::Unsupported(
        "CREATE endpoints need a label or a bound variable",
    ))?;
    match ctx.lookup(var)? {
        Binding::NewNode { id } => Ok(id.clone()),
        Binding::Node { .. } => Err(SqlGeneratorError::Unsupported(
            "CREATE cannot link store-matched nodes in a single pass",
        )),
        _ => Err(SqlGeneratorError::Unsupported(
            "CREATE endpoints must be nodes",
        )),
    }
}

/// MERGE of a single labeled node: insert-if-absent keyed on the full
/// label + property set, then register the node as matched so later clauses
/// resolve it whether it was inserted or already present.
pub fn translate_merge(
    clause: &MergeClause<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<(), SqlGeneratorError> {
    let pattern = &clause.pattern;
    if !pattern.is_single_node() {
        return Err(SqlGeneratorError::Unsupported(
            "MERGE supports single node patterns",
        ));
    }
    let node = &pattern.start;
    let label = node.label.ok_or(SqlGeneratorError::Unsupported(
        "MERGE requires a label",
    ))?;

    let props = evaluate_properties(node.properties.as_ref(), ctx)?;

    let mut match_conds = vec!["json_extract(label, '$[0]') = ?".to_string()];
    let mut match_params = vec![SqlParam::Text(label.to_string())];
    for (key, value) in &props {
        let key_escaped = key.replace('\'', "''");
        match value {
            Value::Null => {
                match_conds.push(format!("json_extract(properties, '$.{key_escaped}') IS NULL"))
            }
            other => {
                match_conds.push(format!("json_extract(properties, '$.{key_escaped}') = ?"));
                match_params.push(SqlParam::from_json(other));
            }
        }
    }

    let mut params = vec![
        SqlParam::Text(new_uuid()),
        SqlParam::Text(Value::Array(vec![Value::String(label.to_string())]).to_string()),
        SqlParam::Text(Value::Object(props.clone()).to_string()),
    ];
    params.extend(match_params.clone());

    statements.push(Statement {
        sql: format!(
            "INSERT INTO nodes (id, label, properties) SELECT ?, json(?), json(?) \
             WHERE NOT EXISTS (SELECT 1 FROM nodes WHERE {})",
            match_conds.join(" AND ")
        ),
        params,
        kind: StatementKind::Execute,
    });

    // Register the merged node as a matched pattern for downstream clauses.
    let alias = ctx.add_node_source(false);
    ctx.conditions.push(Rendered {
        sql: format!("json_extract({alias}.label, '$[0]') = ?"),
        params: vec![SqlParam::Text(label.to_string())],
        ..Default::default()
    });
    for (key, value) in &props {
        let key_escaped = key.replace('\'', "''");
        match value {
            Value::Null => ctx.conditions.push(Rendered::plain(format!(
                "json_extract({alias}.properties, '$.{key_escaped}') IS NULL"
            ))),
            other => ctx.conditions.push(Rendered {
                sql: format!("json_extract({alias}.properties, '$.{key_escaped}') = ?"),
                params: vec![SqlParam::from_json(other)],
                ..Default::default()
            }),
        }
    }
    if let Some(var) = node.variable {
        ctx.bind(var, Binding::Node { alias });
    }

    Ok(())
}

pub fn translate_set(
    clause: &SetClause<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<(), SqlGeneratorError> {
    for item in &clause.items {
        let binding = ctx.lookup(item.target.base)?.clone();
        let key_escaped = item.target.key.replace('\'', "''");

        // Static values are validated against the property rules first.
        if let Ok(value) = static_value(&item.value, ctx) {
            crate::properties::validate_property_value(item.target.key, &value)?;
        }
        let value_frag = render_json_arg(&item.value, ctx)?;
        if value_frag.has_aggregate {
            return Err(SqlGeneratorError::MisplacedAggregate("SET".into()));
        }

        let (table, key_sql, key_params) = binding_key(&binding, ctx)?;
        let mut params = value_frag.params;
        params.extend(key_params);
        statements.push(Statement {
            sql: format!(
                "UPDATE {table} SET properties = json_set(properties, '$.{key_escaped}', {}) \
                 WHERE {key_sql}",
                value_frag.sql
            ),
            params,
            kind: StatementKind::Execute,
        });
    }
    Ok(())
}

/// The WHERE key addressing a bound variable's row(s).
fn binding_key(
    binding: &Binding,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(&'static str, String, Vec<SqlParam>), SqlGeneratorError> {
    Ok(match binding {
        Binding::NewNode { id } => (
            "nodes",
            "id = ?".to_string(),
            vec![SqlParam::Text(id.clone())],
        ),
        Binding::NewEdge { id, .. } => (
            "edges",
            "id = ?".to_string(),
            vec![SqlParam::Text(id.clone())],
        ),
        Binding::Node { alias } => {
            let sub = build_binding_id_select(alias, ctx)?;
            ("nodes", format!("id IN ({})", sub.sql), sub.params)
        }
        Binding::Edge { alias } => {
            let sub = build_binding_id_select(alias, ctx)?;
            ("edges", format!("id IN ({})", sub.sql), sub.params)
        }
        _ => {
            return Err(SqlGeneratorError::Unsupported(
                "SET and DELETE expect node or relationship variables",
            ))
        }
    })
}

pub fn translate_delete(
    clause: &DeleteClause<'_>,
    ctx: &mut TranslationCtx<'_>,
    statements: &mut Vec<Statement>,
) -> Result<(), SqlGeneratorError> {
    for var in &clause.items {
        let binding = ctx.lookup(var)?.clone();
        let (table, key_sql, key_params) = binding_key(&binding, ctx)?;

        if table == "edges" {
            statements.push(Statement {
                sql: format!("DELETE FROM edges WHERE {key_sql}"),
                params: key_params,
                kind: StatementKind::Execute,
            });
            continue;
        }

        // Node deletion. The id set key is reused across the statements.
        let id_set = match &binding {
            Binding::NewNode { id } => {
                // Key by the literal UUID.
                ("(?)".to_string(), vec![SqlParam::Text(id.clone())])
            }
            Binding::Node { .. } => {
                let inner = key_sql
                    .strip_prefix("id IN (")
                    .and_then(|s| s.strip_suffix(')'))
                    .unwrap_or(&key_sql)
                    .to_string();
                (format!("({inner})"), key_params.clone())
            }
            _ => unreachable!("binding_key only returns nodes for node bindings"),
        };

        if clause.detach {
            // Remove incident edges first so the node delete cannot trip
            // foreign keys.
            let mut params = id_set.1.clone();
            params.extend(id_set.1.clone());
            statements.push(Statement {
                sql: format!(
                    "DELETE FROM edges WHERE source_id IN {0} OR target_id IN {0}",
                    id_set.0
                ),
                params,
                kind: StatementKind::Execute,
            });
        } else {
            // Plain DELETE of a connected node must fail.
            let mut params = id_set.1.clone();
            params.extend(id_set.1.clone());
            statements.push(Statement {
                sql: format!(
                    "SELECT 1 FROM edges WHERE source_id IN {0} OR target_id IN {0} LIMIT 1",
                    id_set.0
                ),
                params,
                kind: StatementKind::GuardEmpty {
                    message: "Cannot delete a node that still has relationships; \
                              use DETACH DELETE",
                },
            });
        }

        statements.push(Statement {
            sql: format!("DELETE FROM nodes WHERE id IN {}", id_set.0),
            params: id_set.1,
            kind: StatementKind::Execute,
        });
    }
    Ok(())
}
