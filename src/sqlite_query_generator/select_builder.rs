//! SELECT synthesis for RETURN clauses and for the id-subqueries that SET
//! and DELETE key their statements on.
//!
//! Join derivation follows pattern registration order: each relationship
//! adds its source to FROM when unseen, joins the edge according to the
//! relationship direction, and joins the target on the opposite endpoint.
//! A variable-length relationship splices in the recursive CTE instead of
//! an edges join.

use std::collections::HashSet;

use crate::cypher_parser::ast::{
    Direction, Expression, OrderByClause, ReturnClause,
};
use crate::properties::SqlParam;

use super::context::{Binding, Rendered, TranslationCtx};
use super::errors::SqlGeneratorError;
use super::expression::{render_expr, Mode};
use super::variable_length_cte::{VariableLengthCte, CTE_NAME};
use super::ReturnColumn;

/// FROM / JOIN / WHERE assembly shared by SELECT synthesis and id-subqueries.
struct Assembly {
    cte: Option<Rendered>,
    from_items: Vec<String>,
    joins: Vec<JoinSpec>,
    /// UNWIND expansions; trailing so they may reference any join alias.
    unwinds: Vec<JoinSpec>,
    where_conds: Vec<Rendered>,
}

struct JoinSpec {
    sql: String,
    params: Vec<SqlParam>,
}

fn build_assembly(ctx: &TranslationCtx<'_>) -> Result<Assembly, SqlGeneratorError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut from_items = Vec::new();
    let mut joins: Vec<JoinSpec> = Vec::new();
    let mut where_conds: Vec<Rendered> = Vec::new();
    let mut cte: Option<Rendered> = None;
    let mut used_optional_owners: HashSet<String> = HashSet::new();

    let optional_conds_for = |alias: &str| -> Vec<Rendered> {
        ctx.optional_conditions
            .get(alias)
            .cloned()
            .unwrap_or_default()
    };

    for rel in &ctx.relationships {
        // Source node.
        if !seen.contains(&rel.source_alias) {
            if rel.optional {
                let conds = optional_conds_for(&rel.source_alias);
                used_optional_owners.insert(rel.source_alias.clone());
                joins.push(join_nodes_on(&rel.source_alias, Vec::new(), conds, true));
            } else {
                from_items.push(format!("nodes AS {}", rel.source_alias));
            }
            seen.insert(rel.source_alias.clone());
        }

        if let Some(spec) = rel.var_length {
            // Spliced recursive CTE instead of a single edge join.
            let generator = VariableLengthCte::new(
                spec,
                rel.direction,
                rel.rel_type.clone(),
                ctx.config.default_max_hops,
            );
            let min_cond = Rendered::plain(format!(
                "{CTE_NAME}.depth >= {}",
                generator.min_hops()
            ));
            cte = Some(generator.render());

            let mut on_conds = vec![Rendered::plain(format!(
                "{CTE_NAME}.start_id = {}.id",
                rel.source_alias
            ))];
            if rel.optional {
                on_conds.push(min_cond);
            } else {
                where_conds.push(min_cond);
            }
            joins.push(join_spec(CTE_NAME, None, on_conds, rel.optional));

            // Target node keyed by the path end.
            let endpoint = Rendered::plain(format!(
                "{}.id = {CTE_NAME}.end_id",
                rel.target_alias
            ));
            place_target(
                &rel.target_alias,
                endpoint,
                rel.optional,
                &mut seen,
                &mut joins,
                &mut where_conds,
                &optional_conds_for,
                &mut used_optional_owners,
            );
            continue;
        }

        // Fixed-length edge join.
        let edge_on_base = match rel.direction {
            Direction::Outgoing => format!("{}.source_id = {}.id", rel.edge_alias, rel.source_alias),
            Direction::Incoming => format!("{}.target_id = {}.id", rel.edge_alias, rel.source_alias),
            Direction::Either => format!(
                "({e}.source_id = {s}.id OR {e}.target_id = {s}.id)",
                e = rel.edge_alias,
                s = rel.source_alias
            ),
        };
        let mut edge_on = vec![Rendered::plain(edge_on_base)];
        if rel.optional {
            edge_on.extend(optional_conds_for(&rel.edge_alias));
            used_optional_owners.insert(rel.edge_alias.clone());
        }
        joins.push(join_spec(
            "edges",
            Some(&rel.edge_alias),
            edge_on,
            rel.optional,
        ));

        let endpoint = match rel.direction {
            Direction::Outgoing => Rendered::plain(format!(
                "{}.id = {}.target_id",
                rel.target_alias, rel.edge_alias
            )),
            Direction::Incoming => Rendered::plain(format!(
                "{}.id = {}.source_id",
                rel.target_alias, rel.edge_alias
            )),
            Direction::Either => Rendered::plain(format!(
                "(({e}.source_id = {s}.id AND {t}.id = {e}.target_id) OR \
                 ({e}.target_id = {s}.id AND {t}.id = {e}.source_id))",
                e = rel.edge_alias,
                s = rel.source_alias,
                t = rel.target_alias
            )),
        };
        place_target(
            &rel.target_alias,
            endpoint,
            rel.optional,
            &mut seen,
            &mut joins,
            &mut where_conds,
            &optional_conds_for,
            &mut used_optional_owners,
        );
    }

    // Standalone nodes (no relationship touches them).
    for source in &ctx.node_sources {
        if seen.contains(&source.alias) {
            continue;
        }
        seen.insert(source.alias.clone());
        if source.optional {
            let conds = optional_conds_for(&source.alias);
            used_optional_owners.insert(source.alias.clone());
            if from_items.is_empty() && joins.is_empty() {
                return Err(SqlGeneratorError::Unsupported(
                    "OPTIONAL MATCH requires a preceding required match",
                ));
            }
            joins.push(join_nodes_on(&source.alias, Vec::new(), conds, true));
        } else {
            from_items.push(format!("nodes AS {}", source.alias));
        }
    }

    // UNWIND expansions: table-valued functions correlated with whatever
    // they reference, so they trail every other source.
    let mut unwinds = Vec::new();
    for unwind in &ctx.unwinds {
        unwinds.push(JoinSpec {
            sql: format!("json_each({}) AS {}", unwind.list.sql, unwind.alias),
            params: unwind.list.params.clone(),
        });
    }

    // Required conditions.
    where_conds.extend(ctx.conditions.iter().cloned());

    // Optional-clause WHERE: a failed match still yields its row.
    for (alias, cond) in &ctx.optional_where {
        where_conds.push(Rendered {
            sql: format!("({alias}.id IS NULL OR {})", cond.sql),
            params: cond.params.clone(),
            is_json: false,
            has_aggregate: cond.has_aggregate,
        });
    }

    // Safety net: optional predicates whose owner never joined.
    for (alias, conds) in &ctx.optional_conditions {
        if !used_optional_owners.contains(alias) {
            where_conds.extend(conds.iter().cloned());
        }
    }

    Ok(Assembly {
        cte,
        from_items,
        joins,
        unwinds,
        where_conds,
    })
}

fn join_spec(
    table: &str,
    alias: Option<&str>,
    on_conds: Vec<Rendered>,
    left: bool,
) -> JoinSpec {
    let mut params = Vec::new();
    let on_sql = if on_conds.is_empty() {
        "1 = 1".to_string()
    } else {
        let mut parts = Vec::with_capacity(on_conds.len());
        for cond in on_conds {
            parts.push(cond.sql);
            params.extend(cond.params);
        }
        parts.join(" AND ")
    };
    let join_kw = if left { "LEFT JOIN" } else { "JOIN" };
    let alias_sql = alias.map(|a| format!(" AS {a}")).unwrap_or_default();
    JoinSpec {
        sql: format!("{join_kw} {table}{alias_sql} ON {on_sql}"),
        params,
    }
}

fn join_nodes_on(
    alias: &str,
    mut base: Vec<Rendered>,
    extra: Vec<Rendered>,
    left: bool,
) -> JoinSpec {
    base.extend(extra);
    join_spec("nodes", Some(alias), base, left)
}

#[allow(clippy::too_many_arguments)]
fn place_target(
    target_alias: &str,
    endpoint: Rendered,
    optional: bool,
    seen: &mut HashSet<String>,
    joins: &mut Vec<JoinSpec>,
    where_conds: &mut Vec<Rendered>,
    optional_conds_for: &dyn Fn(&str) -> Vec<Rendered>,
    used_optional_owners: &mut HashSet<String>,
) {
    if seen.contains(target_alias) {
        // Cycle back to an already-placed node: just constrain the endpoint.
        if optional {
            // Attach to the last join (the edge / CTE join).
            if let Some(last) = joins.last_mut() {
                last.sql.push_str(&format!(" AND {}", endpoint.sql));
                last.params.extend(endpoint.params);
            }
        } else {
            where_conds.push(endpoint);
        }
        return;
    }
    seen.insert(target_alias.to_string());
    let extra = if optional {
        used_optional_owners.insert(target_alias.to_string());
        optional_conds_for(target_alias)
    } else {
        Vec::new()
    };
    joins.push(join_nodes_on(target_alias, vec![endpoint], extra, optional));
}

/// Collect variables bound to newly-created nodes/edges that a RETURN
/// references, so they can be re-read from the store in the final SELECT.
fn collect_variables<'a>(expr: &Expression<'a>, out: &mut Vec<&'a str>) {
    match expr {
        Expression::Variable(name) => out.push(name),
        Expression::PropertyAccess(access) => out.push(access.base),
        Expression::FunctionCall(call) => {
            for arg in &call.args {
                collect_variables(arg, out);
            }
        }
        Expression::Operator(op) => {
            for operand in &op.operands {
                collect_variables(operand, out);
            }
        }
        Expression::List(items) => {
            for item in items {
                collect_variables(item, out);
            }
        }
        Expression::Map(entries) => {
            for (_, value) in entries {
                collect_variables(value, out);
            }
        }
        Expression::Case(case) => {
            if let Some(subject) = &case.subject {
                collect_variables(subject, out);
            }
            for (when, then) in &case.when_then {
                collect_variables(when, out);
                collect_variables(then, out);
            }
            if let Some(else_expr) = &case.else_expr {
                collect_variables(else_expr, out);
            }
        }
        Expression::ListComprehension(lc) => {
            collect_variables(&lc.list, out);
        }
        _ => {}
    }
}

/// Rebind created nodes/edges referenced by RETURN to store reads keyed by
/// their fresh UUIDs, so `CREATE (n:X) RETURN n` reads the row back.
fn rebind_created_for_select(
    return_clause: &ReturnClause<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    let mut vars = Vec::new();
    for item in &return_clause.items {
        collect_variables(&item.expression, &mut vars);
    }

    for var in vars {
        let binding = match ctx.variables.get(var) {
            Some(b) => b.clone(),
            None => continue,
        };
        match binding {
            Binding::NewNode { id } => {
                let alias = ctx.add_node_source(false);
                ctx.conditions.push(Rendered {
                    sql: format!("{alias}.id = ?"),
                    params: vec![SqlParam::Text(id)],
                    ..Default::default()
                });
                ctx.bind(var, Binding::Node { alias });
            }
            Binding::NewEdge { id, .. } => {
                // Created edges are re-read through a standalone scan keyed
                // by the fresh UUID.
                let alias = ctx.fresh_alias("e");
                ctx.conditions.push(Rendered {
                    sql: format!("{alias}.id = ?"),
                    params: vec![SqlParam::Text(id)],
                    ..Default::default()
                });
                ctx.edge_scans.push(alias.clone());
                ctx.bind(var, Binding::Edge { alias });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build the final SELECT for a RETURN clause.
pub fn build_select(
    return_clause: &ReturnClause<'_>,
    order_by: Option<&OrderByClause<'_>>,
    skip: Option<i64>,
    limit: Option<i64>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(Rendered, Vec<ReturnColumn>), SqlGeneratorError> {
    rebind_created_for_select(return_clause, ctx)?;

    // Render projection items first: parameter binding follows SQL
    // production order (select list, then joins, then WHERE, then paging).
    let mut item_sql = Vec::new();
    let mut item_params = Vec::new();
    let mut columns = Vec::new();
    let mut plain_items: Vec<(String, Vec<SqlParam>)> = Vec::new();
    let mut any_aggregate = false;

    for item in &return_clause.items {
        let rendered = render_expr(&item.expression, ctx, Mode::Projection)?;
        let name = item.column_name();
        item_sql.push(format!("{} AS {}", rendered.sql, quote_column(name)));
        item_params.extend(rendered.params.clone());
        columns.push(ReturnColumn {
            name: name.to_string(),
            decode_json: rendered.is_json,
            hidden: false,
        });
        if rendered.has_aggregate {
            any_aggregate = true;
        } else {
            plain_items.push((rendered.sql, rendered.params));
        }
    }

    let assembly = build_assembly(ctx)?;

    let pending = ctx.pending_with.clone();
    let distinct = return_clause.distinct
        || pending.as_ref().map(|p| p.distinct).unwrap_or(false);

    let mut sql = String::new();
    let mut params = Vec::new();

    if let Some(cte) = &assembly.cte {
        sql.push_str(&cte.sql);
        sql.push(' ');
        params.extend(cte.params.clone());
    }

    sql.push_str("SELECT ");
    if distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&item_sql.join(", "));
    params.extend(item_params);

    push_from_joins(&assembly, ctx, &mut sql, &mut params);

    // WHERE: assembly conditions plus any pending WITH filter.
    let mut where_conds = assembly.where_conds;
    if let Some(p) = &pending {
        if let Some(cond) = &p.where_cond {
            where_conds.push(cond.clone());
        }
    }
    if !where_conds.is_empty() {
        sql.push_str(" WHERE ");
        let mut parts = Vec::with_capacity(where_conds.len());
        for cond in where_conds {
            parts.push(cond.sql);
            params.extend(cond.params);
        }
        sql.push_str(&parts.join(" AND "));
    }

    // GROUP BY when aggregates mix with plain columns, or a HAVING filter
    // carried over from WITH needs grouping.
    let having = pending.as_ref().and_then(|p| p.having_cond.clone());
    let needs_grouping =
        (any_aggregate && !plain_items.is_empty()) || (having.is_some() && !plain_items.is_empty());
    if needs_grouping {
        sql.push_str(" GROUP BY ");
        let mut parts = Vec::with_capacity(plain_items.len());
        for (expr_sql, expr_params) in &plain_items {
            parts.push(expr_sql.clone());
            params.extend(expr_params.clone());
        }
        sql.push_str(&parts.join(", "));
    }
    if let Some(cond) = having {
        sql.push_str(" HAVING ");
        sql.push_str(&cond.sql);
        params.extend(cond.params);
    }

    // ORDER BY: the query-level clause wins; otherwise WITH's stored order.
    let mut order_parts: Vec<(String, Vec<SqlParam>, &'static str)> = Vec::new();
    if let Some(order) = order_by {
        for item in &order.items {
            let rendered = render_order_expr(&item.expression, &columns, ctx)?;
            order_parts.push((rendered.sql, rendered.params, item.order.as_sql()));
        }
    } else if let Some(p) = &pending {
        for (rendered, dir) in &p.order_by {
            order_parts.push((rendered.sql.clone(), rendered.params.clone(), dir));
        }
    }
    if !order_parts.is_empty() {
        sql.push_str(" ORDER BY ");
        let mut parts = Vec::with_capacity(order_parts.len());
        for (expr_sql, expr_params, dir) in order_parts {
            parts.push(format!("{expr_sql} {dir}"));
            params.extend(expr_params);
        }
        sql.push_str(&parts.join(", "));
    }

    // SKIP / LIMIT, from the query or carried from WITH.
    let effective_skip = skip.or(pending.as_ref().and_then(|p| p.skip));
    let effective_limit = limit.or(pending.as_ref().and_then(|p| p.limit));
    match (effective_limit, effective_skip) {
        (Some(l), Some(s)) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlParam::Integer(l));
            params.push(SqlParam::Integer(s));
        }
        (Some(l), None) => {
            sql.push_str(" LIMIT ?");
            params.push(SqlParam::Integer(l));
        }
        (None, Some(s)) => {
            // SQLite needs a LIMIT to accept OFFSET; -1 means unlimited.
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(SqlParam::Integer(s));
        }
        (None, None) => {}
    }

    Ok((
        Rendered {
            sql,
            params,
            is_json: false,
            has_aggregate: any_aggregate,
        },
        columns,
    ))
}

fn push_from_joins(
    assembly: &Assembly,
    ctx: &TranslationCtx<'_>,
    sql: &mut String,
    params: &mut Vec<SqlParam>,
) {
    let mut from_items = assembly.from_items.clone();
    // Edge scans introduced by created-edge rebinding.
    for alias in &ctx.edge_scans {
        from_items.push(format!("edges AS {alias}"));
    }

    let mut unwinds = assembly.unwinds.iter();
    if from_items.is_empty() {
        // A pure UNWIND query: the first expansion is the FROM base.
        if let Some(first) = unwinds.next() {
            sql.push_str(" FROM ");
            sql.push_str(&first.sql);
            params.extend(first.params.clone());
        }
    } else {
        sql.push_str(" FROM ");
        sql.push_str(&from_items.join(", "));
    }
    for join in &assembly.joins {
        sql.push(' ');
        sql.push_str(&join.sql);
        params.extend(join.params.clone());
    }
    for unwind in unwinds {
        sql.push_str(" JOIN ");
        sql.push_str(&unwind.sql);
        params.extend(unwind.params.clone());
    }
}

fn render_order_expr(
    expr: &Expression<'_>,
    columns: &[ReturnColumn],
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    match render_expr(expr, ctx, Mode::Value) {
        Ok(rendered) => Ok(rendered),
        Err(SqlGeneratorError::UnknownVariable(name)) => {
            // Bare references to output column aliases are allowed.
            if columns.iter().any(|c| c.name == name) {
                Ok(Rendered::plain(quote_column(&name)))
            } else {
                Err(SqlGeneratorError::UnknownVariable(name))
            }
        }
        Err(e) => Err(e),
    }
}

pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SELECT alias.id FROM <registered patterns> WHERE <conditions>` - the
/// subquery SET and DELETE statements key on.
pub fn build_binding_id_select(
    alias: &str,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let assembly = build_assembly(ctx)?;

    let mut sql = String::new();
    let mut params = Vec::new();
    if let Some(cte) = &assembly.cte {
        sql.push_str(&cte.sql);
        sql.push(' ');
        params.extend(cte.params.clone());
    }
    sql.push_str(&format!("SELECT {alias}.id"));
    push_from_joins(&assembly, ctx, &mut sql, &mut params);
    if !assembly.where_conds.is_empty() {
        sql.push_str(" WHERE ");
        let mut parts = Vec::new();
        for cond in assembly.where_conds {
            parts.push(cond.sql);
            params.extend(cond.params);
        }
        sql.push_str(&parts.join(" AND "));
    }

    Ok(Rendered {
        sql,
        params,
        is_json: false,
        has_aggregate: false,
    })
}
