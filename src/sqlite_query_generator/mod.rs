//! Translator: compiled Cypher AST to an ordered list of parameterized
//! SQLite statements plus the return-column list.
//!
//! Statements are positional-parameter only; user input is never
//! interpolated into SQL text. The executor runs the list inside one
//! transaction; the statement flagged `Query` produces the logical result
//! rows, and `GuardEmpty` statements abort the transaction when they yield
//! any row.

pub mod context;
pub mod errors;
pub mod expression;
pub mod function_registry;
pub mod patterns;
pub mod select_builder;
pub mod variable_length_cte;
pub mod write_clauses;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::cypher_parser::ast::{CypherQuery, CypherStatement, Expression, WithClause};
use crate::properties::SqlParam;

use context::{Binding, PendingWith, TranslationCtx, UnwindSource};
use errors::SqlGeneratorError;
use expression::{render_expr, render_json_arg, Mode};

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Side-effecting statement; row output ignored.
    Execute,
    /// The statement whose rows become the query result.
    Query,
    /// Must return zero rows; otherwise the transaction aborts with the
    /// given message.
    GuardEmpty { message: &'static str },
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub kind: StatementKind,
}

/// Output column descriptor. `decode_json` marks columns whose cells carry
/// JSON text (property projections, node/edge objects, collected arrays);
/// only those are decoded by the result formatter. `hidden` columns are
/// synthetic projections the caller never sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnColumn {
    pub name: String,
    pub decode_json: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub statements: Vec<Statement>,
    pub return_columns: Option<Vec<ReturnColumn>>,
}

/// Compile a parsed statement against the given parameter map.
pub fn translate(
    statement: &CypherStatement<'_>,
    params: &Map<String, Value>,
    config: &EngineConfig,
) -> Result<Translation, SqlGeneratorError> {
    let (mut statements, select) = translate_query(&statement.query, params, config)?;

    if statement.unions.is_empty() {
        if let Some((rendered, columns)) = select {
            statements.push(Statement {
                sql: rendered.sql,
                params: rendered.params,
                kind: StatementKind::Query,
            });
            return Ok(Translation {
                statements,
                return_columns: Some(columns),
            });
        }
        return Ok(Translation {
            statements,
            return_columns: None,
        });
    }

    // UNION: every branch must be a pure read producing a single SELECT.
    if !statements.is_empty() {
        return Err(SqlGeneratorError::Unsupported(
            "UNION cannot combine write clauses",
        ));
    }
    let (mut sql, mut union_params, columns) = match select {
        Some((rendered, columns)) => (rendered.sql, rendered.params, columns),
        None => {
            return Err(SqlGeneratorError::Unsupported(
                "UNION requires RETURN on every branch",
            ))
        }
    };

    for union in &statement.unions {
        let (branch_statements, branch_select) =
            translate_query(&union.query, params, config)?;
        if !branch_statements.is_empty() {
            return Err(SqlGeneratorError::Unsupported(
                "UNION cannot combine write clauses",
            ));
        }
        let (rendered, branch_columns) = branch_select.ok_or(SqlGeneratorError::Unsupported(
            "UNION requires RETURN on every branch",
        ))?;
        if branch_columns.len() != columns.len() {
            return Err(SqlGeneratorError::Unsupported(
                "UNION branches must return the same number of columns",
            ));
        }
        if rendered.sql.starts_with("WITH RECURSIVE") {
            return Err(SqlGeneratorError::Unsupported(
                "variable-length paths are not supported inside UNION branches",
            ));
        }
        sql.push_str(if union.all { " UNION ALL " } else { " UNION " });
        sql.push_str(&rendered.sql);
        union_params.extend(rendered.params);
    }

    Ok(Translation {
        statements: vec![Statement {
            sql,
            params: union_params,
            kind: StatementKind::Query,
        }],
        return_columns: Some(columns),
    })
}

type QuerySelect = Option<(context::Rendered, Vec<ReturnColumn>)>;

fn translate_query(
    query: &CypherQuery<'_>,
    params: &Map<String, Value>,
    config: &EngineConfig,
) -> Result<(Vec<Statement>, QuerySelect), SqlGeneratorError> {
    let mut ctx = TranslationCtx::new(params, config);
    let mut statements = Vec::new();

    // UNWIND lists that depend on nothing bind first so MATCH patterns can
    // reference their elements; the rest resolve after pattern registration.
    let mut deferred_unwinds = Vec::new();
    for unwind in &query.unwind_clauses {
        match render_json_arg(&unwind.expression, &mut ctx) {
            Ok(list) => bind_unwind(unwind.alias, list, &mut ctx),
            Err(SqlGeneratorError::UnknownVariable(_)) => deferred_unwinds.push(unwind),
            Err(other) => return Err(other),
        }
    }

    for reading in &query.reading_clauses {
        patterns::register_reading_clause(reading, &mut ctx)?;
    }

    for unwind in deferred_unwinds {
        let list = render_json_arg(&unwind.expression, &mut ctx)?;
        bind_unwind(unwind.alias, list, &mut ctx);
    }

    if let Some(with) = &query.with_clause {
        process_with(with, &mut ctx)?;
    }

    for merge in &query.merge_clauses {
        write_clauses::translate_merge(merge, &mut ctx, &mut statements)?;
    }
    for create in &query.create_clauses {
        write_clauses::translate_create(create, &mut ctx, &mut statements)?;
    }
    if let Some(set) = &query.set_clause {
        write_clauses::translate_set(set, &mut ctx, &mut statements)?;
    }
    if let Some(delete) = &query.delete_clause {
        write_clauses::translate_delete(delete, &mut ctx, &mut statements)?;
    }

    let select = match &query.return_clause {
        Some(return_clause) => {
            let (rendered, columns) = select_builder::build_select(
                return_clause,
                query.order_by_clause.as_ref(),
                query.skip_clause.as_ref().map(|s| s.count),
                query.limit_clause.as_ref().map(|l| l.count),
                &mut ctx,
            )?;
            Some((rendered, columns))
        }
        None => None,
    };

    Ok((statements, select))
}

fn bind_unwind(alias_name: &str, list: context::Rendered, ctx: &mut TranslationCtx<'_>) {
    let alias = ctx.fresh_alias("uw");
    ctx.unwinds.push(UnwindSource {
        alias: alias.clone(),
        list,
    });
    ctx.bind(alias_name, Binding::Unwind { alias });
}

/// WITH: narrow the variable scope to the listed items and stash the
/// modifiers for the next RETURN.
fn process_with(
    with: &WithClause<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<(), SqlGeneratorError> {
    let mut new_bindings: Vec<(String, Binding)> = Vec::new();

    for item in &with.items {
        match (&item.expression, item.alias) {
            (Expression::Variable(var), alias) => {
                let binding = ctx.lookup(var)?.clone();
                let name = alias.unwrap_or(var);
                new_bindings.push((name.to_string(), binding));
            }
            (expr, Some(alias)) => {
                let value = render_expr(expr, ctx, Mode::Value)?;
                let projection = render_expr(expr, ctx, Mode::Projection)?;
                new_bindings.push((
                    alias.to_string(),
                    Binding::Projected { value, projection },
                ));
            }
            (_, None) => {
                return Err(SqlGeneratorError::Unsupported(
                    "WITH expressions must be aliased with AS",
                ))
            }
        }
    }

    // New logical scope: only the projected names survive.
    ctx.variables.clear();
    for (name, binding) in new_bindings {
        ctx.bind(&name, binding);
    }

    let mut pending = PendingWith {
        distinct: with.distinct,
        skip: with.skip.as_ref().map(|s| s.count),
        limit: with.limit.as_ref().map(|l| l.count),
        ..Default::default()
    };

    if let Some(order) = &with.order_by {
        for item in &order.items {
            let rendered = render_expr(&item.expression, ctx, Mode::Value)?;
            pending.order_by.push((rendered, item.order.as_sql()));
        }
    }

    if let Some(where_clause) = &with.where_clause {
        let rendered = render_expr(&where_clause.condition, ctx, Mode::Value)?;
        if rendered.has_aggregate {
            pending.having_cond = Some(rendered);
        } else {
            pending.where_cond = Some(rendered);
        }
    }

    ctx.pending_with = Some(pending);
    Ok(())
}
