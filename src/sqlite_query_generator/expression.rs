//! Expression rendering: AST expressions to parameterized SQL fragments.
//!
//! Two modes matter. `Value` renders for comparisons and arithmetic, where
//! SQLite scalars are wanted (`json_extract` for properties, 0/1 for stored
//! booleans). `Projection` renders for output columns, where JSON text is
//! wanted so booleans, nulls and arrays survive the trip back out (`->`
//! extraction, `json_object` assemblies); such fragments are flagged
//! `is_json` and decoded by the result formatter.

use serde_json::Value;

use crate::cypher_parser::ast::{
    CaseExpression, Direction, Expression, FunctionCall, ListComprehension, Literal, Operator,
    OperatorApplication, PathPattern, PropertyAccess,
};
use crate::properties::SqlParam;

use super::context::{Binding, Rendered, TranslationCtx};
use super::errors::SqlGeneratorError;
use super::function_registry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Value,
    Projection,
}

pub fn render_expr(
    expr: &Expression<'_>,
    ctx: &mut TranslationCtx<'_>,
    mode: Mode,
) -> Result<Rendered, SqlGeneratorError> {
    match expr {
        Expression::Literal(lit) => Ok(render_literal(lit, mode)),
        Expression::Variable(name) => render_variable(name, ctx, mode),
        Expression::Parameter(name) => render_parameter(name, ctx, mode),
        Expression::List(items) => render_list(items, ctx),
        Expression::Map(entries) => render_map(entries, ctx),
        Expression::PropertyAccess(access) => render_property_access(access, ctx, mode),
        Expression::FunctionCall(call) => render_function_call(call, ctx, mode),
        Expression::Operator(op) => render_operator(op, ctx),
        Expression::Case(case) => render_case(case, ctx),
        Expression::ListComprehension(lc) => render_list_comprehension(lc, ctx),
        Expression::PatternExists(pattern) => render_exists(pattern, ctx),
    }
}

fn render_literal(lit: &Literal, mode: Mode) -> Rendered {
    match lit {
        Literal::Null => Rendered::plain("NULL"),
        Literal::Boolean(b) => match mode {
            // Comparisons see the stored 0/1 representation.
            Mode::Value => Rendered {
                sql: "?".into(),
                params: vec![SqlParam::Integer(if *b { 1 } else { 0 })],
                ..Default::default()
            },
            // Projections round-trip as JSON so the boolean survives.
            Mode::Projection => Rendered {
                sql: format!("json('{}')", if *b { "true" } else { "false" }),
                is_json: true,
                ..Default::default()
            },
        },
        Literal::Integer(i) => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Integer(*i)],
            ..Default::default()
        },
        Literal::Float(f) => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Real(*f)],
            ..Default::default()
        },
        Literal::String(s) => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Text(s.clone())],
            ..Default::default()
        },
    }
}

fn render_variable(
    name: &str,
    ctx: &mut TranslationCtx<'_>,
    mode: Mode,
) -> Result<Rendered, SqlGeneratorError> {
    let binding = ctx.lookup(name)?.clone();
    Ok(match binding {
        Binding::Node { alias } => match mode {
            Mode::Value => Rendered::plain(format!("{alias}.id")),
            Mode::Projection => Rendered {
                sql: node_object_sql(&alias),
                is_json: true,
                ..Default::default()
            },
        },
        Binding::Edge { alias } => match mode {
            Mode::Value => Rendered::plain(format!("{alias}.id")),
            Mode::Projection => Rendered {
                sql: edge_object_sql(&alias),
                is_json: true,
                ..Default::default()
            },
        },
        Binding::NewNode { id } | Binding::NewEdge { id, .. } => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Text(id)],
            ..Default::default()
        },
        Binding::Unwind { alias } => match mode {
            Mode::Value => Rendered::plain(format!("{alias}.value")),
            Mode::Projection => Rendered {
                sql: json_each_value_sql(&alias),
                is_json: true,
                ..Default::default()
            },
        },
        Binding::Projected { value, projection } => match mode {
            Mode::Value => value,
            Mode::Projection => projection,
        },
    })
}

/// Full node projection: id, labels and properties as one JSON object.
pub fn node_object_sql(alias: &str) -> String {
    format!(
        "json_object('id', {a}.id, 'labels', json({a}.label), 'properties', json({a}.properties))",
        a = alias
    )
}

/// Full edge projection.
pub fn edge_object_sql(alias: &str) -> String {
    format!(
        "json_object('id', {a}.id, 'type', {a}.type, 'source', {a}.source_id, \
         'target', {a}.target_id, 'properties', json({a}.properties))",
        a = alias
    )
}

/// JSON-text rendering of one json_each row value, preserving booleans and
/// structured elements.
pub fn json_each_value_sql(alias: &str) -> String {
    format!(
        "CASE WHEN {a}.type = 'true' THEN 'true' \
         WHEN {a}.type = 'false' THEN 'false' \
         WHEN {a}.type IN ('object', 'array') THEN {a}.value \
         ELSE json_quote({a}.value) END",
        a = alias
    )
}

fn render_parameter(
    name: &str,
    ctx: &mut TranslationCtx<'_>,
    mode: Mode,
) -> Result<Rendered, SqlGeneratorError> {
    let value = ctx.parameter(name)?.clone();
    Ok(render_json_value(&value, mode))
}

/// Bind a concrete JSON value, honoring the rendering mode.
pub fn render_json_value(value: &Value, mode: Mode) -> Rendered {
    match (mode, value) {
        (Mode::Projection, Value::Bool(_) | Value::Array(_) | Value::Object(_)) => Rendered {
            sql: "json(?)".into(),
            params: vec![SqlParam::Text(value.to_string())],
            is_json: true,
            ..Default::default()
        },
        (Mode::Value, Value::Array(_) | Value::Object(_)) => Rendered {
            // Structured values compare/travel as JSON text.
            sql: "?".into(),
            params: vec![SqlParam::Text(value.to_string())],
            ..Default::default()
        },
        _ => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::from_json(value)],
            ..Default::default()
        },
    }
}

fn render_list(
    items: &[Expression<'_>],
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let mut sql_parts = Vec::with_capacity(items.len());
    let mut params = Vec::new();
    let mut has_aggregate = false;
    for item in items {
        let arg = render_json_arg(item, ctx)?;
        sql_parts.push(arg.sql);
        params.extend(arg.params);
        has_aggregate |= arg.has_aggregate;
    }
    Ok(Rendered {
        sql: format!("json_array({})", sql_parts.join(", ")),
        params,
        is_json: true,
        has_aggregate,
    })
}

fn render_map(
    entries: &[(&str, Expression<'_>)],
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let mut sql_parts = Vec::new();
    let mut params = Vec::new();
    for (key, value) in entries {
        let arg = render_json_arg(value, ctx)?;
        sql_parts.push(format!("'{}', {}", escape_single_quotes(key), arg.sql));
        params.extend(arg.params);
    }
    Ok(Rendered {
        sql: format!("json_object({})", sql_parts.join(", ")),
        params,
        is_json: true,
        has_aggregate: false,
    })
}

fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

fn render_property_access(
    access: &PropertyAccess<'_>,
    ctx: &mut TranslationCtx<'_>,
    mode: Mode,
) -> Result<Rendered, SqlGeneratorError> {
    let binding = ctx.lookup(access.base)?.clone();
    let key_path = format!("'$.{}'", escape_single_quotes(access.key));
    Ok(match binding {
        Binding::Node { alias } | Binding::Edge { alias } => match mode {
            Mode::Value => Rendered::plain(format!(
                "json_extract({alias}.properties, {key_path})"
            )),
            Mode::Projection => Rendered {
                sql: format!("{alias}.properties -> {key_path}"),
                is_json: true,
                ..Default::default()
            },
        },
        Binding::Unwind { alias } => match mode {
            Mode::Value => Rendered::plain(format!("json_extract({alias}.value, {key_path})")),
            Mode::Projection => Rendered {
                sql: format!("({alias}.value) -> {key_path}"),
                is_json: true,
                ..Default::default()
            },
        },
        Binding::Projected { projection, .. } if projection.is_json => {
            let mut out = projection.clone();
            match mode {
                Mode::Value => {
                    out.sql = format!("json_extract({}, {key_path})", projection.sql);
                    out.is_json = false;
                }
                Mode::Projection => {
                    out.sql = format!("({}) -> {key_path}", projection.sql);
                    out.is_json = true;
                }
            }
            out
        }
        _ => {
            return Err(SqlGeneratorError::Unsupported(
                "property access on a binding without stored properties",
            ))
        }
    })
}

fn render_function_call(
    call: &FunctionCall<'_>,
    ctx: &mut TranslationCtx<'_>,
    mode: Mode,
) -> Result<Rendered, SqlGeneratorError> {
    let name_lower = call.name.to_ascii_lowercase();

    // count(*) needs no argument rendering.
    if call.star {
        if name_lower != "count" {
            return Err(SqlGeneratorError::WrongArgumentCount {
                function: call.name.to_string(),
                expected: "an expression, not *".into(),
            });
        }
        return Ok(Rendered {
            sql: "count(*)".into(),
            has_aggregate: true,
            ..Default::default()
        });
    }

    // id() / type() read the binding directly.
    if name_lower == "id" {
        return render_id_function(call, ctx);
    }
    if name_lower == "type" {
        return render_type_function(call, ctx);
    }

    let entry = function_registry::lookup(&name_lower)
        .ok_or_else(|| SqlGeneratorError::UnknownFunction(call.name.to_string()))?;
    if call.args.len() < entry.min_args || call.args.len() > entry.max_args {
        let expected = if entry.min_args == entry.max_args {
            entry.min_args.to_string()
        } else {
            format!("{} to {}", entry.min_args, entry.max_args)
        };
        return Err(SqlGeneratorError::WrongArgumentCount {
            function: call.name.to_string(),
            expected,
        });
    }

    // collect() aggregates JSON-shaped elements.
    if name_lower == "collect" {
        let arg = render_json_arg(&call.args[0], ctx)?;
        return Ok(Rendered {
            sql: format!("json_group_array({})", arg.sql),
            params: arg.params,
            is_json: true,
            has_aggregate: true,
        });
    }

    let mut arg_sql = Vec::with_capacity(call.args.len());
    let mut params = Vec::new();
    let mut args_aggregate = false;
    for arg in &call.args {
        let rendered = render_expr(arg, ctx, Mode::Value)?;
        arg_sql.push(rendered.sql);
        params.extend(rendered.params);
        args_aggregate |= rendered.has_aggregate;
    }
    if entry.aggregate && args_aggregate {
        return Err(SqlGeneratorError::MisplacedAggregate(call.name.to_string()));
    }

    let mut sql = (entry.render)(&arg_sql);
    let mut is_json = entry.returns_json;
    if entry.returns_json && mode == Mode::Value {
        // Unwrap the JSON text back to an SQL scalar for comparisons.
        sql = format!("json_extract({sql}, '$')");
        is_json = false;
    }

    Ok(Rendered {
        sql,
        params,
        is_json,
        has_aggregate: entry.aggregate || args_aggregate,
    })
}

fn render_id_function(
    call: &FunctionCall<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let var = single_variable_arg(call)?;
    let binding = ctx.lookup(var)?.clone();
    Ok(match binding {
        Binding::Node { alias } | Binding::Edge { alias } => {
            Rendered::plain(format!("{alias}.id"))
        }
        Binding::NewNode { id } | Binding::NewEdge { id, .. } => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Text(id)],
            ..Default::default()
        },
        _ => {
            return Err(SqlGeneratorError::Unsupported(
                "id() expects a node or relationship variable",
            ))
        }
    })
}

fn render_type_function(
    call: &FunctionCall<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let var = single_variable_arg(call)?;
    let binding = ctx.lookup(var)?.clone();
    Ok(match binding {
        Binding::Edge { alias } => Rendered::plain(format!("{alias}.type")),
        Binding::NewEdge { rel_type, .. } => Rendered {
            sql: "?".into(),
            params: vec![SqlParam::Text(rel_type)],
            ..Default::default()
        },
        _ => {
            return Err(SqlGeneratorError::Unsupported(
                "type() expects a relationship variable",
            ))
        }
    })
}

fn single_variable_arg<'a>(call: &FunctionCall<'a>) -> Result<&'a str, SqlGeneratorError> {
    match call.args.as_slice() {
        [Expression::Variable(name)] => Ok(name),
        _ => Err(SqlGeneratorError::WrongArgumentCount {
            function: call.name.to_string(),
            expected: "1 variable".into(),
        }),
    }
}

fn render_operator(
    op: &OperatorApplication<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    use Operator::*;

    match op.operator {
        And | Or => {
            let symbol = if op.operator == And { "AND" } else { "OR" };
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            Ok(combine(
                format!("({} {symbol} {})", left.sql, right.sql),
                vec![left, right],
            ))
        }
        Not => {
            let inner = render_expr(&op.operands[0], ctx, Mode::Value)?;
            Ok(combine(format!("NOT ({})", inner.sql), vec![inner]))
        }
        IsNull => {
            let inner = render_expr(&op.operands[0], ctx, Mode::Value)?;
            Ok(combine(format!("({} IS NULL)", inner.sql), vec![inner]))
        }
        IsNotNull => {
            let inner = render_expr(&op.operands[0], ctx, Mode::Value)?;
            Ok(combine(format!("({} IS NOT NULL)", inner.sql), vec![inner]))
        }
        In => render_in_operator(op, ctx),
        StartsWith => {
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            // substr comparison avoids LIKE wildcard injection.
            let sql = format!(
                "(substr({l}, 1, length({r})) = {r})",
                l = left.sql,
                r = right.sql
            );
            let mut params = left.params.clone();
            params.extend(right.params.clone());
            params.extend(right.params);
            Ok(Rendered {
                sql,
                params,
                is_json: false,
                has_aggregate: left.has_aggregate,
            })
        }
        EndsWith => {
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            let sql = format!(
                "(substr({l}, -length({r})) = {r})",
                l = left.sql,
                r = right.sql
            );
            let mut params = left.params.clone();
            params.extend(right.params.clone());
            params.extend(right.params);
            Ok(Rendered {
                sql,
                params,
                is_json: false,
                has_aggregate: left.has_aggregate,
            })
        }
        Contains => {
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            Ok(combine(
                format!("(instr({}, {}) > 0)", left.sql, right.sql),
                vec![left, right],
            ))
        }
        Addition => {
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            // String concatenation uses ||, keyed off literal operands.
            let symbol = if contains_string_literal(&op.operands[0])
                || contains_string_literal(&op.operands[1])
            {
                "||"
            } else {
                "+"
            };
            Ok(combine(
                format!("({} {symbol} {})", left.sql, right.sql),
                vec![left, right],
            ))
        }
        Subtraction | Multiplication | Division | Modulo => {
            let symbol = match op.operator {
                Subtraction => "-",
                Multiplication => "*",
                Division => "/",
                _ => "%",
            };
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            Ok(combine(
                format!("({} {symbol} {})", left.sql, right.sql),
                vec![left, right],
            ))
        }
        Equal | NotEqual | LessThan | GreaterThan | LessThanEqual | GreaterThanEqual => {
            let symbol = match op.operator {
                Equal => "=",
                NotEqual => "!=",
                LessThan => "<",
                GreaterThan => ">",
                LessThanEqual => "<=",
                _ => ">=",
            };
            let left = render_expr(&op.operands[0], ctx, Mode::Value)?;
            let right = render_expr(&op.operands[1], ctx, Mode::Value)?;
            Ok(combine(
                format!("({} {symbol} {})", left.sql, right.sql),
                vec![left, right],
            ))
        }
    }
}

fn combine(sql: String, parts: Vec<Rendered>) -> Rendered {
    let mut params = Vec::new();
    let mut has_aggregate = false;
    for part in parts {
        params.extend(part.params);
        has_aggregate |= part.has_aggregate;
    }
    Rendered {
        sql,
        params,
        is_json: false,
        has_aggregate,
    }
}

fn contains_string_literal(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::Literal(Literal::String(_)) => true,
        Expression::Operator(op) if op.operator == Operator::Addition => {
            op.operands.iter().any(contains_string_literal)
        }
        _ => false,
    }
}

fn render_in_operator(
    op: &OperatorApplication<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let needle = render_expr(&op.operands[0], ctx, Mode::Value)?;

    match &op.operands[1] {
        // Literal list: positional placeholders.
        Expression::List(items) => {
            let mut sql_parts = Vec::with_capacity(items.len());
            let mut params = needle.params.clone();
            for item in items {
                let rendered = render_expr(item, ctx, Mode::Value)?;
                sql_parts.push(rendered.sql);
                params.extend(rendered.params);
            }
            Ok(Rendered {
                sql: format!("({} IN ({}))", needle.sql, sql_parts.join(", ")),
                params,
                is_json: false,
                has_aggregate: needle.has_aggregate,
            })
        }
        // Anything list-valued: expand through json_each.
        other => {
            let list = render_json_arg(other, ctx)?;
            let mut params = needle.params.clone();
            params.extend(list.params);
            Ok(Rendered {
                sql: format!(
                    "({} IN (SELECT value FROM json_each({})))",
                    needle.sql, list.sql
                ),
                params,
                is_json: false,
                has_aggregate: needle.has_aggregate,
            })
        }
    }
}

fn render_case(
    case: &CaseExpression<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let mut sql = String::from("CASE");
    let mut params = Vec::new();
    let mut has_aggregate = false;

    if let Some(subject) = &case.subject {
        let rendered = render_expr(subject, ctx, Mode::Value)?;
        sql.push(' ');
        sql.push_str(&rendered.sql);
        params.extend(rendered.params);
        has_aggregate |= rendered.has_aggregate;
    }

    for (when, then) in &case.when_then {
        let when_r = render_expr(when, ctx, Mode::Value)?;
        let then_r = render_expr(then, ctx, Mode::Value)?;
        sql.push_str(&format!(" WHEN {} THEN {}", when_r.sql, then_r.sql));
        params.extend(when_r.params);
        params.extend(then_r.params);
        has_aggregate |= when_r.has_aggregate || then_r.has_aggregate;
    }

    if let Some(else_expr) = &case.else_expr {
        let rendered = render_expr(else_expr, ctx, Mode::Value)?;
        sql.push_str(&format!(" ELSE {}", rendered.sql));
        params.extend(rendered.params);
        has_aggregate |= rendered.has_aggregate;
    }

    sql.push_str(" END");
    Ok(Rendered {
        sql,
        params,
        is_json: false,
        has_aggregate,
    })
}

fn render_list_comprehension(
    lc: &ListComprehension<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    let list = render_json_arg(&lc.list, ctx)?;
    let alias = ctx.fresh_alias("lc");

    // Scope the element variable over filter and projection.
    let saved = ctx.variables.get(lc.variable).cloned();
    ctx.bind(
        lc.variable,
        Binding::Unwind {
            alias: alias.clone(),
        },
    );

    let result = (|| {
        // Parameters follow SQL production order: the projection renders
        // ahead of the list in the subquery text, the filter after it.
        let projection = match &lc.projection {
            Some(projection) => render_json_arg(projection, ctx)?,
            None => Rendered {
                sql: format!("json({})", json_each_value_sql(&alias)),
                is_json: true,
                ..Default::default()
            },
        };
        let mut params = projection.params.clone();

        let mut sql = format!(
            "(SELECT json_group_array({}) FROM json_each({}) AS {alias}",
            projection.sql, list.sql
        );
        params.extend(list.params.clone());
        if let Some(filter) = &lc.filter {
            let rendered = render_expr(filter, ctx, Mode::Value)?;
            sql.push_str(&format!(" WHERE {}", rendered.sql));
            params.extend(rendered.params);
        }
        sql.push(')');

        Ok(Rendered {
            sql,
            params,
            is_json: true,
            has_aggregate: false,
        })
    })();

    // Restore the outer binding.
    match saved {
        Some(binding) => ctx.bind(lc.variable, binding),
        None => {
            ctx.variables.remove(lc.variable);
        }
    }

    result
}

/// Render an expression as a JSON-typed fragment suitable inside
/// `json_array`, `json_object`, `json_set` and `json_group_array`.
/// Scalar strings and numbers stay plain SQL values (stored as the matching
/// JSON scalar); booleans and structured values are JSON-wrapped.
pub fn render_json_arg(
    expr: &Expression<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    match expr {
        Expression::Literal(Literal::Boolean(b)) => Ok(Rendered {
            sql: format!("json('{}')", if *b { "true" } else { "false" }),
            is_json: true,
            ..Default::default()
        }),
        Expression::Literal(_) => Ok(render_expr(expr, ctx, Mode::Value)?),
        Expression::Parameter(name) => {
            let value = ctx.parameter(name)?.clone();
            Ok(match &value {
                Value::Bool(_) | Value::Array(_) | Value::Object(_) => Rendered {
                    sql: "json(?)".into(),
                    params: vec![SqlParam::Text(value.to_string())],
                    is_json: true,
                    ..Default::default()
                },
                _ => Rendered {
                    sql: "?".into(),
                    params: vec![SqlParam::from_json(&value)],
                    ..Default::default()
                },
            })
        }
        Expression::List(_) | Expression::Map(_) => render_expr(expr, ctx, Mode::Value),
        _ => {
            let rendered = render_expr(expr, ctx, Mode::Projection)?;
            if rendered.is_json {
                Ok(Rendered {
                    sql: format!("json({})", rendered.sql),
                    params: rendered.params,
                    is_json: true,
                    has_aggregate: rendered.has_aggregate,
                })
            } else {
                Ok(rendered)
            }
        }
    }
}

/// EXISTS((a)-[:T]->(b)) as a correlated subquery over the edges table.
fn render_exists(
    pattern: &PathPattern<'_>,
    ctx: &mut TranslationCtx<'_>,
) -> Result<Rendered, SqlGeneratorError> {
    if pattern.segments.len() != 1 {
        return Err(SqlGeneratorError::Unsupported(
            "EXISTS supports single-relationship patterns",
        ));
    }
    let segment = &pattern.segments[0];
    if segment.relationship.var_length.is_some() {
        return Err(SqlGeneratorError::Unsupported(
            "EXISTS does not support variable-length relationships",
        ));
    }

    let edge_alias = ctx.fresh_alias("xe");
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(rel_type) = segment.relationship.rel_type {
        conditions.push(format!("{edge_alias}.type = ?"));
        params.push(SqlParam::Text(rel_type.to_string()));
    }

    let start = endpoint_condition(&pattern.start, ctx, &mut params)?;
    let end = endpoint_condition(&segment.node, ctx, &mut params)?;

    let orientation = |src: &str, tgt: &str| {
        let mut parts = Vec::new();
        if let Some(s) = &start {
            parts.push(s.replace("{col}", src));
        }
        if let Some(e) = &end {
            parts.push(e.replace("{col}", tgt));
        }
        parts
    };

    match segment.relationship.direction {
        Direction::Outgoing => {
            conditions.extend(orientation(
                &format!("{edge_alias}.source_id"),
                &format!("{edge_alias}.target_id"),
            ));
        }
        Direction::Incoming => {
            conditions.extend(orientation(
                &format!("{edge_alias}.target_id"),
                &format!("{edge_alias}.source_id"),
            ));
        }
        Direction::Either => {
            // Both orientations; endpoint parameters double up.
            let forward = orientation(
                &format!("{edge_alias}.source_id"),
                &format!("{edge_alias}.target_id"),
            )
            .join(" AND ");
            let backward = orientation(
                &format!("{edge_alias}.target_id"),
                &format!("{edge_alias}.source_id"),
            )
            .join(" AND ");
            let doubled: Vec<SqlParam> = params
                .iter()
                .skip(if segment.relationship.rel_type.is_some() { 1 } else { 0 })
                .cloned()
                .collect();
            params.extend(doubled);
            if !forward.is_empty() {
                conditions.push(format!("(({forward}) OR ({backward}))"));
            }
        }
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    Ok(Rendered {
        sql: format!("EXISTS (SELECT 1 FROM edges AS {edge_alias}{where_sql})"),
        params,
        is_json: false,
        has_aggregate: false,
    })
}

/// Condition template for one EXISTS endpoint; `{col}` is substituted with
/// the edge column for the orientation being rendered.
fn endpoint_condition(
    node: &crate::cypher_parser::ast::NodePattern<'_>,
    ctx: &mut TranslationCtx<'_>,
    params: &mut Vec<SqlParam>,
) -> Result<Option<String>, SqlGeneratorError> {
    // Bound variable: correlate with the outer query.
    if let Some(var) = node.variable {
        if let Ok(binding) = ctx.lookup(var) {
            return match binding {
                Binding::Node { alias } => Ok(Some(format!("{{col}} = {alias}.id"))),
                Binding::NewNode { id } => {
                    params.push(SqlParam::Text(id.clone()));
                    Ok(Some("{col} = ?".to_string()))
                }
                _ => Err(SqlGeneratorError::Unsupported(
                    "EXISTS endpoints must be nodes",
                )),
            };
        }
    }

    // Unbound endpoint: label / property membership test.
    let mut inner = Vec::new();
    if let Some(label) = node.label {
        inner.push("json_extract(label, '$[0]') = ?".to_string());
        params.push(SqlParam::Text(label.to_string()));
    }
    if let Some(props) = &node.properties {
        for entry in props {
            match static_value(&entry.value, ctx)? {
                Value::Null => inner.push(format!(
                    "json_extract(properties, '$.{}') IS NULL",
                    escape_single_quotes(entry.key)
                )),
                value => {
                    inner.push(format!(
                        "json_extract(properties, '$.{}') = ?",
                        escape_single_quotes(entry.key)
                    ));
                    params.push(SqlParam::from_json(&value));
                }
            }
        }
    }

    if inner.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "{{col}} IN (SELECT id FROM nodes WHERE {})",
        inner.join(" AND ")
    )))
}

/// Evaluate an expression to a concrete JSON value; literals and parameter
/// references only (inline pattern properties, CREATE data).
pub fn static_value(
    expr: &Expression<'_>,
    ctx: &TranslationCtx<'_>,
) -> Result<Value, SqlGeneratorError> {
    match expr {
        Expression::Literal(Literal::Null) => Ok(Value::Null),
        Expression::Literal(Literal::Boolean(b)) => Ok(Value::Bool(*b)),
        Expression::Literal(Literal::Integer(i)) => Ok(Value::from(*i)),
        Expression::Literal(Literal::Float(f)) => Ok(serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        Expression::Literal(Literal::String(s)) => Ok(Value::String(s.clone())),
        Expression::Parameter(name) => Ok(ctx.parameter(name)?.clone()),
        Expression::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(static_value(item, ctx)?);
            }
            Ok(Value::Array(values))
        }
        _ => Err(SqlGeneratorError::Unsupported(
            "only literals and parameters are allowed in inline properties",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::Map;

    fn ctx_with<'a>(
        params: &'a Map<String, Value>,
        config: &'a EngineConfig,
    ) -> TranslationCtx<'a> {
        TranslationCtx::new(params, config)
    }

    fn parse_expr(text: &str) -> Expression<'_> {
        let (rest, expr) =
            crate::cypher_parser::expression::parse_expression(text).expect("parse");
        assert_eq!(rest.trim(), "");
        expr
    }

    #[test]
    fn test_property_value_vs_projection() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });

        let expr = parse_expr("n.name");
        let value = render_expr(&expr, &mut ctx, Mode::Value).expect("value");
        assert_eq!(value.sql, "json_extract(n0.properties, '$.name')");
        assert!(!value.is_json);

        let proj = render_expr(&expr, &mut ctx, Mode::Projection).expect("proj");
        assert_eq!(proj.sql, "n0.properties -> '$.name'");
        assert!(proj.is_json);
    }

    #[test]
    fn test_boolean_literal_value_binds_as_integer() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });

        let expr = parse_expr("n.active = true");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert!(rendered.sql.contains("= ?"));
        assert_eq!(rendered.params, vec![SqlParam::Integer(1)]);
    }

    #[test]
    fn test_comparison_params_in_order() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });

        let expr = parse_expr("n.age > 25 AND n.name = 'Bob'");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert_eq!(
            rendered.params,
            vec![SqlParam::Integer(25), SqlParam::Text("Bob".into())]
        );
    }

    #[test]
    fn test_missing_parameter_errors() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        let expr = parse_expr("$nope");
        assert!(matches!(
            render_expr(&expr, &mut ctx, Mode::Value),
            Err(SqlGeneratorError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_unknown_variable_errors() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        let expr = parse_expr("ghost.x");
        assert!(matches!(
            render_expr(&expr, &mut ctx, Mode::Value),
            Err(SqlGeneratorError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unknown_function_errors() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        let expr = parse_expr("frobnicate(1)");
        assert!(matches!(
            render_expr(&expr, &mut ctx, Mode::Value),
            Err(SqlGeneratorError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_count_star() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        let expr = parse_expr("count(*)");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert_eq!(rendered.sql, "count(*)");
        assert!(rendered.has_aggregate);
    }

    #[test]
    fn test_collect_node_property() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("collect(n.name)");
        let rendered = render_expr(&expr, &mut ctx, Mode::Projection).expect("render");
        assert!(rendered.sql.starts_with("json_group_array("));
        assert!(rendered.is_json);
        assert!(rendered.has_aggregate);
    }

    #[test]
    fn test_in_literal_list() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("n.status IN ['a', 'b']");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert!(rendered.sql.contains("IN (?, ?)"));
        assert_eq!(rendered.params.len(), 2);
    }

    #[test]
    fn test_in_parameter_uses_json_each() {
        let mut params = Map::new();
        params.insert("ids".into(), serde_json::json!([1, 2, 3]));
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("n.num IN $ids");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert!(rendered.sql.contains("json_each"));
        assert_eq!(rendered.params.len(), 2);
    }

    #[test]
    fn test_id_function() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("id(n)");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert_eq!(rendered.sql, "n0.id");
    }

    #[test]
    fn test_exists_subquery() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("a", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("EXISTS((a)-[:KNOWS]->(b:Person))");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert!(rendered.sql.starts_with("EXISTS (SELECT 1 FROM edges"));
        assert!(rendered.sql.contains("source_id = n0.id"));
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Text("KNOWS".into()),
                SqlParam::Text("Person".into())
            ]
        );
    }

    #[test]
    fn test_list_comprehension() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("[x IN n.tags WHERE x <> 'spam' | x]");
        let rendered = render_expr(&expr, &mut ctx, Mode::Projection).expect("render");
        assert!(rendered.sql.contains("json_group_array"));
        assert!(rendered.sql.contains("json_each"));
        assert!(rendered.is_json);
    }

    #[test]
    fn test_list_comprehension_param_order() {
        let mut params = Map::new();
        params.insert("nums".into(), serde_json::json!([1, 2, 3]));
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        let expr = parse_expr("[x IN $nums WHERE x > 1 | x * 10]");
        let rendered = render_expr(&expr, &mut ctx, Mode::Projection).expect("render");
        // Projection placeholders precede the list's, which precede the
        // filter's, matching their order in the subquery text.
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Integer(10),
                SqlParam::Text("[1,2,3]".into()),
                SqlParam::Integer(1),
            ]
        );
    }

    #[test]
    fn test_string_concat_uses_pipes() {
        let params = Map::new();
        let config = EngineConfig::default();
        let mut ctx = ctx_with(&params, &config);
        ctx.bind("n", Binding::Node { alias: "n0".into() });
        let expr = parse_expr("n.first + ' ' + n.last");
        let rendered = render_expr(&expr, &mut ctx, Mode::Value).expect("render");
        assert!(rendered.sql.contains("||"));
    }
}
