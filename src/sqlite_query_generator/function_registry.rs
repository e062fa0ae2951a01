//! Cypher-to-SQLite function registry.
//!
//! Maps Cypher function names (lowercase) to SQLite renderings. Each entry
//! checks arity, says whether the rendering yields JSON text (so projections
//! of it are tagged for decoding) and whether it aggregates.

use std::collections::HashMap;

/// Registry entry for one Cypher function.
#[derive(Clone)]
pub struct SqlFunction {
    pub cypher_name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub aggregate: bool,
    /// The rendering produces JSON text rather than an SQL scalar.
    pub returns_json: bool,
    /// Build the SQL from already-rendered argument SQL.
    pub render: fn(&[String]) -> String,
}

pub fn lookup(cypher_fn: &str) -> Option<&'static SqlFunction> {
    FUNCTIONS.get(cypher_fn.to_ascii_lowercase().as_str())
}

macro_rules! sql_fn {
    ($map:ident, $cypher:literal, $min:literal..=$max:literal, agg: $agg:literal, json: $json:literal, $render:expr) => {
        $map.insert(
            $cypher,
            SqlFunction {
                cypher_name: $cypher,
                min_args: $min,
                max_args: $max,
                aggregate: $agg,
                returns_json: $json,
                render: $render,
            },
        );
    };
}

lazy_static::lazy_static! {
    static ref FUNCTIONS: HashMap<&'static str, SqlFunction> = {
        let mut m = HashMap::new();

        // ===== AGGREGATES =====
        sql_fn!(m, "count", 1..=1, agg: true, json: false, |a| format!("count({})", a[0]));
        sql_fn!(m, "sum", 1..=1, agg: true, json: false, |a| format!("sum({})", a[0]));
        sql_fn!(m, "avg", 1..=1, agg: true, json: false, |a| format!("avg({})", a[0]));
        sql_fn!(m, "min", 1..=1, agg: true, json: false, |a| format!("min({})", a[0]));
        sql_fn!(m, "max", 1..=1, agg: true, json: false, |a| format!("max({})", a[0]));
        // collect() aggregates its argument into a JSON array. The argument
        // arrives in JSON form (see expression rendering).
        sql_fn!(m, "collect", 1..=1, agg: true, json: true, |a| {
            format!("json_group_array(json({}))", a[0])
        });

        // ===== NUMERIC =====
        sql_fn!(m, "abs", 1..=1, agg: false, json: false, |a| format!("abs({})", a[0]));
        sql_fn!(m, "ceil", 1..=1, agg: false, json: false, |a| format!("ceil({})", a[0]));
        sql_fn!(m, "floor", 1..=1, agg: false, json: false, |a| format!("floor({})", a[0]));
        sql_fn!(m, "round", 1..=1, agg: false, json: false, |a| format!("round({})", a[0]));
        sql_fn!(m, "sign", 1..=1, agg: false, json: false, |a| format!("sign({})", a[0]));
        sql_fn!(m, "sqrt", 1..=1, agg: false, json: false, |a| format!("sqrt({})", a[0]));
        sql_fn!(m, "exp", 1..=1, agg: false, json: false, |a| format!("exp({})", a[0]));
        // Cypher log() is the natural logarithm; SQLite spells that ln().
        sql_fn!(m, "log", 1..=1, agg: false, json: false, |a| format!("ln({})", a[0]));
        sql_fn!(m, "log10", 1..=1, agg: false, json: false, |a| format!("log10({})", a[0]));

        // ===== CONVERSIONS =====
        sql_fn!(m, "tointeger", 1..=1, agg: false, json: false, |a| {
            format!("CAST({} AS INTEGER)", a[0])
        });
        sql_fn!(m, "tofloat", 1..=1, agg: false, json: false, |a| {
            format!("CAST({} AS REAL)", a[0])
        });
        sql_fn!(m, "tostring", 1..=1, agg: false, json: false, |a| {
            format!("CAST({} AS TEXT)", a[0])
        });

        // ===== STRINGS =====
        sql_fn!(m, "tolower", 1..=1, agg: false, json: false, |a| format!("lower({})", a[0]));
        sql_fn!(m, "toupper", 1..=1, agg: false, json: false, |a| format!("upper({})", a[0]));
        sql_fn!(m, "trim", 1..=1, agg: false, json: false, |a| format!("trim({})", a[0]));
        sql_fn!(m, "ltrim", 1..=1, agg: false, json: false, |a| format!("ltrim({})", a[0]));
        sql_fn!(m, "rtrim", 1..=1, agg: false, json: false, |a| format!("rtrim({})", a[0]));
        sql_fn!(m, "replace", 3..=3, agg: false, json: false, |a| {
            format!("replace({}, {}, {})", a[0], a[1], a[2])
        });
        sql_fn!(m, "left", 2..=2, agg: false, json: false, |a| {
            format!("substr({}, 1, {})", a[0], a[1])
        });
        sql_fn!(m, "right", 2..=2, agg: false, json: false, |a| {
            format!("substr({}, -({}))", a[0], a[1])
        });
        // Cypher substring() is 0-based, substr() is 1-based.
        sql_fn!(m, "substring", 2..=3, agg: false, json: false, |a| {
            if a.len() == 2 {
                format!("substr({}, ({}) + 1)", a[0], a[1])
            } else {
                format!("substr({}, ({}) + 1, {})", a[0], a[1], a[2])
            }
        });

        // size() covers both strings and JSON arrays. The argument is
        // referenced once so its bound placeholders stay positionally
        // aligned with the single params entry the call site pushes.
        sql_fn!(m, "size", 1..=1, agg: false, json: false, |a| {
            format!(
                "(SELECT CASE WHEN json_valid(v) AND json_type(v) = 'array' \
                 THEN json_array_length(v) ELSE length(v) END FROM (SELECT {} AS v))",
                a[0]
            )
        });

        // ===== LISTS =====
        sql_fn!(m, "head", 1..=1, agg: false, json: true, |a| {
            format!("({}) -> '$[0]'", a[0])
        });
        sql_fn!(m, "last", 1..=1, agg: false, json: true, |a| {
            format!("({}) -> '$[#-1]'", a[0])
        });
        sql_fn!(m, "tail", 1..=1, agg: false, json: true, |a| {
            format!("json_remove({}, '$[0]')", a[0])
        });
        sql_fn!(m, "keys", 1..=1, agg: false, json: true, |a| {
            format!(
                "(SELECT json_group_array(k.key) FROM json_each({}) AS k)",
                a[0]
            )
        });
        sql_fn!(m, "range", 2..=3, agg: false, json: true, |a| {
            if a.len() == 2 {
                format!("cypher_range({}, {})", a[0], a[1])
            } else {
                format!("cypher_range({}, {}, {})", a[0], a[1], a[2])
            }
        });
        sql_fn!(m, "split", 2..=2, agg: false, json: true, |a| {
            format!("cypher_split({}, {})", a[0], a[1])
        });
        sql_fn!(m, "reverse", 1..=1, agg: false, json: true, |a| {
            format!("cypher_reverse({})", a[0])
        });

        // ===== MISC =====
        sql_fn!(m, "coalesce", 1..=8, agg: false, json: false, |a| {
            format!("coalesce({})", a.join(", "))
        });

        m
    };
}
