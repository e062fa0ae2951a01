//! End-to-end tests through the public engine API, on in-memory tenants.

use std::sync::Arc;

use litegraph::{GraphDb, QueryEngine, QueryResult};
use serde_json::{json, Map, Value};

mod crud;
mod hybrid;
mod pipeline;

pub fn engine() -> Arc<QueryEngine> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = GraphDb::in_memory();
    db.tenant("test").expect("tenant")
}

pub fn run(engine: &QueryEngine, query: &str) -> QueryResult {
    run_with(engine, query, Map::new())
}

pub fn run_with(engine: &QueryEngine, query: &str, params: Map<String, Value>) -> QueryResult {
    engine
        .execute(query, params)
        .unwrap_or_else(|e| panic!("query failed: {query}\n{e}"))
}

pub fn params1(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Collect one column from all result rows.
pub fn column(result: &QueryResult, name: &str) -> Vec<Value> {
    result
        .data
        .iter()
        .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Sorted string values of one column, for multiset comparison.
pub fn sorted_strings(result: &QueryResult, name: &str) -> Vec<String> {
    let mut out: Vec<String> = column(result, name)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    out.sort();
    out
}

#[test]
fn test_count_matches_cardinality() {
    let engine = engine();
    run(&engine, "CREATE (a:Item {n: 1})");
    run(&engine, "CREATE (b:Item {n: 2})");
    let result = run(&engine, "MATCH (i:Item) RETURN i.n");
    assert_eq!(result.meta.count, result.data.len());
    assert_eq!(result.meta.count, 2);
}

#[test]
fn test_query_length_cap() {
    let engine = engine();
    let long_query = format!("MATCH (n) RETURN {}", "n.x + ".repeat(20_000));
    let err = engine
        .execute(&long_query, Map::new())
        .expect_err("should exceed cap");
    assert!(err.to_string().contains("maximum length"));
}

#[test]
fn test_parse_error_carries_location() {
    let engine = engine();
    let err = engine
        .execute("MATCH (n:Person RETURN n", Map::new())
        .expect_err("should fail to parse");
    match err {
        litegraph::EngineError::Parse(failure) => {
            assert_eq!(failure.line, 1);
            assert!(failure.column > 1);
            assert!(failure.position > 0);
        }
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn test_parameter_round_trip_byte_for_byte() {
    let engine = engine();
    let tricky = "it's \"quoted\" \\ and \u{00e9}\u{4e16} -- /* not a comment */";
    run_with(
        &engine,
        "CREATE (n:Blob {text: $t})",
        params1("t", json!(tricky)),
    );
    let result = run(&engine, "MATCH (n:Blob) RETURN n.text");
    assert_eq!(result.data[0]["n.text"], json!(tricky));
}
