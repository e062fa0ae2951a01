//! Query pipeline surface: projections, ordering, paging, aggregation,
//! WITH / UNWIND / UNION, OPTIONAL MATCH, functions and predicates.

use serde_json::{json, Value};

use super::*;

fn seed_people(engine: &litegraph::QueryEngine) {
    run(engine, "CREATE (a:Person {name: 'Alice', age: 30, city: 'Oslo'})");
    run(engine, "CREATE (b:Person {name: 'Bob', age: 22, city: 'Oslo'})");
    run(engine, "CREATE (c:Person {name: 'Carol', age: 35, city: 'Bergen'})");
}

#[test]
fn test_order_by_desc_with_skip_limit() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) RETURN p.name ORDER BY p.age DESC SKIP 1 LIMIT 1",
    );
    // Ages 35, 30, 22; skip one, take one: Alice.
    assert_eq!(column(&result, "p.name"), vec![json!("Alice")]);
}

#[test]
fn test_return_distinct() {
    let engine = engine();
    seed_people(&engine);
    let result = run(&engine, "MATCH (p:Person) RETURN DISTINCT p.city");
    assert_eq!(sorted_strings(&result, "p.city"), vec!["Bergen", "Oslo"]);
}

#[test]
fn test_where_comparisons() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) WHERE p.age >= 30 AND p.city = 'Oslo' RETURN p.name",
    );
    assert_eq!(sorted_strings(&result, "p.name"), vec!["Alice"]);
}

#[test]
fn test_string_predicates() {
    let engine = engine();
    seed_people(&engine);
    let starts = run(
        &engine,
        "MATCH (p:Person) WHERE p.name STARTS WITH 'Al' RETURN p.name",
    );
    assert_eq!(sorted_strings(&starts, "p.name"), vec!["Alice"]);

    let ends = run(
        &engine,
        "MATCH (p:Person) WHERE p.name ENDS WITH 'ob' RETURN p.name",
    );
    assert_eq!(sorted_strings(&ends, "p.name"), vec!["Bob"]);

    let contains = run(
        &engine,
        "MATCH (p:Person) WHERE p.name CONTAINS 'aro' RETURN p.name",
    );
    assert_eq!(sorted_strings(&contains, "p.name"), vec!["Carol"]);
}

#[test]
fn test_in_operator_with_parameter_list() {
    let engine = engine();
    seed_people(&engine);
    let result = run_with(
        &engine,
        "MATCH (p:Person) WHERE p.name IN $names RETURN p.age",
        params1("names", json!(["Alice", "Carol"])),
    );
    assert_eq!(result.meta.count, 2);
}

#[test]
fn test_is_null_checks() {
    let engine = engine();
    run(&engine, "CREATE (a:Row {k: 'with', v: 1})");
    run(&engine, "CREATE (b:Row {k: 'without'})");
    let with_null = run(&engine, "MATCH (r:Row) WHERE r.v IS NULL RETURN r.k");
    assert_eq!(sorted_strings(&with_null, "r.k"), vec!["without"]);
    let not_null = run(&engine, "MATCH (r:Row) WHERE r.v IS NOT NULL RETURN r.k");
    assert_eq!(sorted_strings(&not_null, "r.k"), vec!["with"]);
}

#[test]
fn test_aggregates() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) RETURN count(*) AS c, sum(p.age) AS total, avg(p.age) AS mean, \
         min(p.age) AS lo, max(p.age) AS hi",
    );
    assert_eq!(result.data[0]["c"], json!(3));
    assert_eq!(result.data[0]["total"], json!(87));
    assert_eq!(result.data[0]["mean"], json!(29.0));
    assert_eq!(result.data[0]["lo"], json!(22));
    assert_eq!(result.data[0]["hi"], json!(35));
}

#[test]
fn test_group_by_city() {
    let engine = engine();
    seed_people(&engine);
    let result = run(&engine, "MATCH (p:Person) RETURN p.city, count(*) AS c");
    assert_eq!(result.meta.count, 2);
    let oslo = result
        .data
        .iter()
        .find(|r| r["p.city"] == json!("Oslo"))
        .expect("oslo row");
    assert_eq!(oslo["c"], json!(2));
}

#[test]
fn test_collect_aggregates_values() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) WHERE p.city = 'Oslo' RETURN collect(p.name) AS names",
    );
    let mut names: Vec<String> = result.data[0]["names"]
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Alice", "Bob"]);
}

#[test]
fn test_with_aggregation_and_having() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) WITH p.city AS city, count(*) AS c WHERE c > 1 RETURN city",
    );
    assert_eq!(sorted_strings(&result, "city"), vec!["Oslo"]);
}

#[test]
fn test_with_alias_projection() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) WITH p.name AS name WHERE name STARTS WITH 'B' RETURN name",
    );
    assert_eq!(sorted_strings(&result, "name"), vec!["Bob"]);
}

#[test]
fn test_unwind_literal_list() {
    let engine = engine();
    let result = run(&engine, "UNWIND [1, 2, 3] AS x RETURN x");
    assert_eq!(result.meta.count, 3);
    assert_eq!(column(&result, "x"), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_unwind_preserves_booleans() {
    let engine = engine();
    let result = run_with(
        &engine,
        "UNWIND $flags AS f RETURN f",
        params1("flags", json!([true, false])),
    );
    assert_eq!(
        column(&result, "f"),
        vec![Value::Bool(true), Value::Bool(false)]
    );
}

#[test]
fn test_unwind_joins_match() {
    let engine = engine();
    seed_people(&engine);
    let result = run_with(
        &engine,
        "UNWIND $names AS wanted MATCH (p:Person {name: wanted}) RETURN p.age",
        params1("names", json!(["Alice", "Bob"])),
    );
    assert_eq!(result.meta.count, 2);
}

#[test]
fn test_union_and_union_all() {
    let engine = engine();
    run(&engine, "CREATE (a:Cat {name: 'shared'})");
    run(&engine, "CREATE (b:Dog {name: 'shared'})");
    let all = run(
        &engine,
        "MATCH (c:Cat) RETURN c.name AS name UNION ALL MATCH (d:Dog) RETURN d.name AS name",
    );
    assert_eq!(all.meta.count, 2);
    let distinct = run(
        &engine,
        "MATCH (c:Cat) RETURN c.name AS name UNION MATCH (d:Dog) RETURN d.name AS name",
    );
    assert_eq!(distinct.meta.count, 1);
}

#[test]
fn test_optional_match_keeps_row() {
    let engine = engine();
    run(&engine, "CREATE (a:User {name: 'hermit'})");
    run(&engine, "CREATE (b:User {name: 'social'})-[:FOLLOWS]->(c:User {name: 'star'})");
    let result = run(
        &engine,
        "MATCH (u:User) OPTIONAL MATCH (u)-[:FOLLOWS]->(f:User) RETURN u.name, f.name",
    );
    // Every user appears; the follow target is null where missing.
    assert_eq!(result.meta.count, 3);
    let hermit = result
        .data
        .iter()
        .find(|r| r["u.name"] == json!("hermit"))
        .expect("hermit row");
    assert_eq!(hermit["f.name"], Value::Null);
}

#[test]
fn test_case_expression() {
    let engine = engine();
    seed_people(&engine);
    let result = run(
        &engine,
        "MATCH (p:Person) RETURN p.name, \
         CASE WHEN p.age >= 30 THEN 'senior' ELSE 'junior' END AS bracket",
    );
    let bob = result
        .data
        .iter()
        .find(|r| r["p.name"] == json!("Bob"))
        .expect("bob");
    assert_eq!(bob["bracket"], json!("junior"));
}

#[test]
fn test_exists_pattern_predicate() {
    let engine = engine();
    run(&engine, "CREATE (a:User {name: 'linked'})-[:FOLLOWS]->(b:User {name: 'target'})");
    run(&engine, "CREATE (c:User {name: 'alone'})");
    let result = run(
        &engine,
        "MATCH (u:User) WHERE EXISTS((u)-[:FOLLOWS]->(x:User)) RETURN u.name",
    );
    assert_eq!(sorted_strings(&result, "u.name"), vec!["linked"]);
}

#[test]
fn test_string_functions() {
    let engine = engine();
    run(&engine, "CREATE (s:Str {v: '  Hello World  '})");
    let result = run(
        &engine,
        "MATCH (s:Str) RETURN toUpper(trim(s.v)) AS up, substring(trim(s.v), 0, 5) AS first",
    );
    assert_eq!(result.data[0]["up"], json!("HELLO WORLD"));
    assert_eq!(result.data[0]["first"], json!("Hello"));
}

#[test]
fn test_numeric_functions() {
    let engine = engine();
    run(&engine, "CREATE (n:Num {v: -2.3})");
    let result = run(
        &engine,
        "MATCH (n:Num) RETURN abs(n.v) AS a, ceil(n.v) AS c, floor(n.v) AS f, sign(n.v) AS s",
    );
    assert_eq!(result.data[0]["a"], json!(2.3));
    assert_eq!(result.data[0]["c"], json!(-2.0));
    assert_eq!(result.data[0]["f"], json!(-3.0));
    assert_eq!(result.data[0]["s"], json!(-1));
}

#[test]
fn test_list_functions() {
    let engine = engine();
    run(&engine, "CREATE (l:L {items: ['x', 'y', 'z']})");
    let result = run(
        &engine,
        "MATCH (l:L) RETURN head(l.items) AS h, last(l.items) AS t, size(l.items) AS n, \
         tail(l.items) AS rest",
    );
    assert_eq!(result.data[0]["h"], json!("x"));
    assert_eq!(result.data[0]["t"], json!("z"));
    assert_eq!(result.data[0]["n"], json!(3));
    assert_eq!(result.data[0]["rest"], json!(["y", "z"]));
}

#[test]
fn test_size_of_bound_values() {
    let engine = engine();
    // Both arguments bind as placeholders; string vs array dispatch
    // happens inside the store.
    let result = run_with(
        &engine,
        "RETURN size('hello') AS s, size($items) AS n",
        params1("items", json!(["a", "b"])),
    );
    assert_eq!(result.data[0]["s"], json!(5));
    assert_eq!(result.data[0]["n"], json!(2));
}

#[test]
fn test_split_and_range() {
    let engine = engine();
    let result = run(
        &engine,
        "UNWIND [1] AS one RETURN split('a,b,c', ',') AS parts, range(1, 4) AS r",
    );
    assert_eq!(result.data[0]["parts"], json!(["a", "b", "c"]));
    assert_eq!(result.data[0]["r"], json!([1, 2, 3, 4]));
}

#[test]
fn test_coalesce() {
    let engine = engine();
    run(&engine, "CREATE (n:C {a: null, b: 'fallback'})");
    let result = run(&engine, "MATCH (n:C) RETURN coalesce(n.a, n.b) AS v");
    assert_eq!(result.data[0]["v"], json!("fallback"));
}

#[test]
fn test_list_comprehension() {
    let engine = engine();
    run(&engine, "CREATE (l:L {nums: [1, 2, 3, 4]})");
    let result = run(
        &engine,
        "MATCH (l:L) RETURN [x IN l.nums WHERE x > 2 | x * 10] AS big",
    );
    assert_eq!(result.data[0]["big"], json!([30, 40]));
}

#[test]
fn test_list_comprehension_over_parameter() {
    let engine = engine();
    let result = run_with(
        &engine,
        "RETURN [x IN $nums WHERE x > 1 | x * 10] AS big",
        params1("nums", json!([1, 2, 3])),
    );
    assert_eq!(result.data[0]["big"], json!([20, 30]));
}

#[test]
fn test_type_and_id_functions() {
    let engine = engine();
    run(&engine, "CREATE (a:T {n: 1})-[:LINKS]->(b:T {n: 2})");
    let result = run(
        &engine,
        "MATCH (a:T)-[r]->(b:T) RETURN type(r) AS t, id(a) AS ia",
    );
    assert_eq!(result.data[0]["t"], json!("LINKS"));
    assert!(result.data[0]["ia"].is_string());
}

#[test]
fn test_multiple_match_clauses_share_variables() {
    let engine = engine();
    run(&engine, "CREATE (a:G {n: 'a'})-[:E]->(b:G {n: 'b'})");
    run(&engine, "MATCH (b:G {n: 'b'}) CREATE (b)-[:E]->(c:G {n: 'c'})");
    let result = run(
        &engine,
        "MATCH (a:G)-[:E]->(b:G) MATCH (b)-[:E]->(c:G) RETURN a.n, c.n",
    );
    assert_eq!(result.meta.count, 1);
    assert_eq!(result.data[0]["a.n"], json!("a"));
    assert_eq!(result.data[0]["c.n"], json!("c"));
}
