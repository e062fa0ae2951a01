//! Variable-length and multi-hop pattern queries: the traversal path, the
//! recursive-CTE path, and their agreement.

use serde_json::json;

use super::*;

/// Alice knows Bob and Diana; Bob knows Charlie. Bob works at Acme,
/// Charlie at Globex, Diana at Startup.
fn seed_social(engine: &litegraph::QueryEngine) {
    run(
        engine,
        "CREATE (alice:Person {name: 'Alice', age: 30})-[:KNOWS]->(bob:Person {name: 'Bob', age: 22})-[:KNOWS]->(charlie:Person {name: 'Charlie', age: 35})",
    );
    run(
        engine,
        "MATCH (a:Person {name: 'Alice'}) CREATE (a)-[:KNOWS]->(diana:Person {name: 'Diana', age: 24})",
    );
    run(
        engine,
        "MATCH (b:Person {name: 'Bob'}) CREATE (b)-[:WORKS_AT]->(c:Company {name: 'Acme'})",
    );
    run(
        engine,
        "MATCH (c:Person {name: 'Charlie'}) CREATE (c)-[:WORKS_AT]->(g:Company {name: 'Globex'})",
    );
    run(
        engine,
        "MATCH (d:Person {name: 'Diana'}) CREATE (d)-[:WORKS_AT]->(s:Company {name: 'Startup'})",
    );
}

#[test]
fn test_variable_length_chain_to_companies() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person)-[:WORKS_AT]->(c:Company) \
         RETURN c.name",
    );
    assert_eq!(
        sorted_strings(&result, "c.name"),
        vec!["Acme", "Globex", "Startup"]
    );
}

#[test]
fn test_chain_with_node_filter() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person)-[:WORKS_AT]->(c:Company) \
         WHERE b.age > 25 RETURN c.name",
    );
    assert_eq!(sorted_strings(&result, "c.name"), vec!["Globex"]);
}

#[test]
fn test_cyclic_graph_terminates_with_three_endpoints() {
    let engine = engine();
    run(
        &engine,
        "CREATE (a:N {name: 'A'})-[:L]->(b:N {name: 'B'})-[:L]->(c:N {name: 'C'})",
    );
    run(
        &engine,
        "MATCH (c:N {name: 'C'}), (a:N {name: 'A'}) CREATE (c)-[:L]->(a)",
    );

    // The terminal node is unlabeled, so this runs through the recursive
    // CTE; the edge trail bounds it to simple paths.
    let result = run(
        &engine,
        "MATCH (x:N {name:'A'})-[:L*1..10]->(y) RETURN y.name",
    );
    assert_eq!(result.meta.count, 3);
    assert_eq!(sorted_strings(&result, "y.name"), vec!["A", "B", "C"]);
}

#[test]
fn test_hybrid_and_translator_agree() {
    let engine = engine();
    seed_social(&engine);

    // Labeled terminal: traversal-eligible.
    let hybrid = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person)-[:WORKS_AT]->(c:Company) \
         RETURN c.name",
    );
    // Unlabeled terminal: same data, forced onto the translator path.
    let translated = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person)-[:WORKS_AT]->(c) \
         RETURN c.name",
    );
    assert_eq!(
        sorted_strings(&hybrid, "c.name"),
        sorted_strings(&translated, "c.name")
    );
}

#[test]
fn test_hybrid_whole_node_projection_shape() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..1]->(b:Person) RETURN b",
    );
    assert_eq!(result.meta.count, 2);
    for row in &result.data {
        let node = &row["b"];
        assert!(node["id"].is_string());
        assert_eq!(node["labels"], json!(["Person"]));
        assert!(node["properties"]["name"].is_string());
    }
}

#[test]
fn test_fixed_two_hop_with_anchor_runs_hybrid() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS]->(b:Person)-[:WORKS_AT]->(c:Company) \
         RETURN b.name, c.name",
    );
    // Direct friends only: Bob at Acme, Diana at Startup.
    assert_eq!(sorted_strings(&result, "c.name"), vec!["Acme", "Startup"]);
}

#[test]
fn test_incoming_direction_traversal() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (c:Company {name:'Acme'})<-[:WORKS_AT]-(b:Person)<-[:KNOWS*1..2]-(a:Person) \
         RETURN a.name",
    );
    assert_eq!(sorted_strings(&result, "a.name"), vec!["Alice"]);
}

#[test]
fn test_undirected_variable_length() {
    let engine = engine();
    run(
        &engine,
        "CREATE (a:T {name: 'a'})-[:E]->(b:T {name: 'b'})-[:E]->(c:T {name: 'c'})",
    );
    // From b, one undirected hop reaches both neighbors.
    let result = run(
        &engine,
        "MATCH (x:T {name:'b'})-[:E*1..1]-(y:T) RETURN y.name",
    );
    assert_eq!(sorted_strings(&result, "y.name"), vec!["a", "c"]);
}

#[test]
fn test_zero_min_hops_includes_start() {
    let engine = engine();
    run(&engine, "CREATE (a:Z {name: 'a'})-[:E]->(b:Z {name: 'b'})");
    let result = run(
        &engine,
        "MATCH (x:Z {name:'a'})-[:E*0..1]->(y:Z) RETURN y.name",
    );
    assert_eq!(sorted_strings(&result, "y.name"), vec!["a", "b"]);
}

#[test]
fn test_missing_anchor_yields_empty_result() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Zelda'})-[:KNOWS*1..3]->(b:Person) RETURN b.name",
    );
    assert_eq!(result.meta.count, 0);
}

#[test]
fn test_unbounded_path_is_capped_but_complete_here() {
    let engine = engine();
    seed_social(&engine);
    let result = run(
        &engine,
        "MATCH (a:Person {name:'Alice'})-[:KNOWS*]->(b:Person) RETURN b.name",
    );
    assert_eq!(
        sorted_strings(&result, "b.name"),
        vec!["Bob", "Charlie", "Diana"]
    );
}
