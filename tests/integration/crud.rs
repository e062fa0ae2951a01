//! Create / read / update / delete behavior, including the JSON property
//! fidelity and deletion invariants.

use serde_json::{json, Map, Value};

use super::*;

#[test]
fn test_boolean_survives_round_trip() {
    let engine = engine();
    run(&engine, "CREATE (n:Person {name: 'Alice', active: true})");
    let result = run(&engine, "MATCH (n:Person) RETURN n.active");
    assert_eq!(result.meta.count, 1);
    // Exactly true, never 1.
    assert_eq!(result.data[0]["n.active"], Value::Bool(true));
}

#[test]
fn test_false_and_null_survive() {
    let engine = engine();
    run(&engine, "CREATE (n:Flag {on: false, note: null})");
    let result = run(&engine, "MATCH (n:Flag) RETURN n.on, n.note");
    assert_eq!(result.data[0]["n.on"], Value::Bool(false));
    assert_eq!(result.data[0]["n.note"], Value::Null);
}

#[test]
fn test_scalar_array_property() {
    let engine = engine();
    run(&engine, "CREATE (n:Doc {tags: ['a', 'b', 'c'], nums: [1, 2.5]})");
    let result = run(&engine, "MATCH (n:Doc) RETURN n.tags, n.nums");
    assert_eq!(result.data[0]["n.tags"], json!(["a", "b", "c"]));
    assert_eq!(result.data[0]["n.nums"], json!([1, 2.5]));
}

#[test]
fn test_whole_node_projection() {
    let engine = engine();
    run(&engine, "CREATE (n:Person {name: 'Ada', age: 36})");
    let result = run(&engine, "MATCH (n:Person) RETURN n");
    let node = &result.data[0]["n"];
    assert_eq!(node["labels"], json!(["Person"]));
    assert_eq!(node["properties"]["name"], json!("Ada"));
    assert_eq!(node["properties"]["age"], json!(36));
    assert!(node["id"].as_str().expect("uuid").len() >= 32);
}

#[test]
fn test_match_create_multi_phase() {
    let engine = engine();
    run(&engine, "CREATE (a:Person {id: 'x'})");
    let result = run_with(
        &engine,
        "MATCH (u:Person {id: $id}) CREATE (u)-[:HAS]->(r:Report {id: 'r1'})",
        params1("id", json!("x")),
    );
    // Writes surface an empty result set.
    assert_eq!(result.meta.count, 0);

    let reports = run(&engine, "MATCH (r:Report) RETURN r.id");
    assert_eq!(reports.meta.count, 1);

    let linked = run(&engine, "MATCH (u)-[:HAS]->(r) RETURN u.id, r.id");
    assert_eq!(linked.meta.count, 1);
    assert_eq!(linked.data[0]["u.id"], json!("x"));
    assert_eq!(linked.data[0]["r.id"], json!("r1"));
}

#[test]
fn test_multi_phase_creates_per_matched_row() {
    let engine = engine();
    run(&engine, "CREATE (a:User {name: 'a'})");
    run(&engine, "CREATE (b:User {name: 'b'})");
    run(&engine, "MATCH (u:User) CREATE (u)-[:OWNS]->(c:Cart {open: true})");
    let carts = run(&engine, "MATCH (u:User)-[:OWNS]->(c:Cart) RETURN u.name, c.open");
    assert_eq!(carts.meta.count, 2);
    assert!(carts.data.iter().all(|r| r["c.open"] == json!(true)));
}

#[test]
fn test_multi_phase_where_participates() {
    let engine = engine();
    run(&engine, "CREATE (a:User {name: 'a', vip: true})");
    run(&engine, "CREATE (b:User {name: 'b', vip: false})");
    run(
        &engine,
        "MATCH (u:User) WHERE u.vip = true CREATE (u)-[:GETS]->(p:Perk {kind: 'gold'})",
    );
    let perks = run(&engine, "MATCH (u:User)-[:GETS]->(p:Perk) RETURN u.name");
    assert_eq!(sorted_strings(&perks, "u.name"), vec!["a"]);
}

#[test]
fn test_merge_is_idempotent() {
    let engine = engine();
    run(&engine, "MERGE (n:User {id: 'u'})");
    run(&engine, "MERGE (n:User {id: 'u'})");
    let result = run(&engine, "MATCH (n:User) RETURN COUNT(n)");
    assert_eq!(result.data[0]["COUNT(n)"], json!(1));
}

#[test]
fn test_merge_differs_by_properties() {
    let engine = engine();
    run(&engine, "MERGE (n:User {id: 'u1'})");
    run(&engine, "MERGE (n:User {id: 'u2'})");
    let result = run(&engine, "MATCH (n:User) RETURN count(*)");
    assert_eq!(result.data[0]["count(*)"], json!(2));
}

#[test]
fn test_set_updates_property() {
    let engine = engine();
    run(&engine, "CREATE (n:Person {id: 'p', age: 30})");
    run(&engine, "MATCH (n:Person {id: 'p'}) SET n.age = 31, n.city = 'Oslo'");
    let result = run(&engine, "MATCH (n:Person {id: 'p'}) RETURN n.age, n.city");
    assert_eq!(result.data[0]["n.age"], json!(31));
    assert_eq!(result.data[0]["n.city"], json!("Oslo"));
}

#[test]
fn test_set_boolean_stays_boolean() {
    let engine = engine();
    run(&engine, "CREATE (n:Toggle {id: 't', on: false})");
    run(&engine, "MATCH (n:Toggle {id: 't'}) SET n.on = true");
    let result = run(&engine, "MATCH (n:Toggle) RETURN n.on");
    assert_eq!(result.data[0]["n.on"], Value::Bool(true));
}

#[test]
fn test_delete_connected_node_fails() {
    let engine = engine();
    run(&engine, "CREATE (a:P {id: 'a'})-[:L]->(b:P {id: 'b'})");
    let err = engine
        .execute("MATCH (n:P {id: 'a'}) DELETE n", Map::new())
        .expect_err("delete of connected node must fail");
    assert!(err.to_string().contains("DETACH"));
    // The node is still there: the transaction rolled back.
    let count = run(&engine, "MATCH (n:P) RETURN count(*)");
    assert_eq!(count.data[0]["count(*)"], json!(2));
}

#[test]
fn test_detach_delete_leaves_no_orphan_edges() {
    let engine = engine();
    run(&engine, "CREATE (a:P {id: 'a'})-[:L]->(b:P {id: 'b'})");
    run(&engine, "MATCH (n:P {id: 'a'}) DETACH DELETE n");
    let nodes = run(&engine, "MATCH (n:P) RETURN n.id");
    assert_eq!(sorted_strings(&nodes, "n.id"), vec!["b"]);
    let edges = run(&engine, "MATCH (x)-[r:L]->(y) RETURN x.id");
    assert_eq!(edges.meta.count, 0);
}

#[test]
fn test_delete_unconnected_node_succeeds() {
    let engine = engine();
    run(&engine, "CREATE (a:Solo {id: 's'})");
    run(&engine, "MATCH (n:Solo) DELETE n");
    let count = run(&engine, "MATCH (n:Solo) RETURN count(*)");
    assert_eq!(count.data[0]["count(*)"], json!(0));
}

#[test]
fn test_delete_edge_keeps_nodes() {
    let engine = engine();
    run(&engine, "CREATE (a:P {id: 'a'})-[:L]->(b:P {id: 'b'})");
    run(&engine, "MATCH (a:P)-[r:L]->(b:P) DELETE r");
    let nodes = run(&engine, "MATCH (n:P) RETURN count(*)");
    assert_eq!(nodes.data[0]["count(*)"], json!(2));
    let edges = run(&engine, "MATCH (x:P)-[r:L]->(y:P) RETURN count(*)");
    assert_eq!(edges.data[0]["count(*)"], json!(0));
}

#[test]
fn test_create_returns_created_node() {
    let engine = engine();
    let result = run(&engine, "CREATE (n:City {name: 'Bergen'}) RETURN n");
    assert_eq!(result.meta.count, 1);
    assert_eq!(result.data[0]["n"]["properties"]["name"], json!("Bergen"));
}

#[test]
fn test_invalid_property_type_rejected() {
    let engine = engine();
    let err = engine
        .execute(
            "CREATE (n:Bad {blob: $v})",
            params1("v", json!({"nested": "object"})),
        )
        .expect_err("nested object property must be rejected");
    assert!(err.to_string().to_lowercase().contains("nested"));
}

#[test]
fn test_relationship_properties_round_trip() {
    let engine = engine();
    run(
        &engine,
        "CREATE (a:P {id: 'a'})-[:RATED {stars: 5, fresh: true}]->(b:P {id: 'b'})",
    );
    let result = run(&engine, "MATCH (a:P)-[r:RATED]->(b:P) RETURN r.stars, r.fresh");
    assert_eq!(result.data[0]["r.stars"], json!(5));
    assert_eq!(result.data[0]["r.fresh"], Value::Bool(true));
}
