//! Hybrid planner: decide whether a parsed query can run on the in-memory
//! traversal path, and extract its pattern-chain parameters if so.

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::cypher_parser::ast::{
    CypherStatement, Direction, Expression, Literal, NodePattern, Operator, OperatorApplication,
};
use crate::memory_graph::TraversalDirection;

use super::predicate::{CompareOp, NodePredicate};

/// One node position in the chain.
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub variable: Option<String>,
    pub label: String,
    pub predicate: Option<NodePredicate>,
}

/// One hop: the relationship constraints plus the node it lands on.
#[derive(Debug, Clone)]
pub struct ChainHop {
    pub edge_type: Option<String>,
    pub direction: TraversalDirection,
    pub min_hops: u32,
    pub max_hops: u32,
    pub node: ChainNode,
}

#[derive(Debug, Clone)]
pub struct PatternChainParams {
    pub anchor: ChainNode,
    /// Equality filter used for the label-indexed anchor lookup.
    pub anchor_prop_filter: Map<String, Value>,
    pub hops: Vec<ChainHop>,
}

impl PatternChainParams {
    /// Subgraph load bound: the chain cannot reach past the sum of its
    /// per-hop maxima.
    pub fn total_max_depth(&self) -> u32 {
        self.hops.iter().map(|h| h.max_hops).sum()
    }
}

#[derive(Debug)]
pub enum PlanOutcome {
    Suitable(Box<PatternChainParams>),
    Unsuitable { reason: &'static str },
}

fn unsuitable(reason: &'static str) -> PlanOutcome {
    PlanOutcome::Unsuitable { reason }
}

/// Apply the eligibility rules and extract chain parameters.
pub fn plan(
    statement: &CypherStatement<'_>,
    params: &Map<String, Value>,
    config: &EngineConfig,
) -> PlanOutcome {
    if !statement.unions.is_empty() {
        return unsuitable("UNION queries run on the translator path");
    }
    let query = &statement.query;

    if !query.create_clauses.is_empty()
        || !query.merge_clauses.is_empty()
        || query.set_clause.is_some()
        || query.delete_clause.is_some()
    {
        return unsuitable("write clauses present");
    }
    if query.with_clause.is_some() || !query.unwind_clauses.is_empty() {
        return unsuitable("WITH/UNWIND pipelines run on the translator path");
    }
    if query.order_by_clause.is_some() {
        return unsuitable("ORDER BY requires the translator path");
    }
    if query.skip_clause.is_some() || query.limit_clause.is_some() {
        return unsuitable("SKIP/LIMIT require the translator path");
    }

    if query.reading_clauses.len() != 1 {
        return unsuitable("exactly one MATCH clause is required");
    }
    let reading = &query.reading_clauses[0];
    if reading.is_optional() {
        return unsuitable("OPTIONAL MATCH is not traversal-eligible");
    }
    let match_clause = reading.clause();
    if match_clause.patterns.len() != 1 {
        return unsuitable("multiple patterns require the translator path");
    }
    let pattern = &match_clause.patterns[0];
    if pattern.segments.is_empty() {
        return unsuitable("at least one relationship is required");
    }

    let return_clause = match &query.return_clause {
        Some(r) => r,
        None => return unsuitable("a RETURN clause is required"),
    };

    // Collect pattern variables; all nodes must carry labels, and the same
    // variable must not repeat.
    let mut node_vars: Vec<&str> = Vec::new();
    for node in pattern.nodes() {
        if node.label.is_none() {
            return unsuitable("every node in the pattern must carry a label");
        }
        if let Some(var) = node.variable {
            if node_vars.contains(&var) {
                return unsuitable("repeated pattern variables require the translator path");
            }
            node_vars.push(var);
        }
    }
    for segment in &pattern.segments {
        if segment.relationship.properties.is_some() {
            return unsuitable("relationship property predicates are not supported");
        }
    }

    // RETURN items must project pattern nodes or their properties, without
    // aggregation.
    for item in &return_clause.items {
        match &item.expression {
            Expression::Variable(var) if node_vars.contains(var) => {}
            Expression::PropertyAccess(access) if node_vars.contains(&access.base) => {}
            _ => return unsuitable("RETURN items must be pattern nodes or their properties"),
        }
    }

    // Shape condition: a variable-length hop, or a multi-hop chain with a
    // selective anchor.
    let has_var_length = pattern
        .segments
        .iter()
        .any(|s| s.relationship.var_length.is_some());

    // Decompose WHERE into per-variable predicate trees.
    let mut trees: std::collections::HashMap<String, Vec<NodePredicate>> =
        std::collections::HashMap::new();
    if let Some(where_clause) = &match_clause.where_clause {
        let mut conjuncts = Vec::new();
        split_conjuncts(&where_clause.condition, &mut conjuncts);
        for conjunct in conjuncts {
            let mut variables = Vec::new();
            collect_condition_variables(conjunct, &mut variables);
            variables.dedup();
            if variables.len() != 1 {
                return unsuitable("WHERE predicates must reference a single pattern variable");
            }
            let var = variables[0];
            if !node_vars.contains(&var) {
                return unsuitable("WHERE predicates must reference pattern nodes");
            }
            match condition_to_predicate(conjunct, var, params) {
                Some(tree) => trees.entry(var.to_string()).or_default().push(tree),
                None => {
                    return unsuitable(
                        "WHERE predicates must compare node properties with literals or parameters",
                    )
                }
            }
        }
    }

    let mut predicate_for = |var: Option<&str>| -> Option<NodePredicate> {
        let var = var?;
        let list = trees.remove(var)?;
        Some(if list.len() == 1 {
            list.into_iter().next().expect("non-empty")
        } else {
            NodePredicate::And(list)
        })
    };

    // Anchor extraction: inline properties resolve against the parameter
    // map and fold into the lookup filter.
    let anchor_pattern = &pattern.start;
    let mut anchor_prop_filter = Map::new();
    let mut anchor_inline: Option<NodePredicate> = None;
    if let Some(props) = &anchor_pattern.properties {
        for entry in props {
            let value = match inline_value(&entry.value, params) {
                Some(v) => v,
                None => return unsuitable("anchor properties must be literals or parameters"),
            };
            anchor_inline = NodePredicate::and(
                anchor_inline,
                Some(NodePredicate::Compare {
                    key: entry.key.to_string(),
                    op: CompareOp::Eq,
                    value: value.clone(),
                }),
            );
            anchor_prop_filter.insert(entry.key.to_string(), value);
        }
    }

    let anchor_where = predicate_for(anchor_pattern.variable);
    // Equality comparisons in the anchor's WHERE tree sharpen the lookup.
    if let Some(tree) = &anchor_where {
        fold_equalities(tree, &mut anchor_prop_filter);
    }
    let anchor_has_equality = !anchor_prop_filter.is_empty();

    if !has_var_length && !(pattern.segments.len() >= 2 && anchor_has_equality) {
        return unsuitable(
            "needs a variable-length hop, or a multi-hop chain with a selective anchor",
        );
    }

    // Intermediate and terminal nodes must not carry inline property maps
    // that fail to resolve; resolved ones become predicates.
    let mut hops = Vec::with_capacity(pattern.segments.len());
    for segment in &pattern.segments {
        let rel = &segment.relationship;
        let (min_hops, max_hops) = match rel.var_length {
            Some(spec) => (
                spec.effective_min(),
                spec.effective_max(config.default_max_hops),
            ),
            None => (1, 1),
        };
        let node = match chain_node(&segment.node, params, &mut predicate_for) {
            Some(node) => node,
            None => return unsuitable("node properties must be literals or parameters"),
        };
        hops.push(ChainHop {
            edge_type: rel.rel_type.map(str::to_string),
            direction: match rel.direction {
                Direction::Outgoing => TraversalDirection::Outgoing,
                Direction::Incoming => TraversalDirection::Incoming,
                Direction::Either => TraversalDirection::Both,
            },
            min_hops,
            max_hops,
            node,
        });
    }

    let anchor = ChainNode {
        variable: anchor_pattern.variable.map(str::to_string),
        label: anchor_pattern
            .label
            .expect("labels checked above")
            .to_string(),
        predicate: NodePredicate::and(anchor_inline, anchor_where),
    };

    PlanOutcome::Suitable(Box::new(PatternChainParams {
        anchor,
        anchor_prop_filter,
        hops,
    }))
}

fn chain_node(
    node: &NodePattern<'_>,
    params: &Map<String, Value>,
    predicate_for: &mut impl FnMut(Option<&str>) -> Option<NodePredicate>,
) -> Option<ChainNode> {
    let mut inline: Option<NodePredicate> = None;
    if let Some(props) = &node.properties {
        for entry in props {
            let value = inline_value(&entry.value, params)?;
            inline = NodePredicate::and(
                inline,
                Some(NodePredicate::Compare {
                    key: entry.key.to_string(),
                    op: CompareOp::Eq,
                    value,
                }),
            );
        }
    }
    let where_tree = predicate_for(node.variable);
    Some(ChainNode {
        variable: node.variable.map(str::to_string),
        label: node.label.expect("labels checked by caller").to_string(),
        predicate: NodePredicate::and(inline, where_tree),
    })
}

/// Literal or parameter value for an inline pattern property.
fn inline_value(expr: &Expression<'_>, params: &Map<String, Value>) -> Option<Value> {
    match expr {
        Expression::Literal(Literal::Null) => Some(Value::Null),
        Expression::Literal(Literal::Boolean(b)) => Some(Value::Bool(*b)),
        Expression::Literal(Literal::Integer(i)) => Some(Value::from(*i)),
        Expression::Literal(Literal::Float(f)) => serde_json::Number::from_f64(*f).map(Value::Number),
        Expression::Literal(Literal::String(s)) => Some(Value::String(s.clone())),
        Expression::Parameter(name) => params.get(*name).cloned(),
        _ => None,
    }
}

/// Flatten top-level ANDs into conjuncts.
fn split_conjuncts<'e, 'a>(expr: &'e Expression<'a>, out: &mut Vec<&'e Expression<'a>>) {
    match expr {
        Expression::Operator(OperatorApplication {
            operator: Operator::And,
            operands,
        }) => {
            for operand in operands {
                split_conjuncts(operand, out);
            }
        }
        other => out.push(other),
    }
}

fn collect_condition_variables<'a>(expr: &Expression<'a>, out: &mut Vec<&'a str>) {
    match expr {
        Expression::Variable(name) => out.push(name),
        Expression::PropertyAccess(access) => out.push(access.base),
        Expression::Operator(op) => {
            for operand in &op.operands {
                collect_condition_variables(operand, out);
            }
        }
        Expression::FunctionCall(call) => {
            for arg in &call.args {
                collect_condition_variables(arg, out);
            }
        }
        Expression::List(items) => {
            for item in items {
                collect_condition_variables(item, out);
            }
        }
        _ => {}
    }
}

/// Convert a single-variable condition into a predicate tree. Supports
/// AND / OR / NOT-free compositions of comparisons between `var.prop` and a
/// literal or parameter, plus IS [NOT] NULL.
fn condition_to_predicate(
    expr: &Expression<'_>,
    var: &str,
    params: &Map<String, Value>,
) -> Option<NodePredicate> {
    match expr {
        Expression::Operator(op) => match op.operator {
            Operator::And => {
                let children = op
                    .operands
                    .iter()
                    .map(|o| condition_to_predicate(o, var, params))
                    .collect::<Option<Vec<_>>>()?;
                Some(NodePredicate::And(children))
            }
            Operator::Or => {
                let children = op
                    .operands
                    .iter()
                    .map(|o| condition_to_predicate(o, var, params))
                    .collect::<Option<Vec<_>>>()?;
                Some(NodePredicate::Or(children))
            }
            Operator::IsNull => {
                let key = property_key(&op.operands[0], var)?;
                Some(NodePredicate::IsNull { key })
            }
            Operator::IsNotNull => {
                let key = property_key(&op.operands[0], var)?;
                Some(NodePredicate::IsNotNull { key })
            }
            comparison if comparison.is_comparison() => {
                let compare_op = match comparison {
                    Operator::Equal => CompareOp::Eq,
                    Operator::NotEqual => CompareOp::Neq,
                    Operator::LessThan => CompareOp::Lt,
                    Operator::GreaterThan => CompareOp::Gt,
                    Operator::LessThanEqual => CompareOp::Lte,
                    _ => CompareOp::Gte,
                };
                // Property on either side; the other side must be concrete.
                if let Some(key) = property_key(&op.operands[0], var) {
                    let value = inline_value(&op.operands[1], params)?;
                    Some(NodePredicate::Compare {
                        key,
                        op: compare_op,
                        value,
                    })
                } else {
                    let key = property_key(&op.operands[1], var)?;
                    let value = inline_value(&op.operands[0], params)?;
                    Some(NodePredicate::Compare {
                        key,
                        op: flip(compare_op),
                        value,
                    })
                }
            }
            _ => None,
        },
        _ => None,
    }
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Lte => CompareOp::Gte,
        CompareOp::Gte => CompareOp::Lte,
        other => other,
    }
}

fn property_key(expr: &Expression<'_>, var: &str) -> Option<String> {
    match expr {
        Expression::PropertyAccess(access) if access.base == var => Some(access.key.to_string()),
        _ => None,
    }
}

/// Collect top-level equality comparisons into the anchor lookup filter.
fn fold_equalities(tree: &NodePredicate, filter: &mut Map<String, Value>) {
    match tree {
        NodePredicate::And(children) => {
            for child in children {
                fold_equalities(child, filter);
            }
        }
        NodePredicate::Compare {
            key,
            op: CompareOp::Eq,
            value,
        } if !value.is_null() => {
            filter.insert(key.clone(), value.clone());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser;

    fn plan_query(query: &str) -> PlanOutcome {
        plan_query_with(query, Map::new())
    }

    fn plan_query_with(query: &str, params: Map<String, Value>) -> PlanOutcome {
        let config = EngineConfig::default();
        let statement = cypher_parser::parse(query).expect("parse");
        plan(&statement, &params, &config)
    }

    fn expect_suitable(query: &str) -> PatternChainParams {
        match plan_query(query) {
            PlanOutcome::Suitable(params) => *params,
            PlanOutcome::Unsuitable { reason } => {
                panic!("expected suitable, got: {reason}")
            }
        }
    }

    fn expect_unsuitable(query: &str) -> &'static str {
        match plan_query(query) {
            PlanOutcome::Unsuitable { reason } => reason,
            PlanOutcome::Suitable(_) => panic!("expected unsuitable"),
        }
    }

    #[test]
    fn test_variable_length_query_is_suitable() {
        let params = expect_suitable(
            "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person) RETURN b.name",
        );
        assert_eq!(params.anchor.label, "Person");
        assert_eq!(
            params.anchor_prop_filter.get("name"),
            Some(&Value::String("Alice".into()))
        );
        assert_eq!(params.hops.len(), 1);
        assert_eq!(params.hops[0].min_hops, 1);
        assert_eq!(params.hops[0].max_hops, 2);
        assert_eq!(params.hops[0].edge_type.as_deref(), Some("KNOWS"));
    }

    #[test]
    fn test_multi_hop_with_anchor_filter_is_suitable() {
        let params = expect_suitable(
            "MATCH (a:Person {name:'Alice'})-[:KNOWS]->(b:Person)-[:WORKS_AT]->(c:Company) \
             RETURN c.name",
        );
        assert_eq!(params.hops.len(), 2);
        assert_eq!(params.total_max_depth(), 2);
    }

    #[test]
    fn test_multi_hop_without_anchor_filter_unsuitable() {
        let reason = expect_unsuitable(
            "MATCH (a:Person)-[:KNOWS]->(b:Person)-[:WORKS_AT]->(c:Company) RETURN c.name",
        );
        assert!(reason.contains("selective anchor"));
    }

    #[test]
    fn test_anchor_where_equality_counts_as_selective() {
        let params = expect_suitable(
            "MATCH (a:Person)-[:KNOWS]->(b:Person)-[:WORKS_AT]->(c:Company) \
             WHERE a.name = 'Alice' RETURN c.name",
        );
        assert_eq!(
            params.anchor_prop_filter.get("name"),
            Some(&Value::String("Alice".into()))
        );
        assert!(params.anchor.predicate.is_some());
    }

    #[test]
    fn test_single_hop_without_var_length_unsuitable() {
        expect_unsuitable("MATCH (a:Person {id: 1})-[:KNOWS]->(b:Person) RETURN b");
    }

    #[test]
    fn test_writes_unsuitable() {
        expect_unsuitable("MATCH (a:X {id:1})-[:R*1..2]->(b:X) DELETE b");
        expect_unsuitable("CREATE (a:X {id: 1})");
    }

    #[test]
    fn test_order_by_unsuitable() {
        let reason = expect_unsuitable(
            "MATCH (a:X {id:1})-[:R*1..2]->(b:X) RETURN b.name ORDER BY b.name",
        );
        assert!(reason.contains("ORDER BY"));
    }

    #[test]
    fn test_aggregates_unsuitable() {
        expect_unsuitable("MATCH (a:X {id:1})-[:R*1..2]->(b:X) RETURN count(b)");
    }

    #[test]
    fn test_unlabeled_node_unsuitable() {
        let reason =
            expect_unsuitable("MATCH (a:X {id:1})-[:R*1..2]->(b) RETURN b.name");
        assert!(reason.contains("label"));
    }

    #[test]
    fn test_relationship_properties_unsuitable() {
        expect_unsuitable(
            "MATCH (a:X {id:1})-[:R {since: 2020}]->(b:X)-[:S]->(c:X) RETURN c.name",
        );
    }

    #[test]
    fn test_cross_variable_where_unsuitable() {
        let reason = expect_unsuitable(
            "MATCH (a:X {id:1})-[:R*1..2]->(b:X) WHERE a.v = b.v RETURN b.name",
        );
        assert!(reason.contains("single pattern variable"));
    }

    #[test]
    fn test_single_variable_where_tree_extracted() {
        let params = expect_suitable(
            "MATCH (a:Person {name:'Alice'})-[:KNOWS*1..2]->(b:Person) \
             WHERE b.age > 25 AND (b.city = 'X' OR b.city IS NULL) RETURN b.name",
        );
        let hop_pred = params.hops[0].node.predicate.as_ref().expect("predicate");
        // Two conjuncts on b composed into one AND tree.
        match hop_pred {
            NodePredicate::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_parameter_anchor_filter() {
        let mut params = Map::new();
        params.insert("who".into(), serde_json::json!("Alice"));
        let outcome = plan_query_with(
            "MATCH (a:Person {name: $who})-[:KNOWS*1..2]->(b:Person) RETURN b.name",
            params,
        );
        match outcome {
            PlanOutcome::Suitable(chain) => {
                assert_eq!(
                    chain.anchor_prop_filter.get("name"),
                    Some(&Value::String("Alice".into()))
                );
            }
            PlanOutcome::Unsuitable { reason } => panic!("unexpected: {reason}"),
        }
    }

    #[test]
    fn test_unbounded_max_defaults_to_cap() {
        let params = expect_suitable(
            "MATCH (a:Person {name:'Alice'})-[:KNOWS*]->(b:Person) RETURN b.name",
        );
        assert_eq!(params.hops[0].max_hops, 50);
        assert_eq!(params.hops[0].min_hops, 1);
    }
}
