//! Serializable node predicate trees.
//!
//! The planner compiles single-variable WHERE expressions into these trees
//! so the chain executor can evaluate them against in-memory nodes without
//! host-language closures, and tests can inspect what was extracted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodePredicate {
    And(Vec<NodePredicate>),
    Or(Vec<NodePredicate>),
    Compare {
        key: String,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        key: String,
    },
    IsNotNull {
        key: String,
    },
}

impl NodePredicate {
    /// Evaluate against a property map. Comparison semantics mirror the
    /// SQL path: numbers compare numerically across int/float, strings
    /// lexicographically; type mismatches and null operands are false.
    pub fn matches(&self, props: &Map<String, Value>) -> bool {
        match self {
            NodePredicate::And(children) => children.iter().all(|c| c.matches(props)),
            NodePredicate::Or(children) => children.iter().any(|c| c.matches(props)),
            NodePredicate::IsNull { key } => {
                matches!(props.get(key), None | Some(Value::Null))
            }
            NodePredicate::IsNotNull { key } => {
                !matches!(props.get(key), None | Some(Value::Null))
            }
            NodePredicate::Compare { key, op, value } => {
                let stored = match props.get(key) {
                    Some(v) if !v.is_null() => v,
                    _ => return false,
                };
                if value.is_null() {
                    return false;
                }
                compare(stored, value)
                    .map(|ordering| match op {
                        CompareOp::Eq => ordering == std::cmp::Ordering::Equal,
                        CompareOp::Neq => ordering != std::cmp::Ordering::Equal,
                        CompareOp::Lt => ordering == std::cmp::Ordering::Less,
                        CompareOp::Gt => ordering == std::cmp::Ordering::Greater,
                        CompareOp::Lte => ordering != std::cmp::Ordering::Greater,
                        CompareOp::Gte => ordering != std::cmp::Ordering::Less,
                    })
                    .unwrap_or(false)
            }
        }
    }

    /// Conjoin two optional predicates.
    pub fn and(left: Option<NodePredicate>, right: Option<NodePredicate>) -> Option<NodePredicate> {
        match (left, right) {
            (Some(l), Some(r)) => Some(NodePredicate::And(vec![l, r])),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().partial_cmp(&y.as_f64())
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
