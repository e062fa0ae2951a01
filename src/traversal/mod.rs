//! The hybrid execution path: eligibility planning, predicate trees and
//! chain matching over a materialized subgraph.

pub mod chain;
pub mod planner;
pub mod predicate;

pub use chain::{execute_chain, ChainBindings};
pub use planner::{PatternChainParams, PlanOutcome};
pub use predicate::{CompareOp, NodePredicate};
