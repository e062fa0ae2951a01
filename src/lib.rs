//! LiteGraph - Embeddable property-graph database on SQLite
//!
//! This crate provides a multi-tenant labeled property graph through:
//! - A Cypher-subset parser with positional errors
//! - Translation of parsed queries into parameterized SQLite statements
//! - A hybrid execution path that materializes bounded subgraphs in memory
//!   and answers variable-length / multi-hop pattern queries by traversal
//! - Transactional multi-statement execution with multi-phase MATCH/CREATE

pub mod config;
pub mod cypher_parser;
pub mod executor;
pub mod memory_graph;
pub mod properties;
pub mod sqlite_query_generator;
pub mod store;
pub mod subgraph_loader;
pub mod traversal;

pub use config::EngineConfig;
pub use executor::{EngineError, QueryEngine, QueryResult};
pub use store::{GraphDb, StoreError};
