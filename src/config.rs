//! Engine configuration.

/// Tunables shared by every component of the query pipeline.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Queries longer than this many characters are rejected at the boundary.
    pub max_query_length: usize,
    /// Upper bound substituted for unbounded variable-length specs (`*`, `*2..`).
    pub default_max_hops: u32,
    /// How many ids go into a single `IN (...)` list during subgraph loading.
    /// SQLite limits bound variables per statement; stay well under it.
    pub id_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_query_length: 100_000,
            default_max_hops: 50,
            id_chunk_size: 400,
        }
    }
}
