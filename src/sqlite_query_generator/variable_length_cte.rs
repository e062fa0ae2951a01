//! Recursive CTE generation for variable-length relationships.
//!
//! The CTE enumerates simple paths: `trail` accumulates the edge ids already
//! used so no edge repeats within one path. That keeps enumeration finite on
//! cyclic graphs and aligned with the in-memory traversal engine, which
//! enforces the same edge-disjointness invariant.

use crate::cypher_parser::ast::{Direction, VarLengthSpec};
use crate::properties::SqlParam;

use super::context::Rendered;

pub const CTE_NAME: &str = "vlp";

/// Build the `WITH RECURSIVE vlp(start_id, end_id, depth, trail) AS (...)`
/// prefix for one variable-length relationship.
pub struct VariableLengthCte {
    pub spec: VarLengthSpec,
    pub direction: Direction,
    pub rel_type: Option<String>,
    pub max_hops: u32,
}

impl VariableLengthCte {
    pub fn new(
        spec: VarLengthSpec,
        direction: Direction,
        rel_type: Option<String>,
        default_cap: u32,
    ) -> Self {
        let max_hops = spec.effective_max(default_cap);
        VariableLengthCte {
            spec,
            direction,
            rel_type,
            max_hops,
        }
    }

    pub fn min_hops(&self) -> u32 {
        self.spec.effective_min()
    }

    pub fn render(&self) -> Rendered {
        let mut params: Vec<SqlParam> = Vec::new();
        let type_filter = |params: &mut Vec<SqlParam>, prefix: &str| -> String {
            match &self.rel_type {
                Some(t) => {
                    params.push(SqlParam::Text(t.clone()));
                    format!(" {prefix} type = ?")
                }
                None => String::new(),
            }
        };

        let mut seeds = Vec::new();

        if self.min_hops() == 0 {
            // Zero-length paths join a node to itself. The recursive step
            // derives every deeper path from these, so no single-edge seed
            // is added (it would duplicate each depth-1 row).
            seeds.push("SELECT id, id, 0, ',' FROM nodes".to_string());
        } else {
            match self.direction {
                Direction::Outgoing => {
                    let filter = type_filter(&mut params, "WHERE");
                    seeds.push(format!(
                        "SELECT source_id, target_id, 1, ',' || id || ',' FROM edges{filter}"
                    ));
                }
                Direction::Incoming => {
                    let filter = type_filter(&mut params, "WHERE");
                    seeds.push(format!(
                        "SELECT target_id, source_id, 1, ',' || id || ',' FROM edges{filter}"
                    ));
                }
                Direction::Either => {
                    let filter = type_filter(&mut params, "WHERE");
                    seeds.push(format!(
                        "SELECT source_id, target_id, 1, ',' || id || ',' FROM edges{filter}"
                    ));
                    let filter = type_filter(&mut params, "WHERE");
                    seeds.push(format!(
                        "SELECT target_id, source_id, 1, ',' || id || ',' FROM edges{filter}"
                    ));
                }
            }
        }

        let step = match self.direction {
            Direction::Outgoing => {
                let filter = type_filter(&mut params, "AND");
                format!(
                    "SELECT v.start_id, e.target_id, v.depth + 1, v.trail || e.id || ',' \
                     FROM {cte} AS v JOIN edges AS e ON e.source_id = v.end_id \
                     WHERE v.depth < {max}{filter} \
                     AND instr(v.trail, ',' || e.id || ',') = 0",
                    cte = CTE_NAME,
                    max = self.max_hops
                )
            }
            Direction::Incoming => {
                let filter = type_filter(&mut params, "AND");
                format!(
                    "SELECT v.start_id, e.source_id, v.depth + 1, v.trail || e.id || ',' \
                     FROM {cte} AS v JOIN edges AS e ON e.target_id = v.end_id \
                     WHERE v.depth < {max}{filter} \
                     AND instr(v.trail, ',' || e.id || ',') = 0",
                    cte = CTE_NAME,
                    max = self.max_hops
                )
            }
            Direction::Either => {
                let filter = type_filter(&mut params, "AND");
                format!(
                    "SELECT v.start_id, \
                     CASE WHEN e.source_id = v.end_id THEN e.target_id ELSE e.source_id END, \
                     v.depth + 1, v.trail || e.id || ',' \
                     FROM {cte} AS v JOIN edges AS e \
                     ON (e.source_id = v.end_id OR e.target_id = v.end_id) \
                     WHERE v.depth < {max}{filter} \
                     AND instr(v.trail, ',' || e.id || ',') = 0",
                    cte = CTE_NAME,
                    max = self.max_hops
                )
            }
        };

        let sql = format!(
            "WITH RECURSIVE {cte}(start_id, end_id, depth, trail) AS ({seeds} UNION ALL {step})",
            cte = CTE_NAME,
            seeds = seeds.join(" UNION ALL "),
        );

        Rendered {
            sql,
            params,
            is_json: false,
            has_aggregate: false,
        }
    }
}
