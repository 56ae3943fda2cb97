//! Solution types: raw per-arc flow, its decomposition into per-commodity
//! paths, the aggregated primal solution (with violation penalties folded
//! in), and the four dual maps a linear RMP solve exposes to pricing.

use crate::error::{FlowError, FlowResult};
use crate::graph::{Arc, ArcId, CommodityId, ConstraintId, Path, VertexId};
use crate::indexed::Indexed;
use std::collections::HashMap;
use std::fmt;

const FLOW_EPS: f64 = 1e-9;

/// Raw per-arc flow values, as handed back by the LP/MIP engine (summed
/// across whichever columns carried flow over that arc).
#[derive(Debug, Clone)]
pub struct ArcFlowSolution {
    flow: HashMap<ArcId, f64>,
    objective: f64,
}

impl ArcFlowSolution {
    pub fn new(flow: HashMap<ArcId, f64>, objective: f64) -> Self {
        ArcFlowSolution { flow, objective }
    }

    pub fn flow(&self, arc: ArcId) -> f64 {
        self.flow.get(&arc).copied().unwrap_or(0.0)
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn arcs_with_flow(&self) -> impl Iterator<Item = (ArcId, f64)> + '_ {
        self.flow.iter().filter(|&(_, &f)| f.abs() > FLOW_EPS).map(|(&a, &f)| (a, f))
    }
}

/// One commodity's flow along a single path, as produced by flow
/// decomposition or taken directly from a priced `Path` column.
#[derive(Debug, Clone)]
pub struct PathFlowEntry {
    pub commodity: CommodityId,
    pub path: Path,
    pub flow: f64,
}

/// A per-commodity decomposition of arc flow into source-to-sink paths.
#[derive(Debug, Clone, Default)]
pub struct PathFlowSolution {
    entries: Vec<PathFlowEntry>,
}

impl PathFlowSolution {
    pub fn new(entries: Vec<PathFlowEntry>) -> Self {
        PathFlowSolution { entries }
    }

    pub fn entries(&self) -> &[PathFlowEntry] {
        &self.entries
    }

    pub fn total_flow_for(&self, commodity: CommodityId) -> f64 {
        self.entries.iter().filter(|e| e.commodity == commodity).map(|e| e.flow).sum()
    }

    /// Classic flow decomposition: repeatedly find a source-to-sink path
    /// along arcs with positive residual flow, subtract the path's
    /// bottleneck flow from the residual, and repeat until none remains.
    /// Simple-arc graphs only — a hyper-arc carrying flow has no single
    /// "path" interpretation.
    pub fn decompose(
        arc_table: &[Arc],
        commodity: CommodityId,
        source: VertexId,
        sink: VertexId,
        arc_flow: &HashMap<ArcId, f64>,
    ) -> FlowResult<PathFlowSolution> {
        let mut residual: HashMap<ArcId, f64> = arc_flow
            .iter()
            .filter(|&(_, &f)| f.abs() > FLOW_EPS)
            .map(|(&a, &f)| (a, f))
            .collect();

        for (&arc_id, _) in residual.iter() {
            if arc_table[arc_id.index()].is_hyper() {
                return Err(FlowError::UnsupportedInContext(format!(
                    "flow decomposition requires simple arcs; arc {} is a hyper-arc",
                    arc_id.0
                )));
            }
        }

        let mut entries = Vec::new();
        let max_rounds = residual.len() + 1;
        for _ in 0..max_rounds {
            if residual.values().all(|&f| f.abs() <= FLOW_EPS) {
                break;
            }
            let Some(sequence) = find_positive_flow_path(arc_table, &residual, source, sink) else {
                break;
            };
            let bottleneck = sequence
                .iter()
                .map(|&a| residual.get(&a).copied().unwrap_or(0.0))
                .fold(f64::INFINITY, f64::min);
            if !(bottleneck > FLOW_EPS) {
                break;
            }
            for &a in &sequence {
                *residual.get_mut(&a).unwrap() -= bottleneck;
            }
            let path = Path::from_sequence(arc_table, sequence)?;
            entries.push(PathFlowEntry { commodity, path, flow: bottleneck });
        }

        Ok(PathFlowSolution { entries })
    }
}

/// DFS for any source-to-sink walk using only arcs with positive residual
/// flow (acyclic in practice since residual-flow subgraphs of an optimal
/// solution don't carry directed cycles, but we guard with a visited set
/// regardless).
fn find_positive_flow_path(
    arc_table: &[Arc],
    residual: &HashMap<ArcId, f64>,
    source: VertexId,
    sink: VertexId,
) -> Option<Vec<ArcId>> {
    fn dfs(
        arc_table: &[Arc],
        residual: &HashMap<ArcId, f64>,
        current: VertexId,
        sink: VertexId,
        visited: &mut Vec<bool>,
        path: &mut Vec<ArcId>,
    ) -> bool {
        if current == sink {
            return true;
        }
        for (idx, arc) in arc_table.iter().enumerate() {
            if arc.is_hyper() || arc.simple_tail() != current {
                continue;
            }
            if residual.get(&arc.id).copied().unwrap_or(0.0) <= FLOW_EPS {
                continue;
            }
            if visited[arc.head.index()] {
                continue;
            }
            visited[arc.head.index()] = true;
            path.push(arc.id);
            if dfs(arc_table, residual, arc.head, sink, visited, path) {
                return true;
            }
            path.pop();
            let _ = idx;
        }
        false
    }

    let num_vertices = arc_table.iter().map(|a| a.head.index()).max().unwrap_or(0) + 1;
    let mut visited = vec![false; num_vertices.max(source.index() + 1).max(sink.index() + 1)];
    visited[source.index()] = true;
    let mut path = Vec::new();
    if dfs(arc_table, residual, source, sink, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

/// The aggregated primal solution: arc flow plus whatever demand/side
/// constraint violations the solve left on artificial variables.
#[derive(Debug, Clone)]
pub struct PrimalSolution {
    pub arc_flow: ArcFlowSolution,
    pub commodity_violation: HashMap<CommodityId, f64>,
    pub constraint_violation: HashMap<ConstraintId, f64>,
    pub objective: f64,
}

impl PrimalSolution {
    pub fn commodity_violation(&self, commodity: CommodityId) -> f64 {
        self.commodity_violation.get(&commodity).copied().unwrap_or(0.0)
    }

    pub fn constraint_violation(&self, constraint: ConstraintId) -> f64 {
        self.constraint_violation.get(&constraint).copied().unwrap_or(0.0)
    }

    pub fn is_fully_feasible(&self) -> bool {
        self.commodity_violation.values().all(|&v| v.abs() <= FLOW_EPS)
            && self.constraint_violation.values().all(|&v| v.abs() <= FLOW_EPS)
    }

    pub fn summary(&self) -> String {
        format!(
            "objective={:.6} arcs_with_flow={} commodity_violations={} constraint_violations={}",
            self.objective,
            self.arc_flow.arcs_with_flow().count(),
            self.commodity_violation.values().filter(|v| v.abs() > FLOW_EPS).count(),
            self.constraint_violation.values().filter(|v| v.abs() > FLOW_EPS).count(),
        )
    }
}

impl fmt::Display for PrimalSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// The four dual maps a linear RMP solve exposes: the demand-satisfaction
/// row per commodity, the commodity-capacity row per commodity, the arc
/// capacity row per arc, and the side-constraint row per constraint. Only
/// meaningful when the RMP was solved as a linear relaxation.
#[derive(Debug, Clone, Default)]
pub struct DualSolution {
    pub demand_duals: HashMap<CommodityId, f64>,
    pub commodity_capacity_duals: HashMap<CommodityId, f64>,
    pub arc_capacity_duals: HashMap<ArcId, f64>,
    pub constraint_duals: HashMap<ConstraintId, f64>,
}

impl DualSolution {
    pub fn demand_dual(&self, commodity: CommodityId) -> f64 {
        self.demand_duals.get(&commodity).copied().unwrap_or(0.0)
    }

    pub fn commodity_capacity_dual(&self, commodity: CommodityId) -> f64 {
        self.commodity_capacity_duals.get(&commodity).copied().unwrap_or(0.0)
    }

    pub fn arc_capacity_dual(&self, arc: ArcId) -> f64 {
        self.arc_capacity_duals.get(&arc).copied().unwrap_or(0.0)
    }

    pub fn constraint_dual(&self, constraint: ConstraintId) -> f64 {
        self.constraint_duals.get(&constraint).copied().unwrap_or(0.0)
    }

    pub fn summary(&self) -> String {
        format!(
            "demand_duals={} commodity_capacity_duals={} arc_capacity_duals={} constraint_duals={}",
            self.demand_duals.len(),
            self.commodity_capacity_duals.len(),
            self.arc_capacity_duals.len(),
            self.constraint_duals.len(),
        )
    }
}

impl fmt::Display for DualSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn arc_flow_solution_ignores_near_zero_entries() {
        let mut flow = Map::new();
        flow.insert(ArcId::new(0), 3.0);
        flow.insert(ArcId::new(1), 1e-12);
        let sol = ArcFlowSolution::new(flow, 30.0);
        assert_eq!(sol.flow(ArcId::new(0)), 3.0);
        assert_eq!(sol.arcs_with_flow().count(), 1);
    }

    #[test]
    fn decompose_splits_two_parallel_paths() {
        // v0 -a0-> v1 -a1-> v2  and  v0 -a2-> v2, both carrying flow to v2.
        let arcs = vec![
            Arc::simple(ArcId::new(0), v(0), 1.0, v(1)).unwrap(),
            Arc::simple(ArcId::new(1), v(1), 1.0, v(2)).unwrap(),
            Arc::simple(ArcId::new(2), v(0), 1.0, v(2)).unwrap(),
        ];
        let mut flow = Map::new();
        flow.insert(ArcId::new(0), 4.0);
        flow.insert(ArcId::new(1), 4.0);
        flow.insert(ArcId::new(2), 6.0);

        let decomposed = PathFlowSolution::decompose(&arcs, CommodityId::new(0), v(0), v(2), &flow).unwrap();
        assert_eq!(decomposed.total_flow_for(CommodityId::new(0)), 10.0);
        assert_eq!(decomposed.entries().len(), 2);
    }

    #[test]
    fn decompose_rejects_hyper_arcs() {
        let arcs = vec![Arc::new(
            ArcId::new(0),
            vec![
                crate::graph::Tail { vertex: v(0), multiplier: 1.0 },
                crate::graph::Tail { vertex: v(1), multiplier: 1.0 },
            ],
            v(2),
        )
        .unwrap()];
        let mut flow = Map::new();
        flow.insert(ArcId::new(0), 2.0);
        let err = PathFlowSolution::decompose(&arcs, CommodityId::new(0), v(0), v(2), &flow).unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedInContext(_)));
    }

    #[test]
    fn primal_solution_summary_counts_violations() {
        let sol = PrimalSolution {
            arc_flow: ArcFlowSolution::new(Map::new(), 42.0),
            commodity_violation: {
                let mut m = Map::new();
                m.insert(CommodityId::new(0), 2.5);
                m
            },
            constraint_violation: Map::new(),
            objective: 42.0,
        };
        assert!(!sol.is_fully_feasible());
        assert!(sol.summary().contains("objective=42"));
    }
}
