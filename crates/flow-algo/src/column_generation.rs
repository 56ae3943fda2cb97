//! Column-generation driver: alternates restricted-master LP solves with
//! pricing until no improving column remains, maintaining the column pool
//! and its retention policy across iterations.

use crate::column::{ColumnId, ColumnPool};
use crate::pricing::{self, BasisKind};
use crate::rmp::{self, RmpSolution};
use crate::shortest_path::ShortestPathGenerator;
use flow_core::{
    ArcId, CommodityId, DualSolution, FlowError, FlowResult, HyperTree, IndexedMap, LpEngineFactory, Problem,
    SolveOptions, VarType,
};
use std::collections::HashMap;
use tracing::debug;

const COLUMN_VALUE_EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ColumnGenerationParams {
    pub basis: BasisKind,
    /// A priced column is added only if its reduced cost is strictly below
    /// this (normally a small negative tolerance, not exactly zero).
    pub min_rc_to_stop: f64,
    /// A column whose RMP value stays within `COLUMN_VALUE_EPS` of zero for
    /// more than this many consecutive iterations is deactivated.
    pub num_zero_flow_iter_delete_column: u32,
    pub max_iterations: usize,
    pub solve_options: SolveOptions,
}

impl Default for ColumnGenerationParams {
    fn default() -> Self {
        ColumnGenerationParams {
            basis: BasisKind::PathFlow,
            min_rc_to_stop: -1e-6,
            num_zero_flow_iter_delete_column: 20,
            max_iterations: 1000,
            solve_options: SolveOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnGenerationResult {
    pub rmp: RmpSolution,
    pub dual_bound: f64,
    pub min_obj: Option<IndexedMap<ArcId, f64>>,
    pub pool: ColumnPool,
    pub iterations: usize,
}

/// Add a priced column to `pool` unless it is redundant: skip it if (a) the
/// tree no longer fits the current (possibly RCVF-filtered) network, or (b)
/// an identical `(commodity, tree)` pair is already in the pool.
pub fn try_add_column(
    pool: &mut ColumnPool,
    problem: &Problem,
    commodity: CommodityId,
    tree: HyperTree,
    var_type: VarType,
    cost: f64,
) -> Option<ColumnId> {
    if !tree.is_contained_in(|arc| problem.network().contains_arc(arc)) {
        return None;
    }
    let duplicate = pool.for_commodity(commodity).any(|existing| trees_equal(&existing.tree, &tree));
    if duplicate {
        return None;
    }
    Some(pool.push(commodity, tree, var_type, cost))
}

fn trees_equal(a: &HyperTree, b: &HyperTree) -> bool {
    a.head() == b.head() && a.arc_multiplicities() == b.arc_multiplicities()
}

/// Run column generation to optimality (or until `max_iterations` is
/// exhausted), seeding the pool with `initial_columns`.
pub fn run(
    problem: &Problem,
    mip_solver: &dyn LpEngineFactory,
    params: &ColumnGenerationParams,
    initial_columns: Vec<(CommodityId, HyperTree, VarType, f64)>,
) -> FlowResult<ColumnGenerationResult> {
    let mut pool = ColumnPool::new();
    for (commodity, tree, var_type, cost) in initial_columns {
        try_add_column(&mut pool, problem, commodity, tree, var_type, cost);
    }

    let mut generators: HashMap<CommodityId, ShortestPathGenerator> = HashMap::new();
    let mut zero_flow_streak: HashMap<ColumnId, u32> = HashMap::new();

    let mut relaxed_options = params.solve_options.clone();
    relaxed_options.relax_integrality = true;

    let mut last_rmp: Option<RmpSolution> = None;
    let mut last_dual_bound = 0.0;
    let mut last_min_obj = None;
    let mut iterations = 0;

    for iteration in 0..params.max_iterations.max(1) {
        iterations = iteration + 1;

        let mut engine = mip_solver.new_engine();
        let rmp_solution = rmp::solve_rmp(problem, &pool, &mut *engine, &relaxed_options)?;

        let duals = rmp_solution
            .duals
            .clone()
            .ok_or_else(|| FlowError::Solver("restricted master relaxation did not return duals".into()))?;

        update_retention(&mut pool, &rmp_solution, &mut zero_flow_streak, params.num_zero_flow_iter_delete_column);

        let outcome = pricing::price(problem, &mut generators, &duals, params.basis, params.min_rc_to_stop)?;
        last_dual_bound = outcome.dual_bound;
        last_min_obj = outcome.min_obj.clone();

        debug!(
            iteration,
            dual_bound = outcome.dual_bound,
            priced_columns = outcome.columns.len(),
            pool_size = pool.len(),
            "column generation iteration"
        );

        last_rmp = Some(rmp_solution);

        if outcome.columns.is_empty() {
            break;
        }

        let mut added_any = false;
        for column in outcome.columns {
            if let Some(id) = try_add_column(&mut pool, problem, column.commodity, column.tree, column.var_type, column.cost) {
                zero_flow_streak.insert(id, 0);
                added_any = true;
            }
        }
        if !added_any {
            break;
        }
    }

    let rmp_solution = last_rmp.ok_or_else(|| FlowError::Solver("column generation never solved an RMP".into()))?;

    Ok(ColumnGenerationResult { rmp: rmp_solution, dual_bound: last_dual_bound, min_obj: last_min_obj, pool, iterations })
}

fn update_retention(
    pool: &mut ColumnPool,
    rmp_solution: &RmpSolution,
    zero_flow_streak: &mut HashMap<ColumnId, u32>,
    threshold: u32,
) {
    let mut to_deactivate = Vec::new();
    for (&id, &value) in &rmp_solution.column_values {
        let streak = if value.abs() <= COLUMN_VALUE_EPS {
            let entry = zero_flow_streak.entry(id).or_insert(0);
            *entry += 1;
            *entry
        } else {
            zero_flow_streak.insert(id, 0);
            0
        };
        if streak > threshold {
            to_deactivate.push(id);
        }
    }
    for id in to_deactivate {
        pool.deactivate(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{Arc, ArcId as FArcId, Commodity, CommodityId as FCommodityId, Vertex, VertexId};

    fn chain_problem() -> Problem {
        let vertices = vec![Vertex { id: VertexId::new(0) }, Vertex { id: VertexId::new(1) }, Vertex { id: VertexId::new(2) }];
        let arcs = vec![
            Arc::simple(FArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
            Arc::simple(FArcId::new(1), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        ];
        let commodities =
            vec![Commodity::new(FCommodityId::new(0), VertexId::new(0), VertexId::new(2), 5.0, 5.0, 1e3).unwrap()];
        Problem::new(vertices, arcs, vec![1.0, 1.0], vec![10.0, 10.0], vec![VarType::Continuous; 2], commodities).unwrap()
    }

    #[test]
    fn duplicate_tree_is_not_added_twice() {
        let problem = chain_problem();
        let mut pool = ColumnPool::new();
        let arcs = problem.network().all_arcs().to_vec();
        let mut m = std::collections::HashMap::new();
        m.insert(FArcId::new(0), 1.0);
        m.insert(FArcId::new(1), 1.0);
        let tree = HyperTree::from_arcs(&arcs, m.clone()).unwrap();
        let tree2 = HyperTree::from_arcs(&arcs, m).unwrap();

        let first = try_add_column(&mut pool, &problem, FCommodityId::new(0), tree, VarType::Continuous, 2.0);
        let second = try_add_column(&mut pool, &problem, FCommodityId::new(0), tree2, VarType::Continuous, 2.0);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(pool.len(), 1);
    }
}
