//! Branch-and-bound coordinator: LP relaxation by column generation,
//! reduced-cost variable fixing, and (when the relaxation is fractional)
//! unbalanced branching over arc families with an artificial-variable right
//! branch.

use crate::column_generation::{self, ColumnGenerationParams};
use crate::exact_mip;
use flow_core::{Arc, ConstraintId, ConstraintType, FlowError, FlowResult, LpEngineFactory, Problem, PrimalSolution, SideConstraint, SolveOptions, VarType};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::info;

/// Which branching family an arc belongs to. The default classifier groups
/// arcs by head vertex, matching the suggested default in the design notes;
/// other classifiers (e.g. an item identifier in a bin-packing reduction)
/// are equally valid and just change the branch tree's shape.
pub type ArcFamily = i64;

#[derive(Clone)]
pub struct BranchAndBoundParams {
    pub lp_cg_params: ColumnGenerationParams,
    pub mip_options: SolveOptions,
    pub right_branch_penalty: f64,
    pub feas_tol: f64,
    pub obj_cutoff: f64,
    pub arc_to_family: Rc<dyn Fn(&Arc) -> ArcFamily>,
    pub max_num_branching_levels: i32,
}

impl Default for BranchAndBoundParams {
    fn default() -> Self {
        BranchAndBoundParams {
            lp_cg_params: ColumnGenerationParams::default(),
            mip_options: SolveOptions::default(),
            right_branch_penalty: 1e3,
            feas_tol: 1e-6,
            obj_cutoff: f64::INFINITY,
            arc_to_family: Rc::new(|arc: &Arc| arc.head.value() as i64),
            max_num_branching_levels: 20,
        }
    }
}

/// Entry point: §4.8 steps 1-7, recursing through `solve_node` until either
/// the LP relaxation is integer-feasible, branching levels run out, or the
/// arc set is exhausted.
pub fn optimize(problem: &Problem, mip_solver: &dyn LpEngineFactory, params: &BranchAndBoundParams) -> FlowResult<PrimalSolution> {
    if problem.commodities().is_empty() {
        return Err(FlowError::validation("Problem", 0, "branch-and-bound requires at least one commodity"));
    }
    if problem.network().num_included_arcs() == 0 {
        return Ok(exact_mip::empty_solution());
    }
    let mut cutoff = params.obj_cutoff;
    solve_node(problem, mip_solver, params, params.max_num_branching_levels, &mut cutoff, 0)
}

fn solve_node(
    problem: &Problem,
    mip_solver: &dyn LpEngineFactory,
    params: &BranchAndBoundParams,
    levels_left: i32,
    cutoff: &mut f64,
    depth: u32,
) -> FlowResult<PrimalSolution> {
    if problem.network().num_included_arcs() == 0 {
        return Ok(exact_mip::empty_solution());
    }

    let cg_result = column_generation::run(problem, mip_solver, &params.lp_cg_params, Vec::new())?;

    let mut filtered = match &cg_result.min_obj {
        Some(min_obj) => problem.filter_arcs_by_reduced_cost(min_obj, *cutoff),
        None => problem.filter_arcs(|_| true),
    };

    if filtered.network().num_included_arcs() == 0 {
        return Ok(exact_mip::empty_solution());
    }

    let integer_feasible = filtered.network().arcs().all(|arc| {
        if filtered.arc_var_type(arc.id) != VarType::Integer {
            true
        } else {
            let flow = cg_result.rmp.primal.arc_flow.flow(arc.id);
            (flow - flow.round()).abs() <= params.feas_tol
        }
    });

    if integer_feasible {
        info!(depth, dual_bound = cg_result.dual_bound, objective = cg_result.rmp.primal.objective, "branch level: LP relaxation already integer-feasible");
        return Ok(cg_result.rmp.primal);
    }

    if levels_left <= 0 {
        let exact = exact_mip::solve_exact(&filtered, mip_solver, &params.mip_options)?;
        info!(depth, objective = exact.objective, "branch level: branching budget exhausted, solved exactly");
        return Ok(exact);
    }

    let mut family_flow: HashMap<ArcFamily, f64> = HashMap::new();
    for arc in filtered.network().arcs() {
        let family = (params.arc_to_family)(arc);
        *family_flow.entry(family).or_insert(0.0) += cg_result.rmp.primal.arc_flow.flow(arc.id).abs();
    }
    let branching_families: std::collections::HashSet<ArcFamily> =
        family_flow.into_iter().filter(|&(_, flow)| flow < params.feas_tol).map(|(family, _)| family).collect();

    let branching_set: Vec<flow_core::ArcId> = filtered
        .network()
        .arcs()
        .filter(|arc| branching_families.contains(&(params.arc_to_family)(arc)))
        .map(|arc| arc.id)
        .collect();

    if branching_set.is_empty() {
        let exact = exact_mip::solve_exact(&filtered, mip_solver, &params.mip_options)?;
        info!(depth, objective = exact.objective, "branch level: no unused arc family to branch on, solved exactly");
        return Ok(exact);
    }

    info!(depth, branching_set_size = branching_set.len(), families = branching_families.len(), "branch level: unbalanced branching");

    let excluded: std::collections::HashSet<flow_core::ArcId> = branching_set.iter().copied().collect();
    let left_problem = filtered.filter_arcs(|arc| !excluded.contains(&arc.id));
    let left_solution = exact_mip::solve_exact(&left_problem, mip_solver, &params.mip_options)?;

    let candidate = if is_integer_certified(&left_problem) {
        left_solution.objective - 1.0
    } else {
        left_solution.objective
    };
    *cutoff = cutoff.min(candidate);

    let constraint_id = ConstraintId::new(filtered.constraints().len());
    let coefficients: Vec<(flow_core::ArcId, f64)> = branching_set.iter().map(|&arc| (arc, 1.0)).collect();
    let constraint =
        SideConstraint::new(constraint_id, coefficients, ConstraintType::GreaterEqual, 1.0, params.right_branch_penalty)?;
    filtered.push_constraint(constraint);
    let right_solution = solve_node(&filtered, mip_solver, params, levels_left - 1, cutoff, depth + 1)?;
    filtered.pop_constraint();

    Ok(if right_solution.objective <= left_solution.objective { right_solution } else { left_solution })
}

/// Whether every cost and bound in `problem` is integer-valued, so the
/// objective of any feasible solution is itself an integer (letting the
/// left-branch cutoff tighten by exactly 1).
fn is_integer_certified(problem: &Problem) -> bool {
    problem.network().arcs().all(|arc| {
        problem.arc_var_type(arc.id) == VarType::Integer && problem.arc_cost(arc.id).fract() == 0.0
    }) && problem
        .commodities()
        .iter()
        .all(|c| c.demand.fract() == 0.0 && c.capacity.fract() == 0.0 && c.violation_penalty.fract() == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{ArcId, Commodity, CommodityId, Vertex, VertexId};

    fn chain_problem(var_type: VarType) -> Problem {
        let vertices = vec![Vertex { id: VertexId::new(0) }, Vertex { id: VertexId::new(1) }, Vertex { id: VertexId::new(2) }];
        let arcs = vec![
            Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
            Arc::simple(ArcId::new(1), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        ];
        let commodities =
            vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(2), 5.0, 5.0, 1e3).unwrap()];
        Problem::new(vertices, arcs, vec![1.0, 1.0], vec![10.0, 10.0], vec![var_type; 2], commodities).unwrap()
    }

    #[test]
    fn continuous_chain_resolves_at_the_lp_relaxation() {
        let problem = chain_problem(VarType::Continuous);
        let solution = optimize(&problem, &flow_core::GoodLpEngineFactory, &BranchAndBoundParams::default()).unwrap();
        assert!((solution.objective - 10.0).abs() < 1e-6);
        assert!(solution.is_fully_feasible());
    }

    #[test]
    fn no_commodities_is_an_error() {
        let vertices = vec![Vertex { id: VertexId::new(0) }];
        let problem = Problem::new(vertices, vec![], vec![], vec![], vec![], vec![]).unwrap();
        let err = optimize(&problem, &flow_core::GoodLpEngineFactory, &BranchAndBoundParams::default()).unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));
    }

    #[test]
    fn no_arcs_returns_an_empty_solution() {
        let vertices = vec![Vertex { id: VertexId::new(0) }, Vertex { id: VertexId::new(1) }];
        let commodities =
            vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(1), 1.0, 1.0, 1e3).unwrap()];
        let problem = Problem::new(vertices, vec![], vec![], vec![], vec![], commodities).unwrap();
        let solution = optimize(&problem, &flow_core::GoodLpEngineFactory, &BranchAndBoundParams::default()).unwrap();
        assert_eq!(solution.objective, 0.0);
    }
}
