//! # flow-algo: multi-commodity generalized-flow column generation
//!
//! Builds on [`flow_core`]'s network/problem data model to provide:
//!
//! - a bidirectional generalized shortest-path pricing engine
//!   ([`shortest_path`]),
//! - the restricted master problem and its column pool ([`column`],
//!   [`rmp`]),
//! - the pricing oracle and Lagrangian dual bound ([`pricing`]),
//! - the column-generation driver that alternates the two
//!   ([`column_generation`]),
//! - a direct arc-commodity MIP formulation for exact solves
//!   ([`exact_mip`]), and
//! - the branch-and-bound coordinator that ties it all together with
//!   reduced-cost variable fixing and unbalanced branching
//!   ([`branch_and_bound`]).
//!
//! The four top-level functions below mirror the external solve entry
//! points: [`optimize`] runs the full coordinator, [`optimize_by_mip_solver`]
//! solves exactly with no column generation, [`optimize_linear_relaxation`]
//! stops at the LP relaxation, and [`filter_arcs_by_reduced_cost`] exposes
//! RCVF standalone.

pub mod branch_and_bound;
pub mod column;
pub mod column_generation;
pub mod exact_mip;
pub mod pricing;
pub mod rmp;
pub mod shortest_path;

pub use branch_and_bound::{ArcFamily, BranchAndBoundParams};
pub use column::{Column, ColumnId, ColumnPool};
pub use column_generation::{ColumnGenerationParams, ColumnGenerationResult};
pub use pricing::{BasisKind, PricedColumn, PricingOutcome};
pub use rmp::RmpSolution;
pub use shortest_path::ShortestPathGenerator;

use flow_core::{FlowResult, IndexedMap, LpEngineFactory, Problem, PrimalSolution, SolveOptions};
pub use flow_core::{GoodLpEngineFactory, LpEngine};
use std::collections::HashMap;

/// Solve `problem` to (approximate) optimality via the full branch-and-bound
/// coordinator: LP relaxation by column generation, reduced-cost variable
/// fixing, then unbalanced branching where the relaxation is fractional.
pub fn optimize(problem: &Problem, mip_solver: &dyn LpEngineFactory, params: &BranchAndBoundParams) -> FlowResult<PrimalSolution> {
    branch_and_bound::optimize(problem, mip_solver, params)
}

/// Solve `problem` directly with the exact arc-commodity MIP, bypassing
/// column generation entirely.
pub fn optimize_by_mip_solver(problem: &Problem, mip_solver: &dyn LpEngineFactory, time_limit_seconds: Option<f64>) -> FlowResult<PrimalSolution> {
    let options = SolveOptions { time_limit_seconds, silent: true, relax_integrality: false };
    exact_mip::solve_exact(problem, mip_solver, &options)
}

/// Solve only the LP relaxation of `problem`, either via column generation
/// (`use_column_generation = true`) or by relaxing the direct arc-commodity
/// MIP in one shot.
pub fn optimize_linear_relaxation(
    problem: &Problem,
    mip_solver: &dyn LpEngineFactory,
    params: &ColumnGenerationParams,
    use_column_generation: bool,
) -> FlowResult<PrimalSolution> {
    if use_column_generation {
        let result = column_generation::run(problem, mip_solver, params, Vec::new())?;
        Ok(result.rmp.primal)
    } else {
        let mut options = params.solve_options.clone();
        options.relax_integrality = true;
        exact_mip::solve_exact(problem, mip_solver, &options)
    }
}

/// Run column generation to get a per-arc RCVF certificate, then return the
/// filtered `Problem` with every arc whose `min_obj(a) > cutoff` removed.
pub fn filter_arcs_by_reduced_cost(problem: &Problem, mip_solver: &dyn LpEngineFactory, params: &ColumnGenerationParams, cutoff: f64) -> FlowResult<Problem> {
    let result = column_generation::run(problem, mip_solver, params, Vec::new())?;
    Ok(match &result.min_obj {
        Some(min_obj) => problem.filter_arcs_by_reduced_cost(min_obj, cutoff),
        None => problem.filter_arcs(|_| true),
    })
}

/// Flow carried by `arc` in `solution`, aggregated over every commodity.
pub fn get_flow(solution: &PrimalSolution, arc: flow_core::ArcId) -> f64 {
    solution.arc_flow.flow(arc)
}

/// This data model only tracks aggregate per-arc flow (RMP columns are
/// per-commodity, but the LP only constrains their sum on shared arcs), so
/// the per-commodity flow query decomposes the commodity's own RMP columns
/// at the requested arc rather than reading a per-commodity flow table.
pub fn get_flow_for_commodity(pool: &ColumnPool, rmp: &RmpSolution, commodity: flow_core::CommodityId, arc: flow_core::ArcId) -> f64 {
    pool.for_commodity(commodity)
        .filter_map(|column| column.tree.multiplicity(arc).map(|mult| mult * rmp.column_values.get(&column.id).copied().unwrap_or(0.0)))
        .sum()
}

pub fn get_obj_val(solution: &PrimalSolution) -> f64 {
    solution.objective
}

/// Decompose `commodity`'s share of `solution`'s arc flow into source-to-sink
/// paths (simple-arc networks only; see
/// [`flow_core::PathFlowSolution::decompose`]).
pub fn get_path_to_flow_map(
    problem: &Problem,
    solution: &PrimalSolution,
    commodity: flow_core::CommodityId,
) -> FlowResult<flow_core::PathFlowSolution> {
    let c = problem.commodity(commodity);
    let arc_flow: HashMap<flow_core::ArcId, f64> = solution.arc_flow.arcs_with_flow().collect();
    flow_core::PathFlowSolution::decompose(problem.network().all_arcs(), commodity, c.source, c.sink, &arc_flow)
}

/// Shared, reusable per-commodity shortest-path state, keyed for reuse
/// across repeated `filter_arcs_by_reduced_cost`/`optimize_linear_relaxation`
/// calls against the same commodity set.
pub type Generators = HashMap<flow_core::CommodityId, ShortestPathGenerator>;

/// Per-arc reduced cost under `duals`, exposed standalone for callers that
/// want to build their own pricing loop on top of [`pricing::price`].
pub fn per_arc_reduced_cost(problem: &Problem, duals: &flow_core::DualSolution) -> IndexedMap<flow_core::ArcId, f64> {
    pricing::per_arc_reduced_cost(problem, problem.network(), duals)
}
