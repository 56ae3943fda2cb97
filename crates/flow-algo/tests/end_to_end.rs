//! End-to-end scenarios exercising the full solve pipeline (column
//! generation, pricing, RMP, branch-and-bound) against known-optimal
//! multi-commodity flow instances.

use flow_algo::{column_generation, get_flow, get_flow_for_commodity, BranchAndBoundParams, ColumnGenerationParams};
use flow_core::{Arc, ArcId, Commodity, CommodityId, ConstraintType, GoodLpEngineFactory, Problem, SideConstraint, VarType, Vertex, VertexId};

const MIP_SOLVER: GoodLpEngineFactory = GoodLpEngineFactory;

const EPS: f64 = 1e-4;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

fn v(n: usize) -> Vec<Vertex> {
    (0..n).map(|i| Vertex { id: VertexId::new(i) }).collect()
}

#[test]
fn simple_min_cost_flow_routes_along_the_two_cheapest_arcs() {
    let vertices = v(4);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(), // a1: v1->v2
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(), // a2: v1->v3
        Arc::simple(ArcId::new(2), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(), // a3: v2->v3
        Arc::simple(ArcId::new(3), VertexId::new(1), 1.0, VertexId::new(3)).unwrap(), // a4: v2->v4
        Arc::simple(ArcId::new(4), VertexId::new(2), 1.0, VertexId::new(3)).unwrap(), // a5: v3->v4
    ];
    let commodities = vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(3), 5.0, 5.0, 1e6).unwrap()];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0, 20.0],
        vec![100.0, 100.0, 100.0, 100.0, 100.0],
        vec![VarType::Continuous; 5],
        commodities,
    )
    .unwrap();

    let solution = flow_algo::optimize(&problem, &MIP_SOLVER, &BranchAndBoundParams::default()).unwrap();
    assert!(solution.is_fully_feasible());
    assert!(close(get_flow(&solution, ArcId::new(0)), 5.0));
    assert!(close(get_flow(&solution, ArcId::new(3)), 5.0));
    assert!(close(get_flow(&solution, ArcId::new(1)), 0.0));
    assert!(close(get_flow(&solution, ArcId::new(2)), 0.0));
    assert!(close(get_flow(&solution, ArcId::new(4)), 0.0));
    assert!(close(solution.objective, 10.0));
}

#[test]
fn capacity_forced_rerouting_splits_demand_between_two_commodities() {
    let vertices = v(4);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(2), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(1), 1.0, VertexId::new(3)).unwrap(),
        Arc::simple(ArcId::new(4), VertexId::new(2), 1.0, VertexId::new(3)).unwrap(),
    ];
    let commodities = vec![
        Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(3), 5.0, 5.0, 1e6).unwrap(),
        Commodity::new(CommodityId::new(1), VertexId::new(1), VertexId::new(3), 8.0, 8.0, 1e6).unwrap(),
    ];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0, 20.0],
        vec![100.0, 100.0, 100.0, 9.5, 100.0],
        vec![VarType::Continuous; 5],
        commodities,
    )
    .unwrap();

    let result = column_generation::run(&problem, &MIP_SOLVER, &ColumnGenerationParams::default(), Vec::new()).unwrap();
    assert!(result.rmp.primal.is_fully_feasible());

    let c1 = CommodityId::new(0);
    let c2 = CommodityId::new(1);
    assert!(close(get_flow_for_commodity(&result.pool, &result.rmp, c1, ArcId::new(0)), 1.5));
    assert!(close(get_flow_for_commodity(&result.pool, &result.rmp, c1, ArcId::new(1)), 3.5));
    assert!(close(get_flow_for_commodity(&result.pool, &result.rmp, c1, ArcId::new(3)), 1.5));
    assert!(close(get_flow_for_commodity(&result.pool, &result.rmp, c1, ArcId::new(4)), 3.5));
    assert!(close(get_flow_for_commodity(&result.pool, &result.rmp, c2, ArcId::new(3)), 8.0));
}

#[test]
fn side_constraint_plus_integral_arc_forces_a_suboptimal_but_feasible_reroute() {
    let vertices = v(4);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(2), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(1), 1.0, VertexId::new(3)).unwrap(),
        Arc::simple(ArcId::new(4), VertexId::new(2), 1.0, VertexId::new(3)).unwrap(),
    ];
    let commodities = vec![
        Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(3), 5.0, 5.0, 1e6).unwrap(),
        Commodity::new(CommodityId::new(1), VertexId::new(1), VertexId::new(3), 8.0, 8.0, 1e6).unwrap(),
    ];
    let mut problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0, 20.0],
        vec![100.0, 100.0, 100.0, 9.5, 100.0],
        vec![VarType::Continuous, VarType::Continuous, VarType::Continuous, VarType::Integer, VarType::Continuous],
        commodities,
    )
    .unwrap();
    let constraint = SideConstraint::new(
        flow_core::ConstraintId::new(0),
        vec![(ArcId::new(0), 1.0), (ArcId::new(2), 1.0)],
        ConstraintType::GreaterEqual,
        6.0,
        1e6,
    )
    .unwrap();
    problem.push_constraint(constraint);

    let solution = flow_algo::optimize(&problem, &MIP_SOLVER, &BranchAndBoundParams::default()).unwrap();
    assert!(solution.is_fully_feasible());
    assert!(close(get_flow(&solution, ArcId::new(0)), 3.5));
    assert!(close(get_flow(&solution, ArcId::new(1)), 1.5));
    assert!(close(get_flow(&solution, ArcId::new(2)), 2.5));
    assert!(close(get_flow(&solution, ArcId::new(3)), 9.0));
    assert!(close(get_flow(&solution, ArcId::new(4)), 4.0));
}

#[test]
fn generalized_flow_propagates_arc_multipliers_along_a_chain() {
    let vertices = v(5);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1000.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(1), 0.5, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(2), VertexId::new(2), 0.5, VertexId::new(3)).unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(3), 5.0, VertexId::new(4)).unwrap(),
    ];
    let commodities = vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(4), 10.0, 10.0, 1e6).unwrap()];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0],
        vec![1000.0, 1000.0, 1000.0, 1000.0],
        vec![VarType::Continuous; 4],
        commodities,
    )
    .unwrap();

    let solution = flow_algo::optimize(&problem, &MIP_SOLVER, &BranchAndBoundParams::default()).unwrap();
    assert!(solution.is_fully_feasible());
    assert!(close(get_flow(&solution, ArcId::new(0)), 12.5));
    assert!(close(get_flow(&solution, ArcId::new(1)), 25.0));
    assert!(close(get_flow(&solution, ArcId::new(2)), 50.0));
    assert!(close(get_flow(&solution, ArcId::new(3)), 10.0));
}

#[test]
fn hyper_arc_requires_matching_flow_on_every_tail() {
    // A two-tail hyper-arc whose head can only produce flow once both of its
    // tails are fed equally, fanning back in to a single sink.
    let vertices = v(5);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(),
        Arc::new(ArcId::new(2), vec![flow_core::Tail { vertex: VertexId::new(1), multiplier: 1.0 }, flow_core::Tail {
            vertex: VertexId::new(2),
            multiplier: 1.0,
        }], VertexId::new(3))
        .unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(3), 1.0, VertexId::new(4)).unwrap(),
    ];
    let commodities = vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(4), 10.0, 10.0, 1e6).unwrap()];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0],
        vec![100.0, 100.0, 100.0, 100.0],
        vec![VarType::Continuous; 4],
        commodities,
    )
    .unwrap();

    let solution = flow_algo::optimize(&problem, &MIP_SOLVER, &BranchAndBoundParams::default()).unwrap();
    assert!(solution.is_fully_feasible());
    assert!(close(get_flow(&solution, ArcId::new(0)), 10.0));
    assert!(close(get_flow(&solution, ArcId::new(1)), 10.0));
    assert!(close(get_flow(&solution, ArcId::new(2)), 10.0));
    assert!(close(get_flow(&solution, ArcId::new(3)), 10.0));
    assert!(close(solution.objective, 40.0));
}

#[test]
fn reduced_cost_fixing_drops_only_arcs_that_cannot_improve_on_the_cutoff() {
    let vertices = v(4);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(2), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(1), 1.0, VertexId::new(3)).unwrap(),
        Arc::simple(ArcId::new(4), VertexId::new(2), 1.0, VertexId::new(3)).unwrap(),
    ];
    let commodities = vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(3), 5.0, 5.0, 1e6).unwrap()];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0, 20.0],
        vec![100.0, 100.0, 100.0, 100.0, 100.0],
        vec![VarType::Continuous; 5],
        commodities,
    )
    .unwrap();

    let result = column_generation::run(&problem, &MIP_SOLVER, &ColumnGenerationParams::default(), Vec::new()).unwrap();
    let min_obj = result.min_obj.expect("non-hyper network yields a per-arc min-cost certificate");

    // a5 (v3->v4, cost 20) never belongs to a cheaper-than-10 s-t path, so a
    // cutoff at the known optimum must price it out.
    let filtered = problem.filter_arcs_by_reduced_cost(&min_obj, 10.0);
    assert!(!filtered.network().contains_arc(ArcId::new(4)));
    assert!(filtered.network().contains_arc(ArcId::new(0)));
    assert!(filtered.network().contains_arc(ArcId::new(3)));
}

#[test]
fn lagrangian_dual_bound_never_exceeds_the_converged_primal_objective() {
    let vertices = v(4);
    let arcs = vec![
        Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
        Arc::simple(ArcId::new(1), VertexId::new(0), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(2), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        Arc::simple(ArcId::new(3), VertexId::new(1), 1.0, VertexId::new(3)).unwrap(),
        Arc::simple(ArcId::new(4), VertexId::new(2), 1.0, VertexId::new(3)).unwrap(),
    ];
    let commodities = vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(3), 5.0, 5.0, 1e6).unwrap()];
    let problem = Problem::new(
        vertices,
        arcs,
        vec![1.0, 1.0, 1.0, 1.0, 20.0],
        vec![100.0, 100.0, 100.0, 100.0, 100.0],
        vec![VarType::Continuous; 5],
        commodities,
    )
    .unwrap();

    let result = column_generation::run(&problem, &MIP_SOLVER, &ColumnGenerationParams::default(), Vec::new()).unwrap();
    assert!(result.dual_bound <= result.rmp.primal.objective + EPS);
}
