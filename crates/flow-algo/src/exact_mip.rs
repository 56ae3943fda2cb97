//! Direct arc-commodity MIP formulation, bypassing column generation.
//!
//! Used by the branch-and-bound coordinator at leaf nodes (where RCVF has
//! already trimmed the network down to a size an exact solve handles
//! comfortably) and exposed directly as `optimize_by_mip_solver`.

use flow_core::{
    ArcFlowSolution, ArcId, CommodityId, ConstraintType, FlowError, FlowResult, LpEngineFactory, Problem,
    PrimalSolution, Relation, SolveOptions, VertexId,
};
use std::collections::HashMap;

/// Solve `problem` directly as one MIP over per-(commodity, arc) flow
/// variables, with the same artificial-slack treatment of demand/capacity
/// and side-constraint rows that the RMP uses.
pub fn solve_exact(problem: &Problem, mip_solver: &dyn LpEngineFactory, options: &SolveOptions) -> FlowResult<PrimalSolution> {
    let network = problem.network();
    let arc_ids: Vec<ArcId> = network.arcs().map(|a| a.id).collect();
    if arc_ids.is_empty() {
        return Ok(empty_solution());
    }
    if problem.commodities().is_empty() {
        return Err(FlowError::validation("Problem", 0, "branch-and-bound requires at least one commodity"));
    }

    let mut engine = mip_solver.new_engine();
    let mut vars: HashMap<(CommodityId, ArcId), usize> = HashMap::new();
    for commodity in problem.commodities() {
        for &arc_id in &arc_ids {
            let var = engine.add_variable(problem.arc_var_type(arc_id), 0.0, problem.arc_capacity(arc_id));
            engine.set_objective_coefficient(var, problem.arc_cost(arc_id));
            vars.insert((commodity.id, arc_id), var);
        }
    }

    // Per-commodity conservation at every vertex other than its own source/sink.
    for commodity in problem.commodities() {
        for v in 0..network.num_vertices() {
            let vertex = VertexId::new(v);
            if vertex == commodity.source || vertex == commodity.sink {
                continue;
            }
            let mut coeffs = Vec::new();
            for &arc_id in &arc_ids {
                let arc = network.arc(arc_id);
                let var = vars[&(commodity.id, arc_id)];
                if arc.head == vertex {
                    coeffs.push((var, 1.0));
                }
                for tail in arc.tails() {
                    if tail.vertex == vertex {
                        coeffs.push((var, -tail.multiplier));
                    }
                }
            }
            if !coeffs.is_empty() {
                engine.add_row(&coeffs, Relation::Equal, 0.0);
            }
        }
    }

    // Demand (equality, two-sided artificial) and capacity (upper bound) rows, keyed
    // on net inflow at each commodity's sink.
    let mut demand_under: HashMap<CommodityId, usize> = HashMap::new();
    let mut demand_over: HashMap<CommodityId, usize> = HashMap::new();
    for commodity in problem.commodities() {
        let mut coeffs = Vec::new();
        for &arc_id in &arc_ids {
            let arc = network.arc(arc_id);
            let var = vars[&(commodity.id, arc_id)];
            if arc.head == commodity.sink {
                coeffs.push((var, 1.0));
            }
            for tail in arc.tails() {
                if tail.vertex == commodity.sink {
                    coeffs.push((var, -tail.multiplier));
                }
            }
        }

        let under = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
        let over = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
        engine.set_objective_coefficient(under, commodity.violation_penalty);
        engine.set_objective_coefficient(over, commodity.violation_penalty);
        let mut demand_coeffs = coeffs.clone();
        demand_coeffs.push((under, 1.0));
        demand_coeffs.push((over, -1.0));
        engine.add_row(&demand_coeffs, Relation::Equal, commodity.demand);
        engine.add_row(&coeffs, Relation::LessEqual, commodity.capacity);

        demand_under.insert(commodity.id, under);
        demand_over.insert(commodity.id, over);
    }

    // Arc capacity aggregated across commodities.
    for &arc_id in &arc_ids {
        let coeffs: Vec<(usize, f64)> =
            problem.commodities().iter().map(|c| (vars[&(c.id, arc_id)], 1.0)).collect();
        engine.add_row(&coeffs, Relation::LessEqual, problem.arc_capacity(arc_id));
    }

    // Side constraints: coefficients apply to the aggregate (summed-over-commodities) arc flow.
    struct ConstraintVars {
        under: Option<usize>,
        over: Option<usize>,
    }
    let mut constraint_vars: HashMap<flow_core::ConstraintId, ConstraintVars> = HashMap::new();
    for constraint in problem.constraints() {
        let mut coeffs: Vec<(usize, f64)> = Vec::new();
        for &(arc_id, coeff) in &constraint.coefficients {
            if !network.contains_arc(arc_id) {
                continue;
            }
            for commodity in problem.commodities() {
                coeffs.push((vars[&(commodity.id, arc_id)], coeff));
            }
        }

        let (under, over) = match constraint.constraint_type {
            ConstraintType::LessEqual => {
                let over = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
                engine.set_objective_coefficient(over, constraint.violation_penalty);
                coeffs.push((over, -1.0));
                (None, Some(over))
            }
            ConstraintType::GreaterEqual => {
                let under = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
                engine.set_objective_coefficient(under, constraint.violation_penalty);
                coeffs.push((under, 1.0));
                (Some(under), None)
            }
            ConstraintType::Equal => {
                let under = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
                let over = engine.add_variable(flow_core::VarType::Continuous, 0.0, f64::INFINITY);
                engine.set_objective_coefficient(under, constraint.violation_penalty);
                engine.set_objective_coefficient(over, constraint.violation_penalty);
                coeffs.push((under, 1.0));
                coeffs.push((over, -1.0));
                (Some(under), Some(over))
            }
        };
        let relation = match constraint.constraint_type {
            ConstraintType::LessEqual => Relation::LessEqual,
            ConstraintType::GreaterEqual => Relation::GreaterEqual,
            ConstraintType::Equal => Relation::Equal,
        };
        engine.add_row(&coeffs, relation, constraint.rhs);
        constraint_vars.insert(constraint.id, ConstraintVars { under, over });
    }

    let outcome = engine.solve(options)?;

    let mut arc_flow: HashMap<ArcId, f64> = HashMap::new();
    for &arc_id in &arc_ids {
        let total: f64 = problem.commodities().iter().map(|c| outcome.primal[vars[&(c.id, arc_id)]]).sum();
        if total.abs() > 1e-12 {
            arc_flow.insert(arc_id, total);
        }
    }

    let commodity_violation: HashMap<CommodityId, f64> = demand_under
        .keys()
        .map(|&cid| (cid, outcome.primal[demand_under[&cid]] - outcome.primal[demand_over[&cid]]))
        .collect();

    let constraint_violation: HashMap<flow_core::ConstraintId, f64> = constraint_vars
        .iter()
        .map(|(&cid, vars)| {
            let u = vars.under.map(|v| outcome.primal[v]).unwrap_or(0.0);
            let o = vars.over.map(|v| outcome.primal[v]).unwrap_or(0.0);
            (cid, u - o)
        })
        .collect();

    Ok(PrimalSolution {
        arc_flow: ArcFlowSolution::new(arc_flow, outcome.objective),
        commodity_violation,
        constraint_violation,
        objective: outcome.objective,
    })
}

pub(crate) fn empty_solution() -> PrimalSolution {
    PrimalSolution {
        arc_flow: ArcFlowSolution::new(HashMap::new(), 0.0),
        commodity_violation: HashMap::new(),
        constraint_violation: HashMap::new(),
        objective: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{Arc, Commodity, Vertex, VarType};

    fn chain_problem() -> Problem {
        let vertices = vec![Vertex { id: VertexId::new(0) }, Vertex { id: VertexId::new(1) }, Vertex { id: VertexId::new(2) }];
        let arcs = vec![
            Arc::simple(ArcId::new(0), VertexId::new(0), 1.0, VertexId::new(1)).unwrap(),
            Arc::simple(ArcId::new(1), VertexId::new(1), 1.0, VertexId::new(2)).unwrap(),
        ];
        let commodities =
            vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(2), 5.0, 5.0, 1e3).unwrap()];
        Problem::new(vertices, arcs, vec![1.0, 2.0], vec![10.0, 10.0], vec![VarType::Continuous; 2], commodities).unwrap()
    }

    #[test]
    fn exact_solve_on_empty_network_returns_zero_solution() {
        let vertices = vec![Vertex { id: VertexId::new(0) }, Vertex { id: VertexId::new(1) }];
        let commodities =
            vec![Commodity::new(CommodityId::new(0), VertexId::new(0), VertexId::new(1), 1.0, 1.0, 1e3).unwrap()];
        let problem = Problem::new(vertices, vec![], vec![], vec![], vec![], commodities).unwrap();
        let solution = solve_exact(&problem, &flow_core::GoodLpEngineFactory, &SolveOptions::default()).unwrap();
        assert_eq!(solution.objective, 0.0);
    }

    #[test]
    fn exact_solve_routes_full_demand_along_the_only_chain() {
        let problem = chain_problem();
        let solution = solve_exact(&problem, &flow_core::GoodLpEngineFactory, &SolveOptions::default()).unwrap();
        assert!((solution.objective - 15.0).abs() < 1e-6);
        assert!(solution.is_fully_feasible());
        assert!((solution.arc_flow.flow(ArcId::new(0)) - 5.0).abs() < 1e-6);
        assert!((solution.arc_flow.flow(ArcId::new(1)) - 5.0).abs() < 1e-6);
    }
}
