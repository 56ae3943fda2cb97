//! A tiny in-memory `LpEngine` for tests that shouldn't depend on an actual
//! solver backend being linked in - pricing and RMP unit tests across this
//! workspace build on it rather than each hand-rolling a stub.

use crate::error::FlowResult;
use crate::graph::VarType;
use crate::lp::{LpEngine, Relation, SolveOptions, SolveOutcome, SolveStatus};

struct VarSpec {
    lower: f64,
    objective: f64,
}

struct RowSpec {
    #[allow(dead_code)]
    coefficients: Vec<(usize, f64)>,
    #[allow(dead_code)]
    relation: Relation,
    #[allow(dead_code)]
    rhs: f64,
}

/// Reports every variable at its lower bound, with as many (always-zero)
/// row duals as rows were added. Useful for exercising row/variable wiring
/// without asserting anything about actual optimality.
#[derive(Default)]
pub struct MockEngine {
    pub last_options: Option<SolveOptions>,
    vars: Vec<VarSpec>,
    rows: Vec<RowSpec>,
}

impl LpEngine for MockEngine {
    fn add_variable(&mut self, _kind: VarType, lower: f64, _upper: f64) -> usize {
        self.vars.push(VarSpec { lower, objective: 0.0 });
        self.vars.len() - 1
    }

    fn set_objective_coefficient(&mut self, var: usize, coefficient: f64) {
        self.vars[var].objective = coefficient;
    }

    fn add_row(&mut self, coefficients: &[(usize, f64)], relation: Relation, rhs: f64) -> usize {
        self.rows.push(RowSpec { coefficients: coefficients.to_vec(), relation, rhs });
        self.rows.len() - 1
    }

    fn set_upper_bound(&mut self, _var: usize, _upper: f64) {}

    fn solve(&mut self, options: &SolveOptions) -> FlowResult<SolveOutcome> {
        self.last_options = Some(options.clone());
        let primal: Vec<f64> = self.vars.iter().map(|v| v.lower).collect();
        let objective = self.vars.iter().zip(&primal).map(|(v, &p)| v.objective * p).sum();
        Ok(SolveOutcome { status: SolveStatus::Optimal, objective, primal, duals: Some(vec![0.0; self.rows.len()]) })
    }
}
