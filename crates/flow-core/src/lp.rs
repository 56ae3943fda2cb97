//! Black-box LP/MIP engine abstraction and a `good_lp`/HiGHS-backed
//! implementation.
//!
//! Column generation and branch-and-bound talk to the RMP only through
//! `LpEngine`: add variables and rows, set bounds and objective
//! coefficients, solve, read back primal values and - when the solve was
//! linear - row duals. Swapping engines, or mocking one in a test, never
//! touches the pricing or branching code.

use crate::error::{FlowError, FlowResult};
use crate::graph::VarType;
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};
#[cfg(feature = "solver-highs")]
use good_lp::DualValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEqual,
    GreaterEqual,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub time_limit_seconds: Option<f64>,
    pub silent: bool,
    /// Ignore every variable's declared integrality and solve the pure LP
    /// relaxation. Used by column generation, which needs duals; exact
    /// branch-and-bound leaves fixes solved with `false`.
    pub relax_integrality: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions { time_limit_seconds: Some(60.0), silent: true, relax_integrality: false }
    }
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: f64,
    /// Indexed identically to the order variables were added in.
    pub primal: Vec<f64>,
    /// Indexed identically to the order rows were added in. `None` when
    /// the solve had unrelaxed integer variables, or the backend doesn't
    /// expose duals for this model.
    pub duals: Option<Vec<f64>>,
}

/// The capability set pricing and branch-and-bound require from an
/// external LP/MIP engine. Implementations own the translation to and
/// from whatever concrete solver API they wrap.
pub trait LpEngine {
    /// Declare a variable, returning a dense handle usable in
    /// `set_objective_coefficient`, `add_row` and `set_upper_bound`.
    fn add_variable(&mut self, kind: VarType, lower: f64, upper: f64) -> usize;

    fn set_objective_coefficient(&mut self, var: usize, coefficient: f64);

    /// Add a row `sum(coefficients) relation rhs`, returning a dense row
    /// handle whose position matches `SolveOutcome::duals`.
    fn add_row(&mut self, coefficients: &[(usize, f64)], relation: Relation, rhs: f64) -> usize;

    fn set_upper_bound(&mut self, var: usize, upper: f64);

    fn solve(&mut self, options: &SolveOptions) -> FlowResult<SolveOutcome>;
}

/// The external `mip_solver` handle callers pass to the solve entry points.
/// Column generation and branch-and-bound each need many independent
/// `LpEngine` sessions over their lifetime (one per CG iteration, one per
/// branch-and-bound leaf), so the handle is a factory that mints a fresh
/// engine on demand rather than a single reusable model.
pub trait LpEngineFactory {
    fn new_engine(&self) -> Box<dyn LpEngine>;
}

impl<F: Fn() -> Box<dyn LpEngine>> LpEngineFactory for F {
    fn new_engine(&self) -> Box<dyn LpEngine> {
        self()
    }
}

/// The default `mip_solver`: mints a fresh [`GoodLpEngine`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpEngineFactory;

impl LpEngineFactory for GoodLpEngineFactory {
    fn new_engine(&self) -> Box<dyn LpEngine> {
        Box::new(GoodLpEngine::new())
    }
}

#[derive(Debug, Clone)]
struct VarSpec {
    kind: VarType,
    lower: f64,
    upper: f64,
    objective: f64,
}

#[derive(Debug, Clone)]
struct RowSpec {
    coefficients: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
}

/// A minimizing LP/MIP engine backed by `good_lp`, defaulting to the HiGHS
/// backend (see the `solver-highs` / `solver-clarabel` features). The
/// model is specified incrementally via `LpEngine` and only actually built
/// and handed to the solver inside `solve`, so `relax_integrality` can
/// rebuild it with every integer variable's bound widened to continuous.
#[derive(Debug, Clone, Default)]
pub struct GoodLpEngine {
    vars: Vec<VarSpec>,
    rows: Vec<RowSpec>,
}

impl GoodLpEngine {
    pub fn new() -> Self {
        GoodLpEngine::default()
    }
}

impl LpEngine for GoodLpEngine {
    fn add_variable(&mut self, kind: VarType, lower: f64, upper: f64) -> usize {
        self.vars.push(VarSpec { kind, lower, upper, objective: 0.0 });
        self.vars.len() - 1
    }

    fn set_objective_coefficient(&mut self, var: usize, coefficient: f64) {
        self.vars[var].objective = coefficient;
    }

    fn add_row(&mut self, coefficients: &[(usize, f64)], relation: Relation, rhs: f64) -> usize {
        self.rows.push(RowSpec { coefficients: coefficients.to_vec(), relation, rhs });
        self.rows.len() - 1
    }

    fn set_upper_bound(&mut self, var: usize, upper: f64) {
        self.vars[var].upper = upper;
    }

    fn solve(&mut self, options: &SolveOptions) -> FlowResult<SolveOutcome> {
        let mut problem_vars = ProblemVariables::new();
        let mut handles: Vec<Variable> = Vec::with_capacity(self.vars.len());
        for spec in &self.vars {
            let mut builder = variable().min(spec.lower).max(spec.upper);
            if spec.kind == VarType::Integer && !options.relax_integrality {
                builder = builder.integer();
            }
            handles.push(problem_vars.add(builder));
        }

        let objective: Expression = self
            .vars
            .iter()
            .zip(handles.iter())
            .map(|(spec, &h)| spec.objective * h)
            .sum();

        #[cfg(feature = "solver-highs")]
        let mut model = problem_vars.minimise(objective).using(good_lp::solvers::highs::highs);
        #[cfg(all(not(feature = "solver-highs"), feature = "solver-clarabel"))]
        let mut model = problem_vars.minimise(objective).using(good_lp::solvers::clarabel::clarabel);

        #[cfg(feature = "solver-highs")]
        {
            if let Some(limit) = options.time_limit_seconds {
                model.set_time_limit(limit);
            }
            model.set_verbose(!options.silent);
        }
        #[cfg(not(feature = "solver-highs"))]
        {
            let _ = options.time_limit_seconds;
        }

        let mut row_refs = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let expr: Expression = row.coefficients.iter().map(|&(v, c)| c * handles[v]).sum();
            let reference = match row.relation {
                Relation::LessEqual => model.add_constraint(constraint!(expr <= row.rhs)),
                Relation::GreaterEqual => model.add_constraint(constraint!(expr >= row.rhs)),
                Relation::Equal => model.add_constraint(constraint!(expr == row.rhs)),
            };
            row_refs.push(reference);
        }

        let solution = model.solve().map_err(|e| FlowError::Solver(e.to_string()))?;

        let primal: Vec<f64> = handles.iter().map(|&h| solution.value(h)).collect();
        let objective_value: f64 = self
            .vars
            .iter()
            .zip(primal.iter())
            .map(|(spec, &v)| spec.objective * v)
            .sum();

        let all_continuous = options.relax_integrality || self.vars.iter().all(|v| v.kind == VarType::Continuous);
        // HiGHS exposes row duals through good_lp's `DualValues`; Clarabel
        // does not, so a Clarabel-only build reports no duals at all (see
        // `SolveOutcome::duals`'s doc comment).
        #[cfg(feature = "solver-highs")]
        let duals = if all_continuous {
            Some(row_refs.iter().map(|&r| solution.dual(r)).collect())
        } else {
            None
        };
        #[cfg(not(feature = "solver-highs"))]
        let duals = {
            let _ = all_continuous;
            None
        };

        Ok(SolveOutcome { status: SolveStatus::Optimal, objective: objective_value, primal, duals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    #[test]
    fn row_and_variable_handles_are_dense_and_ordered() {
        let mut engine = MockEngine::default();
        let a = engine.add_variable(VarType::Continuous, 0.0, 1.0);
        let b = engine.add_variable(VarType::Integer, 0.0, 1.0);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        let r0 = engine.add_row(&[(a, 1.0), (b, 1.0)], Relation::Equal, 1.0);
        assert_eq!(r0, 0);
    }
}
