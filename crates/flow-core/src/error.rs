//! Unified error type for the flow column-generation stack.
//!
//! Mirrors the four error kinds laid out in the error-handling design:
//! construction-time validation, calling an operation in a context it
//! doesn't support, a structural precondition (acyclicity) being violated,
//! and the underlying LP/MIP engine reporting a failure we couldn't absorb
//! with an artificial/penalty variable. Every variant names the offending
//! object's index and the invariant it violates so callers don't have to
//! grep the message to figure out what broke.

use thiserror::Error;

/// Unified error type for all `flow-core` / `flow-algo` operations.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Raised at construction time: invalid bounds, empty tail list, demand
    /// exceeding capacity, unbalanced hyper-tree, incompatible arc sequence.
    #[error("validation error on {object} #{index}: {invariant}")]
    Validation {
        object: &'static str,
        index: usize,
        invariant: String,
    },

    /// Raised at call site: an operation was invoked in a context it does
    /// not support (e.g. `min_unit_flow_cost` on a hyper-graph).
    #[error("unsupported in this context: {0}")]
    UnsupportedInContext(String),

    /// Fatal to the current solve: a precondition the algorithm depends on
    /// (acyclicity) does not hold.
    #[error("structural error: {0}")]
    Structural(String),

    /// The underlying LP/MIP engine reported infeasible/unbounded/failed
    /// outside of a path where an artificial variable was supposed to
    /// absorb it.
    #[error("solver error: {0}")]
    Solver(String),
}

/// Convenience alias used throughout `flow-core` and `flow-algo`.
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    pub fn validation(object: &'static str, index: usize, invariant: impl Into<String>) -> Self {
        FlowError::Validation {
            object,
            index,
            invariant: invariant.into(),
        }
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Solver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_object_and_index() {
        let err = FlowError::validation("Commodity", 3, "demand exceeds capacity");
        let msg = err.to_string();
        assert!(msg.contains("Commodity"));
        assert!(msg.contains('3'));
        assert!(msg.contains("demand exceeds capacity"));
    }

    #[test]
    fn anyhow_conversion_becomes_solver_error() {
        let err: FlowError = anyhow::anyhow!("LP engine returned infeasible").into();
        assert!(matches!(err, FlowError::Solver(_)));
    }
}
