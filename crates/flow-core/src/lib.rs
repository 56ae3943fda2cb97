//! # flow-core: multi-commodity generalized flow data model
//!
//! Provides the graph primitives, problem frame and LP/MIP engine trait
//! that `flow-algo`'s pricing, column-generation and branch-and-bound
//! layers build on.
//!
//! ## Design philosophy
//!
//! The network is a directed hyper-graph: most arcs have a single tail, but
//! an arc may consume flow from several tail vertices (at independent
//! multipliers) to produce one unit of flow at its head. `Vertex`/`Arc` are
//! plain value types carrying a dense integer index; per-arc attributes
//! (cost, capacity, variable type) and per-vertex topology (outgoing-arc
//! lists) live in flat arrays or `IndexedMap`s keyed by those indices.
//!
//! ## Modules
//!
//! - [`graph`] - dense ids, vertices, arcs, hyper-trees and paths
//! - [`network`] - arc membership, topological order, hyper-graph flag
//! - [`problem`] - commodities, side constraints, the constraint stack
//! - [`solution`] - arc flow, path decomposition, primal/dual solutions
//! - [`lp`] - the black-box LP/MIP engine trait and its `good_lp` backend
//! - [`indexed`] / [`linked_list_map`] - allocation-free dense containers
//! - [`error`] - the unified `FlowError` type

pub mod error;
pub mod graph;
pub mod indexed;
pub mod linked_list_map;
pub mod lp;
pub mod network;
pub mod problem;
pub mod solution;
pub mod testing;

pub use error::{FlowError, FlowResult};
pub use graph::{Arc, ArcId, CommodityId, ConstraintId, HyperTree, Path, Tail, VarType, Vertex, VertexId};
pub use indexed::{Indexed, IndexedMap};
pub use linked_list_map::LinkedListMap;
pub use lp::{GoodLpEngine, GoodLpEngineFactory, LpEngine, LpEngineFactory, Relation, SolveOptions, SolveOutcome, SolveStatus};
pub use network::{Network, NetworkStats};
pub use problem::{Commodity, ConstraintType, Problem, SideConstraint};
pub use solution::{ArcFlowSolution, DualSolution, PathFlowEntry, PathFlowSolution, PrimalSolution};
