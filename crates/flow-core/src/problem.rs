//! `Problem`: a multi-commodity generalized-flow instance — immutable arc
//! topology and costs, a commodity list, and a push/pop stack of side
//! constraints layered on top.
//!
//! Arc/vertex data is "exclusively owned" by `Problem` in the sense that it
//! is the only place the per-arc cost/capacity/var-type arrays live; the
//! `Network` it hands out is a cheap view over the same `Rc`-shared
//! topology, filtered down to whichever arcs are currently relevant.

use crate::error::{FlowError, FlowResult};
use crate::graph::{Arc, ArcId, CommodityId, ConstraintId, VarType, Vertex, VertexId};
use crate::indexed::{Indexed, IndexedMap};
use crate::linked_list_map::LinkedListMap;
use crate::network::Network;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    LessEqual,
    GreaterEqual,
    Equal,
}

/// A commodity: a single-source single-sink demand with an optional
/// capacity above the required demand and a penalty for leaving demand
/// unserved.
#[derive(Debug, Clone)]
pub struct Commodity {
    pub id: CommodityId,
    pub source: VertexId,
    pub sink: VertexId,
    pub demand: f64,
    pub capacity: f64,
    pub violation_penalty: f64,
}

impl Commodity {
    pub fn new(
        id: CommodityId,
        source: VertexId,
        sink: VertexId,
        demand: f64,
        capacity: f64,
        violation_penalty: f64,
    ) -> FlowResult<Self> {
        if !(capacity.is_finite()) {
            return Err(FlowError::validation(
                "Commodity",
                id.0,
                "capacity must be finite",
            ));
        }
        if demand < 0.0 {
            return Err(FlowError::validation(
                "Commodity",
                id.0,
                "demand must be non-negative",
            ));
        }
        if demand > capacity {
            return Err(FlowError::validation(
                "Commodity",
                id.0,
                format!("demand {demand} exceeds capacity {capacity}"),
            ));
        }
        if violation_penalty < 0.0 {
            return Err(FlowError::validation(
                "Commodity",
                id.0,
                "violation penalty must be non-negative",
            ));
        }
        Ok(Commodity { id, source, sink, demand, capacity, violation_penalty })
    }
}

/// A linear side constraint over arc flow: `sum(coeff[a] * flow(a)) <=/=/>= rhs`,
/// with an artificial variable (weighted by `violation_penalty`) absorbing
/// infeasibility rather than failing the RMP solve outright.
#[derive(Debug, Clone)]
pub struct SideConstraint {
    pub id: ConstraintId,
    pub coefficients: Vec<(ArcId, f64)>,
    pub constraint_type: ConstraintType,
    pub rhs: f64,
    pub violation_penalty: f64,
}

impl SideConstraint {
    pub fn new(
        id: ConstraintId,
        coefficients: Vec<(ArcId, f64)>,
        constraint_type: ConstraintType,
        rhs: f64,
        violation_penalty: f64,
    ) -> FlowResult<Self> {
        if coefficients.is_empty() {
            return Err(FlowError::validation(
                "SideConstraint",
                id.0,
                "coefficient list must be non-empty",
            ));
        }
        if violation_penalty < 0.0 {
            return Err(FlowError::validation(
                "SideConstraint",
                id.0,
                "violation penalty must be non-negative",
            ));
        }
        Ok(SideConstraint { id, coefficients, constraint_type, rhs, violation_penalty })
    }
}

/// The immutable, shareable part of a `Problem`: topology, per-arc
/// attributes, commodities. Held behind an `Rc` so `Problem::filter_arcs`
/// never copies it.
struct ProblemFrame {
    vertices: Rc<Vec<Vertex>>,
    arcs: Rc<Vec<Arc>>,
    arc_cost: Vec<f64>,
    arc_capacity: Vec<f64>,
    arc_var_type: Vec<VarType>,
    commodities: Vec<Commodity>,
}

pub struct Problem {
    frame: Rc<ProblemFrame>,
    network: Network,
    constraints: Vec<SideConstraint>,
    /// per-arc secondary index of (constraint stack depth, constraint id,
    /// coefficient), so popping a constraint can undo exactly the entries
    /// it pushed without touching any other arc's list.
    arc_constraint_index: LinkedListMap<(usize, ConstraintId, f64)>,
}

impl Problem {
    pub fn new(
        vertices: Vec<Vertex>,
        arcs: Vec<Arc>,
        arc_cost: Vec<f64>,
        arc_capacity: Vec<f64>,
        arc_var_type: Vec<VarType>,
        commodities: Vec<Commodity>,
    ) -> FlowResult<Self> {
        if arc_cost.len() != arcs.len() || arc_capacity.len() != arcs.len() || arc_var_type.len() != arcs.len() {
            return Err(FlowError::validation(
                "Problem",
                0,
                "per-arc attribute arrays must match the arc count",
            ));
        }
        for (i, &cap) in arc_capacity.iter().enumerate() {
            if cap < 0.0 {
                return Err(FlowError::validation("Arc", i, "capacity must be non-negative"));
            }
        }

        let vertices = Rc::new(vertices);
        let arcs = Rc::new(arcs);
        let network = Network::full(vertices.clone(), arcs.clone());
        let num_arcs = arcs.len();

        Ok(Problem {
            frame: Rc::new(ProblemFrame {
                vertices,
                arcs,
                arc_cost,
                arc_capacity,
                arc_var_type,
                commodities,
            }),
            network,
            constraints: Vec::new(),
            arc_constraint_index: LinkedListMap::new(num_arcs),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn commodities(&self) -> &[Commodity] {
        &self.frame.commodities
    }

    pub fn commodity(&self, id: CommodityId) -> &Commodity {
        &self.frame.commodities[id.index()]
    }

    pub fn arc_cost(&self, id: ArcId) -> f64 {
        self.frame.arc_cost[id.index()]
    }

    pub fn arc_capacity(&self, id: ArcId) -> f64 {
        self.frame.arc_capacity[id.index()]
    }

    pub fn arc_var_type(&self, id: ArcId) -> VarType {
        self.frame.arc_var_type[id.index()]
    }

    pub fn constraints(&self) -> &[SideConstraint] {
        &self.constraints
    }

    /// Coefficients touching `arc` across every constraint currently on the
    /// stack, most-recently-pushed first.
    pub fn arc_constraint_coefficients(&self, arc: ArcId) -> impl Iterator<Item = (ConstraintId, f64)> + '_ {
        self.arc_constraint_index
            .iter(arc.index())
            .map(|&(_, cid, coeff)| (cid, coeff))
    }

    /// Push a side constraint onto the stack, indexing its coefficients by
    /// arc. The depth at push time is the current stack length *before* the
    /// push, so `pop_constraint` can identify and remove exactly these
    /// entries by depth equality.
    pub fn push_constraint(&mut self, constraint: SideConstraint) {
        let depth = self.constraints.len();
        for &(arc_id, coeff) in &constraint.coefficients {
            self.arc_constraint_index
                .push_front(arc_id.index(), (depth, constraint.id, coeff));
        }
        self.constraints.push(constraint);
    }

    /// Pop the most recently pushed constraint, undoing its entries in the
    /// per-arc index. Bit-equal to the state before the matching push.
    pub fn pop_constraint(&mut self) -> Option<SideConstraint> {
        let constraint = self.constraints.pop()?;
        let depth = self.constraints.len();
        self.arc_constraint_index
            .pop_head_where(|&(d, _, _)| d == depth);
        Some(constraint)
    }

    /// A new `Problem` sharing this one's frame and constraint stack, whose
    /// network is restricted to arcs satisfying `predicate`.
    pub fn filter_arcs(&self, predicate: impl Fn(&Arc) -> bool) -> Problem {
        Problem {
            frame: self.frame.clone(),
            network: self.network.filter_arcs(predicate),
            constraints: self.constraints.clone(),
            arc_constraint_index: self.rebuild_constraint_index(),
        }
    }

    /// Reduced-cost variable fixing: drop every arc whose reduced cost (as
    /// looked up in `reduced_cost`, defaulting to `0.0` for arcs it has no
    /// entry for) exceeds `tolerance`, since such an arc cannot enter an
    /// improving column.
    pub fn filter_arcs_by_reduced_cost(&self, reduced_cost: &IndexedMap<ArcId, f64>, tolerance: f64) -> Problem {
        self.filter_arcs(|arc| *reduced_cost.get(&arc.id) <= tolerance)
    }

    /// Pre-flight pass across every arc, commodity and side constraint,
    /// collecting every §3 invariant violation instead of stopping at the
    /// first one the way `Problem::new`/`Commodity::new`/`SideConstraint::new`
    /// do. Useful for a builder-façade caller that wants one combined error
    /// report before handing a `Problem` off to a solve entry point.
    pub fn validate(&self) -> Vec<FlowError> {
        let mut errors = Vec::new();
        let num_vertices = self.frame.vertices.len();

        for arc in self.frame.arcs.iter() {
            if arc.head.index() >= num_vertices {
                errors.push(FlowError::validation(
                    "Arc",
                    arc.id.0,
                    format!("head vertex {} does not exist", arc.head.0),
                ));
            }
            for tail in arc.tails() {
                if tail.vertex.index() >= num_vertices {
                    errors.push(FlowError::validation(
                        "Arc",
                        arc.id.0,
                        format!("tail vertex {} does not exist", tail.vertex.0),
                    ));
                }
            }
            if !self.frame.arc_cost[arc.id.index()].is_finite() {
                errors.push(FlowError::validation("Arc", arc.id.0, "cost must be finite"));
            }
            if self.frame.arc_capacity[arc.id.index()] < 0.0 {
                errors.push(FlowError::validation("Arc", arc.id.0, "capacity must be non-negative"));
            }
        }

        for commodity in &self.frame.commodities {
            if commodity.source.index() >= num_vertices {
                errors.push(FlowError::validation(
                    "Commodity",
                    commodity.id.0,
                    format!("source vertex {} does not exist", commodity.source.0),
                ));
            }
            if commodity.sink.index() >= num_vertices {
                errors.push(FlowError::validation(
                    "Commodity",
                    commodity.id.0,
                    format!("sink vertex {} does not exist", commodity.sink.0),
                ));
            }
            if commodity.demand < 0.0 {
                errors.push(FlowError::validation("Commodity", commodity.id.0, "demand must be non-negative"));
            }
            if !commodity.capacity.is_finite() {
                errors.push(FlowError::validation("Commodity", commodity.id.0, "capacity must be finite"));
            }
            if commodity.demand > commodity.capacity {
                errors.push(FlowError::validation(
                    "Commodity",
                    commodity.id.0,
                    format!("demand {} exceeds capacity {}", commodity.demand, commodity.capacity),
                ));
            }
            if commodity.violation_penalty < 0.0 {
                errors.push(FlowError::validation("Commodity", commodity.id.0, "violation penalty must be non-negative"));
            }
        }

        let num_arcs = self.frame.arcs.len();
        for constraint in &self.constraints {
            for &(arc_id, _) in &constraint.coefficients {
                if arc_id.index() >= num_arcs {
                    errors.push(FlowError::validation(
                        "SideConstraint",
                        constraint.id.0,
                        format!("arc {} does not exist", arc_id.0),
                    ));
                }
            }
            if constraint.violation_penalty < 0.0 {
                errors.push(FlowError::validation(
                    "SideConstraint",
                    constraint.id.0,
                    "violation penalty must be non-negative",
                ));
            }
        }

        errors
    }

    fn rebuild_constraint_index(&self) -> LinkedListMap<(usize, ConstraintId, f64)> {
        let mut index = LinkedListMap::new(self.frame.arcs.len());
        for (depth, constraint) in self.constraints.iter().enumerate() {
            for &(arc_id, coeff) in &constraint.coefficients {
                index.push_front(arc_id.index(), (depth, constraint.id, coeff));
            }
        }
        index
    }
}
