//! Graph primitives: dense ids, vertices, (possibly multi-tail) arcs,
//! hyper-trees and paths.
//!
//! Per the ownership design, `Vertex`/`Arc` are plain value types carrying a
//! dense integer index; all relational data (cost, capacity, outgoing-arc
//! lists, ...) lives in `IndexedMap`s keyed by those indices rather than in
//! object references, so there is no cyclic ownership to fight the borrow
//! checker over.

use crate::error::{FlowError, FlowResult};
use crate::indexed::Indexed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

macro_rules! dense_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                $name(index)
            }
            #[inline]
            pub fn value(self) -> usize {
                self.0
            }
        }

        impl Indexed for $name {
            #[inline]
            fn index(&self) -> usize {
                self.0
            }
        }
    };
}

dense_id!(VertexId);
dense_id!(ArcId);
dense_id!(CommodityId);
dense_id!(ConstraintId);

/// A vertex: identity only. Created once per problem, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub id: VertexId,
}

/// Whether an arc's flow variable is continuous or must take integer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Continuous,
    Integer,
}

/// One (tail vertex, multiplier) pair on an arc: `multiplier` units of flow
/// are consumed at `vertex` to produce one unit of flow at the arc's head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tail {
    pub vertex: VertexId,
    pub multiplier: f64,
}

/// An arc's tail set: a fixed-size representation for the overwhelmingly
/// common single-tail case, falling back to a `Vec` for true hyper-arcs.
/// Downstream code iterates tails uniformly via `Arc::tails`.
#[derive(Debug, Clone, PartialEq)]
enum TailSet {
    Single(Tail),
    Multi(Vec<Tail>),
}

/// An arc: a non-empty ordered set of (tail, multiplier) pairs and a head
/// vertex. A *simple arc* has one tail; a *hyper-arc* has two or more.
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub id: ArcId,
    tails: TailSet,
    pub head: VertexId,
}

impl Indexed for Arc {
    fn index(&self) -> usize {
        self.id.0
    }
}

impl Arc {
    /// A simple (single-tail) arc.
    pub fn simple(id: ArcId, tail: VertexId, multiplier: f64, head: VertexId) -> FlowResult<Self> {
        Self::new(id, vec![Tail { vertex: tail, multiplier }], head)
    }

    /// A hyper-arc from an explicit tail list. Rejects an empty tail list
    /// and non-positive multipliers.
    pub fn new(id: ArcId, tails: Vec<Tail>, head: VertexId) -> FlowResult<Self> {
        if tails.is_empty() {
            return Err(FlowError::validation(
                "Arc",
                id.0,
                "tail list must be non-empty",
            ));
        }
        for t in &tails {
            if !(t.multiplier > 0.0) {
                return Err(FlowError::validation(
                    "Arc",
                    id.0,
                    format!("tail multiplier must be positive, got {}", t.multiplier),
                ));
            }
        }
        let tail_set = if tails.len() == 1 {
            TailSet::Single(tails[0])
        } else {
            TailSet::Multi(tails)
        };
        Ok(Arc { id, tails: tail_set, head })
    }

    /// From a tail -> multiplier map (the third `new_arc` overload in the
    /// builder surface).
    pub fn from_map(id: ArcId, tails: HashMap<VertexId, f64>, head: VertexId) -> FlowResult<Self> {
        let tails: Vec<Tail> = tails
            .into_iter()
            .map(|(vertex, multiplier)| Tail { vertex, multiplier })
            .collect();
        Self::new(id, tails, head)
    }

    #[inline]
    pub fn is_hyper(&self) -> bool {
        matches!(self.tails, TailSet::Multi(_))
    }

    #[inline]
    pub fn tails(&self) -> &[Tail] {
        match &self.tails {
            TailSet::Single(t) => std::slice::from_ref(t),
            TailSet::Multi(v) => v,
        }
    }

    /// The single tail's multiplier. Only meaningful for simple arcs;
    /// panics on a hyper-arc (callers must check `is_hyper` first — backward
    /// relaxation and min-unit-flow queries are simple-arc-only).
    pub fn simple_multiplier(&self) -> f64 {
        match &self.tails {
            TailSet::Single(t) => t.multiplier,
            TailSet::Multi(_) => panic!("simple_multiplier called on a hyper-arc"),
        }
    }

    pub fn simple_tail(&self) -> VertexId {
        match &self.tails {
            TailSet::Single(t) => t.vertex,
            TailSet::Multi(_) => panic!("simple_tail called on a hyper-arc"),
        }
    }
}

/// An arc-multiplicity mapping balanced around a single head vertex: the
/// currency used for RMP columns.
///
/// Balance, for a vertex `v` touched by the tree: `inflow(v) - outflow(v)`
/// where `inflow(v)` sums the multiplicities of tree arcs headed at `v`,
/// and `outflow(v)` sums `multiplicity(a) * tail_multiplier(a, v)` over
/// tree arcs `a` that have `v` as a tail. The head has balance `+1`; tails
/// (vertices never an incoming target within the tree) may have arbitrary
/// negative balance; every other touched vertex has balance `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperTree {
    head: VertexId,
    arcs: HashMap<ArcId, f64>,
    /// tail vertex -> aggregated multiplier (units consumed at that tail
    /// per unit delivered at `head`).
    tails: HashMap<VertexId, f64>,
}

impl HyperTree {
    /// Build and validate a hyper-tree from an arc -> multiplicity mapping,
    /// looking up arc topology in `arc_table` (indexable by `ArcId`).
    pub fn from_arcs(arc_table: &[Arc], arcs: HashMap<ArcId, f64>) -> FlowResult<Self> {
        let mut inflow: HashMap<VertexId, f64> = HashMap::new();
        let mut outflow: HashMap<VertexId, f64> = HashMap::new();
        let mut is_incoming_target: HashMap<VertexId, bool> = HashMap::new();

        for (&arc_id, &mult) in &arcs {
            let arc = &arc_table[arc_id.index()];
            *inflow.entry(arc.head).or_insert(0.0) += mult;
            is_incoming_target.insert(arc.head, true);
            is_incoming_target.entry(arc.head).or_insert(true);
            for t in arc.tails() {
                *outflow.entry(t.vertex).or_insert(0.0) += mult * t.multiplier;
                is_incoming_target.entry(t.vertex).or_insert(false);
            }
        }

        let mut touched: Vec<VertexId> = inflow
            .keys()
            .chain(outflow.keys())
            .copied()
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        touched.sort_by_key(|v| v.0);

        let mut head = None;
        let mut tails = HashMap::new();
        for v in touched {
            let balance = inflow.get(&v).copied().unwrap_or(0.0) - outflow.get(&v).copied().unwrap_or(0.0);
            let ever_head = is_incoming_target.get(&v).copied().unwrap_or(false);
            if (balance - 1.0).abs() < 1e-9 {
                if head.is_some() {
                    return Err(FlowError::validation(
                        "HyperTree",
                        0,
                        "more than one vertex has net inflow balance +1",
                    ));
                }
                head = Some(v);
            } else if !ever_head {
                if balance.abs() > 1e-9 {
                    tails.insert(v, -balance);
                }
                // balance == 0 and never a head: an isolated, unused vertex
                // reference; nothing to record.
            } else if balance.abs() > 1e-9 {
                return Err(FlowError::validation(
                    "HyperTree",
                    0,
                    format!(
                        "intermediate vertex {} has nonzero balance {}",
                        v.0, balance
                    ),
                ));
            }
        }

        let head = head.ok_or_else(|| {
            FlowError::validation("HyperTree", 0, "no vertex with net inflow balance +1")
        })?;

        Ok(HyperTree { head, arcs, tails })
    }

    pub fn head(&self) -> VertexId {
        self.head
    }

    pub fn arc_multiplicities(&self) -> &HashMap<ArcId, f64> {
        &self.arcs
    }

    pub fn multiplicity(&self, arc: ArcId) -> Option<f64> {
        self.arcs.get(&arc).copied()
    }

    /// Aggregated multiplier consumed at `tail` per unit delivered at
    /// `head()`.
    pub fn tail_multiplier(&self, tail: VertexId) -> Option<f64> {
        self.tails.get(&tail).copied()
    }

    pub fn tail_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.tails.keys().copied()
    }

    pub fn is_contained_in(&self, included_arcs: impl Fn(ArcId) -> bool) -> bool {
        self.arcs.keys().all(|&a| included_arcs(a))
    }
}

/// A `HyperTree` whose underlying graph is a single directed simple chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    tree: HyperTree,
    /// head-to-tail is the reverse; this is stored source-to-sink.
    sequence: Vec<ArcId>,
}

impl Path {
    /// Build a path from an ordered, source-to-sink arc sequence of simple
    /// arcs. The last arc gets multiplicity 1; earlier arcs' multiplicities
    /// compound by the product of the downstream arcs' tail multipliers.
    pub fn from_sequence(arc_table: &[Arc], sequence: Vec<ArcId>) -> FlowResult<Self> {
        if sequence.is_empty() {
            return Err(FlowError::validation("Path", 0, "arc sequence must be non-empty"));
        }
        for w in sequence.windows(2) {
            let a = &arc_table[w[0].index()];
            let b = &arc_table[w[1].index()];
            if a.is_hyper() || b.is_hyper() {
                return Err(FlowError::validation(
                    "Path",
                    0,
                    "path arcs must be simple (single-tail)",
                ));
            }
            if a.head != b.simple_tail() {
                return Err(FlowError::validation(
                    "Path",
                    0,
                    format!(
                        "arc {} head does not match arc {} tail",
                        w[0].0, w[1].0
                    ),
                ));
            }
        }

        let n = sequence.len();
        let mut mult = vec![1.0f64; n];
        for i in (0..n - 1).rev() {
            let next_arc = &arc_table[sequence[i + 1].index()];
            mult[i] = mult[i + 1] * next_arc.simple_multiplier();
        }

        let arcs: HashMap<ArcId, f64> = sequence.iter().copied().zip(mult).collect();
        let tree = HyperTree::from_arcs(arc_table, arcs)?;

        Ok(Path { tree, sequence })
    }

    pub fn tree(&self) -> &HyperTree {
        &self.tree
    }

    pub fn sequence(&self) -> &[ArcId] {
        &self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn simple_arc_rejects_non_positive_multiplier() {
        let err = Arc::simple(ArcId::new(0), v(0), 0.0, v(1)).unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));
    }

    #[test]
    fn hyper_arc_rejects_empty_tails() {
        let err = Arc::new(ArcId::new(0), vec![], v(1)).unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));
    }

    #[test]
    fn single_tail_is_not_hyper() {
        let a = Arc::simple(ArcId::new(0), v(0), 1.0, v(1)).unwrap();
        assert!(!a.is_hyper());
        assert_eq!(a.tails().len(), 1);
    }

    #[test]
    fn two_tails_is_hyper() {
        let a = Arc::new(
            ArcId::new(0),
            vec![
                Tail { vertex: v(0), multiplier: 1.0 },
                Tail { vertex: v(1), multiplier: 2.0 },
            ],
            v(2),
        )
        .unwrap();
        assert!(a.is_hyper());
        assert_eq!(a.tails().len(), 2);
    }

    #[test]
    fn hypertree_from_simple_chain_has_expected_balances() {
        // v0 --a0(mu=2)--> v1 --a1(mu=3)--> v2
        let arcs = vec![
            Arc::simple(ArcId::new(0), v(0), 2.0, v(1)).unwrap(),
            Arc::simple(ArcId::new(1), v(1), 3.0, v(2)).unwrap(),
        ];
        let mut mults = HashMap::new();
        mults.insert(ArcId::new(1), 1.0);
        mults.insert(ArcId::new(0), 3.0); // must supply 3 units to feed a1's need of 1*3
        let tree = HyperTree::from_arcs(&arcs, mults).unwrap();
        assert_eq!(tree.head(), v(2));
        assert_eq!(tree.tail_multiplier(v(0)), Some(6.0)); // 3 units through a0 at mu=2 => 6 consumed at v0
        assert_eq!(tree.tail_multiplier(v(1)), None); // intermediate, balance 0
    }

    #[test]
    fn hypertree_rejects_unbalanced_intermediate() {
        let arcs = vec![
            Arc::simple(ArcId::new(0), v(0), 1.0, v(1)).unwrap(),
            Arc::simple(ArcId::new(1), v(1), 1.0, v(2)).unwrap(),
        ];
        let mut mults = HashMap::new();
        mults.insert(ArcId::new(1), 1.0);
        mults.insert(ArcId::new(0), 5.0); // v1 balance = 5 - 1 = 4, not zero
        let err = HyperTree::from_arcs(&arcs, mults).unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));
    }

    #[test]
    fn path_compounds_multiplicities_downstream() {
        // v0 --a0(mu=2)--> v1 --a1(mu=5)--> v2
        let arcs = vec![
            Arc::simple(ArcId::new(0), v(0), 2.0, v(1)).unwrap(),
            Arc::simple(ArcId::new(1), v(1), 5.0, v(2)).unwrap(),
        ];
        let path = Path::from_sequence(&arcs, vec![ArcId::new(0), ArcId::new(1)]).unwrap();
        assert_eq!(path.tree().multiplicity(ArcId::new(1)), Some(1.0));
        assert_eq!(path.tree().multiplicity(ArcId::new(0)), Some(5.0));
        assert_eq!(path.tree().tail_multiplier(v(0)), Some(10.0)); // 5 units * mu=2
        assert_eq!(path.tree().head(), v(2));
    }

    #[test]
    fn path_rejects_mismatched_chain() {
        let arcs = vec![
            Arc::simple(ArcId::new(0), v(0), 1.0, v(1)).unwrap(),
            Arc::simple(ArcId::new(1), v(2), 1.0, v(3)).unwrap(), // doesn't connect
        ];
        let err = Path::from_sequence(&arcs, vec![ArcId::new(0), ArcId::new(1)]).unwrap_err();
        assert!(matches!(err, FlowError::Validation { .. }));
    }
}
