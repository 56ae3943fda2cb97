//! `Network`: an ordered collection of vertices and arcs, plus the derived
//! structures (arc membership, outgoing-arc lists, topological order,
//! hyper-graph flag) the pricing and column-generation layers need.
//!
//! A `Network` never owns arc/vertex *data* — that belongs to `Problem` —
//! it holds `Rc`s to the immutable topology plus its own included-arc set,
//! so `filter_arcs` (used by RCVF and by hyper-tree-containment checks) is
//! cheap: no arc or vertex is ever copied, only the inclusion predicate and
//! its derived indices are rebuilt.

use crate::error::{FlowError, FlowResult};
use crate::graph::{Arc, ArcId, Vertex, VertexId};
use crate::indexed::{Indexed, IndexedMap};
use std::rc::Rc;

/// Summary statistics for diagnostics/logging; not part of any §4
/// algorithm, purely additive (mirrors `gat_core::graph_utils::graph_stats`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkStats {
    pub num_vertices: usize,
    pub num_arcs: usize,
    pub num_hyper_arcs: usize,
}

#[derive(Clone)]
pub struct Network {
    vertices: Rc<Vec<Vertex>>,
    arcs: Rc<Vec<Arc>>,
    included: Rc<IndexedMap<ArcId, bool>>,
    out_arcs: Rc<Vec<Vec<ArcId>>>,
    is_hyper: bool,
}

impl Network {
    /// Build a network containing every vertex and arc in the given
    /// topology (used by `Problem::new`; see `filter_arcs` for subsets).
    pub fn full(vertices: Rc<Vec<Vertex>>, arcs: Rc<Vec<Arc>>) -> Self {
        let included = IndexedMap::from_fn(arcs.len(), false, |_| true);
        Self::build(vertices, arcs, included)
    }

    fn build(vertices: Rc<Vec<Vertex>>, arcs: Rc<Vec<Arc>>, included: IndexedMap<ArcId, bool>) -> Self {
        let mut out_arcs = vec![Vec::new(); vertices.len()];
        let mut is_hyper = false;
        for arc in arcs.iter() {
            if !*included.get(&arc.id) {
                continue;
            }
            if arc.is_hyper() {
                is_hyper = true;
            }
            for tail in arc.tails() {
                out_arcs[tail.vertex.index()].push(arc.id);
            }
        }
        Network {
            vertices,
            arcs,
            included: Rc::new(included),
            out_arcs: Rc::new(out_arcs),
            is_hyper,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id.index()]
    }

    /// O(1) arc-membership test via a generation-marked indexed map.
    #[inline]
    pub fn contains_arc(&self, id: ArcId) -> bool {
        id.index() < self.included.len() && *self.included.get(&id)
    }

    pub fn arcs(&self) -> impl Iterator<Item = &Arc> + '_ {
        self.arcs.iter().filter(move |a| self.contains_arc(a.id))
    }

    pub fn num_included_arcs(&self) -> usize {
        self.arcs().count()
    }

    /// The full underlying arc table, indexable by `ArcId`, regardless of
    /// current inclusion - callers that need `arc_table[id.index()]`
    /// alignment (path/tree reconstruction) must use this rather than
    /// `arcs()`, whose filtered iteration order does not track `ArcId`.
    pub fn all_arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Size of the underlying arc table (including currently excluded
    /// arcs), i.e. the valid domain of `ArcId::index()`.
    pub fn total_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Arcs with `vertex` as one of their tails.
    pub fn outgoing_arcs(&self, vertex: VertexId) -> &[ArcId] {
        &self.out_arcs[vertex.index()]
    }

    pub fn is_hyper_graph(&self) -> bool {
        self.is_hyper
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_vertices: self.num_vertices(),
            num_arcs: self.num_included_arcs(),
            num_hyper_arcs: self.arcs().filter(|a| a.is_hyper()).count(),
        }
    }

    /// A new network over the same vertex set, with arcs restricted to
    /// those already included *and* satisfying `predicate`.
    pub fn filter_arcs(&self, predicate: impl Fn(&Arc) -> bool) -> Network {
        let mut included = IndexedMap::new(self.arcs.len(), false);
        for arc in self.arcs.iter() {
            if self.contains_arc(arc.id) && predicate(arc) {
                included.set(&arc.id, true);
            }
        }
        Network::build(self.vertices.clone(), self.arcs.clone(), included)
    }

    /// Topological order of every vertex touched by an included arc (as a
    /// tail or head), such that for every included arc, all tails precede
    /// the head. DFS from each unvisited vertex, on-stack marking to detect
    /// cycles. Errs with `FlowError::Structural` if the included arc set is
    /// not acyclic (pricing presumes acyclicity).
    pub fn topological_order(&self) -> FlowResult<Vec<VertexId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let n = self.vertices.len();
        let mut mark = vec![Mark::Unvisited; n];
        let mut order = Vec::with_capacity(n);

        // iterative DFS with an explicit frame stack: (vertex, next outgoing-arc index to try)
        for start in 0..n {
            if mark[start] != Mark::Unvisited {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            mark[start] = Mark::OnStack;
            while let Some(&mut (v, ref mut next_idx)) = stack.last_mut() {
                let out = self.outgoing_arcs(VertexId::new(v));
                let mut advanced = false;
                while *next_idx < out.len() {
                    let arc = self.arc(out[*next_idx]);
                    *next_idx += 1;
                    let head = arc.head.index();
                    match mark[head] {
                        Mark::Unvisited => {
                            mark[head] = Mark::OnStack;
                            stack.push((head, 0));
                            advanced = true;
                            break;
                        }
                        Mark::OnStack => {
                            return Err(FlowError::Structural(format!(
                                "cycle detected: arc {} closes a cycle back to vertex {}",
                                arc.id.0, head
                            )));
                        }
                        Mark::Done => {}
                    }
                }
                if !advanced && *next_idx >= out.len() {
                    mark[v] = Mark::Done;
                    order.push(VertexId::new(v));
                    stack.pop();
                }
            }
        }

        order.reverse();
        Ok(order)
    }
}
