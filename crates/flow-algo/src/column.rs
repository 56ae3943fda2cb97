//! A column: one priced hyper-tree, tagged with the commodity it serves and
//! the flow-variable type the master problem should use for it.

use flow_core::{CommodityId, HyperTree, VarType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub usize);

/// One variable of the restricted master problem: a hyper-tree delivering
/// one unit of `commodity`'s flow to its sink, at `cost` per unit.
#[derive(Debug, Clone)]
pub struct Column {
    pub id: ColumnId,
    pub commodity: CommodityId,
    pub tree: HyperTree,
    pub var_type: VarType,
    pub cost: f64,
    active: bool,
}

impl Column {
    pub fn new(id: ColumnId, commodity: CommodityId, tree: HyperTree, var_type: VarType, cost: f64) -> Self {
        Column { id, commodity, tree, var_type, cost, active: true }
    }
}

/// The growing set of columns a restricted master problem is built from.
/// Columns are never physically removed (their `ColumnId` stays a valid
/// dense index for the lifetime of the pool); retention instead flips
/// `active` to `false`, which is cheaper than LP-row surgery and is what
/// every iteration/for_commodity view filters on.
#[derive(Debug, Clone, Default)]
pub struct ColumnPool {
    columns: Vec<Column>,
}

impl ColumnPool {
    pub fn new() -> Self {
        ColumnPool::default()
    }

    pub fn push(&mut self, commodity: CommodityId, tree: HyperTree, var_type: VarType, cost: f64) -> ColumnId {
        let id = ColumnId(self.columns.len());
        self.columns.push(Column::new(id, commodity, tree, var_type, cost));
        id
    }

    pub fn get(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    /// Fix the column out of future RMP solves — equivalent to fixing its
    /// upper bound to 0, but without needing a live LP handle, and it
    /// preserves `ColumnId` density since nothing is actually removed.
    pub fn deactivate(&mut self, id: ColumnId) {
        self.columns[id.0].active = false;
    }

    pub fn is_active(&self, id: ColumnId) -> bool {
        self.columns[id.0].active
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.active)
    }

    pub fn len(&self) -> usize {
        self.columns.iter().filter(|c| c.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn for_commodity(&self, commodity: CommodityId) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.active && c.commodity == commodity)
    }
}
