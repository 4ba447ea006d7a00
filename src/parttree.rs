//! Flattened storage of a partition tree.
//!
//! The tree is stored as a struct of arrays with one entry per node. Nodes are
//! numbered in pre-order: the root is node `0`, the left child of an internal node
//! `i` is `i + 1` and its right child is `i + 2 * psplit(i)`, since the left subtree
//! owns `psplit` ranks and therefore has `2 * psplit - 1` nodes.

use crate::{
    constants::NDIMS,
    error::{Error, Result},
    geometry::{Coord, GridBox},
    marshall::WireField,
};

/// Visit each field vector of a [PartTreeStorage] in wire order.
pub(crate) trait FieldVisitor {
    fn visit<T: WireField>(&mut self, name: &'static str, values: &[T]);
}

/// Mutable counterpart of [FieldVisitor]. Filling a field can fail.
pub(crate) trait FieldVisitorMut {
    fn visit<T: WireField>(&mut self, name: &'static str, values: &mut Vec<T>) -> Result<()>;
}

// The field list is declared once. Marshalling and the length checks
// iterate over it through the visitors so that the layout cannot drift.
macro_rules! parttree_fields {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// A partition tree stored as parallel arrays indexed by node id.
        ///
        /// The storage is immutable once built. A repartition creates a new instance.
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct PartTreeStorage {
            $(pub(crate) $field: Vec<$ty>,)*
        }

        impl PartTreeStorage {
            pub(crate) fn visit_fields<V: FieldVisitor>(&self, visitor: &mut V) {
                $(visitor.visit(stringify!($field), &self.$field);)*
            }

            pub(crate) fn visit_fields_mut<V: FieldVisitorMut>(
                &mut self,
                visitor: &mut V,
            ) -> Result<()> {
                $(visitor.visit(stringify!($field), &mut self.$field)?;)*
                Ok(())
            }
        }
    };
}

parttree_fields! {
    inner: bool,
    pstart: i32,
    pend: i32,
    lu: Coord,
    ro: Coord,
    split_direction: u8,
    split_coord: i32,
    psplit: i32,
}

impl PartTreeStorage {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Return true if the storage holds no node.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of ranks the tree distributes the domain to.
    pub fn nproc(&self) -> usize {
        self.root().map_or(0, |root| root.nproc())
    }

    /// The root node, or `None` for an empty storage.
    pub fn root(&self) -> Option<NodeView<'_>> {
        self.node(0)
    }

    /// View of the node with the given id.
    pub fn node(&self, id: usize) -> Option<NodeView<'_>> {
        if id < self.len() {
            Some(NodeView { tree: self, id })
        } else {
            None
        }
    }

    /// The domain covered by the tree.
    pub fn domain(&self) -> Result<GridBox> {
        self.root()
            .ok_or_else(|| Error::InvalidTree("empty tree".to_string()))
            .map(|root| root.bounds())
    }

    /// All leafs in tree order. Their ranks are ascending.
    pub fn leaves(&self) -> impl Iterator<Item = NodeView<'_>> {
        (0..self.len())
            .filter(move |&id| !self.inner[id])
            .map(move |id| NodeView { tree: self, id })
    }

    /// Find the leaf that contains a given cell.
    pub fn node_of_cell(&self, coord: Coord) -> Result<NodeView<'_>> {
        let mut node = self
            .root()
            .ok_or_else(|| Error::InvalidTree("empty tree".to_string()))?;

        if !node.bounds().contains(coord) {
            return Err(Error::InvalidArgument(format!(
                "cell {:?} outside of domain {}",
                coord,
                node.bounds()
            )));
        }

        while let Some((left, right)) = node.children() {
            let axis = self.split_direction[node.id] as usize;
            node = if coord[axis] < self.split_coord[node.id] {
                left
            } else {
                right
            };
        }

        Ok(node)
    }

    /// Find the leaf owned by a given rank.
    pub fn node_of_rank(&self, rank: usize) -> Result<NodeView<'_>> {
        let mut node = self
            .root()
            .ok_or_else(|| Error::InvalidTree("empty tree".to_string()))?;

        if rank >= node.nproc() {
            return Err(Error::IndexOutOfRange {
                index: rank,
                len: node.nproc(),
            });
        }

        while let Some((left, right)) = node.children() {
            node = if (rank as i32) < right.pstart() {
                left
            } else {
                right
            };
        }

        Ok(node)
    }

    /// The subdomain owned by a given rank.
    pub fn subdomain(&self, rank: usize) -> Result<GridBox> {
        self.node_of_rank(rank).map(|node| node.bounds())
    }

    /// Length of the longest path from the root to a leaf, counted in edges.
    pub fn depth(&self) -> usize {
        fn depth_below(node: NodeView<'_>) -> usize {
            match node.children() {
                Some((left, right)) => 1 + depth_below(left).max(depth_below(right)),
                None => 0,
            }
        }

        self.root().map_or(0, depth_below)
    }

    /// Check that all field vectors have the same length.
    pub(crate) fn check_field_lengths(&self) -> Result<()> {
        struct Lengths {
            expected: usize,
            mismatch: Option<Error>,
        }

        impl FieldVisitor for Lengths {
            fn visit<T: WireField>(&mut self, name: &'static str, values: &[T]) {
                if self.mismatch.is_none() && values.len() != self.expected {
                    self.mismatch = Some(Error::InvalidTree(format!(
                        "field `{}` has {} entries, expected {}",
                        name,
                        values.len(),
                        self.expected
                    )));
                }
            }
        }

        let mut lengths = Lengths {
            expected: self.len(),
            mismatch: None,
        };
        self.visit_fields(&mut lengths);

        match lengths.mismatch {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Check the structural invariants of the tree.
    ///
    /// - All field vectors have the same length and there are `2 * nproc - 1` nodes.
    /// - The root owns the ranks `[0, nproc)`.
    /// - Leafs own exactly one rank, internal nodes at least two.
    /// - The children of an internal node are the cut of its box at the split
    ///   coordinate and split its rank range at `pstart + psplit`.
    pub fn validate(&self) -> Result<()> {
        self.check_field_lengths()?;

        let root = self
            .root()
            .ok_or_else(|| Error::InvalidTree("empty tree".to_string()))?;

        if root.pstart() != 0 || root.pend() < 1 {
            return Err(Error::InvalidTree(format!(
                "root owns ranks [{}, {})",
                root.pstart(),
                root.pend()
            )));
        }

        let expected_len = 2 * root.nproc() - 1;
        if self.len() != expected_len {
            return Err(Error::InvalidTree(format!(
                "{} nodes for {} ranks, expected {}",
                self.len(),
                root.nproc(),
                expected_len
            )));
        }

        for node in (0..self.len()).map(|id| NodeView { tree: self, id }) {
            check_node(node)?;
        }

        Ok(())
    }
}

fn check_node(node: NodeView<'_>) -> Result<()> {
    let id = node.id();
    let bounds = GridBox::new(node.lu(), node.ro())
        .map_err(|_| Error::InvalidTree(format!("node {} has unordered corners", id)))?;

    if !node.is_inner() {
        if node.nproc() != 1 {
            return Err(Error::InvalidTree(format!(
                "leaf {} owns ranks [{}, {})",
                id,
                node.pstart(),
                node.pend()
            )));
        }
        return Ok(());
    }

    if node.pend() - node.pstart() < 2 {
        return Err(Error::InvalidTree(format!(
            "internal node {} owns ranks [{}, {})",
            id,
            node.pstart(),
            node.pend()
        )));
    }

    let tree = node.tree;
    let psplit = tree.psplit[id];
    if psplit < 1 || psplit >= node.pend() - node.pstart() {
        return Err(Error::InvalidTree(format!(
            "internal node {} sends {} of {} ranks left",
            id,
            psplit,
            node.nproc()
        )));
    }

    let axis = tree.split_direction[id] as usize;
    let (left_box, right_box) = bounds
        .split(axis, tree.split_coord[id])
        .map_err(|err| Error::InvalidTree(format!("node {}: {}", id, err)))?;

    let (left, right) = node
        .children()
        .ok_or_else(|| Error::InvalidTree(format!("children of node {} missing", id)))?;

    if left.bounds() != left_box || right.bounds() != right_box {
        return Err(Error::InvalidTree(format!(
            "children of node {} do not tile {}",
            id, bounds
        )));
    }

    if left.pstart() != node.pstart()
        || left.pend() != node.pstart() + psplit
        || right.pstart() != left.pend()
        || right.pend() != node.pend()
    {
        return Err(Error::InvalidTree(format!(
            "children of node {} do not partition ranks [{}, {})",
            id,
            node.pstart(),
            node.pend()
        )));
    }

    Ok(())
}

/// Read-only view of a single node.
#[derive(Copy, Clone, Debug)]
pub struct NodeView<'a> {
    tree: &'a PartTreeStorage,
    id: usize,
}

impl<'a> NodeView<'a> {
    /// Node id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Return true for internal nodes.
    pub fn is_inner(&self) -> bool {
        self.tree.inner[self.id]
    }

    /// Return true for leafs.
    pub fn is_leaf(&self) -> bool {
        !self.is_inner()
    }

    /// First rank owned by the subtree.
    pub fn pstart(&self) -> i32 {
        self.tree.pstart[self.id]
    }

    /// One past the last rank owned by the subtree.
    pub fn pend(&self) -> i32 {
        self.tree.pend[self.id]
    }

    /// Number of ranks owned by the subtree.
    pub fn nproc(&self) -> usize {
        (self.pend() - self.pstart()).max(0) as usize
    }

    /// Owning rank. Only meaningful for leafs.
    pub fn rank(&self) -> i32 {
        self.pstart()
    }

    /// Lower corner of the node box.
    pub fn lu(&self) -> Coord {
        self.tree.lu[self.id]
    }

    /// Exclusive upper corner of the node box.
    pub fn ro(&self) -> Coord {
        self.tree.ro[self.id]
    }

    /// Box of the node.
    pub fn bounds(&self) -> GridBox {
        // Corners are ordered for every node written by the builder or
        // accepted by `validate`; fall back to an empty box otherwise.
        GridBox::new(self.lu(), self.ro()).unwrap_or_default()
    }

    /// Split axis of an internal node.
    pub fn split_direction(&self) -> Option<usize> {
        self.is_inner()
            .then(|| self.tree.split_direction[self.id] as usize)
    }

    /// Split coordinate of an internal node.
    pub fn split_coord(&self) -> Option<i32> {
        self.is_inner().then(|| self.tree.split_coord[self.id])
    }

    /// Number of ranks of an internal node that go to the left child.
    pub fn psplit(&self) -> Option<i32> {
        self.is_inner().then(|| self.tree.psplit[self.id])
    }

    /// Left child of an internal node.
    pub fn left(&self) -> Option<NodeView<'a>> {
        if self.is_inner() {
            self.tree.node(self.id + 1)
        } else {
            None
        }
    }

    /// Right child of an internal node.
    pub fn right(&self) -> Option<NodeView<'a>> {
        let psplit = self.psplit()?;
        if psplit < 1 {
            return None;
        }
        self.tree.node(self.id + 2 * psplit as usize)
    }

    /// Both children of an internal node.
    pub fn children(&self) -> Option<(NodeView<'a>, NodeView<'a>)> {
        Some((self.left()?, self.right()?))
    }
}

/// Incrementally fills a [PartTreeStorage] in pre-order.
#[derive(Default)]
pub(crate) struct PartTreeWriter {
    storage: PartTreeStorage,
}

impl PartTreeWriter {
    /// Append a leaf for `rank` and return its id.
    pub fn push_leaf(&mut self, rank: i32, bounds: GridBox) -> usize {
        self.push_node(false, rank, rank + 1, bounds)
    }

    /// Append an internal node whose split is set later by [PartTreeWriter::set_split].
    pub fn push_inner(&mut self, pstart: i32, pend: i32, bounds: GridBox) -> usize {
        self.push_node(true, pstart, pend, bounds)
    }

    fn push_node(&mut self, inner: bool, pstart: i32, pend: i32, bounds: GridBox) -> usize {
        let s = &mut self.storage;
        s.inner.push(inner);
        s.pstart.push(pstart);
        s.pend.push(pend);
        s.lu.push(bounds.lu());
        s.ro.push(bounds.ro());
        s.split_direction.push(0);
        s.split_coord.push(0);
        s.psplit.push(0);
        s.inner.len() - 1
    }

    /// Record the split of an internal node.
    pub fn set_split(&mut self, id: usize, axis: usize, coord: i32, psplit: i32) {
        debug_assert!(axis < NDIMS);
        self.storage.split_direction[id] = axis as u8;
        self.storage.split_coord[id] = coord;
        self.storage.psplit[id] = psplit;
    }

    pub fn finish(self) -> PartTreeStorage {
        self.storage
    }
}
