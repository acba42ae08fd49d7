//! Searchable partial-sum tree over leaf blocks.
//!
//! Internal nodes cache the number of bits (`size`) and set bits (`ones`) of
//! their subtree. Every operation descends from the root comparing a global
//! index, rank, or weight against these aggregates, translates it into a
//! leaf-local argument, and fixes the aggregates along the descent path before
//! returning.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`], so splitting
//! a leaf or an internal node only moves ids between child lists.

use crate::block::Weight;
use crate::config::TreeConfig;
use crate::error::{Error, Result};
use tracing::debug;

/// What the tree needs from a leaf.
///
/// All indices are local to the leaf. The tree guarantees they are in range;
/// implementations may panic otherwise.
pub trait Leaf: Default {
    /// Number of bits in the leaf.
    fn len(&self) -> usize;
    /// Number of set bits in the leaf.
    fn ones(&self) -> usize;
    /// Bit at `i`.
    fn access(&self, i: usize) -> bool;
    /// Insert `bit` at `i` (`i == len()` appends).
    fn insert(&mut self, i: usize, bit: bool);
    /// Remove and return the bit at `i`.
    fn remove(&mut self, i: usize) -> bool;
    /// Overwrite the bit at `i`, returning the previous value.
    fn set(&mut self, i: usize, bit: bool) -> bool;
    /// Set bits in `[0, n)`.
    fn rank(&self, n: usize) -> usize;
    /// Smallest `j` whose weighted prefix `[0, j]` reaches `x`.
    fn search_by(&self, x: usize, weight: Weight) -> usize;
    /// Move the right part of the leaf into a new sibling.
    fn split(&mut self) -> Self;
    /// Approximate memory footprint in bits.
    fn bit_size(&self) -> usize;
}

/// Index of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
struct Internal {
    children: Vec<NodeId>,
    size: usize,
    ones: usize,
}

#[derive(Debug, Clone)]
enum Node<L> {
    Leaf(L),
    Internal(Internal),
    Vacant,
}

/// One step of a root-to-leaf descent: `child` is the slot taken in `node`.
#[derive(Debug, Clone, Copy)]
struct Step {
    node: NodeId,
    child: usize,
}

/// Arena-backed tree of leaves with cached subtree sizes and populations.
#[derive(Debug, Clone)]
pub struct PartialSumTree<L> {
    nodes: Vec<Node<L>>,
    free: Vec<NodeId>,
    root: NodeId,
    config: TreeConfig,
}

impl<L: Leaf> Default for PartialSumTree<L> {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl<L: Leaf> PartialSumTree<L> {
    /// Create an empty tree. Panics if `config` is invalid.
    pub fn new(config: TreeConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("{e}");
        }
        Self {
            nodes: vec![Node::Leaf(L::default())],
            free: Vec::new(),
            root: NodeId(0),
            config,
        }
    }

    /// Create an empty tree, rejecting an invalid `config`.
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Tree shape parameters.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of bits stored.
    pub fn len(&self) -> usize {
        self.size_of(self.root)
    }

    /// Return true if no bits are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of set bits stored.
    pub fn ones(&self) -> usize {
        self.ones_of(self.root)
    }

    /// Number of levels from the root to the leaves (a lone leaf is 1).
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id.index()] {
            id = node.children[0];
            height += 1;
        }
        height
    }

    fn alloc(&mut self, node: Node<L>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                let id = NodeId(
                    u32::try_from(self.nodes.len()).expect("node arena exceeds u32::MAX slots"),
                );
                self.nodes.push(node);
                id
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id.index()] = Node::Vacant;
        self.free.push(id);
    }

    fn size_of(&self, id: NodeId) -> usize {
        match &self.nodes[id.index()] {
            Node::Leaf(leaf) => leaf.len(),
            Node::Internal(node) => node.size,
            Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
        }
    }

    fn ones_of(&self, id: NodeId) -> usize {
        match &self.nodes[id.index()] {
            Node::Leaf(leaf) => leaf.ones(),
            Node::Internal(node) => node.ones,
            Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut L {
        match &mut self.nodes[id.index()] {
            Node::Leaf(leaf) => leaf,
            _ => unreachable!("node {id:?} is not a leaf"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut Internal {
        match &mut self.nodes[id.index()] {
            Node::Internal(node) => node,
            _ => unreachable!("node {id:?} is not internal"),
        }
    }

    /// Walk to the leaf holding global position `i`. With `append`, `i` may
    /// equal the subtree size, which routes to the last leaf.
    fn descend(&self, mut i: usize, append: bool) -> (Vec<Step>, NodeId, usize) {
        let mut path = Vec::new();
        let mut id = self.root;
        loop {
            let node = match &self.nodes[id.index()] {
                Node::Leaf(_) => return (path, id, i),
                Node::Internal(node) => node,
                Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
            };
            let last = node.children.len() - 1;
            let mut slot = last;
            for (k, &child) in node.children.iter().enumerate() {
                let size = self.size_of(child);
                if i < size || (append && k == last) {
                    slot = k;
                    break;
                }
                i -= size;
            }
            path.push(Step {
                node: id,
                child: slot,
            });
            id = node.children[slot];
        }
    }

    fn leaf(&self, id: NodeId) -> &L {
        match &self.nodes[id.index()] {
            Node::Leaf(leaf) => leaf,
            _ => unreachable!("node {id:?} is not a leaf"),
        }
    }

    /// Bit at global position `i`.
    pub fn access(&self, i: usize) -> bool {
        assert!(i < self.len(), "index {i} out of bounds for {} bits", self.len());
        let (_, leaf, local) = self.descend(i, false);
        self.leaf(leaf).access(local)
    }

    /// Set bits in `[0, i)`.
    pub fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len(), "rank position {i} out of bounds for {} bits", self.len());
        if i == self.len() {
            return self.ones();
        }
        let mut i = i;
        let mut acc = 0;
        let mut id = self.root;
        loop {
            let node = match &self.nodes[id.index()] {
                Node::Leaf(leaf) => return acc + leaf.rank(i),
                Node::Internal(node) => node,
                Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
            };
            for &child in &node.children {
                let size = self.size_of(child);
                if i < size {
                    id = child;
                    break;
                }
                i -= size;
                acc += self.ones_of(child);
            }
        }
    }

    /// Smallest global `j` whose weighted prefix `[0, j]` reaches `x`.
    pub fn search_by(&self, x: usize, weight: Weight) -> usize {
        assert!(
            x <= weight.of_run(self.ones(), self.len()),
            "search target {x} exceeds total weight"
        );
        let mut x = x;
        let mut pos = 0;
        let mut id = self.root;
        loop {
            let node = match &self.nodes[id.index()] {
                Node::Leaf(leaf) => return pos + leaf.search_by(x, weight),
                Node::Internal(node) => node,
                Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
            };
            let mut next = None;
            for &child in &node.children {
                let size = self.size_of(child);
                let w = weight.of_run(self.ones_of(child), size);
                if x <= w {
                    next = Some(child);
                    break;
                }
                x -= w;
                pos += size;
            }
            id = next.expect("cached weights disagree with the search target");
        }
    }

    /// Position of the `k`-th set bit (0-indexed).
    pub fn select1(&self, k: usize) -> usize {
        assert!(k < self.ones(), "select1({k}) with only {} ones", self.ones());
        self.search_by(k + 1, Weight::Ones)
    }

    /// Position of the `k`-th clear bit (0-indexed).
    pub fn select0(&self, k: usize) -> usize {
        let zeros = self.len() - self.ones();
        assert!(k < zeros, "select0({k}) with only {zeros} zeros");
        self.search_by(k + 1, Weight::Zeros)
    }

    /// Smallest `j` such that `rank1(j + 1) + j >= x`.
    pub fn search_r(&self, x: usize) -> usize {
        self.search_by(x + 1, Weight::Positions)
    }

    /// Insert `bit` at global position `i`.
    pub fn insert(&mut self, i: usize, bit: bool) {
        assert!(i <= self.len(), "insert position {i} out of bounds for {} bits", self.len());
        let (path, leaf_id, local) = self.descend(i, true);
        for step in &path {
            let node = self.internal_mut(step.node);
            node.size += 1;
            node.ones += bit as usize;
        }
        let max_leaf_bits = self.config.max_leaf_bits;
        let leaf = self.leaf_mut(leaf_id);
        leaf.insert(local, bit);
        if leaf.len() > max_leaf_bits {
            self.split_leaf(path, leaf_id);
        }
    }

    /// Append `bit`.
    pub fn push_back(&mut self, bit: bool) {
        self.insert(self.len(), bit);
    }

    /// Remove and return the bit at global position `i`.
    pub fn remove(&mut self, i: usize) -> bool {
        assert!(i < self.len(), "remove index {i} out of bounds for {} bits", self.len());
        let (path, leaf_id, local) = self.descend(i, false);
        let leaf = self.leaf_mut(leaf_id);
        let bit = leaf.remove(local);
        let emptied = leaf.len() == 0;
        for step in &path {
            let node = self.internal_mut(step.node);
            node.size -= 1;
            node.ones -= bit as usize;
        }
        if emptied && !path.is_empty() {
            self.unlink(path, leaf_id);
        }
        bit
    }

    /// Overwrite the bit at global position `i`, returning the previous value.
    pub fn set(&mut self, i: usize, bit: bool) -> bool {
        assert!(i < self.len(), "set index {i} out of bounds for {} bits", self.len());
        let (path, leaf_id, local) = self.descend(i, false);
        let old = self.leaf_mut(leaf_id).set(local, bit);
        if old != bit {
            for step in &path {
                let node = self.internal_mut(step.node);
                if bit {
                    node.ones += 1;
                } else {
                    node.ones -= 1;
                }
            }
        }
        old
    }

    fn split_leaf(&mut self, path: Vec<Step>, leaf_id: NodeId) {
        let sibling = self.leaf_mut(leaf_id).split();
        debug!(
            left = self.size_of(leaf_id),
            right = sibling.len(),
            "split leaf"
        );
        let sibling_id = self.alloc(Node::Leaf(sibling));
        self.attach(path, leaf_id, sibling_id);
    }

    fn split_internal(&mut self, path: Vec<Step>, id: NodeId) {
        let node = self.internal_mut(id);
        let mid = node.children.len() / 2;
        let moved = node.children.split_off(mid);
        let size = moved.iter().map(|&c| self.size_of(c)).sum();
        let ones = moved.iter().map(|&c| self.ones_of(c)).sum();

        let node = self.internal_mut(id);
        node.size -= size;
        node.ones -= ones;
        debug!(
            left = node.children.len(),
            right = moved.len(),
            "split internal node"
        );
        let sibling = self.alloc(Node::Internal(Internal {
            children: moved,
            size,
            ones,
        }));
        self.attach(path, id, sibling);
    }

    /// Link `right` directly after `left`, whose ancestors are `path`.
    fn attach(&mut self, mut path: Vec<Step>, left: NodeId, right: NodeId) {
        let Some(step) = path.pop() else {
            let root = Internal {
                children: vec![left, right],
                size: self.size_of(left) + self.size_of(right),
                ones: self.ones_of(left) + self.ones_of(right),
            };
            self.root = self.alloc(Node::Internal(root));
            debug!(height = self.height(), "tree grew a level");
            return;
        };
        let fanout = self.config.fanout;
        let parent = self.internal_mut(step.node);
        parent.children.insert(step.child + 1, right);
        if parent.children.len() > fanout {
            self.split_internal(path, step.node);
        }
    }

    /// Drop the empty node `id` and any ancestors it leaves childless.
    fn unlink(&mut self, mut path: Vec<Step>, id: NodeId) {
        self.release(id);
        while let Some(step) = path.pop() {
            let parent = self.internal_mut(step.node);
            parent.children.remove(step.child);
            if !parent.children.is_empty() || path.is_empty() {
                break;
            }
            self.release(step.node);
        }
        self.collapse_root();
    }

    fn collapse_root(&mut self) {
        loop {
            let only_child = match &self.nodes[self.root.index()] {
                Node::Internal(node) if node.children.len() == 1 => Some(node.children[0]),
                Node::Internal(node) if node.children.is_empty() => None,
                _ => return,
            };
            let old = self.root;
            self.root = match only_child {
                Some(child) => child,
                None => self.alloc(Node::Leaf(L::default())),
            };
            self.release(old);
            debug!(height = self.height(), "tree lost a level");
        }
    }

    /// Leaves in sequence order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.index()] {
                Node::Leaf(leaf) => out.push(leaf),
                Node::Internal(node) => stack.extend(node.children.iter().rev().copied()),
                Node::Vacant => unreachable!("vacant node {id:?} is still linked"),
            }
        }
        out
    }

    /// Approximate memory footprint in bits: leaves, internal nodes, and the
    /// arena itself.
    pub fn bit_size(&self) -> usize {
        let slot = std::mem::size_of::<Node<L>>();
        let mut bytes = std::mem::size_of::<Self>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
            + (self.nodes.capacity() - self.nodes.len()) * slot;
        let mut bits = 0;
        for node in &self.nodes {
            match node {
                Node::Leaf(leaf) => bits += leaf.bit_size(),
                Node::Internal(n) => {
                    bytes += slot + n.children.capacity() * std::mem::size_of::<NodeId>()
                }
                Node::Vacant => bytes += slot,
            }
        }
        bits + bytes * 8
    }

    /// Check cached aggregates, fan-out, and leaf occupancy against the data.
    pub fn validate(&self) -> Result<()> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.index()] {
                Node::Vacant => {
                    return Err(Error::Invariant(format!("vacant node {id:?} is linked")));
                }
                Node::Leaf(leaf) => {
                    if leaf.rank(leaf.len()) != leaf.ones() {
                        return Err(Error::Invariant(format!(
                            "leaf {id:?} caches {} ones but holds {}",
                            leaf.ones(),
                            leaf.rank(leaf.len())
                        )));
                    }
                    if leaf.len() == 0 && id != self.root {
                        return Err(Error::Invariant(format!("empty leaf {id:?} is linked")));
                    }
                }
                Node::Internal(node) => {
                    if node.children.is_empty() || node.children.len() > self.config.fanout {
                        return Err(Error::Invariant(format!(
                            "node {id:?} has {} children",
                            node.children.len()
                        )));
                    }
                    let size: usize = node.children.iter().map(|&c| self.size_of(c)).sum();
                    let ones: usize = node.children.iter().map(|&c| self.ones_of(c)).sum();
                    if size != node.size || ones != node.ones {
                        return Err(Error::Invariant(format!(
                            "node {id:?} caches ({}, {}) but children sum to ({size}, {ones})",
                            node.size, node.ones
                        )));
                    }
                    stack.extend(node.children.iter().copied());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::LeafBlock;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn small() -> TreeConfig {
        TreeConfig::default().with_max_leaf_bits(128).with_fanout(4)
    }

    fn contents<L: Leaf>(tree: &PartialSumTree<L>) -> Vec<bool> {
        tree.leaves()
            .into_iter()
            .flat_map(|leaf| (0..leaf.len()).map(move |i| leaf.access(i)))
            .collect()
    }

    #[test]
    fn test_grows_and_routes() {
        let mut tree = PartialSumTree::<LeafBlock<8>>::new(small());
        let mut model = Vec::new();
        for i in 0..5_000 {
            let bit = i % 3 == 0;
            tree.push_back(bit);
            model.push(bit);
        }
        assert!(tree.height() >= 3);
        tree.validate().unwrap();
        assert_eq!(contents(&tree), model);
        assert_eq!(tree.ones(), model.iter().filter(|&&b| b).count());
        assert_eq!(tree.select1(0), 0);
        assert_eq!(tree.select1(1), 3);
        assert_eq!(tree.select0(1), 2);
        assert_eq!(tree.rank1(4_000), 1_334);
    }

    #[test]
    fn test_remove_everything_collapses() {
        let mut tree = PartialSumTree::<LeafBlock<4>>::new(small());
        for i in 0..2_000 {
            tree.insert(i / 2, i % 2 == 0);
        }
        assert!(tree.height() > 1);
        while !tree.is_empty() {
            let i = tree.len() / 3;
            tree.remove(i);
        }
        tree.validate().unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.ones(), 0);
        // Released slots are reused once the tree grows again.
        let slots = tree.nodes.len();
        for _ in 0..500 {
            tree.push_back(true);
        }
        assert_eq!(tree.nodes.len(), slots);
        tree.validate().unwrap();
    }

    #[test]
    fn test_random_ops_keep_aggregates() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = PartialSumTree::<LeafBlock<8>>::new(small());
        let mut model: Vec<bool> = Vec::new();
        for step in 0..6_000 {
            match rng.gen_range(0..10) {
                0..=4 => {
                    let i = rng.gen_range(0..=model.len());
                    let b = rng.gen::<bool>();
                    tree.insert(i, b);
                    model.insert(i, b);
                }
                5..=7 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    assert_eq!(tree.remove(i), model.remove(i));
                }
                8 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    let b = rng.gen::<bool>();
                    assert_eq!(tree.set(i, b), model[i]);
                    model[i] = b;
                }
                _ if !model.is_empty() => {
                    let i = rng.gen_range(0..=model.len());
                    let ones = model[..i].iter().filter(|&&b| b).count();
                    assert_eq!(tree.rank1(i), ones);
                    let j = rng.gen_range(0..model.len());
                    assert_eq!(tree.access(j), model[j]);
                }
                _ => {}
            }
            if step % 500 == 0 {
                tree.validate().unwrap();
            }
        }
        tree.validate().unwrap();
        assert_eq!(contents(&tree), model);
    }

    #[test]
    fn test_search_r_matches_definition() {
        let mut tree = PartialSumTree::<LeafBlock<8>>::new(small());
        let bits: Vec<bool> = (0..700).map(|i| (i * 13) % 7 < 3).collect();
        for &b in &bits {
            tree.push_back(b);
        }
        let mut prefix = 0;
        let mut key = Vec::new();
        for (j, &b) in bits.iter().enumerate() {
            prefix += b as usize;
            key.push(prefix + j);
        }
        for x in [0, 1, 5, 100, 531, key[699]] {
            let expected = key.iter().position(|&v| v >= x).unwrap();
            assert_eq!(tree.search_r(x), expected);
        }
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let bad = TreeConfig::default().with_fanout(1);
        assert!(PartialSumTree::<LeafBlock<8>>::with_config(bad).is_err());
    }
}
