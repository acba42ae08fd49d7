//! Dynamic bit vector: the public facade over the partial-sum tree.
//!
//! # Intuition First
//!
//! A static rank/select bit vector answers queries fast because it never
//! changes. Here the bits are cut into leaves of a few thousand bits each and
//! hung under a B-tree-like index that caches, per subtree, how many bits and
//! how many ones it holds. A query walks down the index and finishes inside a
//! single leaf. An edit walks the same path, fixes the cached counts, and
//! touches one leaf, which defers the edit into a small buffer before paying
//! for the shift of its packed words.
//!
//! # Complexity
//!
//! With `B` the leaf size and `F` the fan-out, every operation costs
//! `O(F log_F(n / B))` to route plus `O(B / 64)` word operations in the leaf.

use crate::block::{LeafBlock, Weight};
use crate::config::TreeConfig;
use crate::error::{Error, Result};
use crate::tree::{Leaf, PartialSumTree};

/// A mutable sequence of bits with rank and select.
///
/// `CAP` is the number of edits each leaf buffers before merging them into its
/// packed words. `0` disables buffering.
///
/// ```
/// use dynbits::DynamicBitVector;
///
/// let mut bv: DynamicBitVector = [true, true, false].into_iter().collect();
/// bv.remove(0);
/// assert_eq!(bv.len(), 2);
/// assert_eq!(bv.rank1(2), 1);
/// assert_eq!(bv.select1(0), 0);
/// ```
#[derive(Clone)]
pub struct DynamicBitVector<const CAP: usize = 8> {
    tree: PartialSumTree<LeafBlock<CAP>>,
}

impl<const CAP: usize> Default for DynamicBitVector<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> DynamicBitVector<CAP> {
    /// Create an empty bit vector with the default tree shape.
    pub fn new() -> Self {
        Self {
            tree: PartialSumTree::default(),
        }
    }

    /// Create an empty bit vector with a custom tree shape.
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        Ok(Self {
            tree: PartialSumTree::with_config(config)?,
        })
    }

    /// Tree shape in use.
    pub fn config(&self) -> &TreeConfig {
        self.tree.config()
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Return true if the vector holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of set bits.
    #[inline]
    pub fn ones(&self) -> usize {
        self.tree.ones()
    }

    /// Number of clear bits.
    #[inline]
    pub fn zeros(&self) -> usize {
        self.len() - self.ones()
    }

    /// Bit at `i`. Panics if `i >= len()`.
    pub fn access(&self, i: usize) -> bool {
        self.tree.access(i)
    }

    /// Bit at `i`, or `None` if out of range.
    pub fn get(&self, i: usize) -> Option<bool> {
        (i < self.len()).then(|| self.tree.access(i))
    }

    /// Insert `bit` at `i`, shifting later bits right. Panics if `i > len()`.
    pub fn insert(&mut self, i: usize, bit: bool) {
        self.tree.insert(i, bit);
    }

    /// Checked [`insert`](Self::insert).
    pub fn try_insert(&mut self, i: usize, bit: bool) -> Result<()> {
        if i > self.len() {
            return Err(Error::IndexOutOfBounds(i));
        }
        self.tree.insert(i, bit);
        Ok(())
    }

    /// Append `bit`.
    pub fn push_back(&mut self, bit: bool) {
        self.tree.push_back(bit);
    }

    /// Remove and return the bit at `i`. Panics if `i >= len()`.
    pub fn remove(&mut self, i: usize) -> bool {
        self.tree.remove(i)
    }

    /// Checked [`remove`](Self::remove).
    pub fn try_remove(&mut self, i: usize) -> Result<bool> {
        if i >= self.len() {
            return Err(Error::IndexOutOfBounds(i));
        }
        Ok(self.tree.remove(i))
    }

    /// Overwrite the bit at `i`, returning the previous value.
    pub fn set(&mut self, i: usize, bit: bool) -> bool {
        self.tree.set(i, bit)
    }

    /// Checked [`set`](Self::set).
    pub fn try_set(&mut self, i: usize, bit: bool) -> Result<bool> {
        if i >= self.len() {
            return Err(Error::IndexOutOfBounds(i));
        }
        Ok(self.tree.set(i, bit))
    }

    /// Number of set bits in `[0, i)`. Panics if `i > len()`.
    pub fn rank1(&self, i: usize) -> usize {
        self.tree.rank1(i)
    }

    /// Number of clear bits in `[0, i)`.
    pub fn rank0(&self, i: usize) -> usize {
        i - self.tree.rank1(i)
    }

    /// Number of bits equal to `bit` in `[0, i)`.
    pub fn rank(&self, i: usize, bit: bool) -> usize {
        if bit {
            self.rank1(i)
        } else {
            self.rank0(i)
        }
    }

    /// Position of the `k`-th set bit (0-indexed). Panics if `k >= ones()`.
    pub fn select1(&self, k: usize) -> usize {
        self.tree.select1(k)
    }

    /// Position of the `k`-th clear bit (0-indexed). Panics if `k >= zeros()`.
    pub fn select0(&self, k: usize) -> usize {
        self.tree.select0(k)
    }

    /// Position of the `k`-th bit equal to `bit`.
    pub fn select(&self, k: usize, bit: bool) -> usize {
        if bit {
            self.select1(k)
        } else {
            self.select0(k)
        }
    }

    /// Checked [`select1`](Self::select1).
    pub fn try_select1(&self, k: usize) -> Result<usize> {
        if k >= self.ones() {
            return Err(Error::InvalidSelection(k));
        }
        Ok(self.tree.select1(k))
    }

    /// Checked [`select0`](Self::select0).
    pub fn try_select0(&self, k: usize) -> Result<usize> {
        if k >= self.zeros() {
            return Err(Error::InvalidSelection(k));
        }
        Ok(self.tree.select0(k))
    }

    /// Smallest `j` such that `rank1(j + 1) + j >= x`.
    ///
    /// Treating the vector as a sequence of values `1 + bit`, this finds the
    /// element whose running sum first exceeds `x`. Panics if no such `j`
    /// exists, i.e. if `x >= len() + ones()`.
    pub fn search_r(&self, x: usize) -> usize {
        self.tree.search_r(x)
    }

    /// Smallest `j` whose weighted prefix `[0, j]` reaches `x`.
    pub fn search_by(&self, x: usize, weight: Weight) -> usize {
        self.tree.search_by(x, weight)
    }

    /// Approximate memory footprint in bits.
    pub fn bit_size(&self) -> usize {
        self.tree.bit_size()
    }

    /// Iterate over bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.tree
            .leaves()
            .into_iter()
            .flat_map(|leaf| (0..Leaf::len(leaf)).map(move |i| Leaf::access(leaf, i)))
    }

    /// Check the internal bookkeeping of the tree.
    pub fn validate(&self) -> Result<()> {
        self.tree.validate()
    }
}

impl<const CAP: usize> FromIterator<bool> for DynamicBitVector<CAP> {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bv = Self::new();
        bv.extend(iter);
        bv
    }
}

impl<const CAP: usize> Extend<bool> for DynamicBitVector<CAP> {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        for bit in iter {
            self.push_back(bit);
        }
    }
}

impl<const CAP: usize> std::fmt::Debug for DynamicBitVector<CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBitVector")
            .field("len", &self.len())
            .field("ones", &self.ones())
            .field("height", &self.tree.height())
            .finish()
    }
}
