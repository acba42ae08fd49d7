//! Configuration for the partial-sum tree.

use crate::error::{Error, Result};

/// Default upper bound on the number of bits held by one leaf.
pub const DEFAULT_MAX_LEAF_BITS: usize = 8192;

/// Default maximum number of children per internal node.
pub const DEFAULT_FANOUT: usize = 16;

/// Shape parameters of the tree behind [`crate::DynamicBitVector`].
///
/// The pending-edit capacity of each leaf is not part of this struct: it is
/// the `CAP` const parameter of [`crate::LeafBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// A leaf holding more bits than this is split in two.
    pub max_leaf_bits: usize,
    /// An internal node with more children than this is split in two.
    pub fanout: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_leaf_bits: DEFAULT_MAX_LEAF_BITS,
            fanout: DEFAULT_FANOUT,
        }
    }
}

impl TreeConfig {
    /// Set the leaf split threshold.
    #[must_use]
    pub fn with_max_leaf_bits(mut self, bits: usize) -> Self {
        self.max_leaf_bits = bits;
        self
    }

    /// Set the internal node fan-out.
    #[must_use]
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Check that the parameters describe a usable tree.
    pub fn validate(&self) -> Result<()> {
        // An overfull leaf must span at least two words to be splittable.
        if self.max_leaf_bits < 128 {
            return Err(Error::InvalidConfig(format!(
                "max_leaf_bits must be at least 128, got {}",
                self.max_leaf_bits
            )));
        }
        if self.max_leaf_bits >= u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_leaf_bits must be below {}, got {}",
                u32::MAX,
                self.max_leaf_bits
            )));
        }
        if self.fanout < 4 {
            return Err(Error::InvalidConfig(format!(
                "fanout must be at least 4, got {}",
                self.fanout
            )));
        }
        Ok(())
    }
}
