//! Replayable operation logs.
//!
//! A log is a flat sequence of `u32`: the first entry is the initial length,
//! and the structure under test is seeded with `i % 2` for `i` in that range.
//! The rest is a stream of opcodes, each followed by its operands:
//!
//! | opcode | operation | operands |
//! |---|---|---|
//! | 0 | insert | loc, val |
//! | 1 | remove | loc |
//! | 2 | set | loc, val |
//! | 3 | push_back | val |
//! | 4 | rank1 | loc |
//! | 5 | select1 | loc |
//! | 6+ | access | loc |
//!
//! Locations are reduced against the current length at replay time, so any
//! sequence of integers of the right shape is a valid log. Any non-zero value
//! is a set bit.

use crate::block::LeafBlock;
use crate::dynamic::DynamicBitVector;
use crate::error::{Error, Result};
use crate::implicit::ImplicitBitVector;
use tracing::debug;

/// The operations an op-log can drive.
pub trait BitSequence {
    /// Number of bits.
    fn len(&self) -> usize;
    /// Return true if no bits are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Insert `bit` at `i`.
    fn insert(&mut self, i: usize, bit: bool);
    /// Remove and return the bit at `i`.
    fn remove(&mut self, i: usize) -> bool;
    /// Overwrite the bit at `i`, returning the previous value.
    fn set(&mut self, i: usize, bit: bool) -> bool;
    /// Append `bit`.
    fn push_back(&mut self, bit: bool);
    /// Set bits in `[0, i)`.
    fn rank1(&self, i: usize) -> usize;
    /// Position of the `k`-th set bit.
    fn select1(&self, k: usize) -> usize;
    /// Bit at `i`.
    fn access(&self, i: usize) -> bool;
}

impl<const CAP: usize> BitSequence for LeafBlock<CAP> {
    fn len(&self) -> usize {
        LeafBlock::len(self)
    }
    fn insert(&mut self, i: usize, bit: bool) {
        LeafBlock::insert(self, i, bit)
    }
    fn remove(&mut self, i: usize) -> bool {
        LeafBlock::remove(self, i)
    }
    fn set(&mut self, i: usize, bit: bool) -> bool {
        LeafBlock::set(self, i, bit)
    }
    fn push_back(&mut self, bit: bool) {
        LeafBlock::push_back(self, bit)
    }
    fn rank1(&self, i: usize) -> usize {
        self.rank(i)
    }
    fn select1(&self, k: usize) -> usize {
        self.select(k)
    }
    fn access(&self, i: usize) -> bool {
        LeafBlock::access(self, i)
    }
}

impl<const CAP: usize> BitSequence for DynamicBitVector<CAP> {
    fn len(&self) -> usize {
        DynamicBitVector::len(self)
    }
    fn insert(&mut self, i: usize, bit: bool) {
        DynamicBitVector::insert(self, i, bit)
    }
    fn remove(&mut self, i: usize) -> bool {
        DynamicBitVector::remove(self, i)
    }
    fn set(&mut self, i: usize, bit: bool) -> bool {
        DynamicBitVector::set(self, i, bit)
    }
    fn push_back(&mut self, bit: bool) {
        DynamicBitVector::push_back(self, bit)
    }
    fn rank1(&self, i: usize) -> usize {
        DynamicBitVector::rank1(self, i)
    }
    fn select1(&self, k: usize) -> usize {
        DynamicBitVector::select1(self, k)
    }
    fn access(&self, i: usize) -> bool {
        DynamicBitVector::access(self, i)
    }
}

impl BitSequence for ImplicitBitVector {
    fn len(&self) -> usize {
        ImplicitBitVector::len(self)
    }
    fn insert(&mut self, i: usize, bit: bool) {
        ImplicitBitVector::insert(self, i, bit)
    }
    fn remove(&mut self, i: usize) -> bool {
        ImplicitBitVector::remove(self, i)
    }
    fn set(&mut self, i: usize, bit: bool) -> bool {
        ImplicitBitVector::set(self, i, bit)
    }
    fn push_back(&mut self, bit: bool) {
        ImplicitBitVector::push_back(self, bit)
    }
    fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len(), "rank position {i} out of bounds for {} bits", self.len());
        ImplicitBitVector::rank1(self, i)
    }
    fn select1(&self, k: usize) -> usize {
        ImplicitBitVector::select1(self, k)
            .unwrap_or_else(|| panic!("select1({k}) with only {} ones", self.ones()))
    }
    fn access(&self, i: usize) -> bool {
        ImplicitBitVector::access(self, i)
    }
}

/// One decoded log entry. Operands are kept as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `0 loc val`
    Insert {
        /// Unreduced location.
        loc: u32,
        /// Raw value; non-zero is a set bit.
        val: u32,
    },
    /// `1 loc`
    Remove {
        /// Unreduced location.
        loc: u32,
    },
    /// `2 loc val`
    Set {
        /// Unreduced location.
        loc: u32,
        /// Raw value; non-zero is a set bit.
        val: u32,
    },
    /// `3 val`
    PushBack {
        /// Raw value; non-zero is a set bit.
        val: u32,
    },
    /// `4 loc`
    Rank {
        /// Unreduced location.
        loc: u32,
    },
    /// `5 loc`
    Select {
        /// Unreduced occurrence.
        loc: u32,
    },
    /// `6 loc`, also any larger opcode.
    Access {
        /// Unreduced location.
        loc: u32,
    },
}

impl Op {
    /// Opcode this operation encodes to.
    pub fn opcode(&self) -> u32 {
        match self {
            Op::Insert { .. } => 0,
            Op::Remove { .. } => 1,
            Op::Set { .. } => 2,
            Op::PushBack { .. } => 3,
            Op::Rank { .. } => 4,
            Op::Select { .. } => 5,
            Op::Access { .. } => 6,
        }
    }

    /// Apply the operation to `seq` and return its output (0 for mutations
    /// and for skipped operations).
    pub fn apply<S: BitSequence>(&self, seq: &mut S) -> u64 {
        let s = seq.len();
        let reduce = |loc: u32| loc as usize % s;
        match *self {
            Op::Insert { loc, val } => {
                let i = if s == 0 { 0 } else { reduce(loc) };
                seq.insert(i, val != 0);
                0
            }
            Op::Remove { loc } => {
                if s > 0 {
                    seq.remove(reduce(loc));
                }
                0
            }
            Op::Set { loc, val } => {
                if s > 0 {
                    seq.set(reduce(loc), val != 0);
                }
                0
            }
            Op::PushBack { val } => {
                seq.push_back(val != 0);
                0
            }
            Op::Rank { loc } if s > 0 => seq.rank1(reduce(loc)) as u64,
            Op::Select { loc } if s > 0 => {
                // Occurrences are counted over all but the last bit.
                let r = seq.rank1(s - 1);
                if r == 0 {
                    0
                } else {
                    seq.select1(loc as usize % r) as u64
                }
            }
            Op::Access { loc } if s > 0 => seq.access(reduce(loc)) as u64,
            Op::Rank { .. } | Op::Select { .. } | Op::Access { .. } => 0,
        }
    }
}

/// Outcome of replaying a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// One output per operation.
    pub outputs: Vec<u64>,
    /// Wrapping sum of all outputs.
    pub checksum: u64,
    /// Length of the sequence after the last operation.
    pub final_len: usize,
}

/// A decoded operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpLog {
    seed_len: u32,
    ops: Vec<Op>,
}

impl OpLog {
    /// Build a log from its parts.
    pub fn new(seed_len: u32, ops: Vec<Op>) -> Self {
        Self { seed_len, ops }
    }

    /// Decode a flat log.
    pub fn parse(raw: &[u32]) -> Result<Self> {
        let (&seed_len, _) = raw.split_first().ok_or(Error::EmptyLog)?;
        let mut ops = Vec::new();
        let mut i = 1;
        while i < raw.len() {
            let opcode = raw[i];
            let arity = if opcode == 0 || opcode == 2 { 2 } else { 1 };
            let operands = raw
                .get(i + 1..=i + arity)
                .ok_or(Error::TruncatedLog { offset: i })?;
            let op = match (opcode, operands) {
                (0, &[loc, val]) => Op::Insert { loc, val },
                (1, &[loc]) => Op::Remove { loc },
                (2, &[loc, val]) => Op::Set { loc, val },
                (3, &[val]) => Op::PushBack { val },
                (4, &[loc]) => Op::Rank { loc },
                (5, &[loc]) => Op::Select { loc },
                (_, &[loc]) => Op::Access { loc },
                _ => unreachable!("operand slice length matches arity"),
            };
            ops.push(op);
            i += 1 + arity;
        }
        Ok(Self { seed_len, ops })
    }

    /// Encode back to the flat form. Access opcodes above 6 come back as 6.
    pub fn encode(&self) -> Vec<u32> {
        let mut raw = Vec::with_capacity(1 + self.ops.len() * 3);
        raw.push(self.seed_len);
        for op in &self.ops {
            raw.push(op.opcode());
            match *op {
                Op::Insert { loc, val } | Op::Set { loc, val } => raw.extend([loc, val]),
                Op::PushBack { val } => raw.push(val),
                Op::Remove { loc } | Op::Rank { loc } | Op::Select { loc } | Op::Access { loc } => {
                    raw.push(loc)
                }
            }
        }
        raw
    }

    /// Initial length.
    pub fn seed_len(&self) -> u32 {
        self.seed_len
    }

    /// Decoded operations in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Append the seed bits `i % 2` to `seq`.
    pub fn seed<S: BitSequence>(&self, seq: &mut S) {
        for i in 0..self.seed_len {
            seq.push_back(i % 2 == 1);
        }
    }

    /// Seed `seq` and run every operation against it.
    pub fn replay<S: BitSequence>(&self, seq: &mut S) -> Replay {
        self.seed(seq);
        debug!(seed = self.seed_len, ops = self.ops.len(), "replaying op log");
        let outputs: Vec<u64> = self.ops.iter().map(|op| op.apply(seq)).collect();
        let checksum = outputs.iter().fold(0u64, |acc, &v| acc.wrapping_add(v));
        Replay {
            outputs,
            checksum,
            final_len: seq.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_encode() {
        let raw = [3, 1, 0, 0, 1, 1, 2, 0, 0, 4, 2, 9, 5, 3, 7];
        let log = OpLog::parse(&raw).unwrap();
        assert_eq!(log.seed_len(), 3);
        assert_eq!(
            log.ops(),
            &[
                Op::Remove { loc: 0 },
                Op::Insert { loc: 1, val: 1 },
                Op::Set { loc: 0, val: 0 },
                Op::Rank { loc: 2 },
                Op::Access { loc: 5 },
                Op::PushBack { val: 7 },
            ]
        );
        let mut expected = raw.to_vec();
        expected[11] = 6;
        assert_eq!(log.encode(), expected);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(OpLog::parse(&[]), Err(Error::EmptyLog)));
        assert!(matches!(
            OpLog::parse(&[4, 3, 1, 0, 2]),
            Err(Error::TruncatedLog { offset: 3 })
        ));
        assert_eq!(OpLog::parse(&[0]).unwrap().ops().len(), 0);
    }

    #[test]
    fn test_skips_on_empty() {
        let log = OpLog::new(
            0,
            vec![
                Op::Remove { loc: 4 },
                Op::Rank { loc: 1 },
                Op::Select { loc: 1 },
                Op::Access { loc: 1 },
                Op::Set { loc: 0, val: 1 },
                Op::Insert { loc: 9, val: 2 },
                Op::Select { loc: 0 },
                Op::Access { loc: 5 },
            ],
        );
        let mut seq = ImplicitBitVector::new();
        let replay = log.replay(&mut seq);
        // The select still sees no ones before the last bit.
        assert_eq!(replay.outputs, vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(replay.checksum, 1);
        assert_eq!(replay.final_len, 1);
    }

    #[test]
    fn test_select_counts_all_but_last() {
        // Seed 0 1 0 1: rank1(3) = 1, so every select lands on the first one.
        let log = OpLog::new(4, vec![Op::Select { loc: 7 }, Op::Rank { loc: 7 }]);
        let mut leaf = LeafBlock::<8>::new();
        let replay = log.replay(&mut leaf);
        assert_eq!(replay.outputs, vec![1, 1]);
        assert_eq!(leaf.psum(), 2);
    }
}
