//! # Dynamic Succinct Bit Vectors
//!
//! *Rank and select over a bit sequence that keeps changing.*
//!
//! ## Intuition First
//!
//! A static succinct bit vector is a sealed archive with a very good table of
//! contents: you can count the ones before any position, or find the k-th one,
//! without reading the whole thing. Open it to insert a single bit and the
//! table of contents is wrong from that point on.
//!
//! The dynamic version keeps the archive in small packed chunks (leaves) and
//! keeps the table of contents as a tree of running counts over those chunks.
//! An edit only rewrites one chunk and the counts on one root-to-leaf path.
//! Each chunk also holds a short notepad of edits it has not applied yet, so
//! the expensive part (shifting packed words) happens once per batch.
//!
//! ## The Problem
//!
//! - **Packed arrays**: 1 bit per bit, but an insertion shifts $O(n)$ bits.
//! - **Pointer structures**: cheap edits, but $O(\log n)$ bits of overhead per
//!   element.
//!
//! A leaf of $B$ bits under a tree of fan-out $F$ sits between the two: edits
//! cost $O(B / w + F \log_F(n / B))$ and the index adds $O(n / B)$ words.
//!
//! ## Historical Context
//!
//! ```text
//! 1989  Jacobson        Static rank/select in o(n) extra bits
//! 2008  Makinen-Navarro Dynamic entropy-compressed sequences over balanced trees
//! 2017  Prezza          Packed and gap-encoded leaves under a B-tree
//! ```
//!
//! ## Operations
//!
//! - `rank1(i)`: set bits in $[0, i)$.
//! - `select1(k)`: position of the $k$-th set bit, 0-indexed.
//! - `insert(i, b)`, `remove(i)`, `set(i, b)`, `push_back(b)`.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **[`DynamicBitVector`]**: the public bit vector.
//! - **[`LeafBlock`]**: a packed leaf with a sorted pending-edit buffer of
//!   compile-time capacity `CAP` (0 disables buffering).
//! - **[`PartialSumTree`]**: the arena-backed index over leaves.
//! - **[`ImplicitBitVector`]**: a plain packed vector with linear-time
//!   queries, used as the reference in tests.
//! - **[`OpLog`]**: replayable operation logs for regression testing.
//!
//! ## References
//!
//! - Jacobson, G. (1989). "Succinct Static Data Structures."
//! - Makinen, V., & Navarro, G. (2008). "Dynamic Entropy-Compressed Sequences
//!   and Full-Text Indexes."
//! - Navarro, G., & Sadakane, K. (2014). "Fully Functional Static and Dynamic
//!   Succinct Trees."
//! - Prezza, N. (2017). "A Framework of Dynamic Data Structures for String
//!   Processing."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod buffer;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod implicit;
pub mod oplog;
pub mod tree;

pub use block::{LeafBlock, Weight};
pub use buffer::{Edit, EditBuffer, EditKind};
pub use config::TreeConfig;
pub use dynamic::DynamicBitVector;
pub use error::{Error, Result};
pub use implicit::ImplicitBitVector;
pub use oplog::{BitSequence, Op, OpLog, Replay};
pub use tree::{Leaf, PartialSumTree};
