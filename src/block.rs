//! Buffered leaf block: a packed run of bits plus a small pending-edit log.
//!
//! # Layout
//!
//! Bit `i` of the word store lives in word `i / 64` at offset `i % 64`. The
//! word store is the *physical* view; the *logical* view is the physical view
//! with the pending edits of [`EditBuffer`] replayed on top of it. Every public
//! index on [`LeafBlock`] is logical.
//!
//! Inserting into a packed array costs a shift of everything behind the
//! insertion point. Buffering up to `CAP` edits and merging them in one pass
//! ([`LeafBlock::commit`]) pays that shift once per `CAP` edits instead of once
//! per edit. `CAP = 0` gives the unbuffered variant, which shifts on every
//! edit and serves as the reference the buffered variants are tested against.
//!
//! # Commit
//!
//! The commit pass rewrites words in ascending order. Output word `w` is
//! assembled from a stream of physical bits interleaved with buffered
//! insertions (and with deleted bits dropped from the stream). When more bits
//! have been inserted than deleted so far, the stream lags behind the output
//! and the unread tail of a word is saved in an *overflow* register before the
//! word is overwritten. When more bits have been deleted, the stream runs ahead
//! and bits are pulled (*underflow*) from the next words, which have not been
//! rewritten yet.
//!
//! ```text
//! physical   a b c d | e f g h        edits: insert X at 1, delete at 4
//! logical    a X b c | e f g h ...    (d dropped, e pulled across the boundary)
//! ```

use crate::buffer::{Edit, EditBuffer, Slot};
use crate::tree::Leaf;
use tracing::trace;

const WORD_BITS: usize = 64;

/// Words appended whenever the word store runs out of room.
const SLACK_WORDS: usize = 2;

/// How bits are counted by [`LeafBlock::search_by`] and the tree's routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    /// A set bit weighs 1, a clear bit 0.
    Ones,
    /// A clear bit weighs 1, a set bit 0.
    Zeros,
    /// Every bit weighs 1 plus its value (rank plus position).
    Positions,
}

impl Weight {
    /// Weight of a single bit.
    #[inline]
    pub fn of_bit(self, bit: bool) -> usize {
        match self {
            Weight::Ones => bit as usize,
            Weight::Zeros => (!bit) as usize,
            Weight::Positions => 1 + bit as usize,
        }
    }

    /// Weight of `len` bits of which `ones` are set.
    #[inline]
    pub fn of_run(self, ones: usize, len: usize) -> usize {
        match self {
            Weight::Ones => ones,
            Weight::Zeros => len - ones,
            Weight::Positions => len + ones,
        }
    }
}

#[inline]
fn low_mask(n: usize) -> u64 {
    if n >= WORD_BITS {
        !0
    } else {
        (1u64 << n) - 1
    }
}

/// Read `n <= 64` bits starting at `pos`; positions past the store read as 0.
#[inline]
fn read_bits(words: &[u64], pos: usize, n: usize) -> u64 {
    if n == 0 {
        return 0;
    }
    let q = pos / WORD_BITS;
    let off = pos % WORD_BITS;
    let mut bits = words.get(q).copied().unwrap_or(0) >> off;
    if off != 0 && off + n > WORD_BITS {
        bits |= words.get(q + 1).copied().unwrap_or(0) << (WORD_BITS - off);
    }
    bits & low_mask(n)
}

/// Overwrite `n <= 64` bits starting at `pos` with the low bits of `value`.
fn write_bits(words: &mut [u64], pos: usize, n: usize, value: u64) {
    if n == 0 {
        return;
    }
    let q = pos / WORD_BITS;
    let off = pos % WORD_BITS;
    let mask = low_mask(n);
    let value = value & mask;
    words[q] = (words[q] & !(mask << off)) | (value << off);
    if off + n > WORD_BITS {
        let spill = low_mask(off + n - WORD_BITS);
        words[q + 1] = (words[q + 1] & !spill) | (value >> (WORD_BITS - off));
    }
}

fn tail_is_clear(words: &[u64], len: usize) -> bool {
    let full = len / WORD_BITS;
    words
        .iter()
        .skip(full)
        .enumerate()
        .all(|(k, &w)| match k {
            0 => w & !low_mask(len % WORD_BITS) == 0,
            _ => w == 0,
        })
}

/// Source side of the commit pass.
struct Carry {
    /// Next physical bit to consume.
    read: usize,
    /// Physical bits `[read, read + overflow_len)`, saved from words that have
    /// already been rewritten.
    overflow: u64,
    overflow_len: usize,
}

impl Carry {
    fn starting_at(read: usize) -> Self {
        Self {
            read,
            overflow: 0,
            overflow_len: 0,
        }
    }

    /// Consume the next `n <= 64` physical bits.
    fn take(&mut self, words: &[u64], n: usize) -> u64 {
        let saved = n.min(self.overflow_len);
        let mut bits = 0;
        if saved > 0 {
            bits = self.overflow & low_mask(saved);
            self.overflow = if saved == WORD_BITS {
                0
            } else {
                self.overflow >> saved
            };
            self.overflow_len -= saved;
            self.read += saved;
        }
        let rest = n - saved;
        if rest > 0 {
            bits |= read_bits(words, self.read, rest) << saved;
            self.read += rest;
        }
        bits
    }

    /// Save whatever part of `word` (physical bits `[start, start + 64)`) has
    /// not been consumed yet, before the word gets overwritten.
    fn stash(&mut self, word: u64, start: usize) {
        let end = start + WORD_BITS;
        if self.read >= end {
            return;
        }
        let from = self.read.max(start);
        let count = end - from;
        debug_assert!(self.overflow_len + count < WORD_BITS);
        self.overflow |= (word >> (from - start)) << self.overflow_len;
        self.overflow_len += count;
    }
}

/// Rewrite `words` so the physical bits reflect `edits`, in one ascending pass.
///
/// `words` must be long enough to hold the edited sequence, and the net number
/// of insertions in `edits` must stay below 64.
fn apply_edits(words: &mut [u64], edits: &[Edit]) {
    let Some(first) = edits.first() else {
        return;
    };
    // Everything in front of the first edit is already in place.
    let first_word = first.position() / WORD_BITS;
    let mut carry = Carry::starting_at(first_word * WORD_BITS);
    let mut pending = edits.iter().peekable();

    for w in first_word..words.len() {
        let start = w * WORD_BITS;
        let end = start + WORD_BITS;
        let mut out = 0u64;
        let mut filled = 0usize;

        while let Some(edit) = pending.next_if(|e| e.position() < end) {
            debug_assert!(edit.position() >= start + filled, "unsorted edits");
            let gap = edit.position() - (start + filled);
            if gap > 0 {
                out |= carry.take(words, gap) << filled;
                filled += gap;
            }
            if edit.is_insert() {
                out |= (edit.value as u64) << filled;
                filled += 1;
            } else {
                carry.take(words, 1);
            }
        }
        if filled < WORD_BITS {
            out |= carry.take(words, WORD_BITS - filled) << filled;
        }

        carry.stash(words[w], start);
        words[w] = out;
    }

    // Deletions of the very last bits never reach an output word.
    debug_assert!(pending.all(|e| !e.is_insert()));
}

/// A leaf of the dynamic bit vector.
///
/// `CAP` is the number of pending edits buffered before a commit (must be
/// below 64; 0 disables buffering).
#[derive(Clone)]
pub struct LeafBlock<const CAP: usize> {
    words: Vec<u64>,
    size: usize,
    psum: usize,
    buffer: EditBuffer<CAP>,
}

impl<const CAP: usize> Default for LeafBlock<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> std::fmt::Debug for LeafBlock<CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafBlock")
            .field("len", &self.size)
            .field("ones", &self.psum)
            .field("pending", &self.buffer)
            .finish()
    }
}

impl<const CAP: usize> LeafBlock<CAP> {
    const CAPACITY_CHECK: () = assert!(CAP < 64, "edit buffer capacity must be below 64");

    /// Create an empty block.
    pub fn new() -> Self {
        let () = Self::CAPACITY_CHECK;
        Self {
            words: Vec::new(),
            size: 0,
            psum: 0,
            buffer: EditBuffer::new(),
        }
    }

    /// Create a block over pre-packed words holding `size` bits.
    ///
    /// Bits at positions `>= size` must be clear.
    pub fn from_words(words: Vec<u64>, size: usize) -> Self {
        let () = Self::CAPACITY_CHECK;
        assert!(
            size <= words.len() * WORD_BITS,
            "{size} bits do not fit in {} words",
            words.len()
        );
        assert!(
            tail_is_clear(&words, size),
            "bits past the end of the block must be clear"
        );
        let psum = words.iter().map(|w| w.count_ones() as usize).sum();
        Self {
            words,
            size,
            psum,
            buffer: EditBuffer::new(),
        }
    }

    /// Number of bits in the block.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Return true if the block holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of set bits in the block.
    #[inline]
    pub fn psum(&self) -> usize {
        self.psum
    }

    /// Edits not yet merged into the word store.
    pub fn pending(&self) -> &[Edit] {
        self.buffer.as_slice()
    }

    fn physical_len(&self) -> usize {
        (self.size as isize - self.buffer.net_growth()) as usize
    }

    #[inline]
    fn bit(&self, p: usize) -> bool {
        (self.words[p / WORD_BITS] >> (p % WORD_BITS)) & 1 == 1
    }

    fn reserve_bits(&mut self, bits: usize) {
        if bits > self.words.len() * WORD_BITS {
            self.words.resize(bits.div_ceil(WORD_BITS) + SLACK_WORDS, 0);
        }
    }

    /// Return the bit at `i`.
    pub fn access(&self, i: usize) -> bool {
        assert!(
            i < self.size,
            "index {i} out of bounds for leaf of {} bits",
            self.size
        );
        match self.buffer.resolve(i) {
            Slot::Pending(slot) => self.buffer.value(slot),
            Slot::Physical(p) => self.bit(p),
        }
    }

    /// Number of set bits in `[0, n)`.
    pub fn rank(&self, n: usize) -> usize {
        assert!(
            n <= self.size,
            "rank position {n} out of bounds for leaf of {} bits",
            self.size
        );
        let shift = self.buffer.prefix_shift(n);
        let full = shift.physical / WORD_BITS;
        let mut count: usize = self.words[..full]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        let rem = shift.physical % WORD_BITS;
        if rem > 0 {
            count += (self.words[full] & low_mask(rem)).count_ones() as usize;
        }
        count + shift.gained - shift.lost
    }

    /// Inclusive prefix sum: number of set bits in `[0, i]`.
    pub fn psum_at(&self, i: usize) -> usize {
        assert!(i < self.size);
        self.rank(i + 1)
    }

    /// Smallest `j` such that the weight of `[0, j]` is at least `x`.
    ///
    /// Scans whole words first, replaying pending edits as their physical
    /// position is passed, then backs off one bit at a time to the exact
    /// boundary. Returns 0 for `x == 0`.
    pub fn search_by(&self, x: usize, weight: Weight) -> usize {
        assert!(self.size > 0, "search on an empty leaf");
        assert!(
            x <= weight.of_run(self.psum, self.size),
            "search target {x} exceeds leaf total"
        );
        let physical_len = self.physical_len();
        let edits = self.buffer.as_slice();
        let mut next = 0;
        // Insertions minus deletions replayed so far.
        let mut shift = 0isize;
        let mut acc = 0usize;
        let mut pos = 0usize;
        let mut scanned = 0usize;

        while scanned < physical_len && acc < x {
            let width = (physical_len - scanned).min(WORD_BITS);
            let word = self.words[scanned / WORD_BITS] & low_mask(width);
            acc += weight.of_run(word.count_ones() as usize, width);
            pos += width;
            scanned += width;

            while let Some(e) = edits.get(next) {
                let at = e.position() as isize - shift;
                if at >= scanned as isize {
                    break;
                }
                if e.is_insert() {
                    acc += weight.of_bit(e.value);
                    pos += 1;
                    shift += 1;
                } else {
                    acc -= weight.of_bit(e.value);
                    pos -= 1;
                    shift -= 1;
                }
                next += 1;
            }
        }
        if acc < x {
            // Only insertions behind the last physical bit are left.
            for e in &edits[next..] {
                debug_assert!(e.is_insert());
                acc += weight.of_bit(e.value);
                pos += 1;
            }
        }
        debug_assert!(pos <= self.size);

        while acc >= x && pos > 0 {
            pos -= 1;
            acc -= weight.of_bit(self.access(pos));
        }
        pos
    }

    /// Smallest `j` such that `[0, j]` contains at least `x` set bits.
    pub fn search(&self, x: usize) -> usize {
        self.search_by(x, Weight::Ones)
    }

    /// Smallest `j` such that `[0, j]` contains at least `x` clear bits.
    pub fn search_0(&self, x: usize) -> usize {
        self.search_by(x, Weight::Zeros)
    }

    /// Smallest `j` such that `psum_at(j) + j >= x`.
    pub fn search_r(&self, x: usize) -> usize {
        self.search_by(x + 1, Weight::Positions)
    }

    /// Position of the `k`-th set bit (0-indexed).
    pub fn select(&self, k: usize) -> usize {
        self.search(k + 1)
    }

    /// Position of the `k`-th clear bit (0-indexed).
    pub fn select0(&self, k: usize) -> usize {
        self.search_0(k + 1)
    }

    /// Insert `bit` so that it ends up at position `i`.
    pub fn insert(&mut self, i: usize, bit: bool) {
        assert!(
            i <= self.size,
            "insert position {i} out of bounds for leaf of {} bits",
            self.size
        );
        if i == self.size {
            self.push_back(bit);
            return;
        }
        if CAP == 0 {
            self.reserve_bits(self.size + 1);
            apply_edits(&mut self.words, &[Edit::insert(i, bit)]);
        } else {
            self.buffer.record_insert(i, bit);
        }
        self.size += 1;
        self.psum += bit as usize;
        if self.buffer.is_full() {
            self.commit();
        }
    }

    /// Remove the bit at `i` and return it.
    pub fn remove(&mut self, i: usize) -> bool {
        assert!(
            i < self.size,
            "remove index {i} out of bounds for leaf of {} bits",
            self.size
        );
        let bit = self.access(i);
        if CAP == 0 {
            apply_edits(&mut self.words, &[Edit::delete(i, bit)]);
        } else {
            self.buffer.record_remove(i, bit);
        }
        self.size -= 1;
        self.psum -= bit as usize;
        if self.buffer.is_full() {
            self.commit();
        }
        bit
    }

    /// Overwrite the bit at `i`, returning the previous value.
    pub fn set(&mut self, i: usize, bit: bool) -> bool {
        assert!(
            i < self.size,
            "set index {i} out of bounds for leaf of {} bits",
            self.size
        );
        let old = match self.buffer.resolve(i) {
            Slot::Pending(slot) => {
                let old = self.buffer.value(slot);
                self.buffer.set_value(slot, bit);
                old
            }
            Slot::Physical(p) => {
                let old = self.bit(p);
                if old != bit {
                    self.words[p / WORD_BITS] ^= 1 << (p % WORD_BITS);
                }
                old
            }
        };
        self.psum = self.psum + bit as usize - old as usize;
        old
    }

    /// Append `bit` at the end. Never touches the pending buffer.
    pub fn push_back(&mut self, bit: bool) {
        let p = self.physical_len();
        if p == self.words.len() * WORD_BITS {
            self.words.resize(self.words.len() + SLACK_WORDS, 0);
        }
        if bit {
            self.words[p / WORD_BITS] |= 1 << (p % WORD_BITS);
        }
        self.size += 1;
        self.psum += bit as usize;
    }

    /// Merge pending edits into the word store. No-op when nothing is pending.
    pub fn commit(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        trace!(
            edits = self.buffer.len(),
            bits = self.size,
            "committing leaf buffer"
        );
        self.reserve_bits(self.size);
        apply_edits(&mut self.words, self.buffer.as_slice());
        self.buffer.clear();
        debug_assert!(tail_is_clear(&self.words, self.size));
    }

    /// Split off the right half of the block at word granularity.
    ///
    /// The block must span more than one word.
    pub fn split(&mut self) -> Self {
        self.commit();
        let used = self.size.div_ceil(WORD_BITS);
        assert!(used >= 2, "cannot split a leaf spanning {used} word(s)");
        let left_words = used / 2;
        let left_bits = left_words * WORD_BITS;

        let mut right_words = Vec::with_capacity(used - left_words + SLACK_WORDS);
        right_words.extend_from_slice(&self.words[left_words..used]);
        right_words.resize(used - left_words + SLACK_WORDS, 0);
        let right = Self::from_words(right_words, self.size - left_bits);

        self.words.truncate(left_words);
        self.words.resize(left_words + SLACK_WORDS, 0);
        self.words.shrink_to_fit();
        self.size = left_bits;
        self.psum -= right.psum;
        right
    }

    /// Insert `n` values of `width` bits each, packed little-endian in `word`,
    /// starting at position `i`. Values wider than one bit are coerced to a
    /// single bit (non-zero is set).
    pub fn insert_word(&mut self, i: usize, word: u64, width: u32, n: u32) {
        let (width, n) = (width as usize, n as usize);
        assert!(
            i <= self.size,
            "insert position {i} out of bounds for leaf of {} bits",
            self.size
        );
        assert!(width >= 1 && n >= 1 && width * n <= WORD_BITS);
        assert!(
            width * n == WORD_BITS || word >> (width * n) == 0,
            "bits set past the packed values"
        );
        self.commit();
        if width == 1 {
            self.splice_bits(i, word, n);
        } else {
            let mask = low_mask(width);
            for k in 0..n {
                self.insert(i + k, (word >> (k * width)) & mask != 0);
            }
        }
    }

    /// Insert the low `n` bits of `bits` at `i`. The buffer must be empty.
    fn splice_bits(&mut self, i: usize, bits: u64, n: usize) {
        debug_assert!(self.buffer.is_empty());
        let tail_len = self.size - i;
        let tail: Vec<u64> = (0..tail_len.div_ceil(WORD_BITS))
            .map(|k| {
                let len = (tail_len - k * WORD_BITS).min(WORD_BITS);
                read_bits(&self.words, i + k * WORD_BITS, len)
            })
            .collect();

        self.reserve_bits(self.size + n);
        write_bits(&mut self.words, i, n, bits);
        for (k, &chunk) in tail.iter().enumerate() {
            let len = (tail_len - k * WORD_BITS).min(WORD_BITS);
            write_bits(&mut self.words, i + n + k * WORD_BITS, len, chunk);
        }
        self.size += n;
        self.psum += (bits & low_mask(n)).count_ones() as usize;
    }

    /// Approximate memory footprint in bits.
    pub fn bit_size(&self) -> usize {
        (std::mem::size_of::<Self>() + self.words.capacity() * std::mem::size_of::<u64>()) * 8
    }
}

impl<const CAP: usize> Leaf for LeafBlock<CAP> {
    fn len(&self) -> usize {
        LeafBlock::len(self)
    }

    fn ones(&self) -> usize {
        self.psum
    }

    fn access(&self, i: usize) -> bool {
        LeafBlock::access(self, i)
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

    fn rank(&self, n: usize) -> usize {
        LeafBlock::rank(self, n)
    }

    fn search_by(&self, x: usize, weight: Weight) -> usize {
        LeafBlock::search_by(self, x, weight)
    }

    fn split(&mut self) -> Self {
        LeafBlock::split(self)
    }

    fn bit_size(&self) -> usize {
        LeafBlock::bit_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn contents<const C: usize>(leaf: &LeafBlock<C>) -> Vec<bool> {
        (0..leaf.len()).map(|i| leaf.access(i)).collect()
    }

    fn leaf_from<const C: usize>(bits: &[bool]) -> LeafBlock<C> {
        let mut leaf = LeafBlock::new();
        for &b in bits {
            leaf.push_back(b);
        }
        leaf
    }

    fn assert_matches<const C: usize>(leaf: &LeafBlock<C>, model: &[bool]) {
        assert_eq!(leaf.len(), model.len());
        assert_eq!(contents(leaf), model);
        let ones = model.iter().filter(|&&b| b).count();
        assert_eq!(leaf.psum(), ones);
        assert_eq!(leaf.rank(model.len()), ones);
    }

    #[test]
    fn test_commit_worked_trace() {
        // 70 physical bits: ones at even positions.
        let model: Vec<bool> = (0..70).map(|i| i % 2 == 0).collect();
        let mut leaf = leaf_from::<8>(&model);
        let mut expected = model.clone();

        leaf.insert(1, true);
        expected.insert(1, true);
        leaf.remove(4);
        expected.remove(4);
        leaf.insert(63, true);
        expected.insert(63, true);
        leaf.remove(64);
        expected.remove(64);
        leaf.insert(0, false);
        expected.insert(0, false);
        assert_eq!(leaf.pending().len(), 5);
        assert_matches(&leaf, &expected);

        leaf.commit();
        assert!(leaf.pending().is_empty());
        assert_matches(&leaf, &expected);
    }

    #[test]
    fn test_overflow_carries_across_words() {
        let model: Vec<bool> = (0..200).map(|i| i % 3 == 0).collect();
        let mut leaf = leaf_from::<16>(&model);
        let mut expected = model.clone();
        // Net +10 insertions packed into the first word push a run of bits
        // through every later word.
        for k in 0..10 {
            leaf.insert(5 + k, true);
            expected.insert(5 + k, true);
        }
        leaf.commit();
        assert_matches(&leaf, &expected);
    }

    #[test]
    fn test_underflow_pulls_from_next_word() {
        let model: Vec<bool> = (0..200).map(|i| i % 5 < 2).collect();
        let mut leaf = leaf_from::<16>(&model);
        let mut expected = model.clone();
        for _ in 0..10 {
            leaf.remove(60);
            expected.remove(60);
        }
        leaf.commit();
        assert_matches(&leaf, &expected);
        // The tail past the logical end must have been cleared.
        leaf.push_back(false);
        expected.push(false);
        assert_matches(&leaf, &expected);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut leaf = leaf_from::<8>(&[true, false, true, true]);
        leaf.insert(2, true);
        leaf.commit();
        let once = contents(&leaf);
        let words = leaf.words.clone();
        leaf.commit();
        assert_eq!(contents(&leaf), once);
        assert_eq!(leaf.words, words);
    }

    #[test]
    fn test_insert_then_remove_cancels() {
        let model = vec![true, false, false, true, true];
        let mut leaf = leaf_from::<8>(&model);
        leaf.insert(3, true);
        assert_eq!(leaf.pending().len(), 1);
        assert!(leaf.remove(3));
        assert!(leaf.pending().is_empty());
        assert_matches(&leaf, &model);
    }

    #[test]
    fn test_set_on_pending_insert() {
        let mut leaf = leaf_from::<8>(&[false, false, false]);
        leaf.insert(1, false);
        assert!(!leaf.set(1, true));
        assert_eq!(leaf.pending().len(), 1);
        assert_matches(&leaf, &[false, true, false, false]);
        leaf.commit();
        assert_matches(&leaf, &[false, true, false, false]);
    }

    #[test]
    fn test_push_back_after_tail_delete() {
        let mut leaf = leaf_from::<8>(&[true, true, false, true, true]);
        leaf.remove(4);
        leaf.push_back(false);
        leaf.push_back(true);
        assert_matches(&leaf, &[true, true, false, true, false, true]);
        leaf.commit();
        assert_matches(&leaf, &[true, true, false, true, false, true]);
    }

    #[test]
    fn test_insert_at_end_is_push_back() {
        let mut a = leaf_from::<8>(&[true, false]);
        let mut b = a.clone();
        a.insert(2, true);
        b.push_back(true);
        assert!(a.pending().is_empty());
        assert_eq!(contents(&a), contents(&b));
    }

    #[test]
    fn test_search_variants() {
        // 0 1 1 0 1 0 0 1
        let bits = [false, true, true, false, true, false, false, true];
        let mut leaf = leaf_from::<8>(&bits);
        assert_eq!(leaf.search(0), 0);
        assert_eq!(leaf.search(1), 1);
        assert_eq!(leaf.search(3), 4);
        assert_eq!(leaf.select(3), 7);
        assert_eq!(leaf.search_0(2), 3);
        assert_eq!(leaf.select0(3), 6);
        // psum_at(j) + j: 0, 2, 4, 5, 7, 8, 9, 11
        assert_eq!(leaf.search_r(5), 3);
        assert_eq!(leaf.search_r(6), 4);
        assert_eq!(leaf.search_r(11), 7);

        // Same answers with a delete/insert pair still pending.
        assert!(!leaf.remove(0));
        leaf.insert(0, false);
        assert_eq!(leaf.pending().len(), 2);
        assert_eq!(leaf.select(3), 7);
        assert_eq!(leaf.select0(3), 6);
        assert_eq!(leaf.search_r(6), 4);
    }

    #[test]
    fn test_split_preserves_content() {
        let model: Vec<bool> = (0..300).map(|i| (i * 7) % 11 < 4).collect();
        let mut leaf = leaf_from::<8>(&model);
        leaf.insert(10, true);
        leaf.remove(250);
        let mut expected = model.clone();
        expected.insert(10, true);
        expected.remove(250);

        let (len, ones) = (leaf.len(), leaf.psum());
        let right = leaf.split();
        assert_eq!(leaf.len() % 64, 0);
        assert_eq!(leaf.len() + right.len(), len);
        assert_eq!(leaf.psum() + right.psum(), ones);

        let mut joined = contents(&leaf);
        joined.extend(contents(&right));
        assert_eq!(joined, expected);
    }

    #[test]
    #[should_panic]
    fn test_split_single_word_panics() {
        let mut leaf = leaf_from::<8>(&[true; 40]);
        leaf.split();
    }

    #[test]
    #[should_panic]
    fn test_remove_from_empty_panics() {
        let mut leaf = LeafBlock::<8>::new();
        leaf.remove(0);
    }

    #[test]
    fn test_insert_word() {
        let model: Vec<bool> = (0..100).map(|i| i % 2 == 1).collect();
        let mut leaf = leaf_from::<8>(&model);
        leaf.insert(3, true);
        let mut expected = model.clone();
        expected.insert(3, true);

        let packed = 0xF0F0_0000_FFFF_0001u64;
        leaf.insert_word(17, packed, 1, 64);
        for k in 0..64 {
            expected.insert(17 + k, (packed >> k) & 1 == 1);
        }
        assert_matches(&leaf, &expected);

        // Three 4-bit values: 0b0000, 0b0101, 0b1000.
        leaf.insert_word(0, 0x850, 4, 3);
        expected.insert(0, false);
        expected.insert(1, true);
        expected.insert(2, true);
        assert_matches(&leaf, &expected);
    }

    #[test]
    fn test_from_words() {
        let leaf = LeafBlock::<8>::from_words(vec![0b1011, 0, 0], 70);
        assert_eq!(leaf.psum(), 3);
        assert!(leaf.access(3));
        assert!(!leaf.access(69));
        assert_eq!(leaf.select(2), 3);
    }

    fn random_ops<const C: usize>(seed: u64, steps: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut leaf = LeafBlock::<C>::new();
        let mut model: Vec<bool> = Vec::new();
        for _ in 0..steps {
            match rng.gen_range(0..6) {
                0 | 1 => {
                    let i = rng.gen_range(0..=model.len());
                    let b = rng.gen::<bool>();
                    leaf.insert(i, b);
                    model.insert(i, b);
                }
                2 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    assert_eq!(leaf.remove(i), model.remove(i));
                }
                3 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    let b = rng.gen::<bool>();
                    assert_eq!(leaf.set(i, b), model[i]);
                    model[i] = b;
                }
                4 => {
                    let b = rng.gen::<bool>();
                    leaf.push_back(b);
                    model.push(b);
                }
                _ if !model.is_empty() => {
                    let n = rng.gen_range(0..=model.len());
                    let ones = model[..n].iter().filter(|&&b| b).count();
                    assert_eq!(leaf.rank(n), ones);
                    if leaf.psum() > 0 {
                        let k = rng.gen_range(0..leaf.psum());
                        let pos = leaf.select(k);
                        assert!(model[pos]);
                        assert_eq!(leaf.rank(pos), k);
                    }
                    let zeros = leaf.len() - leaf.psum();
                    if zeros > 0 {
                        let k = rng.gen_range(0..zeros);
                        let pos = leaf.select0(k);
                        assert!(!model[pos]);
                        assert_eq!(pos - leaf.rank(pos), k);
                    }
                }
                _ => {}
            }
        }
        assert_matches(&leaf, &model);
        leaf.commit();
        assert_matches(&leaf, &model);
    }

    #[test]
    fn test_random_ops_match_model() {
        for seed in 0..8 {
            random_ops::<0>(seed, 2_000);
            random_ops::<1>(seed, 2_000);
            random_ops::<8>(seed, 2_000);
            random_ops::<63>(seed, 2_000);
        }
    }
}
