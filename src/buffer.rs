//! Pending-edit buffer for a single leaf block.
//!
//! A fixed-capacity array of edits kept sorted by index. Each edit's index is
//! the logical position it occupies once every earlier edit has been applied
//! in order: an insertion's index is where its bit lands, a deletion's index
//! is the position of the first surviving bit after the hole.
//!
//! Two consecutive entries `a, b` always satisfy `b.index >= a.index + 1` when
//! `a` is an insertion and `b.index >= a.index` when `a` is a deletion. This is
//! what lets [`crate::block::LeafBlock::commit`] replay the buffer as a single
//! left-to-right stream.

/// Kind of a buffered edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// A bit was inserted.
    Insert,
    /// A bit was deleted.
    Delete,
}

/// A single buffered edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    /// Logical index (see module docs).
    pub index: u32,
    /// Insertion or deletion.
    pub kind: EditKind,
    /// Inserted bit, or the bit that was deleted.
    pub value: bool,
}

impl Edit {
    const EMPTY: Edit = Edit {
        index: 0,
        kind: EditKind::Insert,
        value: false,
    };

    pub(crate) fn insert(index: usize, value: bool) -> Self {
        Self {
            index: to_index(index),
            kind: EditKind::Insert,
            value,
        }
    }

    pub(crate) fn delete(index: usize, value: bool) -> Self {
        Self {
            index: to_index(index),
            kind: EditKind::Delete,
            value,
        }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) fn is_insert(&self) -> bool {
        self.kind == EditKind::Insert
    }
}

fn to_index(index: usize) -> u32 {
    u32::try_from(index).expect("leaf blocks are limited to u32::MAX bits")
}

/// Where a logical position lives once the buffer is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The bit is a buffered insertion at this buffer slot.
    Pending(usize),
    /// The bit is stored in the word store at this physical position.
    Physical(usize),
}

/// Buffer compensation for a prefix `[0, n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrefixShift {
    /// Physical position equivalent to logical `n`.
    pub physical: usize,
    /// Set bits added by buffered insertions inside the prefix.
    pub gained: usize,
    /// Set bits removed by buffered deletions inside the prefix.
    pub lost: usize,
}

/// Sorted fixed-capacity edit log.
#[derive(Clone)]
pub struct EditBuffer<const CAP: usize> {
    entries: [Edit; CAP],
    len: usize,
}

impl<const CAP: usize> Default for EditBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> std::fmt::Debug for EditBuffer<CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<const CAP: usize> EditBuffer<CAP> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            entries: [Edit::EMPTY; CAP],
            len: 0,
        }
    }

    /// Number of pending edits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if no edits are pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return true if no more edits fit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == CAP
    }

    /// Pending edits in index order.
    #[inline]
    pub fn as_slice(&self) -> &[Edit] {
        &self.entries[..self.len]
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Net number of bits the buffer adds on top of the word store.
    pub(crate) fn net_growth(&self) -> isize {
        self.as_slice()
            .iter()
            .map(|e| if e.is_insert() { 1 } else { -1 })
            .sum()
    }

    pub(crate) fn value(&self, slot: usize) -> bool {
        self.entries[slot].value
    }

    pub(crate) fn set_value(&mut self, slot: usize, value: bool) {
        debug_assert!(self.entries[slot].is_insert());
        self.entries[slot].value = value;
    }

    /// Map logical position `i` to the buffer or the word store.
    pub(crate) fn resolve(&self, i: usize) -> Slot {
        let mut physical = i;
        for (slot, e) in self.as_slice().iter().enumerate() {
            let b = e.position();
            if b > i {
                break;
            }
            match e.kind {
                EditKind::Insert if b == i => return Slot::Pending(slot),
                EditKind::Insert => physical -= 1,
                EditKind::Delete => physical += 1,
            }
        }
        Slot::Physical(physical)
    }

    /// Compensation for the logical prefix `[0, n)`.
    pub(crate) fn prefix_shift(&self, n: usize) -> PrefixShift {
        let mut shift = PrefixShift {
            physical: n,
            gained: 0,
            lost: 0,
        };
        for e in self.as_slice() {
            if e.position() >= n {
                break;
            }
            match e.kind {
                EditKind::Insert => {
                    shift.physical -= 1;
                    shift.gained += e.value as usize;
                }
                EditKind::Delete => {
                    shift.physical += 1;
                    shift.lost += e.value as usize;
                }
            }
        }
        shift
    }

    /// Record an insertion of `value` at logical position `i`.
    pub(crate) fn record_insert(&mut self, i: usize, value: bool) {
        assert!(self.len < CAP, "edit buffer overflow");
        let mut at = self.len;
        while at > 0 {
            let e = &mut self.entries[at - 1];
            let b = e.position();
            if b > i || (b == i && e.is_insert()) {
                e.index += 1;
                at -= 1;
            } else {
                break;
            }
        }
        self.insert_at(at, Edit::insert(i, value));
    }

    /// Record the deletion of the bit at logical position `i`, whose value is
    /// `value`. A pending insertion at `i` is retracted instead.
    pub(crate) fn record_remove(&mut self, i: usize, value: bool) {
        let mut at = self.len;
        while at > 0 {
            let e = self.entries[at - 1];
            let b = e.position();
            if b > i {
                self.entries[at - 1].index -= 1;
                at -= 1;
            } else if b == i && e.is_insert() {
                debug_assert_eq!(e.value, value);
                self.remove_at(at - 1);
                return;
            } else {
                break;
            }
        }
        assert!(self.len < CAP, "edit buffer overflow");
        self.insert_at(at, Edit::delete(i, value));
    }

    fn insert_at(&mut self, at: usize, edit: Edit) {
        self.entries.copy_within(at..self.len, at + 1);
        self.entries[at] = edit;
        self.len += 1;
    }

    fn remove_at(&mut self, at: usize) {
        self.entries.copy_within(at + 1..self.len, at);
        self.len -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(buf: &EditBuffer<8>) -> Vec<(u32, EditKind)> {
        buf.as_slice().iter().map(|e| (e.index, e.kind)).collect()
    }

    #[test]
    fn test_insert_shifts_later_entries() {
        let mut buf = EditBuffer::<8>::new();
        buf.record_insert(5, true);
        buf.record_insert(2, false);
        assert_eq!(
            kinds(&buf),
            vec![(2, EditKind::Insert), (6, EditKind::Insert)]
        );

        // A second insertion at an occupied slot lands in front of it.
        buf.record_insert(2, true);
        assert_eq!(
            kinds(&buf),
            vec![
                (2, EditKind::Insert),
                (3, EditKind::Insert),
                (7, EditKind::Insert)
            ]
        );
        assert!(buf.value(0));
        assert!(!buf.value(1));
    }

    #[test]
    fn test_remove_cancels_pending_insert() {
        let mut buf = EditBuffer::<8>::new();
        buf.record_insert(3, true);
        buf.record_insert(9, false);
        buf.record_remove(3, true);
        assert_eq!(kinds(&buf), vec![(8, EditKind::Insert)]);
    }

    #[test]
    fn test_delete_keeps_order_after_existing_delete() {
        let mut buf = EditBuffer::<8>::new();
        buf.record_remove(4, true);
        buf.record_remove(4, false);
        buf.record_insert(4, true);
        assert_eq!(
            kinds(&buf),
            vec![
                (4, EditKind::Delete),
                (4, EditKind::Delete),
                (4, EditKind::Insert)
            ]
        );
        assert_eq!(buf.net_growth(), -1);
    }

    #[test]
    fn test_resolve_and_prefix_shift() {
        let mut buf = EditBuffer::<8>::new();
        buf.record_insert(1, true); // logical 1 is pending
        buf.record_remove(3, false); // drops physical bit 2
        assert_eq!(buf.resolve(0), Slot::Physical(0));
        assert_eq!(buf.resolve(1), Slot::Pending(0));
        assert_eq!(buf.resolve(2), Slot::Physical(1));
        assert_eq!(buf.resolve(3), Slot::Physical(3));

        let shift = buf.prefix_shift(4);
        assert_eq!(shift.physical, 4);
        assert_eq!(shift.gained, 1);
        assert_eq!(shift.lost, 0);
    }
}
