//! # Blob Storage Allocator
//!
//! A best-fit allocator for variable-length values living inside one
//! pre-allocated contiguous buffer. After construction the buffer never
//! grows, records never leave it, and the system allocator is only touched
//! by the external index table.
//!
//! ## Buffer Layout
//!
//! ```text
//! Offset                         Content
//! -----------------------------  ----------------------------------------
//! 0                              rank node 0          (immovable sentinel)
//! 28                             rank node 1
//! ...
//! (RANK_COUNT-1) * 28            rank node 639
//! RANK_COUNT * 28                leftmost sentinel    (immovable)
//! ...                            records and free gaps
//! buffer_size - 28               rightmost sentinel   (immovable)
//! ```
//!
//! Every slot above is a [`RecordHeader`]. Records are threaded into a
//! doubly-linked **occupancy list**, strictly sorted by offset, anchored by
//! the two boundary sentinels. The leftmost sentinel's `left_offset` of 0 and
//! the rightmost sentinel's `right_offset` equal to the buffer size are the
//! unique end-of-list markers.
//!
//! ## Free Space Tracking
//!
//! Free space only exists as the **trailing gap** of some record: the bytes
//! between a record's padded end and its right neighbor's header. Each record
//! with a non-zero trailing gap sits in exactly one circular **rank list**,
//! anchored at the immovable rank node for `size_rank(gap)`, threaded through
//! the same headers. A bit per rank in [`RankMask`] answers "which is the
//! first rank at or above this one with any gap available".
//!
//! Allocation looks up `size_rank(full_size) + 1` in the mask (one rank up,
//! so the found gap strictly exceeds the request and the split never leaves a
//! misclassified fragment) and consumes the front of that rank's list.
//!
//! ## Defragmentation
//!
//! When no rank can host the request but total free space suffices, the
//! allocator compacts on demand: starting from a randomly seeded window with
//! enough accumulated gap, it slides live records one by one to abut their
//! left neighbor (`copy_within`, regions may overlap) until one record's
//! trailing gap fits the request. Every intermediate state keeps the
//! occupancy list, the rank lists, the mask, and the index table consistent,
//! and the byte cost is exactly the live bytes between the seed and the first
//! sufficient gap. A monotonic counter of moved bytes is exposed for
//! observability.
//!
//! Stable indices survive compaction; byte slices do not. `allocate` borrows
//! the store mutably, so the borrow checker statically invalidates slices
//! returned by earlier calls.

use eyre::{ensure, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{MAX_BUFFER_SIZE, META_SIZE, RANK_COUNT, RECORD_HEADER_SIZE};

use super::bitmask::RankMask;
use super::header::{round_value_size, RecordHeader};
use super::index_table::IndexTable;
use super::rank::size_rank;
use super::NIL_INDEX;

/// Allocation failures callers are expected to handle, e.g. by evicting and
/// retrying. Everything else the store reports is a usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NoSpace { requested: u64, available: u64 },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NoSpace {
                requested,
                available,
            } => write!(
                f,
                "no space for {} bytes: {} available",
                requested, available
            ),
        }
    }
}

impl std::error::Error for StorageError {}

pub struct BlobStorage {
    data: Vec<u8>,
    index: IndexTable,
    ranks: RankMask,
    elements: u64,
    occupied: u64,
    defragmented: u64,
    rng: SmallRng,
}

impl BlobStorage {
    /// Creates a store owning a buffer of `buffer_size` bytes (rounded up to
    /// the alignment unit). Fails when the buffer cannot hold the fixed meta
    /// overhead or exceeds the addressable maximum.
    pub fn new(buffer_size: u64) -> Result<Self> {
        let buffer_size = round_value_size(buffer_size);
        ensure!(
            buffer_size >= META_SIZE as u64,
            "buffer size {} below the fixed meta overhead {}",
            buffer_size,
            META_SIZE
        );
        ensure!(
            buffer_size <= MAX_BUFFER_SIZE,
            "buffer size {} exceeds the {} byte maximum",
            buffer_size,
            MAX_BUFFER_SIZE
        );

        let mut storage = Self {
            data: vec![0u8; buffer_size as usize],
            index: IndexTable::new(),
            ranks: RankMask::new(),
            elements: 0,
            occupied: META_SIZE as u64,
            defragmented: 0,
            rng: SmallRng::from_entropy(),
        };
        storage.clear();
        Ok(storage)
    }

    /// Reserves `size` bytes and returns the fresh stable index together with
    /// the zero-initialized-or-stale payload slice. The slice is valid until
    /// the next call that may allocate; the index is valid until `free`.
    ///
    /// Fails with [`StorageError::NoSpace`] exactly when the padded request
    /// plus one header exceeds the remaining capacity; fragmentation alone
    /// never fails an allocation.
    pub fn allocate(&mut self, size: u64) -> Result<(u32, &mut [u8])> {
        let full_size = RECORD_HEADER_SIZE as u64 + round_value_size(size);
        let available = self.capacity() - self.occupied;
        if full_size > available {
            return Err(StorageError::NoSpace {
                requested: full_size,
                available,
            }
            .into());
        }

        let host = self.find_host(full_size);

        self.elements += 1;
        self.occupied += full_size;
        let index = self.index.allocate();

        self.unregister_gap(host);

        let offset = self.record_end(host);
        let host_right = self.header(host).right_offset();
        self.index.set_offset(index, offset);
        {
            let header = self.header_mut(offset);
            header.set_own_index(index);
            header.set_value_size(size);
            header.set_left_offset(host);
            header.set_right_offset(host_right);
            header.set_left_in_rank(offset);
            header.set_right_in_rank(offset);
        }
        self.header_mut(host).set_right_offset(offset);
        self.header_mut(host_right).set_left_offset(offset);

        self.register_gap(host);
        self.register_gap(offset);

        let begin = offset as usize + RECORD_HEADER_SIZE;
        Ok((index, &mut self.data[begin..begin + size as usize]))
    }

    /// Resolves a stable index to its payload, or `None` for indices that
    /// are out of range or already freed.
    pub fn get(&self, index: u32) -> Option<&[u8]> {
        let offset = self.index.offset(index)?;
        let len = self.header(offset).value_size() as usize;
        let begin = offset as usize + RECORD_HEADER_SIZE;
        Some(&self.data[begin..begin + len])
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, index: u32) -> Option<&mut [u8]> {
        let offset = self.index.offset(index)?;
        let len = self.header(offset).value_size() as usize;
        let begin = offset as usize + RECORD_HEADER_SIZE;
        Some(&mut self.data[begin..begin + len])
    }

    /// Releases a record, merging its space into the left neighbor's trailing
    /// gap. Returns false without side effect for invalid or freed indices.
    pub fn free(&mut self, index: u32) -> bool {
        let Some(offset) = self.index.offset(index) else {
            return false;
        };

        self.elements -= 1;
        let full_size = self.header(offset).full_size();
        debug_assert!(self.occupied >= META_SIZE as u64 + full_size);
        self.occupied -= full_size;

        let left = self.header(offset).left_offset();
        let right = self.header(offset).right_offset();
        self.unregister_gap(left);
        self.unregister_gap(offset);
        self.header_mut(left).set_right_offset(right);
        self.header_mut(right).set_left_offset(left);
        self.register_gap(left);

        self.index.release(index);
        true
    }

    pub fn elements_count(&self) -> u64 {
        self.elements
    }

    /// Occupied fraction of the buffer, meta overhead included.
    pub fn fill_rate(&self) -> f64 {
        self.occupied as f64 / self.capacity() as f64
    }

    /// Total bytes moved by defragmentation since construction. Monotonic.
    pub fn defragmented_bytes(&self) -> u64 {
        self.defragmented
    }

    pub fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    /// Resets the store to empty, rebuilding the sentinel layout in place.
    /// The buffer is retained.
    pub fn clear(&mut self) {
        self.elements = 0;
        self.occupied = META_SIZE as u64;
        self.index.clear();
        self.ranks = RankMask::new();

        // Rank nodes: immovable anchors of the per-rank rings, self-linked
        // while their ring is empty.
        for rank in 0..RANK_COUNT {
            let offset = Self::rank_node_offset(rank);
            let header = self.header_mut(offset);
            header.set_own_index(NIL_INDEX);
            header.set_value_size(0);
            header.set_left_offset(offset);
            header.set_right_offset(offset);
            header.set_left_in_rank(offset);
            header.set_right_in_rank(offset);
        }

        let leftmost = Self::leftmost_offset();
        let rightmost = self.rightmost_offset();
        let capacity = self.capacity();
        {
            let header = self.header_mut(leftmost);
            header.set_own_index(NIL_INDEX);
            header.set_value_size(0);
            header.set_left_offset(0);
            header.set_right_offset(rightmost);
            header.set_left_in_rank(leftmost);
            header.set_right_in_rank(leftmost);
        }
        {
            let header = self.header_mut(rightmost);
            header.set_own_index(NIL_INDEX);
            header.set_value_size(0);
            header.set_left_offset(leftmost);
            header.set_right_offset(capacity);
            header.set_left_in_rank(rightmost);
            header.set_right_in_rank(rightmost);
        }

        self.register_gap(leftmost);
    }

    const fn leftmost_offset() -> u64 {
        (RANK_COUNT * RECORD_HEADER_SIZE) as u64
    }

    fn rightmost_offset(&self) -> u64 {
        self.capacity() - RECORD_HEADER_SIZE as u64
    }

    const fn rank_node_offset(rank: usize) -> u64 {
        (rank * RECORD_HEADER_SIZE) as u64
    }

    fn header(&self, offset: u64) -> &RecordHeader {
        let start = offset as usize;
        RecordHeader::from_bytes(&self.data[start..start + RECORD_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self, offset: u64) -> &mut RecordHeader {
        let start = offset as usize;
        RecordHeader::from_bytes_mut(&mut self.data[start..start + RECORD_HEADER_SIZE]).unwrap()
    }

    /// First byte past the record's padded payload; where its trailing gap
    /// begins.
    fn record_end(&self, offset: u64) -> u64 {
        offset + self.header(offset).full_size()
    }

    fn trailing_gap(&self, offset: u64) -> u64 {
        self.header(offset).right_offset() - self.record_end(offset)
    }

    /// Picks the record whose trailing gap will host a `full_size` record,
    /// defragmenting when no rank has one ready.
    fn find_host(&mut self, full_size: u64) -> u64 {
        let required = size_rank(full_size) + 1;
        match self.ranks.find(required) {
            Some(rank) => {
                let node = Self::rank_node_offset(rank);
                let first = self.header(node).right_in_rank();
                assert!(first != node, "rank {} flagged available but empty", rank);
                first
            }
            None => self.defragment(full_size),
        }
    }

    /// Slides live records leftward until some record's trailing gap reaches
    /// `full_size`, and returns that record's offset.
    ///
    /// The window is seeded at a uniformly random occupied record and grown
    /// right, then left, until the gaps it spans add up to the request; the
    /// capacity check in `allocate` guarantees such a window exists. Inside
    /// the window each record is moved at most once, left to right, so the
    /// total `copy_within` cost is bounded by the live bytes the window
    /// holds.
    fn defragment(&mut self, full_size: u64) -> u64 {
        let seed = self
            .random_occupied_offset()
            .unwrap_or(Self::leftmost_offset());
        let capacity = self.capacity();

        let mut accumulated = 0u64;
        let mut cursor = seed;
        while accumulated < full_size && self.header(cursor).right_offset() != capacity {
            accumulated += self.trailing_gap(cursor);
            cursor = self.header(cursor).right_offset();
        }
        let mut start = seed;
        while accumulated < full_size && self.header(start).left_offset() != 0 {
            start = self.header(start).left_offset();
            accumulated += self.trailing_gap(start);
        }
        assert!(
            accumulated >= full_size,
            "compaction window of {} bytes cannot satisfy {}",
            accumulated,
            full_size
        );

        let mut host = start;
        loop {
            if self.trailing_gap(host) >= full_size {
                return host;
            }
            let next = self.header(host).right_offset();
            assert!(
                next != self.rightmost_offset(),
                "compaction ran past its window"
            );

            let new_offset = self.record_end(host);
            if new_offset == next {
                host = next;
                continue;
            }

            let next_full = self.header(next).full_size();
            let after_next = self.header(next).right_offset();
            let moved_index = self.header(next).own_index();

            self.unregister_gap(host);
            self.unregister_gap(next);

            self.header_mut(host).set_right_offset(new_offset);
            self.header_mut(after_next).set_left_offset(new_offset);
            self.index.set_offset(moved_index, new_offset);

            // Source and destination may overlap when the gap is smaller
            // than the record being moved.
            self.data.copy_within(
                next as usize..(next + next_full) as usize,
                new_offset as usize,
            );
            self.defragmented += next_full;

            host = new_offset;
            self.register_gap(host);
        }
    }

    fn random_occupied_offset(&mut self) -> Option<u64> {
        if self.elements == 0 {
            return None;
        }
        loop {
            let candidate = self.rng.gen_range(0..self.index.len() as u32);
            if let Some(offset) = self.index.offset(candidate) {
                return Some(offset);
            }
        }
    }

    /// Takes the record out of its rank ring and re-links it to itself.
    /// No-op for records with no trailing gap, which are never ranked.
    fn unregister_gap(&mut self, offset: u64) {
        let gap = self.trailing_gap(offset);
        if gap == 0 {
            return;
        }
        let left = self.header(offset).left_in_rank();
        let right = self.header(offset).right_in_rank();
        if left == right {
            // Ring is down to the rank node and this record.
            self.ranks.reset(size_rank(gap));
        }
        self.header_mut(left).set_right_in_rank(right);
        self.header_mut(right).set_left_in_rank(left);
        let header = self.header_mut(offset);
        header.set_left_in_rank(offset);
        header.set_right_in_rank(offset);
    }

    /// Inserts the record at the front of the ring for its current trailing
    /// gap. No-op when the gap is zero.
    fn register_gap(&mut self, offset: u64) {
        let gap = self.trailing_gap(offset);
        if gap == 0 {
            return;
        }
        let rank = size_rank(gap);
        let node = Self::rank_node_offset(rank);
        let old_first = self.header(node).right_in_rank();
        if old_first == node {
            self.ranks.set(rank);
        }
        {
            let header = self.header_mut(offset);
            header.set_left_in_rank(node);
            header.set_right_in_rank(old_first);
        }
        self.header_mut(node).set_right_in_rank(offset);
        self.header_mut(old_first).set_left_in_rank(offset);
    }

    /// Walks every structure and checks the store's invariants: the sorted
    /// occupancy list, non-overlapping records, index-table agreement, rank
    /// ring membership matching every trailing gap, the availability mask,
    /// and the occupied-space accounting.
    pub fn validate(&self) -> Result<()> {
        let leftmost = Self::leftmost_offset();
        let rightmost = self.rightmost_offset();
        let capacity = self.capacity();

        ensure!(
            self.header(leftmost).left_offset() == 0,
            "leftmost sentinel lost its end-of-list marker"
        );

        let mut gap_counts = vec![0u64; RANK_COUNT];
        let mut live = 0u64;
        let mut payload_bytes = 0u64;
        let mut cursor = leftmost;
        loop {
            let right = self.header(cursor).right_offset();
            if cursor == rightmost {
                ensure!(
                    right == capacity,
                    "rightmost sentinel lost its end-of-list marker"
                );
                break;
            }
            ensure!(
                right > cursor && right <= rightmost,
                "occupancy list not offset-sorted at {}",
                cursor
            );
            ensure!(
                self.record_end(cursor) <= right,
                "record at {} overlaps its right neighbor",
                cursor
            );
            ensure!(
                self.header(right).left_offset() == cursor,
                "asymmetric occupancy link at {}",
                cursor
            );
            if cursor != leftmost {
                live += 1;
                payload_bytes += self.header(cursor).full_size();
                let index = self.header(cursor).own_index();
                ensure!(
                    self.index.offset(index) == Some(cursor),
                    "index {} does not resolve to record at {}",
                    index,
                    cursor
                );
            }
            let gap = right - self.record_end(cursor);
            if gap > 0 {
                gap_counts[size_rank(gap)] += 1;
            }
            cursor = right;
        }

        ensure!(
            live == self.elements,
            "occupancy list holds {} records, counter says {}",
            live,
            self.elements
        );
        ensure!(
            payload_bytes + META_SIZE as u64 == self.occupied,
            "occupied-space accounting off: {} + meta != {}",
            payload_bytes,
            self.occupied
        );

        let occupied_slots = (0..self.index.len())
            .filter(|&slot| self.index.offset(slot as u32).is_some())
            .count() as u64;
        ensure!(
            occupied_slots == self.elements,
            "index table holds {} occupied slots for {} records",
            occupied_slots,
            self.elements
        );

        for rank in 0..RANK_COUNT {
            let node = Self::rank_node_offset(rank);
            let mut members = 0u64;
            let mut cursor = node;
            loop {
                let next = self.header(cursor).right_in_rank();
                ensure!(
                    self.header(next).left_in_rank() == cursor,
                    "asymmetric rank link in ring {}",
                    rank
                );
                if next == node {
                    break;
                }
                let gap = self.trailing_gap(next);
                ensure!(
                    gap > 0 && size_rank(gap) == rank,
                    "record at {} with gap {} sits in ring {}",
                    next,
                    gap,
                    rank
                );
                members += 1;
                ensure!(
                    members <= self.elements + 1,
                    "rank ring {} does not terminate",
                    rank
                );
                cursor = next;
            }
            ensure!(
                (members > 0) == self.ranks.is_set(rank),
                "availability bit {} out of sync with ring of {} members",
                rank,
                members
            );
            ensure!(
                members == gap_counts[rank],
                "ring {} holds {} records but {} gaps have that rank",
                rank,
                members,
                gap_counts[rank]
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(size: u64) -> BlobStorage {
        BlobStorage::new(size).unwrap()
    }

    fn fill(value: &mut [u8], byte: u8) {
        value.fill(byte);
    }

    #[test]
    fn rejects_buffer_below_meta_overhead() {
        let result = BlobStorage::new(META_SIZE as u64 - 4);
        assert!(result.is_err());

        let result = BlobStorage::new(MAX_BUFFER_SIZE + 4);
        assert!(result.is_err());
    }

    #[test]
    fn minimal_buffer_constructs_empty() {
        let storage = store(META_SIZE as u64);
        assert_eq!(storage.elements_count(), 0);
        assert!((storage.fill_rate() - 1.0).abs() < f64::EPSILON);
        storage.validate().unwrap();
    }

    #[test]
    fn allocate_fill_and_read_back() {
        let mut storage = store(1_000_000);

        let (i1, v1) = storage.allocate(10).unwrap();
        fill(v1, 1);
        let (i2, v2) = storage.allocate(20).unwrap();
        fill(v2, 2);
        let (i3, v3) = storage.allocate(30).unwrap();
        fill(v3, 3);
        storage.validate().unwrap();

        assert!(storage.get(i2).unwrap().iter().all(|&b| b == 2));
        assert_eq!(storage.get(i2).unwrap().len(), 20);

        assert!(storage.free(i2));
        assert!(storage.get(i1).unwrap().iter().all(|&b| b == 1));
        assert!(storage.free(i1));
        assert!(storage.get(i3).unwrap().iter().all(|&b| b == 3));
        assert!(storage.free(i3));

        assert_eq!(storage.elements_count(), 0);
        storage.validate().unwrap();
    }

    #[test]
    fn free_rejects_stale_and_invalid_indices() {
        let mut storage = store(1_000_000);
        let (index, _) = storage.allocate(16).unwrap();

        assert!(storage.free(index));
        assert!(!storage.free(index));
        assert!(!storage.free(9999));
        assert!(!storage.free(NIL_INDEX));
        storage.validate().unwrap();
    }

    #[test]
    fn zero_sized_allocation_gets_unique_index() {
        let mut storage = store(1_000_000);

        let (a, slice) = storage.allocate(0).unwrap();
        assert!(slice.is_empty());
        let (b, _) = storage.allocate(0).unwrap();

        assert_ne!(a, b);
        assert_eq!(storage.get(a).unwrap().len(), 0);
        assert_eq!(storage.elements_count(), 2);
        storage.validate().unwrap();
    }

    #[test]
    fn exact_fit_succeeds_and_one_more_byte_fails() {
        let mut storage = store(100_000);
        let free = storage.capacity() - META_SIZE as u64;
        let exact = free - RECORD_HEADER_SIZE as u64;

        let err = store(100_000).allocate(exact + 4).unwrap_err();
        let no_space = err.downcast_ref::<StorageError>();
        assert!(matches!(no_space, Some(StorageError::NoSpace { .. })));

        let (index, slice) = storage.allocate(exact).unwrap();
        assert_eq!(slice.len(), exact as usize);
        assert_eq!(storage.capacity(), storage.occupied);
        storage.validate().unwrap();

        assert!(storage.free(index));
        storage.validate().unwrap();
    }

    #[test]
    fn larger_gap_hosts_after_freeing_first_of_two() {
        let mut storage = store(1_000_000);

        let (a, _) = storage.allocate(400_000).unwrap();
        let (b, _) = storage.allocate(400_000).unwrap();
        assert!(storage.free(a));

        let (c, _) = storage.allocate(500_000).unwrap();
        storage.validate().unwrap();

        assert!(storage.free(b));
        assert!(storage.free(c));
        assert_eq!(storage.elements_count(), 0);
        storage.validate().unwrap();
    }

    #[test]
    fn allocate_free_cycle_neither_leaks_nor_defragments() {
        let mut storage = store(1_000_000);
        let (index, _) = storage.allocate(1000).unwrap();
        storage.free(index);
        let occupied_baseline = storage.occupied;
        let moved_baseline = storage.defragmented_bytes();

        for _ in 0..10_000 {
            let (index, _) = storage.allocate(1000).unwrap();
            assert!(storage.free(index));
        }

        assert_eq!(storage.occupied, occupied_baseline);
        assert_eq!(storage.defragmented_bytes(), moved_baseline);
        storage.validate().unwrap();
    }

    #[test]
    fn whole_buffer_allocatable_after_freeing_everything() {
        let mut storage = store(500_000);
        let mut indices = Vec::new();
        for _ in 0..40 {
            let (index, _) = storage.allocate(10_000).unwrap();
            indices.push(index);
        }
        for index in indices {
            assert!(storage.free(index));
        }

        let free = storage.capacity() - META_SIZE as u64;
        let (index, slice) = storage
            .allocate(free - RECORD_HEADER_SIZE as u64)
            .unwrap();
        assert_eq!(slice.len() as u64, free - RECORD_HEADER_SIZE as u64);
        assert!(storage.free(index));
        storage.validate().unwrap();
    }

    #[test]
    fn fragmentation_is_healed_by_compaction() {
        let mut storage = store(1_000_000);

        // Fill with alternating records, then free every other one so no
        // single gap can host a large request.
        let mut indices = Vec::new();
        for _ in 0..90 {
            let (index, _) = storage.allocate(10_000).unwrap();
            indices.push(index);
        }
        for pair in indices.chunks(2) {
            assert!(storage.free(pair[0]));
        }
        storage.validate().unwrap();

        let before = storage.defragmented_bytes();
        let mut held = Vec::new();
        for _ in 0..20 {
            let (index, _) = storage.allocate(20_000).unwrap();
            held.push(index);
        }
        storage.validate().unwrap();

        assert!(
            storage.defragmented_bytes() > before,
            "twenty 20k allocations into 10k holes must compact"
        );

        // Survivors kept their contents' addresses via the index table.
        for pair in indices.chunks(2) {
            assert!(storage.get(pair[1]).is_some());
        }
        for index in held {
            assert!(storage.free(index));
        }
        storage.validate().unwrap();
    }

    #[test]
    fn defragmentation_preserves_record_contents() {
        let mut storage = store(200_000);

        let mut indices = Vec::new();
        for byte in 0..15u8 {
            let (index, value) = storage.allocate(10_000).unwrap();
            fill(value, byte);
            indices.push(index);
        }
        for pair in indices.chunks(2) {
            assert!(storage.free(pair[0]));
        }

        let (big, value) = storage.allocate(60_000).unwrap();
        fill(value, 0xEE);
        storage.validate().unwrap();

        for (slot, pair) in indices.chunks(2).enumerate() {
            if pair.len() == 2 {
                let byte = (slot * 2 + 1) as u8;
                let value = storage.get(pair[1]).unwrap();
                assert!(value.iter().all(|&b| b == byte), "record {} corrupted", byte);
            }
        }
        assert!(storage.get(big).unwrap().iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn clear_resets_to_meta_only() {
        let mut storage = store(1_000_000);
        for _ in 0..50 {
            storage.allocate(1000).unwrap();
        }

        storage.clear();

        assert_eq!(storage.elements_count(), 0);
        let expected = META_SIZE as f64 / storage.capacity() as f64;
        assert!((storage.fill_rate() - expected).abs() < 1e-12);
        storage.validate().unwrap();

        let (index, _) = storage.allocate(100).unwrap();
        assert!(storage.get(index).is_some());
    }

    #[test]
    fn get_survives_neighbor_free() {
        let mut storage = store(1_000_000);
        let (a, value) = storage.allocate(64).unwrap();
        fill(value, 0xAB);
        let (b, _) = storage.allocate(64).unwrap();

        assert!(storage.free(b));

        let value = storage.get(a).unwrap();
        assert!(value.iter().all(|&b| b == 0xAB));
        storage.validate().unwrap();
    }
}
