//! # String Hash Map
//!
//! A separate-chained hash map layered on [`BlobStorage`]. The bucket table
//! is an ordinary vector of stable indices, but everything per-entry (the
//! chain link, the stored key hash, the key bytes, and the value) lives
//! inside the storage buffer, inside the payload of one allocation:
//!
//! ```text
//! payload:  [ entry header (16) | key bytes | value bytes ]
//! ```
//!
//! ## Entry Header (16 bytes)
//!
//! ```text
//! Bits     Width  Field      Description
//! -------  -----  ---------  ------------------------------------------
//! 0..56    56     key_hash   Stored hash; chain walks short-circuit on a
//!                            mismatch without touching the key bytes
//! 56..96   40     key_size   Key length in bytes
//! 96..128  32     list_next  Stable index of the next entry in the bucket
//! ```
//!
//! Chains address entries by stable index, never by buffer offset, so the
//! map keeps working when defragmentation moves entries: the next lookup
//! simply re-resolves through the index table.
//!
//! ## Growth
//!
//! The bucket table doubles when `elements + 1 > buckets *
//! BUCKET_CAPACITY_FACTOR`, keeping chains short. Rehashing only relinks
//! existing entries into the wider table; it performs no storage
//! allocation, so no entry moves and no slice is invalidated by it.

use eyre::{ensure, Result};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::config::{BUCKET_CAPACITY_FACTOR, MAP_ENTRY_HEADER_SIZE};
use crate::storage::{BlobStorage, NIL_INDEX};

const KEY_HASH_BITS: u32 = 56;
const KEY_HASH_MASK: u64 = (1 << KEY_HASH_BITS) - 1;
const KEY_SIZE_MASK: u64 = (1 << 40) - 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct EntryHeader {
    packed: [u8; 12],
    list_next: [u8; 4],
}

const _: () = assert!(size_of::<EntryHeader>() == MAP_ENTRY_HEADER_SIZE);

impl EntryHeader {
    fn key_hash(&self) -> u64 {
        let window = u64::from_le_bytes(self.packed[0..8].try_into().unwrap());
        window & KEY_HASH_MASK
    }

    fn set_key_hash(&mut self, hash: u64) {
        debug_assert!(hash <= KEY_HASH_MASK);
        let mut window = u64::from_le_bytes(self.packed[0..8].try_into().unwrap());
        window &= !KEY_HASH_MASK;
        window |= hash;
        self.packed[0..8].copy_from_slice(&window.to_le_bytes());
    }

    fn key_size(&self) -> u64 {
        let window = u64::from_le_bytes(self.packed[4..12].try_into().unwrap());
        (window >> 24) & KEY_SIZE_MASK
    }

    fn set_key_size(&mut self, size: u64) {
        debug_assert!(size <= KEY_SIZE_MASK);
        let mut window = u64::from_le_bytes(self.packed[4..12].try_into().unwrap());
        window &= !(KEY_SIZE_MASK << 24);
        window |= size << 24;
        self.packed[4..12].copy_from_slice(&window.to_le_bytes());
    }

    fn list_next(&self) -> u32 {
        u32::from_le_bytes(self.list_next)
    }

    fn set_list_next(&mut self, index: u32) {
        self.list_next = index.to_le_bytes();
    }
}

fn hash_key(key: &[u8]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hasher;

    let mut hasher = DefaultHasher::new();
    hasher.write(key);
    hasher.finish() & KEY_HASH_MASK
}

pub struct StringMap {
    storage: BlobStorage,
    buckets: Vec<u32>,
}

impl StringMap {
    /// Creates a map over a fresh store of `buffer_size` bytes.
    pub fn new(buffer_size: u64) -> Result<Self> {
        Ok(Self {
            storage: BlobStorage::new(buffer_size)?,
            buckets: vec![NIL_INDEX; 1],
        })
    }

    /// Inserts `key` with an uninitialized value of `value_size` bytes and
    /// returns the stable index plus the value slice for the caller to fill.
    /// An existing entry under the same key is erased first, so its space
    /// can host the replacement.
    ///
    /// Fails with `NoSpace` when the storage cannot fit the entry; a
    /// same-key entry is gone by then, matching the storage-first contract.
    pub fn put_uninitialized(&mut self, key: &[u8], value_size: u64) -> Result<(u32, &mut [u8])> {
        if self.storage.elements_count() + 1 > (self.buckets.len() * BUCKET_CAPACITY_FACTOR) as u64
        {
            self.grow_table();
        }

        let hash = hash_key(key);
        let bucket = self.bucket_of(hash);
        let erased = self.unlink_from_bucket(bucket, hash, key);
        if erased != NIL_INDEX {
            let freed = self.storage.free(erased);
            debug_assert!(freed);
        }

        let total = MAP_ENTRY_HEADER_SIZE as u64 + key.len() as u64 + value_size;
        let head = self.buckets[bucket];
        let (index, payload) = self.storage.allocate(total)?;

        let mut header = EntryHeader::new_zeroed();
        header.set_key_hash(hash);
        header.set_key_size(key.len() as u64);
        header.set_list_next(head);
        payload[..MAP_ENTRY_HEADER_SIZE].copy_from_slice(header.as_bytes());
        payload[MAP_ENTRY_HEADER_SIZE..MAP_ENTRY_HEADER_SIZE + key.len()].copy_from_slice(key);
        self.buckets[bucket] = index;

        let value = &mut payload[MAP_ENTRY_HEADER_SIZE + key.len()..];
        Ok((index, value))
    }

    /// Inserts `key` -> `value`, replacing any existing entry.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(u32, &mut [u8])> {
        let (index, slice) = self.put_uninitialized(key, value.len() as u64)?;
        slice.copy_from_slice(value);
        Ok((index, slice))
    }

    /// Looks up `key` and returns its stable index and value slice.
    pub fn get(&self, key: &[u8]) -> Option<(u32, &[u8])> {
        let hash = hash_key(key);
        let (_prev, index) = self.find_in_bucket(self.bucket_of(hash), hash, key);
        if index == NIL_INDEX {
            return None;
        }
        let payload = self.storage.get(index)?;
        let header = EntryHeader::ref_from_bytes(&payload[..MAP_ENTRY_HEADER_SIZE]).unwrap();
        let value_start = MAP_ENTRY_HEADER_SIZE + header.key_size() as usize;
        Some((index, &payload[value_start..]))
    }

    /// Resolves a stable index to its value slice.
    pub fn get_index(&self, index: u32) -> Option<&[u8]> {
        let payload = self.storage.get(index)?;
        let header = EntryHeader::ref_from_bytes(&payload[..MAP_ENTRY_HEADER_SIZE]).unwrap();
        let value_start = MAP_ENTRY_HEADER_SIZE + header.key_size() as usize;
        Some(&payload[value_start..])
    }

    /// Removes the entry under `key`. Returns false when absent.
    pub fn erase(&mut self, key: &[u8]) -> bool {
        let hash = hash_key(key);
        let index = self.unlink_from_bucket(self.bucket_of(hash), hash, key);
        if index == NIL_INDEX {
            return false;
        }
        let freed = self.storage.free(index);
        debug_assert!(freed);
        true
    }

    /// Removes the entry holding this stable index. Returns false for
    /// indices that are out of range or already freed.
    ///
    /// The bucket is recomputed from the stored hash; the chain is then
    /// walked comparing indices, which identifies the entry as reliably as
    /// the key bytes would.
    pub fn erase_index(&mut self, index: u32) -> bool {
        let Some(payload) = self.storage.get(index) else {
            return false;
        };
        let header = *EntryHeader::ref_from_bytes(&payload[..MAP_ENTRY_HEADER_SIZE]).unwrap();
        let bucket = self.bucket_of(header.key_hash());

        let unlinked = self.unlink_index(bucket, index);
        debug_assert!(unlinked, "live entry missing from its bucket chain");
        if !unlinked {
            return false;
        }
        let freed = self.storage.free(index);
        debug_assert!(freed);
        true
    }

    /// Resets the map to empty, keeping the buffer.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.buckets.clear();
        self.buckets.push(NIL_INDEX);
    }

    pub fn elements_count(&self) -> u64 {
        self.storage.elements_count()
    }

    pub fn fill_rate(&self) -> f64 {
        self.storage.fill_rate()
    }

    pub fn defragmented_bytes(&self) -> u64 {
        self.storage.defragmented_bytes()
    }

    /// Checks the storage invariants plus the chain structure: every entry
    /// reachable from exactly the bucket its stored hash selects, chain
    /// lengths summing to the element count.
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;

        let elements = self.storage.elements_count();
        let mut reachable = 0u64;
        for (bucket, &head) in self.buckets.iter().enumerate() {
            let mut cursor = head;
            let mut steps = 0u64;
            while cursor != NIL_INDEX {
                ensure!(
                    steps < elements + 1,
                    "bucket {} chain does not terminate",
                    bucket
                );
                let header = self.entry_header(cursor);
                ensure!(
                    self.bucket_of(header.key_hash()) == bucket,
                    "entry {} chained into bucket {} but hashes elsewhere",
                    cursor,
                    bucket
                );
                reachable += 1;
                steps += 1;
                cursor = header.list_next();
            }
        }
        ensure!(
            reachable == elements,
            "{} entries reachable through buckets, storage holds {}",
            reachable,
            elements
        );
        Ok(())
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn entry_header(&self, index: u32) -> EntryHeader {
        let payload = self.storage.get(index).unwrap();
        *EntryHeader::ref_from_bytes(&payload[..MAP_ENTRY_HEADER_SIZE]).unwrap()
    }

    fn set_list_next(&mut self, index: u32, next: u32) {
        let payload = self.storage.get_mut(index).unwrap();
        let header = EntryHeader::mut_from_bytes(&mut payload[..MAP_ENTRY_HEADER_SIZE]).unwrap();
        header.set_list_next(next);
    }

    fn key_of(&self, index: u32) -> &[u8] {
        let payload = self.storage.get(index).unwrap();
        let header = EntryHeader::ref_from_bytes(&payload[..MAP_ENTRY_HEADER_SIZE]).unwrap();
        &payload[MAP_ENTRY_HEADER_SIZE..MAP_ENTRY_HEADER_SIZE + header.key_size() as usize]
    }

    /// Walks a bucket chain for `key`, returning `(previous, found)` stable
    /// indices with `NIL_INDEX` standing in at either position.
    fn find_in_bucket(&self, bucket: usize, hash: u64, key: &[u8]) -> (u32, u32) {
        let mut prev = NIL_INDEX;
        let mut cursor = self.buckets[bucket];
        while cursor != NIL_INDEX {
            let header = self.entry_header(cursor);
            if header.key_hash() == hash && self.key_of(cursor) == key {
                return (prev, cursor);
            }
            prev = cursor;
            cursor = header.list_next();
        }
        (NIL_INDEX, NIL_INDEX)
    }

    /// Splices the entry for `key` out of its chain and returns its index,
    /// or `NIL_INDEX` when absent. The entry itself is left allocated.
    fn unlink_from_bucket(&mut self, bucket: usize, hash: u64, key: &[u8]) -> u32 {
        let (prev, index) = self.find_in_bucket(bucket, hash, key);
        if index == NIL_INDEX {
            return NIL_INDEX;
        }
        let next = self.entry_header(index).list_next();
        if prev == NIL_INDEX {
            self.buckets[bucket] = next;
        } else {
            self.set_list_next(prev, next);
        }
        index
    }

    /// Splices a specific index out of a bucket chain.
    fn unlink_index(&mut self, bucket: usize, index: u32) -> bool {
        let mut prev = NIL_INDEX;
        let mut cursor = self.buckets[bucket];
        while cursor != NIL_INDEX {
            let next = self.entry_header(cursor).list_next();
            if cursor == index {
                if prev == NIL_INDEX {
                    self.buckets[bucket] = next;
                } else {
                    self.set_list_next(prev, next);
                }
                return true;
            }
            prev = cursor;
            cursor = next;
        }
        false
    }

    /// Doubles the bucket table, relinking every chain in place. No storage
    /// allocation happens here, so entries do not move.
    fn grow_table(&mut self) {
        let old = std::mem::take(&mut self.buckets);
        self.buckets = vec![NIL_INDEX; old.len() * 2];
        for head in old {
            let mut cursor = head;
            while cursor != NIL_INDEX {
                let header = self.entry_header(cursor);
                let next = header.list_next();
                let bucket = self.bucket_of(header.key_hash());
                let new_head = self.buckets[bucket];
                self.set_list_next(cursor, new_head);
                self.buckets[bucket] = cursor;
                cursor = next;
            }
        }
    }
}
