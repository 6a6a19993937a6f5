//! # Storage Module
//!
//! This module implements the core of blobkv: a fixed-capacity allocator for
//! variable-length values inside one contiguous, pre-allocated byte buffer.
//! After construction the buffer never grows and the system allocator is
//! touched only by the small external index table.
//!
//! ## Architecture Overview
//!
//! Free space is indexed at two levels. Every record tracks the free gap
//! trailing it through a per-rank doubly-linked ring, and a bit per rank
//! records which rings are non-empty, so best-fit selection is one
//! find-first-set away. When no single gap fits but the total free space
//! does, the allocator compacts records toward a target hole on demand.
//!
//! ## Index Stability vs Address Stability
//!
//! Records are addressed by opaque stable indices, resolved through the
//! index table on every access. Compaction moves records and rewrites their
//! table slots; the indices themselves survive. Byte slices do not: any call
//! that may allocate invalidates previously returned slices, which the
//! borrow checker enforces because those slices borrow the store.
//!
//! ## Safety Model
//!
//! Headers are overlaid on the buffer with `zerocopy`: plain byte-array
//! structs with alignment 1, so any in-bounds offset is a valid overlay and
//! no unsafe code is needed anywhere in the store.
//!
//! ## Module Organization
//!
//! - `rank`: size-to-bucket function (4 bits of magnitude, 16 sub-bins)
//! - `bitmask`: fixed-width rank availability mask with find-first-set
//! - `index_table`: stable index to header offset mapping with a free chain
//! - `header`: the 28-byte bit-packed record header
//! - `blob`: the allocator itself; occupancy list, rank rings, compaction

mod bitmask;
mod blob;
mod header;
mod index_table;
mod rank;

pub use blob::{BlobStorage, StorageError};
pub use header::{round_value_size, RecordHeader};
pub use rank::size_rank;

/// Reserved index meaning "no record"; threaded through free chains and
/// bucket chains as the end marker.
pub const NIL_INDEX: u32 = u32::MAX;
