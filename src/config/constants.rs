//! # Layout and Tuning Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Constants that depend
//! on each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! The following diagram shows how constants relate to each other. When
//! changing any constant, check if dependent constants need adjustment.
//!
//! ```text
//! RECORD_HEADER_SIZE (28 bytes)
//!       │
//!       ├─> META_SIZE (derived: RECORD_HEADER_SIZE * (RANK_COUNT + 2))
//!       │     One header per rank node plus the two boundary sentinels.
//!       │     The minimum legal buffer size.
//!       │
//!       └─> VALUE_ALIGN (4 bytes)
//!             Payloads are padded so the next header starts 4-aligned.
//!             The header size itself must be a multiple of this.
//!
//! OFFSET_BITS (38)
//!       │
//!       └─> MAX_BUFFER_SIZE (200 GB, must be < 2^OFFSET_BITS)
//!             Every absolute offset stored in a header, including the
//!             "one past the end" right-boundary marker, must fit.
//!
//! RANK_COUNT (640)
//!       │
//!       ├─> size_rank(MAX_BUFFER_SIZE) must be < RANK_COUNT
//!       │     (pinned by an assertion next to the rank function)
//!       │
//!       └─> RANK_MASK_WORDS (derived: RANK_COUNT / 64)
//!             The availability bit-mask is exactly ten 64-bit words.
//!
//! BUCKET_CAPACITY_FACTOR (2)
//!       │
//!       └─> The hash table doubles when elements + 1 > buckets * factor,
//!           keeping the load factor at or below 0.5. The constant has a
//!           significant effect on lookup speed.
//! ```
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{META_SIZE, RECORD_HEADER_SIZE};
//! ```

// ============================================================================
// RECORD LAYOUT CONSTANTS
// These define the in-buffer header structure used throughout the store
// ============================================================================

/// Size of the packed record header in bytes.
/// Five 38-bit fields (two occupancy links, two rank links, the value size)
/// occupy 24 bytes; the 32-bit stable index fills the remaining 4.
pub const RECORD_HEADER_SIZE: usize = 28;

/// Width in bits of every offset field packed into a record header.
/// 38 bits address buffers up to 256 GiB.
pub const OFFSET_BITS: u32 = 38;

/// Alignment unit for payloads and for the buffer size itself.
/// Every payload is padded up to this so the next header starts aligned.
pub const VALUE_ALIGN: u64 = 4;

/// Size of the hash-map entry header stored at the front of each payload:
/// 56-bit key hash, 40-bit key length, 32-bit chain link.
pub const MAP_ENTRY_HEADER_SIZE: usize = 16;

// ============================================================================
// RANK CONFIGURATION
// The free-gap index granularity; coupled to the maximum buffer size
// ============================================================================

/// Number of free-gap ranks, i.e. rank-node sentinels at the head of the
/// buffer and bits in the availability mask. Must exceed the rank of the
/// largest representable free gap; 640 covers `MAX_BUFFER_SIZE` with margin
/// and keeps the mask at exactly ten words.
pub const RANK_COUNT: usize = 640;

/// Number of 64-bit words backing the rank availability mask.
pub const RANK_MASK_WORDS: usize = RANK_COUNT / 64;

/// Largest supported buffer size in bytes. Chosen so that every absolute
/// offset, including the right-boundary marker one past the buffer end,
/// fits in an `OFFSET_BITS`-wide header field.
pub const MAX_BUFFER_SIZE: u64 = 200_000_000_000;

/// Fixed meta overhead of a store: one immovable header per rank node plus
/// the leftmost and rightmost boundary sentinels. Buffers smaller than this
/// are rejected at construction.
pub const META_SIZE: usize = RECORD_HEADER_SIZE * (RANK_COUNT + 2);

// ============================================================================
// TABLE GROWTH CONSTANTS
// ============================================================================

/// Hash-table doubling trigger: grow when `elements + 1 > buckets * factor`.
pub const BUCKET_CAPACITY_FACTOR: usize = 2;

/// Minimum slot count the index table grows to on first use. Growth is by
/// 3/2 from at least this value.
pub const INDEX_TABLE_MIN_CAPACITY: usize = 2;

const _: () = assert!(
    RECORD_HEADER_SIZE % VALUE_ALIGN as usize == 0,
    "record headers must stay aligned when payloads are padded to VALUE_ALIGN"
);

const _: () = assert!(
    RANK_COUNT % 64 == 0,
    "RANK_COUNT must fill whole mask words"
);

const _: () = assert!(
    RANK_MASK_WORDS == RANK_COUNT / 64,
    "RANK_MASK_WORDS derivation mismatch"
);

const _: () = assert!(
    MAX_BUFFER_SIZE < (1 << OFFSET_BITS),
    "offsets up to MAX_BUFFER_SIZE inclusive must fit in OFFSET_BITS"
);

const _: () = assert!(
    META_SIZE == RECORD_HEADER_SIZE * (RANK_COUNT + 2),
    "META_SIZE derivation mismatch"
);

const _: () = assert!(
    size_of::<usize>() >= 8,
    "buffer offsets are 64-bit; 32-bit targets are not supported"
);
