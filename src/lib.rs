//! # blobkv - Fixed-Capacity In-Memory String Store
//!
//! blobkv keeps variable-length string values inside a single pre-allocated
//! contiguous buffer, addressed by stable 32-bit indices or by string key.
//! This implementation prioritizes:
//!
//! - **Zero heap traffic after construction**: records, free-list anchors,
//!   and hash-chain headers all live inside the one buffer
//! - **Best-fit allocation in O(1) expected time**: per-rank free-gap lists
//!   behind a find-first-set bit-mask
//! - **On-demand compaction**: when no single gap fits a request that the
//!   total free space could hold, live records slide left until one does
//!
//! ## Quick Start
//!
//! ```ignore
//! use blobkv::StringMap;
//!
//! let mut map = StringMap::new(1_000_000)?;
//!
//! map.put(b"answer", b"42")?;
//! let (index, value) = map.get(b"answer").unwrap();
//! assert_eq!(value, b"42");
//!
//! map.erase(b"answer");
//! ```
//!
//! ## Architecture
//!
//! blobkv uses a layered architecture:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │    String Hash Map (StringMap)       │
//! ├──────────────────────────────────────┤
//! │   Blob Allocator (BlobStorage)       │
//! ├──────────────┬───────────────────────┤
//! │  Index Table │  Rank Lists + Mask    │
//! ├──────────────┴───────────────────────┤
//! │  One contiguous byte buffer          │
//! └──────────────────────────────────────┘
//! ```
//!
//! The hash map stores its per-entry headers inside allocator payloads and
//! addresses entries exclusively through stable indices, so it survives the
//! allocator moving records during compaction.
//!
//! ## Slice Lifetime Contract
//!
//! Slices returned by `allocate`, `put`, and `get` point into the buffer.
//! Any call that may allocate can move records, so slices must not be
//! retained across it; the borrow checker enforces this because mutating
//! calls take `&mut self`.
//!
//! ## Module Overview
//!
//! - [`storage`]: the blob allocator, its index table, rank lists and mask
//! - [`map`]: separate-chained string hash map on top of the allocator
//! - [`config`]: buffer layout constants and their compile-time invariants

pub mod config;
pub mod map;
pub mod storage;

pub use map::StringMap;
pub use storage::{BlobStorage, StorageError, NIL_INDEX};
