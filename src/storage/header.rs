//! # Record Header Layout
//!
//! Every record in the buffer begins with a 28-byte bit-packed header
//! followed by its padded payload. The header threads the record into the
//! offset-sorted occupancy list and into the rank list of its trailing free
//! gap, and carries enough metadata for defragmentation to move the record
//! without consulting anything but the index table.
//!
//! ## Packed Layout (28 bytes)
//!
//! ```text
//! Bits     Width  Field             Description
//! -------  -----  ----------------  -----------------------------------
//! 0..38    38     left_offset       Occupancy-list left neighbor (0 = none)
//! 38..76   38     right_offset      Occupancy-list right neighbor
//!                                   (buffer size = none)
//! 76..114  38     left_in_rank      Previous record in this gap-rank ring
//! 114..152 38     right_in_rank     Next record in this gap-rank ring
//! 152..190 38     value_size        Exact payload length as requested
//! 192..224 32     own_index         Stable index owning this record
//! ```
//!
//! All link fields hold absolute byte offsets of other headers. The five
//! 38-bit fields are packed little-endian into the first 24 bytes; the
//! stable index occupies the last 4. Field access reads an 8-byte window at
//! a precomputed byte position and shifts the field into place, which works
//! because every window stays inside the 24-byte packed region.
//!
//! The struct is built from plain byte arrays so it has alignment 1 and can
//! be overlaid zero-copy at any record offset of the buffer; record offsets
//! themselves stay 4-aligned because payloads are padded to 4 bytes.

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{RECORD_HEADER_SIZE, VALUE_ALIGN};

/// Byte position of the 8-byte read window for each packed field.
const FIELD_BYTE: [usize; 5] = [0, 4, 9, 14, 16];
/// Bit shift of the field inside its read window.
const FIELD_SHIFT: [u32; 5] = [0, 6, 4, 2, 24];
const FIELD_MASK: u64 = (1 << 38) - 1;

const LEFT_OFFSET: usize = 0;
const RIGHT_OFFSET: usize = 1;
const LEFT_IN_RANK: usize = 2;
const RIGHT_IN_RANK: usize = 3;
const VALUE_SIZE: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RecordHeader {
    packed: [u8; 24],
    own_index: [u8; 4],
}

const _: () = assert!(size_of::<RecordHeader>() == RECORD_HEADER_SIZE);

impl RecordHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= RECORD_HEADER_SIZE,
            "buffer too small for RecordHeader: {} < {}",
            data.len(),
            RECORD_HEADER_SIZE
        );

        Self::ref_from_bytes(&data[..RECORD_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read RecordHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= RECORD_HEADER_SIZE,
            "buffer too small for RecordHeader: {} < {}",
            data.len(),
            RECORD_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut data[..RECORD_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read RecordHeader: {:?}", e))
    }

    #[inline]
    fn field(&self, index: usize) -> u64 {
        let start = FIELD_BYTE[index];
        let window = u64::from_le_bytes(self.packed[start..start + 8].try_into().unwrap());
        (window >> FIELD_SHIFT[index]) & FIELD_MASK
    }

    #[inline]
    fn set_field(&mut self, index: usize, value: u64) {
        debug_assert!(value <= FIELD_MASK);
        let start = FIELD_BYTE[index];
        let mut window = u64::from_le_bytes(self.packed[start..start + 8].try_into().unwrap());
        window &= !(FIELD_MASK << FIELD_SHIFT[index]);
        window |= value << FIELD_SHIFT[index];
        self.packed[start..start + 8].copy_from_slice(&window.to_le_bytes());
    }

    pub fn left_offset(&self) -> u64 {
        self.field(LEFT_OFFSET)
    }

    pub fn set_left_offset(&mut self, offset: u64) {
        self.set_field(LEFT_OFFSET, offset);
    }

    pub fn right_offset(&self) -> u64 {
        self.field(RIGHT_OFFSET)
    }

    pub fn set_right_offset(&mut self, offset: u64) {
        self.set_field(RIGHT_OFFSET, offset);
    }

    pub fn left_in_rank(&self) -> u64 {
        self.field(LEFT_IN_RANK)
    }

    pub fn set_left_in_rank(&mut self, offset: u64) {
        self.set_field(LEFT_IN_RANK, offset);
    }

    pub fn right_in_rank(&self) -> u64 {
        self.field(RIGHT_IN_RANK)
    }

    pub fn set_right_in_rank(&mut self, offset: u64) {
        self.set_field(RIGHT_IN_RANK, offset);
    }

    pub fn value_size(&self) -> u64 {
        self.field(VALUE_SIZE)
    }

    pub fn set_value_size(&mut self, size: u64) {
        self.set_field(VALUE_SIZE, size);
    }

    pub fn own_index(&self) -> u32 {
        u32::from_le_bytes(self.own_index)
    }

    pub fn set_own_index(&mut self, index: u32) {
        self.own_index = index.to_le_bytes();
    }

    /// Header plus padded payload: the number of buffer bytes this record
    /// occupies.
    pub fn full_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + round_value_size(self.value_size())
    }
}

/// Rounds a payload length up to the alignment unit so the next header
/// starts 4-aligned.
#[inline]
pub const fn round_value_size(size: u64) -> u64 {
    (size + (VALUE_ALIGN - 1)) & !(VALUE_ALIGN - 1)
}
