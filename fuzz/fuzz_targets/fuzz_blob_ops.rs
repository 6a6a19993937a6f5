//! Fuzz testing for the blob allocator.
//!
//! Drives random allocate/free/clear sequences against a shadow list of
//! live records and re-validates the full structural invariants after every
//! mutation, so any bookkeeping drift aborts immediately. The `NoSpace`
//! boundary is cross-checked against independently computed occupancy.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use blobkv::config::{META_SIZE, RECORD_HEADER_SIZE};
use blobkv::storage::round_value_size;
use blobkv::BlobStorage;

#[derive(Debug, Arbitrary)]
struct BlobOpsInput {
    operations: Vec<BlobOperation>,
}

#[derive(Debug, Arbitrary)]
enum BlobOperation {
    Allocate { size: u16, fill: u8 },
    Free { slot: u8 },
    Get { slot: u8 },
    Clear,
}

const BUFFER_SIZE: u64 = 100_000;

fuzz_target!(|input: BlobOpsInput| {
    let mut storage = BlobStorage::new(BUFFER_SIZE).unwrap();
    let mut live: Vec<(u32, u64, u8)> = Vec::new();

    for operation in input.operations.into_iter().take(512) {
        match operation {
            BlobOperation::Allocate { size, fill } => {
                let full_size = RECORD_HEADER_SIZE as u64 + round_value_size(size as u64);
                let occupied = META_SIZE as u64
                    + live
                        .iter()
                        .map(|&(_, size, _)| RECORD_HEADER_SIZE as u64 + round_value_size(size))
                        .sum::<u64>();
                let fits = full_size <= BUFFER_SIZE - occupied;

                match storage.allocate(size as u64) {
                    Ok((index, value)) => {
                        assert!(fits, "allocation succeeded past capacity");
                        value.fill(fill);
                        live.push((index, size as u64, fill));
                    }
                    Err(_) => {
                        assert!(!fits, "allocation failed with space available");
                    }
                }
                storage.validate().unwrap();
            }
            BlobOperation::Free { slot } => {
                if live.is_empty() {
                    continue;
                }
                let (index, _, _) = live.swap_remove(slot as usize % live.len());
                assert!(storage.free(index));
                assert!(!storage.free(index), "double free must be rejected");
                storage.validate().unwrap();
            }
            BlobOperation::Get { slot } => {
                if live.is_empty() {
                    continue;
                }
                let (index, size, fill) = live[slot as usize % live.len()];
                let value = storage.get(index).unwrap();
                assert_eq!(value.len() as u64, size);
                assert!(value.iter().all(|&b| b == fill), "payload corrupted");
            }
            BlobOperation::Clear => {
                storage.clear();
                live.clear();
                storage.validate().unwrap();
            }
        }
        assert_eq!(storage.elements_count(), live.len() as u64);
    }
});
