//! Fuzz testing for the string hash map.
//!
//! Interprets arbitrary operation sequences against the map and a shadow
//! `std::collections::HashMap`, comparing every lookup and erase outcome
//! and re-validating chain and storage invariants after mutations.

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use blobkv::StringMap;

#[derive(Debug, Arbitrary)]
struct MapOpsInput {
    operations: Vec<MapOperation>,
}

#[derive(Debug, Arbitrary)]
enum MapOperation {
    Put { key: u16, size: u16, fill: u8 },
    Get { key: u16 },
    Erase { key: u16 },
    EraseIndex { key: u16 },
    Clear,
}

const BUFFER_SIZE: u64 = 200_000;

fn key_bytes(key: u16) -> Vec<u8> {
    format!("key:{}", key % 512).into_bytes()
}

fuzz_target!(|input: MapOpsInput| {
    let mut map = StringMap::new(BUFFER_SIZE).unwrap();
    let mut model: HashMap<Vec<u8>, (u32, u16, u8)> = HashMap::new();

    for operation in input.operations.into_iter().take(512) {
        match operation {
            MapOperation::Put { key, size, fill } => {
                let key = key_bytes(key);
                let size = size % 4_096;
                match map.put_uninitialized(&key, size as u64) {
                    Ok((index, value)) => {
                        value.fill(fill);
                        model.insert(key, (index, size, fill));
                    }
                    Err(_) => {
                        // The failed put erased any previous entry under the
                        // key before running out of space.
                        model.remove(&key);
                    }
                }
                map.validate().unwrap();
            }
            MapOperation::Get { key } => {
                let key = key_bytes(key);
                match (map.get(&key), model.get(&key)) {
                    (Some((index, value)), Some(&(model_index, size, fill))) => {
                        assert_eq!(index, model_index);
                        assert_eq!(value.len(), size as usize);
                        assert!(value.iter().all(|&b| b == fill), "value corrupted");
                    }
                    (None, None) => {}
                    (found, expected) => panic!(
                        "lookup disagrees with model: found={:?} expected={:?}",
                        found.map(|(index, _)| index),
                        expected
                    ),
                }
            }
            MapOperation::Erase { key } => {
                let key = key_bytes(key);
                let erased = map.erase(&key);
                assert_eq!(erased, model.remove(&key).is_some());
                map.validate().unwrap();
            }
            MapOperation::EraseIndex { key } => {
                let key = key_bytes(key);
                match model.remove(&key) {
                    Some((index, _, _)) => {
                        assert!(map.erase_index(index));
                        assert!(!map.erase_index(index));
                    }
                    None => {}
                }
                map.validate().unwrap();
            }
            MapOperation::Clear => {
                map.clear();
                model.clear();
                map.validate().unwrap();
            }
        }
        assert_eq!(map.elements_count(), model.len() as u64);
    }
});
