//! Property-based tests for sequence grouping and the LRU cache
//!
//! - Grouped frame lists are ascending without duplicates
//! - The cache never exceeds its budget after an insert
//! - A value read right after insertion is the inserted one

use proptest::prelude::*;
use seqcache::core::cache_man::{CacheBudget, MIN_CACHE_BYTES};
use seqcache::core::frame_cache::{FrameCache, Weighted};
use seqcache::utils::sequences::{self, ListOptions};
use std::collections::BTreeSet;

/// Payload with an arbitrary declared weight
#[derive(Debug, Clone, PartialEq)]
struct Blob {
    id: u32,
    weight: usize,
}

impl Weighted for Blob {
    fn weight(&self) -> usize {
        self.weight
    }
}

fn arb_frames() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(0u32..100_000, 1..200)
}

fn arb_budget() -> impl Strategy<Value = CacheBudget> {
    prop_oneof![
        (1usize..32).prop_map(CacheBudget::Items),
        (MIN_CACHE_BYTES..4 * MIN_CACHE_BYTES).prop_map(CacheBudget::Bytes),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<(u8, usize, bool)>> {
    // (key, weight, read back an older key first)
    prop::collection::vec((0u8..64, 0usize..2 * MIN_CACHE_BYTES, any::<bool>()), 1..80)
}

#[test]
fn proptest_grouped_frames_ascending_unique() {
    proptest!(|(frames in arb_frames(), seed in any::<u64>())| {
        let mut names: Vec<String> = frames.iter().map(|f| format!("shot_v02.{:05}.exr", f)).collect();
        // Listing order must not matter
        let len = names.len();
        names.rotate_left((seed as usize) % len);
        names.reverse();

        let report = sequences::parse_listing(&names, &ListOptions::default());
        prop_assert!(report.errors.is_empty());
        prop_assert_eq!(report.items.len(), 1);

        let got = report.items[0].sequence().frames();
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
        let expected: Vec<i64> = frames.iter().map(|&f| i64::from(f)).collect();
        prop_assert_eq!(got, expected.as_slice());
    });
}

#[test]
fn proptest_cache_size_within_max() {
    proptest!(|(budget in arb_budget(), ops in arb_ops())| {
        let cache: FrameCache<u8, Blob> = FrameCache::new(budget);
        for (i, (key, weight, touch)) in ops.into_iter().enumerate() {
            if touch {
                let _ = cache.get(&key.wrapping_add(1));
            }
            let blob = Blob { id: i as u32, weight };
            let evicted = cache.add(key, blob.clone());
            prop_assert!(cache.size() <= cache.max());
            if !evicted.contains(&key) {
                prop_assert_eq!(cache.peek(&key), Some(blob));
            }
        }
    });
}
