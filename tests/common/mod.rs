#![allow(dead_code)] // each test binary uses a subset of these helpers

use bucketflow::{HierarchicalTokenBucket, ManualClock, TokenBucket, VirtualSleeper};
use std::sync::Arc;

/// Bucket driven entirely by a shared manual clock: refill happens only when
/// the test advances `clock`, and blocking waits advance it instead of
/// sleeping.
pub fn virtual_bucket(capacity: f64, fill_rate: f64, clock: &ManualClock) -> TokenBucket {
    TokenBucket::new(capacity, fill_rate)
        .unwrap()
        .with_clock(clock.clone())
        .with_sleeper(VirtualSleeper::new(clock.clone()))
}

/// Hierarchy node backed by [`virtual_bucket`].
pub fn virtual_node(
    capacity: f64,
    fill_rate: f64,
    parent: Option<Arc<HierarchicalTokenBucket>>,
    name: &str,
    clock: &ManualClock,
) -> Arc<HierarchicalTokenBucket> {
    HierarchicalTokenBucket::from_bucket(virtual_bucket(capacity, fill_rate, clock), parent, name)
}
