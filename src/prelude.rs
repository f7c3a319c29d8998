//! Convenient re-exports for common bucketflow types.
pub use crate::{
    bucket::TokenBucket,
    clock::{Clock, ManualClock, MonotonicClock},
    error::RateLimitError,
    gate::RateGate,
    hierarchy::HierarchicalTokenBucket,
    limiter::Limiter,
    middleware::{GateError, RateGateLayer, RateGateService},
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper, VirtualSleeper},
    tree::{build_hierarchy, BucketSpec},
};
