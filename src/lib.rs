#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # bucketflow
//!
//! Hierarchical token-bucket rate limiting for async Rust.
//!
//! ## Features
//!
//! - **Token buckets** with lazy, timer-free refill and fractional fill rates
//! - **Blocking and non-blocking consumption**: suspend on the tokio timer or
//!   fail fast, caller's choice per call
//! - **Hierarchical quotas**: a consume at any node must be admitted by every
//!   ancestor up to the root, all-or-nothing
//! - **Declarative trees** built from a nested [`BucketSpec`]
//! - **Call gating** via [`RateGate`] and a tower [`RateGateLayer`]
//! - **Deterministic tests** through injectable [`Clock`] and [`Sleeper`]
//!
//! ## Quick Start
//!
//! ```rust
//! use bucketflow::TokenBucket;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! // 10-token burst, refilled at 2 tokens per second.
//! let bucket = TokenBucket::new(10.0, 2.0).unwrap();
//!
//! assert!(bucket.consume(5.0, false).await.unwrap());
//! // Only 5 tokens left, so a 10-token request is denied without blocking.
//! assert!(!bucket.try_consume(10.0).unwrap());
//! # });
//! ```

pub mod bucket;
pub mod clock;
pub mod error;
pub mod gate;
pub mod hierarchy;
pub mod limiter;
pub mod middleware;
pub mod prelude;
pub mod sleeper;
pub mod tree;

// Re-exports
pub use bucket::TokenBucket;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::RateLimitError;
pub use gate::RateGate;
pub use hierarchy::HierarchicalTokenBucket;
pub use limiter::Limiter;
pub use middleware::{GateError, RateGateLayer, RateGateService};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper, VirtualSleeper};
pub use tree::{build_hierarchy, BucketSpec};
