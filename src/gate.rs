//! Call gating: block until admitted, then proceed.
//!
//! [`RateGate`] wraps one shared [`TokenBucket`] and charges a fixed cost
//! per call. Clones share the bucket, so a gate cloned into many tasks still
//! enforces one process-wide rate for the operation it guards.

use crate::bucket::TokenBucket;
use crate::error::RateLimitError;
use std::future::Future;
use std::sync::Arc;

const DEFAULT_COST: f64 = 1.0;

/// Admission gate over a single shared bucket.
#[derive(Debug, Clone)]
pub struct RateGate {
    bucket: Arc<TokenBucket>,
    cost: f64,
}

impl RateGate {
    /// Create a gate refilling at `tokens_per_second` with bursts up to
    /// `capacity`, charging 1 token per call.
    ///
    /// `capacity` must cover the per-call cost; enforced here so
    /// [`RateGate::admit`] can never hit an unsatisfiable request later.
    pub fn new(tokens_per_second: f64, capacity: f64) -> Result<Self, RateLimitError> {
        Self::from_bucket(TokenBucket::new(capacity, tokens_per_second)?)
    }

    /// Gate an existing bucket, e.g. one with an injected clock or sleeper.
    pub fn from_bucket(bucket: TokenBucket) -> Result<Self, RateLimitError> {
        let gate = Self { bucket: Arc::new(bucket), cost: DEFAULT_COST };
        gate.validate_cost(DEFAULT_COST)?;
        Ok(gate)
    }

    /// Charge a different amount per call.
    pub fn with_cost(mut self, cost: f64) -> Result<Self, RateLimitError> {
        self.validate_cost(cost)?;
        self.cost = cost;
        Ok(self)
    }

    /// Tokens currently available in the shared bucket.
    pub fn tokens(&self) -> f64 {
        self.bucket.tokens()
    }

    /// Block until the per-call cost is admitted.
    pub async fn admit(&self) -> Result<(), RateLimitError> {
        self.bucket.consume(self.cost, true).await.map(|_| ())
    }

    /// Block until admitted, then run the wrapped operation.
    pub async fn execute<T, Fut, Op>(&self, operation: Op) -> Result<T, RateLimitError>
    where
        T: Send,
        Fut: Future<Output = T> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        self.admit().await?;
        Ok(operation().await)
    }

    fn validate_cost(&self, cost: f64) -> Result<(), RateLimitError> {
        if !(cost.is_finite() && cost > 0.0) {
            return Err(RateLimitError::InvalidAmount(cost));
        }
        if cost > self.bucket.capacity() {
            return Err(RateLimitError::Unsatisfiable {
                requested: cost,
                capacity: self.bucket.capacity(),
            });
        }
        Ok(())
    }
}
