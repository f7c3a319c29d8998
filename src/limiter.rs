//! Core interface for admission-control primitives.

use crate::bucket::TokenBucket;
use crate::error::RateLimitError;
use crate::hierarchy::HierarchicalTokenBucket;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can admit or deny a token debit.
///
/// Decouples consumers (the [`RateGateLayer`](crate::middleware::RateGateLayer)
/// middleware, application code holding a `dyn Limiter`) from whether the
/// quota is a single bucket or a whole chain of them.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Consume `amount` tokens, waiting for refill when `block` is set.
    async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError>;

    /// Non-blocking consume.
    fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError>;
}

#[async_trait]
impl Limiter for TokenBucket {
    async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError> {
        TokenBucket::consume(self, amount, block).await
    }

    fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError> {
        TokenBucket::try_consume(self, amount)
    }
}

#[async_trait]
impl Limiter for HierarchicalTokenBucket {
    async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError> {
        HierarchicalTokenBucket::consume(self, amount, block).await
    }

    fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError> {
        HierarchicalTokenBucket::try_consume(self, amount)
    }
}

/// Shared handles limit through the same underlying state.
#[async_trait]
impl<L: Limiter + ?Sized> Limiter for Arc<L> {
    async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError> {
        (**self).consume(amount, block).await
    }

    fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError> {
        (**self).try_consume(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_bucket_kinds_limit_through_the_trait() {
        let plain = TokenBucket::new(2.0, 1.0).unwrap();
        let node = HierarchicalTokenBucket::new(2.0, 1.0, None, "node").unwrap();
        let limiters: Vec<Box<dyn Limiter>> = vec![Box::new(plain), Box::new(node)];

        for limiter in &limiters {
            assert!(limiter.consume(2.0, false).await.unwrap());
            assert!(!limiter.try_consume(1.0).unwrap());
        }
    }
}
