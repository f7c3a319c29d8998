//! Single-node token bucket with lazy refill
//!
//! A bucket holds up to `capacity` tokens and gains `fill_rate` tokens per
//! second. There is no background timer: every operation that reads or
//! mutates the level first folds the elapsed time into it under the bucket's
//! lock, so the level is a pure function of the last recorded state and the
//! clock.
//!
//! Semantics:
//! - Buckets start full.
//! - `consume(amount, false)` refills, then either debits and returns
//!   `Ok(true)` or returns `Ok(false)` with no mutation.
//! - `consume(amount, true)` additionally waits: it computes how long the
//!   deficit takes to refill, releases the lock, sleeps at least that long,
//!   and re-checks on wake (a concurrent consumer may have drained the
//!   refill first). No upper bound on the total wait is imposed here.
//! - `amount > capacity` can never be admitted and fails with
//!   [`RateLimitError::Unsatisfiable`] instead of waiting forever.
//!
//! Invariants:
//! - `0 <= tokens <= capacity` at every observation point.
//! - Refill-then-debit is a single critical section per node; the lock is
//!   never held across a suspend.

use crate::clock::{Clock, MonotonicClock};
use crate::error::RateLimitError;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mutable bucket state: the pair every refill-then-debit rewrites.
#[derive(Debug)]
pub(crate) struct BucketState {
    pub(crate) tokens: f64,
    pub(crate) last_refill: Duration,
}

impl BucketState {
    /// Fold elapsed time into the token level.
    ///
    /// A clock reading behind `last_refill` counts as zero elapsed and leaves
    /// `last_refill` untouched, so a regressing reading can never double-pay
    /// the same interval later.
    pub(crate) fn refill(&mut self, capacity: f64, fill_rate: f64, now: Duration) {
        if let Some(elapsed) = now.checked_sub(self.last_refill) {
            self.tokens = (self.tokens + elapsed.as_secs_f64() * fill_rate).min(capacity);
            self.last_refill = now;
        }
    }
}

/// Outcome of one refill-then-check pass.
pub(crate) enum Admission {
    Granted,
    /// Not admissible now; retry after the contained wait.
    Deficit(Duration),
}

/// A token bucket rate limiter.
///
/// Replenishes tokens lazily at `fill_rate` per second, up to `capacity`.
/// Fractional values are first-class: a bucket may refill at 1.5 tokens per
/// second and requests may consume fractional amounts.
///
/// All operations take `&self`; the bucket is safe to share across tasks
/// behind an `Arc`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    fill_rate: f64,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl TokenBucket {
    /// Create a full bucket, validating both parameters.
    ///
    /// Errors if `capacity` or `fill_rate` is zero, negative, or non-finite.
    pub fn new(capacity: f64, fill_rate: f64) -> Result<Self, RateLimitError> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(RateLimitError::InvalidCapacity(capacity));
        }
        if !(fill_rate.is_finite() && fill_rate > 0.0) {
            return Err(RateLimitError::InvalidFillRate(fill_rate));
        }
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::default());
        let now = clock.now();
        Ok(Self {
            capacity,
            fill_rate,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: now }),
            clock,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        let now = self.clock.now();
        self.state.get_mut().unwrap().last_refill = now;
        self
    }

    /// Override how blocking consumers wait.
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Maximum token level.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens gained per second.
    pub fn fill_rate(&self) -> f64 {
        self.fill_rate
    }

    /// Current level, reflecting a just-performed refill.
    pub fn tokens(&self) -> f64 {
        let mut state = self.lock_state();
        self.refill_locked(&mut state);
        state.tokens
    }

    /// Non-blocking consume: debit and return `true`, or return `false` with
    /// no mutation.
    pub fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError> {
        self.validate_amount(amount)?;
        match self.admit(amount) {
            Admission::Granted => Ok(true),
            Admission::Deficit(_) => Ok(false),
        }
    }

    /// Consume `amount` tokens, waiting for refill when `block` is set.
    ///
    /// Returns the admission result; a denied non-blocking consume is
    /// `Ok(false)`, not an error. Waiters are re-checked on wake and may loop
    /// under contention; wake ordering among them is unordered.
    pub async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError> {
        self.validate_amount(amount)?;
        loop {
            match self.admit(amount) {
                Admission::Granted => return Ok(true),
                Admission::Deficit(wait) => {
                    if !block {
                        return Ok(false);
                    }
                    tracing::trace!(amount, ?wait, "token bucket: waiting for refill");
                    self.sleeper.sleep(wait).await;
                }
            }
        }
    }

    /// One refill-then-check-then-debit pass under the lock.
    fn admit(&self, amount: f64) -> Admission {
        let mut state = self.lock_state();
        self.refill_locked(&mut state);
        if state.tokens >= amount {
            state.tokens -= amount;
            Admission::Granted
        } else {
            Admission::Deficit(self.deficit_wait(state.tokens, amount))
        }
    }

    fn validate_amount(&self, amount: f64) -> Result<(), RateLimitError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(RateLimitError::InvalidAmount(amount));
        }
        if amount > self.capacity {
            return Err(RateLimitError::Unsatisfiable { requested: amount, capacity: self.capacity });
        }
        Ok(())
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn refill_locked(&self, state: &mut BucketState) {
        state.refill(self.capacity, self.fill_rate, self.clock.now());
    }

    /// Time until a deficit of `amount - tokens` refills, floored at 1µs so
    /// a rounding-level deficit still yields a nonzero sleep.
    pub(crate) fn deficit_wait(&self, tokens: f64, amount: f64) -> Duration {
        Duration::from_secs_f64((amount - tokens) / self.fill_rate).max(Duration::from_micros(1))
    }

    pub(crate) fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sleeper::VirtualSleeper;

    const TOLERANCE: f64 = 1e-9;

    fn manual_bucket(capacity: f64, fill_rate: f64) -> (TokenBucket, ManualClock) {
        let clock = ManualClock::new();
        let bucket = TokenBucket::new(capacity, fill_rate).unwrap().with_clock(clock.clone());
        (bucket, clock)
    }

    #[test]
    fn starts_full() {
        let (bucket, _clock) = manual_bucket(10.0, 2.0);
        assert!((bucket.tokens() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(TokenBucket::new(0.0, 1.0).unwrap_err(), RateLimitError::InvalidCapacity(0.0));
        assert_eq!(TokenBucket::new(-3.0, 1.0).unwrap_err(), RateLimitError::InvalidCapacity(-3.0));
        assert_eq!(TokenBucket::new(1.0, 0.0).unwrap_err(), RateLimitError::InvalidFillRate(0.0));
        assert!(TokenBucket::new(f64::NAN, 1.0).unwrap_err().is_invalid_parameter());
        assert!(TokenBucket::new(1.0, f64::INFINITY).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn rejects_invalid_amounts() {
        let (bucket, _clock) = manual_bucket(10.0, 2.0);
        assert_eq!(bucket.try_consume(0.0).unwrap_err(), RateLimitError::InvalidAmount(0.0));
        assert_eq!(bucket.try_consume(-1.0).unwrap_err(), RateLimitError::InvalidAmount(-1.0));
        assert!(bucket.try_consume(f64::NAN).unwrap_err().is_invalid_parameter());
    }

    #[tokio::test]
    async fn amount_above_capacity_is_unsatisfiable_even_when_blocking() {
        let (bucket, _clock) = manual_bucket(10.0, 2.0);
        let err = bucket.consume(10.5, true).await.unwrap_err();
        assert_eq!(err, RateLimitError::Unsatisfiable { requested: 10.5, capacity: 10.0 });
        // Nothing was debited by the failed call.
        assert!((bucket.tokens() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn refill_is_a_function_of_elapsed_time() {
        let (bucket, clock) = manual_bucket(10.0, 2.0);
        assert!(bucket.try_consume(5.0).unwrap());
        assert!((bucket.tokens() - 5.0).abs() < TOLERANCE);

        clock.advance(Duration::from_secs(1));
        assert!((bucket.tokens() - 7.0).abs() < TOLERANCE);

        // min(capacity, 7 + 6) caps at 10.
        clock.advance(Duration::from_secs(3));
        assert!((bucket.tokens() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn fractional_fill_rates_accumulate_exactly() {
        let (bucket, clock) = manual_bucket(15.0, 1.5);
        assert!(bucket.try_consume(15.0).unwrap());
        clock.advance(Duration::from_secs(3));
        assert!((bucket.tokens() - 4.5).abs() < TOLERANCE);
    }

    #[test]
    fn non_blocking_failure_has_no_side_effect() {
        let (bucket, _clock) = manual_bucket(10.0, 2.0);
        assert!(bucket.try_consume(5.0).unwrap());
        assert!(!bucket.try_consume(6.0).unwrap());
        assert!((bucket.tokens() - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn regressing_clock_counts_as_zero_elapsed() {
        let (bucket, clock) = manual_bucket(10.0, 2.0);
        clock.advance(Duration::from_secs(5));
        assert!(bucket.try_consume(8.0).unwrap());

        // Reading moves backwards: no refill, and no double payment once the
        // reading catches back up to where it was.
        clock.set(Duration::from_secs(2));
        assert!((bucket.tokens() - 2.0).abs() < TOLERANCE);
        clock.set(Duration::from_secs(5));
        assert!((bucket.tokens() - 2.0).abs() < TOLERANCE);

        clock.set(Duration::from_secs(6));
        assert!((bucket.tokens() - 4.0).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn blocking_consume_waits_exactly_the_deficit() {
        let clock = ManualClock::new();
        let bucket = TokenBucket::new(10.0, 2.0)
            .unwrap()
            .with_clock(clock.clone())
            .with_sleeper(VirtualSleeper::new(clock.clone()));

        assert!(bucket.consume(10.0, false).await.unwrap());
        // Empty bucket, 4-token request at 2/s: 2 simulated seconds.
        assert!(bucket.consume(4.0, true).await.unwrap());
        assert_eq!(clock.now(), Duration::from_secs(2));
        assert!(bucket.tokens() < TOLERANCE);
    }

    #[tokio::test]
    async fn partial_deficit_waits_only_for_the_missing_tokens() {
        let clock = ManualClock::new();
        let bucket = TokenBucket::new(10.0, 2.0)
            .unwrap()
            .with_clock(clock.clone())
            .with_sleeper(VirtualSleeper::new(clock.clone()));

        assert!(bucket.consume(7.0, false).await.unwrap());
        // 3 tokens left, 6 requested: the deficit is 3 tokens = 1.5s at 2/s.
        assert!(bucket.consume(6.0, true).await.unwrap());
        assert_eq!(clock.now(), Duration::from_millis(1500));
    }

    #[test]
    fn level_never_leaves_bounds() {
        let (bucket, clock) = manual_bucket(5.0, 3.0);
        for step in 0..50 {
            let amount = 0.7 + (step % 5) as f64;
            let _ = bucket.try_consume(amount);
            let level = bucket.tokens();
            assert!((0.0..=5.0 + TOLERANCE).contains(&level), "level {level} out of bounds");
            clock.advance(Duration::from_millis(137));
        }
    }
}
