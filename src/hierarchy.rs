//! Hierarchical token buckets: quotas that compose across nested scopes
//!
//! A [`HierarchicalTokenBucket`] is a [`TokenBucket`] with a name and an
//! optional parent. Consuming at any node must be admitted by every ancestor
//! up to the root: either every node on the chain debits the same amount, or
//! none of them are mutated. That all-or-nothing cascade is what keeps a
//! service-level burst from silently exceeding a global cap, and what rules
//! out debiting an ancestor without a matching debit at the descendant.
//!
//! Parent links are non-owning back-references fixed at construction: a
//! parent holds no collection of its children, and a cycle would require a
//! node to be its own transitive ancestor before it exists, so the chain is
//! always acyclic and finite.
//!
//! Locking protocol: a cascade collects the self→root chain, then acquires
//! every node's lock **root-first**, a fixed global order, so two cascades
//! that share ancestors contend on the shared suffix in the same order and
//! cannot deadlock. The combined hold covers refill, admission check, and
//! debit; all locks are released before a blocked consumer sleeps.
//!
//! Ancestors act as hard caps: a descendant's blocking consume can be
//! starved indefinitely by an exhausted ancestor. That is accepted
//! hierarchical semantics, not a defect.

use crate::bucket::{Admission, BucketState, TokenBucket};
use crate::error::RateLimitError;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

/// A token bucket that also requires admission from every ancestor.
///
/// Nodes are shared handles: constructors return `Arc<Self>` so a child can
/// hold its parent and callers can keep consuming handles to any node.
#[derive(Debug)]
pub struct HierarchicalTokenBucket {
    name: String,
    bucket: TokenBucket,
    parent: Option<Arc<HierarchicalTokenBucket>>,
}

impl HierarchicalTokenBucket {
    /// Create a node, validating capacity and fill rate.
    ///
    /// Pass `None` for the root; a node with no parent behaves exactly like
    /// a plain [`TokenBucket`].
    pub fn new(
        capacity: f64,
        fill_rate: f64,
        parent: Option<Arc<Self>>,
        name: impl Into<String>,
    ) -> Result<Arc<Self>, RateLimitError> {
        Ok(Self::from_bucket(TokenBucket::new(capacity, fill_rate)?, parent, name))
    }

    /// Wrap a pre-built bucket, e.g. one with an injected clock or sleeper.
    pub fn from_bucket(
        bucket: TokenBucket,
        parent: Option<Arc<Self>>,
        name: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self { name: name.into(), bucket, parent })
    }

    /// Identifier, unique within a tree built by the factory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    pub fn capacity(&self) -> f64 {
        self.bucket.capacity()
    }

    pub fn fill_rate(&self) -> f64 {
        self.bucket.fill_rate()
    }

    /// Current level of this node (ancestors are not refilled).
    pub fn tokens(&self) -> f64 {
        self.bucket.tokens()
    }

    /// Non-blocking cascade consume: debit every node on the self→root chain
    /// and return `true`, or return `false` with no node mutated.
    pub fn try_consume(&self, amount: f64) -> Result<bool, RateLimitError> {
        let chain = self.chain();
        Self::validate_chain(&chain, amount)?;
        match Self::admit_chain(&chain, amount) {
            Admission::Granted => Ok(true),
            Admission::Deficit(_) => Ok(false),
        }
    }

    /// Cascade consume, waiting for every level when `block` is set.
    ///
    /// The wait between attempts is the longest per-node deficit along the
    /// chain; the whole chain is re-checked on wake, since a sibling cascade
    /// may have drained a shared ancestor first.
    pub async fn consume(&self, amount: f64, block: bool) -> Result<bool, RateLimitError> {
        let chain = self.chain();
        Self::validate_chain(&chain, amount)?;
        loop {
            match Self::admit_chain(&chain, amount) {
                Admission::Granted => {
                    tracing::debug!(bucket = %self.name, amount, depth = chain.len(), "cascade: admitted");
                    return Ok(true);
                }
                Admission::Deficit(wait) => {
                    if !block {
                        return Ok(false);
                    }
                    tracing::trace!(bucket = %self.name, amount, ?wait, "cascade: waiting for refill");
                    self.bucket.sleeper().sleep(wait).await;
                }
            }
        }
    }

    /// The chain of nodes from `self` to the root, in that order.
    fn chain(&self) -> Vec<&HierarchicalTokenBucket> {
        let mut chain = vec![self];
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            chain.push(parent);
            node = parent;
        }
        chain
    }

    fn validate_chain(chain: &[&Self], amount: f64) -> Result<(), RateLimitError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(RateLimitError::InvalidAmount(amount));
        }
        // The smallest capacity on the chain is the binding one.
        for node in chain {
            if amount > node.bucket.capacity() {
                return Err(RateLimitError::Unsatisfiable {
                    requested: amount,
                    capacity: node.bucket.capacity(),
                });
            }
        }
        Ok(())
    }

    /// One atomic admission pass over the whole chain.
    ///
    /// Locks are acquired root-first (fixed global order; the semantic walk
    /// stays self→root) and held across refill, check, and debit, so no
    /// partial debit is ever observable.
    fn admit_chain(chain: &[&Self], amount: f64) -> Admission {
        let mut guards: Vec<MutexGuard<'_, BucketState>> = Vec::with_capacity(chain.len());
        for node in chain.iter().rev() {
            let mut guard = node.bucket.lock_state();
            node.bucket.refill_locked(&mut guard);
            guards.push(guard);
        }

        let mut all_admit = true;
        let mut wait = Duration::ZERO;
        for (node, guard) in chain.iter().rev().zip(guards.iter()) {
            if guard.tokens < amount {
                all_admit = false;
                wait = wait.max(node.bucket.deficit_wait(guard.tokens, amount));
            }
        }

        if all_admit {
            for guard in &mut guards {
                guard.tokens -= amount;
            }
            Admission::Granted
        } else {
            Admission::Deficit(wait)
        }
    }
}
