//! Tower middleware that gates requests on bucket admission.
//!
//! [`RateGateLayer`] wraps a service so each request must be admitted by a
//! [`Limiter`] (a single bucket or a hierarchical chain) before reaching
//! the inner service. Admission blocks; the request is delayed, not dropped,
//! and only configuration errors surface as failures.

use crate::error::RateLimitError;
use crate::limiter::Limiter;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that gates requests on a shared [`Limiter`].
#[derive(Debug)]
pub struct RateGateLayer<L> {
    limiter: Arc<L>,
    cost: f64,
}

impl<L> RateGateLayer<L> {
    /// Gate on `limiter`, charging 1 token per request.
    pub fn new(limiter: L) -> Self {
        Self { limiter: Arc::new(limiter), cost: 1.0 }
    }

    /// Charge a different amount per request.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

impl<L> Clone for RateGateLayer<L> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), cost: self.cost }
    }
}

impl<S, L> Layer<S> for RateGateLayer<L>
where
    L: Limiter + 'static,
{
    type Service = RateGateService<S, L>;

    fn layer(&self, service: S) -> Self::Service {
        RateGateService { inner: service, limiter: self.limiter.clone(), cost: self.cost }
    }
}

/// Middleware service produced by [`RateGateLayer`].
#[derive(Debug)]
pub struct RateGateService<S, L> {
    inner: S,
    limiter: Arc<L>,
    cost: f64,
}

impl<S: Clone, L> Clone for RateGateService<S, L> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), limiter: self.limiter.clone(), cost: self.cost }
    }
}

/// Error surfaced by the gated service.
#[derive(Debug)]
pub enum GateError<E> {
    /// The limiter rejected the request configuration (invalid or
    /// unsatisfiable cost). Ordinary contention never produces this; the
    /// gate waits instead.
    Limit(RateLimitError),
    /// The inner service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit(e) => write!(f, "rate gate: {}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Limit(e) => Some(e),
            Self::Inner(e) => Some(e),
        }
    }
}

impl<E> GateError<E> {
    /// Check if this error came from the limiter rather than the service.
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::Limit(_))
    }

    /// Get the inner service error if this is an Inner variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<S, L, Req> Service<Req> for RateGateService<S, L>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: Limiter + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        let cost = self.cost;

        Box::pin(async move {
            match limiter.consume(cost, true).await {
                Ok(_) => inner.call(req).await.map_err(GateError::Inner),
                Err(e) => Err(GateError::Limit(e)),
            }
        })
    }
}
