//! Error types for bucket construction and consumption.
//!
//! Ordinary contention is never an error: a denied non-blocking consume
//! resolves to `Ok(false)`. Only invalid parameters and permanently
//! unsatisfiable requests surface here.

/// Hard failures from bucket construction or a consume call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    /// Capacity must be a positive, finite number.
    #[error("capacity must be positive and finite (got {0})")]
    InvalidCapacity(f64),
    /// Fill rate must be a positive, finite number.
    #[error("fill_rate must be positive and finite (got {0})")]
    InvalidFillRate(f64),
    /// Consume amount must be a positive, finite number.
    #[error("consume amount must be positive and finite (got {0})")]
    InvalidAmount(f64),
    /// The request exceeds a bucket's capacity and can never be admitted,
    /// no matter how long the caller waits.
    #[error("requested {requested} tokens but capacity is {capacity}; the request can never be admitted")]
    Unsatisfiable {
        /// Tokens asked for.
        requested: f64,
        /// Capacity of the limiting bucket (the smallest on the chain).
        capacity: f64,
    },
}

impl RateLimitError {
    /// Check if this error is a rejected construction or call parameter.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(
            self,
            Self::InvalidCapacity(_) | Self::InvalidFillRate(_) | Self::InvalidAmount(_)
        )
    }

    /// Check if this error is a permanently inadmissible request.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::Unsatisfiable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_value() {
        let msg = RateLimitError::InvalidCapacity(-1.0).to_string();
        assert!(msg.contains("capacity"));
        assert!(msg.contains("-1"));

        let msg = RateLimitError::Unsatisfiable { requested: 12.0, capacity: 10.0 }.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));
        assert!(msg.contains("never"));
    }

    #[test]
    fn predicates_partition_the_taxonomy() {
        let invalid = RateLimitError::InvalidAmount(0.0);
        assert!(invalid.is_invalid_parameter());
        assert!(!invalid.is_unsatisfiable());

        let unsat = RateLimitError::Unsatisfiable { requested: 5.0, capacity: 2.0 };
        assert!(unsat.is_unsatisfiable());
        assert!(!unsat.is_invalid_parameter());
    }
}
