use thiserror::Error;

use crate::dispute::DisputeStatus;
use crate::negotiation::NegotiationState;
use crate::offer::OfferStatus;

/// Errors raised by domain invariants. Construction and every state
/// mutation goes through these checks, so a value that exists is valid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: f64 },
    #[error("{field} must be between 0 and 100, got {value}")]
    PercentageOutOfRange { field: &'static str, value: f64 },
    #[error("Confidence must be between 0.0 and 1.0, got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("Settlement bounds are inverted: min {min} > max {max}")]
    InvalidSettlementBounds { min: f64, max: f64 },
    #[error("Amount {amount} is outside settlement bounds [{min}, {max}]")]
    OfferOutOfBounds { amount: f64, min: f64, max: f64 },
    #[error("Dispute can't move from '{from}' to '{to}'")]
    InvalidDisputeTransition { from: DisputeStatus, to: DisputeStatus },
    #[error("Negotiation can't move from '{from}' to '{to}'")]
    InvalidNegotiationTransition {
        from: NegotiationState,
        to: NegotiationState,
    },
    #[error("Offer can't move from '{from}' to '{to}'")]
    InvalidOfferTransition { from: OfferStatus, to: OfferStatus },
    #[error("Round limit of {max_rounds} reached")]
    RoundLimitReached { max_rounds: u32 },
    #[error("Negotiation is already closed in state '{state}'")]
    NegotiationClosed { state: NegotiationState },
}

pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<(), DomainError> {
    if value < 0.0 || !value.is_finite() {
        return Err(DomainError::NegativeAmount { field, value });
    }
    Ok(())
}

pub(crate) fn check_percentage(field: &'static str, value: f64) -> Result<(), DomainError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(DomainError::PercentageOutOfRange { field, value });
    }
    Ok(())
}

pub(crate) fn check_confidence(value: f64) -> Result<(), DomainError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DomainError::ConfidenceOutOfRange(value));
    }
    Ok(())
}
