use crate::ids::{ProducerId, ProductId};
use thiserror::Error;

/// Error taxonomy for the market core.
///
/// Everything except `InvariantViolation` is an expected market outcome
/// that agents recover from locally: a failed registration, a missing
/// offer or a rejected purchase drives a state transition, never a
/// crash. `InvariantViolation` is a programmer error and aborts the
/// offending agent's cycle with a loud diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("producer {0} is already registered")]
    DuplicateIdentity(ProducerId),

    #[error("no offer for product {0}")]
    NotFound(ProductId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("offer price {offered:.2} exceeds limit {limit:.2}")]
    PriceExceedsLimit { offered: f64, limit: f64 },

    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;
