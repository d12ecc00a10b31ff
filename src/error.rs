//! Error taxonomy for the wager client.
//!
//! Every variant's `Display` is the notice shown to the player, so callers
//! surface failures with `err.to_string()`.

use crate::stake::MIN_BET;
use rust_decimal::Decimal;
use thiserror::Error;

pub const GENERIC_SETTLEMENT_FAILURE: &str = "API request failed";
pub const GENERIC_ABORT_NOTICE: &str = "Something went wrong. Please try again.";

/// Stake rejected before anything is sent to the settlement authority.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Bet must be at least ₹{}.", MIN_BET)]
    BelowMinimum { stake: u64 },

    #[error("Insufficient Balance!")]
    InsufficientBalance { stake: u64, balance: Decimal },
}

/// Failure reported by, or while talking to, the settlement authority.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// Unreachable host, timeout, non-JSON body, or non-2xx status without
    /// an `error` field.
    #[error("{0}")]
    Transport(String),

    /// The authority answered with an explicit `error` field.
    #[error("{0}")]
    Rejected(String),

    /// A 2xx JSON body that does not describe a valid settlement.
    #[error("{}", GENERIC_ABORT_NOTICE)]
    Malformed(String),
}

impl SettlementError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, SettlementError::Malformed(_))
    }
}

/// Session start failed; wagering stays disabled for the lifetime of the
/// session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InitializationError {
    #[error("Could not identify user. Please restart.")]
    MissingIdentity,

    #[error("Could not load balance.")]
    Balance(#[source] SettlementError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WagerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),
}
