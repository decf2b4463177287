//! Domain error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The rental period does not end strictly after it starts.
    #[error("invalid rental period: [{from}, {to}]")]
    InvalidPeriod { from: NaiveDate, to: NaiveDate },

    /// The period start is not a calendar date.
    #[error("invalid period start date: {0}")]
    InvalidDateFrom(String),

    /// The period end is not a calendar date.
    #[error("invalid period end date: {0}")]
    InvalidDateTo(String),

    /// The total price does not fit the price range.
    #[error("rental price overflows: {nights} nights at {daily_rate} per night")]
    PriceOverflow { nights: u64, daily_rate: u64 },

    /// A status string is not one of the known values.
    #[error("unknown {kind} status: {value}")]
    UnknownStatus { kind: &'static str, value: String },
}
