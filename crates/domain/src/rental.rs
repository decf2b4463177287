//! Rentals recorded by the ledger collaborator.

use std::str::FromStr;

use chrono::NaiveDate;
use common::Uid;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Textual format of calendar dates on every wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Lifecycle of a rental.
///
/// ```text
/// InProgress ──┬──► Finished
///              └──► Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    #[default]
    InProgress,
    Finished,
    Canceled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::InProgress => "IN_PROGRESS",
            RentalStatus::Finished => "FINISHED",
            RentalStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(RentalStatus::InProgress),
            "FINISHED" => Ok(RentalStatus::Finished),
            "CANCELED" => Ok(RentalStatus::Canceled),
            other => Err(DomainError::UnknownStatus {
                kind: "rental",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct RawPeriod {
    from: NaiveDate,
    to: NaiveDate,
}

/// Half-open date range `[from, to)`; `to` is always strictly after `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct RentalPeriod {
    from: NaiveDate,
    to: NaiveDate,
}

impl RentalPeriod {
    /// Creates a period, rejecting empty or inverted ranges.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, DomainError> {
        if to <= from {
            return Err(DomainError::InvalidPeriod { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parses both bounds from `YYYY-MM-DD` text.
    pub fn parse(from: &str, to: &str) -> Result<Self, DomainError> {
        let from = NaiveDate::parse_from_str(from, DATE_FORMAT)
            .map_err(|e| DomainError::InvalidDateFrom(format!("{from}: {e}")))?;
        let to = NaiveDate::parse_from_str(to, DATE_FORMAT)
            .map_err(|e| DomainError::InvalidDateTo(format!("{to}: {e}")))?;
        Self::new(from, to)
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Number of nights covered; always at least one.
    pub fn nights(&self) -> u64 {
        (self.to - self.from).num_days().unsigned_abs()
    }

    /// Total price for the period at the given nightly rate.
    pub fn price(&self, daily_rate: u64) -> Result<u64, DomainError> {
        let nights = self.nights();
        nights
            .checked_mul(daily_rate)
            .ok_or(DomainError::PriceOverflow { nights, daily_rate })
    }
}

impl TryFrom<RawPeriod> for RentalPeriod {
    type Error = DomainError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
    }
}

/// Everything needed to record a rental, before the ledger assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalProperties {
    pub owner: String,
    pub payment_uid: Uid,
    pub vehicle_uid: Uid,
    pub period: RentalPeriod,
    pub status: RentalStatus,
}

/// A rental as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub uid: Uid,
    #[serde(flatten)]
    pub properties: RentalProperties,
}

impl Rental {
    pub fn belongs_to(&self, owner: &str) -> bool {
        self.properties.owner == owner
    }

    /// Stand-in returned when the ledger cannot be read.
    ///
    /// Carries the requested id and owner; the period is a single night at the
    /// Unix epoch and both referenced ids are nil.
    pub fn placeholder(uid: Uid, owner: &str) -> Self {
        let from = NaiveDate::default();
        Self {
            uid,
            properties: RentalProperties {
                owner: owner.to_string(),
                payment_uid: Uid::nil(),
                vehicle_uid: Uid::nil(),
                period: RentalPeriod {
                    from,
                    to: from.succ_opt().unwrap_or(NaiveDate::MAX),
                },
                status: RentalStatus::default(),
            },
        }
    }
}
