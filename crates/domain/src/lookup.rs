//! Outcomes of single-item reads.
//!
//! Reads never fail from the caller's point of view. When a collaborator cannot
//! be reached, the read answers `Degraded` with a placeholder instead of
//! `Missing`, so business logic never mistakes an outage for absent data.

use crate::rental::Rental;

/// Result of looking up a single record by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The collaborator returned the record.
    Found(T),
    /// The collaborator could not be read; the value is a placeholder.
    Degraded(T),
    /// The collaborator answered that no such record exists.
    Missing,
}

impl<T> Lookup<T> {
    /// Returns the record, placeholder or not.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) | Lookup::Degraded(value) => Some(value),
            Lookup::Missing => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Lookup::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Degraded(value) => Lookup::Degraded(f(value)),
            Lookup::Missing => Lookup::Missing,
        }
    }
}

/// Result of looking up a rental on behalf of an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentalLookup {
    Found(Rental),
    /// The ledger could not be read. Ownership is unverified.
    Degraded(Rental),
    Missing,
    /// The rental exists but belongs to someone else.
    Forbidden,
}
