//! Payments held by the payment collaborator.

use std::str::FromStr;

use common::Uid;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle of a payment. Payments are created `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(PaymentStatus::Paid),
            "CANCELED" => Ok(PaymentStatus::Canceled),
            other => Err(DomainError::UnknownStatus {
                kind: "payment",
                value: other.to_string(),
            }),
        }
    }
}

/// A payment taken for a rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub uid: Uid,
    pub status: PaymentStatus,
    pub price: u64,
}

impl Payment {
    /// Stand-in returned when the payment collaborator cannot be read.
    pub fn placeholder(uid: Uid) -> Self {
        Self {
            uid,
            status: PaymentStatus::default(),
            price: 0,
        }
    }
}
