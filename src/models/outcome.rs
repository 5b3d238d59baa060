use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Failure taxonomy for a fetch attempt. Closed set: anything unexpected is
/// downgraded to `Network` with a diagnostic detail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum FailureKind {
    #[sqlx(rename = "network")]
    Network,
    #[sqlx(rename = "blocked")]
    Blocked,
    #[sqlx(rename = "parse")]
    Parse,
    #[sqlx(rename = "timeout")]
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Network => "network",
            FailureKind::Blocked => "blocked",
            FailureKind::Parse => "parse",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Stock state extracted alongside the price. Absence never fails an
/// extraction; it just maps to `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Unknown,
}

impl Availability {
    /// Database representation: NULL / 1 / 0.
    pub fn to_db(self) -> Option<i64> {
        match self {
            Availability::InStock => Some(1),
            Availability::OutOfStock => Some(0),
            Availability::Unknown => None,
        }
    }

    pub fn from_db(value: Option<i64>) -> Self {
        match value {
            Some(0) => Availability::OutOfStock,
            Some(_) => Availability::InStock,
            None => Availability::Unknown,
        }
    }
}

/// The result half of a fetch outcome: either an extracted price or a typed
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FetchResult {
    Price {
        amount: Decimal,
        currency: Option<String>,
        availability: Availability,
    },
    Failure {
        kind: FailureKind,
        detail: String,
    },
}

/// Immutable record of one fetch attempt. `(product_id, attempt unix
/// timestamp)` is the idempotency key under which the store persists it
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchOutcome {
    pub product_id: String,
    pub ts: DateTime<Utc>,
    pub result: FetchResult,
}

impl FetchOutcome {
    pub fn price(
        product_id: impl Into<String>,
        ts: DateTime<Utc>,
        amount: Decimal,
        currency: Option<String>,
        availability: Availability,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            ts,
            result: FetchResult::Price {
                amount,
                currency,
                availability,
            },
        }
    }

    pub fn failure(
        product_id: impl Into<String>,
        ts: DateTime<Utc>,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            ts,
            result: FetchResult::Failure {
                kind,
                detail: detail.into(),
            },
        }
    }

    /// Attempt key: unix seconds. Two records of the same logical attempt
    /// collapse to one row.
    pub fn attempt_ts(&self) -> i64 {
        self.ts.timestamp()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, FetchResult::Price { .. })
    }
}

/// Convert a decimal amount to integer cents for storage.
pub fn amount_to_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round().to_i64()
}

/// Convert stored integer cents back to a decimal amount.
pub fn cents_to_amount(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
