//! Withdrawal entity - An affiliate's request to be paid out.
//!
//! A request starts `pending` and is moved to `paid` exactly once by an
//! administrator, which also stamps `paid_date`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Withdrawal request database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawals")]
pub struct Model {
    /// Insertion sequence
    #[sea_orm(primary_key)]
    pub seq: i64,
    /// Public unique identifier (`wd-<uuid>`)
    #[sea_orm(unique)]
    pub id: String,
    /// Identity of the requesting affiliate
    pub affiliate_id: String,
    /// Affiliate display name at request time
    pub affiliate_name: String,
    /// Affiliate email at request time, where the payout is sent
    pub affiliate_email: String,
    /// Requested amount in BRL, always positive
    pub amount: f64,
    /// When the request was made
    pub request_date: DateTimeUtc,
    /// One of [`WithdrawalStatus`], stored as text
    pub status: String,
    /// Set once when the request is paid
    pub paid_date: Option<DateTimeUtc>,
}

/// Withdrawals reference affiliates only by convention
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle of a withdrawal request: `Pending -> Paid`, with `Paid` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    /// Waiting for an administrator
    Pending,
    /// Paid out
    Paid,
}

impl WithdrawalStatus {
    /// Text stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Model {
    /// Whether the request is still waiting to be paid.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending.as_str()
    }

    /// Whether the request has been paid out.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == WithdrawalStatus::Paid.as_str()
    }
}
