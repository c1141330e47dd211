//! Conversion entity - A purchase attributed to an affiliate.
//!
//! Each conversion stores a snapshot of both parties (names and email at the time of
//! purchase), the plan bought, the `order_value` and the derived `commission`.
//! `order_id` is unique so the same order can never be converted twice.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversion database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversions")]
pub struct Model {
    /// Insertion sequence
    #[sea_orm(primary_key)]
    pub seq: i64,
    /// Public unique identifier (`conv-<uuid>`)
    #[sea_orm(unique)]
    pub id: String,
    /// Order that produced this conversion
    #[sea_orm(unique)]
    pub order_id: String,
    /// Identity of the referring affiliate
    pub affiliate_id: String,
    /// Affiliate display name at conversion time
    pub affiliate_name: String,
    /// Identity of the buyer
    pub converted_user_id: String,
    /// Buyer display name at conversion time
    pub converted_user_name: String,
    /// Buyer email at conversion time
    pub converted_user_email: String,
    /// Hosting plan purchased
    pub plan: String,
    /// Order value in BRL
    pub order_value: f64,
    /// Commission owed to the affiliate in BRL
    pub commission: f64,
    /// When the conversion was recorded
    pub conversion_date: DateTimeUtc,
    /// One of [`ConversionStatus`], stored as text
    pub status: String,
}

/// Conversions reference affiliates and buyers only by convention
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle of a conversion.
///
/// Conversions are created `Approved`. `Pending` is reserved for a moderation step
/// that does not exist yet and `Paid` for per-conversion payout tracking; nothing
/// in the crate produces either today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    /// Awaiting moderation (reserved)
    Pending,
    /// Counted towards the affiliate's balance
    Approved,
    /// Settled individually (reserved)
    Paid,
}

impl ConversionStatus {
    /// Text stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Model {
    /// Whether this conversion counts towards the available balance.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == ConversionStatus::Approved.as_str()
    }
}
