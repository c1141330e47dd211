//! Click entity - One referral-tagged visit.
//!
//! Clicks are append-only and never mutated or deleted. `affiliate_id` holds the
//! resolved affiliate identity, not the raw referral code.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Click database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clicks")]
pub struct Model {
    /// Insertion sequence, used to return clicks in the order they were recorded
    #[sea_orm(primary_key)]
    pub seq: i64,
    /// Public unique identifier (`click-<uuid>`)
    #[sea_orm(unique)]
    pub id: String,
    /// Identity of the affiliate whose link was followed
    pub affiliate_id: String,
    /// When the visit happened
    pub timestamp: DateTimeUtc,
}

/// Clicks reference affiliates only by convention
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
