//! Attribution entity - The referral code currently credited for a visitor.
//! One row per visitor; a new referral overwrites it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attribution database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attributions")]
pub struct Model {
    /// Visitor scope (browser, session or account) the attribution belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub visitor_id: String,
    /// Referral code of the crediting affiliate
    pub code: String,
    /// When the code was stored
    pub set_at: DateTimeUtc,
    /// Absolute expiry; rows past this instant are treated as absent
    pub expires_at: DateTimeUtc,
}

/// `Attribution` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
