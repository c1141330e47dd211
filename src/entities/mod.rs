//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the ledger tables: clicks, conversions, withdrawal
//! requests, and the per-visitor attribution value.

pub mod attribution;
pub mod click;
pub mod conversion;
pub mod withdrawal;

// Re-export specific types to avoid conflicts
pub use attribution::{
    Column as AttributionColumn, Entity as Attribution, Model as AttributionModel,
};
pub use click::{Column as ClickColumn, Entity as Click, Model as ClickModel};
pub use conversion::{
    Column as ConversionColumn, ConversionStatus, Entity as Conversion, Model as ConversionModel,
};
pub use withdrawal::{
    Column as WithdrawalColumn, Entity as Withdrawal, Model as WithdrawalModel, WithdrawalStatus,
};
