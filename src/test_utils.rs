//! Shared test utilities for the affiliate ledger.
//!
//! This module provides common helper functions for setting up test databases,
//! a service wired to in-memory collaborators, and ledger records with sensible
//! defaults.

use crate::{
    core::{
        affiliate::AffiliateService,
        attribution::MemoryAttributionStore,
        commission::commission,
        identity::{Identity, MemoryDirectory, Order},
        ledger::{NewConversion, NewWithdrawal, new_id},
    },
    entities::ConversionStatus,
    errors::Result,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;

/// Base URL used for links in tests.
pub const TEST_BASE_URL: &str = "https://hosting.example.com";

/// Affiliate account present in every test directory.
pub const ANA: &str = "user-171234";
/// Customer account present in every test directory.
pub const BRUNO: &str = "user-998877";
/// Second customer account.
pub const CARLA: &str = "user-555000";

/// Service type used throughout the tests.
pub type TestService = AffiliateService<MemoryAttributionStore, MemoryDirectory>;

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds an identity whose email is derived from the name.
pub fn identity(id: &str, name: &str) -> Identity {
    Identity {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

/// Directory with Ana, Bruno and Carla.
pub fn test_directory() -> MemoryDirectory {
    [
        identity(ANA, "Ana"),
        identity(BRUNO, "Bruno"),
        identity(CARLA, "Carla"),
    ]
    .into_iter()
    .collect()
}

/// Sets up a service over a fresh in-memory database and the test directory.
pub async fn setup_service() -> Result<TestService> {
    let db = setup_test_db().await?;
    Ok(AffiliateService::new(
        db,
        MemoryAttributionStore::new(),
        test_directory(),
        TEST_BASE_URL,
    ))
}

/// An order for the "Pro" plan.
pub fn order(id: &str, buyer_id: &str, value: f64) -> Order {
    Order {
        id: id.to_string(),
        buyer_id: buyer_id.to_string(),
        plan: "Pro".to_string(),
        value,
    }
}

/// Approved conversion data with a correct commission.
///
/// # Panics
/// If `order_value` is negative.
#[allow(clippy::unwrap_used)]
pub fn new_conversion(affiliate_id: &str, order_id: &str, order_value: f64) -> NewConversion {
    NewConversion {
        id: new_id("conv"),
        order_id: order_id.to_string(),
        affiliate_id: affiliate_id.to_string(),
        affiliate_name: "Affiliate".to_string(),
        converted_user_id: "buyer".to_string(),
        converted_user_name: "Buyer".to_string(),
        converted_user_email: "buyer@example.com".to_string(),
        plan: "Pro".to_string(),
        order_value,
        commission: commission(order_value).unwrap(),
        status: ConversionStatus::Approved,
        conversion_date: Utc::now(),
    }
}

/// Pending withdrawal data for `amount`.
pub fn new_withdrawal(affiliate_id: &str, amount: f64) -> NewWithdrawal {
    NewWithdrawal {
        id: new_id("wd"),
        affiliate_id: affiliate_id.to_string(),
        affiliate_name: "Affiliate".to_string(),
        affiliate_email: "affiliate@example.com".to_string(),
        amount,
        request_date: Utc::now(),
    }
}
