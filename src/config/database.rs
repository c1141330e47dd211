//! Database configuration module for the affiliate ledger.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.

use crate::entities::{Attribution, Click, Conversion, Withdrawal};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/affiliate_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the
/// default local `SQLite` file if it is not set.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the ledger tables (clicks, conversions, withdrawals, attributions)
/// if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut click_table = schema.create_table_from_entity(Click);
    let mut conversion_table = schema.create_table_from_entity(Conversion);
    let mut withdrawal_table = schema.create_table_from_entity(Withdrawal);
    let mut attribution_table = schema.create_table_from_entity(Attribution);
    click_table.if_not_exists();
    conversion_table.if_not_exists();
    withdrawal_table.if_not_exists();
    attribution_table.if_not_exists();

    db.execute(builder.build(&click_table)).await?;
    db.execute(builder.build(&conversion_table)).await?;
    db.execute(builder.build(&withdrawal_table)).await?;
    db.execute(builder.build(&attribution_table)).await?;

    info!("Ledger tables ensured");
    Ok(())
}
