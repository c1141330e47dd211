//! Attribution store - remembers which affiliate referred a visitor.
//!
//! A visitor carries at most one referral code at a time. Setting a new one replaces
//! the old; every value expires [`ATTRIBUTION_DAYS`] days after it was set. Expiry is
//! lazy: stale values may stay in storage, but `get` never returns them.
//!
//! Two stores are provided, a database-backed one scoped by visitor id and an
//! in-memory one. The browser cookie encoding lives in the helpers at the bottom of
//! this module and is only an adapter for the same contract.

use crate::{
    entities::{Attribution, attribution},
    errors::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// How long a referral stays attributed to a visitor.
pub const ATTRIBUTION_DAYS: i64 = 30;

/// Cookie name used by the web adapter.
pub const COOKIE_NAME: &str = "affiliate_ref";

/// Single scoped referral value with expiry.
#[async_trait]
pub trait AttributionStore: Send + Sync {
    /// Stores `code` until now + 30 days, replacing any existing value.
    async fn set(&self, code: &str) -> Result<()>;

    /// Returns the stored code unless it has expired.
    async fn get(&self) -> Result<Option<String>>;

    /// Removes the stored code. Idempotent.
    async fn clear(&self) -> Result<()>;
}

fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(ATTRIBUTION_DAYS)
}

/// Attribution persisted in the `attributions` table for one visitor.
///
/// Stores for different visitors share one connection through an `Arc`.
#[derive(Debug)]
pub struct DbAttributionStore {
    db: Arc<DatabaseConnection>,
    visitor_id: String,
}

impl DbAttributionStore {
    /// Creates a store scoped to `visitor_id`.
    #[must_use]
    pub fn new(db: impl Into<Arc<DatabaseConnection>>, visitor_id: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            visitor_id: visitor_id.into(),
        }
    }

    /// Visitor this store is scoped to.
    #[must_use]
    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    /// [`AttributionStore::set`] with an explicit current time.
    ///
    /// A single `INSERT ... ON CONFLICT (visitor_id) DO UPDATE`, so concurrent
    /// sets for the same visitor never collide on the primary key.
    pub async fn set_at(&self, code: &str, now: DateTime<Utc>) -> Result<()> {
        let active_model = attribution::ActiveModel {
            visitor_id: Set(self.visitor_id.clone()),
            code: Set(code.to_string()),
            set_at: Set(now),
            expires_at: Set(expiry_from(now)),
        };
        Attribution::insert(active_model)
            .on_conflict(
                OnConflict::column(attribution::Column::VisitorId)
                    .update_columns([
                        attribution::Column::Code,
                        attribution::Column::SetAt,
                        attribution::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        debug!(visitor = %self.visitor_id, code, "attribution stored");
        Ok(())
    }

    /// [`AttributionStore::get`] with an explicit current time.
    pub async fn get_at(&self, now: DateTime<Utc>) -> Result<Option<String>> {
        let row = Attribution::find_by_id(self.visitor_id.clone())
            .one(&*self.db)
            .await?;
        Ok(row.filter(|r| r.expires_at > now).map(|r| r.code))
    }
}

#[async_trait]
impl AttributionStore for DbAttributionStore {
    async fn set(&self, code: &str) -> Result<()> {
        self.set_at(code, Utc::now()).await
    }

    async fn get(&self) -> Result<Option<String>> {
        self.get_at(Utc::now()).await
    }

    async fn clear(&self) -> Result<()> {
        Attribution::delete_by_id(self.visitor_id.clone())
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

/// Process-local attribution, used as a fake in tests.
#[derive(Debug, Default)]
pub struct MemoryAttributionStore {
    value: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl MemoryAttributionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// [`AttributionStore::set`] with an explicit current time.
    pub async fn set_at(&self, code: &str, now: DateTime<Utc>) {
        *self.value.lock().await = Some((code.to_string(), expiry_from(now)));
    }

    /// [`AttributionStore::get`] with an explicit current time.
    pub async fn get_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.value
            .lock()
            .await
            .as_ref()
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(code, _)| code.clone())
    }
}

#[async_trait]
impl AttributionStore for MemoryAttributionStore {
    async fn set(&self, code: &str) -> Result<()> {
        self.set_at(code, Utc::now()).await;
        Ok(())
    }

    async fn get(&self) -> Result<Option<String>> {
        Ok(self.get_at(Utc::now()).await)
    }

    async fn clear(&self) -> Result<()> {
        *self.value.lock().await = None;
        Ok(())
    }
}

/// `Set-Cookie` value carrying `code` until `now + 30 days`.
#[must_use]
pub fn set_cookie_header(code: &str, now: DateTime<Utc>) -> String {
    format!(
        "{COOKIE_NAME}={code}; Expires={}; Path=/",
        expiry_from(now).format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// `Set-Cookie` value that deletes the attribution cookie.
#[must_use]
pub fn clear_cookie_header() -> String {
    format!("{COOKIE_NAME}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/")
}

/// Reads the attribution code out of a `Cookie` request header.
#[must_use]
pub fn code_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
