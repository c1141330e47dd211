//! Affiliate service - attribution, conversions, balances and payouts.
//!
//! The service ties the attribution store, the ledger, the commission rules and the
//! application's identity directory together. It owns the ledger: nothing else
//! writes clicks, conversions or withdrawals.
//!
//! `record_purchase_conversion` and `request_withdrawal` are check-then-act
//! sequences. Both hold a per-affiliate lock and write inside a database transaction,
//! so concurrent callers for the same affiliate are serialized.

use crate::{
    core::{
        attribution::AttributionStore,
        commission::{MIN_WITHDRAWAL, can_withdraw, commission, round_currency},
        identity::{Identity, IdentityDirectory, Order, OrderStatus},
        ledger::{self, NewConversion, NewWithdrawal, new_id},
        referral::{referral_code, referral_link, validate_code},
    },
    entities::{ConversionStatus, click, conversion, withdrawal},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Dashboard figures for one affiliate.
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliateStats {
    /// Referral code of the affiliate
    pub code: String,
    /// Shareable referral link
    pub link: String,
    /// Number of referral visits
    pub total_clicks: usize,
    /// Number of conversions, any status
    pub conversions: usize,
    /// Approved commissions minus paid withdrawals
    pub available_balance: f64,
    /// Commissions still awaiting approval
    pub pending_commissions: f64,
    /// Whether a withdrawal request is outstanding
    pub has_pending_withdrawal: bool,
    /// Whether a new withdrawal may be requested right now
    pub can_withdraw: bool,
}

/// Program-wide figures for the administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSummary {
    /// Number of conversions recorded
    pub total_conversions: usize,
    /// Sum of all commissions ever credited
    pub total_commissions: f64,
    /// Number of withdrawal requests waiting to be paid
    pub pending_withdrawals: usize,
    /// Sum of pending withdrawal amounts
    pub pending_amount: f64,
    /// Sum of paid withdrawal amounts
    pub paid_amount: f64,
}

/// Orchestrates the affiliate program over the ledger database.
pub struct AffiliateService<A, D> {
    db: DatabaseConnection,
    attribution: A,
    directory: D,
    base_url: String,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<A, D> AffiliateService<A, D>
where
    A: AttributionStore,
    D: IdentityDirectory,
{
    /// Creates a service. `db` must already have the ledger tables
    /// (see [`crate::config::database::create_tables`]).
    pub fn new(
        db: DatabaseConnection,
        attribution: A,
        directory: D,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            attribution,
            directory,
            base_url: base_url.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The ledger database connection.
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The attribution store in use.
    pub const fn attribution(&self) -> &A {
        &self.attribution
    }

    /// Closes the ledger database connection.
    pub async fn close(self) -> Result<()> {
        self.db.close().await?;
        Ok(())
    }

    async fn lock_affiliate(&self, affiliate_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(affiliate_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn require_affiliate(&self, affiliate_id: &str) -> Result<Identity> {
        self.directory
            .find_by_id(affiliate_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "affiliate",
                id: affiliate_id.to_string(),
            })
    }

    /// Handles a landing visit carrying a referral code: stores the attribution and
    /// records a click for the affiliate the code belongs to.
    ///
    /// # Errors
    /// * [`Error::InputValidation`] for a malformed code
    /// * [`Error::NotFound`] if the code belongs to no known account; nothing is written
    #[instrument(skip(self))]
    pub async fn attribute_visit(&self, ref_code: &str) -> Result<click::Model> {
        let code = validate_code(ref_code)?;
        let affiliate = self
            .directory
            .find_by_referral_code(code)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "affiliate for referral code",
                id: code.to_string(),
            })?;

        self.attribution.set(code).await?;
        let click = ledger::record_click(&self.db, &affiliate.id).await?;
        info!(affiliate_id = %affiliate.id, code, "referral visit attributed");
        Ok(click)
    }

    /// Credits the attributed affiliate for a paid order.
    ///
    /// Returns `Ok(None)` without writing anything when there is no live attribution,
    /// the code no longer resolves, or the buyer is the affiliate. Otherwise appends an
    /// approved conversion and clears the attribution.
    ///
    /// Call this only on the order's transition to paid; see
    /// [`Self::handle_order_transition`].
    ///
    /// # Errors
    /// * [`Error::InputValidation`] for a negative order value
    /// * [`Error::DuplicateId`] if this order was already converted
    #[instrument(skip(self))]
    pub async fn record_purchase_conversion(
        &self,
        order: &Order,
        buyer: &Identity,
    ) -> Result<Option<conversion::Model>> {
        let commission = commission(order.value)?;

        let Some(code) = self.attribution.get().await? else {
            debug!(order_id = %order.id, "no attribution, nothing to convert");
            return Ok(None);
        };

        let Some(affiliate) = self.directory.find_by_referral_code(&code).await? else {
            warn!(code = %code, order_id = %order.id, "attributed code no longer resolves");
            return Ok(None);
        };

        if affiliate.id == buyer.id {
            info!(affiliate_id = %affiliate.id, order_id = %order.id, "self-referral ignored");
            return Ok(None);
        }

        let _guard = self.lock_affiliate(&affiliate.id).await;
        let txn = self.db.begin().await?;
        let conversion = ledger::record_conversion(
            &txn,
            NewConversion {
                id: new_id("conv"),
                order_id: order.id.clone(),
                affiliate_id: affiliate.id,
                affiliate_name: affiliate.name,
                converted_user_id: buyer.id.clone(),
                converted_user_name: buyer.name.clone(),
                converted_user_email: buyer.email.clone(),
                plan: order.plan.clone(),
                order_value: order.value,
                commission,
                status: ConversionStatus::Approved,
                conversion_date: Utc::now(),
            },
        )
        .await?;
        txn.commit().await?;

        self.attribution.clear().await?;
        Ok(Some(conversion))
    }

    /// Reacts to an order status change, converting only on the edge into
    /// [`OrderStatus::Paid`]. Re-reads of an already paid order do nothing.
    pub async fn handle_order_transition(
        &self,
        order: &Order,
        buyer: &Identity,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<conversion::Model>> {
        if from == OrderStatus::Paid || to != OrderStatus::Paid {
            return Ok(None);
        }
        self.record_purchase_conversion(order, buyer).await
    }

    /// Approved commissions minus paid withdrawals, floored at zero.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown affiliate.
    pub async fn available_balance(&self, affiliate_id: &str) -> Result<f64> {
        self.require_affiliate(affiliate_id).await?;
        balance_on(&self.db, affiliate_id).await
    }

    /// Requests payout of the affiliate's whole available balance.
    ///
    /// # Errors
    /// * [`Error::NotFound`] for an unknown affiliate
    /// * [`Error::InsufficientBalance`] if the balance is below the minimum
    /// * [`Error::WithdrawalAlreadyPending`] if a request is still outstanding
    #[instrument(skip(self))]
    pub async fn request_withdrawal(&self, affiliate_id: &str) -> Result<withdrawal::Model> {
        let affiliate = self.require_affiliate(affiliate_id).await?;

        let _guard = self.lock_affiliate(affiliate_id).await;
        let txn = self.db.begin().await?;

        let balance = balance_on(&txn, affiliate_id).await?;
        if !can_withdraw(balance) {
            return Err(Error::InsufficientBalance {
                available: balance,
                minimum: MIN_WITHDRAWAL,
            });
        }

        let pending = ledger::list_withdrawals(&txn, affiliate_id)
            .await?
            .iter()
            .any(withdrawal::Model::is_pending);
        if pending {
            return Err(Error::WithdrawalAlreadyPending {
                affiliate_id: affiliate_id.to_string(),
            });
        }

        let withdrawal = ledger::record_withdrawal(
            &txn,
            NewWithdrawal {
                id: new_id("wd"),
                affiliate_id: affiliate.id,
                affiliate_name: affiliate.name,
                affiliate_email: affiliate.email,
                amount: balance,
                request_date: Utc::now(),
            },
        )
        .await?;
        txn.commit().await?;
        Ok(withdrawal)
    }

    /// Marks a withdrawal request as paid. Paying twice returns the paid record.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown withdrawal id.
    #[instrument(skip(self))]
    pub async fn pay_withdrawal(&self, withdrawal_id: &str) -> Result<withdrawal::Model> {
        ledger::mark_withdrawal_paid(&self.db, withdrawal_id).await
    }

    /// Referral link of an affiliate.
    pub async fn affiliate_link(&self, affiliate_id: &str) -> Result<String> {
        let affiliate = self.require_affiliate(affiliate_id).await?;
        Ok(referral_link(&self.base_url, &referral_code(&affiliate.id)))
    }

    /// Dashboard figures for an affiliate.
    pub async fn affiliate_stats(&self, affiliate_id: &str) -> Result<AffiliateStats> {
        let affiliate = self.require_affiliate(affiliate_id).await?;
        let clicks = ledger::list_clicks(&self.db, affiliate_id).await?;
        let conversions = ledger::list_conversions(&self.db, affiliate_id).await?;
        let withdrawals = ledger::list_withdrawals(&self.db, affiliate_id).await?;

        let available_balance = compute_balance(&conversions, &withdrawals);
        let pending_commissions = round_currency(
            conversions
                .iter()
                .filter(|c| c.status == ConversionStatus::Pending.as_str())
                .map(|c| c.commission)
                .sum(),
        );
        let has_pending_withdrawal = withdrawals.iter().any(withdrawal::Model::is_pending);
        let code = referral_code(&affiliate.id);

        Ok(AffiliateStats {
            link: referral_link(&self.base_url, &code),
            code,
            total_clicks: clicks.len(),
            conversions: conversions.len(),
            available_balance,
            pending_commissions,
            has_pending_withdrawal,
            can_withdraw: can_withdraw(available_balance) && !has_pending_withdrawal,
        })
    }

    /// Conversions credited to one affiliate.
    pub async fn conversions_for(&self, affiliate_id: &str) -> Result<Vec<conversion::Model>> {
        ledger::list_conversions(&self.db, affiliate_id).await
    }

    /// Withdrawal requests of one affiliate.
    pub async fn withdrawals_for(&self, affiliate_id: &str) -> Result<Vec<withdrawal::Model>> {
        ledger::list_withdrawals(&self.db, affiliate_id).await
    }

    /// Every conversion in the program (admin view).
    pub async fn list_conversions(&self) -> Result<Vec<conversion::Model>> {
        ledger::list_all_conversions(&self.db).await
    }

    /// Withdrawal requests waiting to be paid (admin view).
    pub async fn list_pending_withdrawals(&self) -> Result<Vec<withdrawal::Model>> {
        ledger::list_pending_withdrawals(&self.db).await
    }

    /// Program-wide figures (admin view).
    pub async fn admin_summary(&self) -> Result<AdminSummary> {
        let conversions = ledger::list_all_conversions(&self.db).await?;
        let pending = ledger::list_pending_withdrawals(&self.db).await?;
        let paid = ledger::list_paid_withdrawals(&self.db).await?;

        Ok(AdminSummary {
            total_conversions: conversions.len(),
            total_commissions: round_currency(conversions.iter().map(|c| c.commission).sum()),
            pending_withdrawals: pending.len(),
            pending_amount: round_currency(pending.iter().map(|w| w.amount).sum()),
            paid_amount: round_currency(paid.iter().map(|w| w.amount).sum()),
        })
    }
}

async fn balance_on<C>(db: &C, affiliate_id: &str) -> Result<f64>
where
    C: ConnectionTrait,
{
    let conversions = ledger::list_conversions(db, affiliate_id).await?;
    let withdrawals = ledger::list_withdrawals(db, affiliate_id).await?;
    Ok(compute_balance(&conversions, &withdrawals))
}

fn compute_balance(conversions: &[conversion::Model], withdrawals: &[withdrawal::Model]) -> f64 {
    let approved: f64 = conversions
        .iter()
        .filter(|c| c.is_approved())
        .map(|c| c.commission)
        .sum();
    let paid: f64 = withdrawals
        .iter()
        .filter(|w| w.is_paid())
        .map(|w| w.amount)
        .sum();
    round_currency((approved - paid).max(0.0))
}
