//! Ledger store - clicks, conversions and withdrawal requests.
//!
//! All three collections are append-only apart from the single `pending -> paid`
//! transition of a withdrawal. Every function is generic over [`ConnectionTrait`] so it
//! can run on a plain connection or inside a transaction opened by the service.
//! Lists are returned in insertion order.

use crate::{
    core::commission::commission,
    entities::{
        Click, Conversion, ConversionStatus, Withdrawal, WithdrawalStatus, click, conversion,
        withdrawal,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};
use uuid::Uuid;

/// Generates a fresh record id such as `conv-3f2b...`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Data for a conversion about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversion {
    /// Unique conversion id
    pub id: String,
    /// Order that produced the conversion
    pub order_id: String,
    /// Referring affiliate id
    pub affiliate_id: String,
    /// Referring affiliate name
    pub affiliate_name: String,
    /// Buyer id
    pub converted_user_id: String,
    /// Buyer name
    pub converted_user_name: String,
    /// Buyer email
    pub converted_user_email: String,
    /// Plan purchased
    pub plan: String,
    /// Order value
    pub order_value: f64,
    /// Commission, must equal `commission(order_value)`
    pub commission: f64,
    /// Initial status
    pub status: ConversionStatus,
    /// Conversion time
    pub conversion_date: DateTime<Utc>,
}

/// Data for a withdrawal request about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawal {
    /// Unique withdrawal id
    pub id: String,
    /// Requesting affiliate id
    pub affiliate_id: String,
    /// Requesting affiliate name
    pub affiliate_name: String,
    /// Requesting affiliate email
    pub affiliate_email: String,
    /// Amount requested, must be positive
    pub amount: f64,
    /// Request time
    pub request_date: DateTime<Utc>,
}

/// Appends a click for `affiliate_id` with a fresh id and the current time.
pub async fn record_click<C>(db: &C, affiliate_id: &str) -> Result<click::Model>
where
    C: ConnectionTrait,
{
    let model = click::ActiveModel {
        id: Set(new_id("click")),
        affiliate_id: Set(affiliate_id.to_string()),
        timestamp: Set(Utc::now()),
        ..Default::default()
    };
    let click = model.insert(db).await?;
    debug!(click_id = %click.id, affiliate_id, "click recorded");
    Ok(click)
}

/// All clicks for an affiliate, oldest first.
pub async fn list_clicks<C>(db: &C, affiliate_id: &str) -> Result<Vec<click::Model>>
where
    C: ConnectionTrait,
{
    Click::find()
        .filter(click::Column::AffiliateId.eq(affiliate_id))
        .order_by_asc(click::Column::Seq)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Appends a conversion.
///
/// # Errors
/// * [`Error::DuplicateId`] if the id or the order id is already recorded
/// * [`Error::InputValidation`] if the commission does not match the order value
pub async fn record_conversion<C>(db: &C, new: NewConversion) -> Result<conversion::Model>
where
    C: ConnectionTrait,
{
    let expected = commission(new.order_value)?;
    if (expected - new.commission).abs() > 1e-9 {
        return Err(Error::invalid(format!(
            "commission {} does not match order value {}",
            new.commission, new.order_value
        )));
    }

    let id_taken = Conversion::find()
        .filter(conversion::Column::Id.eq(new.id.as_str()))
        .one(db)
        .await?
        .is_some();
    if id_taken {
        return Err(Error::DuplicateId {
            kind: "conversion id",
            id: new.id,
        });
    }

    if find_conversion_by_order(db, &new.order_id).await?.is_some() {
        return Err(Error::DuplicateId {
            kind: "conversion for order",
            id: new.order_id,
        });
    }

    let model = conversion::ActiveModel {
        id: Set(new.id),
        order_id: Set(new.order_id),
        affiliate_id: Set(new.affiliate_id),
        affiliate_name: Set(new.affiliate_name),
        converted_user_id: Set(new.converted_user_id),
        converted_user_name: Set(new.converted_user_name),
        converted_user_email: Set(new.converted_user_email),
        plan: Set(new.plan),
        order_value: Set(new.order_value),
        commission: Set(new.commission),
        conversion_date: Set(new.conversion_date),
        status: Set(new.status.as_str().to_string()),
        ..Default::default()
    };
    let conversion = model.insert(db).await?;
    info!(
        conversion_id = %conversion.id,
        affiliate_id = %conversion.affiliate_id,
        commission = conversion.commission,
        "conversion recorded"
    );
    Ok(conversion)
}

/// All conversions credited to an affiliate, oldest first.
pub async fn list_conversions<C>(db: &C, affiliate_id: &str) -> Result<Vec<conversion::Model>>
where
    C: ConnectionTrait,
{
    Conversion::find()
        .filter(conversion::Column::AffiliateId.eq(affiliate_id))
        .order_by_asc(conversion::Column::Seq)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every conversion in the ledger, oldest first.
pub async fn list_all_conversions<C>(db: &C) -> Result<Vec<conversion::Model>>
where
    C: ConnectionTrait,
{
    Conversion::find()
        .order_by_asc(conversion::Column::Seq)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The conversion recorded for an order, if any.
pub async fn find_conversion_by_order<C>(
    db: &C,
    order_id: &str,
) -> Result<Option<conversion::Model>>
where
    C: ConnectionTrait,
{
    Conversion::find()
        .filter(conversion::Column::OrderId.eq(order_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Appends a pending withdrawal request.
///
/// # Errors
/// * [`Error::InputValidation`] if the amount is not a positive number
/// * [`Error::DuplicateId`] if the id is already recorded
pub async fn record_withdrawal<C>(db: &C, new: NewWithdrawal) -> Result<withdrawal::Model>
where
    C: ConnectionTrait,
{
    if !new.amount.is_finite() || new.amount <= 0.0 {
        return Err(Error::invalid(format!(
            "withdrawal amount must be positive, got {}",
            new.amount
        )));
    }

    if get_withdrawal(db, &new.id).await?.is_some() {
        return Err(Error::DuplicateId {
            kind: "withdrawal id",
            id: new.id,
        });
    }

    let model = withdrawal::ActiveModel {
        id: Set(new.id),
        affiliate_id: Set(new.affiliate_id),
        affiliate_name: Set(new.affiliate_name),
        affiliate_email: Set(new.affiliate_email),
        amount: Set(new.amount),
        request_date: Set(new.request_date),
        status: Set(WithdrawalStatus::Pending.as_str().to_string()),
        paid_date: Set(None),
        ..Default::default()
    };
    let withdrawal = model.insert(db).await?;
    info!(
        withdrawal_id = %withdrawal.id,
        affiliate_id = %withdrawal.affiliate_id,
        amount = withdrawal.amount,
        "withdrawal requested"
    );
    Ok(withdrawal)
}

/// Looks up a withdrawal request by id.
pub async fn get_withdrawal<C>(db: &C, id: &str) -> Result<Option<withdrawal::Model>>
where
    C: ConnectionTrait,
{
    Withdrawal::find()
        .filter(withdrawal::Column::Id.eq(id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All withdrawal requests of an affiliate, oldest first.
pub async fn list_withdrawals<C>(db: &C, affiliate_id: &str) -> Result<Vec<withdrawal::Model>>
where
    C: ConnectionTrait,
{
    Withdrawal::find()
        .filter(withdrawal::Column::AffiliateId.eq(affiliate_id))
        .order_by_asc(withdrawal::Column::Seq)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Withdrawal requests waiting for an administrator, oldest first.
pub async fn list_pending_withdrawals<C>(db: &C) -> Result<Vec<withdrawal::Model>>
where
    C: ConnectionTrait,
{
    list_withdrawals_with_status(db, WithdrawalStatus::Pending).await
}

/// Withdrawal requests already paid out, oldest first.
pub async fn list_paid_withdrawals<C>(db: &C) -> Result<Vec<withdrawal::Model>>
where
    C: ConnectionTrait,
{
    list_withdrawals_with_status(db, WithdrawalStatus::Paid).await
}

async fn list_withdrawals_with_status<C>(
    db: &C,
    status: WithdrawalStatus,
) -> Result<Vec<withdrawal::Model>>
where
    C: ConnectionTrait,
{
    Withdrawal::find()
        .filter(withdrawal::Column::Status.eq(status.as_str()))
        .order_by_asc(withdrawal::Column::Seq)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a withdrawal request as paid and stamps `paid_date`.
///
/// The status change is a single conditional `UPDATE ... WHERE status = 'pending'`,
/// so a request is paid at most once. Calling this on an already-paid request
/// returns it unchanged.
///
/// # Errors
/// Returns [`Error::NotFound`] if no withdrawal has this id.
pub async fn mark_withdrawal_paid<C>(db: &C, id: &str) -> Result<withdrawal::Model>
where
    C: ConnectionTrait,
{
    let not_found = || Error::NotFound {
        kind: "withdrawal",
        id: id.to_string(),
    };

    get_withdrawal(db, id).await?.ok_or_else(not_found)?;

    let result = Withdrawal::update_many()
        .col_expr(
            withdrawal::Column::Status,
            Expr::value(WithdrawalStatus::Paid.as_str()),
        )
        .col_expr(withdrawal::Column::PaidDate, Expr::value(Utc::now()))
        .filter(withdrawal::Column::Id.eq(id))
        .filter(withdrawal::Column::Status.eq(WithdrawalStatus::Pending.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        debug!(withdrawal_id = id, "withdrawal already paid, nothing to do");
    } else {
        info!(withdrawal_id = id, "withdrawal marked paid");
    }

    get_withdrawal(db, id).await?.ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_clicks_are_listed_per_affiliate_in_order() -> Result<()> {
        let db = setup_test_db().await?;

        let first = record_click(&db, "aff-1").await?;
        let second = record_click(&db, "aff-1").await?;
        record_click(&db, "aff-2").await?;

        let clicks = list_clicks(&db, "aff-1").await?;
        assert_eq!(clicks, vec![first, second]);
        assert!(clicks[0].id.starts_with("click-"));
        assert_ne!(clicks[0].id, clicks[1].id);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_conversion_rejects_duplicate_id() -> Result<()> {
        let db = setup_test_db().await?;
        let conversion = new_conversion("aff-1", "order-1", 100.0);
        record_conversion(&db, conversion.clone()).await?;

        let mut same_id = conversion;
        same_id.order_id = "order-2".to_string();
        let result = record_conversion(&db, same_id).await;
        assert!(matches!(
            result,
            Err(Error::DuplicateId {
                kind: "conversion id",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_conversion_rejects_duplicate_order() -> Result<()> {
        let db = setup_test_db().await?;
        record_conversion(&db, new_conversion("aff-1", "order-1", 100.0)).await?;

        let result = record_conversion(&db, new_conversion("aff-1", "order-1", 100.0)).await;
        assert!(matches!(
            result,
            Err(Error::DuplicateId { ref id, .. }) if id == "order-1"
        ));
        assert_eq!(list_conversions(&db, "aff-1").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_conversion_rejects_wrong_commission() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let mut conversion = new_conversion("aff-1", "order-1", 100.0);
        conversion.commission = 30.0;

        let result = record_conversion(&db, conversion).await;
        assert!(matches!(result, Err(Error::InputValidation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_conversions_filters_by_affiliate() -> Result<()> {
        let db = setup_test_db().await?;
        let ours = record_conversion(&db, new_conversion("aff-1", "order-1", 100.0)).await?;
        record_conversion(&db, new_conversion("aff-2", "order-2", 40.0)).await?;

        assert_eq!(list_conversions(&db, "aff-1").await?, vec![ours]);
        assert_eq!(list_all_conversions(&db).await?.len(), 2);
        assert!(find_conversion_by_order(&db, "order-2").await?.is_some());
        assert!(find_conversion_by_order(&db, "order-3").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_withdrawal_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        for amount in [0.0, -10.0, f64::NAN] {
            let result = record_withdrawal(&db, new_withdrawal("aff-1", amount)).await;
            assert!(matches!(result, Err(Error::InputValidation { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_record_withdrawal_rejects_duplicate_id() -> Result<()> {
        let db = setup_test_db().await?;
        let withdrawal = new_withdrawal("aff-1", 60.0);
        let created = record_withdrawal(&db, withdrawal.clone()).await?;
        assert!(created.is_pending());
        assert_eq!(created.paid_date, None);

        let result = record_withdrawal(&db, withdrawal).await;
        assert!(matches!(result, Err(Error::DuplicateId { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_withdrawal_paid_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let created = record_withdrawal(&db, new_withdrawal("aff-1", 60.0)).await?;

        let paid = mark_withdrawal_paid(&db, &created.id).await?;
        assert!(paid.is_paid());
        let first_paid_date = paid.paid_date.unwrap();

        let again = mark_withdrawal_paid(&db, &created.id).await?;
        assert!(again.is_paid());
        assert_eq!(again.paid_date, Some(first_paid_date));
        assert_eq!(again, paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_withdrawal_paid_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = mark_withdrawal_paid(&db, "wd-missing").await;
        assert!(matches!(
            result,
            Err(Error::NotFound { kind: "withdrawal", ref id }) if id == "wd-missing"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_and_paid_lists() -> Result<()> {
        let db = setup_test_db().await?;
        let first = record_withdrawal(&db, new_withdrawal("aff-1", 60.0)).await?;
        let second = record_withdrawal(&db, new_withdrawal("aff-2", 75.0)).await?;
        mark_withdrawal_paid(&db, &first.id).await?;

        let pending = list_pending_withdrawals(&db).await?;
        assert_eq!(pending, vec![second]);

        let paid = list_paid_withdrawals(&db).await?;
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, first.id);

        assert_eq!(list_withdrawals(&db, "aff-1").await?.len(), 1);
        Ok(())
    }
}
