//! Checkout collaborator - hands a paid order off to the payment gateway.
//!
//! The ledger never talks to the gateway itself. A [`CheckoutProvider`] turns a
//! [`CheckoutRequest`] into a redirect URL; if it fails, the purchase stops there and
//! no conversion is recorded.

use crate::{
    config::settings::{PaymentSettings, SiteSettings},
    core::{
        commission::round_currency,
        identity::{Identity, Order},
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use tracing::{error, info};

/// Path the gateway posts payment notifications to.
pub const WEBHOOK_PATH: &str = "/api/webhook/mercadopago";

/// Everything the gateway needs to build a checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Item title shown on the checkout page
    pub title: String,
    /// Number of units
    pub quantity: u32,
    /// Price per unit, rounded to cents
    pub unit_price: f64,
    /// ISO 4217 currency
    pub currency: String,
    /// Item description
    pub description: String,
    /// Buyer email, pre-filled on the checkout page
    pub buyer_email: String,
    /// Order id echoed back by the gateway
    pub order_id: String,
}

/// Where the gateway sends the buyer back to after checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Payment approved
    Success,
    /// Payment refused
    Failure,
    /// Payment awaiting confirmation
    Pending,
}

impl CheckoutOutcome {
    const fn path(self) -> &'static str {
        match self {
            Self::Success => "/pagamento/sucesso",
            Self::Failure => "/pagamento/erro",
            Self::Pending => "/pagamento/pendente",
        }
    }
}

/// Payment gateway able to prepare a checkout.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Prepares a checkout and returns the URL to redirect the buyer to.
    ///
    /// Implementations report failures as [`Error::Payment`].
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<String>;
}

/// Builds the checkout request for an order.
///
/// # Errors
/// Returns [`Error::InputValidation`] if the order value is negative or not finite.
pub fn checkout_request(
    order: &Order,
    buyer: &Identity,
    payment: &PaymentSettings,
) -> Result<CheckoutRequest> {
    if !order.value.is_finite() || order.value < 0.0 {
        return Err(Error::invalid(format!(
            "order {} has an invalid value {}",
            order.id, order.value
        )));
    }

    Ok(CheckoutRequest {
        title: format!("Plano {}", order.plan),
        quantity: 1,
        unit_price: round_currency(order.value),
        currency: payment.currency.clone(),
        description: format!("Hospedagem - plano {}", order.plan),
        buyer_email: buyer.email.clone(),
        order_id: order.id.clone(),
    })
}

/// Starts checkout for an order and returns the redirect URL.
///
/// # Errors
/// Propagates the provider's [`Error::Payment`]; the caller must stop the purchase
/// flow without recording a conversion.
pub async fn begin_checkout<P>(
    provider: &P,
    order: &Order,
    buyer: &Identity,
    payment: &PaymentSettings,
) -> Result<String>
where
    P: CheckoutProvider + ?Sized,
{
    let request = checkout_request(order, buyer, payment)?;
    let url = provider
        .create_checkout(&request)
        .await
        .inspect_err(|e| error!(order_id = %order.id, "checkout preparation failed: {}", e))?;
    info!(order_id = %order.id, "checkout prepared");
    Ok(url)
}

/// Return URL for a checkout outcome, carrying the order id.
#[must_use]
pub fn return_url(site: &SiteSettings, outcome: CheckoutOutcome, order_id: &str) -> String {
    format!(
        "{}{}?order_id={order_id}",
        site.base_url.trim_end_matches('/'),
        outcome.path()
    )
}

/// Notification URL to configure in the gateway dashboard.
#[must_use]
pub fn webhook_url(site: &SiteSettings) -> String {
    format!("{}{WEBHOOK_PATH}", site.base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::attribution::AttributionStore;
    use crate::test_utils::*;

    struct FixedProvider;

    #[async_trait]
    impl CheckoutProvider for FixedProvider {
        async fn create_checkout(&self, request: &CheckoutRequest) -> Result<String> {
            Ok(format!("https://pay.example.com/checkout/{}", request.order_id))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CheckoutProvider for FailingProvider {
        async fn create_checkout(&self, _request: &CheckoutRequest) -> Result<String> {
            Err(Error::Payment {
                message: "gateway returned 401".to_string(),
            })
        }
    }

    fn payment() -> PaymentSettings {
        PaymentSettings {
            access_token: "TEST-123".to_string(),
            currency: "BRL".to_string(),
        }
    }

    fn site() -> SiteSettings {
        SiteSettings {
            base_url: "https://hosting.example.com/".to_string(),
        }
    }

    #[test]
    fn test_checkout_request() {
        let request =
            checkout_request(&order("order-1", BRUNO, 19.899_999), &identity(BRUNO, "Bruno"), &payment())
                .unwrap();
        assert_eq!(request.unit_price, 19.9);
        assert_eq!(request.quantity, 1);
        assert_eq!(request.currency, "BRL");
        assert_eq!(request.buyer_email, "bruno@example.com");
        assert_eq!(request.order_id, "order-1");
        assert_eq!(request.title, "Plano Pro");
    }

    #[test]
    fn test_checkout_request_rejects_negative_value() {
        let result = checkout_request(&order("order-1", BRUNO, -1.0), &identity(BRUNO, "Bruno"), &payment());
        assert!(matches!(result, Err(Error::InputValidation { .. })));
    }

    #[tokio::test]
    async fn test_begin_checkout_returns_redirect() -> Result<()> {
        let url = begin_checkout(
            &FixedProvider,
            &order("order-1", BRUNO, 29.9),
            &identity(BRUNO, "Bruno"),
            &payment(),
        )
        .await?;
        assert_eq!(url, "https://pay.example.com/checkout/order-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_checkout_records_no_conversion() -> Result<()> {
        let service = setup_service().await?;
        service.attribute_visit(&crate::core::referral::referral_code(ANA)).await?;

        let provider: &dyn CheckoutProvider = &FailingProvider;
        let result = begin_checkout(
            provider,
            &order("order-1", BRUNO, 29.9),
            &identity(BRUNO, "Bruno"),
            &payment(),
        )
        .await;
        assert!(matches!(result, Err(Error::Payment { .. })));
        assert!(service.list_conversions().await?.is_empty());
        // The visitor is still attributed for a later, successful purchase
        assert!(service.attribution().get().await?.is_some());
        Ok(())
    }

    #[test]
    fn test_return_and_webhook_urls() {
        assert_eq!(
            return_url(&site(), CheckoutOutcome::Success, "order-1"),
            "https://hosting.example.com/pagamento/sucesso?order_id=order-1"
        );
        assert_eq!(
            return_url(&site(), CheckoutOutcome::Pending, "order-1"),
            "https://hosting.example.com/pagamento/pendente?order_id=order-1"
        );
        assert_eq!(
            webhook_url(&site()),
            "https://hosting.example.com/api/webhook/mercadopago"
        );
    }
}
