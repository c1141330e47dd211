//! Administrative command surface.
//!
//! Commands are parsed from plain words (as typed on the command line) and executed
//! against an [`AffiliateService`]. Every command returns the text to show; the
//! binary only prints it.

use crate::{
    core::{
        affiliate::AffiliateService, attribution::AttributionStore, commission::format_brl,
        identity::IdentityDirectory,
    },
    entities::{conversion, withdrawal},
    errors::{Error, Result},
};

/// An administrative action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// List withdrawal requests waiting to be paid
    PendingWithdrawals,
    /// List every conversion
    Conversions,
    /// Mark a withdrawal request as paid
    PayWithdrawal(String),
    /// Show an affiliate's available balance
    Balance(String),
    /// Show an affiliate's dashboard figures
    Stats(String),
    /// Show an affiliate's referral link
    Link(String),
    /// Show program-wide figures
    Summary,
    /// Show usage
    Help,
}

const HELP_TEXT: &str = "Affiliate ledger administration\n\
    \n\
    Commands\n\
    • pending-withdrawals        - Lists withdrawal requests waiting to be paid.\n\
    • conversions                - Lists every recorded conversion.\n\
    • pay-withdrawal <id>        - Marks a withdrawal request as paid.\n\
    • balance <affiliate-id>     - Shows the affiliate's available balance.\n\
    • stats <affiliate-id>       - Shows the affiliate's dashboard figures.\n\
    • link <affiliate-id>        - Shows the affiliate's referral link.\n\
    • summary                    - Shows program-wide totals.\n\
    • help                       - Shows this help message.";

impl AdminCommand {
    /// Parses a command from its words, e.g. `["pay-withdrawal", "wd-1"]`.
    /// No words at all means [`AdminCommand::Help`].
    ///
    /// # Errors
    /// Returns [`Error::InputValidation`] for an unknown command or a missing argument.
    pub fn parse<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let mut words = words.iter().map(AsRef::<str>::as_ref);
        let Some(name) = words.next() else {
            return Ok(Self::Help);
        };
        let mut argument = |what: &str| {
            words
                .next()
                .map(str::to_string)
                .ok_or_else(|| Error::invalid(format!("{name} needs {what}")))
        };

        match name {
            "pending-withdrawals" => Ok(Self::PendingWithdrawals),
            "conversions" => Ok(Self::Conversions),
            "pay-withdrawal" => Ok(Self::PayWithdrawal(argument("a withdrawal id")?)),
            "balance" => Ok(Self::Balance(argument("an affiliate id")?)),
            "stats" => Ok(Self::Stats(argument("an affiliate id")?)),
            "link" => Ok(Self::Link(argument("an affiliate id")?)),
            "summary" => Ok(Self::Summary),
            "help" | "--help" | "-h" => Ok(Self::Help),
            other => Err(Error::invalid(format!(
                "unknown command '{other}', try 'help'"
            ))),
        }
    }

    /// Runs the command and returns the text to display.
    pub async fn execute<A, D>(&self, service: &AffiliateService<A, D>) -> Result<String>
    where
        A: AttributionStore,
        D: IdentityDirectory,
    {
        match self {
            Self::PendingWithdrawals => {
                let pending = service.list_pending_withdrawals().await?;
                if pending.is_empty() {
                    return Ok("No pending withdrawals.".to_string());
                }
                Ok(render_lines(&pending, render_withdrawal))
            }
            Self::Conversions => {
                let conversions = service.list_conversions().await?;
                if conversions.is_empty() {
                    return Ok("No conversions recorded yet.".to_string());
                }
                Ok(render_lines(&conversions, render_conversion))
            }
            Self::PayWithdrawal(id) => {
                let paid = service.pay_withdrawal(id).await?;
                Ok(format!("Paid: {}", render_withdrawal(&paid)))
            }
            Self::Balance(affiliate_id) => {
                let balance = service.available_balance(affiliate_id).await?;
                Ok(format!("{affiliate_id}: {} available", format_brl(balance)))
            }
            Self::Stats(affiliate_id) => {
                let stats = service.affiliate_stats(affiliate_id).await?;
                Ok(format!(
                    "Code: {}\nLink: {}\nClicks: {}\nConversions: {}\nAvailable: {}\nPending commissions: {}\nWithdrawal pending: {}\nCan withdraw: {}",
                    stats.code,
                    stats.link,
                    stats.total_clicks,
                    stats.conversions,
                    format_brl(stats.available_balance),
                    format_brl(stats.pending_commissions),
                    yes_no(stats.has_pending_withdrawal),
                    yes_no(stats.can_withdraw),
                ))
            }
            Self::Link(affiliate_id) => service.affiliate_link(affiliate_id).await,
            Self::Summary => {
                let summary = service.admin_summary().await?;
                Ok(format!(
                    "Conversions: {}\nCommissions credited: {}\nPending withdrawals: {} ({})\nPaid out: {}",
                    summary.total_conversions,
                    format_brl(summary.total_commissions),
                    summary.pending_withdrawals,
                    format_brl(summary.pending_amount),
                    format_brl(summary.paid_amount),
                ))
            }
            Self::Help => Ok(HELP_TEXT.to_string()),
        }
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn render_lines<T>(items: &[T], render: fn(&T) -> String) -> String {
    items
        .iter()
        .map(|item| format!("• {}", render(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_withdrawal(w: &withdrawal::Model) -> String {
    let requested = w.request_date.format("%d/%m/%Y");
    match w.paid_date {
        Some(paid) => format!(
            "{} | {} <{}> | {} | requested {requested} | paid {}",
            w.id,
            w.affiliate_name,
            w.affiliate_email,
            format_brl(w.amount),
            paid.format("%d/%m/%Y"),
        ),
        None => format!(
            "{} | {} <{}> | {} | requested {requested} | {}",
            w.id,
            w.affiliate_name,
            w.affiliate_email,
            format_brl(w.amount),
            w.status,
        ),
    }
}

fn render_conversion(c: &conversion::Model) -> String {
    format!(
        "{} | {} -> {} <{}> | {} | order {} | commission {} | {} | {}",
        c.conversion_date.format("%d/%m/%Y"),
        c.affiliate_name,
        c.converted_user_name,
        c.converted_user_email,
        c.plan,
        format_brl(c.order_value),
        format_brl(c.commission),
        c.order_id,
        c.status,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{ledger, referral::referral_code};
    use crate::test_utils::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(AdminCommand::parse::<&str>(&[]).unwrap(), AdminCommand::Help);
        assert_eq!(
            AdminCommand::parse(&["pending-withdrawals"]).unwrap(),
            AdminCommand::PendingWithdrawals
        );
        assert_eq!(
            AdminCommand::parse(&["pay-withdrawal", "wd-1"]).unwrap(),
            AdminCommand::PayWithdrawal("wd-1".to_string())
        );
        assert_eq!(
            AdminCommand::parse(&["stats".to_string(), ANA.to_string()]).unwrap(),
            AdminCommand::Stats(ANA.to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            AdminCommand::parse(&["pay-withdrawal"]),
            Err(Error::InputValidation { .. })
        ));
        assert!(matches!(
            AdminCommand::parse(&["refund", "wd-1"]),
            Err(Error::InputValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_withdrawals_and_pay() -> Result<()> {
        let service = setup_service().await?;
        let empty = AdminCommand::PendingWithdrawals.execute(&service).await?;
        assert_eq!(empty, "No pending withdrawals.");

        let request = ledger::record_withdrawal(service.db(), new_withdrawal(ANA, 60.0)).await?;
        let listed = AdminCommand::PendingWithdrawals.execute(&service).await?;
        assert!(listed.contains(&request.id));
        assert!(listed.contains("R$ 60,00"));

        let paid = AdminCommand::PayWithdrawal(request.id.clone())
            .execute(&service)
            .await?;
        assert!(paid.starts_with("Paid: "));
        assert!(paid.contains("paid "));

        let listed_lines: Vec<&str> = listed.lines().collect();
        assert_eq!(listed_lines.len(), 1);
        assert!(listed_lines[0].starts_with("• "));

        let missing = AdminCommand::PayWithdrawal("wd-missing".to_string())
            .execute(&service)
            .await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_conversions_balance_and_summary() -> Result<()> {
        let service = setup_service().await?;
        service.attribute_visit(&referral_code(ANA)).await?;
        service
            .record_purchase_conversion(&order("order-1", BRUNO, 100.0), &identity(BRUNO, "Bruno"))
            .await?;

        let conversions = AdminCommand::Conversions.execute(&service).await?;
        assert!(conversions.contains("Ana -> Bruno"));
        assert!(conversions.contains("commission R$ 25,00"));

        let balance = AdminCommand::Balance(ANA.to_string())
            .execute(&service)
            .await?;
        assert_eq!(balance, format!("{ANA}: R$ 25,00 available"));

        let summary = AdminCommand::Summary.execute(&service).await?;
        assert!(summary.contains("Conversions: 1"));
        assert!(summary.contains("Commissions credited: R$ 25,00"));

        let link = AdminCommand::Link(ANA.to_string()).execute(&service).await?;
        assert_eq!(link, "https://hosting.example.com/?ref=VHUSER-171");

        let unknown = AdminCommand::Balance("nobody".to_string())
            .execute(&service)
            .await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));

        let stats = AdminCommand::Stats(ANA.to_string()).execute(&service).await?;
        assert!(stats.contains("Clicks: 1"));
        assert!(stats.contains("Can withdraw: no"));
        Ok(())
    }
}
