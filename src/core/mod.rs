//! Core business logic - framework-agnostic affiliate program operations.
//!
//! Everything here is independent of how the program is exposed (web site, admin
//! CLI); callers pass identities, orders and referral codes in and get typed results
//! and [`crate::errors::Error`] values back.

/// Affiliate service: attribution, conversions, balances, payouts
pub mod affiliate;
/// Per-visitor referral attribution with expiry
pub mod attribution;
/// Checkout collaborator seam
pub mod checkout;
/// Commission rules and currency helpers
pub mod commission;
/// Accounts and orders owned by the application
pub mod identity;
/// Append-only ledger of clicks, conversions and withdrawals
pub mod ledger;
/// Referral code derivation and links
pub mod referral;
