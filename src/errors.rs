//! Unified error types and result handling for the affiliate ledger.
//!
//! Every failure the core can produce maps to exactly one variant here, so the
//! caller can translate them into user-facing messages without string matching.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file missing, unreadable, or failing validation
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Error bubbled up from the database layer
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Lookup of an unknown id
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up (e.g. "withdrawal")
        kind: &'static str,
        /// The id that did not resolve
        id: String,
    },

    /// Append with an id (or order id) that already exists
    #[error("Duplicate {kind}: {id}")]
    DuplicateId {
        /// Kind of key that collided
        kind: &'static str,
        /// The colliding value
        id: String,
    },

    /// Withdrawal requested below the minimum payout
    #[error("Insufficient balance: {available:.2} available, minimum is {minimum:.2}")]
    InsufficientBalance {
        /// Balance available at request time
        available: f64,
        /// Minimum payout amount
        minimum: f64,
    },

    /// A second withdrawal requested while one is still outstanding
    #[error("A withdrawal is already pending for affiliate {affiliate_id}")]
    WithdrawalAlreadyPending {
        /// Affiliate with the outstanding request
        affiliate_id: String,
    },

    /// Rejected input (negative order value, malformed referral code, ...)
    #[error("Invalid input: {message}")]
    InputValidation {
        /// Description of the rejected input
        message: String,
    },

    /// The checkout collaborator could not prepare a payment
    #[error("Payment preparation failed: {message}")]
    Payment {
        /// Message reported by the payment collaborator
        message: String,
    },

    /// Filesystem error while reading settings
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required environment variable missing or not unicode
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for an [`Error::InputValidation`] with the given message.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
