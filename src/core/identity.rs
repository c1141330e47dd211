//! Accounts and orders owned by the surrounding application.
//!
//! The ledger only reads identities and orders; it never writes them. The
//! [`IdentityDirectory`] trait is the seam through which it resolves account ids and
//! referral codes.

use crate::config::settings::AccountConfig;
use crate::core::referral::referral_code;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A registered account, either a customer or an affiliate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable account identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

impl From<AccountConfig> for Identity {
    fn from(account: AccountConfig) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
        }
    }
}

/// Order lifecycle as tracked by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Placed, waiting for payment
    Pending,
    /// Payment confirmed by the gateway
    Paid,
    /// Hosting provisioned
    Completed,
}

/// A hosting plan order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Order identifier, unique per purchase
    pub id: String,
    /// Account that placed the order
    pub buyer_id: String,
    /// Plan name
    pub plan: String,
    /// Order value in BRL
    pub value: f64,
}

/// Read access to the application's accounts.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Looks up an account by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>>;

    /// Resolves a referral code back to the account it was derived from.
    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Identity>>;
}

/// `HashMap`-backed directory used by the binary (seeded from settings) and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    accounts: HashMap<String, Identity>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn insert(&mut self, identity: Identity) {
        self.accounts.insert(identity.id.clone(), identity);
    }

    /// Number of known accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the directory has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<Identity> for MemoryDirectory {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut directory = Self::new();
        for identity in iter {
            directory.insert(identity);
        }
        directory
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>> {
        Ok(self.accounts.get(id).cloned())
    }

    /// Resolves a code by deriving the code of every known account.
    ///
    /// Codes keep only the first eight characters of the id, so accounts whose ids
    /// share a prefix (e.g. `user-1712...` and `user-1719...`) share one code. All
    /// of them resolve to the account with the smallest id, which is then credited
    /// for every referral made through any of their links, including purchases by
    /// the other accounts. Directories with prefix-sharing ids need a distinct code
    /// per account.
    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Identity>> {
        Ok(self
            .accounts
            .values()
            .filter(|identity| referral_code(&identity.id) == code)
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::identity;

    #[tokio::test]
    async fn test_referral_code_round_trip() -> Result<()> {
        let directory: MemoryDirectory =
            [identity("user-171234", "Ana"), identity("user-998877", "Bruno")]
                .into_iter()
                .collect();

        let code = referral_code("user-171234");
        let resolved = directory.find_by_referral_code(&code).await?.unwrap();
        assert_eq!(resolved.id, "user-171234");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_code_and_id() -> Result<()> {
        let directory: MemoryDirectory = [identity("user-171234", "Ana")].into_iter().collect();
        assert!(directory.find_by_referral_code("VHNOBODY").await?.is_none());
        assert!(directory.find_by_id("nobody").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_colliding_codes_resolve_deterministically() -> Result<()> {
        let directory: MemoryDirectory = [
            identity("user-1712-b", "Second"),
            identity("user-1712-a", "First"),
        ]
        .into_iter()
        .collect();

        let resolved = directory
            .find_by_referral_code(&referral_code("user-1712-b"))
            .await?
            .unwrap();
        assert_eq!(resolved.id, "user-1712-a");
        Ok(())
    }

    #[test]
    fn test_identity_from_account_config() {
        let account = AccountConfig {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
        };
        let identity = Identity::from(account);
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "ana@example.com");
    }
}
