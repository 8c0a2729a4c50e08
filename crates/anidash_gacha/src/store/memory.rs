//! In-memory account map.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::StateStore;
use crate::account::{GachaAccount, UserId};
use crate::error::GachaResult;

/// Accounts held in a process-local map. Reads hand out clones.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<UserId, GachaAccount>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether no account exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load_or_create(
        &self,
        user_id: &str,
        fresh: &dyn Fn() -> GachaAccount,
    ) -> GachaResult<GachaAccount> {
        if let Some(account) = self.accounts.read().get(user_id) {
            return Ok(account.clone());
        }

        let mut accounts = self.accounts.write();
        let account = accounts.entry(user_id.to_string()).or_insert_with(|| {
            tracing::debug!(user_id, "account created");
            fresh()
        });
        Ok(account.clone())
    }

    fn load(&self, user_id: &str) -> GachaResult<Option<GachaAccount>> {
        Ok(self.accounts.read().get(user_id).cloned())
    }

    fn save(&self, user_id: &str, account: &GachaAccount) -> GachaResult<()> {
        self.accounts
            .write()
            .insert(user_id.to_string(), account.clone());
        Ok(())
    }
}
