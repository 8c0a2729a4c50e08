//! # Account Transactions
//!
//! **All-or-nothing mutation of one account**
//!
//! ```text
//! begin() ──> working_mut() ──> validate() ──> commit()
//!   │ snapshot      │ engines mutate   │ invariants     │ store.save()
//!   │               ▼                  ▼                ▼
//!   └──────────── rollback() <── any error, or drop without commit
//! ```
//!
//! The working copy is private to the transaction; the store keeps serving
//! the committed account until `commit()` succeeds.

use crate::account::{AccountSnapshot, GachaAccount};
use crate::config::EconomyConfig;
use crate::error::{GachaError, GachaResult};
use crate::store::StateStore;

/// Where a transaction is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnPhase {
    /// Snapshot taken, nothing applied.
    Started,
    /// The working copy has been handed out for mutation.
    Applied,
    /// Invariants checked on the working copy.
    Validated,
    /// Persisted.
    Committed,
    /// Working copy restored from the snapshot.
    RolledBack,
}

/// An in-flight mutation of one user's account.
pub struct Transaction<'a, S: StateStore + ?Sized> {
    store: &'a S,
    user_id: &'a str,
    snapshot: AccountSnapshot,
    working: GachaAccount,
    phase: TxnPhase,
}

impl<'a, S: StateStore + ?Sized> Transaction<'a, S> {
    /// Starts a transaction over `account`, the committed state of `user_id`.
    pub fn begin(store: &'a S, user_id: &'a str, account: GachaAccount) -> Self {
        Self {
            store,
            user_id,
            snapshot: account.snapshot(),
            working: account,
            phase: TxnPhase::Started,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> TxnPhase {
        self.phase
    }

    /// The account as of `begin()`.
    #[must_use]
    pub fn snapshot(&self) -> &GachaAccount {
        self.snapshot.account()
    }

    /// The working copy, for the engines to mutate.
    pub fn working_mut(&mut self) -> &mut GachaAccount {
        self.phase = TxnPhase::Applied;
        &mut self.working
    }

    /// Checks the account invariants on the working copy.
    ///
    /// # Errors
    ///
    /// Returns the `BoundsViolation` found. That is a defect in an engine,
    /// so it is logged at error level.
    pub fn validate(&mut self, config: &EconomyConfig) -> GachaResult<()> {
        if let Err(e) = self.working.check_invariants(config) {
            tracing::error!(user_id = self.user_id, error = %e, "account invariant violated");
            return Err(e);
        }
        self.phase = TxnPhase::Validated;
        Ok(())
    }

    /// Persists the working copy and returns it.
    ///
    /// # Errors
    ///
    /// - `Validation` if `validate()` has not passed since the last mutation
    /// - `Storage` if the store could not persist; the snapshot is restored
    pub fn commit(mut self) -> GachaResult<GachaAccount> {
        if self.phase != TxnPhase::Validated {
            return Err(GachaError::Validation(format!(
                "commit in phase {:?}",
                self.phase
            )));
        }

        if let Err(e) = self.store.save(self.user_id, &self.working) {
            tracing::warn!(user_id = self.user_id, error = %e, "commit failed, rolling back");
            self.restore();
            return Err(e);
        }

        self.phase = TxnPhase::Committed;
        Ok(self.working.clone())
    }

    /// Discards the working copy and returns the restored account.
    pub fn rollback(mut self) -> GachaAccount {
        self.restore();
        self.working.clone()
    }

    fn restore(&mut self) {
        self.working.restore(&self.snapshot);
        self.phase = TxnPhase::RolledBack;
    }
}

impl<S: StateStore + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if !matches!(self.phase, TxnPhase::Committed | TxnPhase::RolledBack) {
            tracing::debug!(user_id = self.user_id, phase = ?self.phase, "transaction dropped, rolling back");
            self.restore();
        }
    }
}
