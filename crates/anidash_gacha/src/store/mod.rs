//! # State Store
//!
//! Persistence behind the transaction coordinator.
//!
//! The coordinator only ever calls three things: create-if-absent, read and
//! write. Implementations must make [`StateStore::save`] all-or-nothing: on
//! error the previously committed account stays visible.
//!
//! - [`MemoryStore`]: process-local map
//! - [`JournalStore`]: append-only CRC-framed file, replayed on open

mod journal;
mod memory;

pub use journal::{JournalStore, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use memory::MemoryStore;

use crate::account::GachaAccount;
use crate::error::GachaResult;

/// Account persistence.
pub trait StateStore: Send + Sync {
    /// Returns the stored account, creating it with `fresh` on first access.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    fn load_or_create(
        &self,
        user_id: &str,
        fresh: &dyn Fn() -> GachaAccount,
    ) -> GachaResult<GachaAccount>;

    /// Returns the stored account, if any.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    fn load(&self, user_id: &str) -> GachaResult<Option<GachaAccount>>;

    /// Replaces the stored account.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write could not be made durable. The old
    /// account is still the visible one in that case.
    fn save(&self, user_id: &str, account: &GachaAccount) -> GachaResult<()>;
}
