//! # Gacha Account
//!
//! The per-user root record and the invariants every committed state obeys:
//!
//! 1. `0 <= tokens <= max_tokens`, `0 <= shards <= max_shards`
//! 2. card ids unique, every `count >= 1`
//! 3. `daily_exchanges <= max_tokens_per_day`
//! 4. applied cosmetics reference owned cosmetics on held cards

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::boost::BoostMap;
use crate::collection::Collection;
use crate::config::EconomyConfig;
use crate::error::{GachaError, GachaResult};

/// Opaque user key.
pub type UserId = String;

/// One player's economy state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaAccount {
    /// Roll currency.
    pub tokens: u64,
    /// Duplicate/exchange currency.
    pub shards: u64,
    /// Rolls performed since creation or the last reset.
    pub total_pulls: u64,
    /// Tokens bought with shards on `last_exchange_date`.
    pub daily_exchanges: u32,
    /// UTC date of the last exchange.
    pub last_exchange_date: Option<NaiveDate>,
    /// Boosts bought, including expired ones not yet pruned.
    #[serde(default)]
    pub active_boosts: BoostMap,
    /// Cards and cosmetics.
    #[serde(default)]
    pub collection: Collection,
    /// When the account was created or last reset.
    pub created_at: DateTime<Utc>,
}

impl GachaAccount {
    /// A fresh account with the configured starting balances.
    #[must_use]
    pub fn new(config: &EconomyConfig, now: DateTime<Utc>) -> Self {
        Self {
            tokens: config.initial_tokens,
            shards: config.initial_shards,
            total_pulls: 0,
            daily_exchanges: 0,
            last_exchange_date: None,
            active_boosts: BoostMap::new(),
            collection: Collection::new(),
            created_at: now,
        }
    }

    /// Exchanges counted against `today`'s cap.
    ///
    /// A stale `last_exchange_date` counts as zero without rewriting the field.
    #[must_use]
    pub fn exchanges_on(&self, today: NaiveDate) -> u32 {
        if self.last_exchange_date == Some(today) {
            self.daily_exchanges
        } else {
            0
        }
    }

    /// Captures the full state for rollback.
    #[must_use]
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot(self.clone())
    }

    /// Restores the state captured by [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snapshot: &AccountSnapshot) {
        self.clone_from(&snapshot.0);
    }

    /// Verifies the account invariants.
    ///
    /// # Errors
    ///
    /// Returns `BoundsViolation` naming the first broken invariant.
    pub fn check_invariants(&self, config: &EconomyConfig) -> GachaResult<()> {
        if self.tokens > config.max_tokens {
            return Err(GachaError::BoundsViolation(format!(
                "tokens {} above cap {}",
                self.tokens, config.max_tokens
            )));
        }
        if self.shards > config.max_shards {
            return Err(GachaError::BoundsViolation(format!(
                "shards {} above cap {}",
                self.shards, config.max_shards
            )));
        }
        if self.daily_exchanges > config.max_tokens_per_day {
            return Err(GachaError::BoundsViolation(format!(
                "daily exchanges {} above cap {}",
                self.daily_exchanges, config.max_tokens_per_day
            )));
        }
        self.collection.validate()
    }
}

/// Frozen copy of an account taken before an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot(GachaAccount);

impl AccountSnapshot {
    /// The captured state.
    #[must_use]
    pub fn account(&self) -> &GachaAccount {
        &self.0
    }
}
