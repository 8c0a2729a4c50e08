//! # Gacha Engine
//!
//! **The one entry point for every economy operation**
//!
//! Mutating operations run through the same coordinator:
//!
//! ```text
//! user lock ──> load_or_create ──> snapshot ──> prune expired boosts
//!                                                      │
//!                      ┌───────────────────────────────┘
//!                      ▼
//!                engine (roll / pack / fusion / ...)
//!                      │
//!           ┌──────────┴──────────┐
//!           ▼                     ▼
//!     check invariants        error: rollback,
//!           │                 re-raise unchanged
//!           ▼
//!     store.save() ──> commit, or rollback on storage error
//! ```
//!
//! ## Thread Safety
//!
//! `GachaEngine` is `Send + Sync` and is meant to sit behind an `Arc`.
//! Operations on one user serialize on that user's lock; different users
//! run in parallel. `get_state` and `stats` take no user lock and read the
//! last committed account.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let catalog = ManifestCatalog::load("data/gacha_manifest.json", "data/cosmetics.json")?;
//! let config = EconomyConfig::load("data/economy.toml")?;
//! let engine = GachaEngine::new(config, JournalStore::open("data/accounts.gjnl")?, catalog)?;
//!
//! let result = engine.roll_random("anilist:4242")?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::account::GachaAccount;
use crate::boost::{self, BoostActivation, BoostKind};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::collection::{Card, CardDescriptor, CardId};
use crate::config::EconomyConfig;
use crate::enhance::{self, EnhancementKind};
use crate::error::{Entity, GachaError, GachaResult};
use crate::exchange::{self, ExchangeResult};
use crate::fusion::{self, FusionResult};
use crate::locks::LockTable;
use crate::pack::{self, PackResult};
use crate::roll::{self, RollResult};
use crate::store::StateStore;
use crate::transaction::Transaction;
use crate::view::{AccountView, StatsView, TokenGrant};

/// Transactional front of the gacha economy.
pub struct GachaEngine<S: StateStore, C: Catalog> {
    config: EconomyConfig,
    store: S,
    catalog: C,
    clock: Arc<dyn Clock>,
    locks: LockTable,
    rng: Mutex<ChaCha8Rng>,
}

impl<S: StateStore, C: Catalog> GachaEngine<S, C> {
    /// Creates an engine on the system clock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(config: EconomyConfig, store: S, catalog: C) -> GachaResult<Self> {
        Self::with_clock(config, store, catalog, Arc::new(SystemClock))
    }

    /// Creates an engine on an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn with_clock(
        config: EconomyConfig,
        store: S,
        catalog: C,
        clock: Arc<dyn Clock>,
    ) -> GachaResult<Self> {
        config.validate()?;

        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        tracing::info!(
            seeded = config.rng_seed.is_some(),
            max_tokens = config.max_tokens,
            max_shards = config.max_shards,
            "gacha engine ready"
        );

        Ok(Self {
            config,
            store,
            catalog,
            clock,
            locks: LockTable::new(),
            rng: Mutex::new(rng),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Content catalog.
    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current state, creating the account on first access.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty user id
    /// - `Storage` if the account can't be loaded or created
    pub fn get_state(&self, user_id: &str) -> GachaResult<AccountView> {
        let (account, now) = self.read(user_id)?;
        Ok(AccountView::project(&account, now))
    }

    /// Sets the token balance from a watch history of `total_episodes`.
    ///
    /// The balance becomes `floor(total_episodes / episodes_per_token)` minus
    /// the pulls already made, capped at `max_tokens`. Repeating the call with
    /// the same episode count leaves the balance where it is.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty user id
    /// - `Storage` if the new balance can't be persisted
    pub fn calculate_tokens(&self, user_id: &str, total_episodes: u64) -> GachaResult<TokenGrant> {
        self.transact("calculate_tokens", user_id, |account, _| {
            let earned = total_episodes / self.config.episodes_per_token;
            account.tokens = earned
                .saturating_sub(account.total_pulls)
                .min(self.config.max_tokens);
            Ok(TokenGrant {
                tokens: account.tokens,
                shards: account.shards,
            })
        })
    }

    /// Aggregate collection figures.
    ///
    /// # Errors
    ///
    /// Same as [`get_state`](Self::get_state).
    pub fn stats(&self, user_id: &str) -> GachaResult<StatsView> {
        let (account, now) = self.read(user_id)?;
        Ok(StatsView::project(&account, now))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Pulls the caller-supplied card, subject to pending guarantees.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty user id or a malformed descriptor
    /// - `InsufficientCurrency` without tokens
    /// - `Storage` if the result can't be persisted
    pub fn roll(&self, user_id: &str, descriptor: CardDescriptor) -> GachaResult<RollResult> {
        self.transact("roll", user_id, |account, now| {
            self.pull(account, descriptor, now)
        })
    }

    /// Pulls a card drawn from the catalog by the configured rarity weights.
    ///
    /// # Errors
    ///
    /// As [`roll`](Self::roll), plus `NotFound` for an empty catalog.
    pub fn roll_random(&self, user_id: &str) -> GachaResult<RollResult> {
        self.transact("roll_random", user_id, |account, now| {
            let descriptor = {
                let mut rng = self.rng.lock();
                roll::draw_descriptor(&self.catalog, &self.config.roll_weights, &mut *rng)?
            };
            self.pull(account, descriptor, now)
        })
    }

    /// Buys and opens a cosmetic pack.
    ///
    /// A quoted `cost` must match the catalog price.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown pack
    /// - `Validation` for a price mismatch or an empty pack
    /// - `InsufficientCurrency` if shards don't cover the price
    pub fn buy_pack(
        &self,
        user_id: &str,
        pack_id: &str,
        cost: Option<u64>,
    ) -> GachaResult<PackResult> {
        self.transact("buy_pack", user_id, |account, _| {
            let pack = self
                .catalog
                .get_pack(pack_id)
                .ok_or_else(|| GachaError::not_found(Entity::Pack, pack_id))?;

            if let Some(quoted) = cost {
                if quoted != pack.cost {
                    return Err(GachaError::Validation(format!(
                        "pack {pack_id} costs {} shards, client quoted {quoted}",
                        pack.cost
                    )));
                }
            }

            let mut rng = self.rng.lock();
            pack::open_pack(account, &pack, &mut *rng)
        })
    }

    /// Applies an owned cosmetic to a card, or clears it with `"default"`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the card isn't held or the cosmetic isn't owned.
    pub fn apply_cosmetic(&self, user_id: &str, card_id: &str, cosmetic_id: &str) -> GachaResult<()> {
        self.transact("apply_cosmetic", user_id, |account, _| {
            account.collection.apply_cosmetic(card_id, cosmetic_id).map(|_| ())
        })
    }

    /// Buys a boost.
    ///
    /// # Errors
    ///
    /// - `Validation` if a one-shot boost of this kind is still pending
    /// - `InsufficientCurrency` if shards don't cover the price
    pub fn activate_boost(&self, user_id: &str, kind: BoostKind) -> GachaResult<BoostActivation> {
        self.transact("activate_boost", user_id, |account, now| {
            boost::activate(account, kind, &self.config.boosts, now)
        })
    }

    /// Buys an enhancement for one card.
    ///
    /// # Errors
    ///
    /// See [`enhance::enhance`].
    pub fn enhance_card(
        &self,
        user_id: &str,
        card_id: &str,
        kind: EnhancementKind,
    ) -> GachaResult<Card> {
        self.transact("enhance_card", user_id, |account, _| {
            enhance::enhance(account, card_id, kind, &self.config.enhancements)
        })
    }

    /// Fuses `card_ids` into one card using the named tier.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown tier, a missing card, or no catalog card
    ///   of the result rarity
    /// - `Validation` for wrong counts, repeats or mixed rarities
    /// - `InsufficientCurrency` if shards don't cover the price
    pub fn fuse_cards(
        &self,
        user_id: &str,
        card_ids: &[CardId],
        fusion_type: &str,
    ) -> GachaResult<FusionResult> {
        self.transact("fuse_cards", user_id, |account, now| {
            let def = self
                .catalog
                .get_fusion_config(fusion_type)
                .ok_or_else(|| GachaError::not_found(Entity::Fusion, fusion_type))?;

            let plan = fusion::plan(account, card_ids, &def, now)?;
            let candidates = self.catalog.cards_by_rarity(plan.result_rarity);

            let mut rng = self.rng.lock();
            fusion::execute(account, &plan, &def.id, &candidates, &mut *rng, now)
        })
    }

    /// Buys `count` tokens with shards.
    ///
    /// # Errors
    ///
    /// See [`exchange::exchange`].
    pub fn exchange_shards(&self, user_id: &str, count: u32) -> GachaResult<ExchangeResult> {
        self.transact("exchange_shards", user_id, |account, now| {
            exchange::exchange(account, count, &self.config, now.date_naive())
        })
    }

    /// Reinitializes the account to starting balances.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty user id
    /// - `Storage` if the reset can't be persisted
    pub fn reset(&self, user_id: &str) -> GachaResult<()> {
        self.transact("reset", user_id, |account, now| {
            *account = GachaAccount::new(&self.config, now);
            tracing::info!(user_id, "account reset");
            Ok(())
        })
    }

    /// Drops per-user lock entries nobody holds.
    ///
    /// The lock table also sweeps itself every
    /// [`DEFAULT_PRUNE_INTERVAL`](crate::locks::DEFAULT_PRUNE_INTERVAL)
    /// operations; this forces a sweep now.
    pub fn prune_idle_locks(&self) -> usize {
        self.locks.prune_idle()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn read(&self, user_id: &str) -> GachaResult<(GachaAccount, DateTime<Utc>)> {
        check_user_id(user_id)?;
        let now = self.clock.now();
        let account = self
            .store
            .load_or_create(user_id, &|| GachaAccount::new(&self.config, now))?;
        Ok((account, now))
    }

    fn pull(
        &self,
        account: &mut GachaAccount,
        descriptor: CardDescriptor,
        now: DateTime<Utc>,
    ) -> GachaResult<RollResult> {
        descriptor.validate()?;

        let (descriptor, boost_consumed) = {
            let mut rng = self.rng.lock();
            roll::apply_guarantee(account, descriptor, &self.catalog, &self.config, &mut *rng, now)
        };

        let outcome = roll::roll(account, descriptor, &self.config, now)?;

        Ok(RollResult {
            outcome,
            boost_consumed,
            tokens: account.tokens,
            shards: account.shards,
            total_pulls: account.total_pulls,
        })
    }

    fn transact<T>(
        &self,
        op: &'static str,
        user_id: &str,
        apply: impl FnOnce(&mut GachaAccount, DateTime<Utc>) -> GachaResult<T>,
    ) -> GachaResult<T> {
        check_user_id(user_id)?;

        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock();

        let now = self.clock.now();
        let account = self
            .store
            .load_or_create(user_id, &|| GachaAccount::new(&self.config, now))?;
        let mut txn = Transaction::begin(&self.store, user_id, account);

        let pruned = boost::prune_expired(&mut txn.working_mut().active_boosts, now);
        if pruned > 0 {
            tracing::debug!(user_id, op, pruned, "expired boosts pruned");
        }

        let value = match apply(txn.working_mut(), now) {
            Ok(value) => value,
            Err(e @ GachaError::BoundsViolation(_)) => {
                tracing::error!(user_id, op, error = %e, "bounds violated, rolling back");
                txn.rollback();
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(user_id, op, error = %e, "operation rejected");
                txn.rollback();
                return Err(e);
            }
        };

        if let Err(e) = txn.validate(&self.config) {
            txn.rollback();
            return Err(e);
        }
        txn.commit()?;

        tracing::debug!(user_id, op, "operation committed");
        Ok(value)
    }
}

fn check_user_id(user_id: &str) -> GachaResult<()> {
    if user_id.trim().is_empty() {
        return Err(GachaError::validation("user id must not be empty"));
    }
    Ok(())
}
