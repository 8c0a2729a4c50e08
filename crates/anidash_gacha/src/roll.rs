//! # Roll Engine
//!
//! One gacha pull: spend a token, then either add a new card or bump the
//! copy count of an owned one and pay out shards.
//!
//! ## Pipeline
//!
//! ```text
//! descriptor ──> apply_guarantee() ──> roll()
//!   (caller or      (pending one-shot      (debit 1 token, pulls+1,
//!    catalog)        boost may swap the     New | Duplicate)
//!                    card for a new one
//!                    of a higher tier)
//! ```
//!
//! ## Duplicate Shard Table
//!
//! | Rarity    | Legacy | Shards |
//! |-----------|--------|--------|
//! | Common    | 2★     | 1      |
//! | Rare      | 3★     | 3      |
//! | Epic      | 4★     | 5      |
//! | Legendary | 5★     | 10     |
//! | Prismatic | -      | 20     |
//!
//! Shard awards double while `DoubleShards` is active and saturate at the
//! configured cap.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::account::GachaAccount;
use crate::boost::{self, BoostKind};
use crate::catalog::Catalog;
use crate::collection::{Card, CardDescriptor, CardId};
use crate::config::{EconomyConfig, RollWeights};
use crate::error::{Currency, Entity, GachaError, GachaResult};
use crate::ledger;
use crate::rarity::Rarity;

/// What a single pull produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollOutcome {
    /// First copy of a card.
    New {
        /// The card as stored.
        card: Card,
    },
    /// Another copy of an owned card.
    Duplicate {
        /// The card pulled again.
        card_id: CardId,
        /// Copies now held.
        count: u32,
        /// Shards actually credited after the cap.
        shards_awarded: u64,
    },
}

impl RollOutcome {
    /// Id of the pulled card.
    #[must_use]
    pub fn card_id(&self) -> &str {
        match self {
            Self::New { card } => &card.id,
            Self::Duplicate { card_id, .. } => card_id,
        }
    }

    /// True for a first copy.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::New { .. })
    }
}

/// Result returned to callers of a roll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RollResult {
    /// The pull.
    pub outcome: RollOutcome,
    /// One-shot boost honored by this roll, if any.
    pub boost_consumed: Option<BoostKind>,
    /// Tokens left.
    pub tokens: u64,
    /// Shards held.
    pub shards: u64,
    /// Lifetime pulls.
    pub total_pulls: u64,
}

/// A pending one-shot guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guarantee {
    /// Boost that grants it.
    pub kind: BoostKind,
    /// Lowest acceptable rarity.
    pub min_rarity: Rarity,
}

/// Performs the pull itself.
///
/// # Errors
///
/// - `Validation` for a descriptor without id or name
/// - `InsufficientCurrency` if no token is left
/// - `BoundsViolation` on counter overflow
pub fn roll(
    account: &mut GachaAccount,
    descriptor: CardDescriptor,
    config: &EconomyConfig,
    now: DateTime<Utc>,
) -> GachaResult<RollOutcome> {
    descriptor.validate()?;

    account.tokens = ledger::debit(account.tokens, 1, Currency::Tokens)?;
    account.total_pulls = account
        .total_pulls
        .checked_add(1)
        .ok_or_else(|| GachaError::BoundsViolation("total pulls overflow".to_string()))?;

    if let Some(owned) = account.collection.get(&descriptor.id) {
        let rarity = owned.rarity;
        let count = account.collection.add_copy(&descriptor.id)?;

        let multiplier = if boost::is_active(&account.active_boosts, BoostKind::DoubleShards, now) {
            2
        } else {
            1
        };
        let credit = ledger::credit(
            account.shards,
            rarity.shard_value() * multiplier,
            config.max_shards,
        );
        account.shards = credit.balance;

        return Ok(RollOutcome::Duplicate {
            card_id: descriptor.id,
            count,
            shards_awarded: credit.applied,
        });
    }

    let card = Card::from_descriptor(descriptor, now);
    account.collection.insert_new(card.clone())?;
    Ok(RollOutcome::New { card })
}

/// The guarantee a roll would honor right now. Prismatic wins over the plain one.
#[must_use]
pub fn pending_guarantee(
    account: &GachaAccount,
    config: &EconomyConfig,
    now: DateTime<Utc>,
) -> Option<Guarantee> {
    if boost::is_active(&account.active_boosts, BoostKind::PrismaticGuarantee, now) {
        return Some(Guarantee {
            kind: BoostKind::PrismaticGuarantee,
            min_rarity: Rarity::Prismatic,
        });
    }
    if boost::is_active(&account.active_boosts, BoostKind::GuaranteedPull, now) {
        return Some(Guarantee {
            kind: BoostKind::GuaranteedPull,
            min_rarity: config.guaranteed_pull_min_rarity,
        });
    }
    None
}

/// Lets a pending guarantee reshape the pull before [`roll`] runs.
///
/// A descriptor that is already new and at or above the floor honors the
/// guarantee as is. Otherwise a random unowned catalog card at or above the
/// floor replaces it. Either way the boost is consumed. If the catalog has no
/// such card the descriptor passes through and the boost stays pending.
pub fn apply_guarantee<C, R>(
    account: &mut GachaAccount,
    descriptor: CardDescriptor,
    catalog: &C,
    config: &EconomyConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> (CardDescriptor, Option<BoostKind>)
where
    C: Catalog + ?Sized,
    R: Rng + ?Sized,
{
    let Some(guarantee) = pending_guarantee(account, config, now) else {
        return (descriptor, None);
    };

    let qualifies = descriptor.rarity >= guarantee.min_rarity
        && !account.collection.contains(&descriptor.id);

    let chosen = if qualifies {
        Some(descriptor.clone())
    } else {
        let candidates: Vec<CardDescriptor> = Rarity::ALL
            .into_iter()
            .filter(|tier| *tier >= guarantee.min_rarity)
            .flat_map(|tier| catalog.cards_by_rarity(tier))
            .filter(|candidate| !account.collection.contains(&candidate.id))
            .collect();
        candidates.choose(rng).cloned()
    };

    match chosen {
        Some(card) => {
            boost::consume(&mut account.active_boosts, guarantee.kind);
            (card, Some(guarantee.kind))
        }
        None => {
            tracing::debug!(
                boost = %guarantee.kind,
                min_rarity = %guarantee.min_rarity,
                "no unowned card can honor guarantee, boost stays pending"
            );
            (descriptor, None)
        }
    }
}

/// Draws a rarity by weight, then a card of that rarity from the catalog.
///
/// Empty tiers fall back to the nearest lower tier, then the nearest higher.
///
/// # Errors
///
/// Returns `NotFound` if the catalog holds no cards at all.
pub fn draw_descriptor<C, R>(
    catalog: &C,
    weights: &RollWeights,
    rng: &mut R,
) -> GachaResult<CardDescriptor>
where
    C: Catalog + ?Sized,
    R: Rng + ?Sized,
{
    let drawn = draw_rarity(weights, rng);

    let lower = Rarity::ALL.into_iter().rev().filter(|tier| *tier <= drawn);
    let higher = Rarity::ALL.into_iter().filter(|tier| *tier > drawn);

    for tier in lower.chain(higher) {
        let pool = catalog.cards_by_rarity(tier);
        if let Some(card) = pool.choose(rng) {
            return Ok(card.clone());
        }
    }

    Err(GachaError::not_found(Entity::CatalogCard, format!("any {drawn} card")))
}

/// Weighted rarity pick.
fn draw_rarity<R: Rng + ?Sized>(weights: &RollWeights, rng: &mut R) -> Rarity {
    let total = weights.total();
    if total == 0 {
        return Rarity::Common;
    }

    let mut roll = rng.gen_range(0..total);
    for tier in Rarity::ALL {
        let weight = u64::from(weights.weight(tier));
        if roll < weight {
            return tier;
        }
        roll -= weight;
    }
    Rarity::Common
}
