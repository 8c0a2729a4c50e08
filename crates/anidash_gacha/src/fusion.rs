//! # Fusion Engine
//!
//! **Transactional N-cards -> 1-card upgrades**
//!
//! A fusion tier names how many cards it eats, what it costs in shards and
//! what rarity comes out:
//!
//! ```text
//! basic      3 same-rarity cards  -> next tier (Common->Rare->...->Prismatic)
//! advanced   5 cards              -> Epic
//! elite     10 cards              -> Legendary
//! prismatic 20 cards              -> Prismatic
//! ```
//!
//! ## Guarantees
//!
//! 1. **Exact consumption**: every named card entry is removed, no more
//! 2. **Single output**: exactly one card comes out
//! 3. **All-or-nothing**: every check runs before the first mutation
//!
//! The result card is picked from catalog candidates the coordinator passes
//! in; an empty candidate list aborts with `NotFound` before any change.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::account::GachaAccount;
use crate::boost::{self, BoostKind};
use crate::collection::{Card, CardDescriptor, CardId};
use crate::error::{Currency, Entity, GachaError, GachaResult};
use crate::ledger;
use crate::rarity::Rarity;

/// A fusion tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionDef {
    /// Fusion type id.
    pub id: String,
    /// Fewest cards accepted.
    pub min_cards: usize,
    /// Most cards accepted.
    pub max_cards: usize,
    /// Shard price before discounts.
    pub shard_cost: u64,
    /// Fixed output rarity; `None` upgrades the shared input rarity.
    #[serde(default)]
    pub result_rarity: Option<Rarity>,
    /// Whether all inputs must share one rarity.
    #[serde(default)]
    pub require_same_rarity: bool,
}

impl FusionDef {
    /// A tier taking exactly `cards` inputs.
    pub fn new(id: impl Into<String>, cards: usize, shard_cost: u64) -> Self {
        Self {
            id: id.into(),
            min_cards: cards,
            max_cards: cards,
            shard_cost,
            result_rarity: None,
            require_same_rarity: false,
        }
    }

    /// Fixes the output rarity.
    #[must_use]
    pub fn with_result(mut self, rarity: Rarity) -> Self {
        self.result_rarity = Some(rarity);
        self
    }

    /// Requires identical input rarities.
    #[must_use]
    pub fn same_rarity(mut self) -> Self {
        self.require_same_rarity = true;
        self
    }

    /// The four standard tiers.
    #[must_use]
    pub fn standard_tiers() -> Vec<Self> {
        vec![
            Self::new("basic", 3, 50).same_rarity(),
            Self::new("advanced", 5, 150).with_result(Rarity::Epic),
            Self::new("elite", 10, 400).with_result(Rarity::Legendary),
            Self::new("prismatic", 20, 1000).with_result(Rarity::Prismatic),
        ]
    }

    /// Shard price at `now`, halved (rounding up) under `FusionDiscount`.
    #[must_use]
    pub fn effective_cost(&self, account: &GachaAccount, now: DateTime<Utc>) -> u64 {
        if boost::is_active(&account.active_boosts, BoostKind::FusionDiscount, now) {
            self.shard_cost.div_ceil(2)
        } else {
            self.shard_cost
        }
    }
}

/// A validated fusion request, ready to be resolved against the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FusionPlan {
    /// Cards to consume.
    pub inputs: Vec<CardId>,
    /// Output rarity.
    pub result_rarity: Rarity,
    /// Shards to charge.
    pub shard_cost: u64,
}

/// Result of a fusion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FusionResult {
    /// Fusion type used.
    pub fusion_type: String,
    /// Cards removed.
    pub consumed: Vec<CardId>,
    /// Card produced.
    pub card: Card,
    /// Shards charged.
    pub shards_spent: u64,
    /// Shards left.
    pub shards_remaining: u64,
}

/// Runs every precondition without mutating the account.
///
/// # Errors
///
/// - `Validation` for a wrong card count, repeated ids or mixed rarities
/// - `NotFound` for ids not in the collection
/// - `InsufficientCurrency` if shards don't cover the price
pub fn plan(
    account: &GachaAccount,
    card_ids: &[CardId],
    def: &FusionDef,
    now: DateTime<Utc>,
) -> GachaResult<FusionPlan> {
    if card_ids.len() < def.min_cards || card_ids.len() > def.max_cards {
        return Err(GachaError::Validation(format!(
            "fusion {} takes {}-{} cards, got {}",
            def.id,
            def.min_cards,
            def.max_cards,
            card_ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(card_ids.len());
    for id in card_ids {
        if !seen.insert(id.as_str()) {
            return Err(GachaError::Validation(format!("card {id} listed twice")));
        }
    }

    let mut rarities = Vec::with_capacity(card_ids.len());
    for id in card_ids {
        rarities.push(account.collection.require(id)?.rarity);
    }

    let first = rarities
        .first()
        .copied()
        .ok_or_else(|| GachaError::validation("fusion needs at least one card"))?;
    let uniform = rarities.iter().all(|r| *r == first);

    if def.require_same_rarity && !uniform {
        return Err(GachaError::Validation(format!(
            "fusion {} requires cards of one rarity",
            def.id
        )));
    }

    let result_rarity = match def.result_rarity {
        Some(fixed) => fixed,
        None if uniform => first.next_tier(),
        None => rarities.iter().copied().min().unwrap_or(first).next_tier(),
    };

    let shard_cost = def.effective_cost(account, now);
    if account.shards < shard_cost {
        return Err(GachaError::InsufficientCurrency {
            currency: Currency::Shards,
            required: shard_cost,
            available: account.shards,
        });
    }

    Ok(FusionPlan {
        inputs: card_ids.to_vec(),
        result_rarity,
        shard_cost,
    })
}

/// Applies a plan: removes inputs, inserts the output, charges shards.
///
/// # Errors
///
/// - `NotFound` if `candidates` is empty
/// - anything [`plan`] guarded against, if the account changed in between
pub fn execute<R: Rng + ?Sized>(
    account: &mut GachaAccount,
    plan: &FusionPlan,
    fusion_type: &str,
    candidates: &[CardDescriptor],
    rng: &mut R,
    now: DateTime<Utc>,
) -> GachaResult<FusionResult> {
    if candidates.is_empty() {
        return Err(GachaError::not_found(
            Entity::FusionTarget,
            format!("{} card", plan.result_rarity),
        ));
    }

    account.shards = ledger::debit(account.shards, plan.shard_cost, Currency::Shards)?;

    for id in &plan.inputs {
        account.collection.remove(id)?;
    }

    let unowned: Vec<&CardDescriptor> = candidates
        .iter()
        .filter(|c| !account.collection.contains(&c.id))
        .collect();

    let card = if let Some(pick) = unowned.choose(rng) {
        let card = Card::from_descriptor((*pick).clone(), now);
        account.collection.insert_new(card.clone())?;
        card
    } else {
        let pick = candidates
            .choose(rng)
            .ok_or_else(|| GachaError::not_found(Entity::FusionTarget, plan.result_rarity.name()))?;
        account.collection.add_copy(&pick.id)?;
        tracing::debug!(card_id = %pick.id, "fusion result already owned, added a copy");
        account.collection.require(&pick.id)?.clone()
    };

    Ok(FusionResult {
        fusion_type: fusion_type.to_string(),
        consumed: plan.inputs.clone(),
        card,
        shards_spent: plan.shard_cost,
        shards_remaining: account.shards,
    })
}
