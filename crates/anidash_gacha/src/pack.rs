//! # Pack Opening Engine
//!
//! Cosmetic packs bought with shards. A pack reveals 2-4 distinct items from
//! its pool; packs with a guaranteed rarity always include at least one item
//! at or above it when the pool has one.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::account::GachaAccount;
use crate::collection::CosmeticId;
use crate::error::{Currency, GachaError, GachaResult};
use crate::ledger;
use crate::rarity::Rarity;

/// Fewest items a pack reveals when its pool allows.
pub const MIN_PACK_ITEMS: usize = 2;

/// Most items a pack reveals.
pub const MAX_PACK_ITEMS: usize = 4;

/// One cosmetic a pack can contain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    /// Cosmetic id.
    pub id: CosmeticId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Cosmetic type (`border`, `icon`, `theme`, ...).
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Normalized rarity.
    pub rarity: Rarity,
}

impl PackItem {
    /// Creates an item with only id and rarity.
    pub fn new(id: impl Into<CosmeticId>, rarity: Rarity) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: String::new(),
            rarity,
        }
    }
}

/// A purchasable pack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackDef {
    /// Pack id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Shard price.
    pub cost: u64,
    /// Pool the reveal draws from.
    pub items: Vec<PackItem>,
    /// Rarity floor for at least one revealed item.
    #[serde(default)]
    pub guaranteed_rarity: Option<Rarity>,
}

/// Result of opening a pack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackResult {
    /// Pack opened.
    pub pack_id: String,
    /// Revealed ids, guaranteed pick first.
    pub selected: Vec<CosmeticId>,
    /// Revealed ids that were not owned before.
    pub new_items: Vec<CosmeticId>,
    /// Shards charged.
    pub shards_spent: u64,
    /// Shards left.
    pub shards_remaining: u64,
}

/// Opens `pack` for the account.
///
/// # Errors
///
/// - `Validation` if the pack pool is empty
/// - `InsufficientCurrency` if shards don't cover the price
pub fn open_pack<R: Rng + ?Sized>(
    account: &mut GachaAccount,
    pack: &PackDef,
    rng: &mut R,
) -> GachaResult<PackResult> {
    if pack.items.is_empty() {
        return Err(GachaError::Validation(format!("pack {} has no items", pack.id)));
    }

    account.shards = ledger::debit(account.shards, pack.cost, Currency::Shards)?;

    let selected = select_items(pack, rng);

    let mut new_items = Vec::new();
    for id in &selected {
        if account.collection.grant_cosmetic(id.clone()) {
            new_items.push(id.clone());
        }
    }

    Ok(PackResult {
        pack_id: pack.id.clone(),
        selected,
        new_items,
        shards_spent: pack.cost,
        shards_remaining: account.shards,
    })
}

/// Picks the revealed ids without touching any account.
#[must_use]
pub fn select_items<R: Rng + ?Sized>(pack: &PackDef, rng: &mut R) -> Vec<CosmeticId> {
    let target = rng
        .gen_range(MIN_PACK_ITEMS..=MAX_PACK_ITEMS)
        .min(pack.items.len());

    let mut pool: Vec<usize> = (0..pack.items.len()).collect();
    let mut picked: Vec<usize> = Vec::with_capacity(target);

    if let Some(floor) = pack.guaranteed_rarity {
        let qualifying: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|&i| pack.items[i].rarity >= floor)
            .collect();
        if let Some(&guaranteed) = qualifying.choose(rng) {
            picked.push(guaranteed);
            pool.retain(|&i| i != guaranteed);
        }
    }

    let remaining = target.saturating_sub(picked.len());
    picked.extend(pool.choose_multiple(rng, remaining).copied());

    picked
        .into_iter()
        .map(|i| pack.items[i].id.clone())
        .collect()
}
