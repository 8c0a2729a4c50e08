//! # Enhancement Engine
//!
//! Paid, permanent upgrades on a single owned card.
//!
//! | Kind                 | Price                          | Extra requirement             |
//! |----------------------|--------------------------------|-------------------------------|
//! | `Glow`               | `glow`                         | not glowing yet               |
//! | `Awaken`             | `awaken`                       | 2+ copies, burns one copy     |
//! | `VisualRarity(n)`    | `visual_rarity_per_star * n`   | `1 <= n <= 5`                 |
//! | `PrismaticEvolution` | `prismatic_evolution`          | awakened Legendary            |
//!
//! Every check runs before the first write, so a rejection leaves the
//! account as it was.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::GachaAccount;
use crate::collection::{Card, EnhancementFlag};
use crate::config::EnhancementCosts;
use crate::error::{Currency, GachaError, GachaResult};
use crate::ledger;
use crate::rarity::Rarity;

/// Highest star count a visual frame can show.
pub const MAX_VISUAL_STARS: u8 = 5;

/// An enhancement a player can buy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnhancementKind {
    /// Glow overlay.
    Glow,
    /// Awakened art, burning one duplicate copy.
    Awaken,
    /// Star frame independent of true rarity.
    VisualRarity {
        /// Stars shown.
        stars: u8,
    },
    /// Prismatic evolution.
    PrismaticEvolution,
}

impl EnhancementKind {
    /// Shard price under `costs`.
    #[must_use]
    pub fn cost(self, costs: &EnhancementCosts) -> u64 {
        match self {
            Self::Glow => costs.glow,
            Self::Awaken => costs.awaken,
            Self::VisualRarity { stars } => costs.visual_rarity_per_star * u64::from(stars),
            Self::PrismaticEvolution => costs.prismatic_evolution,
        }
    }

    /// Flag this enhancement sets on the card.
    #[must_use]
    pub const fn flag(self) -> EnhancementFlag {
        match self {
            Self::Glow => EnhancementFlag::Glow,
            Self::Awaken => EnhancementFlag::Awakened,
            Self::VisualRarity { stars } => EnhancementFlag::VisualRarity(stars),
            Self::PrismaticEvolution => EnhancementFlag::PrismaticEvolution,
        }
    }
}

impl fmt::Display for EnhancementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glow => f.write_str("glow"),
            Self::Awaken => f.write_str("awaken"),
            Self::VisualRarity { stars } => write!(f, "visual rarity {stars}"),
            Self::PrismaticEvolution => f.write_str("prismatic evolution"),
        }
    }
}

/// Buys `kind` for one card and returns the updated card.
///
/// # Errors
///
/// - `NotFound` if the card is not held
/// - `Validation` if the card doesn't qualify or already has the enhancement
/// - `InsufficientCurrency` if shards don't cover the price
pub fn enhance(
    account: &mut GachaAccount,
    card_id: &str,
    kind: EnhancementKind,
    costs: &EnhancementCosts,
) -> GachaResult<Card> {
    let card = account.collection.require(card_id)?;
    check_eligible(card, kind)?;

    let cost = kind.cost(costs);
    let shards = ledger::debit(account.shards, cost, Currency::Shards)?;

    let card = account.collection.require_mut(card_id)?;
    match kind {
        EnhancementKind::Awaken => card.count -= 1,
        EnhancementKind::VisualRarity { .. } => card
            .enhancements
            .retain(|flag| !matches!(flag, EnhancementFlag::VisualRarity(_))),
        EnhancementKind::Glow | EnhancementKind::PrismaticEvolution => {}
    }
    card.enhancements.insert(kind.flag());
    let updated = card.clone();

    account.shards = shards;
    Ok(updated)
}

fn check_eligible(card: &Card, kind: EnhancementKind) -> GachaResult<()> {
    let already = |what: &str| -> GachaResult<()> {
        Err(GachaError::Validation(format!("card {} is already {what}", card.id)))
    };

    match kind {
        EnhancementKind::Glow if card.has(EnhancementFlag::Glow) => already("glowing"),
        EnhancementKind::Awaken if card.has(EnhancementFlag::Awakened) => already("awakened"),
        EnhancementKind::Awaken if card.count < 2 => Err(GachaError::Validation(format!(
            "awakening {} needs a duplicate copy",
            card.id
        ))),
        EnhancementKind::VisualRarity { stars } if stars == 0 || stars > MAX_VISUAL_STARS => {
            Err(GachaError::Validation(format!(
                "visual rarity must be 1-{MAX_VISUAL_STARS} stars, got {stars}"
            )))
        }
        EnhancementKind::PrismaticEvolution if card.has(EnhancementFlag::PrismaticEvolution) => {
            already("evolved")
        }
        EnhancementKind::PrismaticEvolution
            if card.rarity != Rarity::Legendary || !card.has(EnhancementFlag::Awakened) =>
        {
            Err(GachaError::Validation(format!(
                "prismatic evolution needs an awakened Legendary, {} is {}",
                card.id, card.rarity
            )))
        }
        _ => Ok(()),
    }
}
