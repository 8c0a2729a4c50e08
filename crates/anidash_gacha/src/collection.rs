//! # Collection Store
//!
//! Per-user bookkeeping of cards and cosmetics.
//!
//! Cards are unique by id; pulling a card again bumps its `count` instead of
//! adding a second entry. Cosmetics are owned as a set, and at most one owned
//! cosmetic is applied to any given card.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Entity, GachaError, GachaResult};
use crate::rarity::Rarity;

/// Stable identifier of a card across duplicate pulls.
pub type CardId = String;

/// Identifier of a cosmetic pack item.
pub type CosmeticId = String;

/// Cosmetic id that clears whatever is applied to a card.
pub const DEFAULT_COSMETIC: &str = "default";

/// Per-card enhancement marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnhancementFlag {
    /// Glow overlay.
    Glow,
    /// Awakened art.
    Awakened,
    /// Displayed star frame, independent of true rarity.
    VisualRarity(u8),
    /// Prismatic evolution of an awakened Legendary.
    PrismaticEvolution,
}

/// A card as described by the caller or the catalog, before it is owned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDescriptor {
    /// Card id.
    pub id: CardId,
    /// Character name.
    pub name: String,
    /// Series the character is from.
    pub anime: String,
    /// Normalized rarity.
    pub rarity: Rarity,
    /// Art location.
    pub image_url: String,
}

impl CardDescriptor {
    /// Creates a descriptor.
    pub fn new(
        id: impl Into<CardId>,
        name: impl Into<String>,
        anime: impl Into<String>,
        rarity: Rarity,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            anime: anime.into(),
            rarity,
            image_url: image_url.into(),
        }
    }

    /// Rejects descriptors missing an id or a name.
    ///
    /// # Errors
    ///
    /// Returns `Validation` describing the missing field.
    pub fn validate(&self) -> GachaResult<()> {
        if self.id.trim().is_empty() {
            return Err(GachaError::validation("card id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(GachaError::Validation(format!(
                "card {} has no name",
                self.id
            )));
        }
        Ok(())
    }
}

/// An owned card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card id.
    pub id: CardId,
    /// Character name.
    pub name: String,
    /// Series the character is from.
    pub anime: String,
    /// Normalized rarity.
    pub rarity: Rarity,
    /// Art location.
    pub image_url: String,
    /// Copies held, always at least 1.
    pub count: u32,
    /// When the first copy was pulled.
    pub acquired_at: DateTime<Utc>,
    /// Enhancements bought for this card.
    #[serde(default)]
    pub enhancements: BTreeSet<EnhancementFlag>,
}

impl Card {
    /// First copy of `descriptor`, acquired at `now`.
    #[must_use]
    pub fn from_descriptor(descriptor: CardDescriptor, now: DateTime<Utc>) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name,
            anime: descriptor.anime,
            rarity: descriptor.rarity,
            image_url: descriptor.image_url,
            count: 1,
            acquired_at: now,
            enhancements: BTreeSet::new(),
        }
    }

    /// Whether `flag` is set.
    #[must_use]
    pub fn has(&self, flag: EnhancementFlag) -> bool {
        self.enhancements.contains(&flag)
    }

    /// Star frame currently shown, if any.
    #[must_use]
    pub fn visual_rarity(&self) -> Option<u8> {
        self.enhancements.iter().find_map(|flag| match flag {
            EnhancementFlag::VisualRarity(stars) => Some(*stars),
            _ => None,
        })
    }
}

/// A player's cards and cosmetics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    cards: BTreeMap<CardId, Card>,
    owned_cosmetics: BTreeSet<CosmeticId>,
    applied_cosmetics: BTreeMap<CardId, CosmeticId>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct cards.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True if no cards are held.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Whether `card_id` is held.
    #[inline]
    #[must_use]
    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.contains_key(card_id)
    }

    /// Looks up a card.
    #[must_use]
    pub fn get(&self, card_id: &str) -> Option<&Card> {
        self.cards.get(card_id)
    }

    /// Looks up a card, failing with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the card is not held.
    pub fn require(&self, card_id: &str) -> GachaResult<&Card> {
        self.cards
            .get(card_id)
            .ok_or_else(|| GachaError::not_found(Entity::Card, card_id))
    }

    /// Mutable lookup, failing with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the card is not held.
    pub fn require_mut(&mut self, card_id: &str) -> GachaResult<&mut Card> {
        self.cards
            .get_mut(card_id)
            .ok_or_else(|| GachaError::not_found(Entity::Card, card_id))
    }

    /// All held cards in id order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    /// Sum of copies across all cards.
    #[must_use]
    pub fn total_copies(&self) -> u64 {
        self.cards.values().map(|c| u64::from(c.count)).sum()
    }

    /// Distinct cards per rarity.
    #[must_use]
    pub fn count_by_rarity(&self) -> BTreeMap<Rarity, u64> {
        let mut counts = BTreeMap::new();
        for card in self.cards.values() {
            *counts.entry(card.rarity).or_insert(0) += 1;
        }
        counts
    }

    /// Inserts a card that is not held yet.
    ///
    /// # Errors
    ///
    /// Returns `BoundsViolation` if the id is already present.
    pub fn insert_new(&mut self, card: Card) -> GachaResult<()> {
        if self.cards.contains_key(&card.id) {
            return Err(GachaError::BoundsViolation(format!(
                "card {} already in collection",
                card.id
            )));
        }
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    /// Adds one copy of a held card and returns the new count.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the card is not held
    /// - `BoundsViolation` if the count would overflow
    pub fn add_copy(&mut self, card_id: &str) -> GachaResult<u32> {
        let card = self.require_mut(card_id)?;
        card.count = card.count.checked_add(1).ok_or_else(|| {
            GachaError::BoundsViolation(format!("copy count overflow on {card_id}"))
        })?;
        Ok(card.count)
    }

    /// Removes a card entirely, along with any cosmetic applied to it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the card is not held.
    pub fn remove(&mut self, card_id: &str) -> GachaResult<Card> {
        let card = self
            .cards
            .remove(card_id)
            .ok_or_else(|| GachaError::not_found(Entity::Card, card_id))?;
        self.applied_cosmetics.remove(card_id);
        Ok(card)
    }

    /// Owned cosmetics.
    #[must_use]
    pub fn owned_cosmetics(&self) -> &BTreeSet<CosmeticId> {
        &self.owned_cosmetics
    }

    /// Applied cosmetics by card.
    #[must_use]
    pub fn applied_cosmetics(&self) -> &BTreeMap<CardId, CosmeticId> {
        &self.applied_cosmetics
    }

    /// Whether the cosmetic is owned.
    #[must_use]
    pub fn owns_cosmetic(&self, cosmetic_id: &str) -> bool {
        self.owned_cosmetics.contains(cosmetic_id)
    }

    /// Grants a cosmetic. Returns true if it was not owned before.
    pub fn grant_cosmetic(&mut self, cosmetic_id: impl Into<CosmeticId>) -> bool {
        self.owned_cosmetics.insert(cosmetic_id.into())
    }

    /// Applies an owned cosmetic to a held card, replacing any previous one.
    ///
    /// Passing [`DEFAULT_COSMETIC`] clears the card instead.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the card is not held or the cosmetic is not owned
    pub fn apply_cosmetic(
        &mut self,
        card_id: &str,
        cosmetic_id: &str,
    ) -> GachaResult<Option<CosmeticId>> {
        self.require(card_id)?;

        if cosmetic_id == DEFAULT_COSMETIC {
            return Ok(self.applied_cosmetics.remove(card_id));
        }

        if !self.owns_cosmetic(cosmetic_id) {
            return Err(GachaError::not_found(Entity::Cosmetic, cosmetic_id));
        }

        Ok(self
            .applied_cosmetics
            .insert(card_id.to_string(), cosmetic_id.to_string()))
    }

    /// Checks uniqueness, copy counts and cosmetic references.
    ///
    /// # Errors
    ///
    /// Returns `BoundsViolation` naming the first broken rule.
    pub fn validate(&self) -> GachaResult<()> {
        for (key, card) in &self.cards {
            if key != &card.id {
                return Err(GachaError::BoundsViolation(format!(
                    "card keyed {key} carries id {}",
                    card.id
                )));
            }
            if card.count == 0 {
                return Err(GachaError::BoundsViolation(format!(
                    "card {key} has zero copies"
                )));
            }
        }

        for (card_id, cosmetic_id) in &self.applied_cosmetics {
            if !self.owned_cosmetics.contains(cosmetic_id) {
                return Err(GachaError::BoundsViolation(format!(
                    "card {card_id} wears unowned cosmetic {cosmetic_id}"
                )));
            }
            if !self.cards.contains_key(card_id) {
                return Err(GachaError::BoundsViolation(format!(
                    "cosmetic {cosmetic_id} applied to missing card {card_id}"
                )));
            }
        }

        Ok(())
    }
}
