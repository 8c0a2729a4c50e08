//! # Rarity Tiers
//!
//! The single canonical rarity scale for cards, pack items and fusion results.
//!
//! Card data arrives in three shapes: star counts as bare numbers (`5`),
//! star counts as strings (`"5"`) and English names (`"Legendary"`,
//! `"legendary"`). Every ingress goes through [`Rarity::normalize`], including
//! serde deserialization, so nothing past the boundary ever sees a raw code.
//!
//! ## Star Mapping
//!
//! ```text
//! 1★, 2★  -> Common
//! 3★      -> Rare
//! 4★      -> Epic
//! 5★      -> Legendary
//! name    -> Prismatic (no star code)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GachaError, GachaResult};

/// Rarity tier for cards and cosmetics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RarityCode")]
#[repr(u8)]
pub enum Rarity {
    /// 1★/2★ cards.
    Common = 0,
    /// 3★ cards.
    Rare = 1,
    /// 4★ cards.
    Epic = 2,
    /// 5★ cards.
    Legendary = 3,
    /// Special tier above 5★.
    Prismatic = 4,
}

impl Rarity {
    /// All tiers, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Prismatic,
    ];

    /// Shards credited when a card of this rarity is pulled again.
    #[inline]
    #[must_use]
    pub const fn shard_value(self) -> u64 {
        match self {
            Self::Common => 1,
            Self::Rare => 3,
            Self::Epic => 5,
            Self::Legendary => 10,
            Self::Prismatic => 20,
        }
    }

    /// The tier a same-rarity fusion upgrades to. Prismatic maps to itself.
    #[inline]
    #[must_use]
    pub const fn next_tier(self) -> Self {
        match self {
            Self::Common => Self::Rare,
            Self::Rare => Self::Epic,
            Self::Epic => Self::Legendary,
            Self::Legendary | Self::Prismatic => Self::Prismatic,
        }
    }

    /// Canonical display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Prismatic => "Prismatic",
        }
    }

    /// Converts a legacy star count.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for star counts outside 1-5.
    pub fn from_stars(stars: u64) -> GachaResult<Self> {
        match stars {
            1 | 2 => Ok(Self::Common),
            3 => Ok(Self::Rare),
            4 => Ok(Self::Epic),
            5 => Ok(Self::Legendary),
            other => Err(GachaError::Validation(format!(
                "unknown star rarity: {other}"
            ))),
        }
    }

    /// Normalizes any accepted textual rarity: a star count or a tier name.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the text is neither.
    pub fn normalize(raw: &str) -> GachaResult<Self> {
        let trimmed = raw.trim();
        if let Ok(stars) = trimmed.parse::<u64>() {
            return Self::from_stars(stars);
        }

        Self::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| GachaError::Validation(format!("unknown rarity: {raw:?}")))
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rarity {
    type Err = GachaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

/// Wire shape of a rarity before normalization.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RarityCode {
    /// Bare star count (`5`).
    Stars(u64),
    /// Star count as text or a tier name.
    Text(String),
}

impl TryFrom<RarityCode> for Rarity {
    type Error = GachaError;

    fn try_from(code: RarityCode) -> Result<Self, Self::Error> {
        match code {
            RarityCode::Stars(stars) => Self::from_stars(stars),
            RarityCode::Text(text) => Self::normalize(&text),
        }
    }
}
