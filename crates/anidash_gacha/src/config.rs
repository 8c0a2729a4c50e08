//! # Economy Configuration
//!
//! Every balance constant lives in a TOML file loaded once at startup.
//! Missing keys fall back to the defaults below, so a partial file only
//! needs to name what it changes.
//!
//! ```toml
//! max_tokens_per_day = 10
//! rng_seed = 42
//!
//! [boosts.double_shards]
//! cost = 150
//! duration_secs = 3600
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::boost::BoostKind;
use crate::error::{GachaError, GachaResult};
use crate::rarity::Rarity;

/// Cost and duration of one boost kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostConfig {
    /// Shards charged on activation.
    pub cost: u64,
    /// Lifetime for timed kinds. Ignored by one-shot kinds.
    #[serde(default)]
    pub duration_secs: u64,
}

/// Per-kind boost settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostTable {
    /// Doubles duplicate shard awards while active.
    pub double_shards: BoostConfig,
    /// Halves fusion shard costs while active.
    pub fusion_discount: BoostConfig,
    /// Next roll is new and at least `guaranteed_pull_min_rarity`.
    pub guaranteed_pull: BoostConfig,
    /// Next roll is a new Prismatic card.
    pub prismatic_guarantee: BoostConfig,
}

impl BoostTable {
    /// Settings for `kind`.
    #[must_use]
    pub const fn get(&self, kind: BoostKind) -> BoostConfig {
        match kind {
            BoostKind::DoubleShards => self.double_shards,
            BoostKind::FusionDiscount => self.fusion_discount,
            BoostKind::GuaranteedPull => self.guaranteed_pull,
            BoostKind::PrismaticGuarantee => self.prismatic_guarantee,
        }
    }
}

impl Default for BoostTable {
    fn default() -> Self {
        Self {
            double_shards: BoostConfig { cost: 150, duration_secs: 3600 },
            fusion_discount: BoostConfig { cost: 100, duration_secs: 1800 },
            guaranteed_pull: BoostConfig { cost: 300, duration_secs: 0 },
            prismatic_guarantee: BoostConfig { cost: 1000, duration_secs: 0 },
        }
    }
}

/// Shard prices for card enhancements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementCosts {
    /// Glow overlay.
    pub glow: u64,
    /// Awakening (also consumes one duplicate copy).
    pub awaken: u64,
    /// Visual rarity frame, charged per star.
    pub visual_rarity_per_star: u64,
    /// Prismatic evolution of an awakened Legendary.
    pub prismatic_evolution: u64,
}

impl Default for EnhancementCosts {
    fn default() -> Self {
        Self {
            glow: 100,
            awaken: 250,
            visual_rarity_per_star: 40,
            prismatic_evolution: 1000,
        }
    }
}

/// Relative odds of each rarity for catalog-drawn rolls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollWeights {
    /// Weight of Common.
    pub common: u32,
    /// Weight of Rare.
    pub rare: u32,
    /// Weight of Epic.
    pub epic: u32,
    /// Weight of Legendary.
    pub legendary: u32,
    /// Weight of Prismatic.
    pub prismatic: u32,
}

impl RollWeights {
    /// Weight of one tier.
    #[must_use]
    pub const fn weight(&self, rarity: Rarity) -> u32 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
            Rarity::Prismatic => self.prismatic,
        }
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> u64 {
        Rarity::ALL.iter().map(|r| u64::from(self.weight(*r))).sum()
    }
}

impl Default for RollWeights {
    fn default() -> Self {
        Self {
            common: 600,
            rare: 250,
            epic: 100,
            legendary: 45,
            prismatic: 5,
        }
    }
}

/// All economy constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Token cap.
    pub max_tokens: u64,
    /// Shard cap.
    pub max_shards: u64,
    /// Tokens on a fresh account.
    pub initial_tokens: u64,
    /// Shards on a fresh account.
    pub initial_shards: u64,
    /// Tokens obtainable through shard exchange per UTC day.
    pub max_tokens_per_day: u32,
    /// Exchange rate.
    pub shards_per_token: u64,
    /// Watched episodes per earned token.
    pub episodes_per_token: u64,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
    /// Floor applied by the guaranteed-pull boost.
    pub guaranteed_pull_min_rarity: Rarity,
    /// Rarity odds for catalog-drawn rolls.
    pub roll_weights: RollWeights,
    /// Boost prices and durations.
    pub boosts: BoostTable,
    /// Enhancement prices.
    pub enhancements: EnhancementCosts,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1_000,
            max_shards: 100_000,
            initial_tokens: 5,
            initial_shards: 0,
            max_tokens_per_day: 10,
            shards_per_token: 50,
            episodes_per_token: 10,
            rng_seed: None,
            guaranteed_pull_min_rarity: Rarity::Epic,
            roll_weights: RollWeights::default(),
            boosts: BoostTable::default(),
            enhancements: EnhancementCosts::default(),
        }
    }
}

impl EconomyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on syntax errors or inconsistent values.
    pub fn from_toml_str(raw: &str) -> GachaResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| GachaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file is unreadable or invalid.
    pub fn load(path: impl AsRef<Path>) -> GachaResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GachaError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!(path = %path.display(), "economy config loaded");
        Ok(config)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> GachaResult<()> {
        if self.initial_tokens > self.max_tokens {
            return Err(GachaError::InvalidConfig(format!(
                "initial_tokens {} exceeds max_tokens {}",
                self.initial_tokens, self.max_tokens
            )));
        }
        if self.initial_shards > self.max_shards {
            return Err(GachaError::InvalidConfig(format!(
                "initial_shards {} exceeds max_shards {}",
                self.initial_shards, self.max_shards
            )));
        }
        if self.shards_per_token == 0 {
            return Err(GachaError::InvalidConfig(
                "shards_per_token must be positive".to_string(),
            ));
        }
        if self.episodes_per_token == 0 {
            return Err(GachaError::InvalidConfig(
                "episodes_per_token must be positive".to_string(),
            ));
        }
        if self.roll_weights.total() == 0 {
            return Err(GachaError::InvalidConfig(
                "roll_weights must not all be zero".to_string(),
            ));
        }
        for kind in BoostKind::ALL {
            if kind.is_timed() && self.boosts.get(kind).duration_secs == 0 {
                return Err(GachaError::InvalidConfig(format!(
                    "timed boost {kind} needs a positive duration_secs"
                )));
            }
        }
        Ok(())
    }
}
