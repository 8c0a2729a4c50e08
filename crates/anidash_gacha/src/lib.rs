//! # AniDash Gacha Economy
//!
//! The collectible mini-game that rewards episode watching on the AniDash
//! dashboard: tokens buy card pulls, duplicate pulls pay out shards, and
//! shards buy cosmetic packs, fusions, enhancements, boosts and more tokens.
//!
//! ## Design Principles
//!
//! 1. **Integer currencies** - balances are `u64`, bounded by config, never negative
//! 2. **All-or-nothing operations** - every mutation is snapshot, apply, validate, commit
//! 3. **One lock per player** - operations on one account serialize, accounts don't contend
//! 4. **External configuration** - prices, caps and odds live in `data/economy.toml`
//!
//! ## Layout
//!
//! ```text
//! engine ──> transaction ──> store (memory | journal)
//!   │
//!   ├──> roll / pack / fusion / enhance / boost / exchange   (pure engines)
//!   │         └──> ledger, collection, rarity
//!   └──> catalog (manifests), clock, config
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use anidash_gacha::{EconomyConfig, GachaEngine, ManifestCatalog, MemoryStore};
//!
//! let catalog = ManifestCatalog::load("data/gacha_manifest.json", "data/cosmetics.json")?;
//! let engine = GachaEngine::new(EconomyConfig::default(), MemoryStore::new(), catalog)?;
//!
//! let pull = engine.roll_random("anilist:4242")?;
//! let pack = engine.buy_pack("anilist:4242", "sakura_pack", Some(200))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod account;
pub mod boost;
pub mod catalog;
pub mod clock;
pub mod collection;
pub mod config;
pub mod engine;
pub mod enhance;
pub mod error;
pub mod exchange;
pub mod fusion;
pub mod ledger;
pub mod locks;
pub mod pack;
pub mod rarity;
pub mod roll;
pub mod store;
pub mod transaction;
pub mod view;

pub use account::{AccountSnapshot, GachaAccount, UserId};
pub use boost::{BoostActivation, BoostKind, BoostState};
pub use catalog::{Catalog, ManifestCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Card, CardDescriptor, CardId, Collection, CosmeticId, EnhancementFlag};
pub use config::EconomyConfig;
pub use engine::GachaEngine;
pub use enhance::EnhancementKind;
pub use error::{Currency, Entity, GachaError, GachaResult};
pub use exchange::ExchangeResult;
pub use fusion::{FusionDef, FusionResult};
pub use pack::{PackDef, PackItem, PackResult};
pub use rarity::Rarity;
pub use roll::{RollOutcome, RollResult};
pub use store::{JournalStore, MemoryStore, StateStore};
pub use view::{AccountView, StatsView, TokenGrant};
