//! # Boost Manager
//!
//! Time-limited and one-shot modifiers bought with shards.
//!
//! Each kind has exactly one state shape:
//!
//! ```text
//! DoubleShards        Timed { expires_at }   duplicate shard awards x2
//! FusionDiscount      Timed { expires_at }   fusion shard cost / 2
//! GuaranteedPull      OneShot { consumed }   next roll new and >= floor rarity
//! PrismaticGuarantee  OneShot { consumed }   next roll new Prismatic
//! ```
//!
//! Expired timed boosts and consumed one-shots linger in the map until the
//! coordinator calls [`prune_expired`] inside a mutating transaction. Reads use
//! [`is_active`] / [`active_boosts`], which filter without touching the map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::account::GachaAccount;
use crate::config::BoostTable;
use crate::error::{Currency, GachaError, GachaResult};
use crate::ledger;

/// Boost kinds on sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostKind {
    /// Doubles duplicate shard awards.
    DoubleShards,
    /// Halves fusion shard costs.
    FusionDiscount,
    /// Forces the next roll to a new card of at least the configured floor.
    GuaranteedPull,
    /// Forces the next roll to a new Prismatic card.
    PrismaticGuarantee,
}

impl BoostKind {
    /// Every kind.
    pub const ALL: [Self; 4] = [
        Self::DoubleShards,
        Self::FusionDiscount,
        Self::GuaranteedPull,
        Self::PrismaticGuarantee,
    ];

    /// True for kinds that expire by time rather than by use.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::DoubleShards | Self::FusionDiscount)
    }

    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DoubleShards => "double_shards",
            Self::FusionDiscount => "fusion_discount",
            Self::GuaranteedPull => "guaranteed_pull",
            Self::PrismaticGuarantee => "prismatic_guarantee",
        }
    }
}

impl fmt::Display for BoostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoostKind {
    type Err = GachaError;

    /// Accepts `snake_case` and the legacy `camelCase` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().replace('_', "") == folded)
            .ok_or_else(|| GachaError::Validation(format!("unknown boost kind: {s:?}")))
    }
}

/// Stored state of one boost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoostState {
    /// Active until `expires_at`.
    Timed {
        /// First instant at which the boost no longer applies.
        expires_at: DateTime<Utc>,
    },
    /// Active until honored once.
    OneShot {
        /// Set when a roll honors the boost.
        consumed: bool,
    },
}

impl BoostState {
    /// Whether the boost applies at `now`.
    #[inline]
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match *self {
            Self::Timed { expires_at } => now < expires_at,
            Self::OneShot { consumed } => !consumed,
        }
    }
}

/// Boost states keyed by kind.
pub type BoostMap = BTreeMap<BoostKind, BoostState>;

/// Result of a successful activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoostActivation {
    /// The boost bought.
    pub kind: BoostKind,
    /// Its new state.
    pub state: BoostState,
    /// Shards charged.
    pub shards_spent: u64,
    /// Shards left.
    pub shards_remaining: u64,
}

/// Whether `kind` applies at `now`.
#[must_use]
pub fn is_active(boosts: &BoostMap, kind: BoostKind, now: DateTime<Utc>) -> bool {
    boosts.get(&kind).is_some_and(|state| state.is_active(now))
}

/// Active boosts at `now`, without mutating anything.
pub fn active_boosts(
    boosts: &BoostMap,
    now: DateTime<Utc>,
) -> impl Iterator<Item = (BoostKind, BoostState)> + '_ {
    boosts
        .iter()
        .filter(move |(_, state)| state.is_active(now))
        .map(|(kind, state)| (*kind, *state))
}

/// Buys `kind` for the account.
///
/// Timed kinds are (re)started at `now`. A one-shot kind that is still
/// pending cannot be bought again.
///
/// # Errors
///
/// - `Validation` if a one-shot of this kind is still pending
/// - `InsufficientCurrency` if shards don't cover the price
pub fn activate(
    account: &mut GachaAccount,
    kind: BoostKind,
    table: &BoostTable,
    now: DateTime<Utc>,
) -> GachaResult<BoostActivation> {
    let settings = table.get(kind);

    let state = if kind.is_timed() {
        let lifetime = i64::try_from(settings.duration_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                GachaError::Validation(format!("boost {kind} duration out of range"))
            })?;
        BoostState::Timed {
            expires_at: lifetime,
        }
    } else {
        if is_active(&account.active_boosts, kind, now) {
            return Err(GachaError::Validation(format!(
                "boost {kind} is already pending"
            )));
        }
        BoostState::OneShot { consumed: false }
    };

    account.shards = ledger::debit(account.shards, settings.cost, Currency::Shards)?;
    account.active_boosts.insert(kind, state);

    Ok(BoostActivation {
        kind,
        state,
        shards_spent: settings.cost,
        shards_remaining: account.shards,
    })
}

/// Marks a pending one-shot boost as used. Returns false if nothing was pending.
pub fn consume(boosts: &mut BoostMap, kind: BoostKind) -> bool {
    match boosts.get_mut(&kind) {
        Some(BoostState::OneShot { consumed }) if !*consumed => {
            *consumed = true;
            true
        }
        _ => false,
    }
}

/// Drops expired timed boosts and consumed one-shots. Returns how many went.
pub fn prune_expired(boosts: &mut BoostMap, now: DateTime<Utc>) -> usize {
    let before = boosts.len();
    boosts.retain(|_, state| state.is_active(now));
    before - boosts.len()
}
