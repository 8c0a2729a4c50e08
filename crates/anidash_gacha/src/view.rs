//! Read projections of an account.
//!
//! Projections never write: expired boosts are filtered out and a stale
//! exchange counter reads as zero, but the stored account is left as is
//! until the next mutating operation prunes it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::account::GachaAccount;
use crate::boost::{self, BoostMap};
use crate::collection::{Card, CardId, CosmeticId};
use crate::rarity::Rarity;

/// What `get_state` returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    /// Roll currency.
    pub tokens: u64,
    /// Shard balance.
    pub shards: u64,
    /// Lifetime pulls.
    pub total_pulls: u64,
    /// Exchanges counted today.
    pub daily_exchanges: u32,
    /// Boosts still in effect.
    pub active_boosts: BoostMap,
    /// Owned cards, by id.
    pub collection: BTreeMap<CardId, Card>,
    /// Owned cosmetics.
    pub owned_cosmetics: Vec<CosmeticId>,
    /// Applied cosmetics, by card.
    pub applied_cosmetics: BTreeMap<CardId, CosmeticId>,
}

impl AccountView {
    /// Projects `account` as seen at `now`.
    #[must_use]
    pub fn project(account: &GachaAccount, now: DateTime<Utc>) -> Self {
        Self {
            tokens: account.tokens,
            shards: account.shards,
            total_pulls: account.total_pulls,
            daily_exchanges: account.exchanges_on(now.date_naive()),
            active_boosts: boost::active_boosts(&account.active_boosts, now).collect(),
            collection: account
                .collection
                .cards()
                .map(|card| (card.id.clone(), card.clone()))
                .collect(),
            owned_cosmetics: account.collection.owned_cosmetics().iter().cloned().collect(),
            applied_cosmetics: account.collection.applied_cosmetics().clone(),
        }
    }
}

/// Aggregate figures for the stats page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    /// Lifetime pulls.
    pub total_pulls: u64,
    /// Distinct cards held.
    pub unique_cards: usize,
    /// Copies across all cards.
    pub total_copies: u64,
    /// Distinct cards per rarity, every tier listed.
    pub by_rarity: BTreeMap<Rarity, u64>,
    /// Cosmetics owned.
    pub cosmetics_owned: usize,
    /// Cards with a cosmetic applied.
    pub cosmetics_applied: usize,
    /// Cards with at least one enhancement.
    pub enhanced_cards: usize,
    /// Token balance.
    pub tokens: u64,
    /// Shard balance.
    pub shards: u64,
    /// Exchanges counted today.
    pub exchanges_today: u32,
    /// Date of the last exchange.
    pub last_exchange_date: Option<NaiveDate>,
    /// Boosts still in effect.
    pub active_boosts: usize,
    /// Account creation or last reset.
    pub created_at: DateTime<Utc>,
}

impl StatsView {
    /// Aggregates `account` as seen at `now`.
    #[must_use]
    pub fn project(account: &GachaAccount, now: DateTime<Utc>) -> Self {
        let mut by_rarity: BTreeMap<Rarity, u64> = Rarity::ALL.into_iter().map(|r| (r, 0)).collect();
        by_rarity.extend(account.collection.count_by_rarity());

        Self {
            total_pulls: account.total_pulls,
            unique_cards: account.collection.len(),
            total_copies: account.collection.total_copies(),
            by_rarity,
            cosmetics_owned: account.collection.owned_cosmetics().len(),
            cosmetics_applied: account.collection.applied_cosmetics().len(),
            enhanced_cards: account
                .collection
                .cards()
                .filter(|card| !card.enhancements.is_empty())
                .count(),
            tokens: account.tokens,
            shards: account.shards,
            exchanges_today: account.exchanges_on(now.date_naive()),
            last_exchange_date: account.last_exchange_date,
            active_boosts: boost::active_boosts(&account.active_boosts, now).count(),
            created_at: account.created_at,
        }
    }
}

/// Tokens earned from watched episodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenGrant {
    /// Tokens the watch history is worth after pulls already made.
    pub tokens: u64,
    /// Current shard balance.
    pub shards: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::{BoostKind, BoostState};
    use crate::collection::CardDescriptor;
    use crate::config::EconomyConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 18, 0, 0).unwrap()
    }

    fn account() -> GachaAccount {
        let mut account = GachaAccount::new(&EconomyConfig::default(), now());
        for (id, rarity) in [("levi-5", Rarity::Legendary), ("eren-3", Rarity::Rare)] {
            account
                .collection
                .insert_new(crate::collection::Card::from_descriptor(
                    CardDescriptor::new(id, id, "Attack on Titan", rarity, "x.png"),
                    now(),
                ))
                .unwrap();
        }
        account.collection.add_copy("eren-3").unwrap();
        account.active_boosts.insert(
            BoostKind::DoubleShards,
            BoostState::Timed { expires_at: now() - Duration::seconds(1) },
        );
        account.active_boosts.insert(
            BoostKind::FusionDiscount,
            BoostState::Timed { expires_at: now() + Duration::minutes(5) },
        );
        account.daily_exchanges = 4;
        account.last_exchange_date = Some(now().date_naive() - Duration::days(1));
        account
    }

    #[test]
    fn test_view_filters_without_mutating() {
        let account = account();
        let view = AccountView::project(&account, now());

        assert_eq!(view.active_boosts.len(), 1);
        assert!(view.active_boosts.contains_key(&BoostKind::FusionDiscount));
        assert_eq!(view.daily_exchanges, 0);
        assert_eq!(view.collection.len(), 2);

        assert_eq!(account.active_boosts.len(), 2);
        assert_eq!(account.daily_exchanges, 4);
    }

    #[test]
    fn test_stats_aggregates() {
        let stats = StatsView::project(&account(), now());
        assert_eq!(stats.unique_cards, 2);
        assert_eq!(stats.total_copies, 3);
        assert_eq!(stats.by_rarity[&Rarity::Legendary], 1);
        assert_eq!(stats.by_rarity[&Rarity::Prismatic], 0);
        assert_eq!(stats.active_boosts, 1);
        assert_eq!(stats.exchanges_today, 0);
        assert_eq!(stats.enhanced_cards, 0);
    }
}
