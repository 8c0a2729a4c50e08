//! # Economy Scenario Tests
//!
//! End-to-end walks through the public engine API, one player at a time.
//!
//! Run with: cargo test -p anidash_gacha --test scenarios

use std::sync::Arc;

use anidash_gacha::{
    CardDescriptor, CardId, EconomyConfig, Entity, GachaEngine, GachaError, ManifestCatalog,
    ManualClock, MemoryStore, PackDef, PackItem, Rarity, RollOutcome, StateStore,
};
use chrono::{TimeZone, Utc};

type Engine = GachaEngine<MemoryStore, ManifestCatalog>;

fn catalog() -> ManifestCatalog {
    let mut catalog = ManifestCatalog::new();
    for (id, name, rarity) in [
        ("zenitsu-2", "Zenitsu", Rarity::Common),
        ("inosuke-3", "Inosuke", Rarity::Rare),
        ("giyu-4", "Giyu", Rarity::Epic),
        ("shinobu-4", "Shinobu", Rarity::Epic),
        ("rengoku-5", "Rengoku", Rarity::Legendary),
        ("tanjiro-p", "Tanjiro", Rarity::Prismatic),
    ] {
        catalog.add_card(CardDescriptor::new(id, name, "Demon Slayer", rarity, format!("{id}.jpg")));
    }
    catalog.add_pack(PackDef {
        id: "sakura_pack".to_string(),
        name: "Sakura Pack".to_string(),
        cost: 200,
        items: vec![
            PackItem::new("border-sakura", Rarity::Common),
            PackItem::new("icon-petal", Rarity::Common),
            PackItem::new("border-sakura-animated", Rarity::Rare),
            PackItem::new("theme-sakura", Rarity::Epic),
        ],
        guaranteed_rarity: Some(Rarity::Epic),
    });
    catalog
}

fn engine() -> Engine {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 11, 5, 20, 0, 0).unwrap(),
    ));
    let config = EconomyConfig {
        rng_seed: Some(2024),
        ..EconomyConfig::default()
    };
    GachaEngine::with_clock(config, MemoryStore::new(), catalog(), clock).unwrap()
}

fn set_account(engine: &Engine, user: &str, edit: impl FnOnce(&mut anidash_gacha::GachaAccount)) {
    engine.get_state(user).unwrap();
    let mut account = engine.store().load(user).unwrap().unwrap();
    edit(&mut account);
    engine.store().save(user, &account).unwrap();
}

fn nezuko() -> CardDescriptor {
    CardDescriptor::new("nezuko-5", "Nezuko", "Demon Slayer", Rarity::Legendary, "Nezuko-5.jpg")
}

// ============================================================================
// ROLLS
// ============================================================================

#[test]
fn scenario_new_then_duplicate_legendary() {
    let engine = engine();

    let first = engine.roll("tanjiro_fan", nezuko()).unwrap();
    assert!(first.outcome.is_new());
    let state = engine.get_state("tanjiro_fan").unwrap();
    assert_eq!((state.tokens, state.shards), (4, 0));
    assert_eq!(state.collection["nezuko-5"].count, 1);

    let second = engine.roll("tanjiro_fan", nezuko()).unwrap();
    assert!(matches!(second.outcome, RollOutcome::Duplicate { count: 2, .. }));
    let state = engine.get_state("tanjiro_fan").unwrap();
    assert_eq!((state.tokens, state.shards), (3, 10));
    assert_eq!(state.collection["nezuko-5"].count, 2);
    assert_eq!(state.collection.len(), 1);
}

#[test]
fn scenario_roll_until_broke() {
    let engine = engine();
    for _ in 0..5 {
        engine.roll_random("u").unwrap();
    }
    let before = engine.get_state("u").unwrap();
    assert_eq!(before.tokens, 0);
    assert_eq!(before.total_pulls, 5);

    assert!(matches!(
        engine.roll_random("u"),
        Err(GachaError::InsufficientCurrency { required: 1, available: 0, .. })
    ));
    assert_eq!(engine.get_state("u").unwrap(), before);
}

#[test]
fn scenario_shards_saturate_at_cap() {
    let engine = engine();
    let cap = engine.config().max_shards;
    engine.roll("u", nezuko()).unwrap();
    set_account(&engine, "u", |a| a.shards = cap - 3);

    let result = engine.roll("u", nezuko()).unwrap();
    assert!(matches!(result.outcome, RollOutcome::Duplicate { shards_awarded: 3, .. }));
    assert_eq!(result.shards, cap);
}

// ============================================================================
// PACKS
// ============================================================================

#[test]
fn scenario_pack_too_expensive() {
    let engine = engine();
    set_account(&engine, "u", |a| a.shards = 150);

    assert!(matches!(
        engine.buy_pack("u", "sakura_pack", Some(200)),
        Err(GachaError::InsufficientCurrency { required: 200, available: 150, .. })
    ));
    let state = engine.get_state("u").unwrap();
    assert_eq!(state.shards, 150);
    assert!(state.owned_cosmetics.is_empty());
}

#[test]
fn scenario_pack_guarantee_always_honored() {
    let engine = engine();
    set_account(&engine, "u", |a| a.shards = 100_000);

    for _ in 0..25 {
        let result = engine.buy_pack("u", "sakura_pack", None).unwrap();
        assert!((2..=4).contains(&result.selected.len()));
        assert_eq!(result.selected[0], "theme-sakura");
    }
    assert_eq!(engine.get_state("u").unwrap().shards, 100_000 - 25 * 200);
}

// ============================================================================
// FUSION
// ============================================================================

#[test]
fn scenario_elite_fusion_consumes_exactly_ten() {
    let engine = engine();
    set_account(&engine, "u", |a| {
        a.tokens = 20;
        a.shards = 500;
    });

    let mut ids: Vec<CardId> = Vec::new();
    for i in 0..12 {
        let id = format!("filler-{i}");
        engine
            .roll("u", CardDescriptor::new(id.clone(), "Filler", "Mob", Rarity::Common, "f.png"))
            .unwrap();
        ids.push(id);
    }
    let before = engine.get_state("u").unwrap().collection.len();

    let result = engine.fuse_cards("u", &ids[..10], "elite").unwrap();
    assert_eq!(result.consumed.len(), 10);
    assert_eq!(result.card.id, "rengoku-5");

    let state = engine.get_state("u").unwrap();
    assert_eq!(state.collection.len(), before - 10 + 1);
    assert_eq!(state.shards, 100);
    assert!(state.collection.contains_key("filler-10"));
    assert!(!state.collection.contains_key("filler-0"));
}

#[test]
fn scenario_fusion_failure_changes_nothing() {
    let engine = engine();
    set_account(&engine, "u", |a| a.shards = 10);
    for id in ["a", "b", "c"] {
        engine
            .roll("u", CardDescriptor::new(id, id, "Mob", Rarity::Rare, "x.png"))
            .unwrap();
    }
    let before = engine.get_state("u").unwrap();

    let ids: Vec<CardId> = vec!["a".into(), "b".into(), "c".into()];
    assert!(matches!(
        engine.fuse_cards("u", &ids, "basic"),
        Err(GachaError::InsufficientCurrency { .. })
    ));
    let missing: Vec<CardId> = vec!["a".into(), "b".into(), "zz".into()];
    assert!(matches!(
        engine.fuse_cards("u", &missing, "basic"),
        Err(GachaError::NotFound { entity: Entity::Card, .. })
    ));
    assert_eq!(engine.get_state("u").unwrap(), before);
}

// ============================================================================
// EXCHANGE
// ============================================================================

#[test]
fn scenario_daily_cap_at_the_edge() {
    let engine = engine();
    let today = Utc.with_ymd_and_hms(2024, 11, 5, 0, 0, 0).unwrap().date_naive();
    set_account(&engine, "u", |a| {
        a.shards = 1_000;
        a.daily_exchanges = 9;
        a.last_exchange_date = Some(today);
    });

    let ok = engine.exchange_shards("u", 1).unwrap();
    assert_eq!(ok.daily_exchanges, 10);
    assert_eq!(ok.shards, 950);

    set_account(&engine, "u", |a| a.shards = 100_000);
    assert!(matches!(
        engine.exchange_shards("u", 1),
        Err(GachaError::Validation(_))
    ));
    assert_eq!(engine.get_state("u").unwrap().shards, 100_000);
}

// ============================================================================
// STATS
// ============================================================================

#[test]
fn scenario_stats_after_a_session() {
    let engine = engine();
    set_account(&engine, "u", |a| a.shards = 1_000);

    engine.roll("u", nezuko()).unwrap();
    engine.roll("u", nezuko()).unwrap();
    engine
        .roll("u", CardDescriptor::new("giyu-4", "Giyu", "Demon Slayer", Rarity::Epic, "g.jpg"))
        .unwrap();
    let pack = engine.buy_pack("u", "sakura_pack", Some(200)).unwrap();
    engine.apply_cosmetic("u", "nezuko-5", &pack.selected[0]).unwrap();

    let stats = engine.stats("u").unwrap();
    assert_eq!(stats.total_pulls, 3);
    assert_eq!(stats.unique_cards, 2);
    assert_eq!(stats.total_copies, 3);
    assert_eq!(stats.by_rarity[&Rarity::Legendary], 1);
    assert_eq!(stats.by_rarity[&Rarity::Epic], 1);
    assert_eq!(stats.cosmetics_owned, pack.selected.len());
    assert_eq!(stats.cosmetics_applied, 1);
    assert_eq!(stats.tokens, 2);
    assert_eq!(stats.shards, 1_000 + 10 - 200);
}
