//! Benchmark for fusion planning and execution.
//!
//! Run with: cargo bench --package anidash_gacha --bench fusion_benchmark

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use anidash_gacha::fusion;
use anidash_gacha::{Card, CardDescriptor, CardId, EconomyConfig, FusionDef, GachaAccount, Rarity};

fn create_test_account(cards: usize) -> (GachaAccount, Vec<CardId>) {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut account = GachaAccount::new(&EconomyConfig::default(), now);
    account.shards = 100_000;

    let mut ids = Vec::with_capacity(cards);
    for i in 0..cards {
        let id = format!("card-{i}");
        account
            .collection
            .insert_new(Card::from_descriptor(
                CardDescriptor::new(id.clone(), "Filler", "Mob", Rarity::Rare, "f.png"),
                now,
            ))
            .unwrap();
        ids.push(id);
    }
    (account, ids)
}

fn benchmark_plan(c: &mut Criterion) {
    let (account, ids) = create_test_account(1_000);
    let prismatic = FusionDef::standard_tiers().remove(3);
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    c.bench_function("fusion_plan_20_of_1000", |b| {
        b.iter(|| black_box(fusion::plan(&account, &ids[..20], &prismatic, now)));
    });
}

fn benchmark_execute(c: &mut Criterion) {
    let (template, ids) = create_test_account(50);
    let basic = FusionDef::standard_tiers().remove(0);
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let candidates: Vec<CardDescriptor> = (0..20)
        .map(|i| CardDescriptor::new(format!("epic-{i}"), "Epic", "Mob", Rarity::Epic, "e.png"))
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    c.bench_function("fusion_execute_with_snapshot", |b| {
        b.iter(|| {
            let mut account = template.clone();
            let plan = fusion::plan(&account, &ids[..3], &basic, now).unwrap();
            black_box(fusion::execute(&mut account, &plan, "basic", &candidates, &mut rng, now))
        });
    });
}

criterion_group!(benches, benchmark_plan, benchmark_execute);
criterion_main!(benches);
