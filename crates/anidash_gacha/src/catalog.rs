//! # Content Catalog
//!
//! Read-only lookup of the card pool, cosmetic packs and fusion tiers.
//!
//! [`ManifestCatalog`] is built from the two JSON manifests the dashboard's
//! asset tooling writes:
//!
//! ```text
//! gacha manifest      { anime: { character: [ { path, rarity } ] } }
//! cosmetics manifest  { packs: { packId: { name, cost, items: [...], guaranteedRarity? } } }
//! ```
//!
//! A card id is the lowercased file stem of its image path, so
//! `Gacha/Demon Slayer/Nezuko/Nezuko-5.jpg` becomes `nezuko-5`. Stems must be
//! unique across the whole manifest; a clash fails the load.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::collection::CardDescriptor;
use crate::error::{GachaError, GachaResult};
use crate::fusion::FusionDef;
use crate::pack::{PackDef, PackItem};
use crate::rarity::Rarity;

/// Read-only content lookups used by the engines.
pub trait Catalog: Send + Sync {
    /// Every card of `rarity`.
    fn cards_by_rarity(&self, rarity: Rarity) -> Vec<CardDescriptor>;

    /// Any one card of `rarity`.
    fn lookup_by_rarity(&self, rarity: Rarity) -> Option<CardDescriptor> {
        self.cards_by_rarity(rarity).into_iter().next()
    }

    /// Pack definition by id.
    fn get_pack(&self, pack_id: &str) -> Option<PackDef>;

    /// Fusion tier by id.
    fn get_fusion_config(&self, fusion_type: &str) -> Option<FusionDef>;
}

#[derive(Deserialize)]
struct ManifestEntry {
    path: String,
    rarity: Rarity,
}

type GachaManifest = BTreeMap<String, BTreeMap<String, Vec<ManifestEntry>>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestPack {
    name: String,
    cost: u64,
    #[serde(default)]
    items: Vec<PackItem>,
    #[serde(default)]
    guaranteed_rarity: Option<Rarity>,
}

#[derive(Deserialize)]
struct CosmeticsManifest {
    #[serde(default)]
    packs: BTreeMap<String, ManifestPack>,
}

/// In-memory catalog, typically loaded from manifests.
#[derive(Clone, Debug)]
pub struct ManifestCatalog {
    by_rarity: BTreeMap<Rarity, Vec<CardDescriptor>>,
    card_ids: HashMap<String, Rarity>,
    packs: HashMap<String, PackDef>,
    fusions: HashMap<String, FusionDef>,
}

impl Default for ManifestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestCatalog {
    /// Empty card pool with the standard fusion tiers.
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self {
            by_rarity: BTreeMap::new(),
            card_ids: HashMap::new(),
            packs: HashMap::new(),
            fusions: HashMap::new(),
        };
        for def in FusionDef::standard_tiers() {
            catalog.add_fusion(def);
        }
        catalog
    }

    /// Adds a card. Returns false (and leaves the pool alone) for a known id.
    pub fn add_card(&mut self, card: CardDescriptor) -> bool {
        if self.card_ids.contains_key(&card.id) {
            return false;
        }
        self.card_ids.insert(card.id.clone(), card.rarity);
        self.by_rarity.entry(card.rarity).or_default().push(card);
        true
    }

    /// Adds or replaces a pack.
    pub fn add_pack(&mut self, pack: PackDef) {
        self.packs.insert(pack.id.clone(), pack);
    }

    /// Adds or replaces a fusion tier.
    pub fn add_fusion(&mut self, def: FusionDef) {
        self.fusions.insert(def.id.clone(), def);
    }

    /// Number of distinct cards.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.card_ids.len()
    }

    /// Number of packs.
    #[must_use]
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Builds a catalog from manifest JSON text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if either document fails to parse, including
    /// unknown rarity codes, or if two files share a card id (the lowercased
    /// file stem).
    pub fn from_manifests(gacha_json: &str, cosmetics_json: &str) -> GachaResult<Self> {
        let gacha: GachaManifest = serde_json::from_str(gacha_json)
            .map_err(|e| GachaError::InvalidConfig(format!("gacha manifest: {e}")))?;
        let cosmetics: CosmeticsManifest = serde_json::from_str(cosmetics_json)
            .map_err(|e| GachaError::InvalidConfig(format!("cosmetics manifest: {e}")))?;

        let mut catalog = Self::new();

        for (anime, characters) in gacha {
            for (character, entries) in characters {
                for entry in entries {
                    let Some(id) = card_id_from_path(&entry.path) else {
                        tracing::warn!(path = %entry.path, "manifest entry has no file name, skipped");
                        continue;
                    };
                    let card = CardDescriptor::new(
                        id.clone(),
                        character.clone(),
                        anime.clone(),
                        entry.rarity,
                        entry.path,
                    );
                    if !catalog.add_card(card) {
                        tracing::error!(card_id = %id, anime = %anime, character = %character, "card id clash in manifest");
                        return Err(GachaError::InvalidConfig(format!(
                            "card id {id} from {anime}/{character} is already taken; rename the file"
                        )));
                    }
                }
            }
        }

        for (id, pack) in cosmetics.packs {
            catalog.add_pack(PackDef {
                id,
                name: pack.name,
                cost: pack.cost,
                items: pack.items,
                guaranteed_rarity: pack.guaranteed_rarity,
            });
        }

        tracing::info!(
            cards = catalog.card_count(),
            packs = catalog.pack_count(),
            "manifest catalog built"
        );
        Ok(catalog)
    }

    /// Reads both manifests from disk.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a file is unreadable or malformed.
    pub fn load(gacha_path: impl AsRef<Path>, cosmetics_path: impl AsRef<Path>) -> GachaResult<Self> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|e| {
                GachaError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
            })
        };
        let gacha = read(gacha_path.as_ref())?;
        let cosmetics = read(cosmetics_path.as_ref())?;
        Self::from_manifests(&gacha, &cosmetics)
    }
}

impl Catalog for ManifestCatalog {
    fn cards_by_rarity(&self, rarity: Rarity) -> Vec<CardDescriptor> {
        self.by_rarity.get(&rarity).cloned().unwrap_or_default()
    }

    fn get_pack(&self, pack_id: &str) -> Option<PackDef> {
        self.packs.get(pack_id).cloned()
    }

    fn get_fusion_config(&self, fusion_type: &str) -> Option<FusionDef> {
        self.fusions.get(fusion_type).cloned()
    }
}

/// Lowercased file stem of a slash- or backslash-separated path.
fn card_id_from_path(path: &str) -> Option<String> {
    let file = path.rsplit(['/', '\\']).next()?;
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GACHA: &str = r#"{
        "Demon Slayer": {
            "Nezuko": [
                { "path": "Gacha/Demon Slayer/Nezuko/Nezuko-5.jpg", "rarity": 5 },
                { "path": "Gacha/Demon Slayer/Nezuko/Nezuko-2.png", "rarity": "2" }
            ],
            "Tanjiro": [
                { "path": "Gacha/Demon Slayer/Tanjiro/Tanjiro-P.webp", "rarity": "Prismatic" }
            ]
        }
    }"#;

    const COSMETICS: &str = r#"{
        "packs": {
            "sakura_pack": {
                "name": "Sakura Pack",
                "cost": 200,
                "guaranteedRarity": "epic",
                "items": [
                    { "id": "border-sakura", "name": "Sakura Border", "type": "border", "rarity": "common" },
                    { "id": "theme-sakura", "name": "Sakura Theme", "type": "theme", "rarity": "epic" }
                ]
            }
        }
    }"#;

    #[test]
    fn test_card_id_from_path() {
        assert_eq!(card_id_from_path("a/b/Nezuko-5.jpg").as_deref(), Some("nezuko-5"));
        assert_eq!(card_id_from_path("a\\b\\Gojo.P.png").as_deref(), Some("gojo.p"));
        assert_eq!(card_id_from_path("plain").as_deref(), Some("plain"));
        assert_eq!(card_id_from_path("dir/"), None);
    }

    #[test]
    fn test_from_manifests() {
        let catalog = ManifestCatalog::from_manifests(GACHA, COSMETICS).unwrap();

        assert_eq!(catalog.card_count(), 3);

        let legendary = catalog.cards_by_rarity(Rarity::Legendary);
        assert_eq!(legendary.len(), 1);
        assert_eq!(legendary[0].id, "nezuko-5");
        assert_eq!(legendary[0].name, "Nezuko");
        assert_eq!(legendary[0].anime, "Demon Slayer");

        assert_eq!(catalog.cards_by_rarity(Rarity::Common)[0].id, "nezuko-2");
        assert_eq!(catalog.lookup_by_rarity(Rarity::Prismatic).unwrap().id, "tanjiro-p");
        assert!(catalog.lookup_by_rarity(Rarity::Epic).is_none());

        let pack = catalog.get_pack("sakura_pack").unwrap();
        assert_eq!(pack.cost, 200);
        assert_eq!(pack.guaranteed_rarity, Some(Rarity::Epic));
        assert_eq!(pack.items[1].kind, "theme");
    }

    #[test]
    fn test_card_id_clash_rejected() {
        let clash = r#"{
            "Demon Slayer": {
                "Nezuko": [ { "path": "Gacha/Demon Slayer/Nezuko/1.jpg", "rarity": 5 } ]
            },
            "Chainsaw Man": {
                "Power": [ { "path": "Gacha/Chainsaw Man/Power/1.png", "rarity": 4 } ]
            }
        }"#;
        let err = ManifestCatalog::from_manifests(clash, COSMETICS).unwrap_err();
        assert!(matches!(err, GachaError::InvalidConfig(ref msg) if msg.contains("card id 1")));
    }

    #[test]
    fn test_standard_fusions_present() {
        let catalog = ManifestCatalog::new();
        for id in ["basic", "advanced", "elite", "prismatic"] {
            assert!(catalog.get_fusion_config(id).is_some(), "{id}");
        }
        assert!(catalog.get_fusion_config("mythic").is_none());
    }

    #[test]
    fn test_bad_rarity_rejected() {
        let bad = r#"{ "X": { "Y": [ { "path": "y.png", "rarity": 9 } ] } }"#;
        assert!(matches!(
            ManifestCatalog::from_manifests(bad, "{}"),
            Err(GachaError::InvalidConfig(_))
        ));
    }
}
