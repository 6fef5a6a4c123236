//! # Engine Settings
//!
//! Data-driven configuration for the forge: rarity tiers, archetypes, affixes,
//! level scaling, cache policy and pre-warm plan.
//!
//! Settings are plain serde structures, usually loaded from JSON once at
//! startup. [`EngineConfig::build_factory`] validates every table and turns
//! them into the immutable generation components.

use crate::cache::RefillPolicy;
use crate::config;
use crate::generation::{
    AffixCountRange, AffixDefinition, AffixLibrary, AffixValueRange, ArchetypeCatalog,
    ArchetypeDefinition, BaseStat, ItemFactory, LevelScaling, RarityTable, RarityTier,
};
use crate::items::{
    AffixPosition, ArchetypeClass, ArmorSlot, ItemKind, Rarity, StatKind, WeaponClass,
};
use crate::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of the pre-warm plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmEntry {
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub count: usize,
}

impl PrewarmEntry {
    pub fn new(kind: ItemKind, rarity: Rarity, count: usize) -> Self {
        Self { kind, rarity, count }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rarity tiers (rank, weight, multiplier, affix range, adjective)
    pub rarity_tiers: Vec<RarityTier>,
    /// Archetype catalog entries
    pub archetypes: Vec<ArchetypeDefinition>,
    /// Affix definitions
    pub affixes: Vec<AffixDefinition>,
    /// Per-level stat growth constant
    pub level_scaling: f64,
    /// Level cache templates are generated at
    pub template_level: u32,
    /// Level used by the kind-specific generate calls
    pub default_level: u32,
    /// When to replace a template handed out on a cache hit
    pub refill_policy: RefillPolicy,
    /// Seed an empty bucket with a copy of the item built on a miss
    pub seed_on_miss: bool,
    /// Deferred refills generated per pump
    pub refill_budget: usize,
    /// Tick period of the refill worker in milliseconds
    pub refill_interval_ms: u64,
    /// Most prefix (and most suffix) fragments shown in a name; all when unset
    pub name_affix_limit: Option<usize>,
    /// Buckets to pre-build at startup
    pub prewarm: Vec<PrewarmEntry>,
    /// Optional deterministic seed
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Parses a configuration from JSON. Missing fields fall back to the
    /// builtin defaults.
    pub fn from_json_str(json: &str) -> ForgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json_pretty(&self) -> ForgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns a copy with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates all tables and builds the item factory.
    pub fn build_factory(&self) -> ForgeResult<ItemFactory> {
        let rarity = RarityTable::new(self.rarity_tiers.clone())?;
        let archetypes = ArchetypeCatalog::new(self.archetypes.clone())?;
        let affixes = AffixLibrary::new(self.affixes.clone())?;
        let scaling = LevelScaling::new(self.level_scaling)?;

        for kind in ItemKind::all() {
            if archetypes.archetypes_for(kind).is_empty() {
                return Err(ForgeError::NoArchetypes(kind));
            }
        }

        for affix in affixes.definitions() {
            rarity.tier_for(affix.min_rarity).map_err(|_| {
                ForgeError::InvalidConfig(format!(
                    "affix {} requires {} which is not a configured tier",
                    affix.id, affix.min_rarity
                ))
            })?;
        }

        for entry in &self.prewarm {
            rarity.tier_for(entry.rarity)?;
        }

        if self.refill_budget == 0 {
            return Err(ForgeError::InvalidConfig(
                "refill_budget must be at least 1".to_string(),
            ));
        }
        if self.refill_interval_ms == 0 {
            return Err(ForgeError::InvalidConfig(
                "refill_interval_ms must be at least 1".to_string(),
            ));
        }

        if self.name_affix_limit == Some(0) {
            return Err(ForgeError::InvalidConfig(
                "name_affix_limit must be at least 1 when set".to_string(),
            ));
        }

        Ok(ItemFactory::new(rarity, archetypes, affixes, scaling)
            .with_name_affix_limit(self.name_affix_limit))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rarity_tiers: builtin::rarity_tiers(),
            archetypes: builtin::archetypes(),
            affixes: builtin::affixes(),
            level_scaling: config::DEFAULT_LEVEL_SCALING,
            template_level: config::DEFAULT_TEMPLATE_LEVEL,
            default_level: config::DEFAULT_ITEM_LEVEL,
            refill_policy: RefillPolicy::Immediate,
            seed_on_miss: true,
            refill_budget: config::DEFAULT_REFILL_BUDGET,
            refill_interval_ms: config::DEFAULT_REFILL_INTERVAL_MS,
            name_affix_limit: None,
            prewarm: builtin::prewarm(),
            seed: None,
        }
    }
}

/// Builtin data set: six rarity tiers, six weapon and six armor archetypes,
/// and an affix pool deep enough for every tier's budget.
pub mod builtin {
    use super::*;

    fn tier(
        rank: u8,
        name: &str,
        weight: f64,
        multiplier: f64,
        affixes: (usize, usize),
        adjective: &str,
    ) -> RarityTier {
        RarityTier {
            rank,
            name: name.to_string(),
            weight,
            stat_multiplier: multiplier,
            affix_count: AffixCountRange::new(affixes.0, affixes.1),
            adjective: adjective.to_string(),
        }
    }

    pub fn rarity_tiers() -> Vec<RarityTier> {
        vec![
            tier(0, "Common", 60.0, 1.0, (0, 1), "Plain"),
            tier(1, "Uncommon", 25.0, 1.15, (1, 2), "Fine"),
            tier(2, "Rare", 10.0, 1.35, (2, 3), "Superior"),
            tier(3, "Epic", 4.0, 1.6, (3, 4), "Exquisite"),
            tier(4, "Legendary", 0.9, 2.0, (4, 5), "Fabled"),
            tier(5, "Mythic", 0.1, 2.5, (5, 6), "Mythical"),
        ]
    }

    fn weapon(id: &str, class: WeaponClass, fragment: &str, stats: Vec<BaseStat>) -> ArchetypeDefinition {
        ArchetypeDefinition {
            id: id.to_string(),
            class: ArchetypeClass::Weapon(class),
            base_stats: stats,
            naming_fragment: fragment.to_string(),
        }
    }

    fn armor(id: &str, slot: ArmorSlot, fragment: &str, stats: Vec<BaseStat>) -> ArchetypeDefinition {
        ArchetypeDefinition {
            id: id.to_string(),
            class: ArchetypeClass::Armor(slot),
            base_stats: stats,
            naming_fragment: fragment.to_string(),
        }
    }

    fn damage(min: (f64, f64), max: (f64, f64), speed: (f64, f64)) -> Vec<BaseStat> {
        vec![
            BaseStat::new(StatKind::MinDamage, min.0, min.1),
            BaseStat::new(StatKind::MaxDamage, max.0, max.1),
            BaseStat::new(StatKind::AttackSpeed, speed.0, speed.1),
        ]
    }

    pub fn archetypes() -> Vec<ArchetypeDefinition> {
        use StatKind::{Armor, BlockChance};
        vec![
            weapon("longsword", WeaponClass::Sword, "Longsword", damage((4.0, 7.0), (8.0, 12.0), (1.1, 1.3))),
            weapon("battleaxe", WeaponClass::Axe, "Battleaxe", damage((6.0, 9.0), (11.0, 16.0), (0.9, 1.1))),
            weapon("warhammer", WeaponClass::Mace, "Warhammer", damage((7.0, 10.0), (12.0, 15.0), (0.8, 1.0))),
            weapon("dirk", WeaponClass::Dagger, "Dirk", damage((2.0, 4.0), (5.0, 7.0), (1.5, 1.8))),
            weapon("longbow", WeaponClass::Bow, "Longbow", damage((3.0, 6.0), (9.0, 13.0), (1.0, 1.2))),
            weapon("quarterstaff", WeaponClass::Staff, "Quarterstaff", damage((3.0, 5.0), (7.0, 10.0), (1.0, 1.2))),
            armor("helm", ArmorSlot::Head, "Helm", vec![BaseStat::new(Armor, 3.0, 6.0)]),
            armor("hauberk", ArmorSlot::Chest, "Hauberk", vec![BaseStat::new(Armor, 8.0, 14.0)]),
            armor("greaves", ArmorSlot::Legs, "Greaves", vec![BaseStat::new(Armor, 5.0, 9.0)]),
            armor("gauntlets", ArmorSlot::Hands, "Gauntlets", vec![BaseStat::new(Armor, 2.0, 4.0)]),
            armor("boots", ArmorSlot::Feet, "Boots", vec![BaseStat::new(Armor, 2.0, 5.0)]),
            armor(
                "kite_shield",
                ArmorSlot::Shield,
                "Kite Shield",
                vec![BaseStat::new(Armor, 6.0, 10.0), BaseStat::new(BlockChance, 10.0, 20.0)],
            ),
        ]
    }

    fn affix(
        id: &str,
        fragment: &str,
        position: AffixPosition,
        kinds: &[ItemKind],
        min_rarity: Rarity,
        value: AffixValueRange,
    ) -> AffixDefinition {
        AffixDefinition {
            id: id.to_string(),
            fragment: fragment.to_string(),
            position,
            kinds: kinds.to_vec(),
            min_rarity,
            value,
        }
    }

    pub fn affixes() -> Vec<AffixDefinition> {
        use AffixPosition::{Prefix, Suffix};
        use ItemKind::{Armor, Weapon};
        let flat = AffixValueRange::integer;
        let pct = AffixValueRange::percent;
        vec![
            // Weapon prefixes
            affix("sharp", "Sharp", Prefix, &[Weapon], Rarity::COMMON, flat(1.0, 4.0)),
            affix("keen", "Keen", Prefix, &[Weapon], Rarity::UNCOMMON, pct(1.0, 5.0)),
            affix("flaming", "Flaming", Prefix, &[Weapon], Rarity::RARE, flat(2.0, 8.0)),
            affix("vampiric", "Vampiric", Prefix, &[Weapon], Rarity::EPIC, pct(0.5, 3.0)),
            // Weapon suffixes
            affix("of_haste", "of Haste", Suffix, &[Weapon], Rarity::COMMON, pct(2.0, 10.0)),
            affix("of_the_bear", "of the Bear", Suffix, &[Weapon], Rarity::UNCOMMON, flat(1.0, 6.0)),
            affix("of_slaying", "of Slaying", Suffix, &[Weapon], Rarity::RARE, pct(5.0, 20.0)),
            affix("of_the_phoenix", "of the Phoenix", Suffix, &[Weapon], Rarity::LEGENDARY, flat(10.0, 30.0)),
            // Armor prefixes
            affix("sturdy", "Sturdy", Prefix, &[Armor], Rarity::COMMON, flat(2.0, 8.0)),
            affix("warded", "Warded", Prefix, &[Armor], Rarity::UNCOMMON, pct(2.0, 10.0)),
            affix("regenerating", "Regenerating", Prefix, &[Armor], Rarity::RARE, pct(0.5, 2.5)),
            affix("adamant", "Adamant", Prefix, &[Armor], Rarity::EPIC, pct(5.0, 15.0)),
            // Armor suffixes
            affix("of_vigor", "of Vigor", Suffix, &[Armor], Rarity::COMMON, flat(5.0, 25.0)),
            affix("of_evasion", "of Evasion", Suffix, &[Armor], Rarity::UNCOMMON, pct(1.0, 5.0)),
            affix("of_thorns", "of Thorns", Suffix, &[Armor], Rarity::RARE, flat(2.0, 10.0)),
            affix("of_the_titan", "of the Titan", Suffix, &[Armor], Rarity::LEGENDARY, flat(2.0, 8.0)),
            // Shared
            affix("of_fortune", "of Fortune", Suffix, &[Weapon, Armor], Rarity::UNCOMMON, pct(3.0, 12.0)),
        ]
    }

    /// Common and uncommon buckets are pre-built; rarer tiers fill lazily.
    pub fn prewarm() -> Vec<PrewarmEntry> {
        let mut plan = Vec::new();
        for kind in ItemKind::all() {
            plan.push(PrewarmEntry::new(kind, Rarity::COMMON, config::DEFAULT_PREWARM_COUNT));
            plan.push(PrewarmEntry::new(kind, Rarity::UNCOMMON, config::DEFAULT_PREWARM_COUNT / 2));
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_config_is_valid() {
        let config = EngineConfig::default();
        let factory = config.build_factory().unwrap();

        assert_eq!(factory.rarity_table().tiers().len(), 6);
        assert_eq!(factory.archetypes().archetypes_for(ItemKind::Weapon).len(), 6);
        assert_eq!(factory.archetypes().archetypes_for(ItemKind::Armor).len(), 6);
    }

    #[test]
    fn test_builtin_pool_covers_every_budget() {
        let config = EngineConfig::default();
        let factory = config.build_factory().unwrap();

        for kind in ItemKind::all() {
            for tier in factory.rarity_table().tiers() {
                let eligible = factory.affixes().eligible(kind, tier.rarity()).len();
                assert!(
                    eligible >= tier.affix_count.max,
                    "{} at {} has {} eligible affixes",
                    kind,
                    tier.name,
                    eligible
                );
            }
        }
    }

    #[test]
    fn test_prewarm_is_common_only() {
        let config = EngineConfig::default();
        assert!(config.prewarm.iter().all(|e| e.rarity <= Rarity::UNCOMMON));
        assert_eq!(config.prewarm.len(), 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "level_scaling": 0.2, "seed": 7, "refill_policy": "Deferred" }"#,
        )
        .unwrap();

        assert_eq!(config.level_scaling, 0.2);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.refill_policy, RefillPolicy::Deferred);
        assert_eq!(config.refill_budget, config::DEFAULT_REFILL_BUDGET);
        assert_eq!(config.rarity_tiers, builtin::rarity_tiers());
    }

    #[test]
    fn test_json_file_round_trip() {
        let config = EngineConfig::default().with_seed(99);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_pretty().unwrap().as_bytes())
            .unwrap();

        let loaded = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded.seed, Some(99));
        assert_eq!(loaded.archetypes.len(), config.archetypes.len());
        assert_eq!(loaded.affixes.len(), config.affixes.len());
        assert_eq!(loaded.prewarm, config.prewarm);
        assert!(loaded.build_factory().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ForgeError::Io(_)));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_malformed_json_is_serde_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ForgeError::Serde(_)));
    }

    #[test]
    fn test_empty_armor_catalog_rejected() {
        let mut config = EngineConfig::default();
        config.archetypes.retain(|a| a.kind() == ItemKind::Weapon);

        let err = config.build_factory().unwrap_err();
        assert!(matches!(err, ForgeError::NoArchetypes(ItemKind::Armor)));
    }

    #[test]
    fn test_affix_requiring_unknown_tier_rejected() {
        let mut config = EngineConfig::default();
        config.affixes[0].min_rarity = Rarity(12);
        assert!(config.build_factory().is_err());
    }

    #[test]
    fn test_prewarm_unknown_tier_rejected() {
        let mut config = EngineConfig::default();
        config.prewarm.push(PrewarmEntry::new(ItemKind::Weapon, Rarity(40), 3));
        let err = config.build_factory().unwrap_err();
        assert!(matches!(err, ForgeError::InvalidRarity { rank: 40, .. }));
    }

    #[test]
    fn test_negative_scaling_rejected() {
        let mut config = EngineConfig::default();
        config.level_scaling = -1.0;
        assert!(config.build_factory().is_err());
    }

    #[test]
    fn test_zero_refill_settings_rejected() {
        let mut config = EngineConfig::default();
        config.refill_budget = 0;
        assert!(matches!(config.build_factory(), Err(ForgeError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.refill_interval_ms = 0;
        assert!(matches!(config.build_factory(), Err(ForgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_name_affix_limit_reaches_factory() {
        let mut config = EngineConfig::default();
        assert_eq!(config.build_factory().unwrap().name_affix_limit(), None);

        config.name_affix_limit = Some(2);
        assert_eq!(config.build_factory().unwrap().name_affix_limit(), Some(2));

        config.name_affix_limit = Some(0);
        assert!(matches!(config.build_factory(), Err(ForgeError::InvalidConfig(_))));
    }
}
