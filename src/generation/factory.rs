//! # Item Factory
//!
//! Rolls complete weapons and armor from the rarity table, archetype catalog
//! and affix library.
//!
//! The factory is stateless with respect to callers: it holds only immutable
//! tables, takes an explicit random number generator per call and never
//! touches the cache.

use crate::generation::{
    utils, AffixLibrary, ArchetypeCatalog, Generated, Generator, ItemRequest, LevelScaling,
    RarityTable,
};
use crate::items::{AffixPosition, ItemId, ItemInstance, StatKind};
use crate::{ForgeError, ForgeResult};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;

/// Slack allowed when checking float stats against their bounds.
const BOUND_EPSILON: f64 = 1e-9;

/// Stateless item generator.
#[derive(Debug, Clone)]
pub struct ItemFactory {
    rarity: RarityTable,
    archetypes: ArchetypeCatalog,
    affixes: AffixLibrary,
    scaling: LevelScaling,
    name_affix_limit: Option<usize>,
}

impl ItemFactory {
    /// Creates a factory from validated tables.
    pub fn new(
        rarity: RarityTable,
        archetypes: ArchetypeCatalog,
        affixes: AffixLibrary,
        scaling: LevelScaling,
    ) -> Self {
        Self {
            rarity,
            archetypes,
            affixes,
            scaling,
            name_affix_limit: None,
        }
    }

    /// Caps how many prefix and how many suffix fragments appear in a name.
    /// The item keeps every rolled affix either way.
    pub fn with_name_affix_limit(mut self, limit: Option<usize>) -> Self {
        self.name_affix_limit = limit;
        self
    }

    pub fn name_affix_limit(&self) -> Option<usize> {
        self.name_affix_limit
    }

    pub fn rarity_table(&self) -> &RarityTable {
        &self.rarity
    }

    pub fn archetypes(&self) -> &ArchetypeCatalog {
        &self.archetypes
    }

    pub fn affixes(&self) -> &AffixLibrary {
        &self.affixes
    }

    pub fn scaling(&self) -> LevelScaling {
        self.scaling
    }

    /// Rolls one item.
    ///
    /// Fails only on configuration errors (unknown rarity, no archetype for
    /// the kind). A short affix pool is reported as a warning on the result.
    pub fn generate_item(&self, request: &ItemRequest, rng: &mut StdRng) -> ForgeResult<Generated> {
        let tier = self.rarity.tier_for(request.rarity)?;
        let archetype = self.archetypes.pick_archetype(request.kind, rng)?;

        let level_factor = self.scaling.factor(request.level);
        let mut stats = BTreeMap::new();
        for base in &archetype.base_stats {
            let rolled = utils::roll_between(rng, base.range.lo, base.range.hi);
            stats.insert(base.stat, rolled * tier.stat_multiplier * level_factor);
        }

        let affix_count = tier.affix_count.min + rng.gen_range(0..=tier.affix_count.span());
        let (affixes, warning) = self
            .affixes
            .draw_affixes(request.kind, request.rarity, affix_count, rng);

        let name = if affixes.is_empty() {
            format!("{} {}", tier.adjective, archetype.naming_fragment)
        } else {
            let limit = self.name_affix_limit.unwrap_or(usize::MAX);
            let prefixes = affixes
                .iter()
                .filter(|a| a.position == AffixPosition::Prefix)
                .map(|a| a.fragment.as_str())
                .take(limit);
            let suffixes = affixes
                .iter()
                .filter(|a| a.position == AffixPosition::Suffix)
                .map(|a| a.fragment.as_str())
                .take(limit);
            prefixes
                .chain(std::iter::once(archetype.naming_fragment.as_str()))
                .chain(suffixes)
                .collect::<Vec<_>>()
                .join(" ")
        };

        let item = ItemInstance {
            id: ItemId::generate(rng),
            name,
            kind: request.kind,
            archetype: archetype.id.clone(),
            class: archetype.class,
            rarity: request.rarity,
            rarity_name: tier.name.clone(),
            level: request.level,
            stats,
            affixes,
        };

        debug!(
            "Generated {} ({} {}, lvl {}, {} affixes)",
            item.name,
            tier.name,
            request.kind,
            request.level,
            item.affixes.len()
        );

        let mut warnings = Vec::new();
        if let Some(warning) = warning {
            warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(Generated { item, warnings })
    }

    /// Rescales an item's stats to a new required level.
    ///
    /// Level scaling is a single shared multiplier, so moving between levels
    /// divides out the old factor and applies the new one. Affix values are
    /// not level scaled and stay as rolled.
    pub fn rescale(&self, item: &mut ItemInstance, level: u32) {
        if item.level == level {
            return;
        }
        let ratio = self.scaling.factor(level) / self.scaling.factor(item.level);
        for value in item.stats.values_mut() {
            *value *= ratio;
        }
        item.level = level;
    }

    /// Gets the inclusive bounds a stat may take for an archetype, rarity and level.
    pub fn stat_bounds(
        &self,
        archetype_id: &str,
        stat: StatKind,
        request: &ItemRequest,
    ) -> ForgeResult<(f64, f64)> {
        let tier = self.rarity.tier_for(request.rarity)?;
        let archetype = self.archetypes.get(archetype_id).ok_or_else(|| {
            ForgeError::InvalidConfig(format!("unknown archetype {}", archetype_id))
        })?;
        let range = archetype.range_for(stat).ok_or_else(|| {
            ForgeError::InvalidConfig(format!(
                "archetype {} has no {} stat",
                archetype_id,
                stat.label()
            ))
        })?;
        let scale = tier.stat_multiplier * self.scaling.factor(request.level);
        Ok((range.lo * scale, range.hi * scale))
    }
}

impl Generator<Generated> for ItemFactory {
    fn generate(&self, request: &ItemRequest, rng: &mut StdRng) -> ForgeResult<Generated> {
        self.generate_item(request, rng)
    }

    fn validate(&self, content: &Generated, request: &ItemRequest) -> ForgeResult<()> {
        let item = &content.item;
        let tier = self.rarity.tier_for(request.rarity)?;

        if item.kind != request.kind || item.rarity != request.rarity || item.level != request.level {
            return Err(ForgeError::InvalidConfig(format!(
                "item {} does not match request {:?}",
                item.id, request
            )));
        }

        for (stat, value) in &item.stats {
            let (lo, hi) = self.stat_bounds(&item.archetype, *stat, request)?;
            if *value < lo - BOUND_EPSILON || *value > hi + BOUND_EPSILON {
                return Err(ForgeError::InvalidConfig(format!(
                    "{} {} = {} outside [{}, {}]",
                    item.name,
                    stat.label(),
                    value,
                    lo,
                    hi
                )));
            }
        }

        let count = item.affixes.len();
        if count > tier.affix_count.max || (count < tier.affix_count.min && !content.is_exhausted()) {
            return Err(ForgeError::InvalidConfig(format!(
                "{} has {} affixes, tier {} allows [{}, {}]",
                item.name, count, tier.name, tier.affix_count.min, tier.affix_count.max
            )));
        }

        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "ItemFactory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{
        AffixCountRange, AffixDefinition, AffixValueRange, ArchetypeDefinition, BaseStat,
        GenerationWarning, RarityTier,
    };
    use crate::items::{ArchetypeClass, ArmorSlot, ItemKind, Rarity, WeaponClass};
    use std::collections::HashSet;

    fn tier(rank: u8, name: &str, multiplier: f64, min: usize, max: usize) -> RarityTier {
        RarityTier {
            rank,
            name: name.to_string(),
            weight: 1.0,
            stat_multiplier: multiplier,
            affix_count: AffixCountRange::new(min, max),
            adjective: format!("{}-grade", name),
        }
    }

    fn affix(id: &str, fragment: &str, position: AffixPosition, kind: ItemKind) -> AffixDefinition {
        AffixDefinition {
            id: id.to_string(),
            fragment: fragment.to_string(),
            position,
            kinds: vec![kind],
            min_rarity: Rarity::COMMON,
            value: AffixValueRange::percent(1.0, 5.0),
        }
    }

    fn factory() -> ItemFactory {
        let rarity = RarityTable::new(vec![
            tier(0, "Common", 1.0, 0, 0),
            tier(1, "Rare", 1.5, 2, 3),
            tier(2, "Mythic", 3.0, 5, 6),
        ])
        .unwrap();
        let archetypes = ArchetypeCatalog::new(vec![
            ArchetypeDefinition {
                id: "longsword".to_string(),
                class: ArchetypeClass::Weapon(WeaponClass::Sword),
                base_stats: vec![
                    BaseStat::new(StatKind::MinDamage, 3.0, 5.0),
                    BaseStat::new(StatKind::MaxDamage, 8.0, 12.0),
                    BaseStat::new(StatKind::AttackSpeed, 1.0, 1.2),
                ],
                naming_fragment: "Longsword".to_string(),
            },
            ArchetypeDefinition {
                id: "hauberk".to_string(),
                class: ArchetypeClass::Armor(ArmorSlot::Chest),
                base_stats: vec![BaseStat::new(StatKind::Armor, 8.0, 14.0)],
                naming_fragment: "Hauberk".to_string(),
            },
        ])
        .unwrap();
        let affixes = AffixLibrary::new(vec![
            affix("flaming", "Flaming", AffixPosition::Prefix, ItemKind::Weapon),
            affix("keen", "Keen", AffixPosition::Prefix, ItemKind::Weapon),
            affix("of_haste", "of Haste", AffixPosition::Suffix, ItemKind::Weapon),
            affix("of_slaying", "of Slaying", AffixPosition::Suffix, ItemKind::Weapon),
            affix("vicious", "Vicious", AffixPosition::Prefix, ItemKind::Weapon),
            affix("of_ruin", "of Ruin", AffixPosition::Suffix, ItemKind::Weapon),
            affix("sturdy", "Sturdy", AffixPosition::Prefix, ItemKind::Armor),
            affix("warded", "Warded", AffixPosition::Prefix, ItemKind::Armor),
            affix("of_vigor", "of Vigor", AffixPosition::Suffix, ItemKind::Armor),
            affix("of_thorns", "of Thorns", AffixPosition::Suffix, ItemKind::Armor),
        ])
        .unwrap();
        ItemFactory::new(rarity, archetypes, affixes, LevelScaling::new(0.1).unwrap())
    }

    #[test]
    fn test_generated_items_validate() {
        let factory = factory();
        let mut rng = utils::create_rng(12345);

        for kind in ItemKind::all() {
            for rank in 0..=2 {
                for level in [0, 1, 10, 50] {
                    let request = ItemRequest::new(kind, Rarity(rank), level);
                    let generated = factory.generate(&request, &mut rng).unwrap();
                    factory.validate(&generated, &request).unwrap();
                    assert_eq!(generated.item.kind, kind);
                }
            }
        }
    }

    #[test]
    fn test_stats_scale_with_rarity_and_level() {
        let factory = factory();
        let request = ItemRequest::new(ItemKind::Armor, Rarity(2), 10);
        let mut rng = utils::create_rng(5);

        let generated = factory.generate(&request, &mut rng).unwrap();
        let armor = generated.item.stat(StatKind::Armor).unwrap();
        // [8, 14] * 3.0 * (1 + 10 * 0.1)
        assert!((48.0..=84.0).contains(&armor), "armor {}", armor);
    }

    #[test]
    fn test_common_items_use_adjective() {
        let factory = factory();
        let mut rng = utils::create_rng(1);
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(0), 1);

        let generated = factory.generate(&request, &mut rng).unwrap();
        assert!(generated.item.affixes.is_empty());
        assert_eq!(generated.item.name, "Common-grade Longsword");
        assert_eq!(generated.item.rarity_name, "Common");
    }

    #[test]
    fn test_name_composition_orders_prefixes_and_suffixes() {
        let factory = factory();
        let mut rng = utils::create_rng(77);
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(1), 1);

        for _ in 0..50 {
            let item = factory.generate(&request, &mut rng).unwrap().item;
            let words: Vec<&str> = item.name.split(' ').collect();
            let noun = words.iter().position(|w| *w == "Longsword").unwrap();

            assert_eq!(noun, item.prefix_count());
            for affix in &item.affixes {
                let at = item.name.find(affix.fragment.as_str()).unwrap();
                let noun_at = item.name.find("Longsword").unwrap();
                match affix.position {
                    AffixPosition::Prefix => assert!(at < noun_at),
                    AffixPosition::Suffix => assert!(at > noun_at),
                }
            }
        }
    }

    #[test]
    fn test_name_affix_limit_shortens_names() {
        let capped = factory().with_name_affix_limit(Some(1));
        let mut rng = utils::create_rng(5);
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(2), 1);

        for _ in 0..50 {
            let item = capped.generate(&request, &mut rng).unwrap().item;
            let words: Vec<&str> = item.name.split(' ').collect();
            let noun = words.iter().position(|w| *w == "Longsword").unwrap();

            assert_eq!(noun, item.prefix_count().min(1));
            assert!(item.name.matches(" of ").count() <= 1);
            assert!(item.affixes.len() >= 5);
        }
    }

    #[test]
    fn test_exhaustion_yields_pool_and_warning() {
        let factory = factory();
        let mut rng = utils::create_rng(42);
        let request = ItemRequest::new(ItemKind::Armor, Rarity(2), 20);

        let generated = factory.generate(&request, &mut rng).unwrap();
        assert_eq!(generated.item.affixes.len(), 4);
        assert!(generated.is_exhausted());
        assert!(matches!(
            generated.warnings[0],
            GenerationWarning::AffixPoolExhausted { available: 4, .. }
        ));
        factory.validate(&generated, &request).unwrap();
    }

    #[test]
    fn test_same_seed_same_item() {
        let factory = factory();
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(2), 50);

        let first = factory
            .generate(&request, &mut utils::create_rng(42))
            .unwrap();
        let second = factory
            .generate(&request, &mut utils::create_rng(42))
            .unwrap();
        let other = factory
            .generate(&request, &mut utils::create_rng(43))
            .unwrap();

        assert_eq!(first.item, second.item);
        assert_eq!(first.warnings, second.warnings);
        assert_ne!(first.item.id, other.item.id);
    }

    #[test]
    fn test_ids_are_unique() {
        let factory = factory();
        let mut rng = utils::create_rng(9);
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(0), 1);

        let ids: HashSet<_> = (0..500)
            .map(|_| factory.generate(&request, &mut rng).unwrap().item.id)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_invalid_rarity_fails() {
        let factory = factory();
        let mut rng = utils::create_rng(9);
        let request = ItemRequest::new(ItemKind::Weapon, Rarity(99), 1);

        let err = factory.generate(&request, &mut rng).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidRarity { rank: 99, .. }));
    }

    #[test]
    fn test_rescale_round_trips_levels() {
        let factory = factory();
        let mut rng = utils::create_rng(3);
        let request = ItemRequest::new(ItemKind::Armor, Rarity(1), 1);
        let generated = factory.generate(&request, &mut rng).unwrap();

        let mut item = generated.item.clone();
        factory.rescale(&mut item, 30);
        assert_eq!(item.level, 30);
        let rescaled = Generated {
            item: item.clone(),
            warnings: generated.warnings.clone(),
        };
        factory
            .validate(&rescaled, &ItemRequest::new(ItemKind::Armor, Rarity(1), 30))
            .unwrap();

        factory.rescale(&mut item, 1);
        let before = generated.item.stat(StatKind::Armor).unwrap();
        let after = item.stat(StatKind::Armor).unwrap();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_tampered_stats() {
        let factory = factory();
        let mut rng = utils::create_rng(3);
        let request = ItemRequest::new(ItemKind::Armor, Rarity(0), 1);
        let mut generated = factory.generate(&request, &mut rng).unwrap();

        generated.item.stats.insert(StatKind::Armor, 1_000.0);
        assert!(factory.validate(&generated, &request).is_err());
        assert_eq!(factory.generator_type(), "ItemFactory");
    }
}
