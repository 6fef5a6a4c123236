//! Property tests for generation guarantees across the configuration space.

use item_forge::generation::utils;
use item_forge::{
    EngineConfig, Generator, ItemFactory, ItemKind, ItemRequest, Rarity, RefillPolicy,
};
use proptest::prelude::*;
use std::sync::OnceLock;

fn factory() -> &'static ItemFactory {
    static FACTORY: OnceLock<ItemFactory> = OnceLock::new();
    FACTORY.get_or_init(|| EngineConfig::default().build_factory().unwrap())
}

fn kind_strategy() -> impl Strategy<Value = ItemKind> {
    prop_oneof![Just(ItemKind::Weapon), Just(ItemKind::Armor)]
}

proptest! {
    #[test]
    fn stats_stay_within_scaled_bounds(
        seed in any::<u64>(),
        kind in kind_strategy(),
        rank in 0u8..6,
        level in 0u32..200,
    ) {
        let factory = factory();
        let request = ItemRequest::new(kind, Rarity(rank), level);
        let generated = factory.generate(&request, &mut utils::create_rng(seed)).unwrap();

        for (stat, value) in &generated.item.stats {
            let (lo, hi) = factory.stat_bounds(&generated.item.archetype, *stat, &request).unwrap();
            prop_assert!(*value >= lo - 1e-9 && *value <= hi + 1e-9,
                "{:?} = {} outside [{}, {}]", stat, value, lo, hi);
        }
    }

    #[test]
    fn affix_count_within_tier_budget(
        seed in any::<u64>(),
        kind in kind_strategy(),
        rank in 0u8..6,
    ) {
        let factory = factory();
        let tier = factory.rarity_table().tier_for(Rarity(rank)).unwrap();
        let request = ItemRequest::new(kind, Rarity(rank), 1);
        let generated = factory.generate(&request, &mut utils::create_rng(seed)).unwrap();

        // The builtin pool is deep enough for every budget
        prop_assert!(generated.warnings.is_empty());
        prop_assert!(tier.affix_count.contains(generated.item.affixes.len()));
        factory.validate(&generated, &request).unwrap();
    }

    #[test]
    fn same_seed_same_item(seed in any::<u64>(), kind in kind_strategy(), rank in 0u8..6) {
        let factory = factory();
        let request = ItemRequest::new(kind, Rarity(rank), 25);
        let a = factory.generate(&request, &mut utils::create_rng(seed)).unwrap();
        let b = factory.generate(&request, &mut utils::create_rng(seed)).unwrap();
        prop_assert_eq!(a.item, b.item);
    }

    #[test]
    fn cached_items_respect_requested_level(
        seed in any::<u64>(),
        kind in kind_strategy(),
        rank in 0u8..6,
        levels in proptest::collection::vec(0u32..120, 1..12),
    ) {
        let mut config = EngineConfig::default().with_seed(seed);
        config.refill_policy = RefillPolicy::Immediate;
        let engine = item_forge::ItemEngine::new(config).unwrap();
        engine.warm_pool(kind, Rarity(rank), 3).unwrap();

        for level in levels {
            let generated = engine.get_or_generate(kind, Rarity(rank), level).unwrap();
            let request = ItemRequest::new(kind, Rarity(rank), level);
            prop_assert_eq!(generated.item.level, level);
            engine.factory().validate(&generated, &request).unwrap();
        }
    }
}
