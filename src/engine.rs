//! # Item Engine
//!
//! The entry point collaborators hold on to: loot systems, drop spawners and
//! admin tools construct one engine at startup and pass it around by
//! reference or `Arc`.
//!
//! The engine owns the validated configuration, the stateless factory and the
//! shared cache. There is no global instance.

use crate::cache::{
    spawn_refill_worker, spawn_warm, CacheOptions, CacheStats, CancelToken, GenerationCache,
    RefillPolicy, WarmReport,
};
use crate::generation::{Generated, ItemFactory, ItemRequest, RngSource};
use crate::items::{ItemKind, Rarity};
use crate::settings::{EngineConfig, PrewarmEntry};
use crate::ForgeResult;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Item generation engine: factory plus hybrid cache.
#[derive(Debug, Clone)]
pub struct ItemEngine {
    config: Arc<EngineConfig>,
    cache: Arc<GenerationCache>,
}

impl ItemEngine {
    /// Validates `config` and builds the engine. Buckets start empty; call
    /// [`ItemEngine::warm_configured`] or [`ItemEngine::spawn_warm_configured`]
    /// to pre-build the configured buckets.
    pub fn new(config: EngineConfig) -> ForgeResult<Self> {
        let factory = Arc::new(config.build_factory()?);
        let options = CacheOptions {
            refill_policy: config.refill_policy,
            seed_on_miss: config.seed_on_miss,
            template_level: config.template_level,
        };
        let cache = GenerationCache::new(factory, RngSource::from_seed(config.seed), options);

        info!(
            "Item engine ready: {} archetypes, {} affixes, {} rarity tiers{}",
            cache.factory().archetypes().len(),
            cache.factory().affixes().len(),
            cache.factory().rarity_table().tiers().len(),
            match config.seed {
                Some(seed) => format!(", seed {}", seed),
                None => String::new(),
            }
        );

        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
        })
    }

    /// Builtin configuration with a fixed seed.
    pub fn with_seed(seed: u64) -> ForgeResult<Self> {
        Self::new(EngineConfig::default().with_seed(seed))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<GenerationCache> {
        &self.cache
    }

    pub fn factory(&self) -> &Arc<ItemFactory> {
        self.cache.factory()
    }

    /// Generates an item directly, bypassing the cache.
    pub fn generate(&self, kind: ItemKind, rarity: Rarity, level: u32) -> ForgeResult<Generated> {
        let request = ItemRequest::new(kind, rarity, level);
        self.factory()
            .generate_item(&request, &mut self.cache.next_rng())
    }

    /// Generates a weapon at the configured default level.
    pub fn generate_weapon(&self, rarity: Rarity) -> ForgeResult<Generated> {
        self.generate(ItemKind::Weapon, rarity, self.config.default_level)
    }

    /// Generates an armor piece at the configured default level.
    pub fn generate_armor(&self, rarity: Rarity) -> ForgeResult<Generated> {
        self.generate(ItemKind::Armor, rarity, self.config.default_level)
    }

    /// Serves an item through the cache at the configured default level.
    pub fn get_or_generate_item(&self, rarity: Rarity, kind: ItemKind) -> ForgeResult<Generated> {
        self.cache
            .get_or_generate(kind, rarity, self.config.default_level)
    }

    /// Serves an item through the cache at a specific level.
    pub fn get_or_generate(&self, kind: ItemKind, rarity: Rarity, level: u32) -> ForgeResult<Generated> {
        self.cache.get_or_generate(kind, rarity, level)
    }

    /// Rolls a rarity from the weighted tier table.
    pub fn roll_rarity(&self) -> Rarity {
        self.factory()
            .rarity_table()
            .select_rarity(&mut self.cache.next_rng())
            .rarity()
    }

    /// Rolls a weighted rarity and serves an item of that rarity.
    pub fn random_drop(&self, kind: ItemKind, level: u32) -> ForgeResult<Generated> {
        let rarity = self.roll_rarity();
        self.cache.get_or_generate(kind, rarity, level)
    }

    /// Pre-builds `count` templates for one bucket.
    pub fn warm_pool(&self, kind: ItemKind, rarity: Rarity, count: usize) -> ForgeResult<WarmReport> {
        self.cache.warm(kind, rarity, count)
    }

    /// Warms every entry of a plan on the calling thread.
    pub fn warm_all(&self, plan: &[PrewarmEntry]) -> ForgeResult<WarmReport> {
        self.cache.warm_all(plan, &CancelToken::new())
    }

    /// Warms the configured pre-warm plan on the calling thread.
    pub fn warm_configured(&self) -> ForgeResult<WarmReport> {
        self.warm_all(&self.config.prewarm)
    }

    /// Warms the configured pre-warm plan on tokio's blocking pool.
    pub fn spawn_warm_configured(&self, token: CancelToken) -> JoinHandle<ForgeResult<WarmReport>> {
        spawn_warm(self.cache.clone(), self.config.prewarm.clone(), token)
    }

    /// Generates up to `budget` pending refills, or the configured
    /// `refill_budget` when `None`. Returns the number generated.
    ///
    /// Hosts running the `Deferred` policy without a refill worker call this
    /// once per frame or tick.
    pub fn pump_refills(&self, budget: Option<usize>) -> usize {
        self.cache
            .pump_refills(budget.unwrap_or(self.config.refill_budget))
    }

    /// Starts the background refill worker with the configured period and
    /// budget. Resolves to the number of refills once `token` is cancelled.
    pub fn spawn_refill_worker_configured(&self, token: CancelToken) -> JoinHandle<usize> {
        if self.config.refill_policy == RefillPolicy::Immediate {
            info!("Refill worker started with the Immediate policy; it will find nothing pending");
        }
        spawn_refill_worker(
            self.cache.clone(),
            Duration::from_millis(self.config.refill_interval_ms),
            self.config.refill_budget,
            token,
        )
    }

    /// Gets hit/miss/template statistics for one bucket.
    pub fn get_cache_stats(&self, kind: ItemKind, rarity: Rarity) -> ForgeResult<CacheStats> {
        self.cache.stats(kind, rarity)
    }
}
