//! # Generation Cache
//!
//! Per (kind, rarity) buckets of pre-built item templates.
//!
//! The cache serves hybrid generation: common buckets are warmed ahead of
//! demand, rare buckets fill lazily on their first miss. Each bucket holds its
//! own lock, so warming one bucket never blocks requests against another, and
//! its hit/miss counters are atomics readable without locking.
//!
//! Templates are single-use. A hit moves the template out of its bucket and
//! hands it to the caller, then a replacement is generated (immediately or on
//! the next pump, depending on [`RefillPolicy`]). No template is ever handed
//! to two callers.

pub mod background;

pub use background::*;

use crate::generation::{Generated, ItemFactory, ItemRequest, RngSource};
use crate::items::{ItemKind, Rarity};
use crate::settings::PrewarmEntry;
use crate::{config, ForgeError, ForgeResult};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// When a template consumed by a cache hit gets replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefillPolicy {
    /// Generate the replacement on the requesting thread, after the bucket
    /// lock is released.
    #[default]
    Immediate,
    /// Record a pending refill; [`GenerationCache::pump_refills`] or a refill
    /// worker generates it later.
    Deferred,
}

/// Lifecycle of a bucket. `Ready` only returns to `Empty` through an explicit
/// clear, even when every template has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketState {
    Empty,
    Warming,
    Ready,
}

/// Bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub kind: ItemKind,
    pub rarity: Rarity,
}

impl BucketKey {
    pub fn new(kind: ItemKind, rarity: Rarity) -> Self {
        Self { kind, rarity }
    }
}

/// Point-in-time statistics for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests served from a template
    pub hits: u64,
    /// Requests that fell through to on-demand generation
    pub misses: u64,
    /// Templates currently waiting in the bucket
    pub template_count: usize,
    /// Items generated for this bucket, templates and misses together
    pub generated: u64,
    /// Refills recorded but not yet generated
    pub pending_refills: u64,
    /// Bucket lifecycle state
    pub state: BucketState,
}

impl CacheStats {
    /// Fraction of requests served from templates.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct BucketSlots {
    templates: VecDeque<Generated>,
    state: BucketState,
    warmers: usize,
    seeded: bool,
}

/// One (kind, rarity) bucket.
#[derive(Debug)]
pub struct CacheBucket {
    slots: Mutex<BucketSlots>,
    hits: AtomicU64,
    misses: AtomicU64,
    generated: AtomicU64,
    pending_refills: AtomicU64,
}

impl CacheBucket {
    fn new() -> Self {
        Self {
            slots: Mutex::new(BucketSlots {
                templates: VecDeque::new(),
                state: BucketState::Empty,
                warmers: 0,
                seeded: false,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generated: AtomicU64::new(0),
            pending_refills: AtomicU64::new(0),
        }
    }

    fn pop(&self) -> Option<Generated> {
        self.slots.lock().templates.pop_front()
    }

    fn push(&self, template: Generated) {
        let mut slots = self.slots.lock();
        slots.templates.push_back(template);
        slots.seeded = true;
        if slots.warmers == 0 {
            slots.state = BucketState::Ready;
        }
    }

    fn begin_warm(&self) {
        let mut slots = self.slots.lock();
        slots.warmers += 1;
        slots.state = BucketState::Warming;
    }

    fn end_warm(&self) {
        let mut slots = self.slots.lock();
        slots.warmers = slots.warmers.saturating_sub(1);
        if slots.warmers == 0 {
            slots.state = if slots.seeded {
                BucketState::Ready
            } else {
                BucketState::Empty
            };
        }
    }

    /// Takes one pending refill if any is recorded.
    fn claim_refill(&self) -> bool {
        self.pending_refills
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let dropped = slots.templates.len();
        slots.templates.clear();
        slots.seeded = false;
        if slots.warmers == 0 {
            slots.state = BucketState::Empty;
        }
        self.pending_refills.store(0, Ordering::Release);
        dropped
    }

    fn stats(&self) -> CacheStats {
        let slots = self.slots.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Acquire),
            misses: self.misses.load(Ordering::Acquire),
            template_count: slots.templates.len(),
            generated: self.generated.load(Ordering::Acquire),
            pending_refills: self.pending_refills.load(Ordering::Acquire),
            state: slots.state,
        }
    }
}

/// Tunables for the cache, taken from the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub refill_policy: RefillPolicy,
    pub seed_on_miss: bool,
    pub template_level: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refill_policy: RefillPolicy::Immediate,
            seed_on_miss: true,
            template_level: config::DEFAULT_TEMPLATE_LEVEL,
        }
    }
}

/// Keyed template buckets in front of an [`ItemFactory`].
#[derive(Debug)]
pub struct GenerationCache {
    factory: Arc<ItemFactory>,
    rng: RngSource,
    buckets: BTreeMap<BucketKey, CacheBucket>,
    options: CacheOptions,
}

impl GenerationCache {
    /// Creates a cache with one empty bucket per configured kind and rarity.
    pub fn new(factory: Arc<ItemFactory>, rng: RngSource, options: CacheOptions) -> Self {
        let mut buckets = BTreeMap::new();
        let kinds: Vec<ItemKind> = factory.archetypes().kinds().collect();
        for kind in kinds {
            for rarity in factory.rarity_table().rarities() {
                buckets.insert(BucketKey::new(kind, rarity), CacheBucket::new());
            }
        }

        Self {
            factory,
            rng,
            buckets,
            options,
        }
    }

    pub fn factory(&self) -> &Arc<ItemFactory> {
        &self.factory
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Hands out a fresh per-call random number generator.
    pub fn next_rng(&self) -> StdRng {
        self.rng.next_rng()
    }

    /// All bucket keys in order.
    pub fn keys(&self) -> impl Iterator<Item = BucketKey> + '_ {
        self.buckets.keys().copied()
    }

    fn bucket(&self, kind: ItemKind, rarity: Rarity) -> ForgeResult<&CacheBucket> {
        if let Some(bucket) = self.buckets.get(&BucketKey::new(kind, rarity)) {
            return Ok(bucket);
        }
        // Report the more specific configuration problem
        self.factory.rarity_table().tier_for(rarity)?;
        Err(ForgeError::NoArchetypes(kind))
    }

    fn generate_template(&self, key: BucketKey, bucket: &CacheBucket) -> ForgeResult<Generated> {
        let request = ItemRequest::new(key.kind, key.rarity, self.options.template_level);
        let generated = self.factory.generate_item(&request, &mut self.next_rng())?;
        bucket.generated.fetch_add(1, Ordering::AcqRel);
        Ok(generated)
    }

    fn refill(&self, key: BucketKey, bucket: &CacheBucket) {
        match self.generate_template(key, bucket) {
            Ok(template) => bucket.push(template),
            Err(e) => warn!("Refill for {} {} failed: {}", key.kind, key.rarity, e),
        }
    }

    /// Serves an item of `kind` and `rarity` scaled to `level`.
    ///
    /// A hit moves a template out of the bucket; a miss generates on demand
    /// and, when `seed_on_miss` is set, seeds the bucket with a copy carrying
    /// its own identifier. Only configuration errors fail; a short affix pool
    /// comes back as a warning on the result.
    pub fn get_or_generate(&self, kind: ItemKind, rarity: Rarity, level: u32) -> ForgeResult<Generated> {
        let key = BucketKey::new(kind, rarity);
        let bucket = self.bucket(kind, rarity)?;

        if let Some(mut template) = bucket.pop() {
            bucket.hits.fetch_add(1, Ordering::AcqRel);
            debug!("Cache hit for {} {}", kind, rarity);

            match self.options.refill_policy {
                RefillPolicy::Immediate => self.refill(key, bucket),
                RefillPolicy::Deferred => {
                    bucket.pending_refills.fetch_add(1, Ordering::AcqRel);
                }
            }

            self.factory.rescale(&mut template.item, level);
            return Ok(template);
        }

        bucket.misses.fetch_add(1, Ordering::AcqRel);
        debug!("Cache miss for {} {}, generating on demand", kind, rarity);

        let request = ItemRequest::new(kind, rarity, level);
        let generated = self.factory.generate_item(&request, &mut self.next_rng())?;
        bucket.generated.fetch_add(1, Ordering::AcqRel);

        if self.options.seed_on_miss {
            let mut seed = generated.clone();
            seed.item = seed.item.reissued(&mut self.next_rng());
            self.factory.rescale(&mut seed.item, self.options.template_level);
            bucket.push(seed);
        }

        Ok(generated)
    }

    /// Appends `count` freshly generated templates to a bucket.
    pub fn warm(&self, kind: ItemKind, rarity: Rarity, count: usize) -> ForgeResult<WarmReport> {
        self.warm_with(kind, rarity, count, &CancelToken::new())
    }

    /// Like [`GenerationCache::warm`] but checks `token` between items.
    ///
    /// Templates are generated outside the bucket lock and pushed one at a
    /// time, so live requests interleave with warm-up. Cancelling leaves the
    /// templates produced so far in place.
    pub fn warm_with(
        &self,
        kind: ItemKind,
        rarity: Rarity,
        count: usize,
        token: &CancelToken,
    ) -> ForgeResult<WarmReport> {
        let mut report = WarmReport::new(count);
        self.warm_into(kind, rarity, count, token, &mut report)?;
        Ok(report)
    }

    /// Appends up to `count` templates, recording progress in `report`.
    ///
    /// On error `report` still counts every template pushed before the
    /// failure; those templates stay in the bucket.
    pub fn warm_into(
        &self,
        kind: ItemKind,
        rarity: Rarity,
        count: usize,
        token: &CancelToken,
        report: &mut WarmReport,
    ) -> ForgeResult<()> {
        let key = BucketKey::new(kind, rarity);
        let bucket = self.bucket(kind, rarity)?;
        let mut produced = 0;
        let mut outcome = Ok(());

        bucket.begin_warm();
        for _ in 0..count {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.generate_template(key, bucket) {
                Ok(template) => {
                    report.warnings.extend(template.warnings.iter().cloned());
                    bucket.push(template);
                    report.produced += 1;
                    produced += 1;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        bucket.end_warm();

        info!(
            "Warmed {} {}: {}/{} templates{}",
            kind,
            rarity,
            produced,
            count,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        outcome
    }

    /// Warms every entry of a plan in order.
    pub fn warm_all(&self, plan: &[PrewarmEntry], token: &CancelToken) -> ForgeResult<WarmReport> {
        let mut total = WarmReport::new(0);
        for entry in plan {
            let report = self.warm_with(entry.kind, entry.rarity, entry.count, token)?;
            total.merge(report);
            if total.cancelled {
                break;
            }
        }
        Ok(total)
    }

    /// Generates up to `budget` deferred refills across all buckets.
    ///
    /// Buckets are visited in key order; returns the number of templates
    /// produced.
    pub fn pump_refills(&self, budget: usize) -> usize {
        let mut produced = 0;
        for (key, bucket) in &self.buckets {
            while produced < budget && bucket.claim_refill() {
                self.refill(*key, bucket);
                produced += 1;
            }
            if produced >= budget {
                break;
            }
        }
        if produced > 0 {
            debug!("Pumped {} deferred refills", produced);
        }
        produced
    }

    /// Total refills waiting across all buckets.
    pub fn pending_refills(&self) -> u64 {
        self.buckets
            .values()
            .map(|b| b.pending_refills.load(Ordering::Acquire))
            .sum()
    }

    /// Gets statistics for one bucket.
    pub fn stats(&self, kind: ItemKind, rarity: Rarity) -> ForgeResult<CacheStats> {
        Ok(self.bucket(kind, rarity)?.stats())
    }

    /// Gets a bucket's lifecycle state.
    pub fn state(&self, kind: ItemKind, rarity: Rarity) -> ForgeResult<BucketState> {
        Ok(self.bucket(kind, rarity)?.stats().state)
    }

    /// Drops every template in a bucket and returns it to `Empty`.
    ///
    /// Hit and miss counters are kept. Returns the number of templates dropped.
    pub fn clear(&self, kind: ItemKind, rarity: Rarity) -> ForgeResult<usize> {
        let dropped = self.bucket(kind, rarity)?.clear();
        info!("Cleared {} {}: dropped {} templates", kind, rarity, dropped);
        Ok(dropped)
    }

    /// Clears every bucket.
    pub fn clear_all(&self) -> usize {
        let dropped = self.buckets.values().map(CacheBucket::clear).sum();
        info!("Cleared all buckets: dropped {} templates", dropped);
        dropped
    }

    /// Templates waiting across all buckets.
    pub fn total_templates(&self) -> usize {
        self.buckets
            .values()
            .map(|b| b.slots.lock().templates.len())
            .sum()
    }
}
