//! # Generation Module
//!
//! Procedural item generation: rarity tiers, archetypes, affixes and the
//! factory that combines them.
//!
//! Every generator takes an explicit `StdRng` handle. Nothing in this module
//! touches a global random source, so a fixed seed always reproduces the same
//! rolls and concurrent callers never share generator state.

pub mod affixes;
pub mod archetypes;
pub mod factory;
pub mod rarity;

pub use affixes::*;
pub use archetypes::*;
pub use factory::*;
pub use rarity::*;

use crate::items::{ItemInstance, ItemKind, Rarity};
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single item generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRequest {
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub level: u32,
}

impl ItemRequest {
    /// Creates a new request.
    pub fn new(kind: ItemKind, rarity: Rarity, level: u32) -> Self {
        Self { kind, rarity, level }
    }
}

/// Non-fatal conditions raised while generating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationWarning {
    /// Fewer eligible affixes existed than the tier asked for
    AffixPoolExhausted {
        kind: ItemKind,
        rarity: Rarity,
        requested: usize,
        available: usize,
    },
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationWarning::AffixPoolExhausted {
                kind,
                rarity,
                requested,
                available,
            } => write!(
                f,
                "affix pool exhausted for {} at {}: requested {}, only {} eligible",
                kind, rarity, requested, available
            ),
        }
    }
}

/// A generated item together with any warnings raised while rolling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generated {
    pub item: ItemInstance,
    pub warnings: Vec<GenerationWarning>,
}

impl Generated {
    /// Wraps an item that was rolled without warnings.
    pub fn clean(item: ItemInstance) -> Self {
        Self {
            item,
            warnings: Vec::new(),
        }
    }

    /// Whether the affix pool ran short for this item.
    pub fn is_exhausted(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, GenerationWarning::AffixPoolExhausted { .. }))
    }
}

/// Linear level scaling shared by every stat of an item.
///
/// # Examples
///
/// ```
/// use item_forge::LevelScaling;
///
/// let scaling = LevelScaling::new(0.1).unwrap();
/// assert_eq!(scaling.factor(0), 1.0);
/// assert_eq!(scaling.factor(10), 2.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelScaling {
    per_level: f64,
}

impl LevelScaling {
    /// Creates a scaling curve `1 + level * per_level`.
    pub fn new(per_level: f64) -> ForgeResult<Self> {
        if !per_level.is_finite() || per_level < 0.0 {
            return Err(ForgeError::InvalidConfig(format!(
                "level scaling constant must be finite and non-negative, got {}",
                per_level
            )));
        }
        Ok(Self { per_level })
    }

    /// Gets the multiplier for a level. Always at least 1.0.
    pub fn factor(&self, level: u32) -> f64 {
        1.0 + level as f64 * self.per_level
    }

    /// Gets the per-level constant.
    pub fn per_level(&self) -> f64 {
        self.per_level
    }
}

/// Trait for procedural generators.
///
/// Generators are stateless with respect to callers: all variation comes from
/// the request and the random number generator handed in.
pub trait Generator<T> {
    /// Generates content for the request using the provided random number generator.
    fn generate(&self, request: &ItemRequest, rng: &mut StdRng) -> ForgeResult<T>;

    /// Validates that generated content meets the generator's guarantees.
    fn validate(&self, content: &T, request: &ItemRequest) -> ForgeResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Hands out independent per-call random number generators.
///
/// Each call to [`RngSource::next_rng`] derives a fresh `StdRng` from the base
/// seed and an atomic call counter. Callers on different threads never share
/// a generator, and a fixed seed with a fixed call order replays exactly.
#[derive(Debug)]
pub struct RngSource {
    base_seed: u64,
    counter: AtomicU64,
}

impl RngSource {
    /// Creates a source from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            base_seed: seed,
            counter: AtomicU64::new(0),
        }
    }

    /// Creates a source from entropy.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Creates a source from an optional seed.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Gets the next per-call generator.
    pub fn next_rng(&self) -> StdRng {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        StdRng::seed_from_u64(utils::mix_seed(self.base_seed, n))
    }

    /// Gets the base seed.
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;
    use rand::Rng;

    /// Creates a seeded random number generator.
    pub fn create_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Mixes a base seed with a stream index (splitmix64 finalizer).
    pub fn mix_seed(base: u64, stream: u64) -> u64 {
        let mut z = base ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform real in `[lo, hi]`, degenerate ranges return `lo`.
    pub fn roll_between(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + rng.gen::<f64>() * (hi - lo)
    }
}
