//! # Item Forge
//!
//! Hybrid procedural item generation and caching for weapons and armor.
//!
//! ## Architecture Overview
//!
//! The forge is built from small immutable tables and two active components:
//!
//! - **Rarity Table**: weighted tiers with stat multipliers and affix budgets
//! - **Archetype Catalog**: base stat ranges and naming fragments per item sub-type
//! - **Affix Library**: prefix/suffix bonuses gated by item kind and rarity
//! - **Item Factory**: stateless generator that rolls one item per request
//! - **Generation Cache**: per (kind, rarity) template buckets with hit/miss counters
//!
//! Common tiers are pre-built ahead of demand while rare tiers are generated
//! lazily on first request. Every item handed out is an owned value; the
//! cache never gives two callers the same instance.
//!
//! ## Determinism
//!
//! All randomness flows through explicitly passed `StdRng` handles. Given the
//! same seed and call sequence the forge rolls identical items (identifiers
//! aside, which are always unique).

pub mod cache;
pub mod engine;
pub mod generation;
pub mod items;
pub mod settings;

pub use cache::*;
pub use engine::*;
pub use generation::*;
pub use items::*;
pub use settings::*;

/// Core error type for the item forge.
#[derive(thiserror::Error, Debug)]
pub enum ForgeError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Rarity rank outside the configured tier table
    #[error("Invalid rarity rank {rank}: configured ranks are 0..={max_rank}")]
    InvalidRarity { rank: u8, max_rank: u8 },

    /// No archetype registered for an item kind
    #[error("No archetypes registered for kind {0}")]
    NoArchetypes(ItemKind),

    /// Configuration tables are malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ForgeError {
    /// Whether this error indicates a startup/configuration defect rather than
    /// an environmental failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ForgeError::InvalidRarity { .. }
                | ForgeError::NoArchetypes(_)
                | ForgeError::InvalidConfig(_)
        )
    }
}

/// Result type used throughout the forge.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine configuration constants.
pub mod config {
    /// Level templates are generated at
    pub const DEFAULT_TEMPLATE_LEVEL: u32 = 1;

    /// Level used by the kind-specific generate calls
    pub const DEFAULT_ITEM_LEVEL: u32 = 1;

    /// Per-level stat growth (k in `1 + level * k`)
    pub const DEFAULT_LEVEL_SCALING: f64 = 0.05;

    /// Templates pre-built for each warmed common bucket
    pub const DEFAULT_PREWARM_COUNT: usize = 32;

    /// Deferred refills generated per pump when no budget is given
    pub const DEFAULT_REFILL_BUDGET: usize = 8;

    /// Tick period of the background refill worker, in milliseconds
    pub const DEFAULT_REFILL_INTERVAL_MS: u64 = 16;
}
