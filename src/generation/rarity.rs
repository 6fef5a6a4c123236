//! # Rarity Tiers
//!
//! Weighted rarity selection plus the per-tier stat multiplier and affix budget.

use crate::items::Rarity;
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive affix count range for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffixCountRange {
    pub min: usize,
    pub max: usize,
}

impl AffixCountRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Width of the range (`max - min`).
    pub fn span(&self) -> usize {
        self.max.saturating_sub(self.min)
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && count <= self.max
    }
}

/// One configured rarity tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityTier {
    /// Ordinal rank, 0 is the most common
    pub rank: u8,
    /// Display name (Common, Rare, ...)
    pub name: String,
    /// Relative selection weight
    pub weight: f64,
    /// Multiplier applied to every base stat
    pub stat_multiplier: f64,
    /// How many affixes items of this tier roll
    pub affix_count: AffixCountRange,
    /// Adjective used in the name of items without affixes
    pub adjective: String,
}

impl RarityTier {
    /// Gets this tier's rarity rank.
    pub fn rarity(&self) -> Rarity {
        Rarity(self.rank)
    }
}

/// Weighted distribution over rarity tiers.
///
/// Tiers are stored in rank order together with their cumulative weight
/// ladder, which makes selection a single scan.
#[derive(Debug, Clone)]
pub struct RarityTable {
    tiers: Vec<RarityTier>,
    ladder: Vec<f64>,
    total_weight: f64,
}

impl RarityTable {
    /// Builds and validates a table.
    ///
    /// Tiers may be given in any order but their ranks must form `0..n`.
    /// Weights must be positive and finite, multipliers at least 1.0 and
    /// non-decreasing with rank, and each affix range well-formed.
    pub fn new(mut tiers: Vec<RarityTier>) -> ForgeResult<Self> {
        if tiers.is_empty() {
            return Err(ForgeError::InvalidConfig(
                "rarity table has no tiers".to_string(),
            ));
        }
        if tiers.len() > u8::MAX as usize + 1 {
            return Err(ForgeError::InvalidConfig(format!(
                "rarity table has {} tiers, at most 256 are supported",
                tiers.len()
            )));
        }

        tiers.sort_by_key(|t| t.rank);

        let mut ladder = Vec::with_capacity(tiers.len());
        let mut total_weight = 0.0;
        let mut previous_multiplier = 1.0;

        for (index, tier) in tiers.iter().enumerate() {
            if tier.rank as usize != index {
                return Err(ForgeError::InvalidConfig(format!(
                    "rarity ranks must be contiguous from 0, found rank {} at position {}",
                    tier.rank, index
                )));
            }
            if !tier.weight.is_finite() || tier.weight <= 0.0 {
                return Err(ForgeError::InvalidConfig(format!(
                    "tier {} has non-positive weight {}",
                    tier.name, tier.weight
                )));
            }
            if !tier.stat_multiplier.is_finite() || tier.stat_multiplier < 1.0 {
                return Err(ForgeError::InvalidConfig(format!(
                    "tier {} has stat multiplier {} below 1.0",
                    tier.name, tier.stat_multiplier
                )));
            }
            if tier.stat_multiplier < previous_multiplier {
                return Err(ForgeError::InvalidConfig(format!(
                    "tier {} multiplier {} is lower than the previous tier's {}",
                    tier.name, tier.stat_multiplier, previous_multiplier
                )));
            }
            if tier.affix_count.min > tier.affix_count.max {
                return Err(ForgeError::InvalidConfig(format!(
                    "tier {} affix range [{}, {}] is inverted",
                    tier.name, tier.affix_count.min, tier.affix_count.max
                )));
            }

            previous_multiplier = tier.stat_multiplier;
            total_weight += tier.weight;
            ladder.push(total_weight);
        }

        Ok(Self {
            tiers,
            ladder,
            total_weight,
        })
    }

    /// Performs weighted random selection over the tiers.
    pub fn select_rarity(&self, rng: &mut StdRng) -> &RarityTier {
        let draw = rng.gen::<f64>() * self.total_weight;
        self.tier_for_draw(draw)
    }

    /// Maps a draw in `[0, total_weight)` onto the ladder.
    ///
    /// Returns the first tier, in ascending rank, whose cumulative upper bound
    /// exceeds the draw. Draws at or past the total land on the last tier.
    pub fn tier_for_draw(&self, draw: f64) -> &RarityTier {
        let index = self
            .ladder
            .iter()
            .position(|&upper| upper > draw)
            .unwrap_or(self.tiers.len() - 1);
        &self.tiers[index]
    }

    /// Looks up the tier for a rarity rank.
    pub fn tier_for(&self, rarity: Rarity) -> ForgeResult<&RarityTier> {
        self.tiers
            .get(rarity.0 as usize)
            .ok_or(ForgeError::InvalidRarity {
                rank: rarity.0,
                max_rank: self.max_rarity().0,
            })
    }

    /// Finds a tier by case-insensitive name.
    pub fn tier_by_name(&self, name: &str) -> Option<&RarityTier> {
        self.tiers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Gets the highest configured rarity.
    pub fn max_rarity(&self) -> Rarity {
        Rarity((self.tiers.len() - 1) as u8)
    }

    /// All tiers in rank order.
    pub fn tiers(&self) -> &[RarityTier] {
        &self.tiers
    }

    /// All configured rarities in rank order.
    pub fn rarities(&self) -> impl Iterator<Item = Rarity> + '_ {
        self.tiers.iter().map(RarityTier::rarity)
    }

    /// Sum of all tier weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}
