//! # Affix Library
//!
//! Prefix and suffix bonuses, gated by item kind and minimum rarity.

use crate::generation::{utils, GenerationWarning};
use crate::items::{AffixPosition, ItemKind, Rarity, ResolvedAffix, ValuePrecision};
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Value range of an affix and the precision its rolls are rounded to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffixValueRange {
    pub lo: f64,
    pub hi: f64,
    pub precision: ValuePrecision,
}

impl AffixValueRange {
    pub fn integer(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            hi,
            precision: ValuePrecision::Integer,
        }
    }

    pub fn percent(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            hi,
            precision: ValuePrecision::OneDecimal,
        }
    }

    /// Rolls a uniform value and rounds it to the declared precision.
    pub fn roll(&self, rng: &mut StdRng) -> f64 {
        let raw = utils::roll_between(rng, self.lo, self.hi);
        self.precision.round(raw).clamp(self.lo, self.hi)
    }
}

/// Immutable affix catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffixDefinition {
    /// Affix type identifier
    pub id: String,
    /// Fragment placed in the display name ("Flaming", "of Haste")
    pub fragment: String,
    /// Prefix or suffix
    pub position: AffixPosition,
    /// Item kinds this affix can roll on
    pub kinds: Vec<ItemKind>,
    /// Lowest rarity this affix can roll at
    pub min_rarity: Rarity,
    /// Rolled value range
    pub value: AffixValueRange,
}

impl AffixDefinition {
    /// Whether this affix may roll on an item of `kind` at `rarity`.
    pub fn is_eligible(&self, kind: ItemKind, rarity: Rarity) -> bool {
        self.kinds.contains(&kind) && self.min_rarity <= rarity
    }

    /// Rolls a concrete value for this affix.
    pub fn resolve(&self, rng: &mut StdRng) -> ResolvedAffix {
        ResolvedAffix {
            id: self.id.clone(),
            fragment: self.fragment.clone(),
            position: self.position,
            value: self.value.roll(rng),
            precision: self.value.precision,
        }
    }

    fn validate(&self) -> ForgeResult<()> {
        let AffixValueRange { lo, hi, precision } = self.value;
        if self.fragment.trim().is_empty() {
            return Err(ForgeError::InvalidConfig(format!(
                "affix {} has an empty fragment",
                self.id
            )));
        }
        if self.kinds.is_empty() {
            return Err(ForgeError::InvalidConfig(format!(
                "affix {} is not eligible for any item kind",
                self.id
            )));
        }
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(ForgeError::InvalidConfig(format!(
                "affix {} has malformed value range [{}, {}]",
                self.id, lo, hi
            )));
        }
        if !precision.represents(lo) || !precision.represents(hi) {
            return Err(ForgeError::InvalidConfig(format!(
                "affix {} bounds [{}, {}] are not representable at {:?} precision",
                self.id, lo, hi, precision
            )));
        }
        Ok(())
    }
}

/// Pool of affix definitions.
#[derive(Debug, Clone, Default)]
pub struct AffixLibrary {
    definitions: Vec<AffixDefinition>,
}

impl AffixLibrary {
    /// Builds and validates a library. Affix ids must be unique.
    pub fn new(definitions: Vec<AffixDefinition>) -> ForgeResult<Self> {
        let mut ids = HashSet::new();
        for definition in &definitions {
            definition.validate()?;
            if !ids.insert(definition.id.as_str()) {
                return Err(ForgeError::InvalidConfig(format!(
                    "duplicate affix id {}",
                    definition.id
                )));
            }
        }
        Ok(Self { definitions })
    }

    /// Definitions eligible for a kind and rarity, in library order.
    pub fn eligible(&self, kind: ItemKind, rarity: Rarity) -> Vec<&AffixDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.is_eligible(kind, rarity))
            .collect()
    }

    /// Draws up to `count` distinct eligible affixes and rolls their values.
    ///
    /// Sampling is without replacement. When the eligible pool is smaller than
    /// `count`, every eligible affix is returned together with an
    /// exhaustion warning; the draw itself never fails.
    pub fn draw_affixes(
        &self,
        kind: ItemKind,
        rarity: Rarity,
        count: usize,
        rng: &mut StdRng,
    ) -> (Vec<ResolvedAffix>, Option<GenerationWarning>) {
        let pool = self.eligible(kind, rarity);

        let warning = if pool.len() < count {
            Some(GenerationWarning::AffixPoolExhausted {
                kind,
                rarity,
                requested: count,
                available: pool.len(),
            })
        } else {
            None
        };

        let picked: Vec<&AffixDefinition> = pool
            .choose_multiple(rng, count.min(pool.len()))
            .copied()
            .collect();
        let affixes = picked.into_iter().map(|d| d.resolve(rng)).collect();

        (affixes, warning)
    }

    pub fn definitions(&self) -> &[AffixDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affix(id: &str, position: AffixPosition, kinds: &[ItemKind], min: Rarity) -> AffixDefinition {
        AffixDefinition {
            id: id.to_string(),
            fragment: id.to_string(),
            position,
            kinds: kinds.to_vec(),
            min_rarity: min,
            value: AffixValueRange::integer(1.0, 10.0),
        }
    }

    fn library() -> AffixLibrary {
        use AffixPosition::*;
        use ItemKind::*;
        AffixLibrary::new(vec![
            affix("sharp", Prefix, &[Weapon], Rarity::COMMON),
            affix("keen", Prefix, &[Weapon], Rarity::RARE),
            affix("sturdy", Prefix, &[Armor], Rarity::COMMON),
            affix("of_haste", Suffix, &[Weapon], Rarity::UNCOMMON),
            affix("of_vigor", Suffix, &[Armor], Rarity::EPIC),
            affix("of_fortune", Suffix, &[Weapon, Armor], Rarity::COMMON),
        ])
        .unwrap()
    }

    #[test]
    fn test_eligibility_filters() {
        let library = library();
        let ids = |kind, rarity| -> Vec<String> {
            library
                .eligible(kind, rarity)
                .iter()
                .map(|d| d.id.clone())
                .collect()
        };

        assert_eq!(ids(ItemKind::Weapon, Rarity::COMMON), vec!["sharp", "of_fortune"]);
        assert_eq!(
            ids(ItemKind::Weapon, Rarity::RARE),
            vec!["sharp", "keen", "of_haste", "of_fortune"]
        );
        assert_eq!(ids(ItemKind::Armor, Rarity::RARE), vec!["sturdy", "of_fortune"]);
        assert_eq!(ids(ItemKind::Armor, Rarity::EPIC).len(), 3);
    }

    #[test]
    fn test_draw_is_distinct() {
        let library = library();
        let mut rng = utils::create_rng(12345);

        for _ in 0..200 {
            let (affixes, warning) = library.draw_affixes(ItemKind::Weapon, Rarity::RARE, 3, &mut rng);
            assert!(warning.is_none());
            assert_eq!(affixes.len(), 3);
            let unique: HashSet<_> = affixes.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_draw_exhaustion_returns_whole_pool() {
        let library = library();
        let mut rng = utils::create_rng(7);

        let (affixes, warning) = library.draw_affixes(ItemKind::Armor, Rarity::RARE, 5, &mut rng);
        assert_eq!(affixes.len(), 2);
        assert_eq!(
            warning,
            Some(GenerationWarning::AffixPoolExhausted {
                kind: ItemKind::Armor,
                rarity: Rarity::RARE,
                requested: 5,
                available: 2,
            })
        );
    }

    #[test]
    fn test_draw_zero() {
        let library = library();
        let mut rng = utils::create_rng(7);
        let (affixes, warning) = library.draw_affixes(ItemKind::Weapon, Rarity::MYTHIC, 0, &mut rng);
        assert!(affixes.is_empty());
        assert!(warning.is_none());
    }

    #[test]
    fn test_rolled_values_respect_precision() {
        let mut rng = utils::create_rng(3);
        let flat = AffixValueRange::integer(1.0, 6.0);
        let pct = AffixValueRange::percent(0.5, 3.5);

        for _ in 0..500 {
            let v = flat.roll(&mut rng);
            assert!((1.0..=6.0).contains(&v));
            assert_eq!(v.fract(), 0.0);

            let p = pct.roll(&mut rng);
            assert!((0.5..=3.5).contains(&p));
            assert!(ValuePrecision::OneDecimal.represents(p));
        }
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let mut inverted = affix("bad", AffixPosition::Prefix, &[ItemKind::Weapon], Rarity::COMMON);
        inverted.value = AffixValueRange::integer(5.0, 1.0);
        assert!(AffixLibrary::new(vec![inverted]).is_err());

        let mut imprecise = affix("bad", AffixPosition::Prefix, &[ItemKind::Weapon], Rarity::COMMON);
        imprecise.value = AffixValueRange::integer(1.5, 4.0);
        assert!(AffixLibrary::new(vec![imprecise]).is_err());

        let orphan = affix("bad", AffixPosition::Prefix, &[], Rarity::COMMON);
        assert!(AffixLibrary::new(vec![orphan]).is_err());

        let dup = affix("dup", AffixPosition::Suffix, &[ItemKind::Armor], Rarity::COMMON);
        assert!(AffixLibrary::new(vec![dup.clone(), dup]).is_err());
    }
}
