//! # Archetype Catalog
//!
//! Base stat ranges and naming fragments for every weapon and armor sub-type.

use crate::items::{ArchetypeClass, ItemKind, StatKind};
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Inclusive real range for a base stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatRange {
    pub lo: f64,
    pub hi: f64,
}

impl StatRange {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// One base stat an archetype rolls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseStat {
    pub stat: StatKind,
    pub range: StatRange,
}

impl BaseStat {
    pub fn new(stat: StatKind, lo: f64, hi: f64) -> Self {
        Self {
            stat,
            range: StatRange::new(lo, hi),
        }
    }
}

/// Immutable definition of an item sub-type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeDefinition {
    /// Unique archetype identifier
    pub id: String,
    /// Sub-type, which also fixes the item kind
    pub class: ArchetypeClass,
    /// Base stats rolled in declaration order
    pub base_stats: Vec<BaseStat>,
    /// Noun used in the display name ("Longsword")
    pub naming_fragment: String,
}

impl ArchetypeDefinition {
    /// Gets the item kind of this archetype.
    pub fn kind(&self) -> ItemKind {
        self.class.kind()
    }

    /// Gets the declared range for a stat.
    pub fn range_for(&self, stat: StatKind) -> Option<StatRange> {
        self.base_stats
            .iter()
            .find(|b| b.stat == stat)
            .map(|b| b.range)
    }

    fn validate(&self) -> ForgeResult<()> {
        if self.naming_fragment.trim().is_empty() {
            return Err(ForgeError::InvalidConfig(format!(
                "archetype {} has an empty naming fragment",
                self.id
            )));
        }
        if self.base_stats.is_empty() {
            return Err(ForgeError::InvalidConfig(format!(
                "archetype {} defines no base stats",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for base in &self.base_stats {
            let StatRange { lo, hi } = base.range;
            if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || lo > hi {
                return Err(ForgeError::InvalidConfig(format!(
                    "archetype {} has malformed {} range [{}, {}]",
                    self.id,
                    base.stat.label(),
                    lo,
                    hi
                )));
            }
            if !seen.insert(base.stat) {
                return Err(ForgeError::InvalidConfig(format!(
                    "archetype {} declares {} twice",
                    self.id,
                    base.stat.label()
                )));
            }
        }

        // Min damage must never be able to roll above max damage
        if let (Some(min), Some(max)) = (
            self.range_for(StatKind::MinDamage),
            self.range_for(StatKind::MaxDamage),
        ) {
            if min.hi > max.lo {
                return Err(ForgeError::InvalidConfig(format!(
                    "archetype {} min damage range overlaps max damage range",
                    self.id
                )));
            }
        }

        Ok(())
    }
}

/// Archetypes indexed by item kind.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeCatalog {
    by_kind: BTreeMap<ItemKind, Vec<ArchetypeDefinition>>,
}

impl ArchetypeCatalog {
    /// Builds and validates a catalog.
    ///
    /// A kind without archetypes is allowed here; asking for it later is a
    /// configuration error.
    pub fn new(archetypes: Vec<ArchetypeDefinition>) -> ForgeResult<Self> {
        let mut ids = HashSet::new();
        let mut by_kind: BTreeMap<ItemKind, Vec<ArchetypeDefinition>> = BTreeMap::new();

        for archetype in archetypes {
            archetype.validate()?;
            if !ids.insert(archetype.id.clone()) {
                return Err(ForgeError::InvalidConfig(format!(
                    "duplicate archetype id {}",
                    archetype.id
                )));
            }
            by_kind.entry(archetype.kind()).or_default().push(archetype);
        }

        Ok(Self { by_kind })
    }

    /// Selects an archetype uniformly among those registered for `kind`.
    pub fn pick_archetype(&self, kind: ItemKind, rng: &mut StdRng) -> ForgeResult<&ArchetypeDefinition> {
        self.archetypes_for(kind)
            .choose(rng)
            .ok_or(ForgeError::NoArchetypes(kind))
    }

    /// All archetypes registered for a kind (possibly empty).
    pub fn archetypes_for(&self, kind: ItemKind) -> &[ArchetypeDefinition] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds an archetype by identifier.
    pub fn get(&self, id: &str) -> Option<&ArchetypeDefinition> {
        self.by_kind.values().flatten().find(|a| a.id == id)
    }

    /// Kinds with at least one archetype.
    pub fn kinds(&self) -> impl Iterator<Item = ItemKind> + '_ {
        self.by_kind.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
