//! # Items Module
//!
//! Core item vocabulary shared by the generation and caching systems.
//!
//! This module contains the plain data types every other part of the forge
//! speaks in:
//! - Item kinds and archetype classes (sword, chest armor, ...)
//! - Rarity ranks and the stat fields an item can carry
//! - Rolled affixes and the finished `ItemInstance`
//!
//! Everything here is serializable so external consumers (editors, save
//! systems, loot UIs) can take a generated item as-is.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Top-level category of a generated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Weapon,
    Armor,
}

impl ItemKind {
    /// Returns both item kinds in a stable order.
    pub fn all() -> [ItemKind; 2] {
        [ItemKind::Weapon, ItemKind::Armor]
    }

    /// Lowercase label used in logs and the CLI.
    pub fn label(self) -> &'static str {
        match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Armor => "armor",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weapon archetype families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponClass {
    Sword,
    Axe,
    Mace,
    Dagger,
    Bow,
    Staff,
}

/// Body slots an armor archetype can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArmorSlot {
    Head,
    Chest,
    Legs,
    Hands,
    Feet,
    Shield,
}

/// Sub-type of an archetype. The item kind is implied by the variant.
///
/// # Examples
///
/// ```
/// use item_forge::{ArchetypeClass, ArmorSlot, ItemKind};
///
/// let class = ArchetypeClass::Armor(ArmorSlot::Chest);
/// assert_eq!(class.kind(), ItemKind::Armor);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArchetypeClass {
    Weapon(WeaponClass),
    Armor(ArmorSlot),
}

impl ArchetypeClass {
    /// Gets the item kind this class belongs to.
    pub fn kind(self) -> ItemKind {
        match self {
            ArchetypeClass::Weapon(_) => ItemKind::Weapon,
            ArchetypeClass::Armor(_) => ItemKind::Armor,
        }
    }
}

/// Rarity rank. Rank 0 is the most common tier; higher ranks are rarer.
///
/// Ranks are only meaningful against a configured rarity table, which decides
/// how many tiers exist. The named constants match the builtin six-tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rarity(pub u8);

impl Rarity {
    pub const COMMON: Rarity = Rarity(0);
    pub const UNCOMMON: Rarity = Rarity(1);
    pub const RARE: Rarity = Rarity(2);
    pub const EPIC: Rarity = Rarity(3);
    pub const LEGENDARY: Rarity = Rarity(4);
    pub const MYTHIC: Rarity = Rarity(5);

    /// Gets the numeric rank.
    pub fn rank(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {}", self.0)
    }
}

/// Stat fields an archetype can define base ranges for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatKind {
    MinDamage,
    MaxDamage,
    AttackSpeed,
    Armor,
    BlockChance,
}

impl StatKind {
    /// Human readable stat label.
    pub fn label(self) -> &'static str {
        match self {
            StatKind::MinDamage => "min damage",
            StatKind::MaxDamage => "max damage",
            StatKind::AttackSpeed => "attack speed",
            StatKind::Armor => "armor",
            StatKind::BlockChance => "block chance",
        }
    }
}

/// Where an affix's naming fragment goes in the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffixPosition {
    Prefix,
    Suffix,
}

/// Declared precision of an affix value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuePrecision {
    /// Flat stats, rounded to whole numbers
    Integer,
    /// Percentages, rounded to one decimal place
    OneDecimal,
}

impl ValuePrecision {
    /// Rounds a raw roll to this precision.
    ///
    /// # Examples
    ///
    /// ```
    /// use item_forge::ValuePrecision;
    ///
    /// assert_eq!(ValuePrecision::Integer.round(3.6), 4.0);
    /// assert_eq!(ValuePrecision::OneDecimal.round(2.34), 2.3);
    /// ```
    pub fn round(self, value: f64) -> f64 {
        match self {
            ValuePrecision::Integer => value.round(),
            ValuePrecision::OneDecimal => (value * 10.0).round() / 10.0,
        }
    }

    /// Checks that a value is exactly representable at this precision.
    pub fn represents(self, value: f64) -> bool {
        (self.round(value) - value).abs() < 1e-9
    }
}

/// An affix resolved to a concrete rolled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAffix {
    /// Affix type identifier from the library
    pub id: String,
    /// Naming fragment contributed to the display name
    pub fragment: String,
    /// Prefix or suffix
    pub position: AffixPosition,
    /// Rolled value, already rounded to `precision`
    pub value: f64,
    /// Precision the value was rounded to
    pub precision: ValuePrecision,
}

impl fmt::Display for ResolvedAffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            ValuePrecision::Integer => write!(f, "{} +{}", self.id, self.value),
            ValuePrecision::OneDecimal => write!(f, "{} +{:.1}%", self.id, self.value),
        }
    }
}

/// Item identifier, a v4-layout UUID.
///
/// Identifiers are drawn from the generator that rolled the item, so a seeded
/// engine replays the same identifiers in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Draws an identifier from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A generated weapon or armor piece.
///
/// Instances are plain owned values: cloning copies every field including the
/// affix list, so two holders never share mutable state. Once an instance
/// leaves the cache it belongs to its caller alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    /// Unique identifier for this instance
    pub id: ItemId,
    /// Composed display name
    pub name: String,
    /// Weapon or armor
    pub kind: ItemKind,
    /// Archetype this item was rolled from
    pub archetype: String,
    /// Archetype class (sword, chest, ...)
    pub class: ArchetypeClass,
    /// Rarity rank
    pub rarity: Rarity,
    /// Name of the rarity tier at generation time
    pub rarity_name: String,
    /// Required level, also the level stats are scaled for
    pub level: u32,
    /// Rolled and scaled stat values
    pub stats: BTreeMap<StatKind, f64>,
    /// Applied affixes in roll order
    pub affixes: Vec<ResolvedAffix>,
}

impl ItemInstance {
    /// Gets a stat value, if this item carries it.
    pub fn stat(&self, stat: StatKind) -> Option<f64> {
        self.stats.get(&stat).copied()
    }

    /// Deep copy with a freshly allocated identifier.
    ///
    /// Used whenever one roll has to live in two places (for example a
    /// returned item and the template seeded from it) so the identifier stays
    /// unique.
    pub fn reissued<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut copy = self.clone();
        copy.id = ItemId::generate(rng);
        copy
    }

    /// Compares every rolled field, ignoring the identifier.
    pub fn same_roll(&self, other: &ItemInstance) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.archetype == other.archetype
            && self.class == other.class
            && self.rarity == other.rarity
            && self.level == other.level
            && self.stats == other.stats
            && self.affixes == other.affixes
    }

    /// Number of prefix affixes.
    pub fn prefix_count(&self) -> usize {
        self.affixes
            .iter()
            .filter(|a| a.position == AffixPosition::Prefix)
            .count()
    }
}

impl fmt::Display for ItemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}, lvl {}]",
            self.name, self.rarity_name, self.kind, self.level
        )?;
        for (stat, value) in &self.stats {
            write!(f, " {}={:.2}", stat.label(), value)?;
        }
        for affix in &self.affixes {
            write!(f, " ({})", affix)?;
        }
        Ok(())
    }
}
