//! Card catalog: the static, validated lookup every battle reads from.
//!
//! Definitions are immutable during play. The whole catalog must validate
//! before the service mounts a single route; one malformed definition blocks
//! the load (see `rocket_initialize`, which panics on a `CatalogError`).

mod cards;

use std::collections::HashMap;

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

pub use cards::{builtin_cards, location_for};

/// One of exactly two sides of the war. West pushes the slider toward +6,
/// East toward -6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Faction {
    West,
    East,
}

impl Faction {
    pub fn opponent(&self) -> Faction {
        match self {
            Faction::West => Faction::East,
            Faction::East => Faction::West,
        }
    }

    /// Direction this faction moves the war slider.
    pub fn slider_direction(&self) -> i64 {
        match self {
            Faction::West => 1,
            Faction::East => -1,
        }
    }

    /// Lowercase form used in store keys (`leaderboard:west`).
    pub fn as_key(&self) -> &'static str {
        match self {
            Faction::West => "west",
            Faction::East => "east",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Faction::West => "West",
            Faction::East => "East",
        }
    }

    pub fn parse(value: &str) -> Option<Faction> {
        match value.to_ascii_lowercase().as_str() {
            "west" => Some(Faction::West),
            "east" => Some(Faction::East),
            _ => None,
        }
    }
}

/// Terrain a battle is fought on. City and Fortress walls are what siege
/// equipment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum MapType {
    Plains,
    Forest,
    Mountains,
    Desert,
    City,
    Fortress,
}

impl MapType {
    pub fn grants_siege_bonus(&self) -> bool {
        matches!(self, MapType::City | MapType::Fortress)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MapType::Plains => "Plains",
            MapType::Forest => "Forest",
            MapType::Mountains => "Mountains",
            MapType::Desert => "Desert",
            MapType::City => "City",
            MapType::Fortress => "Fortress",
        }
    }

    pub fn all() -> [MapType; 6] {
        [
            MapType::Plains,
            MapType::Forest,
            MapType::Mountains,
            MapType::Desert,
            MapType::City,
            MapType::Fortress,
        ]
    }
}

/// When in a skirmish an ability does its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum AbilityPhase {
    PreCombat,
    DuringCombat,
    PostCombat,
}

/// The seven combat modifiers a card can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Ability {
    /// +300 effective strength on City or Fortress maps.
    Siege,
    /// +200 effective strength when the opponent is stronger going in.
    Endurance,
    /// 70% chance to move first instead of the coin flip.
    FirstStrike,
    /// +100 effective strength when moving second.
    Reinforcement,
    /// Damage rolls never drop below half of effective strength.
    Precision,
    /// 20% chance to survive a killing blow at 1 soldier.
    LastStand,
    /// Deals 1 final damage when dying, which can take the opponent down too.
    PartingBlow,
}

impl Ability {
    pub fn phase(&self) -> AbilityPhase {
        match self {
            Ability::Siege
            | Ability::Endurance
            | Ability::FirstStrike
            | Ability::Reinforcement => AbilityPhase::PreCombat,
            Ability::Precision => AbilityPhase::DuringCombat,
            Ability::LastStand | Ability::PartingBlow => AbilityPhase::PostCombat,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Ability::Siege => "Siege",
            Ability::Endurance => "Endurance",
            Ability::FirstStrike => "First Strike",
            Ability::Reinforcement => "Reinforcement",
            Ability::Precision => "Precision",
            Ability::LastStand => "Last Stand",
            Ability::PartingBlow => "Parting Blow",
        }
    }
}

/// An immutable card definition. `soldiers` is the base strength a fresh
/// placement enters a battle with; `level` only gates collection rarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CardDef {
    pub id: String,
    pub name: String,
    pub faction: Faction,
    pub level: u8,
    pub soldiers: u32,
    pub ability: Option<Ability>,
    pub flavor: String,
}

/// Catalog validation failure. Any single one of these is fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog contains no cards")]
    Empty,
    #[error("duplicate card id '{0}'")]
    DuplicateId(String),
    #[error("card '{0}' has an empty name")]
    EmptyName(String),
    #[error("card '{id}' has non-positive strength {soldiers}")]
    InvalidStrength { id: String, soldiers: u32 },
    #[error("card '{id}' has level {level}, expected 1..=5")]
    InvalidLevel { id: String, level: u8 },
    #[error("faction {0:?} has no cards")]
    MissingFaction(Faction),
}

/// The validated card registry. Read-only during combat.
#[derive(Debug, Clone)]
pub struct Catalog {
    by_id: HashMap<String, CardDef>,
}

impl Catalog {
    /// Build and validate the built-in card set.
    pub fn load() -> Result<Catalog, CatalogError> {
        Catalog::from_cards(builtin_cards())
    }

    /// Build a catalog from explicit definitions, validating the lot.
    pub fn from_cards(cards: Vec<CardDef>) -> Result<Catalog, CatalogError> {
        if cards.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut by_id = HashMap::with_capacity(cards.len());
        let mut seen_west = false;
        let mut seen_east = false;
        for card in cards {
            if card.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(card.id));
            }
            if card.soldiers == 0 {
                return Err(CatalogError::InvalidStrength {
                    id: card.id,
                    soldiers: card.soldiers,
                });
            }
            if !(1..=5).contains(&card.level) {
                return Err(CatalogError::InvalidLevel {
                    id: card.id,
                    level: card.level,
                });
            }
            match card.faction {
                Faction::West => seen_west = true,
                Faction::East => seen_east = true,
            }
            if by_id.contains_key(&card.id) {
                return Err(CatalogError::DuplicateId(card.id));
            }
            by_id.insert(card.id.clone(), card);
        }
        if !seen_west {
            return Err(CatalogError::MissingFaction(Faction::West));
        }
        if !seen_east {
            return Err(CatalogError::MissingFaction(Faction::East));
        }
        Ok(Catalog { by_id })
    }

    pub fn get(&self, card_id: &str) -> Option<&CardDef> {
        self.by_id.get(card_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All cards of one faction, sorted by id for stable listings.
    pub fn faction_cards(&self, faction: Faction) -> Vec<&CardDef> {
        let mut cards: Vec<&CardDef> = self
            .by_id
            .values()
            .filter(|c| c.faction == faction)
            .collect();
        cards.sort_by(|a, b| a.id.cmp(&b.id));
        cards
    }
}
