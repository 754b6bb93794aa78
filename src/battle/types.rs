use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::catalog::{Faction, MapType};

/// Fixed slot count per faction. Slot vectors always hold exactly this many
/// entries; a filled slot never empties again, dead cards included.
pub const SLOTS_PER_FACTION: usize = 10;

/// Idle time after which a battle resolves on the next check.
pub const BATTLE_TIMEOUT_MS: i64 = 30 * 60 * 1000;

/// Bumped whenever the stored battle layout changes shape.
pub const BATTLE_SCHEMA_VERSION: u32 = 1;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A card as placed on the field. Catalog data stays in the catalog; this is
/// only the mutable battle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct BattleCard {
    pub card_id: String,
    pub owner: String,
    pub current_soldiers: u32,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum BattleStatus {
    Active,
    Completed,
    Stalemate,
}

/// Outcome handed to the war machine once a battle is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum BattleOutcome {
    Victory(Faction),
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Battle {
    pub version: u32,
    pub id: u64,
    /// The post this battle was opened for. External posting is out of our
    /// hands; we only keep the reference.
    pub post_id: String,
    pub map: MapType,
    pub location: String,
    pub status: BattleStatus,
    pub west_slots: Vec<Option<BattleCard>>,
    pub east_slots: Vec<Option<BattleCard>>,
    /// Every player who placed a card, mapped to the faction of their most
    /// recent placement. Reward classification reads this.
    pub participants: HashMap<String, Faction>,
    pub created_at: i64,
    pub last_activity: i64,
}

impl Battle {
    pub fn new(id: u64, post_id: String, map: MapType, location: String, now: i64) -> Battle {
        Battle {
            version: BATTLE_SCHEMA_VERSION,
            id,
            post_id,
            map,
            location,
            status: BattleStatus::Active,
            west_slots: vec![None; SLOTS_PER_FACTION],
            east_slots: vec![None; SLOTS_PER_FACTION],
            participants: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn slots(&self, faction: Faction) -> &[Option<BattleCard>] {
        match faction {
            Faction::West => &self.west_slots,
            Faction::East => &self.east_slots,
        }
    }

    pub fn slots_mut(&mut self, faction: Faction) -> &mut Vec<Option<BattleCard>> {
        match faction {
            Faction::West => &mut self.west_slots,
            Faction::East => &mut self.east_slots,
        }
    }

    pub fn first_empty_slot(&self, faction: Faction) -> Option<usize> {
        self.slots(faction).iter().position(|slot| slot.is_none())
    }

    /// Full means no empty slot on either side; alive flags play no part.
    pub fn is_full(&self) -> bool {
        self.first_empty_slot(Faction::West).is_none()
            && self.first_empty_slot(Faction::East).is_none()
    }

    pub fn living_cards(&self, faction: Faction) -> Vec<(usize, &BattleCard)> {
        self.slots(faction)
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|card| (idx, card)))
            .filter(|(_, card)| card.is_alive)
            .collect()
    }

    /// Surviving strength: soldiers summed over living cards only.
    pub fn faction_strength(&self, faction: Faction) -> u64 {
        self.living_cards(faction)
            .iter()
            .map(|(_, card)| card.current_soldiers as u64)
            .sum()
    }

    /// Last placement wins the player's faction association.
    pub fn record_participant(&mut self, player: &str, faction: Faction) {
        self.participants.insert(player.to_string(), faction);
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self)
            .map_err(|e| format!("Could not serialize battle {}: {e}", self.id))
    }

    pub fn from_json(raw: &str) -> Result<Battle, String> {
        let battle: Battle =
            serde_json::from_str(raw).map_err(|e| format!("Could not parse battle record: {e}"))?;
        if battle.version != BATTLE_SCHEMA_VERSION {
            return Err(format!(
                "Battle {} has schema version {}, expected {BATTLE_SCHEMA_VERSION}",
                battle.id, battle.version
            ));
        }
        Ok(battle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(owner: &str, soldiers: u32, alive: bool) -> BattleCard {
        BattleCard {
            card_id: "west_shield_levy".to_string(),
            owner: owner.to_string(),
            current_soldiers: soldiers,
            is_alive: alive,
        }
    }

    #[test]
    fn new_battle_has_ten_empty_slots_per_side() {
        let battle = Battle::new(1, "t3_abc".to_string(), MapType::Plains, "Millbrook".into(), 0);
        assert_eq!(battle.west_slots.len(), SLOTS_PER_FACTION);
        assert_eq!(battle.east_slots.len(), SLOTS_PER_FACTION);
        assert_eq!(battle.first_empty_slot(Faction::West), Some(0));
        assert!(!battle.is_full());
    }

    #[test]
    fn dead_cards_still_occupy_their_slot() {
        let mut battle =
            Battle::new(1, "t3_abc".to_string(), MapType::Plains, "Millbrook".into(), 0);
        battle.west_slots[0] = Some(card("anna", 0, false));
        assert_eq!(battle.first_empty_slot(Faction::West), Some(1));
        assert!(battle.living_cards(Faction::West).is_empty());
        assert_eq!(battle.faction_strength(Faction::West), 0);
    }

    #[test]
    fn strength_sums_only_the_living() {
        let mut battle =
            Battle::new(1, "t3_abc".to_string(), MapType::Plains, "Millbrook".into(), 0);
        battle.east_slots[0] = Some(card("bo", 400, true));
        battle.east_slots[1] = Some(card("cleo", 250, false));
        battle.east_slots[2] = Some(card("dara", 100, true));
        assert_eq!(battle.faction_strength(Faction::East), 500);
        assert_eq!(battle.living_cards(Faction::East).len(), 2);
    }

    #[test]
    fn last_placement_wins_the_faction_association() {
        let mut battle =
            Battle::new(1, "t3_abc".to_string(), MapType::Plains, "Millbrook".into(), 0);
        battle.record_participant("anna", Faction::West);
        battle.record_participant("anna", Faction::East);
        assert_eq!(battle.participants.get("anna"), Some(&Faction::East));
        assert_eq!(battle.participants.len(), 1);
    }

    #[test]
    fn json_roundtrip_keeps_slots_and_participants() {
        let mut battle =
            Battle::new(9, "t3_xyz".to_string(), MapType::Fortress, "Kharim Gate".into(), 123);
        battle.west_slots[0] = Some(card("anna", 450, true));
        battle.record_participant("anna", Faction::West);

        let json = battle.to_json().unwrap();
        let back = Battle::from_json(&json).unwrap();
        assert_eq!(back, battle);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let mut battle =
            Battle::new(9, "t3_xyz".to_string(), MapType::Plains, "Millbrook".into(), 0);
        battle.version = 42;
        let json = serde_json::to_string(&battle).unwrap();
        let err = Battle::from_json(&json).unwrap_err();
        assert!(err.contains("schema version 42"), "unexpected error: {err}");
    }
}
