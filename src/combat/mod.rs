//! Combat result types and the human-readable skirmish log.
//!
//! The resolver itself lives in [`resolve`]; everything here is the shape of
//! what it returns and how that gets rendered for posting.

pub mod resolve;

pub use resolve::{resolve_skirmish, rng_from_seed, ScriptedRng};

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::catalog::Faction;

/// Flat bonus for Siege holders on walled maps.
pub const SIEGE_BONUS: u32 = 300;
/// Flat bonus for Endurance holders facing a stronger opponent.
pub const ENDURANCE_BONUS: u32 = 200;
/// Flat bonus for the side that does not move first.
pub const REINFORCEMENT_BONUS: u32 = 100;
/// Chance (percent) for a FirstStrike holder to seize the initiative.
pub const FIRST_STRIKE_CHANCE: u64 = 70;
/// Chance (percent) for a LastStand holder to survive a killing blow.
pub const LAST_STAND_CHANCE: u64 = 20;
/// Hard stop for the turn loop; reaching it is a stand-off, never a death.
pub const TURN_CAP: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// One ability firing during a skirmish, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum AbilityEvent {
    SiegeBonus { side: Side, amount: u32 },
    EnduranceBonus { side: Side, amount: u32 },
    FirstStrikeSeized { side: Side },
    ReinforcementArrived { side: Side, amount: u32 },
    /// Emitted once when the turn loop opens for a Precision holder; the
    /// floor applies to every one of that side's rolls.
    PrecisionSteadied { side: Side },
    LastStandHeld { side: Side },
    PartingBlowStruck { side: Side, damage: u32 },
}

impl AbilityEvent {
    pub fn side(&self) -> Side {
        match self {
            AbilityEvent::SiegeBonus { side, .. }
            | AbilityEvent::EnduranceBonus { side, .. }
            | AbilityEvent::FirstStrikeSeized { side }
            | AbilityEvent::ReinforcementArrived { side, .. }
            | AbilityEvent::PrecisionSteadied { side }
            | AbilityEvent::LastStandHeld { side }
            | AbilityEvent::PartingBlowStruck { side, .. } => *side,
        }
    }
}

/// One side of the skirmish, before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CombatantReport {
    pub card_id: String,
    pub card_name: String,
    pub owner: String,
    pub faction: Faction,
    /// Soldiers walking in, before any bonus.
    pub soldiers_before: u32,
    /// Soldiers plus every pre-combat bonus; also the skirmish HP pool and
    /// the damage-roll ceiling.
    pub effective_strength: u32,
    pub soldiers_after: u32,
    /// Total damage dealt to the opponent, parting blow included.
    pub damage_dealt: u32,
    pub survived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CombatResult {
    pub attacker: CombatantReport,
    pub defender: CombatantReport,
    pub first_mover: Side,
    pub turns: u32,
    pub events: Vec<AbilityEvent>,
}

impl CombatResult {
    pub fn report(&self, side: Side) -> &CombatantReport {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }
}

/// Render a skirmish for posting. One line per notable fact, plain text.
pub fn format_combat_log(result: &CombatResult) -> String {
    let att = &result.attacker;
    let def = &result.defender;
    let mut lines = vec![format!(
        "{} ({}, {}) attacks {} ({}, {})",
        att.card_name,
        att.owner,
        att.faction.label(),
        def.card_name,
        def.owner,
        def.faction.label()
    )];
    lines.push(format!(
        "Strength {} vs {} after bonuses.",
        att.effective_strength, def.effective_strength
    ));
    for event in &result.events {
        let name = &result.report(event.side()).card_name;
        lines.push(match event {
            AbilityEvent::SiegeBonus { amount, .. } => {
                format!("Siege engines reinforce {name} (+{amount}).")
            }
            AbilityEvent::EnduranceBonus { amount, .. } => {
                format!("{name} digs in against a stronger foe (+{amount}).")
            }
            AbilityEvent::FirstStrikeSeized { .. } => {
                format!("{name} seizes the initiative.")
            }
            AbilityEvent::ReinforcementArrived { amount, .. } => {
                format!("Reinforcements rally to {name} (+{amount}).")
            }
            AbilityEvent::PrecisionSteadied { .. } => {
                format!("{name} takes measured aim.")
            }
            AbilityEvent::LastStandHeld { .. } => {
                format!("{name} refuses to fall and holds at 1 soldier.")
            }
            AbilityEvent::PartingBlowStruck { damage, .. } => {
                format!("{name} lands a parting blow ({damage} damage).")
            }
        });
    }
    lines.push(format!(
        "{} strikes first.",
        result.report(result.first_mover).card_name
    ));
    let closing = match (att.survived, def.survived) {
        (true, true) => format!(
            "After {} turns both lines hold: {} at {}, {} at {}.",
            result.turns, att.card_name, att.soldiers_after, def.card_name, def.soldiers_after
        ),
        (true, false) => format!(
            "After {} turns {} falls. {} stands with {} soldiers.",
            result.turns, def.card_name, att.card_name, att.soldiers_after
        ),
        (false, true) => format!(
            "After {} turns {} falls. {} stands with {} soldiers.",
            result.turns, att.card_name, def.card_name, def.soldiers_after
        ),
        (false, false) => format!(
            "After {} turns both {} and {} lie fallen.",
            result.turns, att.card_name, def.card_name
        ),
    };
    lines.push(closing);
    lines.join("\n")
}
