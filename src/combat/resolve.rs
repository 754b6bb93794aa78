//! The skirmish resolver.
//!
//! Pure given an RNG: no store access, no clock, no suspension points. The
//! caller hands in the two catalog definitions, the two mutable card states,
//! the map, and a [`RngCore`]; both card states are updated in place and a
//! full [`CombatResult`] comes back.
//!
//! Randomness is consumed in a fixed order so seeded runs replay exactly:
//! initiative coin flip, then FirstStrike rolls (attacker before defender),
//! then one damage roll per turn, then the fallen side's death-exception
//! rolls.

use std::collections::VecDeque;

use rand::RngCore;
use rand_pcg::Lcg64Xsh32;

use crate::battle::types::BattleCard;
use crate::catalog::{Ability, CardDef, MapType};
use crate::combat::{
    AbilityEvent, CombatResult, CombatantReport, Side, ENDURANCE_BONUS, FIRST_STRIKE_CHANCE,
    LAST_STAND_CHANCE, REINFORCEMENT_BONUS, SIEGE_BONUS, TURN_CAP,
};

pub fn resolve_skirmish<R: RngCore>(
    attacker_def: &CardDef,
    attacker: &mut BattleCard,
    defender_def: &CardDef,
    defender: &mut BattleCard,
    map: MapType,
    rng: &mut R,
) -> CombatResult {
    let att_before = attacker.current_soldiers;
    let def_before = defender.current_soldiers;
    let mut events: Vec<AbilityEvent> = Vec::new();

    // Pre-combat bonuses. Siege first, then Endurance against the
    // post-Siege snapshot so the comparison is symmetric.
    let mut att_eff = att_before;
    let mut def_eff = def_before;
    if map.grants_siege_bonus() {
        if attacker_def.ability == Some(Ability::Siege) {
            att_eff += SIEGE_BONUS;
            events.push(AbilityEvent::SiegeBonus {
                side: Side::Attacker,
                amount: SIEGE_BONUS,
            });
        }
        if defender_def.ability == Some(Ability::Siege) {
            def_eff += SIEGE_BONUS;
            events.push(AbilityEvent::SiegeBonus {
                side: Side::Defender,
                amount: SIEGE_BONUS,
            });
        }
    }
    let (att_snapshot, def_snapshot) = (att_eff, def_eff);
    if attacker_def.ability == Some(Ability::Endurance) && def_snapshot > att_snapshot {
        att_eff += ENDURANCE_BONUS;
        events.push(AbilityEvent::EnduranceBonus {
            side: Side::Attacker,
            amount: ENDURANCE_BONUS,
        });
    }
    if defender_def.ability == Some(Ability::Endurance) && att_snapshot > def_snapshot {
        def_eff += ENDURANCE_BONUS;
        events.push(AbilityEvent::EnduranceBonus {
            side: Side::Defender,
            amount: ENDURANCE_BONUS,
        });
    }

    // Initiative. The coin is always flipped, then each FirstStrike holder
    // rolls in attacker-defender order; a later successful roll wins.
    let coin_first = if rng.next_u64() % 2 == 0 {
        Side::Attacker
    } else {
        Side::Defender
    };
    let att_seizes = attacker_def.ability == Some(Ability::FirstStrike)
        && percent_roll(rng, FIRST_STRIKE_CHANCE);
    let def_seizes = defender_def.ability == Some(Ability::FirstStrike)
        && percent_roll(rng, FIRST_STRIKE_CHANCE);
    let first_mover = if def_seizes {
        events.push(AbilityEvent::FirstStrikeSeized {
            side: Side::Defender,
        });
        Side::Defender
    } else if att_seizes {
        events.push(AbilityEvent::FirstStrikeSeized {
            side: Side::Attacker,
        });
        Side::Attacker
    } else {
        coin_first
    };

    // Reinforcement favors whoever was not granted the first move.
    let second_mover = first_mover.opponent();
    let second_def = match second_mover {
        Side::Attacker => attacker_def,
        Side::Defender => defender_def,
    };
    if second_def.ability == Some(Ability::Reinforcement) {
        match second_mover {
            Side::Attacker => att_eff += REINFORCEMENT_BONUS,
            Side::Defender => def_eff += REINFORCEMENT_BONUS,
        }
        events.push(AbilityEvent::ReinforcementArrived {
            side: second_mover,
            amount: REINFORCEMENT_BONUS,
        });
    }

    let att_precise = attacker_def.ability == Some(Ability::Precision);
    let def_precise = defender_def.ability == Some(Ability::Precision);
    if att_precise {
        events.push(AbilityEvent::PrecisionSteadied {
            side: Side::Attacker,
        });
    }
    if def_precise {
        events.push(AbilityEvent::PrecisionSteadied {
            side: Side::Defender,
        });
    }

    // Turn loop. Effective strength doubles as HP pool and roll ceiling.
    let mut att_hp = att_eff as i64;
    let mut def_hp = def_eff as i64;
    let mut att_damage: u32 = 0;
    let mut def_damage: u32 = 0;
    let mut turns: u32 = 0;
    let mut striker = first_mover;
    while turns < TURN_CAP && att_hp > 0 && def_hp > 0 {
        turns += 1;
        let (ceiling, precise) = match striker {
            Side::Attacker => (att_eff, att_precise),
            Side::Defender => (def_eff, def_precise),
        };
        let mut roll = (rng.next_u64() % (ceiling as u64 + 1)) as u32;
        if precise && roll < ceiling / 2 {
            roll = ceiling / 2;
        }
        match striker {
            Side::Attacker => {
                def_hp -= roll as i64;
                att_damage += roll;
            }
            Side::Defender => {
                att_hp -= roll as i64;
                def_damage += roll;
            }
        }
        striker = striker.opponent();
    }

    // Death exceptions. Strict alternation means at most one side is down
    // here; a capped loop leaves both standing.
    let fallen = if att_hp <= 0 {
        Some(Side::Attacker)
    } else if def_hp <= 0 {
        Some(Side::Defender)
    } else {
        None
    };
    if let Some(side) = fallen {
        let fallen_def = match side {
            Side::Attacker => attacker_def,
            Side::Defender => defender_def,
        };
        let mut still_down = true;
        if fallen_def.ability == Some(Ability::LastStand) && percent_roll(rng, LAST_STAND_CHANCE) {
            match side {
                Side::Attacker => att_hp = 1,
                Side::Defender => def_hp = 1,
            }
            still_down = false;
            events.push(AbilityEvent::LastStandHeld { side });
        }
        if still_down && fallen_def.ability == Some(Ability::PartingBlow) {
            // One point of damage to the victor, no further exceptions.
            match side {
                Side::Attacker => {
                    def_hp -= 1;
                    att_damage += 1;
                }
                Side::Defender => {
                    att_hp -= 1;
                    def_damage += 1;
                }
            }
            events.push(AbilityEvent::PartingBlowStruck { side, damage: 1 });
        }
    }

    attacker.current_soldiers = att_hp.max(0) as u32;
    attacker.is_alive = att_hp > 0;
    defender.current_soldiers = def_hp.max(0) as u32;
    defender.is_alive = def_hp > 0;

    CombatResult {
        attacker: CombatantReport {
            card_id: attacker.card_id.clone(),
            card_name: attacker_def.name.clone(),
            owner: attacker.owner.clone(),
            faction: attacker_def.faction,
            soldiers_before: att_before,
            effective_strength: att_eff,
            soldiers_after: attacker.current_soldiers,
            damage_dealt: att_damage,
            survived: attacker.is_alive,
        },
        defender: CombatantReport {
            card_id: defender.card_id.clone(),
            card_name: defender_def.name.clone(),
            owner: defender.owner.clone(),
            faction: defender_def.faction,
            soldiers_before: def_before,
            effective_strength: def_eff,
            soldiers_after: defender.current_soldiers,
            damage_dealt: def_damage,
            survived: defender.is_alive,
        },
        first_mover,
        turns,
        events,
    }
}

fn percent_roll<R: RngCore>(rng: &mut R, chance: u64) -> bool {
    rng.next_u64() % 100 < chance
}

/// Build the game RNG from a numeric seed, the seed widened into both
/// halves of the generator state.
pub fn rng_from_seed(seed: u64) -> Lcg64Xsh32 {
    let half = seed.to_le_bytes();
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&half);
    bytes[8..].copy_from_slice(&half);
    rand::SeedableRng::from_seed(bytes)
}

/// RNG that replays a queued sequence of values, for deterministic
/// harnesses. Returns 0 once the queue is drained.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRng {
    values: VecDeque<u64>,
}

impl ScriptedRng {
    pub fn new(values: impl IntoIterator<Item = u64>) -> ScriptedRng {
        ScriptedRng {
            values: values.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.values.pop_front().unwrap_or(0)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
