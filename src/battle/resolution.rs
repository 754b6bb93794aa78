//! Battle resolution: when a battle ends, who won, who gets paid.
//!
//! Resolution is reachable from two doors, both funneling into the same
//! internal path: a placement that fills the last slot resolves in the same
//! call, and the scheduler (or an explicit resolve request) catches battles
//! that went quiet. The entry is idempotent; a battle pays out exactly once
//! because the Active-to-terminal transition happens under the battle lock.

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::battle::types::{Battle, BattleOutcome, BattleStatus, BATTLE_TIMEOUT_MS};
use crate::battle::BattleService;
use crate::catalog::Faction;
use crate::error::GameError;
use crate::war::{format_slider_visual, WarAdvance};

/// Coins for participants of the winning faction.
pub const WIN_COINS: i64 = 70;
/// Coins for participants of the losing faction.
pub const LOSS_COINS: i64 = 20;
/// Coins for everyone when neither side breaks the other.
pub const DRAW_COINS: i64 = 35;
/// Flat experience for taking part at all.
pub const BATTLE_XP: i64 = 50;

/// What one participant was actually paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct RewardEntry {
    pub player: String,
    pub faction: Faction,
    pub coins: i64,
    pub xp: i64,
    pub faction_point: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ResolutionSummary {
    pub battle_id: u64,
    pub outcome: BattleOutcome,
    pub status: BattleStatus,
    pub west_strength: u64,
    pub east_strength: u64,
    pub rewards: Vec<RewardEntry>,
    pub war: WarAdvance,
    pub message: String,
}

/// A battle is due once both sides are full or it has sat idle too long.
pub fn should_resolve(battle: &Battle, now: i64) -> bool {
    battle.is_full() || now - battle.last_activity >= BATTLE_TIMEOUT_MS
}

/// Idempotent resolution entry. `None` for battles that are missing,
/// already terminal, or simply not due yet.
pub async fn check_and_resolve_battle(
    service: &BattleService,
    battle_id: u64,
) -> Result<Option<ResolutionSummary>, GameError> {
    let lock = service.battle_lock(battle_id).await;
    let _guard = lock.lock().await;

    let mut battle = match service.load_battle(battle_id).await? {
        Some(battle) => battle,
        None => return Ok(None),
    };
    let summary = resolve_if_due(service, &mut battle, crate::battle::types::now_ms()).await?;
    if summary.is_some() {
        service.save_battle(&battle).await?;
        service.store.persist().await;
    }
    Ok(summary)
}

/// Resolve the loaded battle if it is due. The caller holds the battle lock
/// and saves the record afterwards.
pub(crate) async fn resolve_if_due(
    service: &BattleService,
    battle: &mut Battle,
    now: i64,
) -> Result<Option<ResolutionSummary>, GameError> {
    if battle.status != BattleStatus::Active {
        return Ok(None);
    }
    if !should_resolve(battle, now) {
        return Ok(None);
    }

    let west_strength = battle.faction_strength(Faction::West);
    let east_strength = battle.faction_strength(Faction::East);
    let outcome = if west_strength > east_strength {
        BattleOutcome::Victory(Faction::West)
    } else if east_strength > west_strength {
        BattleOutcome::Victory(Faction::East)
    } else {
        BattleOutcome::Draw
    };
    battle.status = match outcome {
        BattleOutcome::Victory(_) => BattleStatus::Completed,
        BattleOutcome::Draw => BattleStatus::Stalemate,
    };

    let rewards = pay_participants(service, battle, outcome).await;
    service.remove_from_active(battle.id).await;
    let war = service.war.process_battle_outcome(outcome).await?;

    let message =
        format_resolution_message(battle, outcome, west_strength, east_strength, &rewards, &war);
    log::info!(
        "Battle {} resolved: {:?}, {} rewards paid",
        battle.id,
        outcome,
        rewards.len()
    );
    Ok(Some(ResolutionSummary {
        battle_id: battle.id,
        outcome,
        status: battle.status,
        west_strength,
        east_strength,
        rewards,
        war,
        message,
    }))
}

/// Pay every unique participant by their recorded faction. A failing credit
/// is logged and skipped so one bad account never starves the rest.
async fn pay_participants(
    service: &BattleService,
    battle: &Battle,
    outcome: BattleOutcome,
) -> Vec<RewardEntry> {
    let mut roster: Vec<(&String, &Faction)> = battle.participants.iter().collect();
    roster.sort_by(|a, b| a.0.cmp(b.0));

    let mut rewards = Vec::with_capacity(roster.len());
    for (player, faction) in roster {
        let (coins, winner) = match outcome {
            BattleOutcome::Draw => (DRAW_COINS, false),
            BattleOutcome::Victory(winning) => {
                if *faction == winning {
                    (WIN_COINS, true)
                } else {
                    (LOSS_COINS, false)
                }
            }
        };
        if let Err(e) = service.players.credit_coins(player, coins).await {
            log::warn!("Could not pay battle reward to {player}: {e}");
            continue;
        }
        if let Err(e) = service.players.credit_xp(player, BATTLE_XP).await {
            log::warn!("Could not credit XP to {player}: {e}");
            continue;
        }
        if winner {
            if let Err(e) = service.players.add_faction_point(player, *faction).await {
                log::warn!("Could not credit faction point to {player}: {e}");
                continue;
            }
        }
        rewards.push(RewardEntry {
            player: player.clone(),
            faction: *faction,
            coins,
            xp: BATTLE_XP,
            faction_point: winner,
        });
    }
    rewards
}

pub fn format_resolution_message(
    battle: &Battle,
    outcome: BattleOutcome,
    west_strength: u64,
    east_strength: u64,
    rewards: &[RewardEntry],
    war: &WarAdvance,
) -> String {
    let mut lines = vec![format!(
        "The battle of {} ({}) is over.",
        battle.location,
        battle.map.label()
    )];
    lines.push(format!(
        "Surviving strength: West {west_strength} vs East {east_strength}."
    ));
    lines.push(match outcome {
        BattleOutcome::Victory(faction) => {
            format!("The {} carries the field!", faction.label())
        }
        BattleOutcome::Draw => "Neither side could break the other. Stalemate.".to_string(),
    });
    lines.push(format!("{} players collect their pay.", rewards.len()));
    lines.push(format!("War standing: {}", format_slider_visual(war.slider)));
    if let Some(victory) = &war.victory {
        lines.push(victory.announcement.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::battle::types::{now_ms, BattleCard, SLOTS_PER_FACTION};
    use crate::catalog::{Catalog, MapType};
    use crate::players::PlayerService;
    use crate::store::Store;
    use crate::war::WarService;

    fn service() -> BattleService {
        let store = Store::new();
        let catalog = Arc::new(Catalog::load().unwrap());
        let players = PlayerService::new(store.clone());
        let war = WarService::new(store.clone(), players.clone());
        BattleService::new(store, catalog, players, war)
    }

    fn card(owner: &str, soldiers: u32, alive: bool) -> Option<BattleCard> {
        Some(BattleCard {
            card_id: "west_shield_levy".to_string(),
            owner: owner.to_string(),
            current_soldiers: soldiers,
            is_alive: alive,
        })
    }

    /// A full 20-slot battle with chosen totals on each side.
    async fn seeded_battle(service: &BattleService, west: u32, east: u32) -> Battle {
        let mut battle = Battle::new(
            1,
            "t3_full".to_string(),
            MapType::Plains,
            "Hollow Meadows".to_string(),
            now_ms(),
        );
        for i in 0..SLOTS_PER_FACTION {
            battle.west_slots[i] = card("anna", if i == 0 { west } else { 0 }, i == 0);
            battle.east_slots[i] = card("bo", if i == 0 { east } else { 0 }, i == 0);
        }
        battle.record_participant("anna", Faction::West);
        battle.record_participant("bo", Faction::East);
        service.war.record_participant("anna", Faction::West).await;
        service.war.record_participant("bo", Faction::East).await;
        service.save_battle(&battle).await.unwrap();
        service
            .store
            .zadd("battles:active", &battle.id.to_string(), battle.created_at)
            .await;
        battle
    }

    #[test]
    fn due_when_full_or_stale() {
        let mut battle = Battle::new(
            1,
            "t3_x".to_string(),
            MapType::Plains,
            "Hollow Meadows".to_string(),
            1_000_000,
        );
        assert!(!should_resolve(&battle, 1_000_100));
        assert!(should_resolve(&battle, 1_000_000 + BATTLE_TIMEOUT_MS));

        for i in 0..SLOTS_PER_FACTION {
            battle.west_slots[i] = card("anna", 10, true);
            battle.east_slots[i] = card("bo", 10, true);
        }
        assert!(should_resolve(&battle, 1_000_100));
    }

    #[rocket::async_test]
    async fn stronger_side_wins_and_collects() {
        let battles = service();
        let battle = seeded_battle(&battles, 900, 400).await;

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .expect("full battle must resolve");

        assert_eq!(summary.outcome, BattleOutcome::Victory(Faction::West));
        assert_eq!(summary.status, BattleStatus::Completed);
        assert_eq!(summary.west_strength, 900);
        assert_eq!(summary.east_strength, 400);
        assert_eq!(summary.war.slider, 1);
        assert!(summary.message.contains("The West carries the field!"));

        let anna = battles.players.get_profile("anna").await.unwrap();
        assert_eq!(anna.coins, WIN_COINS);
        assert_eq!(anna.xp, BATTLE_XP);
        assert_eq!(anna.points_west, 1);
        let bo = battles.players.get_profile("bo").await.unwrap();
        assert_eq!(bo.coins, LOSS_COINS);
        assert_eq!(bo.xp, BATTLE_XP);
        assert_eq!(bo.points_east, 0);

        let stored = battles.get_battle(battle.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BattleStatus::Completed);
        assert_eq!(battles.store.zcard("battles:active").await, 0);
    }

    #[rocket::async_test]
    async fn one_bad_account_never_starves_the_rest() {
        let battles = service();
        let mut battle = seeded_battle(&battles, 900, 400).await;
        // Blank owners cannot be credited; the payout skips them.
        battle.west_slots[5] = card("   ", 0, false);
        battle.record_participant("   ", Faction::West);
        battles.save_battle(&battle).await.unwrap();

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .expect("full battle must resolve");

        assert_eq!(summary.outcome, BattleOutcome::Victory(Faction::West));
        let paid: Vec<&str> = summary.rewards.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(paid, vec!["anna", "bo"]);
        assert!(summary.message.contains("2 players collect their pay."));

        let anna = battles.players.get_profile("anna").await.unwrap();
        assert_eq!(anna.coins, WIN_COINS);
        assert_eq!(anna.xp, BATTLE_XP);
        let bo = battles.players.get_profile("bo").await.unwrap();
        assert_eq!(bo.coins, LOSS_COINS);
        assert_eq!(bo.xp, BATTLE_XP);
    }

    #[rocket::async_test]
    async fn equal_strength_is_a_stalemate() {
        let battles = service();
        let battle = seeded_battle(&battles, 500, 500).await;

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.outcome, BattleOutcome::Draw);
        assert_eq!(summary.status, BattleStatus::Stalemate);
        assert!(summary.war.victory.is_none());
        assert_eq!(summary.war.slider, 0);

        let anna = battles.players.get_profile("anna").await.unwrap();
        let bo = battles.players.get_profile("bo").await.unwrap();
        assert_eq!(anna.coins, DRAW_COINS);
        assert_eq!(bo.coins, DRAW_COINS);
        assert_eq!(anna.points_west, 0);
        assert_eq!(bo.points_east, 0);

        let war_state = battles.war.get_war_state().await;
        assert_eq!(war_state.total_battles, 1);
        assert_eq!(war_state.slider, 0);
    }

    #[rocket::async_test]
    async fn only_living_soldiers_count() {
        let battles = service();
        let mut battle = seeded_battle(&battles, 300, 200).await;
        // A dead giant on the east side changes nothing.
        battle.east_slots[5] = card("bo", 5000, false);
        battles.save_battle(&battle).await.unwrap();

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.outcome, BattleOutcome::Victory(Faction::West));
        assert_eq!(summary.east_strength, 200);
    }

    #[rocket::async_test]
    async fn resolving_twice_pays_once() {
        let battles = service();
        let battle = seeded_battle(&battles, 900, 400).await;

        let first = check_and_resolve_battle(&battles, battle.id).await.unwrap();
        assert!(first.is_some());
        let second = check_and_resolve_battle(&battles, battle.id).await.unwrap();
        assert!(second.is_none());

        let anna = battles.players.get_profile("anna").await.unwrap();
        assert_eq!(anna.coins, WIN_COINS);
        assert_eq!(anna.points_west, 1);
        let war_state = battles.war.get_war_state().await;
        assert_eq!(war_state.total_battles, 1);
    }

    #[rocket::async_test]
    async fn quiet_battles_resolve_on_timeout() {
        let battles = service();
        let mut battle = Battle::new(
            3,
            "t3_idle".to_string(),
            MapType::Forest,
            "Bramblewood".to_string(),
            now_ms(),
        );
        battle.west_slots[0] = card("anna", 600, true);
        battle.record_participant("anna", Faction::West);
        battle.last_activity = now_ms() - BATTLE_TIMEOUT_MS - 1;
        battles.save_battle(&battle).await.unwrap();

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .expect("idle battle must resolve");
        assert_eq!(summary.outcome, BattleOutcome::Victory(Faction::West));
        assert_eq!(summary.east_strength, 0);
    }

    #[rocket::async_test]
    async fn active_and_recent_battles_are_left_alone() {
        let battles = service();
        let mut battle = Battle::new(
            4,
            "t3_fresh".to_string(),
            MapType::Desert,
            "Mirage Hollow".to_string(),
            now_ms(),
        );
        battle.west_slots[0] = card("anna", 600, true);
        battles.save_battle(&battle).await.unwrap();

        let summary = check_and_resolve_battle(&battles, battle.id).await.unwrap();
        assert!(summary.is_none());
        let stored = battles.get_battle(battle.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BattleStatus::Active);
    }

    #[rocket::async_test]
    async fn missing_battles_resolve_to_nothing() {
        let battles = service();
        let summary = check_and_resolve_battle(&battles, 404).await.unwrap();
        assert!(summary.is_none());
    }

    #[rocket::async_test]
    async fn war_victory_rides_along_in_the_summary() {
        let battles = service();
        battles.store.hset("war:state", "slider", "5").await;
        let battle = seeded_battle(&battles, 900, 400).await;

        let summary = check_and_resolve_battle(&battles, battle.id)
            .await
            .unwrap()
            .unwrap();
        let victory = summary.war.victory.expect("slider hit +6");
        assert_eq!(victory.faction, Faction::West);
        assert!(summary.message.contains("has won the war"));
        // Battle win coins plus the war bonus.
        let anna = battles.players.get_profile("anna").await.unwrap();
        assert_eq!(anna.coins, WIN_COINS + crate::war::WAR_VICTORY_COINS);
    }
}
