//! The faction war: a tug-of-war slider fed by battle outcomes.
//!
//! State is one store hash plus two participant sets, mutated only behind
//! the war lock so concurrent battle resolutions serialize their pushes.
//! West victories move the slider up, East victories down; touching the rim
//! at either end wins the whole war, pays every tracked participant of the
//! winning faction, and resets the campaign.

use std::sync::Arc;

use rocket::futures::lock::Mutex;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::battle::types::{now_ms, BattleOutcome};
use crate::catalog::Faction;
use crate::error::GameError;
use crate::players::PlayerService;
use crate::store::Store;
use crate::GameServices;

/// The slider wins the war at +6 (West) or -6 (East).
pub const SLIDER_MAX: i64 = 6;
/// Coins paid to every winning-faction participant on a war victory.
pub const WAR_VICTORY_COINS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WarState {
    pub slider: i64,
    pub total_battles: i64,
    pub wins_west: i64,
    pub wins_east: i64,
    pub last_victory_faction: Option<Faction>,
    pub last_victory_at: Option<i64>,
}

/// What a single battle outcome did to the war.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WarAdvance {
    /// Slider after the push, post-reset zero when a victory fired.
    pub slider: i64,
    pub victory: Option<WarVictory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WarVictory {
    pub faction: Faction,
    pub rewarded_players: usize,
    pub announcement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WarReport {
    pub state: WarState,
    pub slider_visual: String,
}

#[derive(Debug, Clone)]
pub struct WarService {
    store: Store,
    players: PlayerService,
    lock: Arc<Mutex<()>>,
}

const WAR_STATE: &str = "war:state";

impl WarService {
    pub fn new(store: Store, players: PlayerService) -> WarService {
        WarService {
            store,
            players,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn get_war_state(&self) -> WarState {
        let fields = self.store.hgetall(WAR_STATE).await;
        let read = |field: &str| {
            fields
                .get(field)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        };
        WarState {
            slider: read("slider"),
            total_battles: read("total_battles"),
            wins_west: read("wins_west"),
            wins_east: read("wins_east"),
            last_victory_faction: fields
                .get("last_victory_faction")
                .and_then(|v| Faction::parse(v)),
            last_victory_at: fields
                .get("last_victory_at")
                .and_then(|v| v.parse::<i64>().ok()),
        }
    }

    /// Track a player on their faction's roster for the running war.
    /// Append-only; the roster empties when the war resets.
    pub async fn record_participant(&self, player: &str, faction: Faction) {
        self.store
            .hset(&participants_key(faction), player, "1")
            .await;
    }

    /// Feed one terminal battle into the war. Draws only count the battle;
    /// victories push the slider and may end the whole war.
    pub async fn process_battle_outcome(
        &self,
        outcome: BattleOutcome,
    ) -> Result<WarAdvance, GameError> {
        let _guard = self.lock.lock().await;
        self.store.hincr_by(WAR_STATE, "total_battles", 1).await;

        let winner = match outcome {
            BattleOutcome::Draw => {
                let state = self.get_war_state().await;
                return Ok(WarAdvance {
                    slider: state.slider,
                    victory: None,
                });
            }
            BattleOutcome::Victory(faction) => faction,
        };

        let wins_field = match winner {
            Faction::West => "wins_west",
            Faction::East => "wins_east",
        };
        self.store.hincr_by(WAR_STATE, wins_field, 1).await;

        let current = self
            .store
            .hget(WAR_STATE, "slider")
            .await
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        // Clamp guards against a corrupted stored value; a healthy slider
        // can never leave the rim in one push.
        let slider = (current + winner.slider_direction()).clamp(-SLIDER_MAX, SLIDER_MAX);
        self.store
            .hset(WAR_STATE, "slider", slider.to_string())
            .await;

        if slider != SLIDER_MAX * winner.slider_direction() {
            return Ok(WarAdvance {
                slider,
                victory: None,
            });
        }

        let victory = self.finish_war(winner).await;
        Ok(WarAdvance {
            slider: 0,
            victory: Some(victory),
        })
    }

    /// Pay the winning roster, record the victory, reset the campaign.
    async fn finish_war(&self, winner: Faction) -> WarVictory {
        let roster = self.store.hgetall(&participants_key(winner)).await;
        let mut rewarded = 0usize;
        for player in roster.keys() {
            match self.players.credit_coins(player, WAR_VICTORY_COINS).await {
                Ok(_) => rewarded += 1,
                Err(e) => {
                    log::warn!("Could not pay war bonus to {player}: {e}");
                }
            }
        }

        self.store
            .hset_multi(
                WAR_STATE,
                &[
                    ("slider", "0".to_string()),
                    ("total_battles", "0".to_string()),
                    ("wins_west", "0".to_string()),
                    ("wins_east", "0".to_string()),
                    ("last_victory_faction", winner.as_key().to_string()),
                    ("last_victory_at", now_ms().to_string()),
                ],
            )
            .await;
        self.store.del(&participants_key(Faction::West)).await;
        self.store.del(&participants_key(Faction::East)).await;

        let announcement = format_war_victory_announcement(winner, rewarded);
        log::info!("War won by the {}: {rewarded} players rewarded", winner.label());
        WarVictory {
            faction: winner,
            rewarded_players: rewarded,
            announcement,
        }
    }
}

fn participants_key(faction: Faction) -> String {
    format!("war:participants:{}", faction.as_key())
}

/// 13-cell bar, East rim on the left, West rim on the right.
pub fn format_slider_visual(position: i64) -> String {
    let clamped = position.clamp(-SLIDER_MAX, SLIDER_MAX);
    let cells: String = (-SLIDER_MAX..=SLIDER_MAX)
        .map(|i| {
            if i == clamped {
                'X'
            } else if i == 0 {
                '|'
            } else {
                '.'
            }
        })
        .collect();
    format!("East [{cells}] West")
}

pub fn format_war_victory_announcement(faction: Faction, rewarded_players: usize) -> String {
    format!(
        "The {} has won the war! {} campaign veterans collect {} coins each. \
         The front resets and a new war begins.",
        faction.label(),
        rewarded_players,
        WAR_VICTORY_COINS
    )
}

#[openapi]
#[get("/war")]
pub async fn get_war(services: &State<GameServices>) -> Json<WarReport> {
    let state = services.war.get_war_state().await;
    let slider_visual = format_slider_visual(state.slider);
    Json(WarReport {
        state,
        slider_visual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (WarService, PlayerService, Store) {
        let store = Store::new();
        let players = PlayerService::new(store.clone());
        let war = WarService::new(store.clone(), players.clone());
        (war, players, store)
    }

    #[rocket::async_test]
    async fn draw_counts_the_battle_and_nothing_else() {
        let (war, _, _) = service();
        let advance = war.process_battle_outcome(BattleOutcome::Draw).await.unwrap();
        assert_eq!(advance.slider, 0);
        assert!(advance.victory.is_none());
        let state = war.get_war_state().await;
        assert_eq!(state.total_battles, 1);
        assert_eq!(state.wins_west, 0);
        assert_eq!(state.wins_east, 0);
    }

    #[rocket::async_test]
    async fn wins_push_the_slider_toward_the_winner() {
        let (war, _, _) = service();
        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::West))
            .await
            .unwrap();
        assert_eq!(advance.slider, 1);
        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::East))
            .await
            .unwrap();
        assert_eq!(advance.slider, 0);
        assert!(advance.victory.is_none());
        let state = war.get_war_state().await;
        assert_eq!(state.wins_west, 1);
        assert_eq!(state.wins_east, 1);
        assert_eq!(state.total_battles, 2);
    }

    #[rocket::async_test]
    async fn sixth_push_wins_the_war_and_resets_it() {
        let (war, players, store) = service();
        store.hset("war:state", "slider", "5").await;
        war.record_participant("anna", Faction::West).await;
        war.record_participant("bo", Faction::West).await;
        war.record_participant("cleo", Faction::East).await;

        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::West))
            .await
            .unwrap();
        assert_eq!(advance.slider, 0);
        let victory = advance.victory.expect("victory should fire at +6");
        assert_eq!(victory.faction, Faction::West);
        assert_eq!(victory.rewarded_players, 2);
        assert!(victory.announcement.contains("West"));

        let state = war.get_war_state().await;
        assert_eq!(state.slider, 0);
        assert_eq!(state.total_battles, 0);
        assert_eq!(state.wins_west, 0);
        assert_eq!(state.last_victory_faction, Some(Faction::West));
        assert!(state.last_victory_at.is_some());

        assert_eq!(players.get_profile("anna").await.unwrap().coins, 100);
        assert_eq!(players.get_profile("bo").await.unwrap().coins, 100);
        assert_eq!(players.get_profile("cleo").await.unwrap().coins, 0);

        // Rosters empty for the next war.
        assert!(store.hgetall("war:participants:west").await.is_empty());
        assert!(store.hgetall("war:participants:east").await.is_empty());
    }

    #[rocket::async_test]
    async fn war_payout_skips_accounts_it_cannot_credit() {
        let (war, players, store) = service();
        store.hset("war:state", "slider", "5").await;
        war.record_participant("anna", Faction::West).await;
        // A roster entry with a blank name fails the credit; the loop
        // moves on and the count only covers players actually paid.
        war.record_participant("   ", Faction::West).await;
        war.record_participant("bo", Faction::West).await;

        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::West))
            .await
            .unwrap();
        let victory = advance.victory.expect("victory should fire at +6");
        assert_eq!(victory.rewarded_players, 2);
        assert!(victory.announcement.contains("2 campaign veterans"));

        assert_eq!(players.get_profile("anna").await.unwrap().coins, 100);
        assert_eq!(players.get_profile("bo").await.unwrap().coins, 100);
    }

    #[rocket::async_test]
    async fn east_wins_the_war_on_the_negative_rim() {
        let (war, _, store) = service();
        store.hset("war:state", "slider", "-5").await;
        war.record_participant("dara", Faction::East).await;
        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::East))
            .await
            .unwrap();
        let victory = advance.victory.expect("victory should fire at -6");
        assert_eq!(victory.faction, Faction::East);
        assert_eq!(victory.rewarded_players, 1);
    }

    #[rocket::async_test]
    async fn corrupted_slider_values_are_clamped() {
        let (war, _, store) = service();
        store.hset("war:state", "slider", "99").await;
        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::East))
            .await
            .unwrap();
        assert_eq!(advance.slider, SLIDER_MAX);
        assert!(advance.victory.is_none());
    }

    #[rocket::async_test]
    async fn fresh_war_starts_counting_from_zero() {
        let (war, _, store) = service();
        store.hset("war:state", "slider", "5").await;
        war.process_battle_outcome(BattleOutcome::Victory(Faction::West))
            .await
            .unwrap();
        let advance = war
            .process_battle_outcome(BattleOutcome::Victory(Faction::West))
            .await
            .unwrap();
        assert_eq!(advance.slider, 1);
        let state = war.get_war_state().await;
        assert_eq!(state.total_battles, 1);
        assert_eq!(state.wins_west, 1);
    }

    #[test]
    fn slider_visual_marks_the_position() {
        assert_eq!(format_slider_visual(0), "East [......X......] West");
        assert_eq!(format_slider_visual(6), "East [......|.....X] West");
        assert_eq!(format_slider_visual(-6), "East [X.....|......] West");
        assert_eq!(format_slider_visual(3), "East [......|..X...] West");
        // Out-of-range positions render at the rim.
        assert_eq!(format_slider_visual(40), format_slider_visual(6));
    }
}
