//! Battle lifecycle: creation, card placement, reads.
//!
//! `BattleService` is the only thing that mutates a battle record. Every
//! mutation runs behind that battle's own async lock, so two placements can
//! never claim the same slot and a placement can never race the resolver
//! over the same record. Reads go straight to the store.

pub mod endpoints;
pub mod resolution;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;
use rand_pcg::Lcg64Xsh32;
use rocket::futures::lock::Mutex;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::catalog::{location_for, Catalog, Faction, MapType};
use crate::combat::{format_combat_log, resolve_skirmish, CombatResult};
use crate::error::GameError;
use crate::players::PlayerService;
use crate::store::Store;
use crate::war::WarService;

use resolution::ResolutionSummary;
use types::{now_ms, Battle, BattleCard, BattleStatus};

const NEXT_ID_KEY: &str = "battle:next_id";
const ACTIVE_KEY: &str = "battles:active";

fn battle_key(battle_id: u64) -> String {
    format!("battle:{battle_id}")
}

fn post_key(post_id: &str) -> String {
    format!("battle:post:{post_id}")
}

/// Everything one placement did: the slot it claimed, the skirmish it
/// fought (if an opponent stood) and the resolution it may have triggered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Placement {
    pub battle: Battle,
    pub slot: usize,
    pub faction: Faction,
    pub combat: Option<CombatResult>,
    pub combat_log: Option<String>,
    pub resolution: Option<ResolutionSummary>,
}

#[derive(Debug, Clone)]
pub struct BattleService {
    pub(crate) store: Store,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) players: PlayerService,
    pub(crate) war: WarService,
    locks: Arc<Mutex<HashMap<u64, Arc<Mutex<()>>>>>,
}

impl BattleService {
    pub fn new(
        store: Store,
        catalog: Arc<Catalog>,
        players: PlayerService,
        war: WarService,
    ) -> BattleService {
        BattleService {
            store,
            catalog,
            players,
            war,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// One lock per battle id, created on first use and shared forever.
    pub(crate) async fn battle_lock(&self, battle_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(battle_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Open a battle for a post, the initiating card landing in slot 0 of
    /// its faction. The map is drawn at random; the location falls back to
    /// a map-appropriate name when the caller does not supply one.
    pub async fn create_battle(
        &self,
        post_id: &str,
        card_id: &str,
        player: &str,
        location: Option<String>,
        rng: &mut Lcg64Xsh32,
    ) -> Result<Battle, GameError> {
        let def = self
            .catalog
            .get(card_id)
            .ok_or_else(|| GameError::not_found(format!("Card {card_id} not found")))?
            .clone();
        if player.trim().is_empty() {
            return Err(GameError::invalid_state("Player name must not be blank"));
        }
        if post_id.trim().is_empty() {
            return Err(GameError::invalid_state("Post id must not be blank"));
        }
        if self.store.exists(&post_key(post_id)).await {
            return Err(GameError::invalid_state(format!(
                "Post {post_id} already has a battle"
            )));
        }

        let id = self.store.incr_by(NEXT_ID_KEY, 1).await.max(1) as u64;
        let now = now_ms();
        let maps = MapType::all();
        let map = maps[(rng.next_u64() % maps.len() as u64) as usize];
        let location = match location {
            Some(name) if !name.trim().is_empty() => name,
            _ => location_for(map, rng.next_u64() as usize),
        };

        let mut battle = Battle::new(id, post_id.to_string(), map, location, now);
        let faction = def.faction;
        battle.slots_mut(faction)[0] = Some(BattleCard {
            card_id: def.id.clone(),
            owner: player.to_string(),
            current_soldiers: def.soldiers,
            is_alive: true,
        });
        battle.record_participant(player, faction);
        self.war.record_participant(player, faction).await;

        self.save_battle(&battle).await?;
        self.store.zadd(ACTIVE_KEY, &id.to_string(), now).await;
        self.store.set(&post_key(post_id), id.to_string()).await;
        self.store.persist().await;
        log::info!(
            "Battle {id} opened at {} ({}) by {player} for the {}",
            battle.location,
            map.label(),
            faction.label()
        );
        Ok(battle)
    }

    /// Place a card into an active battle. Exactly one skirmish runs if the
    /// opposing faction has a living card; the battle resolves in the same
    /// call when the placement made it due.
    pub async fn add_card_to_battle(
        &self,
        battle_id: u64,
        card_id: &str,
        player: &str,
        rng: &mut Lcg64Xsh32,
    ) -> Result<Placement, GameError> {
        let def = self
            .catalog
            .get(card_id)
            .ok_or_else(|| GameError::not_found(format!("Card {card_id} not found")))?
            .clone();
        if player.trim().is_empty() {
            return Err(GameError::invalid_state("Player name must not be blank"));
        }

        let lock = self.battle_lock(battle_id).await;
        let _guard = lock.lock().await;

        let mut battle = self
            .load_battle(battle_id)
            .await?
            .ok_or_else(|| GameError::not_found(format!("Battle {battle_id} not found")))?;
        if battle.status != BattleStatus::Active {
            return Err(GameError::invalid_state(format!(
                "Battle {battle_id} is no longer active"
            )));
        }
        let faction = def.faction;
        let slot = battle.first_empty_slot(faction).ok_or_else(|| {
            GameError::invalid_state(format!(
                "All {} slots of battle {battle_id} are taken",
                faction.label()
            ))
        })?;

        let mut placed = BattleCard {
            card_id: def.id.clone(),
            owner: player.to_string(),
            current_soldiers: def.soldiers,
            is_alive: true,
        };
        battle.record_participant(player, faction);
        self.war.record_participant(player, faction).await;
        battle.last_activity = now_ms();

        let mut combat = None;
        let mut combat_log = None;
        if let Some((opponent_slot, opponent_card)) =
            select_random_opponent(&battle, faction, rng)
        {
            let mut opponent = opponent_card.clone();
            let opponent_def = self
                .catalog
                .get(&opponent.card_id)
                .cloned()
                .ok_or_else(|| {
                    GameError::storage(format!(
                        "Battle {battle_id} references unknown card {}",
                        opponent.card_id
                    ))
                })?;
            let result = resolve_skirmish(
                &def,
                &mut placed,
                &opponent_def,
                &mut opponent,
                battle.map,
                rng,
            );
            battle.slots_mut(faction.opponent())[opponent_slot] = Some(opponent);
            combat_log = Some(format_combat_log(&result));
            combat = Some(result);
        }
        battle.slots_mut(faction)[slot] = Some(placed);

        let resolution = resolution::resolve_if_due(self, &mut battle, now_ms()).await?;
        self.save_battle(&battle).await?;
        self.store.persist().await;

        Ok(Placement {
            battle,
            slot,
            faction,
            combat,
            combat_log,
            resolution,
        })
    }

    pub async fn get_battle(&self, battle_id: u64) -> Result<Option<Battle>, GameError> {
        self.load_battle(battle_id).await
    }

    pub async fn get_battle_by_post_id(&self, post_id: &str) -> Result<Option<Battle>, GameError> {
        match self.store.get(&post_key(post_id)).await {
            None => Ok(None),
            Some(raw) => match raw.parse::<u64>() {
                Ok(id) => self.load_battle(id).await,
                Err(_) => Err(GameError::storage(format!(
                    "Post index for {post_id} is corrupted"
                ))),
            },
        }
    }

    /// Active battles in creation order. Dangling index entries are logged
    /// and skipped rather than failing the whole listing.
    pub async fn get_active_battles(&self) -> Result<Vec<Battle>, GameError> {
        let ids = self.store.zrange(ACTIVE_KEY, 0, usize::MAX).await;
        let mut battles = Vec::with_capacity(ids.len());
        for (raw_id, _) in ids {
            let id = match raw_id.parse::<u64>() {
                Ok(id) => id,
                Err(_) => {
                    log::warn!("Active index holds a non-numeric battle id {raw_id}");
                    continue;
                }
            };
            match self.load_battle(id).await? {
                Some(battle) => battles.push(battle),
                None => log::warn!("Active index lists battle {id} but no record exists"),
            }
        }
        Ok(battles)
    }

    pub async fn is_battle_full(&self, battle_id: u64) -> Result<bool, GameError> {
        let battle = self
            .load_battle(battle_id)
            .await?
            .ok_or_else(|| GameError::not_found(format!("Battle {battle_id} not found")))?;
        Ok(battle.is_full())
    }

    pub(crate) async fn save_battle(&self, battle: &Battle) -> Result<(), GameError> {
        let json = battle.to_json()?;
        self.store.set(&battle_key(battle.id), json).await;
        Ok(())
    }

    pub(crate) async fn load_battle(&self, battle_id: u64) -> Result<Option<Battle>, GameError> {
        match self.store.get(&battle_key(battle_id)).await {
            None => Ok(None),
            Some(raw) => Battle::from_json(&raw).map(Some).map_err(GameError::Storage),
        }
    }

    pub(crate) async fn remove_from_active(&self, battle_id: u64) {
        self.store.zrem(ACTIVE_KEY, &battle_id.to_string()).await;
    }
}

/// Uniform pick among the living cards of the opposing faction. `None` when
/// nobody stands there yet, which is normal for early placements.
pub fn select_random_opponent<'a, R: RngCore>(
    battle: &'a Battle,
    attacker_faction: Faction,
    rng: &mut R,
) -> Option<(usize, &'a BattleCard)> {
    let living = battle.living_cards(attacker_faction.opponent());
    if living.is_empty() {
        return None;
    }
    let pick = (rng.next_u64() % living.len() as u64) as usize;
    Some(living[pick])
}
