//! Player balances, faction points and the per-faction leaderboards.
//!
//! Everything here is a hash or sorted-set increment, so concurrent battle
//! resolutions crediting the same player commute instead of clobbering.

use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::catalog::Faction;
use crate::error::{to_rejection, ApiRejection, GameError};
use crate::store::Store;
use crate::GameServices;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PlayerProfile {
    pub username: String,
    pub coins: i64,
    pub xp: i64,
    pub points_west: i64,
    pub points_east: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub points: i64,
}

#[derive(Debug, Clone)]
pub struct PlayerService {
    store: Store,
}

impl PlayerService {
    pub fn new(store: Store) -> PlayerService {
        PlayerService { store }
    }

    pub async fn credit_coins(&self, username: &str, amount: i64) -> Result<i64, GameError> {
        validate_username(username)?;
        Ok(self
            .store
            .hincr_by(&player_key(username), "coins", amount)
            .await)
    }

    pub async fn credit_xp(&self, username: &str, amount: i64) -> Result<i64, GameError> {
        validate_username(username)?;
        Ok(self.store.hincr_by(&player_key(username), "xp", amount).await)
    }

    /// One faction point on the player hash plus one on that faction's
    /// leaderboard, so profile and ranking never drift apart.
    pub async fn add_faction_point(
        &self,
        username: &str,
        faction: Faction,
    ) -> Result<i64, GameError> {
        validate_username(username)?;
        let field = match faction {
            Faction::West => "points_west",
            Faction::East => "points_east",
        };
        let points = self.store.hincr_by(&player_key(username), field, 1).await;
        self.store
            .zincr_by(&leaderboard_key(faction), username, 1)
            .await;
        Ok(points)
    }

    /// Profile with zeroed balances for players we have never seen.
    pub async fn get_profile(&self, username: &str) -> Result<PlayerProfile, GameError> {
        validate_username(username)?;
        let fields = self.store.hgetall(&player_key(username)).await;
        let read = |field: &str| {
            fields
                .get(field)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        };
        Ok(PlayerProfile {
            username: username.to_string(),
            coins: read("coins"),
            xp: read("xp"),
            points_west: read("points_west"),
            points_east: read("points_east"),
        })
    }

    /// Top players of a faction, best first, ranks starting at 1. Ties
    /// share points but are ordered by name so output is stable.
    pub async fn get_top_players(&self, faction: Faction, limit: usize) -> Vec<LeaderboardEntry> {
        if limit == 0 {
            return Vec::new();
        }
        self.store
            .zrange_rev(&leaderboard_key(faction), 0, limit - 1)
            .await
            .into_iter()
            .enumerate()
            .map(|(idx, (username, points))| LeaderboardEntry {
                rank: idx + 1,
                username,
                points,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct LeaderboardResponse {
    pub faction: Faction,
    pub entries: Vec<LeaderboardEntry>,
}

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[openapi]
#[get("/leaderboard/<faction>?<limit>")]
pub async fn get_leaderboard(
    services: &State<GameServices>,
    faction: String,
    limit: Option<usize>,
) -> Result<Json<LeaderboardResponse>, ApiRejection> {
    let faction = match Faction::parse(&faction) {
        Some(faction) => faction,
        None => {
            return Err(to_rejection(GameError::not_found(format!(
                "Faction {faction} unknown"
            ))))
        }
    };
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);
    let entries = services.players.get_top_players(faction, limit).await;
    Ok(Json(LeaderboardResponse { faction, entries }))
}

#[openapi]
#[get("/players/<username>")]
pub async fn get_player_profile(
    services: &State<GameServices>,
    username: String,
) -> Result<Json<PlayerProfile>, ApiRejection> {
    services
        .players
        .get_profile(&username)
        .await
        .map(Json)
        .map_err(to_rejection)
}

fn player_key(username: &str) -> String {
    format!("player:{username}")
}

fn leaderboard_key(faction: Faction) -> String {
    format!("leaderboard:{}", faction.as_key())
}

fn validate_username(username: &str) -> Result<(), GameError> {
    if username.trim().is_empty() {
        return Err(GameError::invalid_state(
            "Player name must not be blank".to_string(),
        ));
    }
    Ok(())
}
