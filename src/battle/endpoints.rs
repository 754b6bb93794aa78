//! HTTP surface for battles. Thin by intent: parse, call the service,
//! translate rejections. The formatted strings ride inside the payloads so
//! an external posting layer can publish them verbatim.

use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::battle::resolution::{self, ResolutionSummary};
use crate::battle::types::Battle;
use crate::battle::Placement;
use crate::error::{to_rejection, ApiRejection, GameError};
use crate::GameServices;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CreateBattleRequest {
    pub post_id: String,
    pub card_id: String,
    pub player: String,
    /// Optional flavor name; a map-appropriate one is drawn when absent.
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PlaceCardRequest {
    pub card_id: String,
    pub player: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ResolveResponse {
    pub resolved: bool,
    pub resolution: Option<ResolutionSummary>,
}

#[openapi]
#[post("/battles", format = "json", data = "<request>")]
pub async fn create_battle(
    services: &State<GameServices>,
    request: Json<CreateBattleRequest>,
) -> Result<Created<Json<Battle>>, ApiRejection> {
    let request = request.0;
    let mut rng = services.rng.lock().await;
    match services
        .battles
        .create_battle(
            &request.post_id,
            &request.card_id,
            &request.player,
            request.location,
            &mut rng,
        )
        .await
    {
        Ok(battle) => {
            let url = format!("/battles/{}", battle.id);
            Ok(Created::new(url).body(Json(battle)))
        }
        Err(e) => Err(to_rejection(e)),
    }
}

#[openapi]
#[post("/battles/<battle_id>/cards", format = "json", data = "<request>")]
pub async fn place_card(
    services: &State<GameServices>,
    battle_id: u64,
    request: Json<PlaceCardRequest>,
) -> Result<Created<Json<Placement>>, ApiRejection> {
    let request = request.0;
    let mut rng = services.rng.lock().await;
    match services
        .battles
        .add_card_to_battle(battle_id, &request.card_id, &request.player, &mut rng)
        .await
    {
        Ok(placement) => {
            let url = format!("/battles/{battle_id}");
            Ok(Created::new(url).body(Json(placement)))
        }
        Err(e) => Err(to_rejection(e)),
    }
}

#[openapi]
#[get("/battles/<battle_id>")]
pub async fn get_battle(
    services: &State<GameServices>,
    battle_id: u64,
) -> Result<Json<Battle>, ApiRejection> {
    match services.battles.get_battle(battle_id).await {
        Ok(Some(battle)) => Ok(Json(battle)),
        Ok(None) => Err(to_rejection(GameError::not_found(format!(
            "Battle {battle_id} not found"
        )))),
        Err(e) => Err(to_rejection(e)),
    }
}

#[openapi]
#[get("/battles")]
pub async fn get_active_battles(
    services: &State<GameServices>,
) -> Result<Json<Vec<Battle>>, ApiRejection> {
    services
        .battles
        .get_active_battles()
        .await
        .map(Json)
        .map_err(to_rejection)
}

#[openapi]
#[get("/battles/by-post/<post_id>")]
pub async fn get_battle_by_post(
    services: &State<GameServices>,
    post_id: String,
) -> Result<Json<Battle>, ApiRejection> {
    match services.battles.get_battle_by_post_id(&post_id).await {
        Ok(Some(battle)) => Ok(Json(battle)),
        Ok(None) => Err(to_rejection(GameError::not_found(format!(
            "No battle for post {post_id}"
        )))),
        Err(e) => Err(to_rejection(e)),
    }
}

/// Explicit resolution check, for external schedulers and admins. Safe to
/// call any number of times.
#[openapi]
#[post("/battles/<battle_id>/resolve")]
pub async fn resolve_battle(
    services: &State<GameServices>,
    battle_id: u64,
) -> Result<Json<ResolveResponse>, ApiRejection> {
    match resolution::check_and_resolve_battle(&services.battles, battle_id).await {
        Ok(resolution) => Ok(Json(ResolveResponse {
            resolved: resolution.is_some(),
            resolution,
        })),
        Err(e) => Err(to_rejection(e)),
    }
}
