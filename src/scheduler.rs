//! Periodic battle sweep.
//!
//! A background loop (and an HTTP trigger for external schedulers) walks the
//! active-battle index and runs the idempotent resolution check on each
//! entry. The batch is bounded so one sweep can never monopolize the store;
//! whatever is left over is simply picked up by the next run.

use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::battle::resolution;
use crate::battle::types::now_ms;
use crate::store::Store;
use crate::GameServices;

/// Most battles one sweep will look at.
pub const SWEEP_BATCH_LIMIT: usize = 50;
/// Seconds between background sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

const STATS_KEY: &str = "scheduler:battle_sweep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SweepStats {
    pub checked: u64,
    pub resolved: u64,
    pub errors: u64,
}

/// Cumulative sweep observability, read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SweepReport {
    pub runs: i64,
    pub last_run_at: Option<i64>,
    pub last_checked: i64,
    pub last_resolved: i64,
    pub last_errors: i64,
    pub total_errors: i64,
}

/// One bounded pass over the active battles. Per-battle failures are
/// counted and logged, never fatal for the sweep.
pub async fn resolve_pending_battles(services: &GameServices) -> SweepStats {
    let candidates = services
        .store
        .zrange("battles:active", 0, SWEEP_BATCH_LIMIT - 1)
        .await;
    let mut stats = SweepStats {
        checked: 0,
        resolved: 0,
        errors: 0,
    };
    for (raw_id, _) in candidates {
        let battle_id = match raw_id.parse::<u64>() {
            Ok(id) => id,
            Err(_) => {
                log::warn!("Sweep found a non-numeric battle id {raw_id} in the active index");
                stats.errors += 1;
                continue;
            }
        };
        stats.checked += 1;
        match resolution::check_and_resolve_battle(&services.battles, battle_id).await {
            Ok(Some(_)) => stats.resolved += 1,
            Ok(None) => {}
            Err(e) => {
                stats.errors += 1;
                log::warn!("Sweep could not resolve battle {battle_id}: {e}");
            }
        }
    }
    record_sweep(&services.store, &stats).await;
    log::info!(
        "Battle sweep done: {} checked, {} resolved, {} errors",
        stats.checked,
        stats.resolved,
        stats.errors
    );
    stats
}

async fn record_sweep(store: &Store, stats: &SweepStats) {
    store.hincr_by(STATS_KEY, "runs", 1).await;
    store
        .hincr_by(STATS_KEY, "total_errors", stats.errors as i64)
        .await;
    store
        .hset_multi(
            STATS_KEY,
            &[
                ("last_run_at", now_ms().to_string()),
                ("last_checked", stats.checked.to_string()),
                ("last_resolved", stats.resolved.to_string()),
                ("last_errors", stats.errors.to_string()),
            ],
        )
        .await;
}

pub async fn get_sweep_report(store: &Store) -> SweepReport {
    let fields = store.hgetall(STATS_KEY).await;
    let read = |field: &str| {
        fields
            .get(field)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };
    SweepReport {
        runs: read("runs"),
        last_run_at: fields
            .get("last_run_at")
            .and_then(|v| v.parse::<i64>().ok()),
        last_checked: read("last_checked"),
        last_resolved: read("last_resolved"),
        last_errors: read("last_errors"),
        total_errors: read("total_errors"),
    }
}

#[openapi]
#[post("/scheduler/battle-sweep")]
pub async fn run_battle_sweep(services: &State<GameServices>) -> Json<SweepStats> {
    Json(resolve_pending_battles(services).await)
}

#[openapi]
#[get("/scheduler/battle-sweep")]
pub async fn get_battle_sweep_stats(services: &State<GameServices>) -> Json<SweepReport> {
    Json(get_sweep_report(&services.store).await)
}
