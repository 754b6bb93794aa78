//! # Card & Conquer
//!
//! The battle core of a faction card war: two sides, West and East, fight
//! over shared battles of ten slots each. Placing a card triggers one
//! skirmish against a random defender; full or idle battles resolve, pay
//! their participants and push the faction war slider until one side takes
//! the whole campaign.
//!
//! ## Architecture
//!
//! A Rocket API over a small in-memory key-value store. One `GameServices`
//! value is managed state; every battle mutation runs behind a per-battle
//! async lock and all randomness flows through a seedable generator so runs
//! can be replayed. A background sweep resolves battles nobody touches.

// Rocket makes this a bit tricky to support
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rand_pcg::Lcg64Xsh32;
use rocket::futures::lock::Mutex;
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};

pub mod battle;
pub mod catalog;
pub mod combat;
pub mod error;
pub mod players;
pub mod scheduler;
pub mod status_messages;
pub mod store;
pub mod war;

use crate::battle::types::now_ms;
use crate::battle::BattleService;
use crate::catalog::Catalog;
use crate::combat::rng_from_seed;
use crate::players::PlayerService;
use crate::store::snapshot::{SnapshotWriter, StoreSnapshot};
use crate::store::Store;
use crate::war::WarService;

/// Snapshot file path; unset means state lives in memory only.
pub const STATE_FILE_ENV: &str = "CARD_CONQUER_STATE_FILE";
/// Fixed RNG seed for reproducible runs; unset seeds from the clock.
pub const SEED_ENV: &str = "CARD_CONQUER_SEED";

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct GameServices {
    pub catalog: Arc<Catalog>,
    pub store: Store,
    pub players: PlayerService,
    pub war: WarService,
    pub battles: BattleService,
    pub rng: Arc<Mutex<Lcg64Xsh32>>,
}

impl GameServices {
    pub fn new(seed: u64) -> GameServices {
        GameServices::with_store(Store::new(), seed)
    }

    /// A bad catalog is a deployment defect; refuse to serve anything.
    pub fn with_store(store: Store, seed: u64) -> GameServices {
        let catalog = match Catalog::load() {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => panic!("Card catalog validation failed: {e}"),
        };
        let players = PlayerService::new(store.clone());
        let war = WarService::new(store.clone(), players.clone());
        let battles = BattleService::new(
            store.clone(),
            Arc::clone(&catalog),
            players.clone(),
            war.clone(),
        );
        GameServices {
            catalog,
            store,
            players,
            war,
            battles,
            rng: Arc::new(Mutex::new(rng_from_seed(seed))),
        }
    }

    /// Flush and stop the snapshot writer.
    pub fn shutdown(&self) {
        self.store.shutdown();
    }
}

fn seed_from_env() -> u64 {
    match std::env::var(SEED_ENV) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(seed) => seed,
            Err(_) => {
                log::warn!("{SEED_ENV} is not a number, seeding from the clock");
                now_ms() as u64
            }
        },
        Err(_) => now_ms() as u64,
    }
}

/// Build the managed services, restoring state from the snapshot file when
/// one is configured.
fn services_from_env() -> GameServices {
    let seed = seed_from_env();
    match std::env::var(STATE_FILE_ENV) {
        Ok(path) => {
            let store = match StoreSnapshot::load_from_file(&path) {
                Ok(snap) => {
                    log::info!("Restored game state from {path}");
                    Store::from_snapshot(snap)
                }
                Err(e) => {
                    log::warn!("Starting with fresh state: {e}");
                    Store::new()
                }
            };
            store.attach_writer(SnapshotWriter::new(path));
            GameServices::with_store(store, seed)
        }
        Err(_) => GameServices::new(seed),
    }
}

/// Initializes and configures the Rocket web server with all routes and
/// OpenAPI documentation.
///
/// # Returns
///
/// A configured Rocket instance ready to be launched.
///
/// # Example
///
/// ```no_run
/// use card_conquer::rocket_initialize;
///
/// #[rocket::main]
/// async fn main() {
///     rocket_initialize().launch().await.expect("Failed to launch rocket");
/// }
/// ```
pub fn rocket_initialize() -> rocket::Rocket<rocket::Build> {
    use crate::battle::endpoints::okapi_add_operation_for_create_battle_;
    use crate::battle::endpoints::okapi_add_operation_for_get_active_battles_;
    use crate::battle::endpoints::okapi_add_operation_for_get_battle_;
    use crate::battle::endpoints::okapi_add_operation_for_get_battle_by_post_;
    use crate::battle::endpoints::okapi_add_operation_for_place_card_;
    use crate::battle::endpoints::okapi_add_operation_for_resolve_battle_;
    use crate::battle::endpoints::{
        create_battle, get_active_battles, get_battle, get_battle_by_post, place_card,
        resolve_battle,
    };
    use crate::players::okapi_add_operation_for_get_leaderboard_;
    use crate::players::okapi_add_operation_for_get_player_profile_;
    use crate::players::{get_leaderboard, get_player_profile};
    use crate::scheduler::okapi_add_operation_for_get_battle_sweep_stats_;
    use crate::scheduler::okapi_add_operation_for_run_battle_sweep_;
    use crate::scheduler::{get_battle_sweep_stats, run_battle_sweep};
    use crate::war::get_war;
    use crate::war::okapi_add_operation_for_get_war_;

    #[allow(clippy::no_effect_underscore_binding)]
    let _ = env_logger::try_init();

    use rocket::fairing::AdHoc;

    let services = services_from_env();

    rocket::build()
        .mount(
            "/",
            openapi_get_routes![
                create_battle,
                place_card,
                get_battle,
                get_active_battles,
                get_battle_by_post,
                resolve_battle,
                get_war,
                get_leaderboard,
                get_player_profile,
                run_battle_sweep,
                get_battle_sweep_stats
            ],
        )
        .mount("/swagger", make_swagger_ui(&get_docs()))
        .manage(services)
        .attach(AdHoc::on_liftoff("battle-sweep", |rocket| {
            Box::pin(async move {
                if let Some(services) = rocket.state::<GameServices>().cloned() {
                    rocket::tokio::spawn(async move {
                        let mut interval = rocket::tokio::time::interval(
                            std::time::Duration::from_secs(scheduler::SWEEP_INTERVAL_SECS),
                        );
                        loop {
                            interval.tick().await;
                            scheduler::resolve_pending_battles(&services).await;
                        }
                    });
                }
            })
        }))
        .attach(AdHoc::on_liftoff("snapshot-shutdown", |rocket| {
            Box::pin(async move {
                // When the process receives SIGINT/SIGTERM (or ctrl-c), write
                // a final snapshot and flush the writer
                if let Some(services) = rocket.state::<GameServices>().cloned() {
                    rocket::tokio::spawn(async move {
                        #[cfg(unix)]
                        {
                            use rocket::tokio::signal::unix::{signal, SignalKind};
                            let mut sigterm = signal(SignalKind::terminate())
                                .expect("failed to set SIGTERM handler");
                            let mut sigint = signal(SignalKind::interrupt())
                                .expect("failed to set SIGINT handler");
                            rocket::tokio::select! {
                                _ = sigterm.recv() => {},
                                _ = sigint.recv() => {},
                            }
                        }
                        #[cfg(not(unix))]
                        {
                            let _ = rocket::tokio::signal::ctrl_c().await;
                        }

                        services.store.persist().await;
                        services.shutdown();
                    });
                }
            })
        }))
}

fn get_docs() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}
