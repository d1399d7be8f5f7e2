//! TL;DR Service: standalone binary keeping short per-conversation notes.
//!
//! Hosts an RPC API that chat hosts forward `tldr` commands to.
//! Default: http://127.0.0.1:9103/

mod clock;
mod commands;
mod config;
mod db;
mod echo;
mod lanes;
mod messages;
mod notes;
mod router;
mod routes;
mod shared;

use config::ServiceConfig;
use routes::AppState;
use shared::SharedCommand;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let cfg = ServiceConfig::from_env();

    log::info!("Opening database at: {}", cfg.db_path);
    let database = Arc::new(db::Db::open(&cfg.db_path).expect("Failed to open database"));

    let memory = Arc::new(
        db::JsonStore::open(database.clone(), db::MEMORY_DOCUMENT)
            .expect("Failed to load memory document"),
    );
    let config_store = Arc::new(
        db::JsonStore::open(database, db::CONFIG_DOCUMENT)
            .expect("Failed to load config document"),
    );

    if let Some(value) = &cfg.echo_default {
        log::info!("Setting global TL;DR echo default to '{}'", value);
        echo::set_global_default(config_store.as_ref(), value)
            .expect("Failed to store echo default");
    }

    let notes = Arc::new(notes::NoteStore::new(
        memory.clone(),
        Arc::new(clock::SystemClock),
    ));
    let router = Arc::new(router::CommandRouter::new(
        notes,
        Arc::new(messages::Untranslated),
    ));
    let lanes = lanes::ConversationLanes::new();

    let prune_lanes = lanes.clone();
    tokio::spawn(async move {
        let idle = Duration::from_secs(lanes::LANE_IDLE_TIMEOUT_SECS);
        let mut interval = tokio::time::interval(idle);
        loop {
            interval.tick().await;
            let pruned = prune_lanes.prune_idle(idle);
            if pruned > 0 {
                let stats = prune_lanes.stats();
                log::debug!(
                    "Pruned {} idle conversation lanes ({} left, {} requests served)",
                    pruned,
                    stats.total_lanes,
                    stats.total_requests_processed
                );
            }
        }
    });

    let tldr_shared = Arc::new(shared::TldrShared::new(router.clone()));
    log::info!("Registered shared command '{}'", tldr_shared.name());

    let state = Arc::new(AppState {
        shared: tldr_shared,
        echo: Arc::new(echo::EchoSettings::new(memory, config_store)),
        router,
        lanes,
        start_time: Instant::now(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        .route("/rpc/tldr/command", axum::routing::post(routes::command))
        .route("/rpc/tldr/shared", axum::routing::post(routes::shared))
        .route("/rpc/tldr/notes", axum::routing::post(routes::list_notes))
        .route("/rpc/tldr/echo", axum::routing::post(routes::echo_status))
        .route("/rpc/status", axum::routing::get(routes::status))
        .route("/rpc/backup/export", axum::routing::post(routes::backup_export))
        .route("/rpc/backup/restore", axum::routing::post(routes::backup_restore))
        .with_state(state)
        .layer(cors);

    let addr = format!("127.0.0.1:{}", cfg.port);
    log::info!("TL;DR Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
