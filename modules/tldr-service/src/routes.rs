//! Axum route handlers for the tldr RPC API.

use crate::commands::{self, CommandContext};
use crate::echo::EchoSettings;
use crate::lanes::ConversationLanes;
use crate::notes::Selector;
use crate::router::CommandRouter;
use crate::shared::{self, SharedCommand, SharedError, TldrShared};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tldr_types::*;

pub struct AppState {
    pub router: Arc<CommandRouter>,
    pub echo: Arc<EchoSettings>,
    pub shared: Arc<TldrShared>,
    pub lanes: Arc<ConversationLanes>,
    pub start_time: Instant,
}

// POST /rpc/tldr/command
pub async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<RpcResponse<Vec<OutboundMessage>>>) {
    let Some(cmd) = commands::parse(&req.text) else {
        return (StatusCode::OK, Json(RpcResponse::ok(Vec::new())));
    };

    let ctx = CommandContext {
        conv_id: &req.conv_id,
        user_id: &req.user_id,
        user_name: &req.user_name,
        is_admin: req.is_admin,
    };

    let _lane = state.lanes.acquire(&req.conv_id).await;
    match commands::execute(cmd, &ctx, &state.router, &state.echo) {
        Ok(messages) => (StatusCode::OK, Json(RpcResponse::ok(messages))),
        Err(e) => {
            log::error!("TL;DR: Command failed in conversation {}: {}", req.conv_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e)))
        }
    }
}

// POST /rpc/tldr/shared
pub async fn shared(
    State(state): State<Arc<AppState>>,
    Json(args): Json<Value>,
) -> (StatusCode, Json<RpcResponse<Option<String>>>) {
    // Validated up front so the conversation lane is known before running.
    let req = match shared::parse_request(&args) {
        Ok(req) => req,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(RpcResponse::err(e.to_string()))),
    };

    let _lane = state.lanes.acquire(&req.conv_id).await;
    match state.shared.call(&args) {
        Ok(text) => (StatusCode::OK, Json(RpcResponse::ok(text))),
        Err(SharedError::Input(e)) => {
            (StatusCode::BAD_REQUEST, Json(RpcResponse::err(e.to_string())))
        }
        Err(SharedError::Store(e)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e)))
        }
    }
}

// POST /rpc/tldr/notes
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConversationRequest>,
) -> (StatusCode, Json<RpcResponse<Vec<NoteView>>>) {
    let _lane = state.lanes.acquire(&req.conv_id).await;
    match state.router.notes().list(&req.conv_id, Selector::All) {
        Ok(notes) => {
            let views = notes
                .into_iter()
                .map(|n| NoteView {
                    position: n.position,
                    timestamp: n.timestamp,
                    text: n.text,
                    age: n.age,
                })
                .collect();
            (StatusCode::OK, Json(RpcResponse::ok(views)))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e))),
    }
}

// POST /rpc/tldr/echo
pub async fn echo_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConversationRequest>,
) -> (StatusCode, Json<RpcResponse<EchoStatus>>) {
    let _lane = state.lanes.acquire(&req.conv_id).await;
    let status = state
        .echo
        .conversation_value(&req.conv_id)
        .and_then(|value| {
            let effective = state.echo.effective(&req.conv_id)?;
            Ok(EchoStatus {
                conv_id: req.conv_id.clone(),
                conversation_value: value,
                effective,
            })
        });

    match status {
        Ok(s) => (StatusCode::OK, Json(RpcResponse::ok(s))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e))),
    }
}

// GET /rpc/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<ServiceStatus>>) {
    let collections = state.router.notes().collections();
    (
        StatusCode::OK,
        Json(RpcResponse::ok(ServiceStatus {
            running: true,
            uptime_secs: state.start_time.elapsed().as_secs(),
            conversations: collections.len(),
            total_notes: collections.iter().map(|c| c.len()).sum(),
            active_lanes: state.lanes.stats().active_lanes,
        })),
    )
}

// POST /rpc/backup/export
pub async fn backup_export(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<Vec<BackupEntry>>>) {
    let _global = state.lanes.acquire_global().await;
    let entries: Vec<BackupEntry> = state
        .router
        .notes()
        .collections()
        .iter()
        .flat_map(|c| {
            c.notes().iter().map(|n| BackupEntry {
                conv_id: c.conv_id().to_string(),
                timestamp: n.key.clone(),
                text: n.text.clone(),
            })
        })
        .collect();
    (StatusCode::OK, Json(RpcResponse::ok(entries)))
}

// POST /rpc/backup/restore
pub async fn backup_restore(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BackupRestoreRequest>,
) -> (StatusCode, Json<RpcResponse<usize>>) {
    let _global = state.lanes.acquire_global().await;
    match state.router.notes().replace_all(&req.notes) {
        Ok(count) => (StatusCode::OK, Json(RpcResponse::ok(count))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e))),
    }
}
