use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::chain::{ChainSlug, UnknownChain};
use crate::claim::ClaimResponse;
use crate::error::ScanError;
use crate::ingest::{IngestionReport, ScanOptions};

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let chains = state.engine.chains();
    let store_ok = match state.engine.store().list_cursors().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            false
        }
    };
    Ok(Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        store_ok,
        running: chains
            .iter()
            .filter(|c| state.engine.is_running(**c))
            .map(ToString::to_string)
            .collect(),
        chains: chains.iter().map(ToString::to_string).collect(),
    }))
}

// ============================================================
// Ingestion
// ============================================================

/// Body is optional; an empty body means default options.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path(chain): Path<String>,
    body: Bytes,
) -> ApiResult<IngestionReport> {
    let slug: ChainSlug = chain
        .parse()
        .map_err(|e: UnknownChain| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let options: ScanOptions = if body.iter().all(u8::is_ascii_whitespace) {
        ScanOptions::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid scan options: {}", e)))?
    };

    let cancel = state.shutdown.child_token();
    match state.engine.run_ingestion(slug, &options, &cancel).await {
        Ok(report) => Ok(Json(report)),
        Err(e @ ScanError::AlreadyRunning(_)) => Err(api_error(StatusCode::CONFLICT, e.to_string())),
        Err(e @ ScanError::NotConfigured(_)) => Err(api_error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ ScanError::Chain(_)) => {
            tracing::error!(chain = %slug, error = %e, "Ingestion failed");
            Err(api_error(StatusCode::BAD_GATEWAY, "Chain providers unavailable"))
        }
        Err(e @ ScanError::Store(_)) => {
            tracing::error!(chain = %slug, error = %e, "Ingestion failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable"))
        }
    }
}

// ============================================================
// Claims
// ============================================================

/// Always 200 for a terminal outcome; the `code` field carries the result.
pub async fn claim(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClaimRequest>,
) -> Json<ClaimResponse> {
    Json(
        state
            .engine
            .claims()
            .respond(&request.chain, &request.tx, request.note.as_deref())
            .await,
    )
}

// ============================================================
// Cursors
// ============================================================

pub async fn cursors(State(state): State<Arc<AppState>>) -> ApiResult<Vec<CursorResponse>> {
    state
        .engine
        .store()
        .list_cursors()
        .await
        .map(|rows| Json(rows.into_iter().map(CursorResponse::from).collect()))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list cursors");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable")
        })
}
