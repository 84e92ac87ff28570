//! API request handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use reef_engine::ShardStats;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::HttpError;

/// Request body for `PUT /kv/{key}`.
///
/// Unknown fields are ignored, so a body of `{"key": .., "value": ..}` is
/// accepted; the key in the path always wins.
#[derive(Debug, Deserialize)]
pub(crate) struct PutValue {
    pub value: String,
}

/// Response body for `GET /kv/{key}`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ValueResponse {
    pub value: String,
}

/// Response body for successful mutations.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MutationResponse {
    pub message: String,
    pub key: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub keys_stored: usize,
}

// -----------------------------------------------------------------------
// GET /
// -----------------------------------------------------------------------

/// Service description and endpoint list.
pub(crate) async fn root(State(state): State<AppState>) -> Json<Value> {
    let num_shards = state.manager.config().shard_ids.len();
    Json(json!({
        "service": "Reef KV Store",
        "version": env!("CARGO_PKG_VERSION"),
        "sharding": {
            "enabled": true,
            "num_shards": num_shards,
        },
        "endpoints": {
            "health": "/health",
            "stats": "/stats",
            "get": "GET /kv/{key}",
            "put": "PUT /kv/{key}",
            "delete": "DELETE /kv/{key}",
        },
    }))
}

// -----------------------------------------------------------------------
// GET /health
// -----------------------------------------------------------------------

pub(crate) async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, HttpError> {
    let keys_stored = state.manager.size().await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.to_string(),
        keys_stored,
    }))
}

// -----------------------------------------------------------------------
// /kv/{key}
// -----------------------------------------------------------------------

pub(crate) async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>, HttpError> {
    match state.manager.get(&key).await? {
        Some(value) => {
            info!(key, "GET");
            Ok(Json(ValueResponse { value }))
        }
        None => Err(HttpError::NotFound { key }),
    }
}

pub(crate) async fn put_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<PutValue>, JsonRejection>,
) -> Result<Json<MutationResponse>, HttpError> {
    let Json(body) = body.map_err(|e| HttpError::InvalidRequest {
        message: e.body_text(),
    })?;

    state.manager.put(&key, &body.value).await?;
    info!(key, value_length = body.value.len(), "PUT");

    Ok(Json(MutationResponse {
        message: "success".to_string(),
        key,
    }))
}

pub(crate) async fn delete_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MutationResponse>, HttpError> {
    if !state.manager.delete(&key).await? {
        return Err(HttpError::NotFound { key });
    }
    info!(key, "DELETE");

    Ok(Json(MutationResponse {
        message: "deleted".to_string(),
        key,
    }))
}

// -----------------------------------------------------------------------
// GET /stats
// -----------------------------------------------------------------------

pub(crate) async fn stats(State(state): State<AppState>) -> Result<Json<ShardStats>, HttpError> {
    Ok(Json(state.manager.get_stats().await?))
}
