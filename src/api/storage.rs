//! Storage endpoints
//!
//! GET  /loopchain/dataloader_length - loop count for a stored key
//! POST /loopchain/execute           - run a storage node
//! POST /loopchain/is_changed        - re-run marker for a node
//! GET  /loopchain/inputs            - loadable files and folders, stored keys
//! GET  /loopchain/nodes             - registered node classes

use std::num::NonZeroUsize;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AppState;
use crate::nodes::{NodeRequest, NODE_CLASSES};
use crate::storage::{StorageError, StorageKey, StoreKind};

/// Build the storage router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/loopchain/dataloader_length", get(dataloader_length))
        .route("/loopchain/execute", post(execute))
        .route("/loopchain/is_changed", post(is_changed))
        .route("/loopchain/inputs", get(inputs))
        .route("/loopchain/nodes", get(nodes))
}

/// Length query params
#[derive(Debug, Deserialize)]
pub struct LengthQuery {
    #[serde(rename = "type")]
    pub kind: StoreKind,
    pub key: String,
    pub batch_size: NonZeroUsize,
}

/// Length response, `-1` for an unknown key
#[derive(Debug, Serialize)]
pub struct LengthResponse {
    pub result: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// How many loop iterations a key supports
///
/// Read-only: never creates or removes keys.
async fn dataloader_length(
    State(state): State<AppState>,
    Query(params): Query<LengthQuery>,
) -> impl IntoResponse {
    let length = state
        .runner
        .storage()
        .length(params.kind, &params.key, params.batch_size);
    debug!(
        "Length query {} {:?} (batch_size {}): {:?}",
        params.kind, params.key, params.batch_size, length
    );

    Json(LengthResponse {
        result: length.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX)),
    })
}

/// Validate and run a node
async fn execute(State(state): State<AppState>, Json(req): Json<NodeRequest>) -> Response {
    let runner = state.runner.clone();
    let class_type = req.class_type();

    // Loads decode images synchronously
    let result = tokio::task::spawn_blocking(move || {
        runner.validate(&req)?;
        runner.execute(req)
    })
    .await;

    match result {
        Ok(Ok(output)) => (StatusCode::OK, Json(output)).into_response(),
        Ok(Err(e)) => {
            warn!("{} failed: {}", class_type, e);
            storage_error(e)
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("node task failed: {}", e),
            }),
        )
            .into_response(),
    }
}

/// Re-run marker for a node
async fn is_changed(State(state): State<AppState>, Json(req): Json<NodeRequest>) -> Response {
    let runner = state.runner.clone();

    match tokio::task::spawn_blocking(move || runner.is_changed(&req)).await {
        Ok(Ok(marker)) => (StatusCode::OK, Json(marker)).into_response(),
        Ok(Err(e)) => storage_error(e),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("node task failed: {}", e),
            }),
        )
            .into_response(),
    }
}

/// Input choices response
#[derive(Debug, Serialize)]
pub struct InputsResponse {
    pub files: Vec<String>,
    pub folders: Vec<String>,
    pub image_keys: Vec<StorageKey>,
    pub latent_keys: Vec<StorageKey>,
}

/// Files and folders in the input directory, plus keys already stored
async fn inputs(State(state): State<AppState>) -> Response {
    let sources = state.runner.sources();
    let listing = sources
        .list_files()
        .and_then(|files| Ok((files, sources.list_folders()?)));

    match listing {
        Ok((files, folders)) => {
            let storage = state.runner.storage();
            Json(InputsResponse {
                files,
                folders,
                image_keys: storage.images().keys(),
                latent_keys: storage.latents().keys(),
            })
            .into_response()
        }
        Err(e) => {
            warn!("Input listing failed: {}", e);
            storage_error(e)
        }
    }
}

/// Registered node classes
async fn nodes() -> impl IntoResponse {
    Json(NODE_CLASSES)
}

fn storage_error(e: StorageError) -> Response {
    let status = match &e {
        StorageError::Missing { .. } => StatusCode::NOT_FOUND,
        StorageError::OutOfRange { .. }
        | StorageError::InvalidFile(_)
        | StorageError::EmptyFolder(_) => StatusCode::BAD_REQUEST,
        StorageError::Tensor(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorageError::Decode { .. } | StorageError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}
