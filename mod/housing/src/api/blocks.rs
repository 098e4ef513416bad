use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use dorm_core::{ListParams, ServiceError};

use crate::api::AppState;
use crate::model::CreateBlock;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/blocks", get(list_blocks).post(create_block))
        .route(
            "/blocks/{id}",
            get(get_block).put(update_block).delete(delete_block),
        )
}

async fn list_blocks(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = svc.list_blocks(&params).map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

async fn create_block(
    State(svc): State<AppState>,
    Json(input): Json<CreateBlock>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ServiceError> {
    let block = svc.create_block(input).map_err(ServiceError::from)?;
    Ok((axum::http::StatusCode::CREATED, Json(serde_json::to_value(block).unwrap())))
}

async fn get_block(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let block = svc.get_block(&id).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(block).unwrap()))
}

async fn update_block(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let block = svc.update_block(&id, patch).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(block).unwrap()))
}

async fn delete_block(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ServiceError> {
    svc.delete_block(&id).map_err(ServiceError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
