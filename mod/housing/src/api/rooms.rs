use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};

use dorm_core::{ListParams, ServiceError};

use crate::api::AppState;
use crate::model::{AssignStudent, ChangeCapacity, CreateRoom};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", get(get_room).put(update_room).delete(delete_room))
        .route("/rooms/{id}/capacity", put(change_capacity))
        .route("/rooms/{id}/occupants", get(list_occupants).post(assign_student))
        .route("/rooms/{id}/occupants/{student_id}", delete(remove_student))
        .route("/rooms/{id}/@vacate", post(vacate_room))
}

async fn list_rooms(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = svc.list_rooms(&params).map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

async fn create_room(
    State(svc): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ServiceError> {
    let room = svc.create_room(input).map_err(ServiceError::from)?;
    Ok((axum::http::StatusCode::CREATED, Json(serde_json::to_value(room).unwrap())))
}

async fn get_room(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let detail = svc.get_room_detail(&id).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(detail).unwrap()))
}

async fn update_room(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let room = svc.update_room(&id, patch).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(room).unwrap()))
}

async fn delete_room(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ServiceError> {
    svc.delete_room(&id).map_err(ServiceError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn change_capacity(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ChangeCapacity>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let room = svc
        .change_capacity(&id, input.capacity)
        .map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(room).unwrap()))
}

async fn list_occupants(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let detail = svc.get_room_detail(&id).map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({"items": detail.occupants})))
}

async fn assign_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AssignStudent>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ServiceError> {
    let detail = svc
        .assign_student(&id, &input.student_no)
        .map_err(ServiceError::from)?;
    Ok((axum::http::StatusCode::CREATED, Json(serde_json::to_value(detail).unwrap())))
}

async fn remove_student(
    State(svc): State<AppState>,
    Path((id, student_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let detail = svc
        .remove_student(&id, &student_id)
        .map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(detail).unwrap()))
}

/// Detach every occupant of a room in one call.
async fn vacate_room(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let room = svc.vacate_room(&id).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(room).unwrap()))
}
