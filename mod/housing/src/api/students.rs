use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use dorm_core::{ListParams, ServiceError};

use crate::api::AppState;
use crate::model::CreateStudent;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
}

async fn list_students(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = svc.list_students(&params).map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

async fn create_student(
    State(svc): State<AppState>,
    Json(input): Json<CreateStudent>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ServiceError> {
    let student = svc.create_student(input).map_err(ServiceError::from)?;
    Ok((axum::http::StatusCode::CREATED, Json(serde_json::to_value(student).unwrap())))
}

async fn get_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let student = svc.get_student(&id).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(student).unwrap()))
}

async fn update_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let student = svc.update_student(&id, patch).map_err(ServiceError::from)?;
    Ok(Json(serde_json::to_value(student).unwrap()))
}

async fn delete_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ServiceError> {
    svc.delete_student(&id).map_err(ServiceError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
