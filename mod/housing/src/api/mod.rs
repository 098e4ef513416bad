mod blocks;
mod rooms;
mod students;

use std::sync::Arc;

use axum::Router;

use crate::service::HousingService;

/// Shared application state.
pub type AppState = Arc<HousingService>;

/// Build the complete housing API router, nested under `/housing`.
pub fn build_router(svc: Arc<HousingService>) -> Router {
    let api = Router::new()
        .merge(blocks::routes())
        .merge(rooms::routes())
        .merge(students::routes());

    Router::new().nest("/housing", api).with_state(svc)
}
