pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use dorm_core::Module;

use service::HousingService;

/// Housing module — dormitory blocks, rooms, students, and occupancy.
pub struct HousingModule {
    service: Arc<HousingService>,
}

impl HousingModule {
    pub fn new(service: Arc<HousingService>) -> Self {
        Self { service }
    }
}

impl Module for HousingModule {
    fn name(&self) -> &str {
        "housing"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
