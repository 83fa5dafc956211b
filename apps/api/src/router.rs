use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use academic_cell::router::academic_routes;
use agenda_cell::router::agenda_routes;
use auth_cell::router::auth_routes;
use billing_cell::router::billing_routes;
use inventory_cell::router::inventory_routes;
use patient_cell::router::patient_routes;
use reminder_cell::router::reminder_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "MEDICSYS API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/agenda", agenda_routes(state.clone()))
        .nest("/reminders", reminder_routes(state.clone()))
        .nest("/academic", academic_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/inventory", inventory_routes(state.clone()))
        .nest("/billing", billing_routes(state.clone()))
}
