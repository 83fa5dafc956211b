// libs/academic-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn academic_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Patients
        .route("/patients", get(handlers::list_patients))
        .route("/patients", post(handlers::create_patient))
        .route("/patients/{patient_id}", get(handlers::get_patient))
        .route("/patients/{patient_id}", put(handlers::update_patient))
        .route("/patients/{patient_id}", delete(handlers::delete_patient))
        // Appointments
        .route("/appointments", get(handlers::list_appointments))
        .route("/appointments", post(handlers::create_appointment))
        .route("/appointments/{appointment_id}", put(handlers::update_appointment))
        .route("/appointments/{appointment_id}", delete(handlers::delete_appointment))
        // Clinical histories
        .route("/reminders", get(handlers::list_reminders))
        .route("/histories", get(handlers::list_histories))
        .route("/histories", post(handlers::create_history))
        .route("/histories/{history_id}", get(handlers::get_history))
        .route("/histories/{history_id}", put(handlers::update_history))
        .route("/histories/{history_id}/submit", post(handlers::submit_history))
        .route("/histories/{history_id}/review", post(handlers::review_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
