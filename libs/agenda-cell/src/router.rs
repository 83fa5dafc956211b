// libs/agenda-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn agenda_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/appointments", get(handlers::list_appointments))
        .route("/appointments", post(handlers::create_appointment))
        .route("/appointments/{appointment_id}", put(handlers::update_appointment))
        .route("/appointments/{appointment_id}", delete(handlers::delete_appointment))
        .route("/availability", get(handlers::get_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
