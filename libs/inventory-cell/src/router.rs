// libs/inventory-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn inventory_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/items", get(handlers::list_items))
        .route("/items", post(handlers::create_item))
        .route("/items/{item_id}", get(handlers::get_item))
        .route("/items/{item_id}", put(handlers::update_item))
        .route("/items/{item_id}", delete(handlers::delete_item))
        .route("/alerts", get(handlers::list_alerts))
        .route("/check-alerts", post(handlers::check_alerts))
        .route("/alerts/{alert_id}/resolve", post(handlers::resolve_alert))
        .route("/kardex/items", get(handlers::kardex_items))
        .route("/kardex/movements", get(handlers::list_movements))
        .route("/kardex/movements/entry", post(handlers::record_entry))
        .route("/kardex/movements/exit", post(handlers::record_exit))
        .route("/kardex/movements/adjustment", post(handlers::record_adjustment))
        .route("/kardex/{item_id}", get(handlers::item_kardex))
        .route("/purchases", get(handlers::list_purchases))
        .route("/purchases", post(handlers::create_purchase))
        .route("/purchases/{purchase_id}", get(handlers::get_purchase))
        .route("/purchases/{purchase_id}", put(handlers::update_purchase))
        .route("/purchases/{purchase_id}", delete(handlers::delete_purchase))
        .route("/purchases/{purchase_id}/receive", post(handlers::receive_purchase))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
