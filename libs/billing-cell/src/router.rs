// libs/billing-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn billing_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/invoices", get(handlers::list_invoices))
        .route("/invoices", post(handlers::create_invoice))
        .route("/invoices/{invoice_id}", get(handlers::get_invoice))
        .route("/invoices/{invoice_id}/send-sri", post(handlers::send_invoice_to_sri))
        .route("/sri/pending-invoices", get(handlers::pending_invoices))
        .route("/sri/authorized-invoices", get(handlers::authorized_invoices))
        .route("/sri/send-invoice/{invoice_id}", post(handlers::send_invoice_to_sri))
        .route("/sri/send-batch", post(handlers::send_invoice_batch))
        .route("/sri/check-status/{invoice_id}", get(handlers::check_invoice_status))
        .route("/sri/stats", get(handlers::invoice_stats))
        .route("/accounting/categories", get(handlers::list_categories))
        .route("/accounting/entries", get(handlers::list_entries))
        .route("/accounting/entries", post(handlers::create_entry))
        .route("/accounting/summary", get(handlers::accounting_summary))
        .route("/gastos", get(handlers::list_expenses))
        .route("/gastos", post(handlers::create_expense))
        .route("/gastos/summary", get(handlers::expense_summary))
        .route("/gastos/{expense_id}", get(handlers::get_expense))
        .route("/gastos/{expense_id}", put(handlers::update_expense))
        .route("/gastos/{expense_id}", delete(handlers::delete_expense))
        .route("/reportes/financiero", get(handlers::financial_report))
        .route("/reportes/comparativo", get(handlers::comparative_report))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
