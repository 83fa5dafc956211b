// libs/billing-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use http::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{roles, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AccountingEntryType, BillingError, CreateEntryRequest, CreateInvoiceRequest, ExpenseRequest,
    InvoiceStatus,
};
use crate::services::accounting::{AccountingService, EntryFilters};
use crate::services::expenses::{summarize_expenses, ExpenseFilters, ExpenseService};
use crate::services::invoices::{clamp_pagination, InvoiceService};
use crate::services::reports::ReportService;

#[derive(Debug, Deserialize)]
pub struct InvoiceQueryParams {
    pub status: Option<InvoiceStatus>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct EntryQueryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub entry_type: Option<AccountingEntryType>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQueryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseQueryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FinancialReportParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ComparativeReportParams {
    pub months: Option<u32>,
}

fn map_billing_error(e: BillingError) -> AppError {
    match e {
        BillingError::InvoiceNotFound | BillingError::ExpenseNotFound => {
            AppError::NotFound(e.to_string())
        }
        BillingError::AlreadyAuthorized | BillingError::CategoryNotFound => {
            AppError::BadRequest(e.to_string())
        }
        BillingError::ValidationError(msg) => AppError::BadRequest(msg),
        BillingError::DocumentError(msg) | BillingError::DatabaseError(msg) => {
            AppError::Internal(msg)
        }
    }
}

fn owner_id(user: &User) -> Result<Uuid, AppError> {
    require_role(user, roles::ODONTOLOGO)?;
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

fn pagination_headers(total: usize, page: usize, page_size: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&total.to_string()) {
        headers.insert("X-Total-Count", v);
    }
    if let Ok(v) = HeaderValue::from_str(&page.to_string()) {
        headers.insert("X-Page", v);
    }
    if let Ok(v) = HeaderValue::from_str(&page_size.to_string()) {
        headers.insert("X-Page-Size", v);
    }
    headers
}

// ==============================================================================
// INVOICE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_invoices(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<InvoiceQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<(HeaderMap, Json<Value>), AppError> {
    owner_id(&user)?;

    let paginated = params.page.is_some() || params.page_size.is_some();
    let pagination = paginated.then(|| clamp_pagination(params.page, params.page_size));

    let service = InvoiceService::new(&state);
    let (invoices, total) = service
        .list_invoices(params.status, pagination, auth.token())
        .await
        .map_err(map_billing_error)?;

    let headers = match pagination {
        Some((page, page_size)) => pagination_headers(total, page, page_size),
        None => HeaderMap::new(),
    };
    Ok((
        headers,
        Json(json!({
            "invoices": invoices,
            "total": total
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_invoice(
    State(state): State<Arc<AppConfig>>,
    Path(invoice_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoice = service
        .get_invoice(invoice_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn create_invoice(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoice = service
        .create_invoice(request, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn send_invoice_to_sri(
    State(state): State<Arc<AppConfig>>,
    Path(invoice_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoice = service
        .get_invoice(invoice_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    if invoice.status == InvoiceStatus::Authorized {
        return Err(map_billing_error(BillingError::AlreadyAuthorized));
    }

    let updated = service
        .send_to_sri(invoice, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(updated)))
}

// ==============================================================================
// SRI AUTHORIZATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn pending_invoices(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoices = service
        .pending_invoices(auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "invoices": invoices,
        "total": invoices.len()
    })))
}

#[axum::debug_handler]
pub async fn authorized_invoices(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<DateRangeParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoices = service
        .authorized_invoices(params.from, params.to, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "invoices": invoices,
        "total": invoices.len()
    })))
}

#[axum::debug_handler]
pub async fn send_invoice_batch(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(invoice_ids): Json<Vec<Uuid>>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let mut results = Vec::new();
    let mut successful = 0;
    let mut failed = 0;

    // One bad invoice must not abort the rest of the batch.
    for invoice_id in &invoice_ids {
        match send_one(&service, *invoice_id, auth.token()).await {
            Ok(status) => {
                successful += 1;
                results.push(json!({
                    "invoice_id": invoice_id,
                    "success": true,
                    "status": status
                }));
            }
            Err(e) => {
                failed += 1;
                results.push(json!({
                    "invoice_id": invoice_id,
                    "success": false,
                    "message": e.to_string()
                }));
            }
        }
    }

    Ok(Json(json!({
        "total": invoice_ids.len(),
        "successful": successful,
        "failed": failed,
        "results": results
    })))
}

async fn send_one(
    service: &InvoiceService,
    invoice_id: Uuid,
    auth_token: &str,
) -> Result<InvoiceStatus, BillingError> {
    let invoice = service.get_invoice(invoice_id, auth_token).await?;
    if invoice.status == InvoiceStatus::Authorized {
        return Err(BillingError::AlreadyAuthorized);
    }
    let updated = service.send_to_sri(invoice, auth_token).await?;
    Ok(updated.status)
}

#[axum::debug_handler]
pub async fn check_invoice_status(
    State(state): State<Arc<AppConfig>>,
    Path(invoice_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let invoice = service
        .get_invoice(invoice_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    if invoice.sri_access_key.is_none() {
        return Err(AppError::BadRequest(
            "La factura aún no ha sido enviada al SRI".to_string(),
        ));
    }

    Ok(Json(json!({
        "invoice_id": invoice.id,
        "number": invoice.number,
        "status": invoice.status,
        "sri_access_key": invoice.sri_access_key,
        "sri_authorization_number": invoice.sri_authorization_number,
        "sri_authorized_at": invoice.sri_authorized_at,
        "sri_messages": invoice.sri_messages
    })))
}

#[axum::debug_handler]
pub async fn invoice_stats(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<DateRangeParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = InvoiceService::new(&state);
    let stats = service
        .invoice_stats(params.from, params.to, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(stats))
}

// ==============================================================================
// ACCOUNTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_categories(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = AccountingService::new(&state);
    let categories = service
        .list_categories(auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "categories": categories,
        "total": categories.len()
    })))
}

#[axum::debug_handler]
pub async fn list_entries(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<EntryQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let filters = EntryFilters {
        from: params.from,
        to: params.to,
        entry_type: params.entry_type,
        category_id: params.category_id,
    };

    let service = AccountingService::new(&state);
    let entries = service
        .list_entries(filters, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn create_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = AccountingService::new(&state);
    let entry = service
        .create_entry(request, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn accounting_summary(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<SummaryQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    owner_id(&user)?;

    let service = AccountingService::new(&state);
    let summary = service
        .summary(params.from, params.to, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(summary)))
}

// ==============================================================================
// EXPENSE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_expenses(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ExpenseQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<(HeaderMap, Json<Value>), AppError> {
    let odontologo_id = owner_id(&user)?;

    let paginated = params.page.is_some() || params.page_size.is_some();
    let pagination = paginated.then(|| clamp_pagination(params.page, params.page_size));

    let filters = ExpenseFilters {
        from: params.from,
        to: params.to,
        category: params.category,
        payment_method: params.payment_method,
    };

    let service = ExpenseService::new(&state);
    let (expenses, total) = service
        .list_expenses(odontologo_id, filters, pagination, auth.token())
        .await
        .map_err(map_billing_error)?;

    let headers = match pagination {
        Some((page, page_size)) => pagination_headers(total, page, page_size),
        None => HeaderMap::new(),
    };
    Ok((
        headers,
        Json(json!({
            "expenses": expenses,
            "total": total
        })),
    ))
}

#[axum::debug_handler]
pub async fn expense_summary(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ExpenseService::new(&state);
    let expenses = service
        .list_all(odontologo_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    let summary = summarize_expenses(&expenses, Utc::now());
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn get_expense(
    State(state): State<Arc<AppConfig>>,
    Path(expense_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ExpenseService::new(&state);
    let expense = service
        .get_expense(odontologo_id, expense_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(expense)))
}

#[axum::debug_handler]
pub async fn create_expense(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ExpenseRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ExpenseService::new(&state);
    let expense = service
        .create_expense(odontologo_id, request, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(expense)))
}

#[axum::debug_handler]
pub async fn update_expense(
    State(state): State<Arc<AppConfig>>,
    Path(expense_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ExpenseRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ExpenseService::new(&state);
    let expense = service
        .update_expense(odontologo_id, expense_id, request, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(expense)))
}

#[axum::debug_handler]
pub async fn delete_expense(
    State(state): State<Arc<AppConfig>>,
    Path(expense_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ExpenseService::new(&state);
    service
        .delete_expense(odontologo_id, expense_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "message": "Gasto eliminado correctamente"
    })))
}

// ==============================================================================
// REPORT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn financial_report(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<FinancialReportParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ReportService::new(&state);
    let report = service
        .financial_report(odontologo_id, params.start_date, params.end_date, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn comparative_report(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ComparativeReportParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ReportService::new(&state);
    let report = service
        .comparative_report(odontologo_id, params.months.unwrap_or(12), auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(report))
}
