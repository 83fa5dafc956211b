// libs/inventory-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
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
    AdjustmentMovementRequest, CreateItemRequest, CreatePurchaseRequest, EntryMovementRequest,
    ExitMovementRequest, InventoryError, MovementType, PurchaseStatus, UpdateItemRequest,
    UpdatePurchaseRequest,
};
use crate::services::alerts::AlertService;
use crate::services::items::ItemService;
use crate::services::kardex::{KardexService, MovementFilters};
use crate::services::purchases::{clamp_pagination, PurchaseFilters, PurchaseService};

#[derive(Debug, Deserialize)]
pub struct ItemQueryParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertQueryParams {
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MovementQueryParams {
    pub item_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseQueryParams {
    pub supplier: Option<String>,
    pub status: Option<PurchaseStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

fn map_inventory_error(e: InventoryError) -> AppError {
    match e {
        InventoryError::ItemNotFound => AppError::NotFound("Inventory item not found".to_string()),
        InventoryError::AlertNotFound => AppError::NotFound("Alert not found".to_string()),
        InventoryError::PurchaseNotFound => {
            AppError::NotFound("Purchase order not found".to_string())
        }
        InventoryError::InsufficientStock | InventoryError::AlreadyReceived => {
            AppError::BadRequest(e.to_string())
        }
        InventoryError::ValidationError(msg) => AppError::BadRequest(msg),
        InventoryError::DatabaseError(msg) => AppError::Internal(msg),
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
// ITEM HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_items(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ItemQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    let items = service
        .list_items(odontologo_id, params.search.as_deref(), auth.token())
        .await
        .map_err(map_inventory_error)?;

    let responses: Vec<Value> = items.iter().map(|i| i.to_response()).collect();
    Ok(Json(json!({
        "items": responses,
        "total": responses.len()
    })))
}

#[axum::debug_handler]
pub async fn get_item(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    let item = service
        .get_item(odontologo_id, item_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(item.to_response()))
}

#[axum::debug_handler]
pub async fn create_item(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateItemRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    let item = service
        .create_item(odontologo_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(item.to_response()))
}

#[axum::debug_handler]
pub async fn update_item(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    let item = service
        .update_item(odontologo_id, item_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(item.to_response()))
}

#[axum::debug_handler]
pub async fn delete_item(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    service
        .delete_item(odontologo_id, item_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({ "deleted": true })))
}

// ==============================================================================
// ALERT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_alerts(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AlertQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AlertService::new(&state);
    let alerts = service
        .list_alerts(odontologo_id, params.resolved, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({
        "alerts": alerts,
        "total": alerts.len()
    })))
}

#[axum::debug_handler]
pub async fn resolve_alert(
    State(state): State<Arc<AppConfig>>,
    Path(alert_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AlertService::new(&state);
    let alert = service
        .resolve_alert(odontologo_id, alert_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(alert)))
}

/// Re-evaluates the whole inventory and reports how many alerts fired.
#[axum::debug_handler]
pub async fn check_alerts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let item_service = ItemService::new(&state);
    let items = item_service
        .list_items(odontologo_id, None, auth.token())
        .await
        .map_err(map_inventory_error)?;

    let alert_service = AlertService::new(&state);
    let created = alert_service
        .check_all_items(odontologo_id, &items, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({
        "checked_items": items.len(),
        "alerts_created": created
    })))
}

// ==============================================================================
// KARDEX HANDLERS
// ==============================================================================

/// Inventory as the kardex sees it: current stock and running average cost.
#[axum::debug_handler]
pub async fn kardex_items(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = ItemService::new(&state);
    let items = service
        .list_items(odontologo_id, None, auth.token())
        .await
        .map_err(map_inventory_error)?;

    let rows: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "id": item.id,
                "name": item.name,
                "sku": item.sku,
                "quantity": item.quantity,
                "unit_price": item.unit_price,
                "average_cost": item.average_cost.unwrap_or(item.unit_price)
            })
        })
        .collect();

    Ok(Json(json!({
        "items": rows,
        "total": rows.len()
    })))
}

#[axum::debug_handler]
pub async fn list_movements(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<MovementQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let filters = MovementFilters {
        item_id: params.item_id,
        movement_type: params.movement_type,
        from: params.from,
        to: params.to,
    };

    let service = KardexService::new(&state);
    let movements = service
        .list_movements(odontologo_id, filters, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({
        "movements": movements,
        "total": movements.len()
    })))
}

#[axum::debug_handler]
pub async fn record_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<EntryMovementRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = KardexService::new(&state);
    let movement = service
        .record_entry(odontologo_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(movement)))
}

#[axum::debug_handler]
pub async fn record_exit(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ExitMovementRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = KardexService::new(&state);
    let movement = service
        .record_exit(odontologo_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(movement)))
}

#[axum::debug_handler]
pub async fn record_adjustment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AdjustmentMovementRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = KardexService::new(&state);
    let movement = service
        .record_adjustment(odontologo_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(movement)))
}

#[axum::debug_handler]
pub async fn item_kardex(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = KardexService::new(&state);
    let (item, summary, movements) = service
        .item_summary(odontologo_id, item_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({
        "item": item.to_response(),
        "summary": summary,
        "movements": movements
    })))
}

// ==============================================================================
// PURCHASE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_purchases(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<PurchaseQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<(HeaderMap, Json<Value>), AppError> {
    let odontologo_id = owner_id(&user)?;
    let (page, page_size) = clamp_pagination(params.page, params.page_size);

    let filters = PurchaseFilters {
        supplier: params.supplier,
        status: params.status,
        from: params.from,
        to: params.to,
    };

    let service = PurchaseService::new(&state);
    let (purchases, total) = service
        .list_purchases(odontologo_id, filters, page, page_size, auth.token())
        .await
        .map_err(map_inventory_error)?;

    let headers = pagination_headers(total, page, page_size);
    Ok((
        headers,
        Json(json!({
            "purchases": purchases,
            "total": total
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_purchase(
    State(state): State<Arc<AppConfig>>,
    Path(purchase_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PurchaseService::new(&state);
    let purchase = service
        .get_purchase(odontologo_id, purchase_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(purchase)))
}

#[axum::debug_handler]
pub async fn create_purchase(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePurchaseRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PurchaseService::new(&state);
    let purchase = service
        .create_purchase(odontologo_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(purchase)))
}

#[axum::debug_handler]
pub async fn update_purchase(
    State(state): State<Arc<AppConfig>>,
    Path(purchase_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePurchaseRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PurchaseService::new(&state);
    let purchase = service
        .update_purchase(odontologo_id, purchase_id, request, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(purchase)))
}

#[axum::debug_handler]
pub async fn delete_purchase(
    State(state): State<Arc<AppConfig>>,
    Path(purchase_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PurchaseService::new(&state);
    service
        .delete_purchase(odontologo_id, purchase_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!({ "deleted": true })))
}

#[axum::debug_handler]
pub async fn receive_purchase(
    State(state): State<Arc<AppConfig>>,
    Path(purchase_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PurchaseService::new(&state);
    let purchase = service
        .receive_purchase(odontologo_id, purchase_id, auth.token())
        .await
        .map_err(map_inventory_error)?;

    Ok(Json(json!(purchase)))
}
