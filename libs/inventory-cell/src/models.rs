// libs/inventory-cell/src/models.rs
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Days ahead an expiration date starts raising a warning.
pub const EXPIRATION_WARNING_DAYS: i64 = 30;

// ==============================================================================
// INVENTORY ITEM MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub odontologo_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub minimum_quantity: i32,
    pub maximum_quantity: Option<i32>,
    pub reorder_point: Option<i32>,
    pub unit_price: f64,
    pub average_cost: Option<f64>,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.minimum_quantity
    }

    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        self.expiration_date
            .map(|d| d <= today + ChronoDuration::days(EXPIRATION_WARNING_DAYS))
            .unwrap_or(false)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.map(|d| d <= today).unwrap_or(false)
    }

    pub fn needs_reorder(&self) -> bool {
        self.reorder_point
            .map(|p| self.quantity <= p)
            .unwrap_or(false)
    }

    /// Serialized form with the derived flags attached.
    pub fn to_response(&self) -> serde_json::Value {
        let today = Utc::now().date_naive();
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("is_low_stock".to_string(), self.is_low_stock().into());
            obj.insert(
                "is_expiring_soon".to_string(),
                self.is_expiring_soon(today).into(),
            );
            obj.insert("needs_reorder".to_string(), self.needs_reorder().into());
        }
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub minimum_quantity: i32,
    pub maximum_quantity: Option<i32>,
    pub reorder_point: Option<i32>,
    pub unit_price: f64,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub minimum_quantity: Option<i32>,
    pub maximum_quantity: Option<i32>,
    pub reorder_point: Option<i32>,
    pub unit_price: Option<f64>,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
}

// ==============================================================================
// MOVEMENT (KARDEX) MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Entry,
    Exit,
    Adjustment,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementType::Entry => write!(f, "entry"),
            MovementType::Exit => write!(f, "exit"),
            MovementType::Adjustment => write!(f, "adjustment"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub odontologo_id: Uuid,
    pub inventory_item_id: Uuid,
    pub movement_date: DateTime<Utc>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_cost: f64,
    pub stock_before: i32,
    pub stock_after: i32,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub purchase_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMovementRequest {
    pub inventory_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitMovementRequest {
    pub inventory_item_id: Uuid,
    pub quantity: i32,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentMovementRequest {
    pub inventory_item_id: Uuid,
    pub new_quantity: i32,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KardexSummary {
    pub total_entries: i32,
    pub total_exits: i32,
    pub total_adjustments: i32,
    pub current_stock: i32,
    pub average_cost: f64,
}

// ==============================================================================
// ALERT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    ExpirationWarning,
    Expired,
    OutOfStock,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::LowStock => write!(f, "low_stock"),
            AlertType::ExpirationWarning => write!(f, "expiration_warning"),
            AlertType::Expired => write!(f, "expired"),
            AlertType::OutOfStock => write!(f, "out_of_stock"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAlert {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub odontologo_id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// PURCHASE ORDER MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Received,
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseStatus::Pending => write!(f, "pending"),
            PurchaseStatus::Received => write!(f, "received"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub inventory_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub odontologo_id: Uuid,
    pub supplier: String,
    pub invoice_number: Option<String>,
    pub purchase_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub total: f64,
    pub status: PurchaseStatus,
    pub items: Vec<PurchaseItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseRequest {
    pub supplier: String,
    pub invoice_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: Option<PurchaseStatus>,
    pub items: Vec<PurchaseItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePurchaseRequest {
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Option<Vec<PurchaseItem>>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory item not found")]
    ItemNotFound,

    #[error("Alert not found")]
    AlertNotFound,

    #[error("Purchase order not found")]
    PurchaseNotFound,

    #[error("Insufficient stock")]
    InsufficientStock,

    #[error("Purchase order already received")]
    AlreadyReceived,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
