// libs/billing-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ecuadorian VAT applied to every taxed invoice line.
pub const VAT_RATE: f64 = 0.15;

// ==============================================================================
// INVOICE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Transfer => write!(f, "transfer"),
        }
    }
}

impl PaymentMethod {
    /// SRI forma de pago code used in the factura XML.
    pub fn sri_code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "01",
            PaymentMethod::Card => "19",
            PaymentMethod::Transfer => "20",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Authorized,
    Rejected,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Authorized => write!(f, "authorized"),
            InvoiceStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SriEnvironment {
    #[default]
    Pruebas,
    Produccion,
}

impl SriEnvironment {
    /// Ambiente digit embedded in the access key and factura XML.
    pub fn ambiente_code(&self) -> &'static str {
        match self {
            SriEnvironment::Pruebas => "1",
            SriEnvironment::Produccion => "2",
        }
    }

    /// Label used inside the autorización XML.
    pub fn label(&self) -> &'static str {
        match self {
            SriEnvironment::Pruebas => "PRUEBAS",
            SriEnvironment::Produccion => "PRODUCCION",
        }
    }
}

impl fmt::Display for SriEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SriEnvironment::Pruebas => write!(f, "pruebas"),
            SriEnvironment::Produccion => write!(f, "produccion"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCustomer {
    pub identification_type: String,
    pub identification: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub discount_percent: f64,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub establishment_code: String,
    pub emission_point: String,
    pub sequential: i32,
    pub issued_at: DateTime<Utc>,
    pub customer: InvoiceCustomer,
    pub observations: Option<String>,
    pub subtotal: f64,
    pub discount_total: f64,
    pub tax: f64,
    pub total: f64,
    pub card_fee_percent: Option<f64>,
    pub card_fee_amount: Option<f64>,
    pub total_to_charge: f64,
    pub payment_method: PaymentMethod,
    pub card_type: Option<String>,
    pub card_installments: Option<i32>,
    pub payment_reference: Option<String>,
    pub status: InvoiceStatus,
    pub sri_access_key: Option<String>,
    pub sri_authorization_number: Option<String>,
    pub sri_authorized_at: Option<DateTime<Utc>>,
    pub sri_messages: Option<String>,
    pub sri_environment: SriEnvironment,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceItemRequest {
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_identification_type: String,
    pub customer_identification: String,
    pub customer_name: String,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub observations: Option<String>,
    pub payment_method: PaymentMethod,
    pub card_fee_percent: Option<f64>,
    pub card_type: Option<String>,
    pub card_installments: Option<i32>,
    pub payment_reference: Option<String>,
    pub sri_environment: Option<SriEnvironment>,
    #[serde(default)]
    pub send_to_sri: bool,
    pub items: Vec<CreateInvoiceItemRequest>,
}

// ==============================================================================
// ACCOUNTING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountingEntryType {
    Income,
    Expense,
}

impl fmt::Display for AccountingEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountingEntryType::Income => write!(f, "income"),
            AccountingEntryType::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingCategory {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    #[serde(rename = "type")]
    pub entry_type: AccountingEntryType,
    pub monthly_budget: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub entry_type: AccountingEntryType,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub category_group: Option<String>,
    pub description: String,
    pub amount: f64,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub entry_type: AccountingEntryType,
    pub category_id: Uuid,
    pub description: String,
    pub amount: f64,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
}

// ==============================================================================
// EXPENSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub odontologo_id: Uuid,
    pub description: String,
    pub amount: f64,
    pub expense_date: DateTime<Utc>,
    pub category: String,
    pub payment_method: String,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRequest {
    pub description: String,
    pub amount: f64,
    pub expense_date: DateTime<Utc>,
    pub category: String,
    pub payment_method: String,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BillingError {
    #[error("Factura no encontrada")]
    InvoiceNotFound,

    #[error("La factura ya está autorizada")]
    AlreadyAuthorized,

    #[error("Categoría inválida")]
    CategoryNotFound,

    #[error("Expense not found")]
    ExpenseNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
