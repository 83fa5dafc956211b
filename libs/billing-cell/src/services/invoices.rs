// libs/billing-cell/src/services/invoices.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::round2;

use crate::models::{
    BillingError, CreateInvoiceItemRequest, CreateInvoiceRequest, Invoice, InvoiceItem,
    InvoiceStatus, PaymentMethod, SriEnvironment,
};

use super::accounting::AccountingService;
use super::sri::{SriService, SriSendResult, STATUS_AUTORIZADO, STATUS_RECHAZADO};

pub const MAX_PAGE_SIZE: usize = 200;
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub fn clamp_pagination(page: Option<usize>, page_size: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

/// Header totals derived from the computed lines.
#[derive(Debug, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount_total: f64,
    pub tax: f64,
    pub total: f64,
    pub card_fee_amount: f64,
    pub total_to_charge: f64,
}

/// Prices one invoice line: discount off the gross, then 15% VAT on the net.
pub fn compute_item(request: &CreateInvoiceItemRequest) -> InvoiceItem {
    let gross = request.quantity as f64 * request.unit_price;
    let discount = gross * (request.discount_percent / 100.0);
    let subtotal = gross - discount;
    let tax = subtotal * crate::models::VAT_RATE;

    InvoiceItem {
        description: request.description.clone(),
        quantity: request.quantity,
        unit_price: request.unit_price,
        discount_percent: request.discount_percent,
        subtotal,
        tax_rate: crate::models::VAT_RATE,
        tax,
        total: subtotal + tax,
    }
}

/// Sums lines into header totals. The card fee applies only to card payments
/// and only when a fee percent was given.
pub fn compute_totals(
    items: &[InvoiceItem],
    payment_method: PaymentMethod,
    card_fee_percent: Option<f64>,
) -> InvoiceTotals {
    let subtotal: f64 = items.iter().map(|i| i.subtotal).sum();
    let tax: f64 = items.iter().map(|i| i.tax).sum();
    let discount_total: f64 = items
        .iter()
        .map(|i| i.quantity as f64 * i.unit_price * (i.discount_percent / 100.0))
        .sum();
    let total = subtotal + tax;

    let card_fee_amount = match (payment_method, card_fee_percent) {
        (PaymentMethod::Card, Some(pct)) => round2(total * (pct / 100.0)),
        _ => 0.0,
    };

    InvoiceTotals {
        subtotal,
        discount_total,
        tax,
        total,
        card_fee_amount,
        total_to_charge: total + card_fee_amount,
    }
}

pub struct InvoiceService {
    supabase: Arc<SupabaseClient>,
    accounting: AccountingService,
    sri: SriService,
}

impl InvoiceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            accounting: AccountingService::new(config),
            sri: SriService::new(&config.sri),
        }
    }

    /// Pagination is opt-in; `None` returns the whole filtered set.
    pub async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
        pagination: Option<(usize, usize)>,
        auth_token: &str,
    ) -> Result<(Vec<Invoice>, usize), BillingError> {
        let mut query_parts = Vec::new();
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=issued_at.desc".to_string());

        let path = format!("/rest/v1/invoices?{}", query_parts.join("&"));
        let rows: Vec<Invoice> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        let total = rows.len();
        let page_rows = match pagination {
            Some((page, page_size)) => {
                let start = (page - 1) * page_size;
                if start >= total {
                    Vec::new()
                } else {
                    rows.into_iter().skip(start).take(page_size).collect()
                }
            }
            None => rows,
        };
        Ok((page_rows, total))
    }

    pub async fn get_invoice(
        &self,
        invoice_id: Uuid,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let path = format!("/rest/v1/invoices?id=eq.{}", invoice_id);
        let rows: Vec<Invoice> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(BillingError::InvoiceNotFound)
    }

    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        if request.items.is_empty() {
            return Err(BillingError::ValidationError(
                "Debe incluir al menos un item.".to_string(),
            ));
        }
        for item in &request.items {
            if item.quantity <= 0 {
                return Err(BillingError::ValidationError(
                    "La cantidad debe ser positiva.".to_string(),
                ));
            }
            if item.unit_price < 0.0 || item.discount_percent < 0.0 || item.discount_percent > 100.0
            {
                return Err(BillingError::ValidationError(
                    "Precio o descuento inválido.".to_string(),
                ));
            }
        }

        let sequential = self.next_sequential(auth_token).await?;
        let number = format!("001-001-{:09}", sequential);
        let issued_at = Utc::now();

        let items: Vec<InvoiceItem> = request.items.iter().map(compute_item).collect();
        let card_fee_percent = match request.payment_method {
            PaymentMethod::Card => request.card_fee_percent,
            _ => None,
        };
        let totals = compute_totals(&items, request.payment_method, card_fee_percent);
        let environment = request.sri_environment.unwrap_or_default();

        let body = json!({
            "number": number,
            "establishment_code": "001",
            "emission_point": "001",
            "sequential": sequential,
            "issued_at": issued_at.to_rfc3339(),
            "customer": {
                "identification_type": request.customer_identification_type,
                "identification": request.customer_identification,
                "name": request.customer_name,
                "address": request.customer_address,
                "phone": request.customer_phone,
                "email": request.customer_email
            },
            "observations": request.observations,
            "subtotal": totals.subtotal,
            "discount_total": totals.discount_total,
            "tax": totals.tax,
            "total": totals.total,
            "card_fee_percent": card_fee_percent,
            "card_fee_amount": totals.card_fee_amount,
            "total_to_charge": totals.total_to_charge,
            "payment_method": request.payment_method.to_string(),
            "card_type": request.card_type,
            "card_installments": request.card_installments,
            "payment_reference": request.payment_reference,
            "status": InvoiceStatus::Pending.to_string(),
            "sri_access_key": null,
            "sri_authorization_number": null,
            "sri_authorized_at": null,
            "sri_messages": null,
            "sri_environment": environment.to_string(),
            "items": items,
            "created_at": issued_at.to_rfc3339(),
            "updated_at": issued_at.to_rfc3339()
        });

        let invoice: Invoice = self
            .supabase
            .insert_returning("/rest/v1/invoices", Some(auth_token), body)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        info!("Invoice {} created for {}", invoice.number, invoice.customer.name);

        self.accounting
            .register_invoice_income(&invoice, auth_token)
            .await?;

        if request.send_to_sri {
            return self.send_to_sri(invoice, auth_token).await;
        }

        Ok(invoice)
    }

    /// Runs the SRI workflow and persists the outcome on the invoice row.
    pub async fn send_to_sri(
        &self,
        invoice: Invoice,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let result = self.sri.send_invoice(&invoice, invoice.sri_environment)?;
        self.apply_sri_result(invoice.id, &result, auth_token).await
    }

    pub async fn apply_sri_result(
        &self,
        invoice_id: Uuid,
        result: &SriSendResult,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let status = match result.status.as_str() {
            STATUS_AUTORIZADO => InvoiceStatus::Authorized,
            STATUS_RECHAZADO => InvoiceStatus::Rejected,
            _ => InvoiceStatus::Pending,
        };

        let update = json!({
            "sri_access_key": result.access_key,
            "sri_authorization_number": result.authorization_number,
            "sri_authorized_at": result.authorized_at.map(|d| d.to_rfc3339()),
            "sri_messages": result.messages,
            "status": status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/invoices?id=eq.{}", invoice_id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    /// Invoices still waiting for (or bounced by) the SRI.
    pub async fn pending_invoices(&self, auth_token: &str) -> Result<Vec<Invoice>, BillingError> {
        let path = format!(
            "/rest/v1/invoices?status=in.({},{})&order=issued_at.desc",
            InvoiceStatus::Pending,
            InvoiceStatus::Rejected
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    pub async fn authorized_invoices(
        &self,
        from: Option<chrono::DateTime<Utc>>,
        to: Option<chrono::DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<Invoice>, BillingError> {
        let mut query_parts = vec![format!("status=eq.{}", InvoiceStatus::Authorized)];
        if let Some(from) = from {
            query_parts.push(format!(
                "sri_authorized_at=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = to {
            query_parts.push(format!(
                "sri_authorized_at=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        query_parts.push("order=sri_authorized_at.desc".to_string());

        let path = format!("/rest/v1/invoices?{}", query_parts.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    /// Counts and amounts by status over an issuance range.
    pub async fn invoice_stats(
        &self,
        from: Option<chrono::DateTime<Utc>>,
        to: Option<chrono::DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Value, BillingError> {
        let mut query_parts = Vec::new();
        if let Some(from) = from {
            query_parts.push(format!(
                "issued_at=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = to {
            query_parts.push(format!(
                "issued_at=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        let path = if query_parts.is_empty() {
            "/rest/v1/invoices".to_string()
        } else {
            format!("/rest/v1/invoices?{}", query_parts.join("&"))
        };

        let invoices: Vec<Invoice> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        let count_by = |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();
        let amount_by = |status: InvoiceStatus| -> f64 {
            invoices
                .iter()
                .filter(|i| i.status == status)
                .map(|i| i.total)
                .sum()
        };

        Ok(json!({
            "total": invoices.len(),
            "pending": count_by(InvoiceStatus::Pending),
            "authorized": count_by(InvoiceStatus::Authorized),
            "rejected": count_by(InvoiceStatus::Rejected),
            "total_amount": round2(invoices.iter().map(|i| i.total).sum::<f64>()),
            "authorized_amount": round2(amount_by(InvoiceStatus::Authorized)),
            "pending_amount": round2(amount_by(InvoiceStatus::Pending))
        }))
    }

    async fn next_sequential(&self, auth_token: &str) -> Result<i32, BillingError> {
        let path = "/rest/v1/invoices?select=sequential&order=sequential.desc&limit=1";
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        let max = rows
            .first()
            .and_then(|row| row.get("sequential"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(max as i32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: f64, discount_percent: f64) -> CreateInvoiceItemRequest {
        CreateInvoiceItemRequest {
            description: "Profilaxis dental".to_string(),
            quantity,
            unit_price,
            discount_percent,
        }
    }

    #[test]
    fn item_applies_discount_before_vat() {
        let item = compute_item(&line(2, 50.0, 10.0));

        // 2 * 50 = 100, minus 10% = 90, VAT 13.50, total 103.50.
        assert_eq!(item.subtotal, 90.0);
        assert_eq!(item.tax, 13.5);
        assert_eq!(item.total, 103.5);
        assert_eq!(item.tax_rate, 0.15);
    }

    #[test]
    fn totals_sum_lines() {
        let items = vec![
            compute_item(&line(1, 100.0, 0.0)),
            compute_item(&line(2, 50.0, 10.0)),
        ];
        let totals = compute_totals(&items, PaymentMethod::Cash, None);

        assert_eq!(totals.subtotal, 190.0);
        assert_eq!(totals.discount_total, 10.0);
        assert_eq!(totals.tax, 28.5);
        assert_eq!(totals.total, 218.5);
        assert_eq!(totals.card_fee_amount, 0.0);
        assert_eq!(totals.total_to_charge, 218.5);
    }

    #[test]
    fn card_fee_applies_only_to_card_payments() {
        let items = vec![compute_item(&line(1, 100.0, 0.0))];

        let card = compute_totals(&items, PaymentMethod::Card, Some(5.0));
        assert_eq!(card.card_fee_amount, 5.75); // round2(115 * 0.05)
        assert_eq!(card.total_to_charge, 120.75);

        let cash = compute_totals(&items, PaymentMethod::Cash, Some(5.0));
        assert_eq!(cash.card_fee_amount, 0.0);
        assert_eq!(cash.total_to_charge, 115.0);

        let card_no_pct = compute_totals(&items, PaymentMethod::Card, None);
        assert_eq!(card_no_pct.card_fee_amount, 0.0);
    }
}
