// libs/inventory-cell/src/services/purchases.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::round2;

use crate::models::{
    CreatePurchaseRequest, InventoryError, PurchaseItem, PurchaseOrder, PurchaseStatus,
    UpdatePurchaseRequest,
};

use super::items::ItemService;
use super::kardex::{weighted_average_cost, KardexService};

pub const MAX_PAGE_SIZE: usize = 200;
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Default)]
pub struct PurchaseFilters {
    pub supplier: Option<String>,
    pub status: Option<PurchaseStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Clamps user-supplied pagination to sane bounds.
pub fn clamp_pagination(page: Option<usize>, page_size: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

pub struct PurchaseService {
    supabase: Arc<SupabaseClient>,
    items: ItemService,
    kardex: KardexService,
}

impl PurchaseService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            items: ItemService::with_client(supabase.clone()),
            kardex: KardexService::new(config),
            supabase,
        }
    }

    /// Returns the requested page plus the total row count for the filter.
    pub async fn list_purchases(
        &self,
        odontologo_id: Uuid,
        filters: PurchaseFilters,
        page: usize,
        page_size: usize,
        auth_token: &str,
    ) -> Result<(Vec<PurchaseOrder>, usize), InventoryError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(supplier) = &filters.supplier {
            let pattern = format!("*{}*", supplier);
            query_parts.push(format!("supplier=ilike.{}", urlencoding::encode(&pattern)));
        }
        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = filters.from {
            query_parts.push(format!(
                "purchase_date=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = filters.to {
            query_parts.push(format!(
                "purchase_date=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        query_parts.push("order=purchase_date.desc".to_string());

        let path = format!("/rest/v1/purchase_orders?{}", query_parts.join("&"));
        let rows: Vec<PurchaseOrder> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        let total = rows.len();
        let start = (page - 1) * page_size;
        let page_rows = if start >= total {
            Vec::new()
        } else {
            rows.into_iter().skip(start).take(page_size).collect()
        };
        Ok((page_rows, total))
    }

    pub async fn get_purchase(
        &self,
        odontologo_id: Uuid,
        purchase_id: Uuid,
        auth_token: &str,
    ) -> Result<PurchaseOrder, InventoryError> {
        let path = format!(
            "/rest/v1/purchase_orders?id=eq.{}&odontologo_id=eq.{}",
            purchase_id, odontologo_id
        );
        let rows: Vec<PurchaseOrder> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(InventoryError::PurchaseNotFound)
    }

    pub async fn create_purchase(
        &self,
        odontologo_id: Uuid,
        request: CreatePurchaseRequest,
        auth_token: &str,
    ) -> Result<PurchaseOrder, InventoryError> {
        if request.supplier.trim().is_empty() {
            return Err(InventoryError::ValidationError(
                "Supplier is required".to_string(),
            ));
        }
        if request.items.is_empty() {
            return Err(InventoryError::ValidationError(
                "A purchase needs at least one item".to_string(),
            ));
        }
        self.validate_items(odontologo_id, &request.items, auth_token)
            .await?;

        let status = request.status.unwrap_or(PurchaseStatus::Pending);
        let now = Utc::now();
        let body = json!({
            "odontologo_id": odontologo_id,
            "supplier": request.supplier,
            "invoice_number": request.invoice_number,
            "purchase_date": request.purchase_date.unwrap_or(now).to_rfc3339(),
            "notes": request.notes,
            "total": purchase_total(&request.items),
            "status": status.to_string(),
            "items": request.items,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let purchase: PurchaseOrder = self
            .supabase
            .insert_returning("/rest/v1/purchase_orders", Some(auth_token), body)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!(
            "Purchase {} from {} created for odontologo {}",
            purchase.id, purchase.supplier, odontologo_id
        );

        // A purchase created already-received stocks in right away.
        if status == PurchaseStatus::Received {
            self.apply_received_items(odontologo_id, &purchase, auth_token)
                .await?;
        }

        Ok(purchase)
    }

    pub async fn update_purchase(
        &self,
        odontologo_id: Uuid,
        purchase_id: Uuid,
        request: UpdatePurchaseRequest,
        auth_token: &str,
    ) -> Result<PurchaseOrder, InventoryError> {
        let existing = self
            .get_purchase(odontologo_id, purchase_id, auth_token)
            .await?;
        if existing.status == PurchaseStatus::Received {
            return Err(InventoryError::AlreadyReceived);
        }

        let mut update_data = serde_json::Map::new();
        if let Some(v) = request.supplier {
            update_data.insert("supplier".to_string(), json!(v));
        }
        if let Some(v) = request.invoice_number {
            update_data.insert("invoice_number".to_string(), json!(v));
        }
        if let Some(v) = request.purchase_date {
            update_data.insert("purchase_date".to_string(), json!(v.to_rfc3339()));
        }
        if let Some(v) = request.notes {
            update_data.insert("notes".to_string(), json!(v));
        }
        if let Some(items) = request.items {
            if items.is_empty() {
                return Err(InventoryError::ValidationError(
                    "A purchase needs at least one item".to_string(),
                ));
            }
            self.validate_items(odontologo_id, &items, auth_token).await?;
            update_data.insert("total".to_string(), json!(purchase_total(&items)));
            update_data.insert("items".to_string(), json!(items));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/purchase_orders?id=eq.{}&odontologo_id=eq.{}",
            purchase_id, odontologo_id
        );
        self.supabase
            .patch_returning(&path, Some(auth_token), serde_json::Value::Object(update_data))
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    pub async fn delete_purchase(
        &self,
        odontologo_id: Uuid,
        purchase_id: Uuid,
        auth_token: &str,
    ) -> Result<(), InventoryError> {
        let existing = self
            .get_purchase(odontologo_id, purchase_id, auth_token)
            .await?;
        if existing.status == PurchaseStatus::Received {
            return Err(InventoryError::AlreadyReceived);
        }

        let path = format!(
            "/rest/v1/purchase_orders?id=eq.{}&odontologo_id=eq.{}",
            purchase_id, odontologo_id
        );
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!("Purchase {} deleted", purchase_id);
        Ok(())
    }

    pub async fn receive_purchase(
        &self,
        odontologo_id: Uuid,
        purchase_id: Uuid,
        auth_token: &str,
    ) -> Result<PurchaseOrder, InventoryError> {
        let purchase = self
            .get_purchase(odontologo_id, purchase_id, auth_token)
            .await?;
        if purchase.status == PurchaseStatus::Received {
            return Err(InventoryError::AlreadyReceived);
        }

        self.apply_received_items(odontologo_id, &purchase, auth_token)
            .await?;

        let path = format!(
            "/rest/v1/purchase_orders?id=eq.{}&odontologo_id=eq.{}",
            purchase_id, odontologo_id
        );
        let update = json!({
            "status": PurchaseStatus::Received.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });
        let received: PurchaseOrder = self
            .supabase
            .patch_returning(&path, Some(auth_token), update)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!("Purchase {} received, stock updated", purchase_id);
        Ok(received)
    }

    async fn validate_items(
        &self,
        odontologo_id: Uuid,
        items: &[PurchaseItem],
        auth_token: &str,
    ) -> Result<(), InventoryError> {
        for line in items {
            if line.quantity <= 0 {
                return Err(InventoryError::ValidationError(
                    "Purchase item quantity must be positive".to_string(),
                ));
            }
            if line.unit_price < 0.0 {
                return Err(InventoryError::ValidationError(
                    "Purchase item price cannot be negative".to_string(),
                ));
            }
            // Rejects items that belong to a different owner.
            self.items
                .get_item(odontologo_id, line.inventory_item_id, auth_token)
                .await?;
        }
        Ok(())
    }

    /// Stocks in each purchased line: quantity, average cost, latest price
    /// and expiration, plus a kardex entry linked to the order.
    async fn apply_received_items(
        &self,
        odontologo_id: Uuid,
        purchase: &PurchaseOrder,
        auth_token: &str,
    ) -> Result<(), InventoryError> {
        for line in &purchase.items {
            let item = self
                .items
                .get_item(odontologo_id, line.inventory_item_id, auth_token)
                .await?;

            let new_average = weighted_average_cost(
                item.quantity,
                item.average_cost.unwrap_or(item.unit_price),
                line.quantity,
                line.unit_price,
            );

            let mut update = serde_json::Map::new();
            update.insert("quantity".to_string(), json!(item.quantity + line.quantity));
            update.insert("average_cost".to_string(), json!(new_average));
            if line.unit_price > 0.0 {
                update.insert("unit_price".to_string(), json!(line.unit_price));
            }
            if let Some(expiration) = line.expiration_date {
                update.insert("expiration_date".to_string(), json!(expiration));
            }
            update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

            self.items
                .apply_stock_update(item.id, serde_json::Value::Object(update), auth_token)
                .await?;

            self.kardex
                .record_purchase_entry(
                    odontologo_id,
                    purchase.id,
                    &item,
                    line.quantity,
                    line.unit_price,
                    auth_token,
                )
                .await?;
        }
        Ok(())
    }
}

fn purchase_total(items: &[PurchaseItem]) -> f64 {
    round2(
        items
            .iter()
            .map(|line| line.unit_price * line.quantity as f64)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_lines_and_rounds() {
        let items = vec![
            PurchaseItem {
                inventory_item_id: Uuid::new_v4(),
                quantity: 3,
                unit_price: 1.999,
                expiration_date: None,
            },
            PurchaseItem {
                inventory_item_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: 10.0,
                expiration_date: None,
            },
        ];
        assert_eq!(purchase_total(&items), 26.0);
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(clamp_pagination(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_pagination(Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_pagination(Some(3), Some(5000)), (3, MAX_PAGE_SIZE));
    }
}
