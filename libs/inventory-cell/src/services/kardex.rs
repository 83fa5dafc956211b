// libs/inventory-cell/src/services/kardex.rs
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
    AdjustmentMovementRequest, EntryMovementRequest, ExitMovementRequest, InventoryError,
    InventoryItem, InventoryMovement, KardexSummary, MovementType,
};

use super::items::ItemService;

#[derive(Debug, Default)]
pub struct MovementFilters {
    pub item_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Weighted average after an entry of `quantity` units at `unit_price`.
///
/// Falls back to the entry price when the item had no stock to average
/// against.
pub fn weighted_average_cost(
    current_quantity: i32,
    current_average: f64,
    quantity: i32,
    unit_price: f64,
) -> f64 {
    let denominator = current_quantity + quantity;
    if denominator <= 0 {
        return round2(unit_price);
    }
    let total = current_average * current_quantity as f64 + unit_price * quantity as f64;
    round2(total / denominator as f64)
}

pub struct KardexService {
    supabase: Arc<SupabaseClient>,
    items: ItemService,
}

impl KardexService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            items: ItemService::with_client(supabase.clone()),
            supabase,
        }
    }

    pub async fn list_movements(
        &self,
        odontologo_id: Uuid,
        filters: MovementFilters,
        auth_token: &str,
    ) -> Result<Vec<InventoryMovement>, InventoryError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(item_id) = filters.item_id {
            query_parts.push(format!("inventory_item_id=eq.{}", item_id));
        }
        if let Some(movement_type) = filters.movement_type {
            query_parts.push(format!("movement_type=eq.{}", movement_type));
        }
        if let Some(from) = filters.from {
            query_parts.push(format!(
                "movement_date=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = filters.to {
            query_parts.push(format!(
                "movement_date=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        query_parts.push("order=movement_date.desc".to_string());

        let path = format!("/rest/v1/inventory_movements?{}", query_parts.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    pub async fn record_entry(
        &self,
        odontologo_id: Uuid,
        request: EntryMovementRequest,
        auth_token: &str,
    ) -> Result<InventoryMovement, InventoryError> {
        if request.quantity <= 0 {
            return Err(InventoryError::ValidationError(
                "Entry quantity must be positive".to_string(),
            ));
        }
        if request.unit_price < 0.0 {
            return Err(InventoryError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let item = self
            .items
            .get_item(odontologo_id, request.inventory_item_id, auth_token)
            .await?;

        let stock_before = item.quantity;
        let stock_after = stock_before + request.quantity;
        let new_average = weighted_average_cost(
            stock_before,
            item.average_cost.unwrap_or(item.unit_price),
            request.quantity,
            request.unit_price,
        );

        self.items
            .apply_stock_update(
                item.id,
                json!({
                    "quantity": stock_after,
                    "average_cost": new_average,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        self.insert_movement(
            odontologo_id,
            &item,
            MovementType::Entry,
            request.quantity,
            request.unit_price,
            stock_before,
            stock_after,
            request.reference,
            request.notes,
            None,
            auth_token,
        )
        .await
    }

    pub async fn record_exit(
        &self,
        odontologo_id: Uuid,
        request: ExitMovementRequest,
        auth_token: &str,
    ) -> Result<InventoryMovement, InventoryError> {
        if request.quantity <= 0 {
            return Err(InventoryError::ValidationError(
                "Exit quantity must be positive".to_string(),
            ));
        }

        let item = self
            .items
            .get_item(odontologo_id, request.inventory_item_id, auth_token)
            .await?;

        if item.quantity < request.quantity {
            return Err(InventoryError::InsufficientStock);
        }

        let stock_before = item.quantity;
        let stock_after = stock_before - request.quantity;
        // Exits are costed at the running average.
        let cost = item.average_cost.unwrap_or(item.unit_price);

        self.items
            .apply_stock_update(
                item.id,
                json!({
                    "quantity": stock_after,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        self.insert_movement(
            odontologo_id,
            &item,
            MovementType::Exit,
            request.quantity,
            cost,
            stock_before,
            stock_after,
            request.reference,
            request.notes,
            None,
            auth_token,
        )
        .await
    }

    pub async fn record_adjustment(
        &self,
        odontologo_id: Uuid,
        request: AdjustmentMovementRequest,
        auth_token: &str,
    ) -> Result<InventoryMovement, InventoryError> {
        if request.new_quantity < 0 {
            return Err(InventoryError::ValidationError(
                "Adjusted quantity cannot be negative".to_string(),
            ));
        }

        let item = self
            .items
            .get_item(odontologo_id, request.inventory_item_id, auth_token)
            .await?;

        let stock_before = item.quantity;
        let stock_after = request.new_quantity;
        let cost = item.average_cost.unwrap_or(item.unit_price);

        self.items
            .apply_stock_update(
                item.id,
                json!({
                    "quantity": stock_after,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        self.insert_movement(
            odontologo_id,
            &item,
            MovementType::Adjustment,
            (stock_after - stock_before).abs(),
            cost,
            stock_before,
            stock_after,
            request.reference,
            request.notes,
            None,
            auth_token,
        )
        .await
    }

    /// Entry recorded on behalf of a received purchase order.
    pub async fn record_purchase_entry(
        &self,
        odontologo_id: Uuid,
        purchase_order_id: Uuid,
        item: &InventoryItem,
        quantity: i32,
        unit_price: f64,
        auth_token: &str,
    ) -> Result<InventoryMovement, InventoryError> {
        let stock_before = item.quantity;
        let stock_after = stock_before + quantity;

        self.insert_movement(
            odontologo_id,
            item,
            MovementType::Entry,
            quantity,
            unit_price,
            stock_before,
            stock_after,
            None,
            None,
            Some(purchase_order_id),
            auth_token,
        )
        .await
    }

    pub async fn item_summary(
        &self,
        odontologo_id: Uuid,
        item_id: Uuid,
        auth_token: &str,
    ) -> Result<(InventoryItem, KardexSummary, Vec<InventoryMovement>), InventoryError> {
        let item = self.items.get_item(odontologo_id, item_id, auth_token).await?;
        let movements = self
            .list_movements(
                odontologo_id,
                MovementFilters {
                    item_id: Some(item_id),
                    ..Default::default()
                },
                auth_token,
            )
            .await?;

        let mut summary = KardexSummary {
            total_entries: 0,
            total_exits: 0,
            total_adjustments: 0,
            current_stock: item.quantity,
            average_cost: item.average_cost.unwrap_or(item.unit_price),
        };
        for movement in &movements {
            match movement.movement_type {
                MovementType::Entry => summary.total_entries += movement.quantity,
                MovementType::Exit => summary.total_exits += movement.quantity,
                MovementType::Adjustment => summary.total_adjustments += movement.quantity,
            }
        }

        Ok((item, summary, movements))
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_movement(
        &self,
        odontologo_id: Uuid,
        item: &InventoryItem,
        movement_type: MovementType,
        quantity: i32,
        unit_price: f64,
        stock_before: i32,
        stock_after: i32,
        reference: Option<String>,
        notes: Option<String>,
        purchase_order_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<InventoryMovement, InventoryError> {
        let now = Utc::now();
        let body = json!({
            "odontologo_id": odontologo_id,
            "inventory_item_id": item.id,
            "movement_date": now.to_rfc3339(),
            "movement_type": movement_type.to_string(),
            "quantity": quantity,
            "unit_price": unit_price,
            "total_cost": round2(unit_price * quantity as f64),
            "stock_before": stock_before,
            "stock_after": stock_after,
            "reference": reference,
            "notes": notes,
            "purchase_order_id": purchase_order_id,
            "created_at": now.to_rfc3339()
        });

        let movement: InventoryMovement = self
            .supabase
            .insert_returning("/rest/v1/inventory_movements", Some(auth_token), body)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!(
            "Kardex {} of {} units recorded for item {}",
            movement_type, quantity, item.id
        );
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_blends_existing_stock_with_entry() {
        // 10 units at 2.00 plus 10 units at 4.00 averages to 3.00.
        assert_eq!(weighted_average_cost(10, 2.0, 10, 4.0), 3.0);
    }

    #[test]
    fn average_of_empty_stock_is_the_entry_price() {
        assert_eq!(weighted_average_cost(0, 0.0, 5, 7.25), 7.25);
    }

    #[test]
    fn average_is_rounded_to_cents() {
        // (3 * 1.00 + 1 * 2.00) / 4 = 1.25
        assert_eq!(weighted_average_cost(3, 1.0, 1, 2.0), 1.25);
        // (1 * 1.00 + 2 * 1.50) / 3 = 1.3333...
        assert_eq!(weighted_average_cost(1, 1.0, 2, 1.5), 1.33);
    }

    #[test]
    fn large_entry_dominates_the_average() {
        let avg = weighted_average_cost(1, 100.0, 99, 1.0);
        assert_eq!(avg, 1.99);
    }
}
