// libs/inventory-cell/src/services/items.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateItemRequest, InventoryError, InventoryItem, UpdateItemRequest};

pub struct ItemService {
    supabase: Arc<SupabaseClient>,
}

impl ItemService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_items(
        &self,
        odontologo_id: Uuid,
        search: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(term) = search {
            let pattern = format!("*{}*", term);
            let encoded = urlencoding::encode(&pattern);
            query_parts.push(format!("or=(name.ilike.{e},sku.ilike.{e})", e = encoded));
        }
        query_parts.push("order=name.asc".to_string());

        let path = format!("/rest/v1/inventory_items?{}", query_parts.join("&"));
        debug!("Listing inventory items: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    pub async fn get_item(
        &self,
        odontologo_id: Uuid,
        item_id: Uuid,
        auth_token: &str,
    ) -> Result<InventoryItem, InventoryError> {
        let path = format!(
            "/rest/v1/inventory_items?id=eq.{}&odontologo_id=eq.{}",
            item_id, odontologo_id
        );
        let rows: Vec<InventoryItem> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(InventoryError::ItemNotFound)
    }

    pub async fn create_item(
        &self,
        odontologo_id: Uuid,
        request: CreateItemRequest,
        auth_token: &str,
    ) -> Result<InventoryItem, InventoryError> {
        if request.quantity < 0 || request.minimum_quantity < 0 {
            return Err(InventoryError::ValidationError(
                "Quantities cannot be negative".to_string(),
            ));
        }
        if request.unit_price < 0.0 {
            return Err(InventoryError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let body = json!({
            "odontologo_id": odontologo_id,
            "name": request.name,
            "description": request.description,
            "sku": request.sku,
            "quantity": request.quantity,
            "minimum_quantity": request.minimum_quantity,
            "maximum_quantity": request.maximum_quantity,
            "reorder_point": request.reorder_point,
            "unit_price": request.unit_price,
            "average_cost": null,
            "supplier": request.supplier,
            "location": request.location,
            "batch": request.batch,
            "expiration_date": request.expiration_date,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let item: InventoryItem = self
            .supabase
            .insert_returning("/rest/v1/inventory_items", Some(auth_token), body)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!("Inventory item {} created for odontologo {}", item.id, odontologo_id);
        Ok(item)
    }

    pub async fn update_item(
        &self,
        odontologo_id: Uuid,
        item_id: Uuid,
        request: UpdateItemRequest,
        auth_token: &str,
    ) -> Result<InventoryItem, InventoryError> {
        self.get_item(odontologo_id, item_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(v) = request.name {
            update_data.insert("name".to_string(), json!(v));
        }
        if let Some(v) = request.description {
            update_data.insert("description".to_string(), json!(v));
        }
        if let Some(v) = request.sku {
            update_data.insert("sku".to_string(), json!(v));
        }
        if let Some(v) = request.minimum_quantity {
            update_data.insert("minimum_quantity".to_string(), json!(v));
        }
        if let Some(v) = request.maximum_quantity {
            update_data.insert("maximum_quantity".to_string(), json!(v));
        }
        if let Some(v) = request.reorder_point {
            update_data.insert("reorder_point".to_string(), json!(v));
        }
        if let Some(v) = request.unit_price {
            update_data.insert("unit_price".to_string(), json!(v));
        }
        if let Some(v) = request.supplier {
            update_data.insert("supplier".to_string(), json!(v));
        }
        if let Some(v) = request.location {
            update_data.insert("location".to_string(), json!(v));
        }
        if let Some(v) = request.batch {
            update_data.insert("batch".to_string(), json!(v));
        }
        if let Some(v) = request.expiration_date {
            update_data.insert("expiration_date".to_string(), json!(v));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/inventory_items?id=eq.{}&odontologo_id=eq.{}",
            item_id, odontologo_id
        );
        self.supabase
            .patch_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    pub async fn delete_item(
        &self,
        odontologo_id: Uuid,
        item_id: Uuid,
        auth_token: &str,
    ) -> Result<(), InventoryError> {
        self.get_item(odontologo_id, item_id, auth_token).await?;

        let path = format!(
            "/rest/v1/inventory_items?id=eq.{}&odontologo_id=eq.{}",
            item_id, odontologo_id
        );
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;

        info!("Inventory item {} deleted", item_id);
        Ok(())
    }

    /// Direct stock/cost mutation used by the kardex and purchase flows.
    pub async fn apply_stock_update(
        &self,
        item_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<InventoryItem, InventoryError> {
        let path = format!("/rest/v1/inventory_items?id=eq.{}", item_id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }
}
