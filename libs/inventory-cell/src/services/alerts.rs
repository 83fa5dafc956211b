// libs/inventory-cell/src/services/alerts.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AlertType, InventoryAlert, InventoryError, InventoryItem};

/// Outcome of evaluating one item against its open alerts.
#[derive(Debug, Default, PartialEq)]
pub struct AlertActions {
    pub resolve: Vec<Uuid>,
    pub create: Vec<(AlertType, String)>,
}

/// Single evaluation pass for one item.
///
/// Stock alerts are resolved once quantity recovers above the minimum. New
/// alerts are deduplicated against the item's open alerts so repeated checks
/// never pile up duplicates.
pub fn evaluate_item(
    item: &InventoryItem,
    open_alerts: &[InventoryAlert],
    today: NaiveDate,
) -> AlertActions {
    let mut actions = AlertActions::default();

    let has_open = |alert_type: AlertType| {
        open_alerts
            .iter()
            .any(|a| a.alert_type == alert_type && !a.is_resolved)
    };

    if item.quantity > item.minimum_quantity {
        for alert in open_alerts {
            if !alert.is_resolved
                && matches!(alert.alert_type, AlertType::LowStock | AlertType::OutOfStock)
            {
                actions.resolve.push(alert.id);
            }
        }
    } else if item.quantity == 0 {
        if !has_open(AlertType::OutOfStock) {
            actions.create.push((
                AlertType::OutOfStock,
                format!("Stock agotado para {}", item.name),
            ));
        }
    } else if !has_open(AlertType::LowStock) {
        actions.create.push((
            AlertType::LowStock,
            format!(
                "Stock bajo para {}: {} unidades (mínimo {})",
                item.name, item.quantity, item.minimum_quantity
            ),
        ));
    }

    if let Some(expiration) = item.expiration_date {
        if item.is_expired(today) {
            if !has_open(AlertType::Expired) {
                actions.create.push((
                    AlertType::Expired,
                    format!("{} venció el {}", item.name, expiration.format("%d/%m/%Y")),
                ));
            }
        } else if item.is_expiring_soon(today) && !has_open(AlertType::ExpirationWarning) {
            let days_remaining = (expiration - today).num_days();
            actions.create.push((
                AlertType::ExpirationWarning,
                format!("{} vence en {} días", item.name, days_remaining),
            ));
        }
    }

    actions
}

pub struct AlertService {
    supabase: Arc<SupabaseClient>,
}

impl AlertService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_alerts(
        &self,
        odontologo_id: Uuid,
        resolved: Option<bool>,
        auth_token: &str,
    ) -> Result<Vec<InventoryAlert>, InventoryError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(resolved) = resolved {
            query_parts.push(format!("is_resolved=eq.{}", resolved));
        }
        query_parts.push("order=created_at.desc".to_string());

        let path = format!("/rest/v1/inventory_alerts?{}", query_parts.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    pub async fn resolve_alert(
        &self,
        odontologo_id: Uuid,
        alert_id: Uuid,
        auth_token: &str,
    ) -> Result<InventoryAlert, InventoryError> {
        let path = format!(
            "/rest/v1/inventory_alerts?id=eq.{}&odontologo_id=eq.{}",
            alert_id, odontologo_id
        );
        let rows: Vec<InventoryAlert> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;
        if rows.is_empty() {
            return Err(InventoryError::AlertNotFound);
        }

        let update = json!({
            "is_resolved": true,
            "resolved_at": Utc::now().to_rfc3339()
        });
        self.supabase
            .patch_returning(&path, Some(auth_token), update)
            .await
            .map_err(|e| InventoryError::DatabaseError(e.to_string()))
    }

    /// Re-evaluates every item of the owner, resolving and creating alerts
    /// as needed. Returns the number of alerts created.
    pub async fn check_all_items(
        &self,
        odontologo_id: Uuid,
        items: &[InventoryItem],
        auth_token: &str,
    ) -> Result<usize, InventoryError> {
        let open_alerts = self.list_alerts(odontologo_id, Some(false), auth_token).await?;
        let today = Utc::now().date_naive();
        let mut created = 0;

        for item in items {
            let item_alerts: Vec<InventoryAlert> = open_alerts
                .iter()
                .filter(|a| a.inventory_item_id == item.id)
                .cloned()
                .collect();

            let actions = evaluate_item(item, &item_alerts, today);

            for alert_id in actions.resolve {
                let path = format!("/rest/v1/inventory_alerts?id=eq.{}", alert_id);
                let body = json!({
                    "is_resolved": true,
                    "resolved_at": Utc::now().to_rfc3339()
                });
                self.supabase
                    .patch(&path, Some(auth_token), body)
                    .await
                    .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;
            }

            for (alert_type, message) in actions.create {
                let body = json!({
                    "inventory_item_id": item.id,
                    "odontologo_id": odontologo_id,
                    "alert_type": alert_type.to_string(),
                    "message": message,
                    "is_resolved": false,
                    "created_at": Utc::now().to_rfc3339()
                });
                let _: Vec<Value> = self
                    .supabase
                    .request(
                        Method::POST,
                        "/rest/v1/inventory_alerts",
                        Some(auth_token),
                        Some(body),
                    )
                    .await
                    .map_err(|e| InventoryError::DatabaseError(e.to_string()))?;
                created += 1;
            }
        }

        if created > 0 {
            info!("Alert check created {} alerts for odontologo {}", created, odontologo_id);
        } else {
            debug!("Alert check found nothing new for odontologo {}", odontologo_id);
        }
        Ok(created)
    }
}
