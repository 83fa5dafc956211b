// libs/billing-cell/src/services/reports.rs
use chrono::{DateTime, Datelike, Months, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::round2;

use crate::models::BillingError;

use super::accounting::AccountingService;
use super::expenses::ExpenseService;

#[derive(Debug, serde::Deserialize)]
struct PurchaseRow {
    purchase_date: DateTime<Utc>,
    total: f64,
}

#[derive(Debug, serde::Deserialize)]
struct InventoryRow {
    quantity: i32,
    minimum_quantity: i32,
    unit_price: f64,
}

/// Sums (timestamp, amount) pairs into "YYYY-MM" buckets, oldest first.
pub fn amounts_by_month(rows: &[(DateTime<Utc>, f64)]) -> Vec<(String, f64)> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for (date, amount) in rows {
        *buckets.entry(date.format("%Y-%m").to_string()).or_insert(0.0) += amount;
    }
    buckets
        .into_iter()
        .map(|(month, amount)| (month, round2(amount)))
        .collect()
}

pub struct ReportService {
    supabase: Arc<SupabaseClient>,
    accounting: AccountingService,
    expenses: ExpenseService,
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            accounting: AccountingService::new(config),
            expenses: ExpenseService::new(config),
        }
    }

    /// Expenses, purchases, income and inventory valuation over a date range
    /// (defaults to the last six months).
    pub async fn financial_report(
        &self,
        odontologo_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Value, BillingError> {
        let now = Utc::now();
        let start = start.unwrap_or_else(|| now - Months::new(6));
        let end = end.unwrap_or(now);

        let expenses = self
            .expenses
            .list_all(odontologo_id, auth_token)
            .await?
            .into_iter()
            .filter(|e| e.expense_date >= start && e.expense_date <= end)
            .collect::<Vec<_>>();

        let expense_rows: Vec<(DateTime<Utc>, f64)> =
            expenses.iter().map(|e| (e.expense_date, e.amount)).collect();
        let expenses_by_month = amounts_by_month(&expense_rows);

        let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
        for expense in &expenses {
            *by_category.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
        }
        let mut expenses_by_category: Vec<(String, f64)> = by_category
            .into_iter()
            .map(|(category, amount)| (category, round2(amount)))
            .collect();
        expenses_by_category
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let purchases = self.fetch_purchases(odontologo_id, start, end, auth_token).await?;
        let purchase_rows: Vec<(DateTime<Utc>, f64)> =
            purchases.iter().map(|p| (p.purchase_date, p.total)).collect();
        let purchases_by_month = amounts_by_month(&purchase_rows);

        let income_entries = self
            .accounting
            .income_entries(start.date_naive(), end.date_naive(), auth_token)
            .await?;
        let income_rows: Vec<(DateTime<Utc>, f64)> = income_entries
            .iter()
            .map(|e| (e.created_at, e.amount))
            .collect();
        let income_by_month = amounts_by_month(&income_rows);

        let inventory = self.fetch_inventory(odontologo_id, auth_token).await?;
        let total_value: f64 = inventory
            .iter()
            .map(|i| i.quantity as f64 * i.unit_price)
            .sum();
        let low_stock = inventory
            .iter()
            .filter(|i| i.quantity <= i.minimum_quantity)
            .count();
        let average_stock = if inventory.is_empty() {
            0.0
        } else {
            inventory.iter().map(|i| i.quantity as f64).sum::<f64>() / inventory.len() as f64
        };

        let total_income: f64 = income_entries.iter().map(|e| e.amount).sum();
        let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
        let total_purchases: f64 = purchases.iter().map(|p| p.total).sum();
        let profit = total_income - total_expenses;
        let profit_margin = if total_income > 0.0 {
            (profit / total_income) * 100.0
        } else {
            0.0
        };

        Ok(json!({
            "period": { "start": start, "end": end },
            "summary": {
                "total_income": round2(total_income),
                "total_expenses": round2(total_expenses),
                "total_purchases": round2(total_purchases),
                "profit": round2(profit),
                "profit_margin": round2(profit_margin)
            },
            "income_by_month": month_objects(&income_by_month),
            "expenses_by_month": month_objects(&expenses_by_month),
            "purchases_by_month": month_objects(&purchases_by_month),
            "expenses_by_category": expenses_by_category
                .iter()
                .map(|(category, amount)| json!({ "category": category, "amount": amount }))
                .collect::<Vec<_>>(),
            "inventory_summary": {
                "total_items": inventory.len(),
                "total_value": round2(total_value),
                "low_stock_items": low_stock,
                "average_stock": round2(average_stock)
            }
        }))
    }

    /// Month-by-month income, expenses and profit over the last N months.
    pub async fn comparative_report(
        &self,
        odontologo_id: Uuid,
        months: u32,
        auth_token: &str,
    ) -> Result<Value, BillingError> {
        let months = months.clamp(1, 60);
        let now = Utc::now();
        let start = now - Months::new(months);

        let expenses = self
            .expenses
            .list_all(odontologo_id, auth_token)
            .await?
            .into_iter()
            .filter(|e| e.expense_date >= start)
            .collect::<Vec<_>>();

        let income_entries = self
            .accounting
            .income_entries(start.date_naive(), now.date_naive(), auth_token)
            .await?;

        let mut data = Vec::new();
        let mut income_sum = 0.0;
        let mut expense_sum = 0.0;

        for i in (0..months).rev() {
            let month = now - Months::new(i);
            let month_key = month.format("%Y-%m").to_string();

            let month_income: f64 = income_entries
                .iter()
                .filter(|e| e.date.year() == month.year() && e.date.month() == month.month())
                .map(|e| e.amount)
                .sum();
            let month_expenses: f64 = expenses
                .iter()
                .filter(|e| {
                    e.expense_date.year() == month.year() && e.expense_date.month() == month.month()
                })
                .map(|e| e.amount)
                .sum();

            income_sum += month_income;
            expense_sum += month_expenses;

            data.push(json!({
                "month": month_key,
                "income": round2(month_income),
                "expenses": round2(month_expenses),
                "profit": round2(month_income - month_expenses)
            }));
        }

        let divisor = months as f64;
        Ok(json!({
            "months": months,
            "data": data,
            "average_income": round2(income_sum / divisor),
            "average_expenses": round2(expense_sum / divisor),
            "average_profit": round2((income_sum - expense_sum) / divisor)
        }))
    }

    async fn fetch_purchases(
        &self,
        odontologo_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<PurchaseRow>, BillingError> {
        let path = format!(
            "/rest/v1/purchase_orders?odontologo_id=eq.{}&purchase_date=gte.{}&purchase_date=lte.{}&select=purchase_date,total",
            odontologo_id,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339())
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    async fn fetch_inventory(
        &self,
        odontologo_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<InventoryRow>, BillingError> {
        let path = format!(
            "/rest/v1/inventory_items?odontologo_id=eq.{}&select=quantity,minimum_quantity,unit_price",
            odontologo_id
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }
}

fn month_objects(rows: &[(String, f64)]) -> Vec<Value> {
    rows.iter()
        .map(|(month, amount)| json!({ "month": month, "amount": amount }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn amounts_bucket_by_month_in_order() {
        let rows = vec![
            (Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(), 10.0),
            (Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap(), 5.0),
            (Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap(), 7.5),
        ];

        let buckets = amounts_by_month(&rows);

        assert_eq!(
            buckets,
            vec![("2025-01".to_string(), 5.0), ("2025-03".to_string(), 17.5)]
        );
    }

    #[test]
    fn empty_rows_produce_no_buckets() {
        assert!(amounts_by_month(&[]).is_empty());
    }
}
