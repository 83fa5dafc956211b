// libs/billing-cell/src/services/expenses.rs
use chrono::{DateTime, Duration as ChronoDuration, Datelike, TimeZone, Utc};
use reqwest::Method;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::round2;

use crate::models::{BillingError, Expense, ExpenseRequest};

#[derive(Debug, Default)]
pub struct ExpenseFilters {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ExpenseSummary {
    pub total_expenses: f64,
    pub month_expenses: f64,
    pub week_expenses: f64,
    pub expenses_by_category: HashMap<String, f64>,
    pub recent_expenses: Vec<Expense>,
}

/// Totals and the month/week slices over the owner's full expense history.
pub fn summarize_expenses(expenses: &[Expense], now: DateTime<Utc>) -> ExpenseSummary {
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let week_start = now - ChronoDuration::days(7);

    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
    let month_expenses: f64 = expenses
        .iter()
        .filter(|e| e.expense_date >= month_start)
        .map(|e| e.amount)
        .sum();
    let week_expenses: f64 = expenses
        .iter()
        .filter(|e| e.expense_date >= week_start)
        .map(|e| e.amount)
        .sum();

    let mut expenses_by_category: HashMap<String, f64> = HashMap::new();
    for expense in expenses.iter().filter(|e| e.expense_date >= month_start) {
        *expenses_by_category.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
    }
    for total in expenses_by_category.values_mut() {
        *total = round2(*total);
    }

    let mut recent: Vec<Expense> = expenses.to_vec();
    recent.sort_by(|a, b| b.expense_date.cmp(&a.expense_date));
    recent.truncate(10);

    ExpenseSummary {
        total_expenses: round2(total_expenses),
        month_expenses: round2(month_expenses),
        week_expenses: round2(week_expenses),
        expenses_by_category,
        recent_expenses: recent,
    }
}

pub struct ExpenseService {
    supabase: Arc<SupabaseClient>,
}

impl ExpenseService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_expenses(
        &self,
        odontologo_id: Uuid,
        filters: ExpenseFilters,
        pagination: Option<(usize, usize)>,
        auth_token: &str,
    ) -> Result<(Vec<Expense>, usize), BillingError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(from) = filters.from {
            query_parts.push(format!(
                "expense_date=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = filters.to {
            query_parts.push(format!(
                "expense_date=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        if let Some(category) = &filters.category {
            query_parts.push(format!("category=eq.{}", urlencoding::encode(category)));
        }
        if let Some(method) = &filters.payment_method {
            query_parts.push(format!("payment_method=eq.{}", urlencoding::encode(method)));
        }
        query_parts.push("order=expense_date.desc".to_string());

        let path = format!("/rest/v1/expenses?{}", query_parts.join("&"));
        let rows: Vec<Expense> = self
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

    pub async fn list_all(
        &self,
        odontologo_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Expense>, BillingError> {
        let path = format!("/rest/v1/expenses?odontologo_id=eq.{}", odontologo_id);
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    pub async fn get_expense(
        &self,
        odontologo_id: Uuid,
        expense_id: Uuid,
        auth_token: &str,
    ) -> Result<Expense, BillingError> {
        let path = format!(
            "/rest/v1/expenses?id=eq.{}&odontologo_id=eq.{}",
            expense_id, odontologo_id
        );
        let rows: Vec<Expense> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(BillingError::ExpenseNotFound)
    }

    pub async fn create_expense(
        &self,
        odontologo_id: Uuid,
        request: ExpenseRequest,
        auth_token: &str,
    ) -> Result<Expense, BillingError> {
        validate_expense(&request)?;

        let body = json!({
            "odontologo_id": odontologo_id,
            "description": request.description,
            "amount": request.amount,
            "expense_date": request.expense_date.to_rfc3339(),
            "category": request.category,
            "payment_method": request.payment_method,
            "invoice_number": request.invoice_number,
            "supplier": request.supplier,
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": null
        });

        let expense: Expense = self
            .supabase
            .insert_returning("/rest/v1/expenses", Some(auth_token), body)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        info!("Expense {} registered for odontologo {}", expense.id, odontologo_id);
        Ok(expense)
    }

    pub async fn update_expense(
        &self,
        odontologo_id: Uuid,
        expense_id: Uuid,
        request: ExpenseRequest,
        auth_token: &str,
    ) -> Result<Expense, BillingError> {
        validate_expense(&request)?;
        self.get_expense(odontologo_id, expense_id, auth_token).await?;

        let update = json!({
            "description": request.description,
            "amount": request.amount,
            "expense_date": request.expense_date.to_rfc3339(),
            "category": request.category,
            "payment_method": request.payment_method,
            "invoice_number": request.invoice_number,
            "supplier": request.supplier,
            "notes": request.notes,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/expenses?id=eq.{}&odontologo_id=eq.{}",
            expense_id, odontologo_id
        );
        self.supabase
            .patch_returning(&path, Some(auth_token), update)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    pub async fn delete_expense(
        &self,
        odontologo_id: Uuid,
        expense_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BillingError> {
        self.get_expense(odontologo_id, expense_id, auth_token).await?;

        let path = format!(
            "/rest/v1/expenses?id=eq.{}&odontologo_id=eq.{}",
            expense_id, odontologo_id
        );
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }
}

fn validate_expense(request: &ExpenseRequest) -> Result<(), BillingError> {
    if request.description.trim().is_empty() {
        return Err(BillingError::ValidationError(
            "La descripción es obligatoria.".to_string(),
        ));
    }
    if request.amount <= 0.0 {
        return Err(BillingError::ValidationError(
            "El monto debe ser positivo.".to_string(),
        ));
    }
    if request.category.trim().is_empty() {
        return Err(BillingError::ValidationError(
            "La categoría es obligatoria.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(amount: f64, days_ago: i64, category: &str) -> Expense {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        Expense {
            id: Uuid::new_v4(),
            odontologo_id: Uuid::new_v4(),
            description: "Compra insumos".to_string(),
            amount,
            expense_date: now - ChronoDuration::days(days_ago),
            category: category.to_string(),
            payment_method: "Efectivo".to_string(),
            invoice_number: None,
            supplier: None,
            notes: None,
            created_at: now,
            updated_at: None,
        }
    }

    #[test]
    fn summary_slices_month_and_week() {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        let expenses = vec![
            expense(100.0, 2, "Insumos"),   // this week and this month
            expense(50.0, 15, "Insumos"),   // this month only
            expense(200.0, 60, "Alquiler"), // older
        ];

        let summary = summarize_expenses(&expenses, now);

        assert_eq!(summary.total_expenses, 350.0);
        assert_eq!(summary.month_expenses, 150.0);
        assert_eq!(summary.week_expenses, 100.0);
        assert_eq!(summary.expenses_by_category["Insumos"], 150.0);
        assert!(!summary.expenses_by_category.contains_key("Alquiler"));
    }

    #[test]
    fn summary_keeps_ten_most_recent() {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        let expenses: Vec<Expense> = (0..15).map(|i| expense(10.0, i, "Insumos")).collect();

        let summary = summarize_expenses(&expenses, now);

        assert_eq!(summary.recent_expenses.len(), 10);
        assert!(summary.recent_expenses[0].expense_date >= summary.recent_expenses[9].expense_date);
    }
}
