// libs/billing-cell/src/services/accounting.rs
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::round2;

use crate::models::{
    AccountingCategory, AccountingEntry, AccountingEntryType, BillingError, CreateEntryRequest,
    Invoice,
};

/// Entry listings are capped so an unbounded range stays cheap.
pub const ENTRY_LIMIT: usize = 500;

const INCOME_CATEGORY_NAME: &str = "Ingresos por servicios";

#[derive(Debug, Default)]
pub struct EntryFilters {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub entry_type: Option<AccountingEntryType>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct GroupSummary {
    pub group: String,
    #[serde(rename = "type")]
    pub entry_type: AccountingEntryType,
    pub total: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct AccountingSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
    pub groups: Vec<GroupSummary>,
}

/// Aggregates entries into the summary shape: per-(category group, type)
/// totals sorted by descending amount.
pub fn summarize_entries(entries: &[AccountingEntry], from: NaiveDate, to: NaiveDate) -> AccountingSummary {
    let total_income: f64 = entries
        .iter()
        .filter(|e| e.entry_type == AccountingEntryType::Income)
        .map(|e| e.amount)
        .sum();
    let total_expense: f64 = entries
        .iter()
        .filter(|e| e.entry_type == AccountingEntryType::Expense)
        .map(|e| e.amount)
        .sum();

    let mut grouped: HashMap<(String, AccountingEntryType), f64> = HashMap::new();
    for entry in entries {
        let group = entry.category_group.clone().unwrap_or_default();
        *grouped.entry((group, entry.entry_type)).or_insert(0.0) += entry.amount;
    }

    let mut groups: Vec<GroupSummary> = grouped
        .into_iter()
        .map(|((group, entry_type), total)| GroupSummary {
            group,
            entry_type,
            total: round2(total),
        })
        .collect();
    groups.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));

    AccountingSummary {
        from,
        to,
        total_income: round2(total_income),
        total_expense: round2(total_expense),
        net: round2(total_income - total_expense),
        groups,
    }
}

pub struct AccountingService {
    supabase: Arc<SupabaseClient>,
}

impl AccountingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_categories(
        &self,
        auth_token: &str,
    ) -> Result<Vec<AccountingCategory>, BillingError> {
        let path = "/rest/v1/accounting_categories?order=group.asc,name.asc";
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    pub async fn list_entries(
        &self,
        filters: EntryFilters,
        auth_token: &str,
    ) -> Result<Vec<AccountingEntry>, BillingError> {
        let mut query_parts = Vec::new();
        if let Some(from) = filters.from {
            query_parts.push(format!("date=gte.{}", from));
        }
        if let Some(to) = filters.to {
            query_parts.push(format!("date=lte.{}", to));
        }
        if let Some(entry_type) = filters.entry_type {
            query_parts.push(format!("type=eq.{}", entry_type));
        }
        if let Some(category_id) = filters.category_id {
            query_parts.push(format!("category_id=eq.{}", category_id));
        }
        query_parts.push("order=date.desc,created_at.desc".to_string());
        query_parts.push(format!("limit={}", ENTRY_LIMIT));

        let path = format!("/rest/v1/accounting_entries?{}", query_parts.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    pub async fn create_entry(
        &self,
        request: CreateEntryRequest,
        auth_token: &str,
    ) -> Result<AccountingEntry, BillingError> {
        if request.amount <= 0.0 {
            return Err(BillingError::ValidationError(
                "El monto debe ser positivo.".to_string(),
            ));
        }

        let category = self
            .find_category(request.category_id, auth_token)
            .await?
            .ok_or(BillingError::CategoryNotFound)?;

        let body = json!({
            "date": request.date,
            "type": request.entry_type.to_string(),
            "category_id": category.id,
            "category_name": category.name,
            "category_group": category.group,
            "description": request.description,
            "amount": request.amount,
            "payment_method": request.payment_method.map(|m| m.to_string()),
            "reference": request.reference,
            "invoice_id": null,
            "source": "Manual",
            "created_at": Utc::now().to_rfc3339()
        });

        self.supabase
            .insert_returning("/rest/v1/accounting_entries", Some(auth_token), body)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    /// Income entry registered automatically when an invoice is issued.
    pub async fn register_invoice_income(
        &self,
        invoice: &Invoice,
        auth_token: &str,
    ) -> Result<(), BillingError> {
        let category = self.ensure_income_category(auth_token).await?;

        let body = json!({
            "date": invoice.issued_at.date_naive(),
            "type": AccountingEntryType::Income.to_string(),
            "category_id": category.id,
            "category_name": category.name,
            "category_group": category.group,
            "description": format!("Factura {}", invoice.number),
            "amount": invoice.total_to_charge,
            "payment_method": invoice.payment_method.to_string(),
            "reference": invoice.payment_reference,
            "invoice_id": invoice.id,
            "source": "Invoice",
            "created_at": Utc::now().to_rfc3339()
        });

        let _: AccountingEntry = self
            .supabase
            .insert_returning("/rest/v1/accounting_entries", Some(auth_token), body)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        info!("Income entry registered for invoice {}", invoice.number);
        Ok(())
    }

    /// Range defaults to the current month when unset.
    pub async fn summary(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<AccountingSummary, BillingError> {
        let today = Utc::now().date_naive();
        let range_start = from.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today)
        });
        let range_end = to.unwrap_or_else(|| next_month(range_start));

        let entries = self
            .list_entries(
                EntryFilters {
                    from: Some(range_start),
                    to: Some(range_end),
                    ..Default::default()
                },
                auth_token,
            )
            .await?;

        Ok(summarize_entries(&entries, range_start, range_end))
    }

    /// Income entries over a date range, used by the reports.
    pub async fn income_entries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AccountingEntry>, BillingError> {
        self.list_entries(
            EntryFilters {
                from: Some(from),
                to: Some(to),
                entry_type: Some(AccountingEntryType::Income),
                ..Default::default()
            },
            auth_token,
        )
        .await
    }

    async fn find_category(
        &self,
        category_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<AccountingCategory>, BillingError> {
        let path = format!("/rest/v1/accounting_categories?id=eq.{}", category_id);
        let rows: Vec<AccountingCategory> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn ensure_income_category(
        &self,
        auth_token: &str,
    ) -> Result<AccountingCategory, BillingError> {
        let path = format!(
            "/rest/v1/accounting_categories?name=eq.{}&type=eq.{}",
            urlencoding::encode(INCOME_CATEGORY_NAME),
            AccountingEntryType::Income
        );
        let rows: Vec<AccountingCategory> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        if let Some(category) = rows.into_iter().next() {
            return Ok(category);
        }

        let body = json!({
            "name": INCOME_CATEGORY_NAME,
            "group": "Ingresos",
            "type": AccountingEntryType::Income.to_string(),
            "monthly_budget": 0,
            "is_active": true
        });
        self.supabase
            .insert_returning("/rest/v1/accounting_categories", Some(auth_token), body)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }
}

fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, date.day().min(28)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn entry(entry_type: AccountingEntryType, group: &str, amount: f64) -> AccountingEntry {
        AccountingEntry {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            entry_type,
            category_id: Uuid::new_v4(),
            category_name: Some("Categoria".to_string()),
            category_group: Some(group.to_string()),
            description: String::new(),
            amount,
            payment_method: None,
            reference: None,
            invoice_id: None,
            source: "Manual".to_string(),
            created_at: DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn summary_totals_income_and_expense() {
        let entries = vec![
            entry(AccountingEntryType::Income, "Ingresos", 300.0),
            entry(AccountingEntryType::Income, "Ingresos", 200.0),
            entry(AccountingEntryType::Expense, "Operativos", 150.0),
        ];
        let from = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let summary = summarize_entries(&entries, from, to);

        assert_eq!(summary.total_income, 500.0);
        assert_eq!(summary.total_expense, 150.0);
        assert_eq!(summary.net, 350.0);
    }

    #[test]
    fn summary_groups_sort_descending() {
        let entries = vec![
            entry(AccountingEntryType::Expense, "Operativos", 100.0),
            entry(AccountingEntryType::Income, "Ingresos", 800.0),
            entry(AccountingEntryType::Expense, "Insumos", 50.0),
        ];
        let from = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let summary = summarize_entries(&entries, from, to);

        let totals: Vec<f64> = summary.groups.iter().map(|g| g.total).collect();
        assert_eq!(totals, vec![800.0, 100.0, 50.0]);
        assert_eq!(summary.groups[0].group, "Ingresos");
    }

    #[test]
    fn next_month_rolls_over_december() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(next_month(date), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }
}
