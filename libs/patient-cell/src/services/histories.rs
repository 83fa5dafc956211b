// libs/patient-cell/src/services/histories.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ClinicalHistory, CreateHistoryRequest, HistoryStatus, PatientError, ReviewHistoryRequest,
    UpdateHistoryRequest,
};

pub struct HistoryService {
    supabase: Arc<SupabaseClient>,
}

impl HistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_histories(
        &self,
        odontologo_id: Uuid,
        patient_id: Option<Uuid>,
        status: Option<HistoryStatus>,
        auth_token: &str,
    ) -> Result<Vec<ClinicalHistory>, PatientError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(patient_id) = patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=updated_at.desc".to_string());

        let path = format!("/rest/v1/clinical_histories?{}", query_parts.join("&"));
        debug!("Listing clinical histories: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn get_history(
        &self,
        odontologo_id: Uuid,
        history_id: Uuid,
        auth_token: &str,
    ) -> Result<ClinicalHistory, PatientError> {
        let path = format!(
            "/rest/v1/clinical_histories?id=eq.{}&odontologo_id=eq.{}",
            history_id, odontologo_id
        );
        let rows: Vec<ClinicalHistory> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(PatientError::HistoryNotFound)
    }

    pub async fn create_history(
        &self,
        odontologo_id: Uuid,
        request: CreateHistoryRequest,
        auth_token: &str,
    ) -> Result<ClinicalHistory, PatientError> {
        let now = Utc::now();
        let body = json!({
            "odontologo_id": odontologo_id,
            "patient_id": request.patient_id,
            "data": request.data,
            "status": HistoryStatus::Draft.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let history: ClinicalHistory = self
            .supabase
            .insert_returning("/rest/v1/clinical_histories", Some(auth_token), body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Clinical history {} created for odontologo {}", history.id, odontologo_id);
        Ok(history)
    }

    pub async fn update_history(
        &self,
        history: &ClinicalHistory,
        request: UpdateHistoryRequest,
        auth_token: &str,
    ) -> Result<ClinicalHistory, PatientError> {
        if history.status != HistoryStatus::Draft {
            return Err(PatientError::HistoryNotEditable);
        }

        let update_data = json!({
            "data": request.data,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/clinical_histories?id=eq.{}", history.id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn submit_history(
        &self,
        history: &ClinicalHistory,
        auth_token: &str,
    ) -> Result<ClinicalHistory, PatientError> {
        if history.status != HistoryStatus::Draft {
            return Err(PatientError::HistoryNotEditable);
        }

        let now = Utc::now();
        let update_data = json!({
            "status": HistoryStatus::Submitted.to_string(),
            "submitted_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let path = format!("/rest/v1/clinical_histories?id=eq.{}", history.id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn review_history(
        &self,
        history: &ClinicalHistory,
        reviewer_id: Uuid,
        request: ReviewHistoryRequest,
        auth_token: &str,
    ) -> Result<ClinicalHistory, PatientError> {
        if history.status != HistoryStatus::Submitted {
            return Err(PatientError::HistoryNotReviewable);
        }

        let new_status = if request.approved {
            HistoryStatus::Approved
        } else {
            HistoryStatus::Rejected
        };
        let now = Utc::now();

        let update_data = json!({
            "status": new_status.to_string(),
            "reviewed_by": reviewer_id,
            "review_comments": request.comments,
            "reviewed_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let path = format!("/rest/v1/clinical_histories?id=eq.{}", history.id);
        let reviewed: ClinicalHistory = self
            .supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Clinical history {} reviewed: {}", history.id, new_status);
        Ok(reviewed)
    }
}
