// libs/academic-cell/src/services/histories.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AcademicClinicalHistory, AcademicError, ClinicalHistoryStatus, CreateHistoryRequest,
    ReviewHistoryRequest, UpdateHistoryRequest,
};

pub struct ClinicalHistoryService {
    supabase: Arc<SupabaseClient>,
}

impl ClinicalHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_histories(
        &self,
        student_id: Option<Uuid>,
        status: Option<ClinicalHistoryStatus>,
        auth_token: &str,
    ) -> Result<Vec<AcademicClinicalHistory>, AcademicError> {
        let mut query_parts = Vec::new();
        if let Some(student_id) = student_id {
            query_parts.push(format!("student_id=eq.{}", student_id));
        }
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=updated_at.desc".to_string());

        let path = format!(
            "/rest/v1/academic_clinical_histories?{}",
            query_parts.join("&")
        );
        debug!("Listing clinical histories: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    pub async fn get_history(
        &self,
        history_id: Uuid,
        auth_token: &str,
    ) -> Result<AcademicClinicalHistory, AcademicError> {
        let path = format!("/rest/v1/academic_clinical_histories?id=eq.{}", history_id);
        let rows: Vec<AcademicClinicalHistory> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AcademicError::HistoryNotFound)
    }

    /// New histories always start as drafts owned by the student.
    pub async fn create_history(
        &self,
        student_id: Uuid,
        request: CreateHistoryRequest,
        auth_token: &str,
    ) -> Result<AcademicClinicalHistory, AcademicError> {
        let now = Utc::now();
        let body = json!({
            "student_id": student_id,
            "data": request.data,
            "status": ClinicalHistoryStatus::Draft.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let history: AcademicClinicalHistory = self
            .supabase
            .insert_returning(
                "/rest/v1/academic_clinical_histories",
                Some(auth_token),
                body,
            )
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        info!("Clinical history {} created by student {}", history.id, student_id);
        Ok(history)
    }

    pub async fn update_history(
        &self,
        history: &AcademicClinicalHistory,
        request: UpdateHistoryRequest,
        auth_token: &str,
    ) -> Result<AcademicClinicalHistory, AcademicError> {
        let update_data = json!({
            "data": request.data,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/academic_clinical_histories?id=eq.{}", history.id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    /// Draft to submitted transition.
    pub async fn submit_history(
        &self,
        history: &AcademicClinicalHistory,
        auth_token: &str,
    ) -> Result<AcademicClinicalHistory, AcademicError> {
        if history.status != ClinicalHistoryStatus::Draft {
            return Err(AcademicError::HistoryNotEditable);
        }

        let update_data = json!({
            "status": ClinicalHistoryStatus::Submitted.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/academic_clinical_histories?id=eq.{}", history.id);
        self.supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    /// Professor review: approve or reject a submitted history.
    pub async fn review_history(
        &self,
        history: &AcademicClinicalHistory,
        professor_id: Uuid,
        request: ReviewHistoryRequest,
        auth_token: &str,
    ) -> Result<AcademicClinicalHistory, AcademicError> {
        if history.status != ClinicalHistoryStatus::Submitted {
            return Err(AcademicError::HistoryNotReviewable);
        }

        let new_status = if request.approved {
            ClinicalHistoryStatus::Approved
        } else {
            ClinicalHistoryStatus::Rejected
        };
        let now = Utc::now();

        let update_data = json!({
            "status": new_status.to_string(),
            "reviewed_by_professor_id": professor_id,
            "professor_comments": request.comments,
            "reviewed_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let path = format!("/rest/v1/academic_clinical_histories?id=eq.{}", history.id);
        let reviewed: AcademicClinicalHistory = self
            .supabase
            .patch_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        info!(
            "Clinical history {} reviewed by professor {}: {}",
            history.id, professor_id, new_status
        );
        Ok(reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(status: ClinicalHistoryStatus) -> AcademicClinicalHistory {
        AcademicClinicalHistory {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            data: json!({"odontograma": {}}),
            status,
            reviewed_by_professor_id: None,
            professor_comments: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_strings_match_wire_format() {
        assert_eq!(ClinicalHistoryStatus::Draft.to_string(), "draft");
        assert_eq!(ClinicalHistoryStatus::Submitted.to_string(), "submitted");
        assert_eq!(ClinicalHistoryStatus::Approved.to_string(), "approved");
        assert_eq!(ClinicalHistoryStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn history_roundtrips_through_serde() {
        let original = history(ClinicalHistoryStatus::Submitted);
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(value["status"], "submitted");

        let parsed: AcademicClinicalHistory = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.status, ClinicalHistoryStatus::Submitted);
    }
}
