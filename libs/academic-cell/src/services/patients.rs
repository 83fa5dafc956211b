// libs/academic-cell/src/services/patients.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AcademicError, AcademicPatient, CreatePatientRequest, UpdatePatientRequest};

pub struct AcademicPatientService {
    supabase: Arc<SupabaseClient>,
}

impl AcademicPatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// List patients, optionally matched against name or cedula.
    pub async fn list_patients(
        &self,
        search: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<AcademicPatient>, AcademicError> {
        let mut query_parts = Vec::new();
        if let Some(term) = search {
            let pattern = format!("*{}*", term);
            let encoded = urlencoding::encode(&pattern);
            query_parts.push(format!(
                "or=(first_name.ilike.{e},last_name.ilike.{e},cedula.ilike.{e})",
                e = encoded
            ));
        }
        query_parts.push("order=last_name.asc".to_string());

        let path = format!("/rest/v1/academic_patients?{}", query_parts.join("&"));
        debug!("Listing academic patients: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<AcademicPatient, AcademicError> {
        let path = format!("/rest/v1/academic_patients?id=eq.{}", patient_id);
        let rows: Vec<AcademicPatient> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AcademicError::PatientNotFound)
    }

    pub async fn create_patient(
        &self,
        professor_id: Uuid,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<AcademicPatient, AcademicError> {
        if request.cedula.trim().is_empty() {
            return Err(AcademicError::ValidationError(
                "cedula is required".to_string(),
            ));
        }

        let now = Utc::now();
        let body = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "cedula": request.cedula,
            "birth_date": request.birth_date,
            "phone": request.phone,
            "email": request.email,
            "address": request.address,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_phone": request.emergency_contact_phone,
            "medical_conditions": request.medical_conditions,
            "allergies": request.allergies,
            "created_by_professor_id": professor_id,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let patient: AcademicPatient = self
            .supabase
            .insert_returning("/rest/v1/academic_patients", Some(auth_token), body)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        info!("Academic patient {} created by professor {}", patient.id, professor_id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<AcademicPatient, AcademicError> {
        // Confirm existence first so a bad id maps to 404 rather than an
        // empty PATCH result.
        self.get_patient(patient_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(v) = request.first_name {
            update_data.insert("first_name".to_string(), json!(v));
        }
        if let Some(v) = request.last_name {
            update_data.insert("last_name".to_string(), json!(v));
        }
        if let Some(v) = request.cedula {
            update_data.insert("cedula".to_string(), json!(v));
        }
        if let Some(v) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(v));
        }
        if let Some(v) = request.phone {
            update_data.insert("phone".to_string(), json!(v));
        }
        if let Some(v) = request.email {
            update_data.insert("email".to_string(), json!(v));
        }
        if let Some(v) = request.address {
            update_data.insert("address".to_string(), json!(v));
        }
        if let Some(v) = request.emergency_contact_name {
            update_data.insert("emergency_contact_name".to_string(), json!(v));
        }
        if let Some(v) = request.emergency_contact_phone {
            update_data.insert("emergency_contact_phone".to_string(), json!(v));
        }
        if let Some(v) = request.medical_conditions {
            update_data.insert("medical_conditions".to_string(), json!(v));
        }
        if let Some(v) = request.allergies {
            update_data.insert("allergies".to_string(), json!(v));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/academic_patients?id=eq.{}", patient_id);
        self.supabase
            .patch_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    pub async fn delete_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AcademicError> {
        self.get_patient(patient_id, auth_token).await?;

        let path = format!("/rest/v1/academic_patients?id=eq.{}", patient_id);
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        info!("Academic patient {} deleted", patient_id);
        Ok(())
    }
}
