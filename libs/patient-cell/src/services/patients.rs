// libs/patient-cell/src/services/patients.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};

/// Patient records always carry the owning odontologo's id and every query is
/// filtered by it, so another tenant's rows are indistinguishable from
/// missing rows.
pub struct PatientService {
    supabase: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_patients(
        &self,
        odontologo_id: Uuid,
        search: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(term) = search {
            let pattern = format!("*{}*", term);
            let encoded = urlencoding::encode(&pattern);
            query_parts.push(format!(
                "or=(first_name.ilike.{e},last_name.ilike.{e},id_number.ilike.{e})",
                e = encoded
            ));
        }
        query_parts.push("order=last_name.asc".to_string());

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));
        debug!("Listing patients: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn get_patient(
        &self,
        odontologo_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!(
            "/rest/v1/patients?id=eq.{}&odontologo_id=eq.{}",
            patient_id, odontologo_id
        );
        let rows: Vec<Patient> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn create_patient(
        &self,
        odontologo_id: Uuid,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        if request.id_number.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "id_number is required".to_string(),
            ));
        }

        let now = Utc::now();
        let body = json!({
            "odontologo_id": odontologo_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "id_number": request.id_number,
            "birth_date": request.birth_date,
            "gender": request.gender,
            "phone": request.phone,
            "email": request.email,
            "address": request.address,
            "occupation": request.occupation,
            "blood_type": request.blood_type,
            "allergies": request.allergies,
            "current_medications": request.current_medications,
            "chronic_diseases": request.chronic_diseases,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_phone": request.emergency_contact_phone,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let patient: Patient = self
            .supabase
            .insert_returning("/rest/v1/patients", Some(auth_token), body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient {} created for odontologo {}", patient.id, odontologo_id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        odontologo_id: Uuid,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        self.get_patient(odontologo_id, patient_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        macro_rules! set_field {
            ($field:ident) => {
                if let Some(v) = request.$field {
                    update_data.insert(stringify!($field).to_string(), json!(v));
                }
            };
        }
        set_field!(first_name);
        set_field!(last_name);
        set_field!(id_number);
        set_field!(birth_date);
        set_field!(gender);
        set_field!(phone);
        set_field!(email);
        set_field!(address);
        set_field!(occupation);
        set_field!(blood_type);
        set_field!(allergies);
        set_field!(current_medications);
        set_field!(chronic_diseases);
        set_field!(emergency_contact_name);
        set_field!(emergency_contact_phone);
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/patients?id=eq.{}&odontologo_id=eq.{}",
            patient_id, odontologo_id
        );
        self.supabase
            .patch_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn delete_patient(
        &self,
        odontologo_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        self.get_patient(odontologo_id, patient_id, auth_token).await?;

        let path = format!(
            "/rest/v1/patients?id=eq.{}&odontologo_id=eq.{}",
            patient_id, odontologo_id
        );
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient {} deleted", patient_id);
        Ok(())
    }
}
