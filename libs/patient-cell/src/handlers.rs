// libs/patient-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{roles, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreateAppointmentRequest, CreateHistoryRequest, CreatePatientRequest, HistoryStatus,
    PatientError, ReviewHistoryRequest, UpdateAppointmentRequest, UpdateHistoryRequest,
    UpdatePatientRequest,
};
use crate::services::appointments::AppointmentService;
use crate::services::histories::HistoryService;
use crate::services::patients::PatientService;

#[derive(Debug, Deserialize)]
pub struct PatientQueryParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub start: Option<chrono::DateTime<chrono::Utc>>,
    pub end: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub patient_id: Option<Uuid>,
    pub status: Option<HistoryStatus>,
}

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        PatientError::HistoryNotFound => {
            AppError::NotFound("Clinical history not found".to_string())
        }
        PatientError::HistoryNotEditable | PatientError::HistoryNotReviewable => {
            AppError::BadRequest(e.to_string())
        }
        PatientError::ValidationError(msg) => AppError::BadRequest(msg),
        PatientError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn owner_id(user: &User) -> Result<Uuid, AppError> {
    require_role(user, roles::ODONTOLOGO)?;
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<PatientQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PatientService::new(&state);
    let patients = service
        .list_patients(odontologo_id, params.search.as_deref(), auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PatientService::new(&state);
    let patient = service
        .get_patient(odontologo_id, patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PatientService::new(&state);
    let patient = service
        .create_patient(odontologo_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient created successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PatientService::new(&state);
    let patient = service
        .update_patient(odontologo_id, patient_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = PatientService::new(&state);
    service
        .delete_patient(odontologo_id, patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient deleted successfully"
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AppointmentService::new(&state);
    let appointments = service
        .list_appointments(odontologo_id, params.start, params.end, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AppointmentService::new(&state);
    let appointment = service
        .get_appointment(odontologo_id, appointment_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AppointmentService::new(&state);
    let appointment = service
        .create_appointment(odontologo_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AppointmentService::new(&state);
    let appointment = service
        .update_appointment(odontologo_id, appointment_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = AppointmentService::new(&state);
    service
        .delete_appointment(odontologo_id, appointment_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// CLINICAL HISTORY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_histories(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<HistoryQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);
    let histories = service
        .list_histories(odontologo_id, params.patient_id, params.status, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "histories": histories,
        "total": histories.len()
    })))
}

#[axum::debug_handler]
pub async fn get_history(
    State(state): State<Arc<AppConfig>>,
    Path(history_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);
    let history = service
        .get_history(odontologo_id, history_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(history)))
}

#[axum::debug_handler]
pub async fn create_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateHistoryRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);

    // A linked patient must belong to the caller.
    if let Some(patient_id) = request.patient_id {
        PatientService::new(&state)
            .get_patient(odontologo_id, patient_id, auth.token())
            .await
            .map_err(map_patient_error)?;
    }

    let history = service
        .create_history(odontologo_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "history": history,
        "message": "Clinical history created successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_history(
    State(state): State<Arc<AppConfig>>,
    Path(history_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateHistoryRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);
    let history = service
        .get_history(odontologo_id, history_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    let updated = service
        .update_history(&history, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "history": updated,
        "message": "Clinical history updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn submit_history(
    State(state): State<Arc<AppConfig>>,
    Path(history_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);
    let history = service
        .get_history(odontologo_id, history_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    let submitted = service
        .submit_history(&history, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "history": submitted,
        "message": "Clinical history submitted for review"
    })))
}

#[axum::debug_handler]
pub async fn review_history(
    State(state): State<Arc<AppConfig>>,
    Path(history_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReviewHistoryRequest>,
) -> Result<Json<Value>, AppError> {
    let odontologo_id = owner_id(&user)?;

    let service = HistoryService::new(&state);
    let history = service
        .get_history(odontologo_id, history_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    let reviewed = service
        .review_history(&history, odontologo_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "history": reviewed,
        "message": "Clinical history reviewed"
    })))
}
