// libs/academic-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{roles, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AcademicError, ClinicalHistoryStatus, CreateAcademicAppointmentRequest, CreateHistoryRequest,
    CreatePatientRequest, ReviewHistoryRequest, UpdateAcademicAppointmentRequest,
    UpdateHistoryRequest, UpdatePatientRequest,
};
use crate::services::appointments::AcademicAppointmentService;
use crate::services::histories::ClinicalHistoryService;
use crate::services::patients::AcademicPatientService;
use crate::services::reminders::AcademicReminderService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct PatientQueryParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub student_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub student_id: Option<Uuid>,
    pub status: Option<ClinicalHistoryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderQueryParams {
    pub appointment_id: Option<Uuid>,
}

fn map_academic_error(e: AcademicError) -> AppError {
    match e {
        AcademicError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AcademicError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        AcademicError::HistoryNotFound => {
            AppError::NotFound("Clinical history not found".to_string())
        }
        AcademicError::StudentNotFound => AppError::BadRequest("Student user not found".to_string()),
        AcademicError::ProfessorNotFound => {
            AppError::BadRequest("Professor user not found".to_string())
        }
        AcademicError::HistoryNotEditable | AcademicError::HistoryNotReviewable => {
            AppError::BadRequest(e.to_string())
        }
        AcademicError::ValidationError(msg) => AppError::BadRequest(msg),
        AcademicError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
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
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AcademicPatientService::new(&state);
    let patients = service
        .list_patients(params.search.as_deref(), auth.token())
        .await
        .map_err(map_academic_error)?;

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
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AcademicPatientService::new(&state);
    let patient = service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, roles::PROFESSOR)?;
    let professor_id = parse_user_id(&user)?;

    let service = AcademicPatientService::new(&state);
    let patient = service
        .create_patient(professor_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    require_role(&user, roles::PROFESSOR)?;

    let service = AcademicPatientService::new(&state);
    let patient = service
        .update_patient(patient_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    require_role(&user, roles::PROFESSOR)?;

    let service = AcademicPatientService::new(&state);
    service
        .delete_patient(patient_id, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    // Students only ever see their own rows.
    let student_id = if user.has_role(roles::STUDENT) {
        Some(parse_user_id(&user)?)
    } else {
        params.student_id
    };

    let service = AcademicAppointmentService::new(&state);
    let appointments = service
        .list_appointments(student_id, params.from, params.to, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAcademicAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, roles::PROFESSOR)?;
    let professor_id = parse_user_id(&user)?;

    let service = AcademicAppointmentService::new(&state);
    let appointment = service
        .create_appointment(professor_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment created successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAcademicAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, roles::PROFESSOR)?;

    let service = AcademicAppointmentService::new(&state);
    let appointment = service
        .update_appointment(appointment_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, roles::PROFESSOR)?;

    let service = AcademicAppointmentService::new(&state);
    service
        .delete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

// ==============================================================================
// REMINDER HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_reminders(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ReminderQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AcademicReminderService::new(&state);

    // Students only see reminders tied to their own appointments.
    let reminders = if user.has_role(roles::STUDENT) {
        let student_id = parse_user_id(&user)?;
        service
            .list_for_student(student_id, params.appointment_id, auth.token())
            .await
    } else {
        require_role(&user, roles::PROFESSOR)?;
        service.list_all(params.appointment_id, auth.token()).await
    }
    .map_err(map_academic_error)?;

    Ok(Json(json!({
        "reminders": reminders,
        "total": reminders.len()
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
    let student_id = if user.has_role(roles::STUDENT) {
        Some(parse_user_id(&user)?)
    } else {
        params.student_id
    };

    let service = ClinicalHistoryService::new(&state);
    let histories = service
        .list_histories(student_id, params.status, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    let service = ClinicalHistoryService::new(&state);
    let history = service
        .get_history(history_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    if user.has_role(roles::STUDENT) && history.student_id != parse_user_id(&user)? {
        return Err(AppError::Forbidden(
            "Not authorized to view this clinical history".to_string(),
        ));
    }

    Ok(Json(json!(history)))
}

#[axum::debug_handler]
pub async fn create_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateHistoryRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, roles::STUDENT)?;
    let student_id = parse_user_id(&user)?;

    let service = ClinicalHistoryService::new(&state);
    let history = service
        .create_history(student_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    let service = ClinicalHistoryService::new(&state);
    let history = service
        .get_history(history_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    // Students may only edit their own drafts. Professors may always edit.
    if user.has_role(roles::STUDENT) {
        if history.student_id != parse_user_id(&user)? {
            return Err(AppError::Forbidden(
                "Not authorized to edit this clinical history".to_string(),
            ));
        }
        if history.status != ClinicalHistoryStatus::Draft {
            return Err(AppError::BadRequest(
                "Clinical history can only be edited while in draft".to_string(),
            ));
        }
    } else {
        require_role(&user, roles::PROFESSOR)?;
    }

    let updated = service
        .update_history(&history, request, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    require_role(&user, roles::STUDENT)?;

    let service = ClinicalHistoryService::new(&state);
    let history = service
        .get_history(history_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    if history.student_id != parse_user_id(&user)? {
        return Err(AppError::Forbidden(
            "Not authorized to submit this clinical history".to_string(),
        ));
    }

    let submitted = service
        .submit_history(&history, auth.token())
        .await
        .map_err(map_academic_error)?;

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
    require_role(&user, roles::PROFESSOR)?;
    let professor_id = parse_user_id(&user)?;

    let service = ClinicalHistoryService::new(&state);
    let history = service
        .get_history(history_id, auth.token())
        .await
        .map_err(map_academic_error)?;

    let reviewed = service
        .review_history(&history, professor_id, request, auth.token())
        .await
        .map_err(map_academic_error)?;

    Ok(Json(json!({
        "success": true,
        "history": reviewed,
        "message": "Clinical history reviewed"
    })))
}
