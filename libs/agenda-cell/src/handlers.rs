// libs/agenda-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AgendaError, Appointment, CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::services::agenda::AgendaService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AgendaQueryParams {
    pub student_id: Option<Uuid>,
    pub professor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub date: NaiveDate,
    pub professor_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

fn map_agenda_error(e: AgendaError) -> AppError {
    match e {
        AgendaError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AgendaError::StudentNotFound => AppError::BadRequest("Student user not found".to_string()),
        AgendaError::ProfessorNotFound => {
            AppError::BadRequest("Professor user not found".to_string())
        }
        AgendaError::ValidationError(msg) => AppError::BadRequest(msg),
        AgendaError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

/// Ownership check shared by update and delete.
fn verify_ownership(appointment: &Appointment, user: &User) -> Result<(), AppError> {
    let user_id = parse_user_id(user)?;
    let owns = if user.is_provider() {
        appointment.professor_id == user_id
    } else {
        appointment.student_id == user_id
    };
    if !owns {
        return Err(AppError::Forbidden(
            "Not authorized to modify this appointment".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AgendaQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    // Providers default to their own agenda and may narrow by student.
    // Students only ever see their own rows.
    let (student_id, professor_id) = if user.is_provider() {
        (params.student_id, Some(params.professor_id.unwrap_or(user_id)))
    } else {
        (Some(user_id), params.professor_id)
    };

    let service = AgendaService::new(&state);
    let appointments = service
        .list_appointments(student_id, professor_id, token)
        .await
        .map_err(map_agenda_error)?;

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
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let student_id = request.student_id.unwrap_or(user_id);

    if !user.is_provider() && student_id != user_id {
        return Err(AppError::Forbidden(
            "Students can only book appointments for themselves".to_string(),
        ));
    }

    let professor_id = if user.is_provider() {
        user_id
    } else {
        request
            .professor_id
            .ok_or_else(|| AppError::BadRequest("professor_id is required".to_string()))?
    };

    let service = AgendaService::new(&state);
    let appointment = service
        .create_appointment(student_id, professor_id, request, token)
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AvailabilityQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = parse_user_id(&user)?;

    let (student_id, professor_id) = if user.is_provider() {
        (params.student_id, Some(params.professor_id.unwrap_or(user_id)))
    } else {
        (Some(user_id), params.professor_id)
    };

    let service = AgendaService::new(&state);
    let availability = service
        .get_availability(params.date, professor_id, student_id, token)
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AgendaService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_agenda_error)?;
    verify_ownership(&appointment, &user)?;

    let updated = service
        .update_appointment(appointment_id, request, token)
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
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
    let token = auth.token();
    let service = AgendaService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_agenda_error)?;
    verify_ownership(&appointment, &user)?;

    service
        .delete_appointment(appointment_id, token)
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}
