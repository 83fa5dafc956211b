// libs/reminder-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ReminderError, ReminderStatus};
use crate::services::reminders::ReminderService;

#[derive(Debug, Deserialize)]
pub struct ReminderQueryParams {
    pub status: Option<ReminderStatus>,
}

fn map_reminder_error(e: ReminderError) -> AppError {
    match e {
        ReminderError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn list_reminders(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ReminderQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ReminderService::new(&state);

    let reminders = if user.is_provider() {
        service
            .list_all(params.status, token)
            .await
            .map_err(map_reminder_error)?
    } else {
        let student_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;
        service
            .list_for_student(student_id, params.status, token)
            .await
            .map_err(map_reminder_error)?
    };

    Ok(Json(json!({
        "reminders": reminders,
        "total": reminders.len()
    })))
}
