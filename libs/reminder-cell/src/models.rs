// libs/reminder-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub channel: ReminderChannel,
    pub target: String,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChannel {
    Email,
    Whatsapp,
}

/// State machine: the worker moves `Pending` reminders to `Due` once their
/// scheduled time passes. `Sent` is reserved for a delivery integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Due,
    Sent,
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Due => write!(f, "due"),
            ReminderStatus::Sent => write!(f, "sent"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}
