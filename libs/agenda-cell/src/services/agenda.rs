// libs/agenda-cell/src/services/agenda.rs
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AgendaError, Appointment, AppointmentStatus, AvailabilityResponse,
    CreateAppointmentRequest, NewReminder, ReminderChannel, TimeSlot, UpdateAppointmentRequest,
};

/// Working day boundaries for the slot calculator, in whole hours.
const WORK_DAY_START_HOUR: u32 = 8;
const WORK_DAY_END_HOUR: u32 = 18;

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
    phone: Option<String>,
}

pub struct AgendaService {
    supabase: Arc<SupabaseClient>,
}

impl AgendaService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// List appointments, optionally filtered by student and professor, ordered by start time.
    pub async fn list_appointments(
        &self,
        student_id: Option<Uuid>,
        professor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AgendaError> {
        let mut query_parts = Vec::new();
        if let Some(student_id) = student_id {
            query_parts.push(format!("student_id=eq.{}", student_id));
        }
        if let Some(professor_id) = professor_id {
            query_parts.push(format!("professor_id=eq.{}", professor_id));
        }
        query_parts.push("order=start_at.asc".to_string());

        let path = format!("/rest/v1/agenda_appointments?{}", query_parts.join("&"));
        debug!("Listing agenda appointments: {}", path);

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AgendaError> {
        let path = format!("/rest/v1/agenda_appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AgendaError::NotFound)
    }

    /// Book an appointment and create its default reminders.
    pub async fn create_appointment(
        &self,
        student_id: Uuid,
        professor_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AgendaError> {
        if request.end_at <= request.start_at {
            return Err(AgendaError::ValidationError(
                "Appointment end must be after start".to_string(),
            ));
        }

        let student = self
            .fetch_user(student_id, auth_token)
            .await?
            .ok_or(AgendaError::StudentNotFound)?;
        self.fetch_user(professor_id, auth_token)
            .await?
            .ok_or(AgendaError::ProfessorNotFound)?;

        let now = Utc::now();
        let appointment_data = json!({
            "student_id": student_id,
            "professor_id": professor_id,
            "patient_name": request.patient_name,
            "reason": request.reason,
            "start_at": request.start_at.to_rfc3339(),
            "end_at": request.end_at.to_rfc3339(),
            "status": AppointmentStatus::Pending.to_string(),
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let appointment: Appointment = self
            .supabase
            .insert_returning("/rest/v1/agenda_appointments", Some(auth_token), appointment_data)
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        self.create_default_reminders(&appointment, &student, auth_token)
            .await?;

        info!("Agenda appointment {} booked for student {}", appointment.id, student_id);
        Ok(appointment)
    }

    /// Default reminders: 24h and 2h before start, one email and one whatsapp each.
    async fn create_default_reminders(
        &self,
        appointment: &Appointment,
        student: &UserRecord,
        auth_token: &str,
    ) -> Result<(), AgendaError> {
        let message = format!(
            "Recordatorio: cita el {}",
            appointment.start_at.format("%d/%m/%Y %H:%M")
        );
        let email_target = student.email.clone().unwrap_or_else(|| student.id.to_string());
        let whatsapp_target = student
            .phone
            .clone()
            .unwrap_or_else(|| email_target.clone());

        let mut reminders = Vec::new();
        for offset_hours in [24i64, 2] {
            let scheduled_at = appointment.start_at - ChronoDuration::hours(offset_hours);
            for channel in [ReminderChannel::Email, ReminderChannel::Whatsapp] {
                let target = match channel {
                    ReminderChannel::Email => email_target.clone(),
                    ReminderChannel::Whatsapp => whatsapp_target.clone(),
                };
                reminders.push(NewReminder {
                    appointment_id: appointment.id,
                    channel,
                    target,
                    message: message.clone(),
                    scheduled_at,
                    status: "pending".to_string(),
                });
            }
        }

        let body = serde_json::to_value(&reminders)
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        let _: Vec<Value> = self
            .supabase
            .request(Method::POST, "/rest/v1/reminders", Some(auth_token), Some(body))
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        debug!("Created {} default reminders for appointment {}", 4, appointment.id);
        Ok(())
    }

    /// Slot availability for one working day.
    pub async fn get_availability(
        &self,
        date: NaiveDate,
        professor_id: Option<Uuid>,
        student_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<AvailabilityResponse, AgendaError> {
        let day_start = day_start_utc(date);
        let day_end = day_start + ChronoDuration::days(1);

        let mut query_parts = vec![
            format!("start_at=gte.{}", urlencoding::encode(&day_start.to_rfc3339())),
            format!("start_at=lt.{}", urlencoding::encode(&day_end.to_rfc3339())),
        ];
        if let Some(professor_id) = professor_id {
            query_parts.push(format!("professor_id=eq.{}", professor_id));
        }
        if let Some(student_id) = student_id {
            query_parts.push(format!("student_id=eq.{}", student_id));
        }

        let path = format!("/rest/v1/agenda_appointments?{}", query_parts.join("&"));
        let appointments: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        Ok(AvailabilityResponse {
            date,
            slots: build_day_slots(date, &appointments),
        })
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AgendaError> {
        let mut update_data = serde_json::Map::new();
        if let Some(patient_name) = request.patient_name {
            update_data.insert("patient_name".to_string(), json!(patient_name));
        }
        if let Some(reason) = request.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status.to_string()));
        }

        if update_data.is_empty() {
            return self.get_appointment(appointment_id, auth_token).await;
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/agenda_appointments?id=eq.{}", appointment_id);
        let updated: Appointment = self
            .supabase
            .patch_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        Ok(updated)
    }

    /// Deletes the appointment and its reminders.
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AgendaError> {
        let reminders_path = format!("/rest/v1/reminders?appointment_id=eq.{}", appointment_id);
        if let Err(e) = self.supabase.delete(&reminders_path, Some(auth_token)).await {
            warn!("Failed to delete reminders for appointment {}: {}", appointment_id, e);
        }

        let path = format!("/rest/v1/agenda_appointments?id=eq.{}", appointment_id);
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        info!("Agenda appointment {} deleted", appointment_id);
        Ok(())
    }

    async fn fetch_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<UserRecord>, AgendaError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=id,email,phone", user_id);
        let rows: Vec<UserRecord> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}

fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

/// Builds the ten hourly slots of a working day and marks the occupied ones.
///
/// A slot is occupied when an appointment overlaps it: either the slot start
/// falls inside the appointment, or the slot end does. Appointment status is
/// not considered. An appointment ending exactly at a slot boundary does not
/// occupy the following slot.
pub fn build_day_slots(date: NaiveDate, appointments: &[Appointment]) -> Vec<TimeSlot> {
    let mut slots = Vec::with_capacity((WORK_DAY_END_HOUR - WORK_DAY_START_HOUR) as usize);

    for hour in WORK_DAY_START_HOUR..WORK_DAY_END_HOUR {
        let slot_start = match date.and_hms_opt(hour, 0, 0) {
            Some(naive) => naive.and_utc(),
            None => continue,
        };
        let slot_end = slot_start + ChronoDuration::hours(1);

        let occupied = appointments.iter().any(|a| {
            (slot_start >= a.start_at && slot_start < a.end_at)
                || (slot_end > a.start_at && slot_end <= a.end_at)
        });

        slots.push(TimeSlot {
            start_at: slot_start,
            end_at: slot_end,
            is_available: !occupied,
        });
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(date: NaiveDate, start_hour: u32, end_hour: u32) -> Appointment {
        let start_at = date.and_hms_opt(start_hour, 0, 0).unwrap().and_utc();
        let end_at = date.and_hms_opt(end_hour, 0, 0).unwrap().and_utc();
        Appointment {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            professor_id: Uuid::new_v4(),
            patient_name: "Test Patient".to_string(),
            reason: None,
            start_at,
            end_at,
            status: AppointmentStatus::Pending,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 17).unwrap()
    }

    #[test]
    fn empty_day_has_ten_free_slots() {
        let slots = build_day_slots(test_date(), &[]);

        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| s.is_available));
        assert_eq!(slots[0].start_at.format("%H:%M").to_string(), "08:00");
        assert_eq!(slots[9].end_at.format("%H:%M").to_string(), "18:00");
    }

    #[test]
    fn slots_are_contiguous() {
        let slots = build_day_slots(test_date(), &[]);

        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_at, pair[1].start_at);
        }
    }

    #[test]
    fn one_hour_appointment_occupies_one_slot() {
        let date = test_date();
        let slots = build_day_slots(date, &[appointment(date, 10, 11)]);

        for slot in &slots {
            let hour = slot.start_at.format("%H").to_string();
            assert_eq!(slot.is_available, hour != "10", "slot at {}", hour);
        }
    }

    #[test]
    fn multi_hour_appointment_occupies_each_covered_slot() {
        let date = test_date();
        let slots = build_day_slots(date, &[appointment(date, 9, 12)]);

        let occupied: Vec<String> = slots
            .iter()
            .filter(|s| !s.is_available)
            .map(|s| s.start_at.format("%H").to_string())
            .collect();
        assert_eq!(occupied, vec!["09", "10", "11"]);
    }

    #[test]
    fn appointment_ending_on_boundary_leaves_next_slot_free() {
        let date = test_date();
        let slots = build_day_slots(date, &[appointment(date, 8, 9)]);

        assert!(!slots[0].is_available);
        assert!(slots[1].is_available);
    }

    #[test]
    fn cancelled_appointments_still_occupy_slots() {
        let date = test_date();
        let mut appt = appointment(date, 14, 15);
        appt.status = AppointmentStatus::Cancelled;
        let slots = build_day_slots(date, &[appt]);

        let occupied: Vec<_> = slots.iter().filter(|s| !s.is_available).collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].start_at.format("%H").to_string(), "14");
    }

    #[test]
    fn appointment_outside_working_hours_changes_nothing() {
        let date = test_date();
        let slots = build_day_slots(date, &[appointment(date, 19, 20)]);

        assert!(slots.iter().all(|s| s.is_available));
    }
}
