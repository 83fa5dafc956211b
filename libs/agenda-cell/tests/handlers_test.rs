use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::Authorization;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agenda_cell::handlers::{
    create_appointment, delete_appointment, get_availability, list_appointments,
    update_appointment, AgendaQueryParams, AvailabilityQueryParams,
};
use agenda_cell::models::{CreateAppointmentRequest, UpdateAppointmentRequest};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn appointment_row(
    id: Uuid,
    student_id: Uuid,
    professor_id: Uuid,
    start: &str,
    end: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "student_id": student_id,
        "professor_id": professor_id,
        "patient_name": "Maria Lopez",
        "reason": "Control",
        "start_at": start,
        "end_at": end,
        "status": "pending",
        "notes": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

fn user_row(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "email": "user@example.com",
        "phone": "+593999999999"
    })
}

async fn setup(user: &TestUser) -> (MockServer, Arc<shared_config::AppConfig>, String) {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24));
    (mock_server, Arc::new(config), token)
}

#[tokio::test]
async fn test_list_appointments_as_professor() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let professor_id = Uuid::parse_str(&professor.id).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/agenda_appointments"))
        .and(query_param("professor_id", format!("eq.{}", professor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                Uuid::new_v4(),
                Uuid::new_v4(),
                professor_id,
                "2025-03-17T10:00:00Z",
                "2025-03-17T11:00:00Z"
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = list_appointments(
        State(config),
        Query(AgendaQueryParams {
            student_id: None,
            professor_id: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response["total"], 1);
}

#[tokio::test]
async fn test_student_cannot_book_for_another_student() {
    let student = TestUser::student("student@example.com");
    let (_mock_server, config, token) = setup(&student).await;

    let request = CreateAppointmentRequest {
        student_id: Some(Uuid::new_v4()),
        professor_id: Some(Uuid::new_v4()),
        patient_name: "Maria Lopez".to_string(),
        reason: None,
        start_at: "2025-03-17T10:00:00Z".parse().unwrap(),
        end_at: "2025-03-17T11:00:00Z".parse().unwrap(),
        notes: None,
    };

    let result = create_appointment(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
        Json(request),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Forbidden(_) => {}
        other => panic!("Expected Forbidden, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_appointment_unknown_student_is_rejected() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let student_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", student_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = CreateAppointmentRequest {
        student_id: Some(student_id),
        professor_id: None,
        patient_name: "Maria Lopez".to_string(),
        reason: None,
        start_at: "2025-03-17T10:00:00Z".parse().unwrap(),
        end_at: "2025-03-17T11:00:00Z".parse().unwrap(),
        notes: None,
    };

    let result = create_appointment(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
        Json(request),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert_eq!(msg, "Student user not found"),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_appointment_creates_default_reminders() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let professor_id = Uuid::parse_str(&professor.id).unwrap();
    let student_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", student_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(student_id)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", professor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(professor_id)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/agenda_appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment_row(
            appointment_id,
            student_id,
            professor_id,
            "2025-03-17T10:00:00Z",
            "2025-03-17T11:00:00Z"
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CreateAppointmentRequest {
        student_id: Some(student_id),
        professor_id: None,
        patient_name: "Maria Lopez".to_string(),
        reason: Some("Control".to_string()),
        start_at: "2025-03-17T10:00:00Z".parse().unwrap(),
        end_at: "2025-03-17T11:00:00Z".parse().unwrap(),
        notes: None,
    };

    let result = create_appointment(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
        Json(request),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response["success"], true);
    assert_eq!(response["appointment"]["id"], appointment_id.to_string());
}

#[tokio::test]
async fn test_availability_marks_booked_slot() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let professor_id = Uuid::parse_str(&professor.id).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/agenda_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                Uuid::new_v4(),
                Uuid::new_v4(),
                professor_id,
                "2025-03-17T10:00:00Z",
                "2025-03-17T11:00:00Z"
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = get_availability(
        State(config),
        Query(AvailabilityQueryParams {
            date: NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
            professor_id: None,
            student_id: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    let slots = response["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 10);

    let occupied: Vec<_> = slots
        .iter()
        .filter(|s| s["is_available"] == false)
        .collect();
    assert_eq!(occupied.len(), 1);
    assert_eq!(occupied[0]["start_at"], "2025-03-17T10:00:00+00:00");
}

#[tokio::test]
async fn test_update_rejects_foreign_appointment() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;

    // Appointment belongs to a different student.
    Mock::given(method("GET"))
        .and(path("/rest/v1/agenda_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "2025-03-17T10:00:00Z",
            "2025-03-17T11:00:00Z"
        )])))
        .mount(&mock_server)
        .await;

    let result = update_appointment(
        State(config),
        Path(Uuid::new_v4()),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
        Json(UpdateAppointmentRequest {
            patient_name: None,
            reason: None,
            notes: Some("updated".to_string()),
            status: None,
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Forbidden(_) => {}
        other => panic!("Expected Forbidden, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_appointment_removes_reminders_first() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let professor_id = Uuid::parse_str(&professor.id).unwrap();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/agenda_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            appointment_id,
            Uuid::new_v4(),
            professor_id,
            "2025-03-17T10:00:00Z",
            "2025-03-17T11:00:00Z"
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/reminders"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/agenda_appointments"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = delete_appointment(
        State(config),
        Path(appointment_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["success"], true);
}
