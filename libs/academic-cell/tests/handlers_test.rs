use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::Authorization;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use academic_cell::handlers::{
    create_history, create_patient, get_history, list_appointments, list_reminders,
    review_history, submit_history, update_history, AppointmentQueryParams, ReminderQueryParams,
};
use academic_cell::models::{
    CreateHistoryRequest, CreatePatientRequest, ReviewHistoryRequest, UpdateHistoryRequest,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn setup(user: &TestUser) -> (MockServer, Arc<shared_config::AppConfig>, String) {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24));
    (mock_server, Arc::new(config), token)
}

fn history_row(id: Uuid, student_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "student_id": student_id,
        "data": {"odontograma": {}},
        "status": status,
        "reviewed_by_professor_id": null,
        "professor_comments": null,
        "reviewed_at": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_student_cannot_create_patient() {
    let student = TestUser::student("student@example.com");
    let (_mock_server, config, token) = setup(&student).await;

    let request = CreatePatientRequest {
        first_name: "Ana".to_string(),
        last_name: "Torres".to_string(),
        cedula: "1712345678".to_string(),
        birth_date: None,
        phone: None,
        email: None,
        address: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
        medical_conditions: None,
        allergies: None,
    };

    let result = create_patient(
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
async fn test_professor_creates_patient() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/academic_patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": patient_id,
            "first_name": "Ana",
            "last_name": "Torres",
            "cedula": "1712345678",
            "birth_date": null,
            "phone": null,
            "email": null,
            "address": null,
            "emergency_contact_name": null,
            "emergency_contact_phone": null,
            "medical_conditions": null,
            "allergies": null,
            "created_by_professor_id": professor.id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let request = CreatePatientRequest {
        first_name: "Ana".to_string(),
        last_name: "Torres".to_string(),
        cedula: "1712345678".to_string(),
        birth_date: None,
        phone: None,
        email: None,
        address: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
        medical_conditions: None,
        allergies: None,
    };

    let result = create_patient(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
        Json(request),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response["success"], true);
    assert_eq!(response["patient"]["id"], patient_id.to_string());
}

#[tokio::test]
async fn test_student_appointment_listing_is_scoped() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_appointments"))
        .and(query_param("student_id", format!("eq.{}", student.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_appointments(
        State(config),
        Query(AppointmentQueryParams {
            student_id: Some(Uuid::new_v4()), // ignored for students
            from: None,
            to: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["total"], 0);
}

#[tokio::test]
async fn test_student_creates_draft_history() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;
    let history_id = Uuid::new_v4();
    let student_id = Uuid::parse_str(&student.id).unwrap();

    Mock::given(method("POST"))
        .and(path("/rest/v1/academic_clinical_histories"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([history_row(
            history_id, student_id, "draft"
        )])))
        .mount(&mock_server)
        .await;

    let result = create_history(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
        Json(CreateHistoryRequest {
            data: json!({"odontograma": {}}),
        }),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response["history"]["status"], "draft");
}

#[tokio::test]
async fn test_student_cannot_view_foreign_history() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;
    let history_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
            history_id,
            Uuid::new_v4(),
            "draft"
        )])))
        .mount(&mock_server)
        .await;

    let result = get_history(
        State(config),
        Path(history_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Forbidden(_) => {}
        other => panic!("Expected Forbidden, got {:?}", other),
    }
}

#[tokio::test]
async fn test_student_cannot_edit_submitted_history() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;
    let history_id = Uuid::new_v4();
    let student_id = Uuid::parse_str(&student.id).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
            history_id, student_id, "submitted"
        )])))
        .mount(&mock_server)
        .await;

    let result = update_history(
        State(config),
        Path(history_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
        Json(UpdateHistoryRequest {
            data: json!({"odontograma": {"18": "caries"}}),
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert!(msg.contains("draft")),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_then_review_flow() {
    let student = TestUser::student("student@example.com");
    let professor = TestUser::professor("prof@example.com");
    let history_id = Uuid::new_v4();
    let student_id = Uuid::parse_str(&student.id).unwrap();

    // Student submits a draft.
    {
        let (mock_server, config, token) = setup(&student).await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/academic_clinical_histories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
                history_id, student_id, "draft"
            )])))
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/academic_clinical_histories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
                history_id, student_id, "submitted"
            )])))
            .mount(&mock_server)
            .await;

        let result = submit_history(
            State(config),
            Path(history_id),
            TypedHeader(Authorization::bearer(&token).unwrap()),
            Extension(student.to_user()),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap().0["history"]["status"], "submitted");
    }

    // Professor approves it.
    {
        let (mock_server, config, token) = setup(&professor).await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/academic_clinical_histories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
                history_id, student_id, "submitted"
            )])))
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/academic_clinical_histories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": history_id,
                "student_id": student_id,
                "data": {"odontograma": {}},
                "status": "approved",
                "reviewed_by_professor_id": professor.id,
                "professor_comments": "Bien documentado",
                "reviewed_at": Utc::now().to_rfc3339(),
                "created_at": Utc::now().to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339()
            }])))
            .mount(&mock_server)
            .await;

        let result = review_history(
            State(config),
            Path(history_id),
            TypedHeader(Authorization::bearer(&token).unwrap()),
            Extension(professor.to_user()),
            Json(ReviewHistoryRequest {
                approved: true,
                comments: Some("Bien documentado".to_string()),
            }),
        )
        .await;

        assert!(result.is_ok());
        let response = result.unwrap().0;
        assert_eq!(response["history"]["status"], "approved");
    }
}

#[tokio::test]
async fn test_review_requires_submitted_status() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let history_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row(
            history_id,
            Uuid::new_v4(),
            "draft"
        )])))
        .mount(&mock_server)
        .await;

    let result = review_history(
        State(config),
        Path(history_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
        Json(ReviewHistoryRequest {
            approved: false,
            comments: None,
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(_) => {}
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

fn reminder_row(appointment_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "appointment_id": appointment_id,
        "channel": "email",
        "target": "student@example.com",
        "message": "Recordatorio: cita el 17/03/2025 09:00",
        "scheduled_at": Utc::now().to_rfc3339(),
        "sent_at": null,
        "status": status,
        "created_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_professor_lists_all_reminders() {
    let professor = TestUser::professor("prof@example.com");
    let (mock_server, config, token) = setup(&professor).await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reminder_row(appointment_id, "pending"),
            reminder_row(appointment_id, "due")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_reminders(
        State(config),
        Query(ReminderQueryParams {
            appointment_id: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(professor.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["total"], 2);
}

#[tokio::test]
async fn test_student_reminders_are_scoped_to_own_appointments() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_appointments"))
        .and(query_param("student_id", format!("eq.{}", student.id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": appointment_id }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .and(query_param(
            "appointment_id",
            format!("in.({})", appointment_id),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([reminder_row(appointment_id, "due")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_reminders(
        State(config),
        Query(ReminderQueryParams {
            appointment_id: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
    )
    .await;

    assert!(result.is_ok());
    let body = result.unwrap().0;
    assert_eq!(body["total"], 1);
    assert_eq!(body["reminders"][0]["status"], "due");
}

#[tokio::test]
async fn test_student_cannot_filter_by_foreign_appointment() {
    let student = TestUser::student("student@example.com");
    let (mock_server, config, token) = setup(&student).await;

    // The student has no appointments, so any filter resolves to nothing.
    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = list_reminders(
        State(config),
        Query(ReminderQueryParams {
            appointment_id: Some(Uuid::new_v4()),
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(student.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["total"], 0);
}
