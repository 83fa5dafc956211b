use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::Authorization;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::handlers::{
    create_appointment, create_patient, get_patient, list_appointments, list_patients,
    submit_history, update_appointment, update_history, AppointmentQueryParams,
    PatientQueryParams,
};
use patient_cell::models::{
    CreateAppointmentRequest, CreatePatientRequest, UpdateAppointmentRequest,
    UpdateHistoryRequest,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn setup(user: &TestUser) -> (MockServer, Arc<shared_config::AppConfig>, String) {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24));
    (mock_server, Arc::new(config), token)
}

fn patient_row(id: Uuid, odontologo_id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "odontologo_id": odontologo_id,
        "first_name": "Carlos",
        "last_name": "Vera",
        "id_number": "0912345678",
        "birth_date": null,
        "gender": null,
        "phone": null,
        "email": null,
        "address": null,
        "occupation": null,
        "blood_type": "O+",
        "allergies": null,
        "current_medications": null,
        "chronic_diseases": null,
        "emergency_contact_name": null,
        "emergency_contact_phone": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_student_cannot_access_patients() {
    let student = TestUser::student("student@example.com");
    let (_mock_server, config, token) = setup(&student).await;

    let result = list_patients(
        State(config),
        Query(PatientQueryParams { search: None }),
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
async fn test_list_patients_is_owner_scoped() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("odontologo_id", format!("eq.{}", odontologo.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            Uuid::new_v4(),
            &odontologo.id
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_patients(
        State(config),
        Query(PatientQueryParams { search: None }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["total"], 1);
}

#[tokio::test]
async fn test_foreign_patient_reads_as_not_found() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    // The owner filter excludes the row, so PostgREST returns nothing.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_patient(
        State(config),
        Path(Uuid::new_v4()),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::NotFound(_) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_patient_requires_id_number() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (_mock_server, config, token) = setup(&odontologo).await;

    let request = CreatePatientRequest {
        first_name: "Carlos".to_string(),
        last_name: "Vera".to_string(),
        id_number: "  ".to_string(),
        birth_date: None,
        gender: None,
        phone: None,
        email: None,
        address: None,
        occupation: None,
        blood_type: None,
        allergies: None,
        current_medications: None,
        chronic_diseases: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
    };

    let result = create_patient(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(request),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert!(msg.contains("id_number")),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submitted_history_cannot_be_edited() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let history_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": history_id,
            "odontologo_id": odontologo.id,
            "patient_id": null,
            "data": {},
            "status": "submitted",
            "submitted_at": Utc::now().to_rfc3339(),
            "reviewed_by": null,
            "review_comments": null,
            "reviewed_at": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let result = update_history(
        State(config),
        Path(history_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(UpdateHistoryRequest { data: json!({}) }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert!(msg.contains("draft")),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_history_sets_submitted_at() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let history_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": history_id,
            "odontologo_id": odontologo.id,
            "patient_id": null,
            "data": {},
            "status": "draft",
            "submitted_at": null,
            "reviewed_by": null,
            "review_comments": null,
            "reviewed_at": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinical_histories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": history_id,
            "odontologo_id": odontologo.id,
            "patient_id": null,
            "data": {},
            "status": "submitted",
            "submitted_at": Utc::now().to_rfc3339(),
            "reviewed_by": null,
            "review_comments": null,
            "reviewed_at": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let result = submit_history(
        State(config),
        Path(history_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response["history"]["status"], "submitted");
    assert!(!response["history"]["submitted_at"].is_null());
}

fn appointment_row(id: Uuid, odontologo_id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "odontologo_id": odontologo_id,
        "patient_name": "Carlos Vera",
        "reason": "Control de ortodoncia",
        "start_at": Utc::now().to_rfc3339(),
        "end_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
        "notes": null,
        "status": status,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_appointment_listing_is_owner_scoped() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/odontologo_appointments"))
        .and(query_param("odontologo_id", format!("eq.{}", odontologo.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            Uuid::new_v4(),
            &odontologo.id,
            "pending"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_appointments(
        State(config),
        Query(AppointmentQueryParams {
            start: None,
            end: None,
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["total"], 1);
}

#[tokio::test]
async fn test_foreign_appointment_reads_as_not_found() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    // The owner filter excludes the row, so PostgREST returns nothing.
    Mock::given(method("GET"))
        .and(path("/rest/v1/odontologo_appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = update_appointment(
        State(config),
        Path(Uuid::new_v4()),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(UpdateAppointmentRequest {
            patient_name: "Carlos Vera".to_string(),
            reason: "Control".to_string(),
            notes: None,
            status: None,
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::NotFound(_) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_appointment_defaults_to_pending() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let appointment_id = Uuid::new_v4();
    let start = Utc::now();

    Mock::given(method("POST"))
        .and(path("/rest/v1/odontologo_appointments"))
        .and(body_partial_json(json!({
            "odontologo_id": odontologo.id,
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment_row(
            appointment_id,
            &odontologo.id,
            "pending"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(CreateAppointmentRequest {
            patient_name: "Carlos Vera".to_string(),
            reason: "Control de ortodoncia".to_string(),
            start_at: start,
            end_at: start + chrono::Duration::hours(1),
            notes: None,
            status: None,
        }),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().0["status"], "pending");
}
