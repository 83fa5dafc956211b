use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reminder_cell::services::worker::ReminderWorkerService;
use shared_utils::test_utils::TestConfig;

fn reminder_row(id: Uuid, scheduled_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "appointment_id": Uuid::new_v4(),
        "channel": "email",
        "target": "student@example.com",
        "message": "Recordatorio: cita el 17/03/2025 10:00",
        "scheduled_at": scheduled_at,
        "sent_at": null,
        "status": "pending",
        "created_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_run_once_flags_pending_reminders_as_due() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    let due_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reminder_row(due_id, "2025-03-16T10:00:00Z")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reminders"))
        .and(body_json(json!({ "status": "due" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let worker = ReminderWorkerService::new(&config);
    worker.run_once().await;
}

#[tokio::test]
async fn test_run_once_with_no_due_reminders_patches_nothing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let worker = ReminderWorkerService::new(&config);
    worker.run_once().await;
}

#[tokio::test]
async fn test_run_once_survives_database_errors() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // The first table fails, the second is still polled.
    let worker = ReminderWorkerService::new(&config);
    worker.run_once().await;
}

#[tokio::test]
async fn test_run_once_polls_academic_reminders_too() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    let academic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/academic_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reminder_row(academic_id, "2025-03-16T08:00:00Z")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/academic_reminders"))
        .and(body_json(json!({ "status": "due" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let worker = ReminderWorkerService::new(&config);
    worker.run_once().await;
}
