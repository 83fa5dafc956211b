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

use inventory_cell::handlers::{
    check_alerts, create_purchase, list_items, list_purchases, receive_purchase, record_entry,
    record_exit, ItemQueryParams, PurchaseQueryParams,
};
use inventory_cell::models::{
    CreatePurchaseRequest, EntryMovementRequest, ExitMovementRequest, PurchaseItem,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn setup(user: &TestUser) -> (MockServer, Arc<shared_config::AppConfig>, String) {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24));
    (mock_server, Arc::new(config), token)
}

fn item_row(id: Uuid, odontologo_id: &str, quantity: i32, minimum: i32) -> serde_json::Value {
    json!({
        "id": id,
        "odontologo_id": odontologo_id,
        "name": "Guantes de nitrilo",
        "description": null,
        "sku": "GNT-01",
        "quantity": quantity,
        "minimum_quantity": minimum,
        "maximum_quantity": null,
        "reorder_point": null,
        "unit_price": 8.5,
        "average_cost": 8.0,
        "supplier": null,
        "location": null,
        "batch": null,
        "expiration_date": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

fn movement_row(item_id: Uuid, odontologo_id: &str, movement_type: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "odontologo_id": odontologo_id,
        "inventory_item_id": item_id,
        "movement_date": Utc::now().to_rfc3339(),
        "movement_type": movement_type,
        "quantity": 5,
        "unit_price": 8.0,
        "total_cost": 40.0,
        "stock_before": 10,
        "stock_after": if movement_type == "entry" { 15 } else { 5 },
        "reference": null,
        "notes": null,
        "purchase_order_id": null,
        "created_at": Utc::now().to_rfc3339()
    })
}

fn purchase_row(
    id: Uuid,
    odontologo_id: &str,
    item_id: Uuid,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "odontologo_id": odontologo_id,
        "supplier": "Dental Import",
        "invoice_number": "001-001-000000123",
        "purchase_date": Utc::now().to_rfc3339(),
        "notes": null,
        "total": 42.5,
        "status": status,
        "items": [{
            "inventory_item_id": item_id,
            "quantity": 5,
            "unit_price": 8.5,
            "expiration_date": null
        }],
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_student_cannot_access_inventory() {
    let student = TestUser::student("student@example.com");
    let (_mock_server, config, token) = setup(&student).await;

    let result = list_items(
        State(config),
        Query(ItemQueryParams { search: None }),
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
async fn test_list_items_attaches_derived_flags() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    // 2 <= minimum 5 should flag as low stock.
    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_items"))
        .and(query_param("odontologo_id", format!("eq.{}", odontologo.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item_row(
            Uuid::new_v4(),
            &odontologo.id,
            2,
            5
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_items(
        State(config),
        Query(ItemQueryParams { search: None }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["is_low_stock"], true);
}

#[tokio::test]
async fn test_entry_updates_stock_and_average_cost() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let item_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item_row(
            item_id,
            &odontologo.id,
            10,
            2
        )])))
        .mount(&mock_server)
        .await;

    // 10 @ 8.00 plus 10 @ 10.00 averages to 9.00.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/inventory_items"))
        .and(body_partial_json(json!({ "quantity": 20, "average_cost": 9.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item_row(
            item_id,
            &odontologo.id,
            20,
            2
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory_movements"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([movement_row(
            item_id,
            &odontologo.id,
            "entry"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = record_entry(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(EntryMovementRequest {
            inventory_item_id: item_id,
            quantity: 10,
            unit_price: 10.0,
            reference: None,
            notes: None,
        }),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_exit_rejects_insufficient_stock() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let item_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item_row(
            item_id,
            &odontologo.id,
            3,
            2
        )])))
        .mount(&mock_server)
        .await;

    let result = record_exit(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(ExitMovementRequest {
            inventory_item_id: item_id,
            quantity: 5,
            reference: None,
            notes: None,
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert!(msg.contains("Insufficient stock")),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_check_alerts_creates_low_stock_alert() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let item_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item_row(
            item_id,
            &odontologo.id,
            1,
            5
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory_alerts"))
        .and(body_partial_json(json!({ "alert_type": "low_stock" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = check_alerts(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body["alerts_created"], 1);
}

#[tokio::test]
async fn test_list_purchases_sets_pagination_headers() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let item_id = Uuid::new_v4();

    let rows: Vec<serde_json::Value> = (0..3)
        .map(|_| purchase_row(Uuid::new_v4(), &odontologo.id, item_id, "pending"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/purchase_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = list_purchases(
        State(config),
        Query(PurchaseQueryParams {
            supplier: None,
            status: None,
            from: None,
            to: None,
            page: Some(1),
            page_size: Some(2),
        }),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    let (headers, Json(body)) = result.unwrap();
    assert_eq!(headers.get("X-Total-Count").unwrap(), "3");
    assert_eq!(headers.get("X-Page").unwrap(), "1");
    assert_eq!(headers.get("X-Page-Size").unwrap(), "2");
    assert_eq!(body["purchases"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_create_purchase_rejects_foreign_item() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;

    // The owner-scoped lookup finds nothing for this item.
    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = create_purchase(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
        Json(CreatePurchaseRequest {
            supplier: "Dental Import".to_string(),
            invoice_number: None,
            purchase_date: None,
            notes: None,
            status: None,
            items: vec![PurchaseItem {
                inventory_item_id: Uuid::new_v4(),
                quantity: 5,
                unit_price: 8.5,
                expiration_date: None,
            }],
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
async fn test_receive_purchase_twice_is_rejected() {
    let odontologo = TestUser::odontologo("dentist@example.com");
    let (mock_server, config, token) = setup(&odontologo).await;
    let purchase_id = Uuid::new_v4();
    let item_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/purchase_orders"))
        .and(query_param("id", format!("eq.{}", purchase_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([purchase_row(
            purchase_id,
            &odontologo.id,
            item_id,
            "received"
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = receive_purchase(
        State(config),
        Path(purchase_id),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(odontologo.to_user()),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert!(msg.contains("already received")),
        other => panic!("Expected BadRequest, got {:?}", other),
    }
}
