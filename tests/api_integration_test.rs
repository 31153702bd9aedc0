//! HTTP surface: actor headers, status codes and the error body.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

fn booking_body(service_type: &str) -> Value {
    json!({
        "contact_name": "Casey Customer",
        "contact_phone": "+15550100",
        "contact_email": "casey@example.com",
        "service_type": service_type,
        "device_model": "Galaxy S22",
        "issue_description": "Does not charge",
        "preferred_date": "2030-05-14",
        "preferred_time_slot": "13:00-17:00",
        "service_address": "4 Mill Lane",
        "location_type": "Office",
        "terms_accepted": true
    })
}

#[tokio::test]
async fn health_probes_answer_without_actor() {
    let app = TestApp::new().await;

    let (status, body) = app.request(None, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, body) = app.request(None, Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn missing_actor_headers_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(None, Method::POST, "/api/v1/bookings", Some(booking_body("InShop")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn booking_is_created_and_read_back() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Some(&app.customer),
            Method::POST,
            "/api/v1/bookings",
            Some(booking_body("OnSite")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Pending");
    assert_eq!(body["data"]["service_type"], "OnSite");
    let id = body["data"]["id"].as_str().expect("booking id").to_string();

    let (status, body) = app
        .request(
            Some(&app.customer),
            Method::GET,
            &format!("/api/v1/bookings/{}", id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());

    let (status, body) = app
        .request(
            Some(&app.other_customer),
            Method::GET,
            &format!("/api/v1/bookings/{}", id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn invalid_booking_is_a_bad_request() {
    let app = TestApp::new().await;
    let mut body = booking_body("OnSite");
    body["service_address"] = Value::Null;

    let (status, body) = app
        .request(Some(&app.customer), Method::POST, "/api/v1/bookings", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn conversion_over_http_and_its_conflict() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;
    let uri = format!("/api/v1/bookings/{}/convert", booking.id);

    let (status, body) = app.request(Some(&app.manager), Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["booking"]["status"], "Converted");
    assert_eq!(body["data"]["work_order"]["status"], "Requested");

    let (status, body) = app.request(Some(&app.manager), Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
    assert_eq!(body["current_status"], "Converted");
}

#[tokio::test]
async fn illegal_transition_reports_current_status() {
    let app = TestApp::new().await;
    let wo = app.requested_work_order().await;

    let (status, body) = app
        .request(
            Some(&app.manager),
            Method::POST,
            &format!("/api/v1/work-orders/{}/complete", wo.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
    assert_eq!(body["current_status"], "Requested");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn expired_quote_is_gone() {
    let app = TestApp::new().await;
    let (wo, quote) = app.awaiting_approval().await;
    app.backdate_quote(quote.id).await;

    let (status, body) = app
        .request(
            Some(&app.customer),
            Method::POST,
            &format!("/api/v1/work-orders/{}/approve-quote", wo.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "quote_expired");
    assert_eq!(body["current_status"], "Expired");
}

#[tokio::test]
async fn technicians_cannot_approve_quotes_over_http() {
    let app = TestApp::new().await;
    let (_, quote) = app.awaiting_approval().await;

    let (status, body) = app
        .request(
            Some(&app.technician),
            Method::POST,
            &format!("/api/v1/quotes/{}/approve", quote.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn work_order_flow_over_http() {
    let app = TestApp::new().await;
    let wo = app.requested_work_order().await;
    let base = format!("/api/v1/work-orders/{}", wo.id);

    let (status, _) = app
        .request(
            Some(&app.manager),
            Method::POST,
            &format!("{}/assign", base),
            Some(json!({ "technician_id": app.technician.actor_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Some(&app.technician),
            Method::POST,
            &format!("{}/diagnose", base),
            Some(json!({ "notes": "Charging port corroded" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Diagnosed");

    let (status, body) = app
        .request(
            Some(&app.technician),
            Method::POST,
            &format!("{}/quotes", base),
            Some(json!({
                "parts_cost": "100",
                "labor_cost": "200",
                "service_fee": "20",
                "estimated_hours": "2",
                "hourly_rate": "100"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "Pending");

    let (status, body) = app
        .request(Some(&app.customer), Method::GET, &format!("{}/activity", base), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().expect("activity list");
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["kind"], "QuoteGenerated");
}

#[tokio::test]
async fn status_endpoint_reports_service() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Some(&app.customer), Method::GET, "/api/v1/status", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "repairdesk-api");
}
