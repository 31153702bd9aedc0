//! Booking intake, review and conversion into work orders.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use repairdesk_api::{
    config::RepairPolicy,
    errors::ServiceError,
    models::{
        booking::{BookingStatus, ServiceType},
        work_order, WorkOrderStatus,
    },
};

async fn orders_for_booking(app: &TestApp, booking_id: uuid::Uuid) -> u64 {
    work_order::Entity::find()
        .filter(work_order::Column::BookingId.eq(booking_id))
        .count(&*app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn on_site_booking_without_address_is_rejected() {
    let app = TestApp::new().await;
    let mut input = app.booking_input(ServiceType::OnSite);
    input.service_address = Some("   ".to_string());

    let result = app.services().bookings.create(&app.customer, input).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn booking_requires_accepted_terms() {
    let app = TestApp::new().await;
    let mut input = app.booking_input(ServiceType::InShop);
    input.terms_accepted = false;

    let result = app.services().bookings.create(&app.customer, input).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn on_site_booking_carries_the_visit_fee() {
    let app = TestApp::new().await;

    let on_site = app
        .services()
        .bookings
        .create(&app.customer, app.booking_input(ServiceType::OnSite))
        .await
        .unwrap();
    assert_eq!(on_site.status, BookingStatus::Pending);
    assert_eq!(on_site.on_site_fee, Decimal::from(50));
    assert_eq!(on_site.customer_id, app.customer.actor_id);
    assert!(on_site.terms_accepted_at.is_some());

    let in_shop = app.pending_booking().await;
    assert_eq!(in_shop.on_site_fee, Decimal::ZERO);
}

#[tokio::test]
async fn customers_cannot_book_for_someone_else() {
    let app = TestApp::new().await;
    let mut input = app.booking_input(ServiceType::InShop);
    input.customer_id = Some(app.other_customer.actor_id);

    let result = app.services().bookings.create(&app.customer, input).await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn staff_approve_and_reject_pending_bookings() {
    let app = TestApp::new().await;
    let bookings = &app.services().bookings;

    let first = app.pending_booking().await;
    let approved = bookings.approve(&app.manager, first.id).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);
    assert!(approved.approved_at.is_some());
    assert_eq!(approved.version, first.version + 1);

    let second = app.pending_booking().await;
    let rejected = bookings
        .reject(&app.manager, second.id, "Device out of scope".to_string())
        .await
        .unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Device out of scope"));

    // Rejected is terminal
    assert_matches!(
        bookings.approve(&app.manager, second.id).await,
        Err(ServiceError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn customers_cannot_review_bookings() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;

    assert_matches!(
        app.services().bookings.approve(&app.customer, booking.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        app.services().bookings.convert(&app.technician, booking.id, None).await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn pending_booking_converts_into_a_requested_work_order() {
    let app = TestApp::new().await;
    let booking = app
        .services()
        .bookings
        .create(&app.customer, app.booking_input(ServiceType::OnSite))
        .await
        .unwrap();

    let result = app
        .services()
        .bookings
        .convert(&app.manager, booking.id, None)
        .await
        .unwrap();

    assert_eq!(result.booking.status, BookingStatus::Converted);
    assert_eq!(result.booking.work_order_id, Some(result.work_order.id));
    assert!(result.booking.converted_at.is_some());

    let wo = &result.work_order;
    assert_eq!(wo.status, WorkOrderStatus::Requested);
    assert_eq!(wo.booking_id, Some(booking.id));
    assert_eq!(wo.customer_id, app.customer.actor_id);
    assert_eq!(wo.device_model, booking.device_model);
    assert_eq!(wo.service_fee, Decimal::from(50));
    assert_eq!(wo.total_cost, Decimal::from(50));
    assert!(wo.ticket_number.starts_with("WO-"));

    let history = app.activity(wo.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sequence, 1);
    assert_eq!(history[0].actor_id, app.manager.actor_id);
}

#[tokio::test]
async fn converting_twice_creates_a_single_work_order() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;
    let bookings = &app.services().bookings;

    bookings.convert(&app.manager, booking.id, None).await.unwrap();
    let again = bookings.convert(&app.admin, booking.id, None).await;

    assert_matches!(
        again,
        Err(ServiceError::InvalidTransition { ref current_status, .. }) if current_status == "Converted"
    );
    assert_eq!(orders_for_booking(&app, booking.id).await, 1);
}

#[tokio::test]
async fn conversion_can_preassign_a_technician() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;

    let result = app
        .services()
        .bookings
        .convert(&app.manager, booking.id, Some(app.technician.actor_id))
        .await
        .unwrap();

    assert_eq!(result.work_order.status, WorkOrderStatus::Assigned);
    assert_eq!(result.work_order.technician_id, Some(app.technician.actor_id));
    assert!(result.work_order.assigned_at.is_some());
}

#[tokio::test]
async fn approval_policy_blocks_pending_conversion() {
    let app = TestApp::with_policy(RepairPolicy {
        require_booking_approval: true,
        ..RepairPolicy::default()
    })
    .await;
    let booking = app.pending_booking().await;
    let bookings = &app.services().bookings;

    assert_matches!(
        bookings.convert(&app.manager, booking.id, None).await,
        Err(ServiceError::InvalidTransition { .. })
    );
    assert_eq!(orders_for_booking(&app, booking.id).await, 0);

    bookings.approve(&app.manager, booking.id).await.unwrap();
    let result = bookings.convert(&app.manager, booking.id, None).await.unwrap();
    assert_eq!(result.booking.status, BookingStatus::Converted);
}

#[tokio::test]
async fn unavailable_technician_leaves_booking_untouched() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;
    app.services()
        .technicians
        .set_availability(&app.technician, app.technician.actor_id, false)
        .await
        .unwrap();

    let result = app
        .services()
        .bookings
        .convert(&app.manager, booking.id, Some(app.technician.actor_id))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let stored = app.services().bookings.get(&app.manager, booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.version, booking.version);
    assert_eq!(orders_for_booking(&app, booking.id).await, 0);
}

#[tokio::test]
async fn bookings_are_hidden_from_other_customers() {
    let app = TestApp::new().await;
    let booking = app.pending_booking().await;
    let bookings = &app.services().bookings;

    assert!(bookings.get(&app.customer, booking.id).await.is_ok());
    assert_matches!(
        bookings.get(&app.other_customer, booking.id).await,
        Err(ServiceError::NotFound(_))
    );

    let own = bookings
        .list_for_customer(&app.customer, app.customer.actor_id)
        .await
        .unwrap();
    assert_eq!(own.len(), 1);
    assert_matches!(
        bookings
            .list_for_customer(&app.other_customer, app.customer.actor_id)
            .await,
        Err(ServiceError::Forbidden(_))
    );
}
