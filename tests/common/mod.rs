#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use repairdesk_api::{
    app_router,
    auth::{Actor, Role, ACTOR_ID_HEADER, ACTOR_NAME_HEADER, ACTOR_ROLES_HEADER},
    config::{AppConfig, RepairPolicy},
    db,
    events::{self, EventHandler, EventSender, NotificationLogger},
    models::{
        booking::{self, LocationType, ServiceType},
        quote, work_order, work_order_activity_log,
    },
    services::{
        bookings::CreateBookingInput,
        quotes::CreateQuoteInput,
        technicians::RegisterTechnicianInput,
        work_orders::CreateWorkOrderInput,
        RepairServices,
    },
    AppState,
};

/// Application state over a fresh in-memory SQLite database, with a cast of
/// actors and two registered technicians.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub state: AppState,
    pub admin: Actor,
    pub manager: Actor,
    pub customer: Actor,
    pub other_customer: Actor,
    pub technician: Actor,
    pub other_technician: Actor,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_policy(RepairPolicy::default()).await
    }

    pub async fn with_policy(policy: RepairPolicy) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.repair = policy;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let (tx, rx) = mpsc::channel(256);
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(NotificationLogger)];
        let event_task = tokio::spawn(events::process_events(rx, handlers));
        let state = AppState::new(db.clone(), cfg, Arc::new(EventSender::new(tx)));

        let app = Self {
            db,
            state,
            admin: Actor::new(Uuid::new_v4(), "Ada Admin", [Role::Admin]),
            manager: Actor::new(Uuid::new_v4(), "Morgan Manager", [Role::Manager]),
            customer: Actor::new(Uuid::new_v4(), "Casey Customer", [Role::Customer]),
            other_customer: Actor::new(Uuid::new_v4(), "Riley Customer", [Role::Customer]),
            technician: Actor::new(Uuid::new_v4(), "Toni Tech", [Role::Technician]),
            other_technician: Actor::new(Uuid::new_v4(), "Sam Tech", [Role::Technician]),
            _event_task: event_task,
        };

        for tech in [&app.technician, &app.other_technician] {
            app.services()
                .technicians
                .register(
                    &app.admin,
                    RegisterTechnicianInput {
                        id: tech.actor_id,
                        name: tech.actor_name.clone(),
                        specialty: Some("Phones".to_string()),
                        hourly_rate: Decimal::from(60),
                    },
                )
                .await
                .expect("failed to register technician");
        }

        app
    }

    pub fn services(&self) -> &RepairServices {
        &self.state.services
    }

    pub fn router(&self) -> Router {
        app_router(self.state.clone())
    }

    pub fn booking_input(&self, service_type: ServiceType) -> CreateBookingInput {
        let on_site = service_type == ServiceType::OnSite;
        CreateBookingInput {
            customer_id: None,
            contact_name: "Casey Customer".to_string(),
            contact_phone: "+15550100".to_string(),
            contact_email: Some("casey@example.com".to_string()),
            service_type,
            device_model: "iPhone 13".to_string(),
            serial_number: Some("F2LXK0ABCD".to_string()),
            issue_description: "Screen cracked after a drop".to_string(),
            image_urls: vec!["https://cdn.example.com/crack.jpg".to_string()],
            video_urls: vec![],
            preferred_date: (Utc::now() + Duration::days(2)).date_naive(),
            preferred_time_slot: "09:00-12:00".to_string(),
            service_address: on_site.then(|| "12 Harbour Road".to_string()),
            location_type: on_site.then_some(LocationType::Home),
            on_site_notes: None,
            terms_accepted: true,
            organization_id: None,
        }
    }

    pub async fn pending_booking(&self) -> booking::Model {
        self.services()
            .bookings
            .create(&self.customer, self.booking_input(ServiceType::InShop))
            .await
            .expect("booking should be created")
    }

    /// A self-service order from `customer`, in `Requested`.
    pub async fn requested_work_order(&self) -> work_order::Model {
        self.services()
            .work_orders
            .create_direct(
                &self.customer,
                CreateWorkOrderInput {
                    customer_id: None,
                    device_model: "Pixel 8".to_string(),
                    serial_number: None,
                    issue_description: "Battery swells".to_string(),
                    service_type: ServiceType::InShop,
                    service_address: None,
                    location_type: None,
                },
            )
            .await
            .expect("work order should be created")
    }

    /// Assigned to `technician`, accepted and diagnosed.
    pub async fn diagnosed_work_order(&self) -> work_order::Model {
        let wo = self.requested_work_order().await;
        let services = self.services();
        services
            .work_orders
            .assign_technician(&self.manager, wo.id, self.technician.actor_id)
            .await
            .expect("assign");
        services
            .work_orders
            .accept_assignment(&self.technician, wo.id)
            .await
            .expect("accept");
        services
            .work_orders
            .mark_as_diagnosed(&self.technician, wo.id, "Swollen battery cell".to_string())
            .await
            .expect("diagnose")
    }

    pub fn quote_input(parts: i64, labor: i64, fee: i64) -> CreateQuoteInput {
        CreateQuoteInput {
            parts_cost: Decimal::from(parts),
            labor_cost: Decimal::from(labor),
            service_fee: Decimal::from(fee),
            estimated_hours: Decimal::new(25, 1),
            hourly_rate: Decimal::from(80),
            description: Some("Replace battery".to_string()),
            notes: None,
        }
    }

    /// Diagnosed, quoted 100/200/20 and sent to the customer.
    pub async fn awaiting_approval(&self) -> (work_order::Model, quote::Model) {
        let wo = self.diagnosed_work_order().await;
        let quote = self
            .services()
            .quotes
            .create_quote(&self.technician, wo.id, Self::quote_input(100, 200, 20))
            .await
            .expect("quote");
        let wo = self
            .services()
            .work_orders
            .mark_awaiting_approval(&self.technician, wo.id)
            .await
            .expect("await approval");
        (wo, quote)
    }

    /// Quote approved and repair started.
    pub async fn in_progress_work_order(&self) -> work_order::Model {
        let (wo, quote) = self.awaiting_approval().await;
        self.services()
            .quotes
            .approve(&self.customer, quote.id)
            .await
            .expect("approve");
        self.services()
            .work_orders
            .start_repair(&self.technician, wo.id)
            .await
            .expect("start")
    }

    /// Moves a quote's deadline into the past without touching its status.
    pub async fn backdate_quote(&self, quote_id: Uuid) {
        let existing = quote::Entity::find_by_id(quote_id)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("quote exists");
        let mut active: quote::ActiveModel = existing.into();
        active.valid_until = Set(Utc::now() - Duration::days(1));
        active.update(&*self.db).await.unwrap();
    }

    pub async fn stored_work_order(&self, id: Uuid) -> work_order::Model {
        work_order::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("work order exists")
    }

    pub async fn stored_quote(&self, id: Uuid) -> quote::Model {
        quote::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("quote exists")
    }

    /// History as staff see it, newest first.
    pub async fn activity(&self, work_order_id: Uuid) -> Vec<work_order_activity_log::Model> {
        self.services()
            .activity_log
            .list_for_work_order(&self.admin, work_order_id)
            .await
            .expect("activity")
    }

    /// Sends a request through the full router as `actor`.
    pub async fn request(
        &self,
        actor: Option<&Actor>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            let roles = actor
                .roles
                .iter()
                .map(|role| role.to_string())
                .collect::<Vec<_>>()
                .join(",");
            builder = builder
                .header(ACTOR_ID_HEADER, actor.actor_id.to_string())
                .header(ACTOR_NAME_HEADER, actor.actor_name.as_str())
                .header(ACTOR_ROLES_HEADER, roles);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
