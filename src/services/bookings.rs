use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize_booking_read, authorize_customer_scope, require_staff, Actor},
    config::RepairPolicy,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        booking::{self, BookingStatus, LocationType, ServiceType},
        work_order::{self, NewWorkOrder},
    },
    services::{
        generate_number, on_site_fee_for, technicians::require_available_technician,
        validate_service_location, work_orders::insert_work_order,
    },
};

/// Customer intake form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingInput {
    /// Defaults to the calling customer
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub contact_name: String,
    #[validate(length(min = 1, max = 40))]
    pub contact_phone: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub service_type: ServiceType,
    #[validate(length(min = 1, max = 200))]
    pub device_model: String,
    pub serial_number: Option<String>,
    #[validate(length(min = 1))]
    pub issue_description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    pub preferred_date: NaiveDate,
    #[validate(length(min = 1, max = 40))]
    pub preferred_time_slot: String,
    pub service_address: Option<String>,
    pub location_type: Option<LocationType>,
    pub on_site_notes: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
    pub organization_id: Option<Uuid>,
}

/// Outcome of a conversion: the converted booking and the order it became.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub booking: booking::Model,
    pub work_order: work_order::Model,
}

pub async fn load_booking<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<booking::Model, ServiceError> {
    booking::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", id)))
}

pub async fn save_booking<C: ConnectionTrait>(
    conn: &C,
    mut model: booking::Model,
    expected_version: i32,
) -> Result<booking::Model, ServiceError> {
    model.version = expected_version + 1;
    let id = model.id;

    let result = booking::Entity::update_many()
        .set(booking::ActiveModel::from(model.clone()).reset_all())
        .filter(booking::Column::Id.eq(id))
        .filter(booking::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(booking_id = %id, expected_version, "booking changed concurrently");
        counter!("repairdesk.concurrency_conflicts", 1, "entity" => "booking");
        return Err(ServiceError::ConcurrentModification(id));
    }
    Ok(model)
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    policy: Arc<RepairPolicy>,
}

impl BookingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        policy: Arc<RepairPolicy>,
    ) -> Self {
        Self {
            db,
            event_sender,
            policy,
        }
    }

    /// Records a new intake request in `Pending`.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateBookingInput,
    ) -> Result<booking::Model, ServiceError> {
        input.validate()?;
        let customer_id = input.customer_id.unwrap_or(actor.actor_id);
        authorize_customer_scope(actor, customer_id)?;
        validate_service_location(
            input.service_type,
            input.service_address.as_deref(),
            input.location_type,
        )?;
        if !input.terms_accepted {
            return Err(ServiceError::ValidationError(
                "The service terms must be accepted".to_string(),
            ));
        }

        let now = Utc::now();
        let model = booking::Model {
            id: Uuid::new_v4(),
            customer_id,
            contact_name: input.contact_name,
            contact_phone: input.contact_phone,
            contact_email: input.contact_email,
            service_type: input.service_type,
            device_model: input.device_model,
            serial_number: input.serial_number,
            issue_description: input.issue_description,
            image_urls: serde_json::json!(input.image_urls),
            video_urls: serde_json::json!(input.video_urls),
            preferred_date: input.preferred_date,
            preferred_time_slot: input.preferred_time_slot,
            service_address: input.service_address,
            location_type: input.location_type,
            on_site_notes: input.on_site_notes,
            on_site_fee: on_site_fee_for(input.service_type, &self.policy),
            terms_accepted: true,
            terms_accepted_at: Some(now),
            organization_id: input.organization_id,
            status: BookingStatus::Pending,
            rejection_reason: None,
            work_order_id: None,
            approved_at: None,
            rejected_at: None,
            converted_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let created = booking::ActiveModel::from(model)
            .reset_all()
            .insert(&*self.db)
            .await?;

        info!(booking_id = %created.id, service_type = ?created.service_type, "booking created");
        self.event_sender
            .send_or_log(Event::BookingCreated {
                booking_id: created.id,
                customer_id,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<booking::Model, ServiceError> {
        require_staff(actor, "approve bookings")?;
        self.decide(id, |booking, now| booking.approve(now)).await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: String,
    ) -> Result<booking::Model, ServiceError> {
        require_staff(actor, "reject bookings")?;
        self.decide(id, move |booking, now| booking.reject(reason, now))
            .await
    }

    /// Turns a booking into a work order, optionally pre-assigned. The
    /// booking flip and the new order commit together.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn convert(
        &self,
        actor: &Actor,
        id: Uuid,
        technician_id: Option<Uuid>,
    ) -> Result<ConversionResult, ServiceError> {
        require_staff(actor, "convert bookings")?;
        let require_approval = self.policy.require_booking_approval;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let mut booking = load_booking(&txn, id).await?;
        if let Err(e) = booking.ensure_convertible(require_approval) {
            warn!(booking_id = %id, status = %booking.status, "conversion rejected");
            return Err(e);
        }
        if let Some(technician_id) = technician_id {
            require_available_technician(&txn, technician_id).await?;
        }

        let work_order = work_order::Model::new(
            NewWorkOrder {
                ticket_number: generate_number(&self.policy.ticket_prefix, now),
                customer_id: booking.customer_id,
                booking_id: Some(booking.id),
                device_model: booking.device_model.clone(),
                serial_number: booking.serial_number.clone(),
                issue_description: booking.issue_description.clone(),
                service_type: booking.service_type,
                service_address: booking.service_address.clone(),
                location_type: booking.location_type,
                service_fee: booking.on_site_fee,
            },
            technician_id,
            now,
        );

        let old_status = booking.status;
        let expected = booking.version;
        booking.mark_converted(work_order.id, require_approval, now)?;
        let work_order = insert_work_order(
            &txn,
            work_order,
            actor,
            &format!("Converted from booking {}", booking.id),
        )
        .await?;
        let booking = save_booking(&txn, booking, expected).await?;
        txn.commit().await?;

        counter!("repairdesk.bookings.converted", 1);
        info!(booking_id = %id, work_order_id = %work_order.id, ticket = %work_order.ticket_number, "booking converted");
        self.event_sender
            .send_or_log(Event::BookingStatusChanged {
                booking_id: id,
                old_status,
                new_status: booking.status,
            })
            .await;
        self.event_sender
            .send_or_log(Event::BookingConverted {
                booking_id: id,
                work_order_id: work_order.id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::WorkOrderCreated {
                work_order_id: work_order.id,
                ticket_number: work_order.ticket_number.clone(),
                customer_id: work_order.customer_id,
            })
            .await;

        Ok(ConversionResult {
            booking,
            work_order,
        })
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = load_booking(&*self.db, id).await?;
        authorize_booking_read(actor, &booking)?;
        Ok(booking)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_for_customer(
        &self,
        actor: &Actor,
        customer_id: Uuid,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        authorize_customer_scope(actor, customer_id)?;
        let bookings = booking::Entity::find()
            .filter(booking::Column::CustomerId.eq(customer_id))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(bookings)
    }

    async fn decide<F>(&self, id: Uuid, apply: F) -> Result<booking::Model, ServiceError>
    where
        F: FnOnce(&mut booking::Model, chrono::DateTime<Utc>) -> Result<(), ServiceError>,
    {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut booking = load_booking(&txn, id).await?;
        let old_status = booking.status;
        let expected = booking.version;
        apply(&mut booking, now)?;
        let booking = save_booking(&txn, booking, expected).await?;
        txn.commit().await?;

        info!(booking_id = %id, from = %old_status, to = %booking.status, "booking status changed");
        self.event_sender
            .send_or_log(Event::BookingStatusChanged {
                booking_id: id,
                old_status,
                new_status: booking.status,
            })
            .await;
        Ok(booking)
    }
}
