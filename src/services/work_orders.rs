use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
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
    auth::{
        authorize_assignment, authorize_customer_scope, authorize_technician_scope,
        authorize_unassigned_pool, authorize_work_order_action, authorize_work_order_read,
        can_view_work_order, Actor,
    },
    config::RepairPolicy,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        booking::{LocationType, ServiceType},
        quote,
        work_order::{self, NewWorkOrder},
        ActivityKind, StatusChange, WorkOrderStatus,
    },
    services::{
        activity_log::{self, ActivityEntry},
        generate_number, on_site_fee_for,
        quotes::{expire_in_txn, load_quote},
        technicians::require_available_technician,
        validate_service_location,
    },
};

/// Fields of a work order opened directly, without a booking.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWorkOrderInput {
    /// Defaults to the calling customer
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub device_model: String,
    pub serial_number: Option<String>,
    #[validate(length(min = 1))]
    pub issue_description: String,
    pub service_type: ServiceType,
    pub service_address: Option<String>,
    pub location_type: Option<LocationType>,
}

/// Final figures supplied when a repair is completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteRepairInput {
    pub parts_cost: Option<Decimal>,
    pub labor_cost: Option<Decimal>,
    pub notes: Option<String>,
}

pub async fn load_work_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<work_order::Model, ServiceError> {
    work_order::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Work order {} not found", id)))
}

/// Writes the whole row if nobody else bumped the version since it was read.
pub async fn save_work_order<C: ConnectionTrait>(
    conn: &C,
    mut model: work_order::Model,
    expected_version: i32,
) -> Result<work_order::Model, ServiceError> {
    model.version = expected_version + 1;
    let id = model.id;

    let result = work_order::Entity::update_many()
        .set(work_order::ActiveModel::from(model.clone()).reset_all())
        .filter(work_order::Column::Id.eq(id))
        .filter(work_order::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(work_order_id = %id, expected_version, "work order changed concurrently");
        counter!("repairdesk.concurrency_conflicts", 1, "entity" => "work_order");
        return Err(ServiceError::ConcurrentModification(id));
    }
    Ok(model)
}

/// Inserts a freshly built work order together with its `Created` entry.
pub(crate) async fn insert_work_order<C: ConnectionTrait>(
    conn: &C,
    model: work_order::Model,
    actor: &Actor,
    description: &str,
) -> Result<work_order::Model, ServiceError> {
    let now = model.created_at;
    let created = work_order::ActiveModel::from(model)
        .reset_all()
        .insert(conn)
        .await?;
    activity_log::record(
        conn,
        created.id,
        ActivityEntry::created(created.status, description),
        actor,
        now,
    )
    .await?;
    Ok(created)
}

/// The work order state machine, persisted.
#[derive(Clone)]
pub struct WorkOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    policy: Arc<RepairPolicy>,
}

impl WorkOrderService {
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

    /// Opens a self-service work order in `Requested`.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn create_direct(
        &self,
        actor: &Actor,
        input: CreateWorkOrderInput,
    ) -> Result<work_order::Model, ServiceError> {
        input.validate()?;
        let customer_id = input.customer_id.unwrap_or(actor.actor_id);
        authorize_customer_scope(actor, customer_id)?;
        validate_service_location(
            input.service_type,
            input.service_address.as_deref(),
            input.location_type,
        )?;

        let now = Utc::now();
        let model = work_order::Model::new(
            NewWorkOrder {
                ticket_number: generate_number(&self.policy.ticket_prefix, now),
                customer_id,
                booking_id: None,
                device_model: input.device_model,
                serial_number: input.serial_number,
                issue_description: input.issue_description,
                service_type: input.service_type,
                service_address: input.service_address,
                location_type: input.location_type,
                service_fee: on_site_fee_for(input.service_type, &self.policy),
            },
            None,
            now,
        );

        let txn = self.db.begin().await?;
        let created = insert_work_order(&txn, model, actor, "Work order opened by customer").await?;
        txn.commit().await?;

        info!(work_order_id = %created.id, ticket = %created.ticket_number, "work order created");
        self.event_sender
            .send_or_log(Event::WorkOrderCreated {
                work_order_id: created.id,
                ticket_number: created.ticket_number.clone(),
                customer_id,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<work_order::Model, ServiceError> {
        let work_order = load_work_order(&*self.db, id).await?;
        authorize_work_order_read(actor, &work_order)?;
        Ok(work_order)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_for_customer(
        &self,
        actor: &Actor,
        customer_id: Uuid,
    ) -> Result<Vec<work_order::Model>, ServiceError> {
        authorize_customer_scope(actor, customer_id)?;
        let orders = work_order::Entity::find()
            .filter(work_order::Column::CustomerId.eq(customer_id))
            .order_by_desc(work_order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_for_technician(
        &self,
        actor: &Actor,
        technician_id: Uuid,
    ) -> Result<Vec<work_order::Model>, ServiceError> {
        authorize_technician_scope(actor, technician_id)?;
        let orders = work_order::Entity::find()
            .filter(work_order::Column::TechnicianId.eq(technician_id))
            .order_by_desc(work_order::Column::UpdatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// Requested orders waiting for a technician, oldest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_unassigned(&self, actor: &Actor) -> Result<Vec<work_order::Model>, ServiceError> {
        authorize_unassigned_pool(actor)?;
        let orders = work_order::Entity::find()
            .filter(work_order::Column::Status.eq(WorkOrderStatus::Requested))
            .order_by_asc(work_order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders
            .into_iter()
            .filter(|wo| can_view_work_order(actor, wo))
            .collect())
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn assign_technician(
        &self,
        actor: &Actor,
        id: Uuid,
        technician_id: Uuid,
    ) -> Result<work_order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, id).await?;
        authorize_assignment(actor, &work_order, technician_id)?;
        let technician = require_available_technician(&txn, technician_id).await?;

        let expected = work_order.version;
        let change = work_order.assign_technician(technician_id, now)?;
        let work_order = save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            id,
            ActivityEntry::transition(
                ActivityKind::StatusChange,
                change,
                Some(format!("Assigned to {}", technician.name)),
            ),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        self.after_transition(actor, &work_order, change, "assign").await;
        Ok(work_order)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn accept_assignment(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<work_order::Model, ServiceError> {
        let work_order = self
            .transition(
                actor,
                id,
                "accept",
                ActivityKind::AssignmentAccepted,
                Some("Assignment accepted".to_string()),
                |wo, now| wo.accept_assignment(now),
            )
            .await?;
        if let Some(technician_id) = work_order.technician_id {
            self.event_sender
                .send_or_log(Event::AssignmentAccepted {
                    work_order_id: id,
                    technician_id,
                })
                .await;
        }
        Ok(work_order)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn decline_assignment(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<work_order::Model, ServiceError> {
        self.transition(
            actor,
            id,
            "decline",
            ActivityKind::StatusChange,
            reason.clone(),
            move |wo, now| wo.decline_assignment(reason, now),
        )
        .await
    }

    #[instrument(skip(self, actor, notes), fields(actor_id = %actor.actor_id))]
    pub async fn mark_as_diagnosed(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: String,
    ) -> Result<work_order::Model, ServiceError> {
        self.transition(
            actor,
            id,
            "diagnose",
            ActivityKind::StatusChange,
            Some("Diagnosis recorded".to_string()),
            move |wo, now| wo.mark_as_diagnosed(notes, now),
        )
        .await
    }

    /// Sends the current quote to the customer. An expired quote is written
    /// back as such and the request fails.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn mark_awaiting_approval(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<work_order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, id).await?;
        authorize_work_order_action(actor, &work_order, "request approval for")?;

        if let Some(quote_id) = work_order.current_quote_id {
            let current = load_quote(&txn, quote_id).await?;
            if current.is_expired_at(now) {
                let expired = expire_in_txn(&txn, current, now).await?;
                txn.commit().await?;
                self.event_sender
                    .send_or_log(Event::QuoteExpired {
                        quote_id: expired.id,
                        work_order_id: id,
                    })
                    .await;
                return Err(ServiceError::QuoteExpired { quote_id });
            }
            if current.status != quote::QuoteStatus::Pending {
                return Err(ServiceError::invalid_transition(
                    "quote",
                    quote_id,
                    current.status,
                    "send for approval",
                ));
            }
        }

        let expected = work_order.version;
        let change = work_order
            .mark_awaiting_approval(now)
            .map_err(|e| rejected(id, "await approval", e))?;
        let work_order = save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            id,
            ActivityEntry::transition(ActivityKind::StatusChange, change, None),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        self.after_transition(actor, &work_order, change, "await_approval").await;
        Ok(work_order)
    }

    /// Starts or resumes work.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn start_repair(&self, actor: &Actor, id: Uuid) -> Result<work_order::Model, ServiceError> {
        self.transition(
            actor,
            id,
            "start",
            ActivityKind::StatusChange,
            None,
            |wo, now| wo.start_repair(now),
        )
        .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn put_on_hold(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<work_order::Model, ServiceError> {
        self.transition(
            actor,
            id,
            "hold",
            ActivityKind::StatusChange,
            notes.clone(),
            move |wo, now| wo.put_on_hold(notes, now),
        )
        .await
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn complete_repair(
        &self,
        actor: &Actor,
        id: Uuid,
        input: CompleteRepairInput,
    ) -> Result<work_order::Model, ServiceError> {
        let note = input.notes.clone();
        self.transition(
            actor,
            id,
            "complete",
            ActivityKind::StatusChange,
            note,
            move |wo, now| wo.complete_repair(input.parts_cost, input.labor_cost, input.notes, now),
        )
        .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: String,
    ) -> Result<work_order::Model, ServiceError> {
        let note = Some(reason.clone());
        self.transition(
            actor,
            id,
            "cancel",
            ActivityKind::StatusChange,
            note,
            move |wo, now| wo.cancel(reason, now),
        )
        .await
    }

    /// Free-text note on an open work order. Staff only.
    #[instrument(skip(self, actor, text), fields(actor_id = %actor.actor_id))]
    pub async fn add_note(
        &self,
        actor: &Actor,
        id: Uuid,
        text: String,
    ) -> Result<crate::models::work_order_activity_log::Model, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Note text is required".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let work_order = load_work_order(&txn, id).await?;
        authorize_work_order_action(actor, &work_order, "add notes to")?;
        if !work_order.is_open() {
            return Err(ServiceError::invalid_transition(
                "work order",
                id,
                work_order.status,
                "add a note to",
            ));
        }
        let entry =
            activity_log::record(&txn, id, ActivityEntry::event(ActivityKind::Note, text), actor, now)
                .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WorkOrderNoteAdded {
                work_order_id: id,
                actor_id: actor.actor_id,
            })
            .await;
        Ok(entry)
    }

    /// Load, gate, apply a pure transition, then persist the order and its
    /// activity entry in one transaction.
    async fn transition<F>(
        &self,
        actor: &Actor,
        id: Uuid,
        action: &'static str,
        kind: ActivityKind,
        note: Option<String>,
        apply: F,
    ) -> Result<work_order::Model, ServiceError>
    where
        F: FnOnce(&mut work_order::Model, DateTime<Utc>) -> Result<StatusChange, ServiceError>,
    {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, id).await?;
        authorize_work_order_action(actor, &work_order, action)?;

        let expected = work_order.version;
        let change = apply(&mut work_order, now).map_err(|e| rejected(id, action, e))?;
        let work_order = save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            id,
            ActivityEntry::transition(kind, change, note),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        self.after_transition(actor, &work_order, change, action).await;
        Ok(work_order)
    }

    async fn after_transition(
        &self,
        actor: &Actor,
        work_order: &work_order::Model,
        change: StatusChange,
        action: &'static str,
    ) {
        counter!("repairdesk.work_orders.transitions", 1, "action" => action);
        info!(
            work_order_id = %work_order.id,
            from = %change.from,
            to = %change.to,
            action,
            "work order transitioned"
        );
        self.event_sender
            .send_or_log(Event::WorkOrderStatusChanged {
                work_order_id: work_order.id,
                old_status: change.from,
                new_status: change.to,
                actor_id: actor.actor_id,
            })
            .await;
    }
}

fn rejected(id: Uuid, action: &str, err: ServiceError) -> ServiceError {
    if let ServiceError::InvalidTransition { current_status, .. } = &err {
        warn!(work_order_id = %id, action, current_status = %current_status, "transition rejected");
    }
    err
}
