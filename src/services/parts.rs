use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{authorize_work_order_action, authorize_work_order_read, Actor},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        work_order,
        work_order_part::{self, ledger_total},
        ActivityKind,
    },
    services::{
        activity_log::{self, ActivityEntry},
        work_orders::{load_work_order, save_work_order},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPartInput {
    pub inventory_item_id: Uuid,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

async fn parts_of<C: ConnectionTrait>(
    conn: &C,
    work_order_id: Uuid,
) -> Result<Vec<work_order_part::Model>, ServiceError> {
    let parts = work_order_part::Entity::find()
        .filter(work_order_part::Column::WorkOrderId.eq(work_order_id))
        .order_by_asc(work_order_part::Column::CreatedAt)
        .all(conn)
        .await?;
    Ok(parts)
}

/// Parts consumed by a work order. Every change rewrites the order's
/// partsCost from the ledger in the same transaction.
#[derive(Clone)]
pub struct PartLedgerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PartLedgerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the new part and the updated work order.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn add_part(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: AddPartInput,
    ) -> Result<(work_order_part::Model, work_order::Model), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, work_order_id).await?;
        authorize_work_order_action(actor, &work_order, "add parts to")?;

        let part = work_order_part::Model::new(
            work_order_id,
            input.inventory_item_id,
            input.name,
            input.part_number,
            input.quantity,
            input.unit_price,
            actor.actor_id,
            now,
        )?;
        let existing = parts_of(&txn, work_order_id).await?;
        let total = ledger_total(existing.iter().chain([&part]))?;

        let expected = work_order.version;
        work_order.apply_parts_total(total, now)?;
        let part = work_order_part::ActiveModel::from(part)
            .reset_all()
            .insert(&txn)
            .await?;
        let work_order = save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            work_order_id,
            ActivityEntry::event(
                ActivityKind::PartAdded,
                format!(
                    "Added {} x {} at {} ({})",
                    part.quantity, part.name, part.unit_price, part.line_total
                ),
            ),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        info!(%work_order_id, part_id = %part.id, parts_cost = %work_order.parts_cost, "part added");
        self.event_sender
            .send_or_log(Event::WorkOrderPartAdded {
                work_order_id,
                part_id: part.id,
            })
            .await;
        Ok((part, work_order))
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn remove_part(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        part_id: Uuid,
    ) -> Result<work_order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, work_order_id).await?;
        authorize_work_order_action(actor, &work_order, "remove parts from")?;

        let existing = parts_of(&txn, work_order_id).await?;
        let (removed, remaining): (Vec<_>, Vec<_>) =
            existing.into_iter().partition(|part| part.id == part_id);
        let part = removed.into_iter().next().ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Part {} not found on work order {}",
                part_id, work_order_id
            ))
        })?;

        let expected = work_order.version;
        work_order.apply_parts_total(ledger_total(remaining.iter())?, now)?;
        let description = format!("Removed {} x {}", part.quantity, part.name);
        part.delete(&txn).await?;
        let work_order = save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            work_order_id,
            ActivityEntry::event(ActivityKind::PartRemoved, description),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        info!(%work_order_id, %part_id, parts_cost = %work_order.parts_cost, "part removed");
        self.event_sender
            .send_or_log(Event::WorkOrderPartRemoved {
                work_order_id,
                part_id,
            })
            .await;
        Ok(work_order)
    }

    pub async fn list_parts(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<work_order_part::Model>, ServiceError> {
        let db = &*self.db;
        let work_order = load_work_order(db, work_order_id).await?;
        authorize_work_order_read(actor, &work_order)?;
        parts_of(db, work_order_id).await
    }
}
