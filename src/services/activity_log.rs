use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{authorize_work_order_read, Actor},
    errors::ServiceError,
    models::{
        work_order_activity_log::{self, ActivityKind},
        StatusChange, WorkOrderStatus,
    },
    services::work_orders::load_work_order,
};

/// What happened, before it is attributed to an actor and a position in the
/// history.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub description: Option<String>,
    pub previous_status: Option<WorkOrderStatus>,
    pub new_status: Option<WorkOrderStatus>,
}

impl ActivityEntry {
    pub fn event(kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
            previous_status: None,
            new_status: None,
        }
    }

    pub fn transition(kind: ActivityKind, change: StatusChange, description: Option<String>) -> Self {
        Self {
            kind,
            description,
            previous_status: Some(change.from),
            new_status: Some(change.to),
        }
    }

    pub fn created(status: WorkOrderStatus, description: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Created,
            description: Some(description.into()),
            previous_status: None,
            new_status: Some(status),
        }
    }
}

/// Appends an entry inside the caller's transaction so that it commits or
/// rolls back together with the change it describes.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    work_order_id: Uuid,
    entry: ActivityEntry,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<work_order_activity_log::Model, ServiceError> {
    let existing = work_order_activity_log::Entity::find()
        .filter(work_order_activity_log::Column::WorkOrderId.eq(work_order_id))
        .count(conn)
        .await?;

    let model = work_order_activity_log::Model {
        id: Uuid::new_v4(),
        work_order_id,
        sequence: existing as i32 + 1,
        kind: entry.kind,
        description: entry.description,
        previous_status: entry.previous_status,
        new_status: entry.new_status,
        actor_id: actor.actor_id,
        actor_name: actor.actor_name.clone(),
        created_at: now,
    };

    work_order_activity_log::ActiveModel::from(model)
        .reset_all()
        .insert(conn)
        .await
        .map_err(|e| match e.sql_err() {
            // Another writer took the same position in this history.
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                warn!(%work_order_id, "activity log sequence collision");
                counter!("repairdesk.concurrency_conflicts", 1, "entity" => "activity_log");
                ServiceError::ConcurrentModification(work_order_id)
            }
            _ => ServiceError::DatabaseError(e),
        })
}

/// Read side of the work order history.
#[derive(Clone)]
pub struct ActivityLogService {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// History of a work order, newest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_for_work_order(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<work_order_activity_log::Model>, ServiceError> {
        let db = &*self.db;
        let work_order = load_work_order(db, work_order_id).await?;
        authorize_work_order_read(actor, &work_order)?;

        let entries = work_order_activity_log::Entity::find()
            .filter(work_order_activity_log::Column::WorkOrderId.eq(work_order_id))
            .order_by_desc(work_order_activity_log::Column::Sequence)
            .all(db)
            .await?;
        Ok(entries)
    }
}
