use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::work_order::WorkOrderStatus;

/// Category of a work order history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ActivityKind {
    #[sea_orm(string_value = "Created")]
    Created,
    #[sea_orm(string_value = "StatusChange")]
    StatusChange,
    #[sea_orm(string_value = "AssignmentAccepted")]
    AssignmentAccepted,
    #[sea_orm(string_value = "PartAdded")]
    PartAdded,
    #[sea_orm(string_value = "PartRemoved")]
    PartRemoved,
    #[sea_orm(string_value = "QuoteGenerated")]
    QuoteGenerated,
    #[sea_orm(string_value = "QuoteUpdated")]
    QuoteUpdated,
    #[sea_orm(string_value = "QuoteApproved")]
    QuoteApproved,
    #[sea_orm(string_value = "QuoteRejected")]
    QuoteRejected,
    #[sea_orm(string_value = "QuoteExpired")]
    QuoteExpired,
    #[sea_orm(string_value = "Note")]
    Note,
}

/// Append-only history entry of a work order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_order_activity_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub work_order_id: Uuid,
    /// Position within the work order's history, starting at 1.
    pub sequence: i32,
    pub kind: ActivityKind,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub previous_status: Option<WorkOrderStatus>,
    #[sea_orm(nullable)]
    pub new_status: Option<WorkOrderStatus>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_order::Entity",
        from = "Column::WorkOrderId",
        to = "super::work_order::Column::Id"
    )]
    WorkOrder,
}

impl Related<super::work_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
