use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// A priced part consumed by a work order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_order_parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub inventory_item_id: Uuid,
    pub name: String,
    #[sea_orm(nullable)]
    pub part_number: Option<String>,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub line_total: Decimal,
    pub added_by: Uuid,
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

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        work_order_id: Uuid,
        inventory_item_id: Uuid,
        name: String,
        part_number: Option<String>,
        quantity: i32,
        unit_price: Decimal,
        added_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Part name is required".to_string(),
            ));
        }
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Part quantity must be greater than zero, got {}",
                quantity
            )));
        }
        if unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Part unit price cannot be negative".to_string(),
            ));
        }

        let line_total = unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| {
                ServiceError::ValidationError("Part line total is out of range".to_string())
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            work_order_id,
            inventory_item_id,
            name,
            part_number,
            quantity,
            unit_price,
            line_total,
            added_by,
            created_at: now,
        })
    }
}

/// Sum of the line totals; an empty ledger costs nothing.
pub fn ledger_total<'a>(
    parts: impl IntoIterator<Item = &'a Model>,
) -> Result<Decimal, ServiceError> {
    super::checked_total(parts.into_iter().map(|part| part.line_total))
}
