use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Quote status. Everything except Pending is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Expired")]
    Expired,
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteStatus::Pending => write!(f, "Pending"),
            QuoteStatus::Approved => write!(f, "Approved"),
            QuoteStatus::Rejected => write!(f, "Rejected"),
            QuoteStatus::Expired => write!(f, "Expired"),
        }
    }
}

/// A costed, time-boxed repair proposal owned by one work order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub quote_number: String,
    pub work_order_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub parts_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub labor_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub service_fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub estimated_hours: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub hourly_rate: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub status: QuoteStatus,
    pub valid_until: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub rejection_reason: Option<String>,
    #[sea_orm(nullable)]
    pub superseded_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
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

/// Cost lines of a quote, validated before they reach the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuoteCosts {
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub service_fee: Decimal,
}

impl QuoteCosts {
    pub fn validate(&self) -> Result<(), ServiceError> {
        for (name, amount) in [
            ("parts cost", self.parts_cost),
            ("labor cost", self.labor_cost),
            ("service fee", self.service_fee),
        ] {
            if amount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Quote {} cannot be negative",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn total(&self) -> Result<Decimal, ServiceError> {
        super::checked_total([self.parts_cost, self.labor_cost, self.service_fee])
    }
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        quote_number: String,
        work_order_id: Uuid,
        costs: QuoteCosts,
        estimated_hours: Decimal,
        hourly_rate: Decimal,
        description: Option<String>,
        notes: Option<String>,
        created_by: Uuid,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        costs.validate()?;
        let total_cost = costs.total()?;
        if estimated_hours < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Estimated hours cannot be negative".to_string(),
            ));
        }
        if hourly_rate < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Hourly rate cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            quote_number,
            work_order_id,
            parts_cost: costs.parts_cost,
            labor_cost: costs.labor_cost,
            service_fee: costs.service_fee,
            total_cost,
            estimated_hours,
            hourly_rate,
            description,
            notes,
            status: QuoteStatus::Pending,
            valid_until: now + validity,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            superseded_by: None,
            created_by,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    pub fn costs(&self) -> QuoteCosts {
        QuoteCosts {
            parts_cost: self.parts_cost,
            labor_cost: self.labor_cost,
            service_fee: self.service_fee,
        }
    }

    /// A pending quote past its deadline counts as expired even before the
    /// status is written back.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == QuoteStatus::Pending && now > self.valid_until
    }

    /// Applies lazy expiry. Returns true when the status changed and must be
    /// persisted.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired_at(now) {
            self.status = QuoteStatus::Expired;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    fn ensure_pending(&self, action: &'static str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.is_expired_at(now) || self.status == QuoteStatus::Expired {
            return Err(ServiceError::QuoteExpired { quote_id: self.id });
        }
        if self.status != QuoteStatus::Pending {
            return Err(ServiceError::invalid_transition(
                "quote",
                self.id,
                self.status,
                action,
            ));
        }
        Ok(())
    }

    pub fn update_costs(
        &mut self,
        parts_cost: Option<Decimal>,
        labor_cost: Option<Decimal>,
        service_fee: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_pending("update the costs of", now)?;
        let costs = QuoteCosts {
            parts_cost: parts_cost.unwrap_or(self.parts_cost),
            labor_cost: labor_cost.unwrap_or(self.labor_cost),
            service_fee: service_fee.unwrap_or(self.service_fee),
        };
        costs.validate()?;
        let total_cost = costs.total()?;
        self.parts_cost = costs.parts_cost;
        self.labor_cost = costs.labor_cost;
        self.service_fee = costs.service_fee;
        self.total_cost = total_cost;
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_pending("approve", now)?;
        self.status = QuoteStatus::Approved;
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_pending("reject", now)?;
        self.status = QuoteStatus::Rejected;
        self.rejection_reason = reason;
        self.rejected_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Retires a pending quote in favour of a newer one.
    pub fn supersede(&mut self, replacement: Uuid, now: DateTime<Utc>) {
        if self.status == QuoteStatus::Pending {
            self.status = QuoteStatus::Expired;
            self.superseded_by = Some(replacement);
            self.updated_at = now;
        }
    }
}
