use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Booking status. Rejected and Converted are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum BookingStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Converted")]
    Converted,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "Pending"),
            BookingStatus::Approved => write!(f, "Approved"),
            BookingStatus::Rejected => write!(f, "Rejected"),
            BookingStatus::Converted => write!(f, "Converted"),
        }
    }
}

/// Where the repair takes place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ServiceType {
    #[sea_orm(string_value = "InShop")]
    InShop,
    #[sea_orm(string_value = "OnSite")]
    OnSite,
}

/// Kind of premises an on-site technician visits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum LocationType {
    #[sea_orm(string_value = "Home")]
    Home,
    #[sea_orm(string_value = "Office")]
    Office,
    #[sea_orm(string_value = "Business")]
    Business,
    #[sea_orm(string_value = "Other")]
    Other,
}

/// Customer intake request for repair service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub contact_name: String,
    pub contact_phone: String,
    #[sea_orm(nullable)]
    pub contact_email: Option<String>,
    pub service_type: ServiceType,
    pub device_model: String,
    #[sea_orm(nullable)]
    pub serial_number: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub issue_description: String,
    #[sea_orm(column_type = "Json")]
    pub image_urls: Json,
    #[sea_orm(column_type = "Json")]
    pub video_urls: Json,
    pub preferred_date: NaiveDate,
    pub preferred_time_slot: String,
    #[sea_orm(nullable)]
    pub service_address: Option<String>,
    #[sea_orm(nullable)]
    pub location_type: Option<LocationType>,
    #[sea_orm(column_type = "Text", nullable)]
    pub on_site_notes: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub on_site_fee: Decimal,
    pub terms_accepted: bool,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub organization_id: Option<Uuid>,
    pub status: BookingStatus,
    #[sea_orm(nullable)]
    pub rejection_reason: Option<String>,
    #[sea_orm(nullable)]
    pub work_order_id: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    fn guard(&self, allowed: &[BookingStatus], action: &'static str) -> Result<(), ServiceError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(ServiceError::invalid_transition(
                "booking",
                self.id,
                self.status,
                action,
            ))
        }
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.guard(&[BookingStatus::Pending], "approve")?;
        self.status = BookingStatus::Approved;
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.guard(&[BookingStatus::Pending], "reject")?;
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "A rejection reason is required".to_string(),
            ));
        }
        self.status = BookingStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.rejected_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Checks that the booking may be turned into a work order.
    /// `require_approval` closes the Pending -> Converted shortcut.
    pub fn ensure_convertible(&self, require_approval: bool) -> Result<(), ServiceError> {
        if require_approval {
            self.guard(&[BookingStatus::Approved], "convert")
        } else {
            self.guard(&[BookingStatus::Approved, BookingStatus::Pending], "convert")
        }
    }

    pub fn mark_converted(
        &mut self,
        work_order_id: Uuid,
        require_approval: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_convertible(require_approval)?;
        self.status = BookingStatus::Converted;
        self.work_order_id = Some(work_order_id);
        self.converted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
