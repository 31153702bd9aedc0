// Repair lifecycle services
pub mod activity_log;
pub mod bookings;
pub mod parts;
pub mod quotes;
pub mod technicians;
pub mod work_orders;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::RepairPolicy,
    errors::ServiceError,
    events::EventSender,
    models::{LocationType, ServiceType},
};

use self::{
    activity_log::ActivityLogService, bookings::BookingService, parts::PartLedgerService,
    quotes::QuoteService, technicians::TechnicianService, work_orders::WorkOrderService,
};

/// The lifecycle orchestrator handed to the API layer: one service per
/// aggregate, all sharing the same pool, event channel and policy.
#[derive(Clone)]
pub struct RepairServices {
    pub bookings: BookingService,
    pub work_orders: WorkOrderService,
    pub quotes: QuoteService,
    pub parts: PartLedgerService,
    pub activity_log: ActivityLogService,
    pub technicians: TechnicianService,
}

impl RepairServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        policy: Arc<RepairPolicy>,
    ) -> Self {
        Self {
            bookings: BookingService::new(db.clone(), event_sender.clone(), policy.clone()),
            work_orders: WorkOrderService::new(db.clone(), event_sender.clone(), policy.clone()),
            quotes: QuoteService::new(db.clone(), event_sender.clone(), policy),
            parts: PartLedgerService::new(db.clone(), event_sender.clone()),
            activity_log: ActivityLogService::new(db.clone()),
            technicians: TechnicianService::new(db, event_sender),
        }
    }
}

/// Human-readable identifier such as `WO-20240615-K3J9QZ`.
pub fn generate_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}

/// On-site visits carry the flat policy fee; shop repairs carry none.
pub fn on_site_fee_for(service_type: ServiceType, policy: &RepairPolicy) -> Decimal {
    match service_type {
        ServiceType::OnSite => policy.on_site_fee,
        ServiceType::InShop => Decimal::ZERO,
    }
}

/// On-site service needs somewhere to go.
pub fn validate_service_location(
    service_type: ServiceType,
    service_address: Option<&str>,
    location_type: Option<LocationType>,
) -> Result<(), ServiceError> {
    if service_type != ServiceType::OnSite {
        return Ok(());
    }
    if service_address.map_or(true, |address| address.trim().is_empty()) {
        return Err(ServiceError::ValidationError(
            "On-site service requires a service address".to_string(),
        ));
    }
    if location_type.is_none() {
        return Err(ServiceError::ValidationError(
            "On-site service requires a location type".to_string(),
        ));
    }
    Ok(())
}
