// Repair lifecycle entities
pub mod booking;
pub mod quote;
pub mod technician;
pub mod work_order;
pub mod work_order_activity_log;
pub mod work_order_part;

pub use booking::{BookingStatus, LocationType, ServiceType};
pub use quote::QuoteStatus;
pub use work_order::{StatusChange, WorkOrderStatus};
pub use work_order_activity_log::ActivityKind;

use rust_decimal::Decimal;

use crate::errors::ServiceError;

/// Sums money amounts, refusing totals that do not fit in a `Decimal`.
pub fn checked_total(
    amounts: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, ServiceError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).ok_or_else(|| {
            ServiceError::ValidationError("Cost total is out of range".to_string())
        })
    })
}
