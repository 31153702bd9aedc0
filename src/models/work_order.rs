use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::booking::{LocationType, ServiceType};

/// Repair work order status.
///
/// ```text
/// Requested -> Assigned -> Diagnosed -> Quoted -> AwaitingApproval -> Approved
///   -> InProgress <-> OnHold -> Completed
/// ```
/// Declined, Rejected, Completed and Cancelled are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum WorkOrderStatus {
    #[sea_orm(string_value = "Requested")]
    Requested,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "Declined")]
    Declined,
    #[sea_orm(string_value = "Diagnosed")]
    Diagnosed,
    #[sea_orm(string_value = "Quoted")]
    Quoted,
    #[sea_orm(string_value = "AwaitingApproval")]
    AwaitingApproval,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "InProgress")]
    InProgress,
    #[sea_orm(string_value = "OnHold")]
    OnHold,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl WorkOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Declined | Self::Rejected | Self::Completed | Self::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "Requested",
            Self::Assigned => "Assigned",
            Self::Declined => "Declined",
            Self::Diagnosed => "Diagnosed",
            Self::Quoted => "Quoted",
            Self::AwaitingApproval => "AwaitingApproval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::InProgress => "InProgress",
            Self::OnHold => "OnHold",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repair work order entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub ticket_number: String,
    pub customer_id: Uuid,
    #[sea_orm(nullable)]
    pub booking_id: Option<Uuid>,
    pub device_model: String,
    #[sea_orm(nullable)]
    pub serial_number: Option<String>,
    pub issue_description: String,
    pub status: WorkOrderStatus,
    #[sea_orm(nullable)]
    pub technician_id: Option<Uuid>,
    pub service_type: ServiceType,
    #[sea_orm(nullable)]
    pub service_address: Option<String>,
    #[sea_orm(nullable)]
    pub location_type: Option<LocationType>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub parts_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub labor_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub service_fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_cost: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub technical_notes: Option<String>,
    #[sea_orm(nullable)]
    pub hold_reason: Option<String>,
    #[sea_orm(nullable)]
    pub decline_reason: Option<String>,
    #[sea_orm(nullable)]
    pub cancellation_reason: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub completion_notes: Option<String>,
    #[sea_orm(nullable)]
    pub current_quote_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_accepted_at: Option<DateTime<Utc>>,
    pub diagnosed_at: Option<DateTime<Utc>>,
    pub quoted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::work_order_part::Entity")]
    Parts,
    #[sea_orm(has_many = "super::work_order_activity_log::Entity")]
    ActivityLog,
    #[sea_orm(has_many = "super::quote::Entity")]
    Quotes,
}

impl Related<super::work_order_part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parts.def()
    }
}

impl Related<super::work_order_activity_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityLog.def()
    }
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Previous and new status of a successful transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub from: WorkOrderStatus,
    pub to: WorkOrderStatus,
}

/// Fields a new work order is seeded with, either by a customer directly or
/// from a converted booking.
#[derive(Clone, Debug)]
pub struct NewWorkOrder {
    pub ticket_number: String,
    pub customer_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub device_model: String,
    pub serial_number: Option<String>,
    pub issue_description: String,
    pub service_type: ServiceType,
    pub service_address: Option<String>,
    pub location_type: Option<LocationType>,
    pub service_fee: Decimal,
}

impl Model {
    /// Builds a work order in `Requested`, or in `Assigned` when a technician
    /// is known up front.
    pub fn new(fields: NewWorkOrder, technician_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        let mut model = Self {
            id: Uuid::new_v4(),
            ticket_number: fields.ticket_number,
            customer_id: fields.customer_id,
            booking_id: fields.booking_id,
            device_model: fields.device_model,
            serial_number: fields.serial_number,
            issue_description: fields.issue_description,
            status: WorkOrderStatus::Requested,
            technician_id: None,
            service_type: fields.service_type,
            service_address: fields.service_address,
            location_type: fields.location_type,
            parts_cost: Decimal::ZERO,
            labor_cost: Decimal::ZERO,
            service_fee: fields.service_fee,
            total_cost: fields.service_fee,
            technical_notes: None,
            hold_reason: None,
            decline_reason: None,
            cancellation_reason: None,
            completion_notes: None,
            current_quote_id: None,
            assigned_at: None,
            assignment_accepted_at: None,
            diagnosed_at: None,
            quoted_at: None,
            approved_at: None,
            started_at: None,
            finished_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        if let Some(technician_id) = technician_id {
            model.status = WorkOrderStatus::Assigned;
            model.technician_id = Some(technician_id);
            model.assigned_at = Some(now);
        }
        model
    }

    fn guard(&self, allowed: &[WorkOrderStatus], action: &'static str) -> Result<(), ServiceError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                self.status,
                action,
            ))
        }
    }

    fn move_to(&mut self, to: WorkOrderStatus, now: DateTime<Utc>) -> StatusChange {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        StatusChange { from, to }
    }

    /// Replaces the cost lines and derives totalCost from them. Nothing
    /// changes when the total is out of range.
    pub fn set_costs(
        &mut self,
        parts_cost: Decimal,
        labor_cost: Decimal,
        service_fee: Decimal,
    ) -> Result<(), ServiceError> {
        self.total_cost = super::checked_total([parts_cost, labor_cost, service_fee])?;
        self.parts_cost = parts_cost;
        self.labor_cost = labor_cost;
        self.service_fee = service_fee;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn assign_technician(
        &mut self,
        technician_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::Requested], "assign a technician to")?;
        self.technician_id = Some(technician_id);
        self.assigned_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Assigned, now))
    }

    /// Acceptance keeps the order in `Assigned`; only the timestamp records it.
    pub fn accept_assignment(&mut self, now: DateTime<Utc>) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::Assigned], "accept the assignment of")?;
        if self.assignment_accepted_at.is_some() {
            return Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                "Assigned (already accepted)",
                "accept the assignment of",
            ));
        }
        self.assignment_accepted_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Assigned, now))
    }

    pub fn decline_assignment(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::Assigned], "decline the assignment of")?;
        if self.assignment_accepted_at.is_some() {
            return Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                "Assigned (already accepted)",
                "decline the assignment of",
            ));
        }
        self.technician_id = None;
        self.decline_reason = reason;
        Ok(self.move_to(WorkOrderStatus::Declined, now))
    }

    /// Diagnosing implies the technician accepted the job.
    pub fn mark_as_diagnosed(
        &mut self,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::Assigned], "diagnose")?;
        if notes.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Diagnosis notes are required".to_string(),
            ));
        }
        self.assignment_accepted_at.get_or_insert(now);
        self.diagnosed_at = Some(now);
        self.technical_notes = Some(notes);
        Ok(self.move_to(WorkOrderStatus::Diagnosed, now))
    }

    /// Points the order at a freshly created quote. Re-quoting from `Quoted`
    /// or `AwaitingApproval` sends the order back to `Quoted`.
    pub fn attach_quote(
        &mut self,
        quote_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(
            &[
                WorkOrderStatus::Diagnosed,
                WorkOrderStatus::Quoted,
                WorkOrderStatus::AwaitingApproval,
            ],
            "quote",
        )?;
        self.current_quote_id = Some(quote_id);
        self.quoted_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Quoted, now))
    }

    pub fn mark_awaiting_approval(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::Quoted], "request quote approval for")?;
        if self.current_quote_id.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Work order {} has no current quote",
                self.ticket_number
            )));
        }
        Ok(self.move_to(WorkOrderStatus::AwaitingApproval, now))
    }

    /// Accepts the approved quote's labor and fee; parts stay ledger-derived.
    pub fn approve_quote(
        &mut self,
        labor_cost: Decimal,
        service_fee: Decimal,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::AwaitingApproval], "approve the quote of")?;
        self.set_costs(self.parts_cost, labor_cost, service_fee)?;
        self.approved_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Approved, now))
    }

    pub fn reject_quote(&mut self, now: DateTime<Utc>) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::AwaitingApproval], "reject the quote of")?;
        Ok(self.move_to(WorkOrderStatus::Rejected, now))
    }

    /// Starts work, or resumes it from `OnHold`. The original start time is kept.
    pub fn start_repair(&mut self, now: DateTime<Utc>) -> Result<StatusChange, ServiceError> {
        self.guard(
            &[WorkOrderStatus::Approved, WorkOrderStatus::OnHold],
            "start repair on",
        )?;
        if self.assignment_accepted_at.is_none() {
            return Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                self.status,
                "start repair on",
            ));
        }
        self.started_at.get_or_insert(now);
        self.hold_reason = None;
        Ok(self.move_to(WorkOrderStatus::InProgress, now))
    }

    pub fn put_on_hold(
        &mut self,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::InProgress], "put on hold")?;
        self.hold_reason = notes;
        Ok(self.move_to(WorkOrderStatus::OnHold, now))
    }

    /// Finalizes costs. A parts cost override must agree with the ledger
    /// because partsCost is always the sum of the recorded parts.
    pub fn complete_repair(
        &mut self,
        parts_cost: Option<Decimal>,
        labor_cost: Option<Decimal>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        self.guard(&[WorkOrderStatus::InProgress], "complete")?;
        if let Some(parts_cost) = parts_cost {
            if parts_cost != self.parts_cost {
                return Err(ServiceError::ValidationError(format!(
                    "Parts cost {} does not match the parts ledger total {}; adjust the parts ledger instead",
                    parts_cost, self.parts_cost
                )));
            }
        }
        let labor_cost = labor_cost.unwrap_or(self.labor_cost);
        if labor_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Labor cost cannot be negative".to_string(),
            ));
        }
        self.set_costs(self.parts_cost, labor_cost, self.service_fee)?;
        self.completion_notes = notes;
        self.finished_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Completed, now))
    }

    pub fn cancel(
        &mut self,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ServiceError> {
        if !self.is_open() {
            return Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                self.status,
                "cancel",
            ));
        }
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "A cancellation reason is required".to_string(),
            ));
        }
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(now);
        Ok(self.move_to(WorkOrderStatus::Cancelled, now))
    }

    /// Replaces partsCost with the ledger total.
    pub fn apply_parts_total(
        &mut self,
        ledger_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if !self.is_open() {
            return Err(ServiceError::invalid_transition(
                "work order",
                self.id,
                self.status,
                "change the parts of",
            ));
        }
        self.set_costs(ledger_total, self.labor_cost, self.service_fee)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn fresh(technician: Option<Uuid>) -> Model {
        Model::new(
            NewWorkOrder {
                ticket_number: "WO-20240101-ABC123".to_string(),
                customer_id: Uuid::new_v4(),
                booking_id: None,
                device_model: "Pixel 8".to_string(),
                serial_number: None,
                issue_description: "Cracked screen".to_string(),
                service_type: ServiceType::InShop,
                service_address: None,
                location_type: None,
                service_fee: dec!(20),
            },
            technician,
            Utc::now(),
        )
    }

    fn at(status: WorkOrderStatus) -> Model {
        let mut wo = fresh(Some(Uuid::new_v4()));
        wo.assignment_accepted_at = Some(Utc::now());
        wo.current_quote_id = Some(Uuid::new_v4());
        wo.status = status;
        wo
    }

    #[test]
    fn new_without_technician_is_requested() {
        let wo = fresh(None);
        assert_eq!(wo.status, WorkOrderStatus::Requested);
        assert!(wo.technician_id.is_none());
        assert_eq!(wo.total_cost, dec!(20));
    }

    #[test]
    fn new_with_technician_is_assigned() {
        let tech = Uuid::new_v4();
        let wo = fresh(Some(tech));
        assert_eq!(wo.status, WorkOrderStatus::Assigned);
        assert_eq!(wo.technician_id, Some(tech));
        assert!(wo.assigned_at.is_some());
    }

    #[test]
    fn happy_path_walks_every_stage() {
        let now = Utc::now();
        let mut wo = fresh(None);
        let tech = Uuid::new_v4();

        wo.assign_technician(tech, now).unwrap();
        wo.accept_assignment(now).unwrap();
        wo.mark_as_diagnosed("Broken digitizer".into(), now).unwrap();
        wo.attach_quote(Uuid::new_v4(), now).unwrap();
        wo.mark_awaiting_approval(now).unwrap();
        wo.approve_quote(dec!(200), dec!(20), now).unwrap();
        wo.start_repair(now).unwrap();
        wo.put_on_hold(Some("Waiting on part".into()), now).unwrap();
        wo.start_repair(now).unwrap();
        wo.apply_parts_total(dec!(100), now).unwrap();
        let change = wo.complete_repair(None, None, None, now).unwrap();

        assert_eq!(
            change,
            StatusChange {
                from: WorkOrderStatus::InProgress,
                to: WorkOrderStatus::Completed
            }
        );
        assert_eq!(wo.total_cost, dec!(320));
        assert!(wo.finished_at.is_some());
    }

    #[test]
    fn accept_logs_self_transition_once() {
        let mut wo = fresh(Some(Uuid::new_v4()));
        let change = wo.accept_assignment(Utc::now()).unwrap();
        assert_eq!(change.from, WorkOrderStatus::Assigned);
        assert_eq!(change.to, WorkOrderStatus::Assigned);
        assert_matches!(
            wo.accept_assignment(Utc::now()),
            Err(ServiceError::InvalidTransition { .. })
        );
    }

    #[test]
    fn decline_clears_technician() {
        let mut wo = fresh(Some(Uuid::new_v4()));
        wo.decline_assignment(Some("Out of area".into()), Utc::now())
            .unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Declined);
        assert!(wo.technician_id.is_none());
    }

    #[test]
    fn decline_after_accept_is_rejected() {
        let mut wo = fresh(Some(Uuid::new_v4()));
        wo.accept_assignment(Utc::now()).unwrap();
        assert_matches!(
            wo.decline_assignment(None, Utc::now()),
            Err(ServiceError::InvalidTransition { .. })
        );
    }

    #[test]
    fn complete_from_requested_leaves_order_untouched() {
        let mut wo = fresh(None);
        let before = wo.clone();
        let err = wo
            .complete_repair(None, Some(dec!(10)), None, Utc::now())
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidTransition { ref current_status, .. } if current_status == "Requested");
        assert_eq!(wo, before);
    }

    #[test]
    fn resume_keeps_original_start_time() {
        let mut wo = at(WorkOrderStatus::Approved);
        let first = Utc::now() - chrono::Duration::hours(2);
        wo.start_repair(first).unwrap();
        wo.put_on_hold(None, Utc::now()).unwrap();
        wo.start_repair(Utc::now()).unwrap();
        assert_eq!(wo.started_at, Some(first));
    }

    #[test_case(WorkOrderStatus::Approved)]
    #[test_case(WorkOrderStatus::OnHold)]
    fn unaccepted_assignment_blocks_start_with_current_status(status: WorkOrderStatus) {
        let mut wo = at(status);
        wo.assignment_accepted_at = None;
        assert_matches!(
            wo.start_repair(Utc::now()),
            Err(ServiceError::InvalidTransition { ref current_status, .. })
                if *current_status == status.to_string()
        );
        assert_eq!(wo.status, status);
    }

    #[test]
    fn out_of_range_costs_leave_order_untouched() {
        let mut wo = at(WorkOrderStatus::AwaitingApproval);
        wo.parts_cost = Decimal::MAX;
        let before = wo.clone();

        assert_matches!(
            wo.approve_quote(dec!(200), dec!(20), Utc::now()),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(wo, before);

        let mut wo = at(WorkOrderStatus::InProgress);
        wo.apply_parts_total(dec!(10), Utc::now()).unwrap();
        wo.labor_cost = Decimal::MAX;
        let before = wo.clone();
        assert_matches!(
            wo.apply_parts_total(dec!(1), Utc::now()),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(wo, before);
    }

    #[test]
    fn parts_override_must_match_ledger() {
        let mut wo = at(WorkOrderStatus::InProgress);
        wo.apply_parts_total(dec!(130), Utc::now()).unwrap();
        assert_matches!(
            wo.complete_repair(Some(dec!(99)), None, None, Utc::now()),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(wo.status, WorkOrderStatus::InProgress);
        wo.complete_repair(Some(dec!(130)), Some(dec!(75)), None, Utc::now())
            .unwrap();
        assert_eq!(wo.total_cost, dec!(130) + dec!(75) + dec!(20));
    }

    #[test]
    fn approve_quote_takes_labor_and_fee() {
        let mut wo = at(WorkOrderStatus::AwaitingApproval);
        wo.apply_parts_total(dec!(100), Utc::now()).unwrap();
        wo.approve_quote(dec!(200), dec!(20), Utc::now()).unwrap();
        assert_eq!(wo.total_cost, dec!(320));
    }

    #[test]
    fn requote_returns_to_quoted() {
        let mut wo = at(WorkOrderStatus::AwaitingApproval);
        let replacement = Uuid::new_v4();
        let change = wo.attach_quote(replacement, Utc::now()).unwrap();
        assert_eq!(change.to, WorkOrderStatus::Quoted);
        assert_eq!(wo.current_quote_id, Some(replacement));
    }

    #[test_case(WorkOrderStatus::Declined)]
    #[test_case(WorkOrderStatus::Rejected)]
    #[test_case(WorkOrderStatus::Completed)]
    #[test_case(WorkOrderStatus::Cancelled)]
    fn terminal_orders_cannot_be_cancelled_or_changed(status: WorkOrderStatus) {
        let mut wo = at(status);
        assert_matches!(
            wo.cancel("changed my mind".into(), Utc::now()),
            Err(ServiceError::InvalidTransition { .. })
        );
        assert_matches!(
            wo.apply_parts_total(dec!(5), Utc::now()),
            Err(ServiceError::InvalidTransition { .. })
        );
        assert_eq!(wo.status, status);
    }

    #[test]
    fn cancel_requires_reason() {
        let mut wo = fresh(None);
        assert_matches!(
            wo.cancel("  ".into(), Utc::now()),
            Err(ServiceError::ValidationError(_))
        );
        wo.cancel("Customer withdrew".into(), Utc::now()).unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Cancelled);
    }
}
