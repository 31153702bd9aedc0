/*!
 * # Actor and role gating
 *
 * Authentication happens upstream. Every operation receives a resolved
 * [`Actor`] and the functions below decide, without touching storage, whether
 * that actor may see or change a given record.
 *
 * Customers only ever see their own records; records they cannot see are
 * reported as not found. Technicians act on work orders assigned to them.
 * Managers and admins bypass the ownership checks.
 */

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{booking, work_order, WorkOrderStatus};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Technician,
    Manager,
    Admin,
}

/// The resolved caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub roles: HashSet<Role>,
}

impl Actor {
    pub fn new(actor_id: Uuid, actor_name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            actor_id,
            actor_name: actor_name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Author of entries written by the system itself, such as lazy expiry.
    pub fn system() -> Self {
        Self {
            actor_id: Uuid::nil(),
            actor_name: "system".to_string(),
            roles: HashSet::new(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Manager or admin.
    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Manager) || self.has_role(Role::Admin)
    }

    pub fn is_technician(&self) -> bool {
        self.has_role(Role::Technician)
    }

    /// Parses the actor forwarded by the authenticating gateway.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let actor_id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", ACTOR_ID_HEADER)))?;
        let actor_id = Uuid::parse_str(actor_id)
            .map_err(|_| ServiceError::Unauthorized(format!("malformed {} header", ACTOR_ID_HEADER)))?;

        let roles = header(ACTOR_ROLES_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", ACTOR_ROLES_HEADER)))?
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(|role| {
                Role::from_str(role)
                    .map_err(|_| ServiceError::Unauthorized(format!("unknown role '{}'", role)))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        if roles.is_empty() {
            return Err(ServiceError::Unauthorized("actor has no roles".to_string()));
        }

        let actor_name = header(ACTOR_NAME_HEADER).unwrap_or("unknown").to_string();

        Ok(Self {
            actor_id,
            actor_name,
            roles,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers)
    }
}

fn forbidden(actor: &Actor, action: &str) -> ServiceError {
    ServiceError::Forbidden(format!("{} may not {}", actor.actor_name, action))
}

/// Manager or admin only.
pub fn require_staff(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(forbidden(actor, action))
    }
}

/// Acting on a customer's behalf: the customer themselves, or staff.
pub fn authorize_customer_scope(actor: &Actor, customer_id: Uuid) -> Result<(), ServiceError> {
    if actor.is_staff() || (actor.has_role(Role::Customer) && actor.actor_id == customer_id) {
        Ok(())
    } else {
        Err(forbidden(actor, "act for another customer"))
    }
}

/// Listing a technician's queue: the technician themselves, or staff.
pub fn authorize_technician_scope(actor: &Actor, technician_id: Uuid) -> Result<(), ServiceError> {
    if actor.is_staff() || (actor.is_technician() && actor.actor_id == technician_id) {
        Ok(())
    } else {
        Err(forbidden(actor, "view another technician's work"))
    }
}

/// Only staff and technicians browse the unassigned pool.
pub fn authorize_unassigned_pool(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_staff() || actor.is_technician() {
        Ok(())
    } else {
        Err(forbidden(actor, "browse unassigned work orders"))
    }
}

pub fn can_view_booking(actor: &Actor, booking: &booking::Model) -> bool {
    actor.is_staff() || (actor.has_role(Role::Customer) && booking.customer_id == actor.actor_id)
}

/// Hidden bookings are reported as missing.
pub fn authorize_booking_read(actor: &Actor, booking: &booking::Model) -> Result<(), ServiceError> {
    if can_view_booking(actor, booking) {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("Booking {} not found", booking.id)))
    }
}

/// Staff see everything. Technicians see their own orders and the unassigned
/// pool. Customers see their own orders.
pub fn can_view_work_order(actor: &Actor, work_order: &work_order::Model) -> bool {
    if actor.is_staff()
        || (actor.has_role(Role::Customer) && work_order.customer_id == actor.actor_id)
    {
        return true;
    }
    actor.is_technician()
        && (work_order.technician_id == Some(actor.actor_id)
            || work_order.status == WorkOrderStatus::Requested)
}

pub fn authorize_work_order_read(
    actor: &Actor,
    work_order: &work_order::Model,
) -> Result<(), ServiceError> {
    if can_view_work_order(actor, work_order) {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!(
            "Work order {} not found",
            work_order.id
        )))
    }
}

/// Mutations on a work order's execution: the assigned technician, or staff.
pub fn authorize_work_order_action(
    actor: &Actor,
    work_order: &work_order::Model,
    action: &str,
) -> Result<(), ServiceError> {
    authorize_work_order_read(actor, work_order)?;
    if actor.is_staff() {
        return Ok(());
    }
    if actor.is_technician() && work_order.technician_id == Some(actor.actor_id) {
        return Ok(());
    }
    Err(forbidden(actor, action))
}

/// Staff assign anyone; a technician may only pick a job up for themselves.
pub fn authorize_assignment(
    actor: &Actor,
    work_order: &work_order::Model,
    technician_id: Uuid,
) -> Result<(), ServiceError> {
    authorize_work_order_read(actor, work_order)?;
    if actor.is_staff() || (actor.is_technician() && actor.actor_id == technician_id) {
        Ok(())
    } else {
        Err(forbidden(actor, "assign this work order"))
    }
}

/// Quote approval and rejection belong to the work order's customer. Staff
/// may record the decision on the customer's behalf.
pub fn authorize_quote_decision(
    actor: &Actor,
    work_order: &work_order::Model,
) -> Result<(), ServiceError> {
    authorize_work_order_read(actor, work_order)?;
    if actor.is_staff()
        || (actor.has_role(Role::Customer) && work_order.customer_id == actor.actor_id)
    {
        Ok(())
    } else {
        Err(forbidden(actor, "decide on this quote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::ServiceType;
    use crate::models::work_order::NewWorkOrder;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn order(customer_id: Uuid, technician_id: Option<Uuid>) -> work_order::Model {
        work_order::Model::new(
            NewWorkOrder {
                ticket_number: "WO-20240101-AAAAAA".into(),
                customer_id,
                booking_id: None,
                device_model: "ThinkPad X1".into(),
                serial_number: None,
                issue_description: "Keyboard".into(),
                service_type: ServiceType::InShop,
                service_address: None,
                location_type: None,
                service_fee: Decimal::ZERO,
            },
            technician_id,
            Utc::now(),
        )
    }

    #[rstest]
    #[case(Role::Manager)]
    #[case(Role::Admin)]
    fn staff_bypass_ownership(#[case] role: Role) {
        let staff = Actor::new(Uuid::new_v4(), "Morgan", [role]);
        let wo = order(Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(authorize_work_order_action(&staff, &wo, "start repair").is_ok());
        assert!(authorize_quote_decision(&staff, &wo).is_ok());
        assert!(authorize_assignment(&staff, &wo, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn technician_acts_only_on_own_orders() {
        let tech = Actor::new(Uuid::new_v4(), "Sam", [Role::Technician]);
        let mine = order(Uuid::new_v4(), Some(tech.actor_id));
        let theirs = order(Uuid::new_v4(), Some(Uuid::new_v4()));

        assert!(authorize_work_order_action(&tech, &mine, "diagnose").is_ok());
        assert_matches!(
            authorize_work_order_action(&tech, &theirs, "diagnose"),
            Err(ServiceError::NotFound(_))
        );
    }

    #[test]
    fn technician_sees_pool_but_cannot_act_on_it() {
        let tech = Actor::new(Uuid::new_v4(), "Sam", [Role::Technician]);
        let pool = order(Uuid::new_v4(), None);
        assert!(can_view_work_order(&tech, &pool));
        assert_matches!(
            authorize_work_order_action(&tech, &pool, "cancel"),
            Err(ServiceError::Forbidden(_))
        );
        assert!(authorize_assignment(&tech, &pool, tech.actor_id).is_ok());
        assert_matches!(
            authorize_assignment(&tech, &pool, Uuid::new_v4()),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn customers_read_own_orders_and_decide_quotes() {
        let customer = Actor::new(Uuid::new_v4(), "Dana", [Role::Customer]);
        let own = order(customer.actor_id, Some(Uuid::new_v4()));
        let other = order(Uuid::new_v4(), None);

        assert!(authorize_work_order_read(&customer, &own).is_ok());
        assert!(authorize_quote_decision(&customer, &own).is_ok());
        assert_matches!(
            authorize_work_order_action(&customer, &own, "complete"),
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            authorize_work_order_read(&customer, &other),
            Err(ServiceError::NotFound(_))
        );
    }

    #[test]
    fn technicians_cannot_approve_quotes() {
        let tech = Actor::new(Uuid::new_v4(), "Sam", [Role::Technician]);
        let wo = order(Uuid::new_v4(), Some(tech.actor_id));
        assert_matches!(
            authorize_quote_decision(&tech, &wo),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn actor_parses_from_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(ACTOR_NAME_HEADER, HeaderValue::from_static("Sam"));
        headers.insert(ACTOR_ROLES_HEADER, HeaderValue::from_static("Technician, manager"));

        let actor = Actor::from_headers(&headers).unwrap();
        assert_eq!(actor.actor_id, id);
        assert_eq!(actor.actor_name, "Sam");
        assert!(actor.is_technician());
        assert!(actor.is_staff());
    }

    #[rstest]
    #[case(None, Some("customer"))]
    #[case(Some("not-a-uuid"), Some("customer"))]
    #[case(Some("6f1c2f0e-0000-4000-8000-000000000001"), None)]
    #[case(Some("6f1c2f0e-0000-4000-8000-000000000001"), Some("janitor"))]
    fn bad_actor_headers_are_unauthorized(#[case] id: Option<&'static str>, #[case] roles: Option<&'static str>) {
        let mut headers = HeaderMap::new();
        if let Some(id) = id {
            headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static(id));
        }
        if let Some(roles) = roles {
            headers.insert(ACTOR_ROLES_HEADER, HeaderValue::from_static(roles));
        }
        assert_matches!(
            Actor::from_headers(&headers),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn matching_id_without_customer_role_does_not_grant_read() {
        let tech = Actor::new(Uuid::new_v4(), "Sam", [Role::Technician]);
        let wo = order(tech.actor_id, Some(Uuid::new_v4()));
        assert!(!can_view_work_order(&tech, &wo));
        assert_matches!(
            authorize_work_order_read(&tech, &wo),
            Err(ServiceError::NotFound(_))
        );

        let customer = Actor::new(tech.actor_id, "Sam", [Role::Customer]);
        assert!(can_view_work_order(&customer, &wo));
    }
}
