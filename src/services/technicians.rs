use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{require_staff, Actor},
    errors::ServiceError,
    events::{Event, EventSender},
    models::technician,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterTechnicianInput {
    /// User id of the technician
    pub id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub specialty: Option<String>,
    pub hourly_rate: Decimal,
}

/// Resolves a technician that can take new work.
pub async fn require_available_technician<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<technician::Model, ServiceError> {
    let technician = technician::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Technician {} not found", id)))?;
    if !technician.is_available {
        return Err(ServiceError::ValidationError(format!(
            "Technician {} is not available",
            technician.name
        )));
    }
    Ok(technician)
}

#[derive(Clone)]
pub struct TechnicianService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl TechnicianService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn register(
        &self,
        actor: &Actor,
        input: RegisterTechnicianInput,
    ) -> Result<technician::Model, ServiceError> {
        require_staff(actor, "register technicians")?;
        input.validate()?;
        if input.hourly_rate < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Hourly rate cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;
        if technician::Entity::find_by_id(input.id).one(db).await?.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Technician {} is already registered",
                input.id
            )));
        }

        let now = Utc::now();
        let created = technician::ActiveModel {
            id: Set(input.id),
            name: Set(input.name),
            specialty: Set(input.specialty),
            hourly_rate: Set(input.hourly_rate),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(technician_id = %created.id, "technician registered");
        self.event_sender
            .send_or_log(Event::TechnicianRegistered(created.id))
            .await;
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<technician::Model, ServiceError> {
        technician::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Technician {} not found", id)))
    }

    pub async fn list_available(&self) -> Result<Vec<technician::Model>, ServiceError> {
        let technicians = technician::Entity::find()
            .filter(technician::Column::IsAvailable.eq(true))
            .order_by_asc(technician::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(technicians)
    }

    /// Staff toggle anyone; a technician toggles only themselves.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn set_availability(
        &self,
        actor: &Actor,
        id: Uuid,
        is_available: bool,
    ) -> Result<technician::Model, ServiceError> {
        if !(actor.is_staff() || (actor.is_technician() && actor.actor_id == id)) {
            return Err(ServiceError::Forbidden(format!(
                "{} may not change the availability of technician {}",
                actor.actor_name, id
            )));
        }

        let existing = self.get(id).await?;
        let mut active: technician::ActiveModel = existing.into();
        active.is_available = Set(is_available);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::TechnicianAvailabilityChanged {
                technician_id: id,
                is_available,
            })
            .await;
        Ok(updated)
    }
}
