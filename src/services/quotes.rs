use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{authorize_quote_decision, authorize_work_order_action, authorize_work_order_read, Actor},
    config::RepairPolicy,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        quote::{self, QuoteCosts, QuoteStatus},
        work_order, ActivityKind,
    },
    services::{
        activity_log::{self, ActivityEntry},
        generate_number,
        work_orders::{load_work_order, save_work_order},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuoteInput {
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub service_fee: Decimal,
    pub estimated_hours: Decimal,
    pub hourly_rate: Decimal,
    pub description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuoteCostsInput {
    pub parts_cost: Option<Decimal>,
    pub labor_cost: Option<Decimal>,
    pub service_fee: Option<Decimal>,
}

pub async fn load_quote<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<quote::Model, ServiceError> {
    quote::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", id)))
}

pub async fn save_quote<C: ConnectionTrait>(
    conn: &C,
    mut model: quote::Model,
    expected_version: i32,
) -> Result<quote::Model, ServiceError> {
    model.version = expected_version + 1;
    let id = model.id;

    let result = quote::Entity::update_many()
        .set(quote::ActiveModel::from(model.clone()).reset_all())
        .filter(quote::Column::Id.eq(id))
        .filter(quote::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(quote_id = %id, expected_version, "quote changed concurrently");
        counter!("repairdesk.concurrency_conflicts", 1, "entity" => "quote");
        return Err(ServiceError::ConcurrentModification(id));
    }
    Ok(model)
}

/// Writes back a quote observed past its deadline and logs the expiry on the
/// owning work order. The caller commits.
pub(crate) async fn expire_in_txn<C: ConnectionTrait>(
    conn: &C,
    mut model: quote::Model,
    now: DateTime<Utc>,
) -> Result<quote::Model, ServiceError> {
    let expected = model.version;
    if !model.expire_if_due(now) {
        return Ok(model);
    }
    let model = save_quote(conn, model, expected).await?;
    activity_log::record(
        conn,
        model.work_order_id,
        ActivityEntry::event(
            ActivityKind::QuoteExpired,
            format!("Quote {} expired", model.quote_number),
        ),
        &Actor::system(),
        now,
    )
    .await?;
    counter!("repairdesk.quotes.expired", 1);
    info!(quote_id = %model.id, "quote expired on read");
    Ok(model)
}

/// Quote lifecycle, including the work order side effects of a decision.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    policy: Arc<RepairPolicy>,
}

impl QuoteService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        policy: Arc<RepairPolicy>,
    ) -> Self {
        Self {
            db,
            event_sender,
            policy,
        }
    }

    /// Quotes a diagnosed work order, or re-quotes one that is already quoted.
    /// A pending predecessor is superseded and kept for history.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn create_quote(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: CreateQuoteInput,
    ) -> Result<quote::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut work_order = load_work_order(&txn, work_order_id).await?;
        authorize_work_order_action(actor, &work_order, "quote")?;

        let new_quote = quote::Model::new(
            generate_number(&self.policy.quote_prefix, now),
            work_order_id,
            QuoteCosts {
                parts_cost: input.parts_cost,
                labor_cost: input.labor_cost,
                service_fee: input.service_fee,
            },
            input.estimated_hours,
            input.hourly_rate,
            input.description,
            input.notes,
            actor.actor_id,
            self.policy.quote_validity(),
            now,
        )?;

        let previous_quote_id = work_order.current_quote_id;
        let expected = work_order.version;
        let change = work_order.attach_quote(new_quote.id, now).map_err(|e| {
            warn!(%work_order_id, error = %e, "quote rejected");
            e
        })?;

        let created = quote::ActiveModel::from(new_quote)
            .reset_all()
            .insert(&txn)
            .await?;

        let mut superseded = None;
        if let Some(previous_id) = previous_quote_id {
            let mut previous = load_quote(&txn, previous_id).await?;
            if previous.status == QuoteStatus::Pending {
                let previous_version = previous.version;
                previous.supersede(created.id, now);
                save_quote(&txn, previous, previous_version).await?;
                superseded = Some(previous_id);
            }
        }

        save_work_order(&txn, work_order, expected).await?;
        activity_log::record(
            &txn,
            work_order_id,
            ActivityEntry::transition(
                ActivityKind::QuoteGenerated,
                change,
                Some(format!(
                    "Quote {} for {}",
                    created.quote_number, created.total_cost
                )),
            ),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        counter!("repairdesk.work_orders.transitions", 1, "action" => "quote");
        info!(quote_id = %created.id, %work_order_id, total = %created.total_cost, "quote created");
        self.event_sender
            .send_or_log(Event::QuoteCreated {
                quote_id: created.id,
                work_order_id,
                superseded,
            })
            .await;
        self.event_sender
            .send_or_log(Event::WorkOrderStatusChanged {
                work_order_id,
                old_status: change.from,
                new_status: change.to,
                actor_id: actor.actor_id,
            })
            .await;
        Ok(created)
    }

    /// Reads a quote, expiring it first when its deadline has passed.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<quote::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let quote = load_quote(&txn, id).await?;
        let work_order = load_work_order(&txn, quote.work_order_id).await?;
        authorize_work_order_read(actor, &work_order)?;

        if !quote.is_expired_at(now) {
            return Ok(quote);
        }
        let quote = expire_in_txn(&txn, quote, now).await?;
        txn.commit().await?;
        self.publish_expiry(&quote).await;
        Ok(quote)
    }

    /// Every quote a work order has had, oldest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn list_for_work_order(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<quote::Model>, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let work_order = load_work_order(&txn, work_order_id).await?;
        authorize_work_order_read(actor, &work_order)?;

        let quotes = quote::Entity::find()
            .filter(quote::Column::WorkOrderId.eq(work_order_id))
            .order_by_asc(quote::Column::CreatedAt)
            .all(&txn)
            .await?;

        let mut observed = Vec::with_capacity(quotes.len());
        let mut expired = Vec::new();
        for quote in quotes {
            if quote.is_expired_at(now) {
                let quote = expire_in_txn(&txn, quote, now).await?;
                expired.push(quote.clone());
                observed.push(quote);
            } else {
                observed.push(quote);
            }
        }
        txn.commit().await?;

        for quote in &expired {
            self.publish_expiry(quote).await;
        }
        Ok(observed)
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.actor_id))]
    pub async fn update_costs(
        &self,
        actor: &Actor,
        id: Uuid,
        input: UpdateQuoteCostsInput,
    ) -> Result<quote::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut quote = load_quote(&txn, id).await?;
        let work_order = load_work_order(&txn, quote.work_order_id).await?;
        authorize_work_order_action(actor, &work_order, "update quotes of")?;

        if quote.is_expired_at(now) {
            return self.fail_expired(txn, quote, now).await;
        }

        let expected = quote.version;
        quote.update_costs(input.parts_cost, input.labor_cost, input.service_fee, now)?;
        let quote = save_quote(&txn, quote, expected).await?;
        activity_log::record(
            &txn,
            quote.work_order_id,
            ActivityEntry::event(
                ActivityKind::QuoteUpdated,
                format!("Quote {} revised to {}", quote.quote_number, quote.total_cost),
            ),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::QuoteUpdated { quote_id: id })
            .await;
        Ok(quote)
    }

    /// Customer approval. The work order moves to `Approved` and takes the
    /// quoted labor and service fee.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<quote::Model, ServiceError> {
        self.decide(actor, id, Decision::Approve).await
    }

    /// Customer rejection. The work order ends in `Rejected`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<quote::Model, ServiceError> {
        self.decide(actor, id, Decision::Reject(reason)).await
    }

    /// Approves whatever quote is current on the work order.
    pub async fn approve_current(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<quote::Model, ServiceError> {
        let quote_id = self.current_quote_id(actor, work_order_id).await?;
        self.approve(actor, quote_id).await
    }

    pub async fn reject_current(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        reason: Option<String>,
    ) -> Result<quote::Model, ServiceError> {
        let quote_id = self.current_quote_id(actor, work_order_id).await?;
        self.reject(actor, quote_id, reason).await
    }

    async fn current_quote_id(&self, actor: &Actor, work_order_id: Uuid) -> Result<Uuid, ServiceError> {
        let work_order = load_work_order(&*self.db, work_order_id).await?;
        authorize_work_order_read(actor, &work_order)?;
        work_order.current_quote_id.ok_or_else(|| {
            ServiceError::NotFound(format!("Work order {} has no quote", work_order_id))
        })
    }

    async fn decide(&self, actor: &Actor, id: Uuid, decision: Decision) -> Result<quote::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut quote = load_quote(&txn, id).await?;
        let mut work_order: work_order::Model = load_work_order(&txn, quote.work_order_id).await?;
        authorize_quote_decision(actor, &work_order)?;

        if quote.is_expired_at(now) {
            return self.fail_expired(txn, quote, now).await;
        }

        let quote_version = quote.version;
        let order_version = work_order.version;
        let (change, kind, action, description) = match decision {
            Decision::Approve => {
                quote.approve(now)?;
                let change = work_order.approve_quote(quote.labor_cost, quote.service_fee, now)?;
                (
                    change,
                    ActivityKind::QuoteApproved,
                    "approve_quote",
                    format!("Quote {} approved", quote.quote_number),
                )
            }
            Decision::Reject(reason) => {
                quote.reject(reason.clone(), now)?;
                let change = work_order.reject_quote(now)?;
                let description = match reason {
                    Some(reason) => format!("Quote {} rejected: {}", quote.quote_number, reason),
                    None => format!("Quote {} rejected", quote.quote_number),
                };
                (change, ActivityKind::QuoteRejected, "reject_quote", description)
            }
        };

        let quote = save_quote(&txn, quote, quote_version).await?;
        let work_order = save_work_order(&txn, work_order, order_version).await?;
        activity_log::record(
            &txn,
            work_order.id,
            ActivityEntry::transition(kind, change, Some(description)),
            actor,
            now,
        )
        .await?;
        txn.commit().await?;

        counter!("repairdesk.work_orders.transitions", 1, "action" => action);
        info!(quote_id = %id, work_order_id = %work_order.id, status = %quote.status, "quote decided");
        self.event_sender
            .send_or_log(Event::QuoteDecided {
                quote_id: id,
                work_order_id: work_order.id,
                status: quote.status,
            })
            .await;
        self.event_sender
            .send_or_log(Event::WorkOrderStatusChanged {
                work_order_id: work_order.id,
                old_status: change.from,
                new_status: change.to,
                actor_id: actor.actor_id,
            })
            .await;
        Ok(quote)
    }

    /// Persists the expiry, then refuses the action that observed it.
    async fn fail_expired(
        &self,
        txn: sea_orm::DatabaseTransaction,
        quote: quote::Model,
        now: DateTime<Utc>,
    ) -> Result<quote::Model, ServiceError> {
        let quote = expire_in_txn(&txn, quote, now).await?;
        txn.commit().await?;
        self.publish_expiry(&quote).await;
        Err(ServiceError::QuoteExpired { quote_id: quote.id })
    }

    async fn publish_expiry(&self, quote: &quote::Model) {
        self.event_sender
            .send_or_log(Event::QuoteExpired {
                quote_id: quote.id,
                work_order_id: quote.work_order_id,
            })
            .await;
    }
}

enum Decision {
    Approve,
    Reject(Option<String>),
}
