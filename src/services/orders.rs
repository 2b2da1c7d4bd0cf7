use crate::entities::order::{self, DistributorStatus, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::checkout::OrderPayload;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Everything the payment completion event contributes to an order: the
/// idempotency key (session id), the processor's authoritative amount and
/// payment reference, and the reconstruction payload from session metadata.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub session_id: String,
    pub payment_reference: Option<String>,
    pub amount_total: Decimal,
    pub payload: OrderPayload,
}

/// Whether `create_from_completed_session` wrote a new row or found one
/// already recorded for the session.
#[derive(Debug)]
pub enum CreationOutcome {
    Created(order::Model),
    AlreadyRecorded(order::Model),
}

impl CreationOutcome {
    pub fn order(&self) -> &order::Model {
        match self {
            CreationOutcome::Created(order) | CreationOutcome::AlreadyRecorded(order) => order,
        }
    }
}

/// Durable order lifecycle. Creation is exactly-once per checkout session;
/// later transitions belong to downstream fulfillment and are guarded by the
/// status state machines.
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates the order for a completed checkout session, exactly once.
    ///
    /// Idempotency rides on the store's unique constraint on
    /// `source_session_id`: the insert is attempted with ON CONFLICT DO
    /// NOTHING, so concurrent duplicate deliveries collide at the database
    /// rather than racing through a read-then-write window.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn create_from_completed_session(
        &self,
        session: CompletedSession,
    ) -> Result<CreationOutcome, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let model = order::ActiveModel {
            id: Set(order_id),
            source_session_id: Set(session.session_id.clone()),
            payment_reference: Set(session.payment_reference.clone()),
            amount_total: Set(session.amount_total),
            status: Set(OrderStatus::Paid),
            distributor_status: Set(DistributorStatus::Pending),
            customer: Set(serde_json::to_value(&session.payload.customer)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            shipping_address: Set(serde_json::to_value(&session.payload.shipping_address)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            items: Set(serde_json::to_value(&session.payload.items)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let insert = order::Entity::insert(model)
            .on_conflict(
                OnConflict::column(order::Column::SourceSessionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&*self.db)
            .await;

        match insert {
            Ok(_) => {
                let order = self.find_by_session(&session.session_id).await?;
                info!(order_id = %order.id, "order created from completed session");
                if let Err(e) = self
                    .event_sender
                    .send(Event::OrderCreated {
                        order_id: order.id,
                        source_session_id: order.source_session_id.clone(),
                    })
                    .await
                {
                    warn!(error = %e, "failed to announce order creation");
                }
                Ok(CreationOutcome::Created(order))
            }
            Err(DbErr::RecordNotInserted) => {
                let order = self.find_by_session(&session.session_id).await?;
                info!(order_id = %order.id, "duplicate completion event, order already recorded");
                Ok(CreationOutcome::AlreadyRecorded(order))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_session(&self, session_id: &str) -> Result<order::Model, ServiceError> {
        order::Entity::find()
            .filter(order::Column::SourceSessionId.eq(session_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "order for session {} vanished after insert",
                    session_id
                ))
            })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    pub async fn list_orders(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let total = order::Entity::find().count(&*self.db).await?;
        let orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;
        Ok((orders, total))
    }

    /// Downstream fulfillment transition, rejected if the edge is not part of
    /// the order lifecycle.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let current = self.get_order(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(ServiceError::ValidationError(format!(
                "illegal order status transition {} -> {}",
                current.status, next
            )));
        }
        let mut model: order::ActiveModel = current.into();
        model.status = Set(next);
        model.updated_at = Set(Some(Utc::now()));
        Ok(model.update(&*self.db).await?)
    }

    /// Parallel distributor-side transition, same guard discipline.
    #[instrument(skip(self))]
    pub async fn set_distributor_status(
        &self,
        id: Uuid,
        next: DistributorStatus,
    ) -> Result<order::Model, ServiceError> {
        let current = self.get_order(id).await?;
        if !current.distributor_status.can_transition_to(next) {
            return Err(ServiceError::ValidationError(format!(
                "illegal distributor status transition {} -> {}",
                current.distributor_status, next
            )));
        }
        let mut model: order::ActiveModel = current.into();
        model.distributor_status = Set(next);
        model.updated_at = Set(Some(Utc::now()));
        Ok(model.update(&*self.db).await?)
    }
}
