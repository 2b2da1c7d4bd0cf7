use crate::entities::distributor_event;
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Append-only sink for asynchronous distributor notifications. A failed
/// write surfaces to the caller but is never retried or rolled back here.
pub struct DistributorEventService {
    db: Arc<DatabaseConnection>,
}

impl DistributorEventService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn ingest(
        &self,
        event_type: String,
        payload: serde_json::Value,
    ) -> Result<distributor_event::Model, ServiceError> {
        let record = distributor_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_type: Set(event_type),
            payload: Set(payload),
            received_at: Set(Utc::now()),
        };

        let stored = record.insert(&*self.db).await?;
        info!(event_id = %stored.id, event_type = %stored.event_type, "distributor event recorded");
        Ok(stored)
    }
}
