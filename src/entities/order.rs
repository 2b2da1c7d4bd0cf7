use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of a paid order, created exactly once per checkout session.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Checkout session that produced this order; unique at the store level,
    /// which is what makes duplicate webhook deliveries idempotent.
    #[sea_orm(unique)]
    pub source_session_id: String,

    /// Processor-side payment reference (e.g. a payment intent id)
    pub payment_reference: Option<String>,

    pub amount_total: Decimal,
    pub status: OrderStatus,
    pub distributor_status: DistributorStatus,

    /// Customer contact snapshot reconstructed from session metadata
    pub customer: Json,
    /// Shipping address snapshot reconstructed from session metadata
    pub shipping_address: Json,
    /// Ordered line items `[{sku, quantity, unit_price, name, vendor}]`
    pub items: Json,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Fulfillment lifecycle: paid → sent_to_distributor → shipped, with failed
/// reachable from the non-terminal states.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "sent_to_distributor")]
    SentToDistributor,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Paid, SentToDistributor) | (SentToDistributor, Shipped) | (Paid | SentToDistributor, Failed)
        )
    }
}

/// Distributor submission lifecycle, parallel to the order status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistributorStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "acknowledged")]
    Acknowledged,
    #[sea_orm(string_value = "error")]
    Error,
}

impl DistributorStatus {
    pub fn can_transition_to(self, next: DistributorStatus) -> bool {
        use DistributorStatus::*;
        matches!(
            (self, next),
            (Pending, Submitted) | (Submitted, Acknowledged) | (Pending | Submitted, Error)
        )
    }
}
