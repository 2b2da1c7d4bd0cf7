use crate::entities::order::{self, DistributorStatus, OrderStatus};
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub source_session_id: String,
    pub payment_reference: Option<String>,
    pub amount_total: Decimal,
    pub status: OrderStatus,
    pub distributor_status: DistributorStatus,
    #[schema(value_type = Object)]
    pub customer: serde_json::Value,
    #[schema(value_type = Object)]
    pub shipping_address: serde_json::Value,
    #[schema(value_type = Object)]
    pub items: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            source_session_id: model.source_session_id,
            payment_reference: model.payment_reference,
            amount_total: model.amount_total,
            status: model.status,
            distributor_status: model.distributor_status,
            customer: model.customer,
            shipping_address: model.shipping_address,
            items: model.items,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders page", body = crate::ApiResponse<PaginatedResponse<OrderResponse>>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let (orders, total) = state.orders.list_orders(limit, (page - 1) * limit).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: orders.into_iter().map(OrderResponse::from).collect(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(OrderResponse::from(order))))
}
