use crate::clients::distributor::{CatalogPage, SearchQuery, SkuPricing};
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub vendor: Option<String>,
    /// 1-based page number, defaults to 1
    pub page_number: Option<u32>,
    /// Defaults to 24; values above 100 are clamped, not rejected
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PricingRequest {
    /// 1 to 50 skus; duplicates are collapsed before the upstream call
    pub skus: Vec<String>,
}

/// Live catalog search against the distributor; results are never cached.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Catalog page", body = crate::ApiResponse<CatalogPage>),
        (status = 400, description = "Invalid parameters", body = crate::errors::ErrorResponse),
        (status = 502, description = "Distributor error", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .distributor
        .search_products(SearchQuery {
            keyword: params.keyword,
            vendor: params.vendor,
            page_number: params.page_number,
            page_size: params.page_size,
        })
        .await?;

    Ok(Json(ApiResponse::success(page)))
}

/// Live per-sku price and availability; the 1..=50 sku bound is a hard input
/// contract enforced before any upstream call.
#[utoipa::path(
    post,
    path = "/api/v1/catalog/pricing",
    request_body = PricingRequest,
    responses(
        (status = 200, description = "Per-sku pricing", body = crate::ApiResponse<Vec<SkuPricing>>),
        (status = 400, description = "Sku count out of bounds", body = crate::errors::ErrorResponse),
        (status = 502, description = "Distributor error", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn price_and_availability(
    State(state): State<AppState>,
    Json(request): Json<PricingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let pricing = state.distributor.price_and_availability(request.skus).await?;
    Ok(Json(ApiResponse::success(pricing)))
}
