use crate::errors::ServiceError;
use crate::services::checkout::{CheckoutRequest, CheckoutResponse};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Converts the submitted cart into a processor-hosted checkout session and
/// returns the redirect URL. No order exists until payment is confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout session created", body = crate::ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart or invalid fields", body = crate::errors::ErrorResponse),
        (status = 502, description = "Processor rejected session creation", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.checkout.create_checkout(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}
