use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "storegate",
        description = "Integration gateway: distributor catalog, payment checkout, order store"
    ),
    paths(
        crate::handlers::catalog::search_products,
        crate::handlers::catalog::price_and_availability,
        crate::handlers::checkout::create_checkout,
        crate::handlers::webhooks::payment_webhook,
        crate::handlers::webhooks::distributor_webhook,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::clients::distributor::CatalogPage,
        crate::clients::distributor::ProductSummary,
        crate::clients::distributor::SkuPricing,
        crate::handlers::catalog::PricingRequest,
        crate::services::checkout::CartItem,
        crate::services::checkout::CustomerInfo,
        crate::services::checkout::ShippingAddress,
        crate::services::checkout::CheckoutRequest,
        crate::services::checkout::CheckoutResponse,
        crate::handlers::orders::OrderResponse,
        crate::entities::order::OrderStatus,
        crate::entities::order::DistributorStatus,
    )),
    tags(
        (name = "Catalog", description = "Distributor catalog pass-through"),
        (name = "Checkout", description = "Payment processor checkout sessions"),
        (name = "Webhooks", description = "Inbound payment and distributor events"),
        (name = "Orders", description = "Durable order records")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
