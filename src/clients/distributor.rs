use crate::clients::credentials::{
    CredentialCache, CredentialError, CredentialExchange, IssuedCredential,
};
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_PRICING_SKUS: usize = 50;

/// Catalog search parameters. An out-of-range `page_size` is clamped into
/// `1..=100` rather than rejected; `page_number` has no sane clamp target and
/// zero is rejected.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub vendor: Option<String>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

/// Normalized catalog page returned to the storefront.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogPage {
    pub products: Vec<ProductSummary>,
    pub total_results: u64,
    pub page_number: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub sku: String,
    pub name: String,
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized per-sku price and availability.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkuPricing {
    pub sku: String,
    pub price: Decimal,
    pub currency: String,
    pub in_stock: bool,
    pub total_quantity: i64,
}

/// Narrow interface over the distributor's catalog and pricing endpoints,
/// substitutable in tests.
#[async_trait]
pub trait DistributorApi: Send + Sync {
    async fn search_products(&self, query: SearchQuery) -> Result<CatalogPage, ServiceError>;

    async fn price_and_availability(
        &self,
        skus: Vec<String>,
    ) -> Result<Vec<SkuPricing>, ServiceError>;
}

// Upstream wire shapes; only the consumed fields are modeled.

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamSearchResponse {
    #[serde(default)]
    products: Vec<UpstreamProduct>,
    #[serde(default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamProduct {
    sku: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    vendor: String,
    #[serde(default)]
    short_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpstreamPricingRequest<'a> {
    skus: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamPricingResponse {
    #[serde(default)]
    items: Vec<UpstreamPricingItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamPricingItem {
    sku: String,
    price: Decimal,
    #[serde(default = "default_currency")]
    currency: String,
    availability: UpstreamAvailability,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamAvailability {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    total_quantity: i64,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Client-credentials exchange against the distributor's identity endpoint.
pub struct DistributorTokenExchange {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
}

impl DistributorTokenExchange {
    pub fn new(
        http: reqwest::Client,
        auth_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            auth_url,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl CredentialExchange for DistributorTokenExchange {
    async fn exchange(&self) -> Result<IssuedCredential, CredentialError> {
        let response = self
            .http
            .post(format!("{}/oauth/token", self.auth_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Exchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Exchange(format!("malformed token response: {}", e)))?;

        Ok(IssuedCredential {
            access_token: token.access_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }
}

/// HTTP client for the distributor API. Every call obtains a cached token,
/// carries the fixed account/region headers and a fresh correlation id, and
/// runs under the reqwest client's bounded timeout.
pub struct DistributorClient {
    http: reqwest::Client,
    base_url: String,
    account_number: String,
    country_code: String,
    credentials: Arc<CredentialCache>,
}

impl DistributorClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        account_number: String,
        country_code: String,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        Self {
            http,
            base_url,
            account_number,
            country_code,
            credentials,
        }
    }

    async fn authed_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ServiceError> {
        let token = self.credentials.get_token().await?;
        let correlation_id = Uuid::new_v4();
        debug!(%correlation_id, "calling distributor API");
        Ok(builder
            .bearer_auth(token)
            .header("x-account-number", &self.account_number)
            .header("x-country-code", &self.country_code)
            .header("x-correlation-id", correlation_id.to_string()))
    }

    fn transport_error(err: reqwest::Error) -> ServiceError {
        // Status 0 marks a transport-level failure (timeout, connect error).
        ServiceError::UpstreamError {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            body: err.to_string(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::UpstreamError {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DistributorApi for DistributorClient {
    #[instrument(skip(self))]
    async fn search_products(&self, query: SearchQuery) -> Result<CatalogPage, ServiceError> {
        let page_number = query.page_number.unwrap_or(1);
        if page_number == 0 {
            return Err(ServiceError::ValidationError(
                "page_number must be at least 1".into(),
            ));
        }
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut params: Vec<(&str, String)> = vec![
            ("pageNumber", page_number.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(("keyword", keyword.clone()));
        }
        if let Some(vendor) = &query.vendor {
            params.push(("vendor", vendor.clone()));
        }

        let request = self
            .authed_request(
                self.http
                    .get(format!("{}/catalog/products", self.base_url))
                    .query(&params),
            )
            .await?;

        let response = request.send().await.map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        let status = response.status().as_u16();
        let upstream: UpstreamSearchResponse = response.json().await.map_err(|e| {
            ServiceError::UpstreamError {
                status,
                body: format!("malformed search response: {}", e),
            }
        })?;

        Ok(CatalogPage {
            products: upstream
                .products
                .into_iter()
                .map(|p| ProductSummary {
                    sku: p.sku,
                    name: p.name,
                    vendor: p.vendor,
                    description: p.short_description,
                })
                .collect(),
            total_results: upstream.total_results,
            page_number,
            page_size,
        })
    }

    #[instrument(skip(self, skus), fields(sku_count = skus.len()))]
    async fn price_and_availability(
        &self,
        skus: Vec<String>,
    ) -> Result<Vec<SkuPricing>, ServiceError> {
        // The count contract applies to the list as submitted and is enforced
        // before any network call.
        if skus.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one sku is required".into(),
            ));
        }
        if skus.len() > MAX_PRICING_SKUS {
            return Err(ServiceError::ValidationError(format!(
                "at most {} skus per request, got {}",
                MAX_PRICING_SKUS,
                skus.len()
            )));
        }

        // Dedup preserving order for the upstream call.
        let mut unique: Vec<String> = Vec::with_capacity(skus.len());
        for sku in skus {
            if !unique.contains(&sku) {
                unique.push(sku);
            }
        }

        let request = self
            .authed_request(
                self.http
                    .post(format!("{}/catalog/pricing", self.base_url))
                    .json(&UpstreamPricingRequest { skus: &unique }),
            )
            .await?;

        let response = request.send().await.map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        let status = response.status().as_u16();
        let upstream: UpstreamPricingResponse = response.json().await.map_err(|e| {
            ServiceError::UpstreamError {
                status,
                body: format!("malformed pricing response: {}", e),
            }
        })?;

        Ok(upstream
            .items
            .into_iter()
            .map(|item| SkuPricing {
                sku: item.sku,
                price: item.price,
                currency: item.currency,
                in_stock: item.availability.available,
                total_quantity: item.availability.total_quantity,
            })
            .collect())
    }
}
