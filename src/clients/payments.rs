use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

/// One line of a processor checkout session; `unit_amount` is in the smallest
/// currency unit (cents).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionLineItem {
    pub name: String,
    pub sku: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Request for a processor-hosted checkout session. `metadata` is the opaque
/// channel echoed back verbatim on the completion event.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Processor-assigned session handle.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSession {
    pub id: String,
    pub url: String,
}

/// Narrow interface over the payment processor, substitutable in tests.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProcessorSession, ServiceError>;
}

/// HTTP client for the payment processor's checkout-session endpoint.
pub struct HttpPaymentProcessor {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentProcessor {
    pub fn new(http: reqwest::Client, base_url: String, secret_key: String) -> Self {
        Self {
            http,
            base_url,
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    #[instrument(skip(self, request), fields(line_items = request.line_items.len()))]
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProcessorSession, ServiceError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::CheckoutCreationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::CheckoutCreationError(format!(
                "processor returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::CheckoutCreationError(format!("malformed session response: {}", e)))
    }
}
