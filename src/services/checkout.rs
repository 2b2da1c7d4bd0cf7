use crate::clients::payments::{
    CreateSessionRequest, PaymentProcessor, SessionLineItem,
};
use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Metadata key under which the order-reconstruction payload travels through
/// the processor's opaque metadata channel.
pub const ORDER_PAYLOAD_KEY: &str = "order_payload";

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("unit_price must not be negative".into());
        Err(err)
    }
}

/// One cart line, immutable once submitted to checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartItem {
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub vendor: String,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInfo {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub locality: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "items must not be empty"))]
    pub items: Vec<CartItem>,
    #[validate]
    pub customer: CustomerInfo,
    #[validate]
    pub shipping_address: ShippingAddress,
}

/// What the storefront gets back: where to send the shopper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
}

/// Snapshot embedded in session metadata; sufficient to create the order when
/// the completion event arrives, with no second round trip to any cart store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub customer: CustomerInfo,
    pub shipping_address: ShippingAddress,
    pub items: Vec<CartItem>,
}

/// Converts a decimal price to the smallest currency unit, rounding the
/// midpoint away from zero: 19.995 becomes 2000 cents. Part of the checkout
/// contract, covered by tests.
pub fn to_cents(unit_price: Decimal) -> Result<i64, ServiceError> {
    (unit_price * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("unit_price {} out of range", unit_price))
        })
}

/// Converts a cart into a processor-hosted checkout session. Order creation
/// itself happens only when the payment completion event is consumed.
pub struct CheckoutService {
    payments: Arc<dyn PaymentProcessor>,
    public_base_url: String,
}

impl CheckoutService {
    pub fn new(payments: Arc<dyn PaymentProcessor>, public_base_url: String) -> Self {
        Self {
            payments,
            public_base_url,
        }
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        request.validate()?;

        let mut line_items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            item.validate()?;
            line_items.push(SessionLineItem {
                name: item.name.clone(),
                sku: item.sku.clone(),
                unit_amount: to_cents(item.unit_price)?,
                quantity: item.quantity,
            });
        }

        let payload = OrderPayload {
            customer: request.customer.clone(),
            shipping_address: request.shipping_address.clone(),
            items: request.items.clone(),
        };
        let mut metadata = HashMap::new();
        metadata.insert(
            ORDER_PAYLOAD_KEY.to_string(),
            serde_json::to_string(&payload)
                .map_err(|e| ServiceError::InternalError(format!("payload encoding: {}", e)))?,
        );

        let session = self
            .payments
            .create_session(CreateSessionRequest {
                line_items,
                customer_email: request.customer.email.clone(),
                success_url: format!("{}/checkout/success", self.public_base_url),
                cancel_url: format!("{}/checkout/cancelled", self.public_base_url),
                metadata,
            })
            .await?;

        info!(session_id = %session.id, "checkout session created");

        Ok(CheckoutResponse {
            session_id: session.id,
            redirect_url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::payments::ProcessorSession;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProcessor {
        last_request: Mutex<Option<CreateSessionRequest>>,
    }

    impl RecordingProcessor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl PaymentProcessor for RecordingProcessor {
        async fn create_session(
            &self,
            request: CreateSessionRequest,
        ) -> Result<ProcessorSession, ServiceError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(ProcessorSession {
                id: "sess_test".into(),
                url: "https://pay.example.test/s/sess_test".into(),
            })
        }
    }

    fn widget_cart() -> CheckoutRequest {
        CheckoutRequest {
            items: vec![CartItem {
                sku: "A1".into(),
                name: "Widget".into(),
                vendor: "Acme".into(),
                unit_price: dec!(19.995),
                quantity: 2,
            }],
            customer: CustomerInfo {
                name: "Ada Lovelace".into(),
                email: "ada@example.test".into(),
                phone: "+44 20 7946 0000".into(),
            },
            shipping_address: ShippingAddress {
                street: "1 Analytical Way".into(),
                locality: "Marylebone".into(),
                postal_code: "W1U 6TU".into(),
                city: "London".into(),
                region: "London".into(),
                notes: None,
            },
        }
    }

    #[test]
    fn cent_rounding_is_midpoint_away_from_zero() {
        assert_eq!(to_cents(dec!(19.995)).unwrap(), 2000);
        assert_eq!(to_cents(dec!(19.994)).unwrap(), 1999);
        assert_eq!(to_cents(dec!(0.005)).unwrap(), 1);
        assert_eq!(to_cents(dec!(10)).unwrap(), 1000);
        assert_eq!(to_cents(dec!(0)).unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_the_processor_is_called() {
        let processor = RecordingProcessor::new();
        let service = CheckoutService::new(processor.clone(), "https://shop.test".into());

        let mut request = widget_cart();
        request.items.clear();

        let result = service.create_checkout(request).await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
        assert!(processor.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn line_items_carry_rounded_cent_amounts() {
        let processor = RecordingProcessor::new();
        let service = CheckoutService::new(processor.clone(), "https://shop.test".into());

        let response = service.create_checkout(widget_cart()).await.unwrap();
        assert_eq!(response.session_id, "sess_test");

        let sent = processor.last_request.lock().unwrap().take().unwrap();
        assert_eq!(
            sent.line_items,
            vec![SessionLineItem {
                name: "Widget".into(),
                sku: "A1".into(),
                unit_amount: 2000,
                quantity: 2,
            }]
        );
        assert_eq!(sent.customer_email, "ada@example.test");
    }

    #[tokio::test]
    async fn metadata_payload_round_trips_items_exactly() {
        let processor = RecordingProcessor::new();
        let service = CheckoutService::new(processor.clone(), "https://shop.test".into());

        let request = widget_cart();
        let original_items = request.items.clone();
        service.create_checkout(request).await.unwrap();

        let sent = processor.last_request.lock().unwrap().take().unwrap();
        let raw = sent.metadata.get(ORDER_PAYLOAD_KEY).unwrap();
        let payload: OrderPayload = serde_json::from_str(raw).unwrap();

        // No precision loss: 19.995 survives the metadata channel untouched.
        assert_eq!(payload.items, original_items);
        assert_eq!(payload.items[0].unit_price, dec!(19.995));
        assert_eq!(payload.customer.email, "ada@example.test");
        assert_eq!(payload.shipping_address.city, "London");
    }
}
