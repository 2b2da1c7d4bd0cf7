#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request, Response},
    Router,
};
use hmac::{Hmac, Mac};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use storegate::{
    clients::{
        credentials::CredentialCache,
        distributor::{DistributorClient, DistributorTokenExchange},
        payments::HttpPaymentProcessor,
    },
    config::AppConfig,
    events::EventSender,
    services::{
        checkout::CheckoutService, distributor_events::DistributorEventService,
        orders::OrderService,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const PAYMENT_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const DISTRIBUTOR_SECRET: &str = "dist_test_secret";

pub fn test_config(distributor_url: &str, auth_url: &str, payment_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "debug".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        http_timeout_secs: 5,
        distributor_base_url: distributor_url.into(),
        distributor_auth_url: auth_url.into(),
        distributor_client_id: "test-client".into(),
        distributor_client_secret: "test-secret".into(),
        distributor_secret_key: DISTRIBUTOR_SECRET.into(),
        distributor_account_number: "ACC-100".into(),
        distributor_country_code: "DE".into(),
        token_safety_margin_secs: 0,
        payment_base_url: payment_url.into(),
        payment_secret_key: "sk_test".into(),
        payment_webhook_secret: PAYMENT_WEBHOOK_SECRET.into(),
        payment_webhook_tolerance_secs: 300,
        public_base_url: "https://shop.example.test".into(),
    }
}

/// In-memory sqlite with migrations applied. A single pooled connection keeps
/// every query on the same in-memory database.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connect");
    storegate::migrator::Migrator::up(&db, None)
        .await
        .expect("migrations");
    Arc::new(db)
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub events: mpsc::Receiver<storegate::events::Event>,
}

impl TestApp {
    /// Wires the full application against the given upstream base URLs
    /// (typically wiremock servers).
    pub async fn new(distributor_url: &str, auth_url: &str, payment_url: &str) -> Self {
        let config = test_config(distributor_url, auth_url, payment_url);
        let db = test_db().await;

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .expect("reqwest client");

        let exchange = Arc::new(DistributorTokenExchange::new(
            http.clone(),
            config.distributor_auth_url.clone(),
            config.distributor_client_id.clone(),
            config.distributor_client_secret.clone(),
        ));
        let credentials = Arc::new(CredentialCache::new(
            exchange,
            Duration::from_secs(config.token_safety_margin_secs),
        ));
        let distributor = Arc::new(DistributorClient::new(
            http.clone(),
            config.distributor_base_url.clone(),
            config.distributor_account_number.clone(),
            config.distributor_country_code.clone(),
            credentials,
        ));
        let payments = Arc::new(HttpPaymentProcessor::new(
            http,
            config.payment_base_url.clone(),
            config.payment_secret_key.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            payments,
            config.public_base_url.clone(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let distributor_events = Arc::new(DistributorEventService::new(db.clone()));

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            event_sender,
            distributor,
            checkout,
            orders,
            distributor_events,
        };

        let router = Router::new()
            .merge(storegate::health_routes())
            .nest("/api/v1", storegate::api_v1_routes())
            .with_state(state);

        Self {
            router,
            db,
            config,
            events: event_rx,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        headers: &[(&str, String)],
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Posts a raw body with a valid payment-webhook signature.
    pub async fn post_signed_payment_webhook(&self, raw_body: &str) -> Response<Body> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_payment(PAYMENT_WEBHOOK_SECRET, &timestamp, raw_body.as_bytes());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/payments")
            .header("content-type", "application/json")
            .header("x-timestamp", &timestamp)
            .header("x-signature", &signature)
            .body(Body::from(raw_body.to_string()))
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }
}

pub fn sign_payment(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn sign_distributor(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub async fn response_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response<Body>) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8_lossy(&bytes).into_owned()
}
