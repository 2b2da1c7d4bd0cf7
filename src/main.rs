use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::http::HeaderValue;
use axum::Router;
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use storegate as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = Arc::new(api::db::establish_connection(&cfg).await?);
    if cfg.auto_migrate {
        api::db::run_migrations(&db).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    // Events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Outbound HTTP clients share one connection pool with a bounded timeout;
    // a hung distributor or processor call fails the request, never the process.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let exchange = Arc::new(api::clients::distributor::DistributorTokenExchange::new(
        http.clone(),
        cfg.distributor_auth_url.clone(),
        cfg.distributor_client_id.clone(),
        cfg.distributor_client_secret.clone(),
    ));
    let credentials = Arc::new(api::clients::credentials::CredentialCache::new(
        exchange,
        Duration::from_secs(cfg.token_safety_margin_secs),
    ));
    let distributor = Arc::new(api::clients::distributor::DistributorClient::new(
        http.clone(),
        cfg.distributor_base_url.clone(),
        cfg.distributor_account_number.clone(),
        cfg.distributor_country_code.clone(),
        credentials,
    ));
    let payments = Arc::new(api::clients::payments::HttpPaymentProcessor::new(
        http,
        cfg.payment_base_url.clone(),
        cfg.payment_secret_key.clone(),
    ));

    let checkout = Arc::new(api::services::checkout::CheckoutService::new(
        payments,
        cfg.public_base_url.clone(),
    ));
    let orders = Arc::new(api::services::orders::OrderService::new(
        db.clone(),
        event_sender.clone(),
    ));
    let distributor_events = Arc::new(
        api::services::distributor_events::DistributorEventService::new(db.clone()),
    );

    let app_state = api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        distributor,
        checkout,
        orders,
        distributor_events,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS (development environment or explicit override)");
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        anyhow::bail!("missing CORS configuration");
    };

    let app = Router::<api::AppState>::new()
        .route("/", axum::routing::get(|| async { "storegate up" }))
        .merge(api::health_routes())
        .nest("/api/v1", api::api_v1_routes())
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(cors_layer)
        .with_state(app_state);

    let addr = SocketAddr::new(cfg.host.parse()?, cfg.port);
    info!("storegate listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
