mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storegate::clients::credentials::CredentialCache;
use storegate::clients::distributor::{
    DistributorApi, DistributorClient, DistributorTokenExchange, SearchQuery,
};
use storegate::errors::ServiceError;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DistributorClient {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let exchange = Arc::new(DistributorTokenExchange::new(
        http.clone(),
        server.uri(),
        "test-client".into(),
        "test-secret".into(),
    ));
    let credentials = Arc::new(CredentialCache::new(exchange, Duration::ZERO));
    DistributorClient::new(
        http,
        server.uri(),
        "ACC-100".into(),
        "DE".into(),
        credentials,
    )
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn one_token_fetch_serves_many_catalog_calls() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/catalog/products"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("x-account-number", "ACC-100"))
        .and(header("x-country-code", "DE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [
                { "sku": "A1", "name": "Widget", "vendor": "Acme", "shortDescription": "A widget" }
            ],
            "totalResults": 1
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let first = client.search_products(SearchQuery::default()).await.unwrap();
    let second = client.search_products(SearchQuery::default()).await.unwrap();

    assert_eq!(first.products.len(), 1);
    assert_eq!(first.products[0].sku, "A1");
    assert_eq!(first.products[0].description.as_deref(), Some("A widget"));
    assert_eq!(first.total_results, 1);
    assert_eq!(second.products.len(), 1);
}

#[tokio::test]
async fn search_defaults_and_filters_appear_in_the_query() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/catalog/products"))
        .and(query_param("pageNumber", "2"))
        .and(query_param("pageSize", "24"))
        .and(query_param("keyword", "widget"))
        .and(query_param("vendor", "Acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [],
            "totalResults": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client
        .search_products(SearchQuery {
            keyword: Some("widget".into()),
            vendor: Some("Acme".into()),
            page_number: Some(2),
            page_size: None,
        })
        .await
        .unwrap();

    assert_eq!(page.page_number, 2);
    assert_eq!(page.page_size, 24);
}

#[tokio::test]
async fn oversized_page_size_is_clamped_to_the_maximum() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/catalog/products"))
        .and(query_param("pageSize", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [],
            "totalResults": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client
        .search_products(SearchQuery {
            page_size: Some(500),
            ..SearchQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.page_size, 100);
}

#[tokio::test]
async fn zero_page_number_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let result = client
        .search_products(SearchQuery {
            page_number: Some(0),
            ..SearchQuery::default()
        })
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn sku_count_bounds_are_enforced_before_any_network_call() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let empty = client.price_and_availability(vec![]).await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));

    let too_many: Vec<String> = (0..51).map(|i| format!("SKU-{}", i)).collect();
    let result = client.price_and_availability(too_many).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // The bound counts the list as submitted, duplicates included.
    let mut padded = vec!["A1".to_string(); 50];
    padded.push("B2".to_string());
    padded.push("A1".to_string());
    let result = client.price_and_availability(padded).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // Not even a token request went out.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_skus_are_collapsed_for_the_upstream_call() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/catalog/pricing"))
        .and(body_json(json!({ "skus": ["A1", "B2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "sku": "A1",
                    "price": "19.995",
                    "currency": "EUR",
                    "availability": { "available": true, "totalQuantity": 12 }
                },
                {
                    "sku": "B2",
                    "price": "5.00",
                    "availability": { "available": false, "totalQuantity": 0 }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let skus = vec!["A1".to_string(), "B2".to_string(), "A1".to_string()];

    let pricing = client.price_and_availability(skus).await.unwrap();

    assert_eq!(pricing.len(), 2);
    assert_eq!(pricing[0].sku, "A1");
    assert_eq!(pricing[0].price, dec!(19.995));
    assert_eq!(pricing[0].currency, "EUR");
    assert!(pricing[0].in_stock);
    assert_eq!(pricing[0].total_quantity, 12);
    assert_eq!(pricing[1].sku, "B2");
    assert_eq!(pricing[1].currency, "USD");
    assert!(!pricing[1].in_stock);
}

#[tokio::test]
async fn upstream_failure_surfaces_status_and_body() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/catalog/products"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance window"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.search_products(SearchQuery::default()).await;

    assert_matches!(
        result,
        Err(ServiceError::UpstreamError { status: 503, body }) => {
            assert_eq!(body, "maintenance window");
        }
    );
}

#[tokio::test]
async fn failed_token_exchange_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.search_products(SearchQuery::default()).await;

    assert_matches!(result, Err(ServiceError::AuthError(_)));
}
