// Shared helpers for the integration tests.

pub mod history_tests;
pub mod scheduler_tests;

use std::sync::Arc;

use chrono::DateTime;
use rust_decimal::Decimal;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use el_price_watcher::config::{FetcherConfig, SchedulerConfig};
use el_price_watcher::db::Database;
use el_price_watcher::fetch::FetchPipeline;
use el_price_watcher::models::{Availability, FetchOutcome, NewProduct, Product, Store};

/// An x-kom-style product page advertising 1999.00 PLN, in stock.
pub const PRODUCT_PAGE_1999_PLN: &str = r#"<html><head>
  <title>Test GPU - x-kom</title>
  <script type="application/ld+json">
    {"@context":"https://schema.org","@type":"Product","name":"Test GPU",
     "offers":{"@type":"Offer","price":"1999.00","priceCurrency":"PLN",
               "availability":"https://schema.org/InStock"}}
  </script>
</head><body><div class="price">1999.00 PLN</div></body></html>"#;

pub fn fetcher_config(timeout_secs: u64) -> FetcherConfig {
    FetcherConfig {
        timeout_secs,
        ..FetcherConfig::default()
    }
}

pub fn test_pipeline(timeout_secs: u64) -> Arc<FetchPipeline> {
    Arc::new(FetchPipeline::new(fetcher_config(timeout_secs)).expect("pipeline"))
}

pub fn scheduler_config(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        interval_secs: 1,
        workers,
    }
}

pub async fn test_db() -> Database {
    Database::open_in_memory().await.expect("in-memory database")
}

/// Start a mock server answering every request with the given page.
pub async fn serve_page(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(&server)
        .await;
    server
}

pub fn page_url(server: &MockServer) -> String {
    format!("{}/p/test.html", server.uri())
}

/// Register a product pointing at a test URL. The store is overridden
/// because mock-server hosts never match a real store's host rules.
pub async fn add_product(db: &Database, url: &str, store: Store, name: Option<&str>) -> Product {
    db.add_product(NewProduct {
        url: url.to_string(),
        name: name.map(|n| n.to_string()),
        store: Some(store),
    })
    .await
    .expect("add product")
}

pub fn price_outcome(product_id: &str, ts: i64, cents: i64) -> FetchOutcome {
    FetchOutcome::price(
        product_id,
        DateTime::from_timestamp(ts, 0).expect("valid timestamp"),
        Decimal::new(cents, 2),
        Some("PLN".to_string()),
        Availability::InStock,
    )
}
