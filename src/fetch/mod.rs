//! Fetch strategy pipeline: an ordered list of strategies evaluated by one
//! loop with a uniform stop condition (content obtained, or plan
//! exhausted). Network-level failures advance the plan; a parse failure on
//! successfully fetched content is terminal for the attempt.

use chrono::Utc;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::error::Result;
use crate::extract;
use crate::models::{FailureKind, FetchOutcome, Product};

#[cfg(feature = "browser")]
pub mod browser;
pub mod client;

/// One concrete method of retrieving page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    CookieAugmented,
    BrowserRendered,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::Direct => "direct",
            Strategy::CookieAugmented => "cookie-augmented",
            Strategy::BrowserRendered => "browser-rendered",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct PageContent {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

/// Network-level failure of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Network(String),
    Timeout,
    Blocked { status: u16 },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) => FailureKind::Network,
            FetchError::Timeout => FailureKind::Timeout,
            FetchError::Blocked { .. } => FailureKind::Blocked,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            FetchError::Network(detail) => detail.clone(),
            FetchError::Timeout => "request timed out".to_string(),
            FetchError::Blocked { status } => format!("blocked (HTTP {status})"),
        }
    }
}

/// Outcome of a full per-product check, plus the page title when one was
/// seen (for product auto-naming; not part of the stored outcome).
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub outcome: FetchOutcome,
    pub page_title: Option<String>,
}

pub struct FetchPipeline {
    client: reqwest::Client,
    config: FetcherConfig,
    #[cfg(feature = "browser")]
    browser: Option<browser::BrowserFetcher>,
}

impl FetchPipeline {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = client::build_client(&config)?;

        #[cfg(feature = "browser")]
        let browser = match browser::BrowserFetcher::launch(&config) {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!("browser strategy unavailable: {e}");
                None
            }
        };

        Ok(Self {
            client,
            config,
            #[cfg(feature = "browser")]
            browser,
        })
    }

    /// The ordered strategy plan for one product. Skip conditions are
    /// computed here, up front: no cookie configured for the store, or no
    /// browser available in this build/environment.
    pub fn plan(&self, product: &Product) -> Vec<Strategy> {
        let mut plan = vec![Strategy::Direct];

        if self.config.cookies.for_store(product.store).is_some() {
            plan.push(Strategy::CookieAugmented);
        }

        #[cfg(feature = "browser")]
        if self.browser.is_some() {
            plan.push(Strategy::BrowserRendered);
        }

        plan
    }

    /// Run the strategy plan until content is obtained or the plan is
    /// exhausted; exhaustion reports the last observed error.
    pub async fn fetch_page(&self, product: &Product) -> std::result::Result<PageContent, FetchError> {
        let mut last_error = FetchError::Network("no fetch strategy available".to_string());

        for strategy in self.plan(product) {
            debug!(product = %product.id, %strategy, "fetch attempt");
            match self.attempt(strategy, product).await {
                Ok(page) => {
                    debug!(product = %product.id, %strategy, status = page.status, "content obtained");
                    return Ok(page);
                }
                Err(e) => {
                    debug!(product = %product.id, %strategy, error = %e.detail(), "strategy failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Produce exactly one outcome for this product. Infallible by design:
    /// network, block and parse failures all fold into the outcome.
    pub async fn check(&self, product: &Product) -> CheckResult {
        let ts = Utc::now();

        match self.fetch_page(product).await {
            Ok(page) => match extract::extract_price(product.store, &page.body) {
                Ok(price) => CheckResult {
                    outcome: FetchOutcome::price(
                        &product.id,
                        ts,
                        price.amount,
                        price.currency,
                        price.availability,
                    ),
                    page_title: price.title,
                },
                // Content was fetched but not parsable: terminal for this
                // attempt, no further strategies.
                Err(parse) => CheckResult {
                    outcome: FetchOutcome::failure(&product.id, ts, FailureKind::Parse, parse.detail),
                    page_title: parse.title,
                },
            },
            Err(e) => CheckResult {
                outcome: FetchOutcome::failure(&product.id, ts, e.kind(), e.detail()),
                page_title: None,
            },
        }
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        product: &Product,
    ) -> std::result::Result<PageContent, FetchError> {
        match strategy {
            Strategy::Direct => self.http_fetch(product, None).await,
            Strategy::CookieAugmented => {
                let cookie = self.config.cookies.for_store(product.store);
                self.http_fetch(product, cookie).await
            }
            Strategy::BrowserRendered => self.browser_fetch(product).await,
        }
    }

    async fn http_fetch(
        &self,
        product: &Product,
        cookie: Option<&str>,
    ) -> std::result::Result<PageContent, FetchError> {
        let mut request = self
            .client
            .get(&product.url)
            .headers(client::headers_for_store(product.store, &self.config.user_agent));

        if let Some(raw) = cookie {
            let value = client::normalize_cookie(raw);
            request = request.header(reqwest::header::COOKIE, value);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(FetchError::Blocked {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {}", status.as_u16())));
        }
        // Challenge pages frequently come back 200.
        if client::looks_like_block(&body) {
            return Err(FetchError::Blocked {
                status: status.as_u16(),
            });
        }

        Ok(PageContent {
            status: status.as_u16(),
            body,
            final_url,
        })
    }

    #[cfg(feature = "browser")]
    async fn browser_fetch(
        &self,
        product: &Product,
    ) -> std::result::Result<PageContent, FetchError> {
        let Some(browser) = &self.browser else {
            return Err(FetchError::Network("browser unavailable".to_string()));
        };

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let page = tokio::time::timeout(timeout, browser.fetch(&product.url, &self.config.user_agent))
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if client::looks_like_block(&page.body) {
            return Err(FetchError::Blocked { status: page.status });
        }

        Ok(page)
    }

    #[cfg(not(feature = "browser"))]
    async fn browser_fetch(
        &self,
        _product: &Product,
    ) -> std::result::Result<PageContent, FetchError> {
        Err(FetchError::Network("browser support not compiled in".to_string()))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}
