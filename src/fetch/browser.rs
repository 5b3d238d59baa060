//! Browser-rendered fetch strategy, compiled in with the `browser` feature.
//! Failure to launch Chrome at startup just removes the strategy from every
//! plan; it never fails the pipeline.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use headless_chrome::{Browser, LaunchOptions};

use super::PageContent;
use crate::config::FetcherConfig;

pub struct BrowserFetcher {
    browser: Arc<Browser>,
}

impl BrowserFetcher {
    pub fn launch(config: &FetcherConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Load the page in a fresh tab and return the post-script DOM. CDP
    /// calls are blocking, so the whole interaction runs off the async
    /// runtime.
    pub async fn fetch(&self, url: &str, user_agent: &str) -> Result<PageContent> {
        let browser = Arc::clone(&self.browser);
        let url = url.to_string();
        let user_agent = user_agent.to_string();

        tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| anyhow!("Failed to create tab: {}", e))?;

            tab.set_user_agent(&user_agent, None, None)
                .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

            tab.navigate_to(&url)
                .map_err(|e| anyhow!("Navigation failed: {}", e))?;
            tab.wait_until_navigated()
                .map_err(|e| anyhow!("Page load failed: {}", e))?;

            let body = tab
                .get_content()
                .map_err(|e| anyhow!("Failed to get page content: {}", e))?;

            let final_url = {
                let u = tab.get_url();
                if u.is_empty() { url.clone() } else { u }
            };

            // Close tab to free resources
            let _ = tab.close(true);

            Ok(PageContent {
                status: 200,
                body,
                final_url,
            })
        })
        .await
        .map_err(|e| anyhow!("Browser task failed: {}", e))?
    }
}
