use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;

use super::{select_content, DocumentFetcher};
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::types::DocumentRef;

/// Renders documents in headless Chrome through a WebDriver endpoint
/// (e.g. chromedriver on localhost:9515). One browser session per document.
pub struct WebDriverFetcher {
    webdriver_url: String,
    content_selector: String,
    render_wait: Duration,
}

impl WebDriverFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            content_selector: config.content_selector.clone(),
            render_wait: Duration::from_millis(config.render_wait_ms),
        }
    }

    async fn render(&self, driver: &WebDriver, url: &str) -> WebDriverResult<String> {
        driver.goto(url).await?;

        // Page shell first, then the content container once scripts have run
        driver.query(By::Tag("body")).first().await?;
        tokio::time::sleep(self.render_wait).await;
        driver
            .query(By::Css(self.content_selector.as_str()))
            .first()
            .await?;

        driver.source().await
    }
}

#[async_trait]
impl DocumentFetcher for WebDriverFetcher {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        tracing::debug!(document = %document.id, "Rendering document with WebDriver");

        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()
            .map_err(|e| FetchError::Render(e.to_string()))?;

        let driver = WebDriver::new(self.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| FetchError::Render(format!("failed to connect to WebDriver: {}", e)))?;

        let result = self.render(&driver, &document.id).await;

        // Close the browser even when rendering failed
        if let Err(e) = driver.quit().await {
            tracing::warn!(error = %e, "Failed to quit browser");
        }

        let page_source = result.map_err(|e| FetchError::Render(e.to_string()))?;
        select_content(&page_source, &self.content_selector)
    }
}
