mod http;
mod selenium;

pub use http::HttpFetcher;
pub use selenium::WebDriverFetcher;

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::config::{FetchConfig, Renderer};
use crate::error::FetchError;
use crate::types::DocumentRef;

/// Returns the rendered content of one document.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError>;
}

/// Build the fetcher selected by `fetch.renderer`.
pub fn fetcher_for(config: &FetchConfig) -> Result<Arc<dyn DocumentFetcher>, reqwest::Error> {
    match config.renderer {
        Renderer::Http => Ok(Arc::new(HttpFetcher::new(config)?)),
        Renderer::WebDriver => Ok(Arc::new(WebDriverFetcher::new(config))),
    }
}

/// Cut the content container out of a full page
pub(crate) fn select_content(html: &str, content_selector: &str) -> Result<String, FetchError> {
    let missing = || FetchError::MissingContent {
        selector: content_selector.to_string(),
    };

    let selector = Selector::parse(content_selector).map_err(|_| missing())?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|element| element.html())
        .ok_or_else(missing)
}
