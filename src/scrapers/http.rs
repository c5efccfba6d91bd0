use async_trait::async_trait;
use reqwest::Client;

use super::{select_content, DocumentFetcher};
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::types::DocumentRef;

/// Plain HTTP fetcher for pages whose content is server-rendered
pub struct HttpFetcher {
    client: Client,
    content_selector: String,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            content_selector: config.content_selector.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        tracing::debug!(document = %document.id, "Fetching document");

        let response = self.client.get(&document.id).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { secs: self.timeout_secs }
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let html = response.text().await?;
        select_content(&html, &self.content_selector)
    }
}
