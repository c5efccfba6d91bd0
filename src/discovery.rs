//! Document Discovery Module
//!
//! Lists newsletter issues from the site's sitemap:
//! - sitemap index traversal (nested sitemaps, each fetched once)
//! - article path filtering
//! - recency window, newest first, optional document cap

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::types::DocumentRef;

/// Source of candidate documents for a run
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Documents published inside the window, most recent first.
    async fn discover(&self, window: &DiscoveryWindow) -> Result<Vec<DocumentRef>, DiscoveryError>;
}

#[derive(Debug, Clone)]
pub struct DiscoveryWindow {
    pub lookback_days: u32,
    /// 0 = unlimited
    pub max_documents: usize,
    pub now: DateTime<Utc>,
}

impl DiscoveryWindow {
    pub fn new(lookback_days: u32, max_documents: usize) -> Self {
        Self {
            lookback_days,
            max_documents,
            now: Utc::now(),
        }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.lookback_days))
    }
}

/// One `<url>` entry of a sitemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    UrlSet(Vec<SitemapEntry>),
    /// Locations of nested sitemaps
    Index(Vec<String>),
}

/// Catalog backed by the site's sitemap.xml
pub struct SitemapCatalog {
    client: Client,
    catalog_url: String,
    path_marker: String,
    max_sitemap_size: usize,
}

impl SitemapCatalog {
    pub fn new(config: &DiscoveryConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            catalog_url: config.catalog_url.clone(),
            path_marker: config.article_path_marker.clone(),
            max_sitemap_size: config.max_sitemap_size,
        })
    }

    /// Fetch the root sitemap and every nested sitemap it points to.
    async fn collect_entries(&self) -> Result<Vec<SitemapEntry>, DiscoveryError> {
        let mut entries = Vec::new();
        let mut seen_sitemaps: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([self.catalog_url.clone()]);

        while let Some(sitemap_url) = queue.pop_front() {
            if !seen_sitemaps.insert(sitemap_url.clone()) {
                continue;
            }

            let response = self.client.get(&sitemap_url).send().await?;
            if !response.status().is_success() {
                return Err(DiscoveryError::Status {
                    url: sitemap_url,
                    status: response.status().as_u16(),
                });
            }
            let text = response.text().await?;

            match parse_sitemap(&text, &sitemap_url, self.max_sitemap_size)? {
                SitemapDocument::UrlSet(found) => {
                    tracing::debug!(sitemap = %sitemap_url, entries = found.len(), "Parsed sitemap");
                    entries.extend(found);
                }
                SitemapDocument::Index(nested) => {
                    tracing::debug!(sitemap = %sitemap_url, nested = nested.len(), "Parsed sitemap index");
                    queue.extend(nested);
                }
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl Catalog for SitemapCatalog {
    async fn discover(&self, window: &DiscoveryWindow) -> Result<Vec<DocumentRef>, DiscoveryError> {
        tracing::info!(catalog = %self.catalog_url, days = window.lookback_days, "Fetching catalog");
        let entries = self.collect_entries().await?;
        let documents = select_documents(entries, &self.path_marker, window);
        tracing::info!(
            documents = documents.len(),
            days = window.lookback_days,
            "Found documents within the lookback window"
        );
        Ok(documents)
    }
}

/// Parse sitemap XML into either a url set or a sitemap index
pub fn parse_sitemap(xml: &str, url: &str, max_entries: usize) -> Result<SitemapDocument, DiscoveryError> {
    let document = Html::parse_document(xml);

    let urlset_sel = selector("urlset");
    let index_sel = selector("sitemapindex");
    let url_sel = selector("url");
    let sitemap_sel = selector("sitemap");
    let loc_sel = selector("loc");
    let lastmod_sel = selector("lastmod");

    if document.select(&index_sel).next().is_some() {
        let locs = document
            .select(&sitemap_sel)
            .filter_map(|sitemap| sitemap.select(&loc_sel).next())
            .map(|loc| loc.text().collect::<String>().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect();
        return Ok(SitemapDocument::Index(locs));
    }

    if document.select(&urlset_sel).next().is_none() {
        return Err(DiscoveryError::Malformed {
            url: url.to_string(),
            reason: "neither <urlset> nor <sitemapindex> found".to_string(),
        });
    }

    let mut entries = Vec::new();
    for (idx, element) in document.select(&url_sel).enumerate() {
        if idx >= max_entries {
            break;
        }

        let Some(loc) = element.select(&loc_sel).next() else {
            continue;
        };
        let loc = loc.text().collect::<String>().trim().to_string();
        if loc.is_empty() {
            continue;
        }

        let lastmod = element
            .select(&lastmod_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        entries.push(SitemapEntry { loc, lastmod });
    }

    Ok(SitemapDocument::UrlSet(entries))
}

/// Apply path marker, recency window, ordering and cap to sitemap entries
pub fn select_documents(
    entries: Vec<SitemapEntry>,
    path_marker: &str,
    window: &DiscoveryWindow,
) -> Vec<DocumentRef> {
    let cutoff = window.cutoff();
    let mut seen: HashSet<String> = HashSet::new();
    let mut documents = Vec::new();

    for entry in entries {
        if !entry.loc.contains(path_marker) || !seen.insert(entry.loc.clone()) {
            continue;
        }

        let published_at = match entry.lastmod.as_deref() {
            Some(text) => {
                let parsed = parse_lastmod(text);
                if parsed.is_none() {
                    tracing::warn!(lastmod = text, url = %entry.loc, "Could not parse lastmod");
                }
                parsed
            }
            None => None,
        };

        if matches!(published_at, Some(date) if date < cutoff) {
            continue;
        }

        documents.push(DocumentRef {
            id: entry.loc,
            published_at,
        });
    }

    // Newest first; undated documents go last in catalog order
    documents.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    if window.max_documents > 0 {
        documents.truncate(window.max_documents);
    }

    documents
}

/// Parse W3C datetime / plain date forms used in `<lastmod>`
pub fn parse_lastmod(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| unreachable!("static selector `{}` is valid", css))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://news.example.com/p/issue-3</loc><lastmod>2026-10-14T08:00:00Z</lastmod></url>
  <url><loc>https://news.example.com/p/issue-1</loc><lastmod>2026-09-01</lastmod></url>
  <url><loc>https://news.example.com/about</loc><lastmod>2026-10-15</lastmod></url>
  <url><loc>https://news.example.com/p/issue-2</loc><lastmod>2026-10-12</lastmod></url>
  <url><loc>https://news.example.com/p/undated</loc></url>
</urlset>"#;

    fn window(days: u32, max: usize) -> DiscoveryWindow {
        DiscoveryWindow {
            lookback_days: days,
            max_documents: max,
            now: Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
        }
    }

    fn entries() -> Vec<SitemapEntry> {
        match parse_sitemap(URLSET, "https://news.example.com/sitemap.xml", 50000).unwrap() {
            SitemapDocument::UrlSet(entries) => entries,
            other => panic!("expected url set, got {:?}", other),
        }
    }

    fn ids(documents: &[DocumentRef]) -> Vec<&str> {
        documents.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_parse_urlset() {
        let entries = entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].loc, "https://news.example.com/p/issue-3");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2026-10-14T08:00:00Z"));
        assert_eq!(entries[4].lastmod, None);
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://news.example.com/sitemap-1.xml</loc></sitemap>
            <sitemap><loc>https://news.example.com/sitemap-2.xml</loc></sitemap>
        </sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml, "index", 10).unwrap(),
            SitemapDocument::Index(vec![
                "https://news.example.com/sitemap-1.xml".to_string(),
                "https://news.example.com/sitemap-2.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_malformed_catalog() {
        let result = parse_sitemap("<html><body>Maintenance</body></html>", "catalog", 10);
        assert!(matches!(result, Err(DiscoveryError::Malformed { .. })));
    }

    #[test]
    fn test_select_documents_window_and_order() {
        let documents = select_documents(entries(), "/p/", &window(7, 0));
        assert_eq!(
            ids(&documents),
            vec![
                "https://news.example.com/p/issue-3",
                "https://news.example.com/p/issue-2",
                "https://news.example.com/p/undated",
            ]
        );
    }

    #[test]
    fn test_zero_cap_means_unlimited() {
        let unlimited = select_documents(entries(), "/p/", &window(60, 0));
        assert_eq!(unlimited.len(), 4);

        let capped = select_documents(entries(), "/p/", &window(60, 1));
        assert_eq!(ids(&capped), vec!["https://news.example.com/p/issue-3"]);
    }

    #[test]
    fn test_zero_day_window_keeps_only_undated() {
        let documents = select_documents(entries(), "/p/", &window(0, 0));
        assert_eq!(ids(&documents), vec!["https://news.example.com/p/undated"]);
    }

    #[test]
    fn test_empty_window_is_not_an_error() {
        let documents = select_documents(
            vec![SitemapEntry {
                loc: "https://news.example.com/p/old".to_string(),
                lastmod: Some("2020-01-01".to_string()),
            }],
            "/p/",
            &window(7, 0),
        );
        assert!(documents.is_empty());
    }

    #[test]
    fn test_parse_lastmod_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();
        assert_eq!(parse_lastmod("2026-10-14"), Some(expected));
        assert_eq!(parse_lastmod("2026-10-14T00:00:00Z"), Some(expected));
        assert_eq!(parse_lastmod("2026-10-14T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_lastmod("2026-10-14T00:00:00"), Some(expected));
        assert_eq!(parse_lastmod("2026-10-14T02:00+02:00"), Some(expected));
        assert_eq!(parse_lastmod("last tuesday"), None);
    }

    #[tokio::test]
    async fn test_catalog_follows_sitemap_index() {
        let server = MockServer::start().await;
        let index = format!(
            r#"<sitemapindex><sitemap><loc>{0}/posts.xml</loc></sitemap><sitemap><loc>{0}/posts.xml</loc></sitemap></sitemapindex>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(URLSET))
            .expect(1)
            .mount(&server)
            .await;

        let config = DiscoveryConfig {
            catalog_url: format!("{}/sitemap.xml", server.uri()),
            ..DiscoveryConfig::default()
        };
        let catalog = SitemapCatalog::new(&config, "test-agent").unwrap();
        let documents = catalog.discover(&window(7, 0)).await.unwrap();
        assert_eq!(documents.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = DiscoveryConfig {
            catalog_url: format!("{}/sitemap.xml", server.uri()),
            ..DiscoveryConfig::default()
        };
        let catalog = SitemapCatalog::new(&config, "test-agent").unwrap();
        let result = catalog.discover(&window(7, 0)).await;
        assert!(matches!(result, Err(DiscoveryError::Status { status: 503, .. })));
    }
}
