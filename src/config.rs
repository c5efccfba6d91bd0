//! Run configuration
//!
//! Loaded from an optional YAML file; every section falls back to defaults
//! so a file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::AtsPlatform;

pub const DEFAULT_CATALOG_URL: &str = "https://newsletter.strictlyvc.com/sitemap.xml";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; FundingScout/1.0)";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub fetch: FetchConfig,
    pub extraction: ExtractionConfig,
    pub slugs: SlugConfig,
    pub ats: AtsConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub catalog_url: String,
    /// Only catalog entries whose URL contains this marker are documents
    pub article_path_marker: String,
    pub lookback_days: u32,
    /// 0 = unlimited
    pub max_documents: usize,
    pub timeout_secs: u64,
    pub max_sitemap_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            article_path_marker: "/p/".to_string(),
            lookback_days: 7,
            max_documents: 5,
            timeout_secs: 30,
            max_sitemap_size: 50000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    Http,
    WebDriver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub renderer: Renderer,
    pub webdriver_url: String,
    pub content_selector: String,
    pub timeout_secs: u64,
    pub render_wait_ms: u64,
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            renderer: Renderer::Http,
            webdriver_url: "http://localhost:9515".to_string(),
            content_selector: "#content-blocks".to_string(),
            timeout_secs: 30,
            render_wait_ms: 2000,
            concurrency: 2,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub funding_headings: Vec<String>,
    pub min_paragraph_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            funding_headings: strings(&[
                "massive fundings",
                "big-but-not-crazy-big fundings",
                "smaller fundings",
            ]),
            min_paragraph_chars: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlugConfig {
    /// Words dropped when building the last-resort slug candidates
    pub descriptor_words: Vec<String>,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            descriptor_words: strings(&[
                "ai", "labs", "lab", "technologies", "technology", "tech", "health",
                "medical", "therapeutics", "bio", "biotechnologies", "systems",
                "security", "robotics", "holdings", "enterprises", "services",
                "solutions", "markets", "computing", "corporation",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtsConfig {
    pub platforms: Vec<AtsPlatform>,
    pub greenhouse_url: String,
    pub lever_url: String,
    pub ashby_url: String,
    pub timeout_secs: u64,
    /// Queries in flight at once, across every company and platform
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for AtsConfig {
    fn default() -> Self {
        Self {
            platforms: AtsPlatform::ALL.to_vec(),
            greenhouse_url: "https://boards-api.greenhouse.io/v1/boards/{slug}/jobs".to_string(),
            lever_url: "https://api.lever.co/v0/postings/{slug}".to_string(),
            ashby_url: "https://api.ashbyhq.com/posting-api/job-board/{slug}".to_string(),
            timeout_secs: 10,
            concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AtsConfig {
    pub fn url_template(&self, platform: AtsPlatform) -> &str {
        match platform {
            AtsPlatform::Greenhouse => &self.greenhouse_url,
            AtsPlatform::Lever => &self.lever_url,
            AtsPlatform::Ashby => &self.ashby_url,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Keyword sets for the job relevance filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub role_keywords: Vec<String>,
    pub seniority_keywords: Vec<String>,
    /// Seniority terms excused when the title also has a junior qualifier
    pub qualified_seniority_keywords: Vec<String>,
    pub junior_qualifiers: Vec<String>,
    pub entry_level_keywords: Vec<String>,
    pub include_internships: bool,
    pub internship_keywords: Vec<String>,
    pub metro_aliases: Vec<String>,
    pub remote_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            role_keywords: strings(&[
                "software", "engineer", "engineering", "developer", "programmer", "data",
                "machine learning", "ml", "ai", "devops", "cloud", "frontend", "front-end",
                "backend", "back-end", "full stack", "fullstack", "full-stack", "sdr", "bdr",
                "account executive", "business development", "sales development",
                "sales engineer", "solutions", "product", "technical", "it", "security",
                "qa", "quality assurance", "support engineer", "analyst",
            ]),
            seniority_keywords: strings(&[
                "senior", "sr", "staff", "principal", "lead", "manager", "director", "vp",
                "vice president", "head of", "chief", "architect", "distinguished", "ii",
                "iii", "iv", "strategist",
            ]),
            qualified_seniority_keywords: strings(&["manager"]),
            junior_qualifiers: strings(&["associate", "assistant", "junior", "jr"]),
            entry_level_keywords: strings(&[
                "junior", "jr", "associate", "entry level", "entry-level", "new grad",
                "new graduate", "graduate", "analyst", "i", "1",
            ]),
            include_internships: false,
            internship_keywords: strings(&["intern", "internship", "co-op"]),
            metro_aliases: strings(&[
                "new york", "nyc", "ny", "manhattan", "brooklyn", "queens", "bronx",
                "staten island",
            ]),
            remote_keywords: strings(&["remote"]),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check every value the pipeline relies on and report all problems together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if !self.discovery.catalog_url.starts_with("http://")
            && !self.discovery.catalog_url.starts_with("https://")
        {
            problems.push(format!(
                "discovery.catalog_url must be an http(s) URL, got '{}'",
                self.discovery.catalog_url
            ));
        }
        if self.discovery.timeout_secs == 0 {
            problems.push("discovery.timeout_secs must be greater than 0".to_string());
        }
        if self.fetch.concurrency < 1 {
            problems.push("fetch.concurrency must be at least 1".to_string());
        }
        if self.fetch.timeout_secs == 0 {
            problems.push("fetch.timeout_secs must be greater than 0".to_string());
        }
        if self.fetch.content_selector.trim().is_empty() {
            problems.push("fetch.content_selector is empty".to_string());
        } else if scraper::Selector::parse(&self.fetch.content_selector).is_err() {
            problems.push(format!(
                "fetch.content_selector '{}' is not a valid CSS selector",
                self.fetch.content_selector
            ));
        }
        if self.ats.concurrency < 1 {
            problems.push("ats.concurrency must be at least 1".to_string());
        }
        if self.ats.timeout_secs == 0 {
            problems.push("ats.timeout_secs must be greater than 0".to_string());
        }
        if self.ats.platforms.is_empty() {
            problems.push("ats.platforms is empty".to_string());
        }
        for platform in AtsPlatform::ALL {
            if !self.ats.url_template(platform).contains("{slug}") {
                problems.push(format!("ats.{}_url must contain '{{slug}}'", platform));
            }
        }

        check_keywords(&mut problems, "extraction.funding_headings", &self.extraction.funding_headings, true);
        check_keywords(&mut problems, "slugs.descriptor_words", &self.slugs.descriptor_words, false);

        let filter = &self.filter;
        check_keywords(&mut problems, "filter.role_keywords", &filter.role_keywords, true);
        check_keywords(&mut problems, "filter.seniority_keywords", &filter.seniority_keywords, true);
        check_keywords(&mut problems, "filter.qualified_seniority_keywords", &filter.qualified_seniority_keywords, false);
        check_keywords(&mut problems, "filter.junior_qualifiers", &filter.junior_qualifiers, false);
        check_keywords(&mut problems, "filter.entry_level_keywords", &filter.entry_level_keywords, true);
        check_keywords(&mut problems, "filter.internship_keywords", &filter.internship_keywords, filter.include_internships);
        check_keywords(&mut problems, "filter.metro_aliases", &filter.metro_aliases, true);
        check_keywords(&mut problems, "filter.remote_keywords", &filter.remote_keywords, false);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

fn check_keywords(problems: &mut Vec<String>, name: &str, terms: &[String], required: bool) {
    if required && terms.is_empty() {
        problems.push(format!("{} is empty", name));
    }
    if terms.iter().any(|t| t.trim().is_empty()) {
        problems.push(format!("{} contains a blank entry", name));
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
