//! ATS Query Client
//!
//! Looks companies up on the public job-board APIs of Greenhouse, Lever
//! and Ashby:
//! - HTTP 404 means the company has no board there (not an error)
//! - Slug candidates are tried in order per platform; the first board found
//!   is authoritative, even when it is empty
//! - A failed query skips that platform for the company and is recorded
//! - Platforms are queried concurrently and their postings unioned
//! - At most `ats.concurrency` queries are in flight across all companies

mod ashby;
mod greenhouse;
mod lever;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;

use crate::config::AtsConfig;
use crate::context::{ErrorKind, RunContext};
use crate::error::AtsQueryError;
use crate::types::{AtsPlatform, JobPosting, PlatformOutcome, PlatformResult, SlugCandidates};

/// Outcome of one board query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardLookup {
    Found(Vec<JobPosting>),
    NotFound,
}

/// All platforms for one company
#[derive(Debug, Clone, Default)]
pub struct CompanySearch {
    pub platforms: Vec<PlatformResult>,
    pub postings: Vec<JobPosting>,
}

/// Who a board belongs to, stamped on every posting parsed from it
pub(crate) struct PostingOrigin {
    pub slug: String,
    pub company: String,
}

pub struct AtsClient {
    http: Client,
    config: AtsConfig,
    permits: Semaphore,
}

impl AtsClient {
    pub fn new(config: &AtsConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            permits: Semaphore::new(config.concurrency.max(1)),
        })
    }

    pub fn board_url(&self, platform: AtsPlatform, slug: &str) -> String {
        self.config
            .url_template(platform)
            .replace("{slug}", &urlencoding::encode(slug))
    }

    /// Query one platform for one slug.
    pub async fn query(
        &self,
        platform: AtsPlatform,
        slug: &str,
        company: &str,
    ) -> Result<BoardLookup, AtsQueryError> {
        let Ok(_permit) = self.permits.acquire().await else {
            return Err(AtsQueryError::PoolClosed);
        };

        let url = self.board_url(platform, slug);
        tracing::debug!(platform = %platform, slug = %slug, url = %url, "Querying ATS board");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(BoardLookup::NotFound);
        }
        if !status.is_success() {
            return Err(AtsQueryError::Status { status: status.as_u16() });
        }

        let body = response.text().await?;
        let origin = PostingOrigin {
            slug: slug.to_string(),
            company: company.to_string(),
        };
        let postings = match platform {
            AtsPlatform::Greenhouse => greenhouse::parse(&body, &origin)?,
            AtsPlatform::Lever => lever::parse(&body, &origin)?,
            AtsPlatform::Ashby => ashby::parse(&body, &origin)?,
        };

        Ok(BoardLookup::Found(postings))
    }

    /// Try each slug candidate on one platform until a board turns up.
    pub async fn find_board(
        &self,
        platform: AtsPlatform,
        candidates: &SlugCandidates,
        ctx: &RunContext,
    ) -> (PlatformResult, Vec<JobPosting>) {
        let company = candidates.company_name.as_str();

        for slug in &candidates.slugs {
            if ctx.is_cancelled() {
                break;
            }

            ctx.update(|c| c.ats_queries += 1);
            match self.query(platform, slug, company).await {
                Ok(BoardLookup::Found(postings)) => {
                    tracing::info!(
                        company = %company,
                        platform = %platform,
                        slug = %slug,
                        postings = postings.len(),
                        "Board found"
                    );
                    let outcome = PlatformOutcome::Found {
                        slug: slug.clone(),
                        postings: postings.len(),
                    };
                    return (PlatformResult { platform, outcome }, postings);
                }
                Ok(BoardLookup::NotFound) => continue,
                Err(e) => {
                    tracing::warn!(company = %company, platform = %platform, slug = %slug, "ATS query failed: {}", e);
                    ctx.update(|c| c.ats_failures += 1);
                    ctx.record_error(
                        ErrorKind::AtsQuery,
                        format!("{} on {} (slug {}): {}", company, platform, slug, e),
                    );
                    let outcome = PlatformOutcome::Failed {
                        slug: slug.clone(),
                        error: e.to_string(),
                    };
                    return (PlatformResult { platform, outcome }, Vec::new());
                }
            }
        }

        let outcome = PlatformOutcome::NotFound;
        (PlatformResult { platform, outcome }, Vec::new())
    }

    /// Look a company up on every configured platform at once.
    ///
    /// Results come back in platform order (Greenhouse, Lever, Ashby)
    /// whatever order the lookups finish in.
    pub async fn search_company(&self, candidates: &SlugCandidates, ctx: &RunContext) -> CompanySearch {
        let mut platforms = self.config.platforms.clone();
        platforms.sort();
        platforms.dedup();

        let lookups = platforms
            .into_iter()
            .map(|platform| self.find_board(platform, candidates, ctx));
        let results = futures::future::join_all(lookups).await;

        let mut search = CompanySearch::default();
        for (result, postings) in results {
            search.platforms.push(result);
            search.postings.extend(postings);
        }
        search
    }
}

/// Trimmed, non-empty value
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Flag a location as remote unless it already says so
pub(crate) fn mark_remote(location: Option<String>, remote: bool) -> Option<String> {
    if !remote {
        return location;
    }
    match location {
        Some(loc) if loc.to_lowercase().contains("remote") => Some(loc),
        Some(loc) => Some(format!("{} (Remote)", loc)),
        None => Some("Remote".to_string()),
    }
}
