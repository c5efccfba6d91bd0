//! Run orchestration
//!
//! 1. Discover documents in the lookback window
//! 2. Fetch and extract them, at most `fetch.concurrency` at a time
//! 3. Resolve every distinct company to slug candidates
//! 4. Search the ATS boards, at most `ats.concurrency` companies at a time
//! 5. Filter postings and assemble the report
//!
//! Cancellation stops new work and abandons in-flight fetches and queries;
//! whatever completed is still returned.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

use crate::ats::{AtsClient, CompanySearch};
use crate::config::Config;
use crate::context::{ErrorKind, RunContext, RunStatus};
use crate::discovery::{Catalog, DiscoveryWindow, SitemapCatalog};
use crate::error::{FetchError, PipelineError};
use crate::extraction::FundingExtractor;
use crate::filter::JobFilter;
use crate::scrapers::{fetcher_for, DocumentFetcher};
use crate::slug::SlugResolver;
use crate::types::{
    Classification, CompanyReport, CompanyStatus, DocumentRef, FilteredJobPosting, FundingRecord,
    RunOutput, RunReport, SlugCandidates,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after extraction
    pub skip_jobs: bool,
}

pub struct Pipeline {
    config: Config,
    catalog: Arc<dyn Catalog>,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: FundingExtractor,
    resolver: SlugResolver,
    ats: AtsClient,
    filter: JobFilter,
}

impl Pipeline {
    /// Pipeline against the live catalog with the configured renderer.
    pub fn from_config(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let catalog = Arc::new(SitemapCatalog::new(&config.discovery, &config.fetch.user_agent)?);
        let fetcher = fetcher_for(&config.fetch)?;
        Self::new(config, catalog, fetcher)
    }

    pub fn new(
        config: Config,
        catalog: Arc<dyn Catalog>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            extractor: FundingExtractor::new(&config.extraction),
            resolver: SlugResolver::new(&config.slugs),
            ats: AtsClient::new(&config.ats)?,
            filter: JobFilter::new(&config.filter),
            config,
            catalog,
            fetcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage once. Only discovery failures abort the run.
    pub async fn run(&self, ctx: &RunContext, options: RunOptions) -> Result<RunOutput, PipelineError> {
        ctx.set_status(RunStatus::Running);

        match self.run_stages(ctx, options).await {
            Ok(mut output) => {
                let status = if ctx.is_cancelled() {
                    RunStatus::Canceled
                } else {
                    RunStatus::Succeeded
                };
                ctx.set_status(status);
                output.report.status = status;
                output.report.counters = ctx.snapshot();
                output.report.errors = ctx.error_report();
                tracing::info!(
                    status = %status,
                    records = output.funding_records.len(),
                    postings = output.postings.len(),
                    "Run finished"
                );
                Ok(output)
            }
            Err(e) => {
                ctx.set_status(RunStatus::Failed);
                tracing::warn!("Run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, ctx: &RunContext, options: RunOptions) -> Result<RunOutput, PipelineError> {
        let documents = self.discover(ctx).await?;
        let funding_records = self.extract_all(&documents, ctx).await;

        let mut companies: Vec<CompanyReport> = Vec::new();
        let mut postings: Vec<FilteredJobPosting> = Vec::new();
        if options.skip_jobs {
            tracing::info!("Skipping job search");
        } else {
            // After a cancellation every company still gets a (canceled) report
            let names = distinct_companies(&funding_records);
            (companies, postings) = self.search_jobs(&names, ctx).await;
        }

        let with_status = |status: CompanyStatus| -> Vec<String> {
            companies
                .iter()
                .filter(|c| c.status() == status)
                .map(|c| c.company.clone())
                .collect()
        };
        let not_found = with_status(CompanyStatus::NotFound);
        let canceled = with_status(CompanyStatus::Canceled);

        Ok(RunOutput {
            funding_records,
            postings,
            report: RunReport {
                status: ctx.status(),
                counters: ctx.snapshot(),
                errors: ctx.error_report(),
                not_found,
                canceled,
                companies,
            },
        })
    }

    async fn discover(&self, ctx: &RunContext) -> Result<Vec<DocumentRef>, PipelineError> {
        let discovery = &self.config.discovery;
        let window = DiscoveryWindow::new(discovery.lookback_days, discovery.max_documents);
        let token = ctx.cancellation_token();

        let documents = tokio::select! {
            biased;
            _ = token.cancelled() => Vec::new(),
            result = self.catalog.discover(&window) => result?,
        };

        ctx.update(|c| c.documents_discovered = documents.len());
        tracing::info!(
            documents = documents.len(),
            lookback_days = discovery.lookback_days,
            "Documents discovered"
        );
        Ok(documents)
    }

    /// Fetch and extract all documents. Records keep document order
    /// (most recent first) however the fetches interleave.
    async fn extract_all(&self, documents: &[DocumentRef], ctx: &RunContext) -> Vec<FundingRecord> {
        let token = ctx.cancellation_token();
        let concurrency = self.config.fetch.concurrency.max(1);

        let mut per_document: Vec<(usize, Vec<FundingRecord>)> = stream::iter(documents.iter().enumerate())
            .map(|(index, document)| {
                let token = token.clone();
                async move {
                    if token.is_cancelled() {
                        return (index, Vec::new());
                    }
                    let html = tokio::select! {
                        biased;
                        _ = token.cancelled() => return (index, Vec::new()),
                        fetched = self.fetch_document(document) => fetched,
                    };
                    match html {
                        Ok(html) => {
                            ctx.update(|c| c.documents_fetched += 1);
                            (index, self.extractor.extract(&html, &document.id, ctx))
                        }
                        Err(e) => {
                            tracing::warn!(document = %document.id, "Fetch failed: {}", e);
                            ctx.update(|c| c.fetch_failures += 1);
                            ctx.record_error(ErrorKind::Fetch, format!("{}: {}", document.id, e));
                            (index, Vec::new())
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        per_document.sort_by_key(|(index, _)| *index);
        per_document.into_iter().flat_map(|(_, records)| records).collect()
    }

    async fn fetch_document(&self, document: &DocumentRef) -> Result<String, FetchError> {
        let timeout = self.config.fetch.timeout();
        match tokio::time::timeout(timeout, self.fetcher.fetch(document)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { secs: timeout.as_secs() }),
        }
    }

    /// Search every company's boards and filter the postings.
    async fn search_jobs(
        &self,
        companies: &[String],
        ctx: &RunContext,
    ) -> (Vec<CompanyReport>, Vec<FilteredJobPosting>) {
        let token = ctx.cancellation_token();
        let concurrency = self.config.ats.concurrency.max(1);

        let mut searches: Vec<(usize, SlugCandidates, Option<CompanySearch>)> =
            stream::iter(companies.iter().enumerate())
                .map(|(index, company)| {
                    let token = token.clone();
                    async move {
                        let candidates = self.resolver.resolve(company);
                        if token.is_cancelled() {
                            return (index, candidates, None);
                        }
                        ctx.update(|c| c.companies_searched += 1);
                        tracing::debug!(company = %company, slugs = ?candidates.slugs, "Searching job boards");

                        // A search that returns after cancellation may have skipped slugs
                        let search = tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            search = self.ats.search_company(&candidates, ctx) => {
                                (!token.is_cancelled()).then_some(search)
                            }
                        };
                        (index, candidates, search)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        searches.sort_by_key(|(index, _, _)| *index);

        let mut reports = Vec::with_capacity(searches.len());
        let mut included = Vec::new();

        for (_, candidates, search) in searches {
            let Some(search) = search else {
                tracing::info!(company = %candidates.company_name, "Search canceled");
                reports.push(CompanyReport::canceled(candidates));
                continue;
            };

            let mut report = CompanyReport {
                company: candidates.company_name.clone(),
                slugs: candidates.slugs,
                platforms: search.platforms,
                postings_seen: search.postings.len(),
                postings_included: 0,
                canceled: false,
            };

            for posting in search.postings {
                ctx.update(|c| c.postings_seen += 1);
                match self.filter.classify(&posting) {
                    Classification::Included { reason } => {
                        tracing::debug!(company = %report.company, title = %posting.title, "Included: {}", reason);
                        ctx.update(|c| c.postings_included += 1);
                        report.postings_included += 1;
                        included.push(FilteredJobPosting {
                            posting,
                            match_reason: reason,
                        });
                    }
                    Classification::Excluded { reason } => {
                        tracing::debug!(company = %report.company, title = %posting.title, "Excluded: {}", reason);
                    }
                }
            }

            if report.status() == CompanyStatus::NotFound {
                tracing::info!(company = %report.company, "Not found on any platform");
            }
            reports.push(report);
        }

        tracing::info!(
            companies = reports.len(),
            postings = included.len(),
            "Job search finished"
        );
        (reports, included)
    }
}

/// Company names in first-appearance order, compared case-insensitively
pub fn distinct_companies(records: &[FundingRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.company_name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(str::to_string)
        .collect()
}
