// Integration tests for search_fundings

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use search_fundings::config::Config;
use search_fundings::context::{ErrorKind, RunContext, RunStatus};
use search_fundings::discovery::{Catalog, DiscoveryWindow};
use search_fundings::error::{DiscoveryError, FetchError};
use search_fundings::pipeline::{Pipeline, RunOptions};
use search_fundings::scrapers::DocumentFetcher;
use search_fundings::types::{AtsPlatform, CompanyStatus, DocumentRef, InclusionRule, PlatformOutcome};

const COMPANIES: [&str; 5] = ["Alder", "Birch", "Cedar", "Dogwood", "Elm"];

/// One issue with a single funding announcement
fn issue_html(company: &str) -> String {
    format!(
        r#"<html><body><div id="content-blocks">
            <div><p>Good morning, here is today's newsletter.</p></div>
            <div><h2>Smaller Fundings</h2></div>
            <div><p>{}, a New York-based startup, has raised $5 million in seed funding led by Accel.</p></div>
            <div><h2>Exits</h2></div>
        </div></body></html>"#,
        company
    )
}

fn board(jobs: &[(&str, &str)]) -> String {
    let jobs: Vec<serde_json::Value> = jobs
        .iter()
        .enumerate()
        .map(|(i, (title, location))| {
            serde_json::json!({
                "title": title,
                "location": {"name": location},
                "absolute_url": format!("https://boards.greenhouse.io/jobs/{}", i),
            })
        })
        .collect();
    serde_json::json!({ "jobs": jobs }).to_string()
}

async fn mount(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn ats_config(config: &mut Config, server: &MockServer) {
    let uri = server.uri();
    config.ats.greenhouse_url = format!("{}/greenhouse/{{slug}}/jobs", uri);
    config.ats.lever_url = format!("{}/lever/{{slug}}", uri);
    config.ats.ashby_url = format!("{}/ashby/{{slug}}", uri);
}

/// Catalog with a fixed document list
struct StaticCatalog {
    documents: Vec<DocumentRef>,
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn discover(&self, _window: &DiscoveryWindow) -> Result<Vec<DocumentRef>, DiscoveryError> {
        Ok(self.documents.clone())
    }
}

/// Fetcher serving pages from memory, each after its own delay
struct MemoryFetcher {
    pages: HashMap<String, (String, std::time::Duration)>,
}

#[async_trait]
impl DocumentFetcher for MemoryFetcher {
    async fn fetch(&self, document: &DocumentRef) -> Result<String, FetchError> {
        match self.pages.get(&document.id) {
            Some((html, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(html.clone())
            }
            None => Err(FetchError::Status { status: 404 }),
        }
    }
}

fn memory_setup(delays_ms: &[u64]) -> (Arc<StaticCatalog>, Arc<MemoryFetcher>) {
    let documents: Vec<DocumentRef> = COMPANIES
        .iter()
        .enumerate()
        .map(|(i, _)| DocumentRef {
            id: format!("https://newsletter.example.com/p/issue-{}", i),
            published_at: None,
        })
        .collect();
    let pages = documents
        .iter()
        .zip(COMPANIES)
        .zip(delays_ms)
        .map(|((doc, company), delay)| {
            (doc.id.clone(), (issue_html(company), std::time::Duration::from_millis(*delay)))
        })
        .collect();

    (Arc::new(StaticCatalog { documents }), Arc::new(MemoryFetcher { pages }))
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let server = MockServer::start().await;

    // Sitemap with five recent issues, newest first by lastmod
    let now = Utc::now();
    let urls: String = COMPANIES
        .iter()
        .enumerate()
        .map(|(i, _)| {
            format!(
                "<url><loc>{}/p/issue-{}</loc><lastmod>{}</lastmod></url>",
                server.uri(),
                i,
                (now - Duration::hours(i as i64 + 1)).to_rfc3339()
            )
        })
        .collect();
    mount(&server, "/sitemap.xml", format!("<urlset>{}</urlset>", urls)).await;
    for (i, company) in COMPANIES.iter().enumerate() {
        mount(&server, &format!("/p/issue-{}", i), issue_html(company)).await;
    }

    // Alder and Cedar have one junior NYC role each, Birch only senior roles,
    // Dogwood and Elm have no board anywhere (404 by default)
    mount(&server, "/greenhouse/alder/jobs", board(&[("Junior Software Engineer", "New York, NY")])).await;
    mount(
        &server,
        "/greenhouse/birch/jobs",
        board(&[("Senior Data Engineer", "New York, NY"), ("Staff Product Manager", "Remote")]),
    )
    .await;
    mount(&server, "/greenhouse/cedar/jobs", board(&[("Junior Data Analyst", "Brooklyn, NY")])).await;

    let mut config = Config::default();
    config.discovery.catalog_url = format!("{}/sitemap.xml", server.uri());
    config.discovery.max_documents = 0;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::from_config(config).unwrap();
    let ctx = RunContext::new();
    let output = pipeline.run(&ctx, RunOptions::default()).await.unwrap();

    let companies: Vec<&str> = output
        .funding_records
        .iter()
        .map(|r| r.company_name.as_str())
        .collect();
    assert_eq!(companies, COMPANIES.to_vec());
    assert!(output.funding_records.iter().all(|r| r.investors == vec!["Accel"]));

    let included: Vec<(&str, &str)> = output
        .postings
        .iter()
        .map(|p| (p.posting.company_name.as_str(), p.posting.title.as_str()))
        .collect();
    assert_eq!(
        included,
        vec![("Alder", "Junior Software Engineer"), ("Cedar", "Junior Data Analyst")]
    );
    assert!(output
        .postings
        .iter()
        .all(|p| p.match_reason.rule == InclusionRule::EntryLevelAffirmation));

    let report = &output.report;
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.not_found, vec!["Dogwood", "Elm"]);
    let birch = report.companies.iter().find(|c| c.company == "Birch").unwrap();
    assert_eq!(birch.status(), CompanyStatus::Found);
    assert_eq!((birch.postings_seen, birch.postings_included), (2, 0));

    assert_eq!(report.counters.documents_discovered, 5);
    assert_eq!(report.counters.documents_fetched, 5);
    assert_eq!(report.counters.records_parsed, 5);
    assert_eq!(report.counters.companies_searched, 5);
    assert_eq!(report.counters.postings_seen, 4);
    assert_eq!(report.counters.postings_included, 2);
    assert_eq!(report.errors.total(), 0);
    assert_eq!(ctx.status(), RunStatus::Succeeded);
}

#[tokio::test]
async fn test_record_set_independent_of_fetch_concurrency() {
    let server = MockServer::start().await;
    // Later documents finish first
    let delays = [50, 40, 30, 20, 10];

    let mut outputs = Vec::new();
    for concurrency in [1, 4] {
        let (catalog, fetcher) = memory_setup(&delays);
        let mut config = Config::default();
        config.fetch.concurrency = concurrency;
        ats_config(&mut config, &server);

        let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
        let ctx = RunContext::new();
        let output = pipeline
            .run(&ctx, RunOptions { skip_jobs: true })
            .await
            .unwrap();
        outputs.push(output.funding_records);
    }

    assert_eq!(outputs[0].len(), 5);
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_records() {
    let server = MockServer::start().await;
    // Two quick documents, the rest never finish in time
    let (catalog, fetcher) = memory_setup(&[0, 0, 60_000, 60_000, 60_000]);
    let mut config = Config::default();
    config.fetch.concurrency = 5;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
    let ctx = Arc::new(RunContext::new());

    let canceller = Arc::clone(&ctx);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let output = pipeline.run(&ctx, RunOptions::default()).await.unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(output.report.status, RunStatus::Canceled);
    assert_eq!(ctx.status(), RunStatus::Canceled);

    let companies: Vec<&str> = output
        .funding_records
        .iter()
        .map(|r| r.company_name.as_str())
        .collect();
    assert_eq!(companies, vec!["Alder", "Birch"]);

    // No job search after cancellation, but every company is accounted for
    let report = &output.report;
    let statuses: Vec<(&str, CompanyStatus)> = report
        .companies
        .iter()
        .map(|c| (c.company.as_str(), c.status()))
        .collect();
    assert_eq!(
        statuses,
        vec![("Alder", CompanyStatus::Canceled), ("Birch", CompanyStatus::Canceled)]
    );
    assert_eq!(report.canceled, vec!["Alder", "Birch"]);
    assert!(report.not_found.is_empty());
    assert_eq!(report.counters.companies_searched, 0);
    assert_eq!(report.counters.ats_queries, 0);
}

#[tokio::test]
async fn test_cancellation_during_job_search_reports_every_company() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(std::time::Duration::from_millis(400)))
        .mount(&server)
        .await;

    let (catalog, fetcher) = memory_setup(&[0, 0, 0, 0, 0]);
    let mut config = Config::default();
    config.ats.platforms = vec![AtsPlatform::Greenhouse];
    config.ats.concurrency = 1;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
    let ctx = Arc::new(RunContext::new());

    // Alder's lookup finishes at ~400ms, Birch's is in flight at 600ms
    let canceller = Arc::clone(&ctx);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        canceller.cancel();
    });

    let output = pipeline.run(&ctx, RunOptions::default()).await.unwrap();
    let report = &output.report;

    assert_eq!(report.status, RunStatus::Canceled);
    assert_eq!(output.funding_records.len(), 5);

    let statuses: Vec<(&str, CompanyStatus)> = report
        .companies
        .iter()
        .map(|c| (c.company.as_str(), c.status()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Alder", CompanyStatus::NotFound),
            ("Birch", CompanyStatus::Canceled),
            ("Cedar", CompanyStatus::Canceled),
            ("Dogwood", CompanyStatus::Canceled),
            ("Elm", CompanyStatus::Canceled),
        ]
    );
    assert_eq!(report.not_found, vec!["Alder"]);
    assert_eq!(report.canceled, vec!["Birch", "Cedar", "Dogwood", "Elm"]);
    assert_eq!(report.counters.companies_searched, 2);
}

#[tokio::test]
async fn test_fetch_timeout_is_a_recoverable_failure() {
    let server = MockServer::start().await;
    // Birch's issue takes longer than the fetch timeout
    let (catalog, fetcher) = memory_setup(&[0, 3000, 0, 0, 0]);
    let mut config = Config::default();
    config.fetch.timeout_secs = 1;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
    let ctx = RunContext::new();
    let output = pipeline
        .run(&ctx, RunOptions { skip_jobs: true })
        .await
        .unwrap();

    let companies: Vec<&str> = output
        .funding_records
        .iter()
        .map(|r| r.company_name.as_str())
        .collect();
    assert_eq!(companies, vec!["Alder", "Cedar", "Dogwood", "Elm"]);

    let report = &output.report;
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.counters.fetch_failures, 1);
    assert_eq!(report.errors.count(ErrorKind::Fetch), 1);
    assert!(report.errors.by_kind[&ErrorKind::Fetch].samples[0].contains("timed out"));
}

#[tokio::test]
async fn test_ats_timeout_fails_only_that_platform() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/greenhouse/alder/jobs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(board(&[("Junior Software Engineer", "New York, NY")]))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount(&server, "/greenhouse/cedar/jobs", board(&[("Junior Data Analyst", "Brooklyn, NY")])).await;

    let (catalog, fetcher) = memory_setup(&[0, 0, 0, 0, 0]);
    let mut config = Config::default();
    config.ats.timeout_secs = 1;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
    let ctx = RunContext::new();
    let output = pipeline.run(&ctx, RunOptions::default()).await.unwrap();
    let report = &output.report;

    assert_eq!(report.status, RunStatus::Succeeded);
    let alder = report.companies.iter().find(|c| c.company == "Alder").unwrap();
    assert_eq!(alder.status(), CompanyStatus::Failed);
    assert_eq!(alder.platforms[0].platform, AtsPlatform::Greenhouse);
    assert!(matches!(alder.platforms[0].outcome, PlatformOutcome::Failed { .. }));
    assert_eq!(alder.platforms[1].outcome, PlatformOutcome::NotFound);

    // The rest of the run carries on
    let included: Vec<&str> = output
        .postings
        .iter()
        .map(|p| p.posting.company_name.as_str())
        .collect();
    assert_eq!(included, vec!["Cedar"]);
    assert_eq!(report.not_found, vec!["Birch", "Dogwood", "Elm"]);
    assert_eq!(report.counters.ats_failures, 1);
    assert_eq!(report.errors.count(ErrorKind::AtsQuery), 1);
}

#[tokio::test]
async fn test_fetch_failures_do_not_stop_the_run() {
    let server = MockServer::start().await;
    let (_, fetcher) = memory_setup(&[0, 0, 0, 0, 0]);
    let catalog = Arc::new(StaticCatalog {
        documents: vec![
            DocumentRef {
                id: "https://newsletter.example.com/p/issue-0".to_string(),
                published_at: None,
            },
            DocumentRef {
                id: "https://newsletter.example.com/p/missing".to_string(),
                published_at: None,
            },
        ],
    });
    let mut config = Config::default();
    ats_config(&mut config, &server);

    let pipeline = Pipeline::new(config, catalog, fetcher).unwrap();
    let ctx = RunContext::new();
    let output = pipeline
        .run(&ctx, RunOptions { skip_jobs: true })
        .await
        .unwrap();

    assert_eq!(output.funding_records.len(), 1);
    assert_eq!(output.report.counters.fetch_failures, 1);
    assert_eq!(output.report.errors.total(), 1);
    assert_eq!(output.report.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_zero_document_cap_processes_whole_window() {
    let server = MockServer::start().await;
    let now = Utc::now();
    let urls: String = (0..8)
        .map(|i| {
            format!(
                "<url><loc>{}/p/issue-{}</loc><lastmod>{}</lastmod></url>",
                server.uri(),
                i,
                (now - Duration::hours(i + 1)).to_rfc3339()
            )
        })
        .collect();
    mount(&server, "/sitemap.xml", format!("<urlset>{}</urlset>", urls)).await;
    for i in 0..8 {
        mount(&server, &format!("/p/issue-{}", i), issue_html("Alder")).await;
    }

    let mut config = Config::default();
    config.discovery.catalog_url = format!("{}/sitemap.xml", server.uri());
    config.discovery.max_documents = 0;
    ats_config(&mut config, &server);

    let pipeline = Pipeline::from_config(config).unwrap();
    let ctx = RunContext::new();
    let output = pipeline
        .run(&ctx, RunOptions { skip_jobs: true })
        .await
        .unwrap();

    assert_eq!(output.report.counters.documents_discovered, 8);
    assert_eq!(output.funding_records.len(), 8);
}

#[tokio::test]
async fn test_unreachable_catalog_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.discovery.catalog_url = format!("{}/sitemap.xml", server.uri());

    let pipeline = Pipeline::from_config(config).unwrap();
    let ctx = RunContext::new();
    let result = pipeline.run(&ctx, RunOptions::default()).await;

    assert!(result.is_err());
    assert_eq!(ctx.status(), RunStatus::Failed);
}
