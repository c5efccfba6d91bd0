//! Greenhouse job board payload: `GET /v1/boards/{slug}/jobs`

use serde::Deserialize;

use super::{clean, PostingOrigin};
use crate::error::AtsQueryError;
use crate::types::{AtsPlatform, JobPosting};

#[derive(Debug, Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Option<Vec<Job>>,
}

#[derive(Debug, Deserialize)]
struct Job {
    title: Option<String>,
    location: Option<Location>,
    departments: Option<Vec<Department>>,
    absolute_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Department {
    name: Option<String>,
}

pub(super) fn parse(body: &str, origin: &PostingOrigin) -> Result<Vec<JobPosting>, AtsQueryError> {
    let board: Board =
        serde_json::from_str(body).map_err(|e| AtsQueryError::Shape(format!("greenhouse: {}", e)))?;

    let postings = board
        .jobs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|job| {
            let title = clean(job.title)?;
            Some(JobPosting {
                title,
                location: clean(job.location.and_then(|l| l.name)),
                department: clean(
                    job.departments
                        .and_then(|d| d.into_iter().next())
                        .and_then(|d| d.name),
                ),
                url: job.absolute_url.unwrap_or_default(),
                source_platform: AtsPlatform::Greenhouse,
                company_slug: origin.slug.clone(),
                company_name: origin.company.clone(),
            })
        })
        .collect();

    Ok(postings)
}
