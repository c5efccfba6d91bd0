//! Ashby public job board payload: `GET /posting-api/job-board/{slug}`

use serde::Deserialize;

use super::{clean, mark_remote, PostingOrigin};
use crate::error::AtsQueryError;
use crate::types::{AtsPlatform, JobPosting};

#[derive(Debug, Deserialize)]
struct Board {
    jobs: Option<Vec<Job>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    title: Option<String>,
    location: Option<String>,
    department: Option<String>,
    job_url: Option<String>,
    #[serde(default)]
    is_remote: Option<bool>,
}

pub(super) fn parse(body: &str, origin: &PostingOrigin) -> Result<Vec<JobPosting>, AtsQueryError> {
    let board: Board =
        serde_json::from_str(body).map_err(|e| AtsQueryError::Shape(format!("ashby: {}", e)))?;

    let postings = board
        .jobs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|job| {
            let title = clean(job.title)?;
            Some(JobPosting {
                title,
                location: mark_remote(clean(job.location), job.is_remote.unwrap_or(false)),
                department: clean(job.department),
                url: job.job_url.unwrap_or_default(),
                source_platform: AtsPlatform::Ashby,
                company_slug: origin.slug.clone(),
                company_name: origin.company.clone(),
            })
        })
        .collect();

    Ok(postings)
}
