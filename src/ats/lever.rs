//! Lever postings payload: `GET /v0/postings/{slug}` returns a bare array

use serde::Deserialize;

use super::{clean, mark_remote, PostingOrigin};
use crate::error::AtsQueryError;
use crate::types::{AtsPlatform, JobPosting};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    text: Option<String>,
    hosted_url: Option<String>,
    categories: Option<Categories>,
    workplace_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    location: Option<String>,
    department: Option<String>,
    team: Option<String>,
}

pub(super) fn parse(body: &str, origin: &PostingOrigin) -> Result<Vec<JobPosting>, AtsQueryError> {
    let postings: Vec<Posting> =
        serde_json::from_str(body).map_err(|e| AtsQueryError::Shape(format!("lever: {}", e)))?;

    let postings = postings
        .into_iter()
        .filter_map(|posting| {
            let title = clean(posting.text)?;
            let categories = posting.categories.unwrap_or_default();
            let remote = posting
                .workplace_type
                .is_some_and(|w| w.eq_ignore_ascii_case("remote"));

            Some(JobPosting {
                title,
                location: mark_remote(clean(categories.location), remote),
                department: clean(categories.department).or_else(|| clean(categories.team)),
                url: posting.hosted_url.unwrap_or_default(),
                source_platform: AtsPlatform::Lever,
                company_slug: origin.slug.clone(),
                company_name: origin.company.clone(),
            })
        })
        .collect();

    Ok(postings)
}
