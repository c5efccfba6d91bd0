use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::{ErrorReport, RunCounters, RunStatus};

/// A document listed in the catalog, identified by its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Monetary amount of a funding announcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Amount {
    /// Value in whole currency units, e.g. `$25 million` -> 25_000_000 USD
    Parsed {
        value: f64,
        currency: String,
        text: String,
    },
    /// A monetary phrase was found but carries no usable number
    Unparsed { text: String },
}

impl Amount {
    pub fn text(&self) -> &str {
        match self {
            Amount::Parsed { text, .. } | Amount::Unparsed { text } => text,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRecord {
    pub company_name: String,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub investors: Vec<String>,
    /// Funding heading the paragraph was listed under
    #[serde(default)]
    pub section: String,
    pub source_document_id: String,
    /// The paragraph exactly as extracted from the document
    pub raw_text: String,
}

impl FundingRecord {
    /// True when at least one field beyond the company name was extracted.
    pub fn has_structured_fields(&self) -> bool {
        self.amount.is_some()
            || self.round.is_some()
            || self.location.is_some()
            || self.description.is_some()
            || !self.investors.is_empty()
    }
}

/// Ordered slug candidates for one company, most likely match first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugCandidates {
    pub company_name: String,
    pub slugs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsPlatform {
    Greenhouse,
    Lever,
    Ashby,
}

impl AtsPlatform {
    pub const ALL: [AtsPlatform; 3] = [AtsPlatform::Greenhouse, AtsPlatform::Lever, AtsPlatform::Ashby];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtsPlatform::Greenhouse => "greenhouse",
            AtsPlatform::Lever => "lever",
            AtsPlatform::Ashby => "ashby",
        }
    }
}

impl fmt::Display for AtsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw posting as returned by an ATS board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub url: String,
    pub source_platform: AtsPlatform,
    pub company_slug: String,
    /// Company name the board was searched for
    #[serde(default)]
    pub company_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InclusionRule {
    /// Title carries an entry-level term ("junior", "new grad", ...)
    EntryLevelAffirmation,
    /// Title or department carries a role term ("engineer", "data", ...)
    RoleKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "term", rename_all = "kebab-case")]
pub enum LocationMatch {
    Metro(String),
    Remote(String),
}

/// Why a posting was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReason {
    pub rule: InclusionRule,
    pub term: String,
    pub location: LocationMatch,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match self.rule {
            InclusionRule::EntryLevelAffirmation => "entry-level affirmation",
            InclusionRule::RoleKeyword => "role keyword",
        };
        let location = match &self.location {
            LocationMatch::Metro(term) => format!("metro \"{}\"", term),
            LocationMatch::Remote(term) => format!("remote \"{}\"", term),
        };
        write!(f, "{} \"{}\"; {}", rule, self.term, location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    RoleMismatch,
    SeniorityExcluded { term: String },
    LocationExcluded,
    LocationUnknown,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::RoleMismatch => f.write_str("role-mismatch"),
            ExclusionReason::SeniorityExcluded { .. } => f.write_str("seniority-excluded"),
            ExclusionReason::LocationExcluded => f.write_str("location-excluded"),
            ExclusionReason::LocationUnknown => f.write_str("location-unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Classification {
    Included { reason: MatchReason },
    Excluded { reason: ExclusionReason },
}

impl Classification {
    pub fn is_included(&self) -> bool {
        matches!(self, Classification::Included { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredJobPosting {
    #[serde(flatten)]
    pub posting: JobPosting,
    pub match_reason: MatchReason,
}

/// Result of looking a company up on one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlatformOutcome {
    Found { slug: String, postings: usize },
    NotFound,
    Failed { slug: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: AtsPlatform,
    #[serde(flatten)]
    pub outcome: PlatformOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Found,
    NotFound,
    Failed,
    /// The run was canceled before this company's search finished
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyReport {
    pub company: String,
    pub slugs: Vec<String>,
    pub platforms: Vec<PlatformResult>,
    pub postings_seen: usize,
    pub postings_included: usize,
    #[serde(default)]
    pub canceled: bool,
}

impl CompanyReport {
    /// Report for a company whose search was skipped or cut short by cancellation
    pub fn canceled(candidates: SlugCandidates) -> Self {
        Self {
            company: candidates.company_name,
            slugs: candidates.slugs,
            platforms: Vec::new(),
            postings_seen: 0,
            postings_included: 0,
            canceled: true,
        }
    }

    pub fn status(&self) -> CompanyStatus {
        if self.canceled {
            return CompanyStatus::Canceled;
        }

        let found = self
            .platforms
            .iter()
            .any(|p| matches!(p.outcome, PlatformOutcome::Found { .. }));
        let failed = self
            .platforms
            .iter()
            .any(|p| matches!(p.outcome, PlatformOutcome::Failed { .. }));

        if found {
            CompanyStatus::Found
        } else if failed {
            CompanyStatus::Failed
        } else {
            CompanyStatus::NotFound
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub counters: RunCounters,
    pub errors: ErrorReport,
    pub companies: Vec<CompanyReport>,
    /// Companies "not found on any platform"
    pub not_found: Vec<String>,
    /// Companies whose search the cancellation skipped or interrupted
    #[serde(default)]
    pub canceled: Vec<String>,
}

/// Fully materialized output of one run, ready for the output sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub funding_records: Vec<FundingRecord>,
    pub postings: Vec<FilteredJobPosting>,
    pub report: RunReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(platform: AtsPlatform, outcome: PlatformOutcome) -> PlatformResult {
        PlatformResult { platform, outcome }
    }

    #[test]
    fn test_company_status_prefers_found() {
        let report = CompanyReport {
            company: "Alder".to_string(),
            slugs: vec!["alder".to_string()],
            platforms: vec![
                platform(AtsPlatform::Greenhouse, PlatformOutcome::Failed {
                    slug: "alder".to_string(),
                    error: "timeout".to_string(),
                }),
                platform(AtsPlatform::Lever, PlatformOutcome::Found {
                    slug: "alder".to_string(),
                    postings: 0,
                }),
            ],
            postings_seen: 0,
            postings_included: 0,
            canceled: false,
        };
        assert_eq!(report.status(), CompanyStatus::Found);
    }

    #[test]
    fn test_company_status_not_found_vs_failed() {
        let mut report = CompanyReport {
            company: "Elm".to_string(),
            slugs: vec!["elm".to_string()],
            platforms: AtsPlatform::ALL
                .iter()
                .map(|p| platform(*p, PlatformOutcome::NotFound))
                .collect(),
            postings_seen: 0,
            postings_included: 0,
            canceled: false,
        };
        assert_eq!(report.status(), CompanyStatus::NotFound);

        report.platforms[2].outcome = PlatformOutcome::Failed {
            slug: "elm".to_string(),
            error: "HTTP 500".to_string(),
        };
        assert_eq!(report.status(), CompanyStatus::Failed);
    }

    #[test]
    fn test_canceled_company_report() {
        let report = CompanyReport::canceled(SlugCandidates {
            company_name: "Birch".to_string(),
            slugs: vec!["birch".to_string()],
        });
        assert_eq!(report.status(), CompanyStatus::Canceled);
        assert_eq!(report.company, "Birch");
        assert!(report.platforms.is_empty());
    }

    #[test]
    fn test_exclusion_reason_labels() {
        assert_eq!(ExclusionReason::RoleMismatch.to_string(), "role-mismatch");
        assert_eq!(
            ExclusionReason::SeniorityExcluded { term: "senior".to_string() }.to_string(),
            "seniority-excluded"
        );
        assert_eq!(ExclusionReason::LocationExcluded.to_string(), "location-excluded");
    }

    #[test]
    fn test_match_reason_display() {
        let reason = MatchReason {
            rule: InclusionRule::EntryLevelAffirmation,
            term: "junior".to_string(),
            location: LocationMatch::Metro("new york".to_string()),
        };
        assert_eq!(
            reason.to_string(),
            "entry-level affirmation \"junior\"; metro \"new york\""
        );
    }

    #[test]
    fn test_funding_record_structured_fields() {
        let mut record = FundingRecord {
            company_name: "Alder".to_string(),
            amount: None,
            round: None,
            location: None,
            description: None,
            investors: vec![],
            section: "smaller fundings".to_string(),
            source_document_id: "https://example.com/p/1".to_string(),
            raw_text: "Alder raised money.".to_string(),
        };
        assert!(!record.has_structured_fields());
        record.investors.push("Sequoia".to_string());
        assert!(record.has_structured_fields());
    }
}
