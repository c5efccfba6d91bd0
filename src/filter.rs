//! Job Relevance Filter
//!
//! Pure classifier over a single posting. Every pass is evaluated:
//! - role: title or department carries a role keyword
//! - seniority: title carries a seniority keyword (always excludes)
//! - entry level: title carries an entry-level keyword (includes even
//!   without a role keyword)
//! - location: target metro alias or remote keyword
//!
//! Keywords match on word boundaries only, so "engineering" never fires
//! inside "reengineering".

use crate::config::FilterConfig;
use crate::types::{
    Classification, ExclusionReason, FilteredJobPosting, InclusionRule, JobPosting, LocationMatch,
    MatchReason,
};

pub struct JobFilter {
    role_keywords: Vec<String>,
    seniority_keywords: Vec<String>,
    qualified_seniority_keywords: Vec<String>,
    junior_qualifiers: Vec<String>,
    entry_level_keywords: Vec<String>,
    metro_aliases: Vec<String>,
    remote_keywords: Vec<String>,
}

impl JobFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let mut entry_level_keywords = normalize(&config.entry_level_keywords);
        if config.include_internships {
            entry_level_keywords.extend(normalize(&config.internship_keywords));
        }

        Self {
            role_keywords: normalize(&config.role_keywords),
            seniority_keywords: normalize(&config.seniority_keywords),
            qualified_seniority_keywords: normalize(&config.qualified_seniority_keywords),
            junior_qualifiers: normalize(&config.junior_qualifiers),
            entry_level_keywords,
            metro_aliases: normalize(&config.metro_aliases),
            remote_keywords: normalize(&config.remote_keywords),
        }
    }

    pub fn classify(&self, posting: &JobPosting) -> Classification {
        let title = posting.title.to_lowercase();
        let department = posting.department.as_deref().unwrap_or("").to_lowercase();

        // ============================================
        // Passes
        // ============================================

        let role = find_term(&title, &self.role_keywords)
            .or_else(|| find_term(&department, &self.role_keywords));
        let seniority = self.seniority_term(&title);
        let entry_level = find_term(&title, &self.entry_level_keywords);
        let location = posting.location.as_deref().map(|l| self.location_match(l));

        // ============================================
        // Decision
        // ============================================

        if let Some(term) = seniority {
            return excluded(ExclusionReason::SeniorityExcluded { term: term.to_string() });
        }

        let (rule, term) = match (entry_level, role) {
            (Some(term), _) => (InclusionRule::EntryLevelAffirmation, term),
            (None, Some(term)) => (InclusionRule::RoleKeyword, term),
            (None, None) => return excluded(ExclusionReason::RoleMismatch),
        };

        let location = match location {
            None | Some(LocationPass::Blank) => return excluded(ExclusionReason::LocationUnknown),
            Some(LocationPass::Outside) => return excluded(ExclusionReason::LocationExcluded),
            Some(LocationPass::Matched(m)) => m,
        };

        Classification::Included {
            reason: MatchReason {
                rule,
                term: term.to_string(),
                location,
            },
        }
    }

    /// Classify and keep only included postings.
    pub fn apply(&self, posting: JobPosting) -> Option<FilteredJobPosting> {
        match self.classify(&posting) {
            Classification::Included { reason } => Some(FilteredJobPosting {
                posting,
                match_reason: reason,
            }),
            Classification::Excluded { .. } => None,
        }
    }

    /// First seniority term in the title that is not excused by a junior qualifier
    fn seniority_term<'a>(&'a self, title: &str) -> Option<&'a str> {
        let has_junior_qualifier = find_term(title, &self.junior_qualifiers).is_some();

        self.seniority_keywords
            .iter()
            .filter(|term| contains_word(title, term))
            .find(|term| !(has_junior_qualifier && self.qualified_seniority_keywords.contains(term)))
            .map(String::as_str)
    }

    fn location_match(&self, location: &str) -> LocationPass {
        let location = location.trim().to_lowercase();
        if location.is_empty() {
            return LocationPass::Blank;
        }
        if let Some(alias) = find_term(&location, &self.metro_aliases) {
            return LocationPass::Matched(LocationMatch::Metro(alias.to_string()));
        }
        if let Some(keyword) = find_term(&location, &self.remote_keywords) {
            return LocationPass::Matched(LocationMatch::Remote(keyword.to_string()));
        }
        LocationPass::Outside
    }
}

enum LocationPass {
    Matched(LocationMatch),
    Outside,
    Blank,
}

fn excluded(reason: ExclusionReason) -> Classification {
    Classification::Excluded { reason }
}

fn normalize(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// First term (in configured order) that occurs in `text` as a whole word
fn find_term<'a>(text: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .find(|term| contains_word(text, term))
        .map(String::as_str)
}

/// `term` occurs in `text` bounded by non-alphanumerics or the string edges
fn contains_word(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    text.match_indices(term).any(|(start, _)| {
        let end = start + term.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
