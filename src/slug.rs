//! Company name to ATS slug candidates
//!
//! Pure and deterministic: "Gather AI, Inc." always yields
//! `["gather-ai", "gatherai", "gather"]`.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::SlugConfig;
use crate::types::SlugCandidates;

static LEGAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\s,]+(?:inc|llc|ltd|corp|co|company)\.?$")
        .unwrap_or_else(|e| unreachable!("invalid legal suffix pattern: {e}"))
});

pub struct SlugResolver {
    descriptor_words: Vec<String>,
}

impl SlugResolver {
    pub fn new(config: &SlugConfig) -> Self {
        Self {
            descriptor_words: config
                .descriptor_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }

    /// Ordered candidates, most likely match first. Never contains an empty slug.
    pub fn resolve(&self, company_name: &str) -> SlugCandidates {
        SlugCandidates {
            company_name: company_name.to_string(),
            slugs: self.candidates(company_name),
        }
    }

    pub fn candidates(&self, company_name: &str) -> Vec<String> {
        let lowered = company_name.trim().to_lowercase();
        let stripped = strip_legal_suffixes(&lowered);
        let owned = split_words(&stripped);
        let words: Vec<&str> = owned.iter().map(String::as_str).collect();

        if words.is_empty() {
            // Nothing alphanumeric left; the lowercased name is the only option
            return if lowered.is_empty() { Vec::new() } else { vec![lowered] };
        }

        let mut slugs = Vec::new();
        push_forms(&mut slugs, &words);

        let core: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| !self.descriptor_words.iter().any(|d| d == w))
            .collect();
        if !core.is_empty() && core.len() < words.len() {
            push_forms(&mut slugs, &core);
        }

        slugs
    }
}

/// Hyphenated form, then the separator-free form
fn push_forms(slugs: &mut Vec<String>, words: &[&str]) {
    for slug in [words.join("-"), words.concat()] {
        if !slug.is_empty() && !slugs.contains(&slug) {
            slugs.push(slug);
        }
    }
}

/// "acme, inc." -> "acme"; repeated so "acme co., ltd" loses both
fn strip_legal_suffixes(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        let next = LEGAL_SUFFIX.replace(&current, "").trim().to_string();
        if next == current || next.is_empty() {
            return current;
        }
        current = next;
    }
}

/// Words split on separators; letters outside ASCII are dropped from inside
/// a word rather than treated as a break ("ünïcode" -> "ncode")
fn split_words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}
