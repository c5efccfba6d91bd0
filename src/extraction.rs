//! Funding Record Extraction
//!
//! Finds the funding sections of a rendered newsletter issue and turns each
//! announcement paragraph into a `FundingRecord`:
//! 1. Locate headings whose text names a funding section
//! 2. Climb to the heading's wrapper inside the content container
//! 3. Walk the wrapper's following siblings until the next heading
//! 4. Run the field rules over every paragraph

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::config::ExtractionConfig;
use crate::context::{ErrorKind, RunContext};
use crate::error::ExtractionParseFailure;
use crate::extraction_rules::{
    extract_investors, first_match, AMOUNT_RULES, COMPANY_RULES, DESCRIPTION_RULES,
    LOCATION_RULES, ROUND_RULES,
};
use crate::types::FundingRecord;

const HEADING_CANDIDATES: &str = "h1, h2, h3, h4, strong, b, p";
const SECTION_BREAKS: &str = "h1, h2, h3, h4";
const CONTAINERS: &str = "body, #content-blocks, .post-content";

/// Characters of a paragraph quoted in parse-failure messages
const EXCERPT_CHARS: usize = 80;

/// One announcement paragraph and the section it was listed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingParagraph {
    pub section: String,
    pub text: String,
}

pub struct FundingExtractor {
    headings: Vec<String>,
    min_paragraph_chars: usize,
    heading_candidates: Selector,
    section_breaks: Selector,
    containers: Selector,
}

impl FundingExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            headings: config
                .funding_headings
                .iter()
                .map(|h| h.trim().to_lowercase())
                .collect(),
            min_paragraph_chars: config.min_paragraph_chars,
            heading_candidates: selector(HEADING_CANDIDATES),
            section_breaks: selector(SECTION_BREAKS),
            containers: selector(CONTAINERS),
        }
    }

    /// Extract every funding record from one rendered document.
    ///
    /// Paragraphs without a company name are counted and reported on the
    /// context, never raised.
    pub fn extract(&self, html: &str, document_id: &str, ctx: &RunContext) -> Vec<FundingRecord> {
        let paragraphs = self.funding_paragraphs(html);
        let mut records = Vec::with_capacity(paragraphs.len());

        for paragraph in paragraphs {
            ctx.update(|c| c.sections_seen += 1);

            match parse_paragraph(&paragraph, document_id) {
                Ok(record) => {
                    let structured = record.has_structured_fields();
                    ctx.update(|c| {
                        if structured {
                            c.records_parsed += 1;
                        } else {
                            c.records_fallback += 1;
                        }
                    });
                    records.push(record);
                }
                Err(failure) => {
                    tracing::warn!(document = %document_id, "{}", failure);
                    ctx.update(|c| c.parse_failures += 1);
                    ctx.record_error(ErrorKind::ExtractionParse, failure.to_string());
                }
            }
        }

        tracing::info!(
            document = %document_id,
            records = records.len(),
            "Extracted funding records"
        );
        records
    }

    /// Paragraphs under the funding headings, in document order.
    pub fn funding_paragraphs(&self, html: &str) -> Vec<FundingParagraph> {
        let document = Html::parse_document(html);
        let mut seen_wrappers = HashSet::new();
        let mut paragraphs = Vec::new();

        for candidate in document.select(&self.heading_candidates) {
            let text = element_text(&candidate).to_lowercase();
            let Some(section) = self.headings.iter().find(|h| text.contains(h.as_str())) else {
                continue;
            };

            // Nested heading markup (<h2><strong>..</strong></h2>) reaches the same wrapper
            let wrapper = self.section_wrapper(candidate);
            if !seen_wrappers.insert(wrapper.id()) {
                continue;
            }

            let before = paragraphs.len();
            for sibling in wrapper.next_siblings().filter_map(ElementRef::wrap) {
                let sibling_text = element_text(&sibling);
                if self.is_section_break(&sibling, &sibling_text) {
                    break;
                }
                if sibling_text.chars().count() < self.min_paragraph_chars {
                    continue;
                }
                paragraphs.push(FundingParagraph {
                    section: section.clone(),
                    text: sibling_text,
                });
            }

            tracing::debug!(
                section = %section,
                paragraphs = paragraphs.len() - before,
                "Funding section located"
            );
        }

        paragraphs
    }

    /// Outermost ancestor of `heading` that is still inside a content container
    fn section_wrapper<'a>(&self, heading: ElementRef<'a>) -> ElementRef<'a> {
        let mut current = heading;
        while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
            if self.containers.matches(&parent) || parent.value().name() == "html" {
                break;
            }
            current = parent;
        }
        current
    }

    fn is_section_break(&self, element: &ElementRef, text: &str) -> bool {
        if self.section_breaks.matches(element) || element.select(&self.section_breaks).next().is_some() {
            return true;
        }
        let lower = text.to_lowercase();
        self.headings.iter().any(|h| lower.contains(h.as_str()))
    }
}

/// Build a record from one paragraph. `raw_text` is always the paragraph verbatim.
pub fn parse_paragraph(
    paragraph: &FundingParagraph,
    document_id: &str,
) -> Result<FundingRecord, ExtractionParseFailure> {
    let text = paragraph.text.as_str();
    let company_name = first_match(COMPANY_RULES, text).ok_or_else(|| ExtractionParseFailure {
        document_id: document_id.to_string(),
        excerpt: text.chars().take(EXCERPT_CHARS).collect(),
    })?;

    Ok(FundingRecord {
        company_name,
        amount: first_match(AMOUNT_RULES, text),
        round: first_match(ROUND_RULES, text),
        location: first_match(LOCATION_RULES, text),
        description: first_match(DESCRIPTION_RULES, text),
        investors: extract_investors(text),
        section: paragraph.section.clone(),
        source_document_id: document_id.to_string(),
        raw_text: paragraph.text.clone(),
    })
}

/// Visible text of an element with whitespace runs collapsed
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| unreachable!("invalid built-in selector {css}: {e:?}"))
}
