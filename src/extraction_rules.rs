//! Field Extraction Rules
//!
//! Each field of a funding record has an ordered list of independent rules.
//! A rule is a pure function from paragraph text to an optional value; the
//! first rule that matches wins. Typical paragraph shape:
//!
//! "Alder, a two-year-old, New York-based startup building grid software,
//!  has raised $25 million in Series A funding led by Sequoia Capital, with
//!  participation from Accel and Index Ventures."

use regex::Regex;
use std::sync::LazyLock;

use crate::types::Amount;

/// Named extractor for one field
pub struct FieldRule<T> {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<T>,
}

/// Apply rules in order, first match wins
pub fn first_match<T>(rules: &[FieldRule<T>], text: &str) -> Option<T> {
    let (name, value) = matching_rule(rules, text)?;
    tracing::debug!(rule = name, "Field rule matched");
    Some(value)
}

/// The first matching rule's name together with its value
pub fn matching_rule<T>(rules: &[FieldRule<T>], text: &str) -> Option<(&'static str, T)> {
    rules
        .iter()
        .find_map(|rule| (rule.extract)(text).map(|value| (rule.name, value)))
}

/// Longest company name we accept, in words
const MAX_NAME_WORDS: usize = 6;

pub const COMPANY_RULES: &[FieldRule<String>] = &[
    FieldRule { name: "leading-clause", extract: company_leading_clause },
    FieldRule { name: "capitalized-run", extract: company_capitalized_run },
];

pub const AMOUNT_RULES: &[FieldRule<Amount>] = &[
    FieldRule { name: "currency-symbol", extract: amount_currency_symbol },
    FieldRule { name: "currency-word", extract: amount_currency_word },
    FieldRule { name: "undisclosed", extract: amount_undisclosed },
];

pub const ROUND_RULES: &[FieldRule<String>] = &[
    FieldRule { name: "staged-round", extract: round_staged },
    FieldRule { name: "named-round", extract: round_named },
];

pub const LOCATION_RULES: &[FieldRule<String>] = &[
    FieldRule { name: "x-based", extract: location_hyphen_based },
    FieldRule { name: "based-in", extract: location_based_in },
];

pub const DESCRIPTION_RULES: &[FieldRule<String>] = &[
    FieldRule { name: "based-descriptor", extract: description_after_based },
];

static LEADING_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*(?P<name>[A-Z0-9][^,]{0,80}?),\s"));

static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*(?P<name>[A-Z0-9][\w&.'-]*(?:\s+[A-Z0-9][\w&.'-]*)*)")
});

static SYMBOL_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)(?P<currency>[$€£])\s?(?P<number>\d+(?:[.,]\d+)*)(?:\s*(?P<unit>billion|million|thousand|bn|mm|m|b|k))?\b",
    )
});

static WORD_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?P<number>\d+(?:[.,]\d+)*)(?:\s*(?P<unit>billion|million|thousand))?\s+(?P<currency>dollars|euros|pounds|usd|eur|gbp)\b",
    )
});

static UNDISCLOSED_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:an?\s+)?undisclosed\s+(?:amount|sum)"));

static STAGED_ROUND: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?P<round>pre-?seed|seed|series\s+[a-h])\b"));

static NAMED_ROUND: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?P<round>(?:growth|bridge|strategic|extension|venture|debt|convertible)\s+(?:round|funding|financing))\b",
    )
});

static HYPHEN_BASED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?P<location>[A-Z][\w.]*(?:\s+[A-Z][\w.]*)*)-based\b"));

static BASED_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:[Bb]ased|[Hh]eadquartered)\s+in\s+(?P<location>[A-Z][\w.]*(?:(?:\s+|,\s*)[A-Z][\w.]*)*)",
    )
});

static BASED_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)-based\s+(?P<description>[^,]+?),\s+(?:has\s+|have\s+)?(?:just\s+)?raised\b")
});

static LEAD_INVESTORS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bled\s+by\s+(?P<list>[^.;]+?)(?:,?\s+(?:and\s+)?with\s+participation\s+from\b|[.;]|$)")
});

static PARTICIPANTS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bparticipation\s+from\s+(?P<list>[^.;]+)"));

static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\s*,\s*(?:and\s+)?|\s+and\s+"));

/// Patterns are constants; a failure here is a programming error caught by the tests
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| unreachable!("invalid built-in pattern {pattern}: {e}"))
}

fn company_leading_clause(text: &str) -> Option<String> {
    let caps = LEADING_CLAUSE.captures(text)?;
    plausible_name(&caps["name"])
}

fn company_capitalized_run(text: &str) -> Option<String> {
    let caps = CAPITALIZED_RUN.captures(text)?;
    let words: Vec<&str> = caps["name"].split_whitespace().take(MAX_NAME_WORDS).collect();
    plausible_name(&words.join(" "))
}

fn plausible_name(candidate: &str) -> Option<String> {
    let name = candidate.trim().trim_end_matches(['.', '\'']);
    let words = name.split_whitespace().count();
    if words == 0 || words > MAX_NAME_WORDS {
        return None;
    }
    Some(name.to_string())
}

fn amount_currency_symbol(text: &str) -> Option<Amount> {
    let caps = SYMBOL_AMOUNT.captures(text)?;
    let currency = match &caps["currency"] {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        _ => return None,
    };
    Some(parsed_amount(
        caps.get(0)?.as_str(),
        &caps["number"],
        caps.name("unit").map(|m| m.as_str()),
        currency,
    ))
}

fn amount_currency_word(text: &str) -> Option<Amount> {
    let caps = WORD_AMOUNT.captures(text)?;
    let currency = match caps["currency"].to_lowercase().as_str() {
        "dollars" | "usd" => "USD",
        "euros" | "eur" => "EUR",
        "pounds" | "gbp" => "GBP",
        _ => return None,
    };
    Some(parsed_amount(
        caps.get(0)?.as_str(),
        &caps["number"],
        caps.name("unit").map(|m| m.as_str()),
        currency,
    ))
}

fn amount_undisclosed(text: &str) -> Option<Amount> {
    let m = UNDISCLOSED_AMOUNT.find(text)?;
    Some(Amount::Unparsed { text: m.as_str().to_string() })
}

/// Number and unit to a value in whole currency units; falls back to
/// `Unparsed` when the number itself does not parse (e.g. "1.2.3").
fn parsed_amount(matched: &str, number: &str, unit: Option<&str>, currency: &str) -> Amount {
    let text = matched.trim().to_string();
    let multiplier = match unit.map(str::to_lowercase).as_deref() {
        Some("billion" | "bn" | "b") => 1e9,
        Some("million" | "mm" | "m") => 1e6,
        Some("thousand" | "k") => 1e3,
        _ => 1.0,
    };

    match number.replace(',', "").parse::<f64>() {
        Ok(value) => Amount::Parsed {
            value: value * multiplier,
            currency: currency.to_string(),
            text,
        },
        Err(_) => Amount::Unparsed { text },
    }
}

fn round_staged(text: &str) -> Option<String> {
    let caps = STAGED_ROUND.captures(text)?;
    let round = caps["round"].to_lowercase();
    if round == "preseed" {
        return Some("Pre-Seed".to_string());
    }
    Some(title_case(&round))
}

fn round_named(text: &str) -> Option<String> {
    let caps = NAMED_ROUND.captures(text)?;
    Some(title_case(&caps["round"]))
}

/// "series a" -> "Series A", "pre-seed" -> "Pre-Seed"
fn title_case(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    let mut word_start = true;
    for c in phrase.split_whitespace().collect::<Vec<_>>().join(" ").chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        word_start = c == ' ' || c == '-';
    }
    out
}

fn location_hyphen_based(text: &str) -> Option<String> {
    let caps = HYPHEN_BASED.captures(text)?;
    Some(caps["location"].trim().to_string())
}

fn location_based_in(text: &str) -> Option<String> {
    let caps = BASED_IN.captures(text)?;
    Some(caps["location"].trim().trim_end_matches('.').to_string())
}

fn description_after_based(text: &str) -> Option<String> {
    let caps = BASED_DESCRIPTOR.captures(text)?;
    let description = caps["description"].trim();
    (!description.is_empty()).then(|| description.to_string())
}

/// Lead investors, then participants, de-duplicated in order of appearance.
pub fn extract_investors(text: &str) -> Vec<String> {
    let mut investors: Vec<String> = Vec::new();

    let lists = [&*LEAD_INVESTORS, &*PARTICIPANTS]
        .into_iter()
        .filter_map(|pattern| pattern.captures(text))
        .filter_map(|caps| caps.name("list").map(|m| m.as_str().to_string()));

    for list in lists {
        for name in split_investor_list(&list) {
            if !investors.iter().any(|seen| seen.eq_ignore_ascii_case(&name)) {
                investors.push(name);
            }
        }
    }

    investors
}

fn split_investor_list(list: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(list)
        .map(|name| name.trim().trim_start_matches("and ").trim())
        .filter(|name| !name.is_empty())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower != "others" && lower != "other investors"
        })
        .map(str::to_string)
        .collect()
}
