use once_cell::sync::Lazy;
use regex::Regex;

use crate::invoice::{round2, DEFAULT_CLIENT_NAME, DEFAULT_DUE_TERMS, DEFAULT_LINE_DESCRIPTION};

/// Rate used for the single fallback line when the text carries no `$` amount.
pub const FALLBACK_RATE: f64 = 1200.0;

static DUE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)due\s*(?:on|by)\s*([a-z0-9,/\-\s]+)").expect("due date regex"));

static CLIENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)to\s+([a-z\s.]+)(?:,|\s+for|\s+at|\s+by)").expect("client regex"));

static LINE_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:x|×)\s*([^@,;]+?)\s*(?:@|at)\s*\$?([\d,.]+)")
        .expect("line item regex")
});

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([\d,.]+)").expect("amount regex"));

/// One line item pulled out of raw text. Ids are assigned later, at
/// normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedLine {
    pub description: String,
    pub quantity: i64,
    pub rate: f64,
}

/// Parse `"1,200.50"`-style amounts; commas stripped, non-numeric yields 0.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned = raw.replace(',', "");
    cleaned.trim_end_matches('.').parse().unwrap_or(0.0)
}

/// Find the phrase after "due on"/"due by". Absent match yields `"Net 14"`.
pub fn extract_due_date(text: &str) -> String {
    DUE_DATE_RE
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
        .unwrap_or_else(|| DEFAULT_DUE_TERMS.to_string())
}

/// Find the counterparty name after "to", up to a delimiter (comma, "for",
/// "at", "by"). Absent match yields `"Client"`.
pub fn extract_client(text: &str) -> String {
    CLIENT_RE
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
        .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string())
}

/// Pull every `<qty> x <description> @ $<rate>` item out of the text. When no
/// item matches, a single "Services rendered" line is built from the first
/// `$` amount in the text (1200 if none). Rates are rounded as the final step.
pub fn parse_lines(text: &str) -> Vec<ExtractedLine> {
    let mut lines: Vec<ExtractedLine> = LINE_ITEM_RE
        .captures_iter(text)
        .map(|cap| ExtractedLine {
            description: cap[2].trim().to_string(),
            quantity: cap[1].parse().unwrap_or(1),
            rate: parse_amount(&cap[3]),
        })
        .collect();

    if lines.is_empty() {
        let rate = AMOUNT_RE
            .captures(text)
            .map(|cap| parse_amount(&cap[1]))
            .unwrap_or(FALLBACK_RATE);
        lines.push(ExtractedLine {
            description: DEFAULT_LINE_DESCRIPTION.to_string(),
            quantity: 1,
            rate,
        });
    }

    for line in &mut lines {
        line.rate = round2(line.rate);
    }
    lines
}
