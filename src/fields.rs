//! Heuristic structured-field extraction from unstructured text.
//!
//! Pulls contact details out of OCR output (or any other text payload):
//! e-mail addresses, phone-like digit runs, a LinkedIn profile reference
//! and a best-guess personal name. Every field is best-effort; absence or
//! over-matching is an accepted limitation of the heuristics, not an error.
//!
//! The phone pattern matches any 7–15 digit run whose first digit is not
//! zero, so years, invoice numbers and postcodes glued together match too.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fields pulled out of a block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    /// First plausible name line among the first five lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// E-mail addresses in document order.
    pub emails: Vec<String>,
    /// Phone-like digit runs in document order.
    pub phones: Vec<String>,
    /// First `linkedin.com/in/<handle>` reference, lowercased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_ref: Option<String>,
}

impl ExtractedFields {
    /// True when nothing at all was found.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.emails.is_empty()
            && self.phones.is_empty()
            && self.linkedin_ref.is_none()
    }
}

/// Tuning for [`extract_fields_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Drop repeated e-mails and phones, keeping the first occurrence.
    /// Off by default: raw matches are reported including duplicates.
    pub dedupe: bool,
}

/// Number of leading lines considered by the name heuristic.
const NAME_SCAN_LINES: usize = 5;
/// A name line has at most this many whitespace-separated words.
const NAME_MAX_WORDS: usize = 4;

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("email pattern is valid")
});

static RE_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?[1-9][0-9]{6,14}").expect("phone pattern is valid"));

static RE_LINKEDIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)linkedin\.com/in/[\w-]+").expect("linkedin pattern is valid")
});

/// Extract fields with default options (duplicates kept).
///
/// Pure and deterministic: the same text always yields the same result,
/// and empty text yields an empty [`ExtractedFields`].
pub fn extract_fields(text: &str) -> ExtractedFields {
    extract_fields_with(text, &FieldOptions::default())
}

/// Extract fields with explicit options.
pub fn extract_fields_with(text: &str, options: &FieldOptions) -> ExtractedFields {
    if text.is_empty() {
        return ExtractedFields::default();
    }

    let mut emails = find_emails(text);
    let mut phones = find_phones(text);
    if options.dedupe {
        dedupe_in_order(&mut emails);
        dedupe_in_order(&mut phones);
    }

    ExtractedFields {
        name: guess_name(text),
        emails,
        phones,
        linkedin_ref: find_linkedin(text),
    }
}

fn find_emails(text: &str) -> Vec<String> {
    RE_EMAIL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn find_phones(text: &str) -> Vec<String> {
    RE_PHONE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn find_linkedin(text: &str) -> Option<String> {
    RE_LINKEDIN
        .find(text)
        .map(|m| m.as_str().to_lowercase())
}

fn guess_name(text: &str) -> Option<String> {
    text.split('\n')
        .take(NAME_SCAN_LINES)
        .map(str::trim)
        .find(|line| looks_like_name(line))
        .map(str::to_string)
}

fn looks_like_name(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    words.len() <= NAME_MAX_WORDS
        && words
            .iter()
            .any(|w| w.chars().next().is_some_and(char::is_uppercase))
}

fn dedupe_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
