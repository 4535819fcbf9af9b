//! Field canonicalization and small text utilities.
//!
//! Every evaluation derives one [`NormalizedFields`] map from the raw
//! submission: NFC unicode normalization, whitespace collapsing and HTML
//! stripping. The rest of the pipeline only ever reads this map, so a
//! check in heuristics and a check in a rule always see the same text.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use formshield_types::{NormalizedFields, Submission};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)https?://\S+").unwrap());

/// Canonicalize one raw value: NFC, trim, collapse whitespace, strip HTML.
pub fn normalize_value(raw: &str) -> String {
    let nfc: String = raw.nfc().collect();
    let collapsed = WHITESPACE_RE.replace_all(nfc.trim(), " ");
    HTML_TAG_RE.replace_all(&collapsed, "").into_owned()
}

/// Build the normalized view of a submission.
///
/// Top-level fields win over same-named entries in the open-ended field
/// map; the map fills in everything else.
pub fn normalize_fields(submission: &Submission) -> NormalizedFields {
    let mut out = NormalizedFields::new();

    let mut add = |key: &str, value: Option<String>| {
        if let Some(v) = value {
            out.insert(key.to_string(), normalize_value(&v));
        }
    };

    let field_text = |key: &str| submission.fields.get(key).and_then(|v| v.as_text());

    add("email", submission.email.clone().or_else(|| field_text("email")));
    add("name", submission.name.clone().or_else(|| field_text("name")));
    add(
        "message",
        submission.message.clone().or_else(|| field_text("message")),
    );
    add("url", submission.url.clone());

    for (key, value) in &submission.fields {
        if !out.contains_key(key) {
            if let Some(text) = value.as_text() {
                out.insert(key.clone(), normalize_value(&text));
            }
        }
    }

    out
}

/// Replace every URL in the text with a `[URL]` token.
pub fn replace_urls(text: &str) -> String {
    URL_RE.replace_all(text, "[URL]").into_owned()
}

/// Shannon entropy of a string in bits per character, case-folded.
///
/// High entropy over a short identifier is a randomness signal (e.g.
/// machine-generated email local-parts).
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let lowered: Vec<char> = text.to_lowercase().chars().collect();
    let len = lowered.len() as f64;
    let mut freq = std::collections::HashMap::new();
    for ch in &lowered {
        *freq.entry(*ch).or_insert(0usize) += 1;
    }

    freq.values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}
