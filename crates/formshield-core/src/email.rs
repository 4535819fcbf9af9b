//! Email address analysis: validation, hashing and local-part quality.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::normalize::shannon_entropy;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static NUMERIC_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]+[0-9]{4,}$").unwrap());
static HUMAN_SEPARATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]{2,}[._+-][a-z]{2,}").unwrap());
static HUMAN_SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]{3,}[._+-]?[a-z]{0,3}$").unwrap());

/// Generic consumer mail domains, where local-parts are expected to look
/// human rather than machine-generated.
const CONSUMER_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "mail.com",
    "protonmail.com",
    "gmx.com",
    "yandex.com",
    "zoho.com",
];

/// Common keyboard-walk fragments found in mashed local-parts.
const KEYBOARD_WALKS: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "123456", "qazwsx", "poiuyt"];

/// Loose RFC-style shape check: one `@`, non-empty parts, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// SHA-256 hex digest of the email local-part.
///
/// Used both for privacy-preserving allow/block lists and for the
/// redacted payload sent to remote classifiers.
pub fn hash_local_part(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    hex::encode(Sha256::digest(local.as_bytes()))
}

/// Lowercased domain of an email, or `None` if the shape is wrong.
pub fn extract_domain(email: &str) -> Option<String> {
    let mut parts = email.split('@');
    let _local = parts.next()?;
    let domain = parts.next()?;
    if parts.next().is_some() || domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

/// Whether the domain looks like a workplace rather than a generic
/// consumer mailbox.
pub fn is_workplace_domain(domain: &str) -> bool {
    !CONSUMER_DOMAINS.contains(&domain.to_lowercase().as_str())
}

/// Whether an email domain plausibly belongs to a website domain
/// (exact match or subdomain).
pub fn domains_match(email_domain: &str, website_domain: &str) -> bool {
    let email = email_domain.to_lowercase();
    let email = email.strip_prefix("www.").unwrap_or(&email);
    let site = website_domain.to_lowercase();
    let site = site.strip_prefix("www.").unwrap_or(&site);
    email == site || email.ends_with(&format!(".{site}"))
}

/// Gibberish signals extracted from an email local-part.
///
/// All deltas are negative or zero; the reasons explain which signals
/// fired, in check order.
pub fn local_part_quality(local: &str, domain: &str) -> (f64, Vec<String>) {
    let mut delta = 0.0;
    let mut reasons = Vec::new();

    if shannon_entropy(local) > 4.5 {
        delta -= 15.0;
        reasons.push("email:high-entropy".to_string());
    }

    // e.g. john48211 -- throwaway pattern
    if NUMERIC_SUFFIX_RE.is_match(local) {
        delta -= 12.0;
        reasons.push("email:numeric-suffix-spam".to_string());
    }

    if !local.is_empty() {
        let vowels = local
            .chars()
            .filter(|c| "aeiouAEIOU".contains(*c))
            .count() as f64;
        let ratio = vowels / local.chars().count() as f64;
        if !(0.1..=0.8).contains(&ratio) {
            delta -= 10.0;
            reasons.push("email:abnormal-vowel-ratio".to_string());
        }
    }

    if CONSUMER_DOMAINS.contains(&domain.to_lowercase().as_str()) {
        let human_like = HUMAN_SEPARATED_RE.is_match(local) || HUMAN_SHORT_RE.is_match(local);
        if !human_like {
            delta -= 18.0;
            reasons.push("email:random-on-consumer-domain".to_string());
        }
    }

    if has_repeated_run(local, 3) {
        delta -= 8.0;
        reasons.push("email:repeated-chars".to_string());
    }

    let lowered = local.to_lowercase();
    if KEYBOARD_WALKS.iter().any(|walk| lowered.contains(walk)) {
        delta -= 10.0;
        reasons.push("email:keyboard-mash".to_string());
    }

    (delta, reasons)
}

/// Whether the text contains a run of `min_run + 1` identical characters.
pub(crate) fn has_repeated_run(text: &str, min_run: usize) -> bool {
    let mut run = 1usize;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if Some(ch) == prev {
            run += 1;
            if run > min_run {
                return true;
            }
        } else {
            run = 1;
            prev = Some(ch);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_and_invalid_shapes() {
        assert!(is_valid_email("jane.doe@example.com"));
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("nodot@example"));
    }

    #[test]
    fn extract_domain_lowercases() {
        assert_eq!(
            extract_domain("Jane@Example.COM").as_deref(),
            Some("example.com")
        );
        assert!(extract_domain("nodomain").is_none());
        assert!(extract_domain("a@b@c.com").is_none());
    }

    #[test]
    fn hash_is_stable_and_local_only() {
        let a = hash_local_part("jane@example.com");
        let b = hash_local_part("jane@other.org");
        assert_eq!(a, b, "hash must cover only the local-part");
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_local_part("john@example.com"));
    }

    #[test]
    fn workplace_vs_consumer() {
        assert!(is_workplace_domain("acme-corp.com"));
        assert!(!is_workplace_domain("gmail.com"));
        assert!(!is_workplace_domain("GMAIL.com"));
    }

    #[test]
    fn domains_match_handles_www_and_subdomains() {
        assert!(domains_match("acme.com", "www.acme.com"));
        assert!(domains_match("mail.acme.com", "acme.com"));
        assert!(!domains_match("acme.com", "other.com"));
    }

    #[test]
    fn quality_flags_numeric_suffix() {
        let (delta, reasons) = local_part_quality("john48211", "example.com");
        assert!(delta < 0.0);
        assert!(reasons.contains(&"email:numeric-suffix-spam".to_string()));
    }

    #[test]
    fn quality_flags_random_consumer_local() {
        let (delta, reasons) = local_part_quality("xk9q2zv7", "gmail.com");
        assert!(delta <= -18.0);
        assert!(reasons.contains(&"email:random-on-consumer-domain".to_string()));
    }

    #[test]
    fn quality_accepts_human_patterns() {
        let (_, reasons) = local_part_quality("jane.doe", "gmail.com");
        assert!(!reasons.contains(&"email:random-on-consumer-domain".to_string()));
    }

    #[test]
    fn quality_flags_keyboard_mash_and_repeats() {
        let (_, reasons) = local_part_quality("qwertyuser", "example.com");
        assert!(reasons.contains(&"email:keyboard-mash".to_string()));

        let (_, reasons) = local_part_quality("aaaab", "example.com");
        assert!(reasons.contains(&"email:repeated-chars".to_string()));
    }

    #[test]
    fn repeated_run_detection() {
        assert!(has_repeated_run("xaaaay", 3));
        assert!(!has_repeated_run("xaaay", 3));
        assert!(!has_repeated_run("", 3));
    }
}
