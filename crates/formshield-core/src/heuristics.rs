//! Default local scoring collaborator.
//!
//! [`HeuristicScorer`] extracts cheap regex/entropy signals from the
//! submission and returns a signed delta against the neutral prior of 50.
//! It never performs I/O and never escalates; that is the orchestrator's
//! job.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use formshield_types::{EngineConfig, NormalizedFields, Submission};

use crate::email;
use crate::traits::{LocalScorer, ScoreSignal};

static URL_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").unwrap());
static URL_FIND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)https?://\S+").unwrap());
static BASE64_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap()
});

/// Prompt-injection markers. Form spam increasingly targets the AI stage
/// itself, so these are penalized before any payload is built.
static INJECTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)ignore\s+previous",
        r"(?i)system\s*:",
        r"(?i)assistant\s*:",
        r"(?i)<script>",
        r"(?i)</system>",
        r"(?i)you\s+are\s+now",
        r"(?i)\[INST\]",
        r"(?i)<<SYS>>",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Built-in disposable-address domains, extended by
/// [`EngineConfig::disposable_domains`].
const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "yopmail.com",
    "trashmail.com",
    "sharklasers.com",
    "getnada.com",
    "dispostable.com",
    "maildrop.cc",
    "throwawaymail.com",
];

/// Regex/entropy-based local scorer covering email, message, name, timing
/// and user-agent signals.
#[derive(Debug, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    /// Create a new heuristic scorer.
    pub fn new() -> Self {
        Self
    }
}

impl LocalScorer for HeuristicScorer {
    fn score(
        &self,
        submission: &Submission,
        normalized: &NormalizedFields,
        config: &EngineConfig,
    ) -> anyhow::Result<ScoreSignal> {
        let mut signal = ScoreSignal::default();

        score_email(normalized.get("email").map(String::as_str), config, &mut signal);
        score_message(normalized.get("message").map(String::as_str), config, &mut signal);
        score_name(normalized.get("name").map(String::as_str), &mut signal);
        score_timing(submission, &mut signal);
        score_user_agent(submission.user_agent.as_deref(), &mut signal);

        Ok(signal)
    }
}

fn score_email(email: Option<&str>, config: &EngineConfig, signal: &mut ScoreSignal) {
    let Some(email) = email.filter(|e| !e.is_empty()) else {
        signal.delta -= 15.0;
        signal.reasons.push("email:missing".to_string());
        return;
    };

    if !email::is_valid_email(email) {
        signal.delta -= 20.0;
        signal.reasons.push("email:invalid-format".to_string());
        return;
    }

    let Some(domain) = email::extract_domain(email) else {
        return;
    };
    let local = email.split('@').next().unwrap_or_default();

    if DISPOSABLE_DOMAINS.contains(&domain.as_str())
        || config.disposable_domains.iter().any(|d| d == &domain)
    {
        signal.delta -= 25.0;
        signal.reasons.push("email:disposable-domain".to_string());
    }

    if config.block_domains.iter().any(|d| d == &domain) {
        signal.delta -= 50.0;
        signal.reasons.push("email:blocked-domain".to_string());
    }

    if let Some(tld) = domain.rsplit('.').next() {
        if let Some(penalty) = config.tld_risk.get(tld) {
            signal.delta -= penalty;
            signal.reasons.push(format!("email:risky-tld-{tld}"));
        }
    }

    let (quality_delta, quality_reasons) = email::local_part_quality(local, &domain);
    signal.delta += quality_delta;
    signal.reasons.extend(quality_reasons);
}

fn score_message(message: Option<&str>, config: &EngineConfig, signal: &mut ScoreSignal) {
    let Some(message) = message.filter(|m| !m.is_empty()) else {
        signal.delta -= 10.0;
        signal.reasons.push("msg:missing".to_string());
        return;
    };

    if URL_ONLY_RE.is_match(message.trim()) {
        signal.delta -= 30.0;
        signal.reasons.push("msg:url-only".to_string());
    }

    let urls: Vec<&str> = URL_FIND_RE.find_iter(message).map(|m| m.as_str()).collect();
    if urls.len() > 3 {
        signal.delta -= 15.0;
        signal.reasons.push("msg:excessive-urls".to_string());
    } else if urls.len() > 1 {
        signal.delta -= 8.0;
        signal.reasons.push("msg:multiple-urls".to_string());
    }

    let url_chars: usize = urls.iter().map(|u| u.len()).sum();
    if url_chars as f64 / message.len() as f64 > 0.5 {
        signal.delta -= 12.0;
        signal.reasons.push("msg:high-link-density".to_string());
    }

    if message.len() < 10 {
        signal.delta -= 10.0;
        signal.reasons.push("msg:too-short".to_string());
    } else if message.len() > 5000 {
        signal.delta -= 5.0;
        signal.reasons.push("msg:suspiciously-long".to_string());
    }

    let lowered = message.to_lowercase();
    for keyword in &config.block_keywords {
        if lowered.contains(&keyword.to_lowercase()) {
            signal.delta -= 15.0;
            signal.reasons.push(format!("msg:blocked-keyword-{keyword}"));
        }
    }

    if INJECTION_RES.iter().any(|re| re.is_match(message)) {
        signal.delta -= 20.0;
        signal.reasons.push("ai:injection-attempt".to_string());
    }

    // A single long base64 token smells like a smuggled payload
    if message
        .split_whitespace()
        .any(|word| word.len() > 50 && BASE64_RE.is_match(word))
    {
        signal.delta -= 15.0;
        signal.reasons.push("msg:base64-payload".to_string());
    }

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for token in lowered.split_whitespace() {
        if token.len() > 3 {
            *freq.entry(token).or_insert(0) += 1;
        }
    }
    if freq.values().copied().max().unwrap_or(0) > 5 {
        signal.delta -= 10.0;
        signal.reasons.push("msg:keyword-stuffing".to_string());
    }
}

fn score_name(name: Option<&str>, signal: &mut ScoreSignal) {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        signal.delta -= 5.0;
        signal.reasons.push("name:missing".to_string());
        return;
    };

    let emoji_count = name
        .chars()
        .filter(|c| ('\u{1F300}'..='\u{1F9FF}').contains(c))
        .count();
    if emoji_count > 2 {
        signal.delta -= 10.0;
        signal.reasons.push("name:excessive-emoji".to_string());
    }

    let char_count = name.chars().count();
    let ascii_count = name.chars().filter(char::is_ascii).count();
    if char_count > 5 && (ascii_count as f64 / char_count as f64) < 0.5 {
        signal.delta -= 5.0;
        signal.reasons.push("name:low-ascii-ratio".to_string());
    }

    if email::has_repeated_run(name, 3) {
        signal.delta -= 8.0;
        signal.reasons.push("name:repeated-chars".to_string());
    }
}

fn score_timing(submission: &Submission, signal: &mut ScoreSignal) {
    let Some(fill_ms) = submission.fill_time_ms() else {
        return;
    };

    if fill_ms < 2_000 {
        signal.delta -= 15.0;
        signal.reasons.push("timing:too-fast".to_string());
    }
    if fill_ms > 3_600_000 {
        signal.delta -= 5.0;
        signal.reasons.push("timing:suspiciously-slow".to_string());
    }
}

fn score_user_agent(user_agent: Option<&str>, signal: &mut ScoreSignal) {
    let Some(ua) = user_agent else {
        return;
    };

    let lowered = ua.to_lowercase();
    if ["bot", "crawler", "spider", "scraper"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        signal.delta -= 25.0;
        signal.reasons.push("ua:bot-detected".to_string());
    }

    if lowered.trim().is_empty() {
        signal.delta -= 10.0;
        signal.reasons.push("ua:missing".to_string());
    }
}
