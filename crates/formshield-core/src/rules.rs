//! The rule stage: list checks plus the ordered custom-rule sequence.
//!
//! List checks (allow/block domains and hashed emails) run first and carry
//! the highest priority: they short-circuit before any custom rule sees the
//! submission. Custom rules then run in registration order; each may append
//! reasons, overwrite the running score, or terminate the pipeline with an
//! explicit allow/block.
//!
//! A handful of battle-tested rules from production deployments are
//! exported here for hosts to register as-is.

use std::sync::LazyLock;

use regex::Regex;

use formshield_types::{clamp_score, Action, EngineConfig, NormalizedFields, Submission};

use crate::email;
use crate::error::EngineError;
use crate::traits::{Rule, RuleOutcome};

static PHONE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+?\d[\s\-.()]?){7,}$").unwrap());
static URL_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").unwrap());

/// Outcome of the whole rule stage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StageOutcome {
    /// Set when a list check or custom rule short-circuited.
    pub action: Option<Action>,
    /// Running score after the stage.
    pub score: f64,
}

/// Run list checks and the custom-rule sequence.
///
/// `reasons` is the evaluation's shared audit trail; the stage appends to
/// it in causal order. Collaborator failures wrap into
/// [`EngineError::Rule`] and propagate.
pub(crate) fn run_stage(
    submission: &Submission,
    normalized: &NormalizedFields,
    score: f64,
    reasons: &mut Vec<String>,
    config: &EngineConfig,
    custom: &[Box<dyn Rule>],
) -> Result<StageOutcome, EngineError> {
    let email = normalized.get("email").cloned().unwrap_or_default();
    let domain = if email.is_empty() {
        None
    } else {
        email::extract_domain(&email)
    };

    if let Some(domain) = &domain {
        if config.allow_domains.iter().any(|d| d == domain) {
            reasons.push("rules:allow-domain".to_string());
            return Ok(StageOutcome {
                action: Some(Action::Allow),
                score: 90.0,
            });
        }
        if config.block_domains.iter().any(|d| d == domain) {
            reasons.push("rules:block-domain".to_string());
            return Ok(StageOutcome {
                action: Some(Action::Block),
                score: 5.0,
            });
        }
    }

    if !email.is_empty() {
        let hash = email::hash_local_part(&email);
        if config.allow_emails_hashed.iter().any(|h| h == &hash) {
            reasons.push("rules:allow-email-hash".to_string());
            return Ok(StageOutcome {
                action: Some(Action::Allow),
                score: 95.0,
            });
        }
        if config.block_emails_hashed.iter().any(|h| h == &hash) {
            reasons.push("rules:block-email-hash".to_string());
            return Ok(StageOutcome {
                action: Some(Action::Block),
                score: 0.0,
            });
        }
    }

    let mut score = score;
    for rule in custom {
        let Some(outcome) = rule
            .apply(submission, normalized, score)
            .map_err(EngineError::Rule)?
        else {
            continue;
        };

        reasons.extend(outcome.reasons);
        if let Some(new_score) = outcome.score {
            score = clamp_score(new_score);
        }
        if let Some(action @ (Action::Allow | Action::Block)) = outcome.action {
            return Ok(StageOutcome {
                action: Some(action),
                score,
            });
        }
    }

    Ok(StageOutcome {
        action: None,
        score,
    })
}

// ── Built-in rules ──────────────────────────────────────────────────────

/// Flags phone fields that are malformed, all-repeated or sequential.
#[derive(Debug, Default)]
pub struct PhoneLooksFake;

impl Rule for PhoneLooksFake {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let phone = ["phone", "tel", "telephone"]
            .iter()
            .find_map(|key| normalized.get(*key))
            .cloned()
            .unwrap_or_default();
        if phone.is_empty() {
            return Ok(None);
        }

        if !PHONE_SHAPE_RE.is_match(&phone) {
            return Ok(Some(RuleOutcome {
                score: Some(35.0),
                reasons: vec!["phone:invalid-format".to_string()],
                ..Default::default()
            }));
        }

        let digits: Vec<u32> = phone.chars().filter_map(|c| c.to_digit(10)).collect();

        // e.g. 111-111-1111
        if digits.len() >= 7 && digits.windows(2).all(|w| w[0] == w[1]) {
            return Ok(Some(RuleOutcome {
                score: Some(25.0),
                reasons: vec!["phone:repeated-digits".to_string()],
                ..Default::default()
            }));
        }

        let sequential = digits.windows(2).filter(|w| w[1] == w[0] + 1).count();
        if sequential >= 6 {
            return Ok(Some(RuleOutcome {
                score: Some(30.0),
                reasons: vec!["phone:sequential-digits".to_string()],
                ..Default::default()
            }));
        }

        Ok(None)
    }
}

/// Blocks messages that consist of nothing but a URL.
#[derive(Debug, Default)]
pub struct UrlOnlyMessage;

impl Rule for UrlOnlyMessage {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let msg = normalized.get("message").cloned().unwrap_or_default();
        if !msg.is_empty() && URL_ONLY_RE.is_match(msg.trim()) {
            return Ok(Some(RuleOutcome {
                action: Some(Action::Block),
                score: Some(5.0),
                reasons: vec!["msg:url-only".to_string()],
            }));
        }
        Ok(None)
    }
}

/// Flags submissions whose email domain contradicts the website they claim
/// to represent. Consumer mailboxes are exempt: a gmail.com address next to
/// a company URL is ordinary.
#[derive(Debug, Default)]
pub struct CompanyDomainMismatch;

const CONSUMER_EXEMPT: &[&str] = &["gmail.com", "yahoo.com", "hotmail.com", "outlook.com"];

impl Rule for CompanyDomainMismatch {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let email = normalized.get("email").cloned().unwrap_or_default();
        let Some(email_domain) = (!email.is_empty())
            .then(|| email::extract_domain(&email))
            .flatten()
        else {
            return Ok(None);
        };

        let website = ["website", "url", "company_url"]
            .iter()
            .find_map(|key| normalized.get(*key))
            .cloned()
            .unwrap_or_default();
        if website.is_empty() {
            return Ok(None);
        }

        let website_domain = website
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if website_domain.is_empty() {
            return Ok(None);
        }

        let mismatch = !website_domain.ends_with(&email_domain)
            && !email_domain.ends_with(&website_domain);
        if mismatch && !CONSUMER_EXEMPT.contains(&email_domain.as_str()) {
            return Ok(Some(RuleOutcome {
                score: Some(40.0),
                reasons: vec!["cross:email-website-mismatch".to_string()],
                ..Default::default()
            }));
        }

        Ok(None)
    }
}

/// Flags messages that are mostly upper-case shouting.
#[derive(Debug, Default)]
pub struct ExcessiveCaps;

impl Rule for ExcessiveCaps {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let msg = normalized.get("message").cloned().unwrap_or_default();
        if msg.len() < 20 {
            return Ok(None);
        }

        let letters = msg.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let uppers = msg.chars().filter(|c| c.is_ascii_uppercase()).count();
        if letters > 0 && uppers as f64 / letters as f64 > 0.6 {
            return Ok(Some(RuleOutcome {
                score: Some(35.0),
                reasons: vec!["msg:excessive-caps".to_string()],
                ..Default::default()
            }));
        }

        Ok(None)
    }
}

/// Flags cryptocurrency/trading solicitation patterns (two or more hits).
#[derive(Debug, Default)]
pub struct CryptoSpam;

const CRYPTO_KEYWORDS: &[&str] = &[
    "bitcoin",
    "crypto",
    "forex",
    "trading",
    "investment opportunity",
    "get rich",
    "guaranteed profit",
    "blockchain",
    "nft",
    "web3",
    "airdrop",
];

impl Rule for CryptoSpam {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let msg = normalized
            .get("message")
            .map(|m| m.to_lowercase())
            .unwrap_or_default();
        if msg.is_empty() {
            return Ok(None);
        }

        let matches = CRYPTO_KEYWORDS.iter().filter(|k| msg.contains(*k)).count();
        if matches >= 2 {
            return Ok(Some(RuleOutcome {
                score: Some(25.0),
                reasons: vec!["msg:crypto-spam".to_string()],
                ..Default::default()
            }));
        }

        Ok(None)
    }
}

/// Flags SEO/backlink solicitation (a single hit is already decisive).
#[derive(Debug, Default)]
pub struct SeoSpam;

const SEO_KEYWORDS: &[&str] = &[
    "backlink",
    "seo service",
    "rank higher",
    "google ranking",
    "increase traffic",
    "domain authority",
    "page authority",
    "link building",
    "guest post",
    "sponsored post",
];

impl Rule for SeoSpam {
    fn apply(
        &self,
        _submission: &Submission,
        normalized: &NormalizedFields,
        _running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>> {
        let msg = normalized
            .get("message")
            .map(|m| m.to_lowercase())
            .unwrap_or_default();
        if msg.is_empty() {
            return Ok(None);
        }

        if SEO_KEYWORDS.iter().any(|k| msg.contains(k)) {
            return Ok(Some(RuleOutcome {
                score: Some(20.0),
                reasons: vec!["msg:seo-spam".to_string()],
                ..Default::default()
            }));
        }

        Ok(None)
    }
}
