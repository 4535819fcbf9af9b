//! Default PII redaction collaborator.
//!
//! Remote classifiers are untrusted: everything that leaves the process
//! goes through [`HashingRedactor`] first. Under the default
//! [`PiiPolicy::HashLocal`] the email local-part is hashed, phone-like and
//! email-like substrings in the message are masked, and well-known PII
//! field keys are dropped from the extra-field map.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use formshield_types::{
    EngineConfig, FieldValue, NormalizedFields, PiiPolicy, RedactedPayload, Submission,
};

use crate::email;
use crate::normalize::replace_urls;
use crate::traits::Redactor;

/// Messages are truncated to this length before transmission.
const MESSAGE_LIMIT: usize = 1500;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s\-.]?)?(?:\(?\d{3}\)?[\s\-.]?)?\d{3}[\s\-.]?\d{4}").unwrap()
});
static EMAIL_IN_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

/// Field keys that never leave the process under the hashing policy.
const PII_FIELD_KEYS: &[&str] = &["email", "phone", "tel", "name", "first_name", "last_name"];

/// Default redactor: hashes, masks and truncates per the configured
/// [`PiiPolicy`].
#[derive(Debug, Default)]
pub struct HashingRedactor;

impl HashingRedactor {
    /// Create a new redactor.
    pub fn new() -> Self {
        Self
    }
}

impl Redactor for HashingRedactor {
    fn redact(
        &self,
        submission: &Submission,
        normalized: &NormalizedFields,
        config: &EngineConfig,
    ) -> anyhow::Result<RedactedPayload> {
        let email = normalized.get("email").cloned().unwrap_or_default();
        let message = normalized.get("message").cloned().unwrap_or_default();

        let mut email_hash = None;
        let mut domain = None;
        if !email.is_empty() {
            domain = email::extract_domain(&email);
            email_hash = Some(match config.pii_policy {
                PiiPolicy::HashLocal => email::hash_local_part(&email),
                PiiPolicy::Plain => email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        let redacted_message = if message.is_empty() {
            None
        } else {
            Some(mask_message(&message))
        };

        let fields = match config.pii_policy {
            PiiPolicy::HashLocal if !submission.fields.is_empty() => {
                let kept: HashMap<String, FieldValue> = submission
                    .fields
                    .iter()
                    .filter(|(key, _)| !is_pii_key(key))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(kept)
            }
            _ => None,
        };

        Ok(RedactedPayload {
            email_hash,
            domain,
            message: redacted_message,
            user_agent: submission.user_agent.clone(),
            url: submission.url.clone(),
            fields,
        })
    }
}

/// Truncate and mask a message: URLs, then phone-like runs, then embedded
/// email addresses.
fn mask_message(message: &str) -> String {
    let truncated: String = message.chars().take(MESSAGE_LIMIT).collect();
    let no_urls = replace_urls(&truncated);
    let no_phones = PHONE_RE.replace_all(&no_urls, "[PHONE]");
    EMAIL_IN_TEXT_RE
        .replace_all(&no_phones, "[EMAIL]")
        .into_owned()
}

fn is_pii_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    let canonical = lowered.replace(['-', ' '], "_");
    PII_FIELD_KEYS.contains(&canonical.as_str())
        || canonical == "firstname"
        || canonical == "lastname"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_fields;

    fn redact(sub: &Submission, config: &EngineConfig) -> RedactedPayload {
        let normalized = normalize_fields(sub);
        HashingRedactor::new().redact(sub, &normalized, config).unwrap()
    }

    fn sample() -> Submission {
        let mut sub = Submission {
            email: Some("jane.doe@acme.com".into()),
            message: Some(
                "Call me at 555-012-3456 or mail jane.doe@acme.com, see https://acme.com".into(),
            ),
            user_agent: Some("Mozilla/5.0".into()),
            url: Some("https://acme.com".into()),
            ..Default::default()
        };
        sub.fields
            .insert("phone".into(), FieldValue::Text("555-012-3456".into()));
        sub.fields
            .insert("company".into(), FieldValue::Text("Acme".into()));
        sub
    }

    #[test]
    fn hashes_local_part_under_default_policy() {
        let payload = redact(&sample(), &EngineConfig::default());
        let hash = payload.email_hash.unwrap();
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("jane"));
        assert_eq!(payload.domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn plain_policy_sends_local_part() {
        let config = EngineConfig {
            pii_policy: PiiPolicy::Plain,
            ..Default::default()
        };
        let payload = redact(&sample(), &config);
        assert_eq!(payload.email_hash.as_deref(), Some("jane.doe"));
    }

    #[test]
    fn masks_urls_phones_and_emails_in_message() {
        let payload = redact(&sample(), &EngineConfig::default());
        let msg = payload.message.unwrap();
        assert!(msg.contains("[URL]"), "message: {msg}");
        assert!(msg.contains("[PHONE]"), "message: {msg}");
        assert!(msg.contains("[EMAIL]"), "message: {msg}");
        assert!(!msg.contains("555-012-3456"));
        assert!(!msg.contains("jane.doe@acme.com"));
    }

    #[test]
    fn truncates_long_messages() {
        let mut sub = sample();
        sub.message = Some("a".repeat(4_000));
        let payload = redact(&sub, &EngineConfig::default());
        assert_eq!(payload.message.unwrap().len(), MESSAGE_LIMIT);
    }

    #[test]
    fn drops_pii_field_keys_under_hashing_policy() {
        let payload = redact(&sample(), &EngineConfig::default());
        let fields = payload.fields.unwrap();
        assert!(!fields.contains_key("phone"));
        assert!(fields.contains_key("company"));
    }

    #[test]
    fn keeps_fields_out_under_plain_policy() {
        let config = EngineConfig {
            pii_policy: PiiPolicy::Plain,
            ..Default::default()
        };
        let payload = redact(&sample(), &config);
        assert!(payload.fields.is_none());
    }

    #[test]
    fn empty_submission_produces_empty_payload() {
        let payload = redact(&Submission::default(), &EngineConfig::default());
        assert_eq!(payload, RedactedPayload::default());
    }
}
