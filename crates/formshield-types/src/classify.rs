//! Remote classification types: labels, results and the redacted payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::submission::FieldValue;

/// The label a remote classifier assigns to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// The submission looks like a legitimate human message.
    Human,
    /// The submission looks like spam or abuse.
    Spam,
}

impl Label {
    /// Sign used when folding this label into a score: +1 for human,
    /// -1 for spam.
    pub fn sign(&self) -> f64 {
        match self {
            Label::Human => 1.0,
            Label::Spam => -1.0,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Human => write!(f, "human"),
            Label::Spam => write!(f, "spam"),
        }
    }
}

/// The outcome of one remote classifier call.
///
/// Ephemeral: produced and consumed within a single evaluation, persisted
/// only as part of the decision's detail bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResult {
    /// The assigned label.
    pub label: Label,

    /// Confidence in `[0, 1]`. Constructors clamp out-of-range values.
    pub confidence: f64,

    /// Reason tags reported by the classifier itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,

    /// Identifier of the classifier that produced this result. The router
    /// may decorate it (e.g. `"backup(fallback)"`, `"exp(canary)"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Router-assigned weight, set only under the blend strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl ClassifierResult {
    /// Create a result with a clamped confidence and no provenance.
    pub fn new(label: Label, confidence: f64) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            reasons: Vec::new(),
            provider: None,
            weight: None,
        }
    }

    /// Conservative substitute for a malformed classifier response.
    ///
    /// Adapters are expected to normalize anything they cannot parse into
    /// this value before it reaches the router: spam at low confidence,
    /// so a single broken vendor response nudges rather than decides.
    pub fn conservative() -> Self {
        Self::new(Label::Spam, 0.3)
    }

    /// Attach a reason tag.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Attach a provider identifier.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// The PII-safe payload sent to remote classifiers.
///
/// Field order is part of the contract: A/B bucketing hashes the stable
/// JSON serialization of this struct, so reordering fields would silently
/// reassign experiment arms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactedPayload {
    /// SHA-256 hex of the email local-part (or the raw local-part under
    /// the plain PII policy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_hash: Option<String>,

    /// Email domain, never considered PII on its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Truncated message with URLs, phone numbers and email addresses
    /// replaced by placeholder tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Client user-agent, passed through unchanged.
    #[serde(rename = "ua", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Submitted URL, passed through unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Extra fields that survived PII filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, FieldValue>>,
}
