//! Capability seams consumed by the pipeline.
//!
//! The engine core orchestrates, budgets, routes and merges; the actual
//! signal extraction, custom policy and PII masking are pluggable
//! collaborators behind these traits. Default implementations live in
//! [`heuristics`](crate::heuristics), [`rules`](crate::rules) and
//! [`redact`](crate::redact); hosts can swap any of them at construction
//! time.
//!
//! Collaborator failures are caller configuration errors: the orchestrator
//! wraps them in [`EngineError`](crate::error::EngineError) and propagates
//! rather than degrading. The one exception is [`Classifier`], whose
//! failures the router absorbs per its strategy's fault-tolerance rules.

use async_trait::async_trait;

use formshield_types::{
    Action, ClassifierResult, EngineConfig, NormalizedFields, RedactedPayload, Submission,
};

/// What local scoring contributes: a signed score delta applied to the
/// neutral prior, plus the reason tags that explain it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSignal {
    /// Signed adjustment to the neutral score of 50.
    pub delta: f64,
    /// Reason tags, in the order the checks fired.
    pub reasons: Vec<String>,
}

/// Cheap local scoring over the raw submission and its normalized fields.
pub trait LocalScorer: Send + Sync {
    /// Produce a score delta and reason tags for one submission.
    fn score(
        &self,
        submission: &Submission,
        normalized: &NormalizedFields,
        config: &EngineConfig,
    ) -> anyhow::Result<ScoreSignal>;
}

/// What one rule may do to the running evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// An explicit allow/block that terminates the pipeline immediately.
    /// [`Action::Review`] is never returned here; a rule that cannot
    /// decide returns `None` from [`Rule::apply`] instead.
    pub action: Option<Action>,
    /// Overwrites the running score when set (clamped by the engine).
    pub score: Option<f64>,
    /// Reason tags to append.
    pub reasons: Vec<String>,
}

/// One step of the ordered custom-rule sequence.
pub trait Rule: Send + Sync {
    /// Inspect the submission; return `None` when the rule has nothing to
    /// say.
    fn apply(
        &self,
        submission: &Submission,
        normalized: &NormalizedFields,
        running_score: f64,
    ) -> anyhow::Result<Option<RuleOutcome>>;
}

/// Maps a submission to a PII-safe payload for untrusted remote services.
pub trait Redactor: Send + Sync {
    /// Build the redacted payload. Must never leak the raw email
    /// local-part or phone-like substrings when the configured PII policy
    /// requires hashing.
    fn redact(
        &self,
        submission: &Submission,
        normalized: &NormalizedFields,
        config: &EngineConfig,
    ) -> anyhow::Result<RedactedPayload>;
}

/// A remote classification capability.
///
/// Implemented by provider adapters outside the core and registered
/// explicitly at engine construction; there is no runtime discovery.
/// Adapters must normalize malformed vendor responses to
/// [`ClassifierResult::conservative`] before returning, and keep
/// `confidence` within `[0, 1]`.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Stable identifier this classifier is registered under.
    fn id(&self) -> &str;

    /// Classify a redacted payload. May fail or time out; how that is
    /// handled depends on the router strategy that dispatched the call.
    async fn classify(&self, payload: &RedactedPayload) -> anyhow::Result<ClassifierResult>;
}
