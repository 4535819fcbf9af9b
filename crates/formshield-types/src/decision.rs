//! Decisions, actions and the single score-to-action mapping.

use serde::{Deserialize, Serialize};

/// What the host application should do with a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Accept the submission without review.
    Allow,
    /// Hold the submission for human review.
    Review,
    /// Reject the submission.
    Block,
}

impl Action {
    /// Derive the action for a score.
    ///
    /// This is the only place in the workspace where an action is computed
    /// from a score, so the allow/block thresholds cannot drift between the
    /// rules-only and post-merge finalization paths. The input is clamped
    /// to `[0, 100]` first.
    ///
    /// - `>= 70` -> [`Action::Allow`]
    /// - `<= 35` -> [`Action::Block`]
    /// - otherwise [`Action::Review`]
    pub fn from_score(score: f64) -> Self {
        let clamped = clamp_score(score);
        if clamped >= 70.0 {
            Action::Allow
        } else if clamped <= 35.0 {
            Action::Block
        } else {
            Action::Review
        }
    }
}

/// Clamp a score to the engine's `[0, 100]` range.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// The engine's output for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The recommended action, derived from the score (or forced by an
    /// explicit rule short-circuit).
    pub action: Action,

    /// Final score in `[0, 100]`; 50 is the neutral prior.
    pub score: f64,

    /// Ordered audit trail of reason tags. Order is the causal order of the
    /// checks that fired; duplicates are allowed and meaningful.
    pub reasons: Vec<String>,

    /// Structured detail bag (e.g. classifier provenance), when the AI
    /// stage contributed to the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Decision {
    /// Build a decision from a final score, deriving the action via
    /// [`Action::from_score`].
    pub fn from_score(score: f64, reasons: Vec<String>) -> Self {
        let clamped = clamp_score(score);
        Self {
            action: Action::from_score(clamped),
            score: clamped,
            reasons,
            details: None,
        }
    }
}
