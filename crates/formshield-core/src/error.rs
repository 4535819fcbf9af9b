//! Engine error types.
//!
//! Only two classes of failure abort an evaluation: structural
//! misconfiguration (a strategy referencing a classifier identifier that
//! was never registered) and collaborator failures (scoring, rules,
//! redaction), which are caller configuration errors by contract. Remote
//! classifier failures never surface here -- the router degrades them to
//! partial or empty result sets.

use thiserror::Error;

/// Errors that can abort a pipeline evaluation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A router strategy referenced a classifier identifier that is not
    /// registered. Raised synchronously before any remote call.
    #[error("unknown classifier: {0}")]
    UnknownClassifier(String),

    /// The single intended classifier of a first-available strategy
    /// failed. Not swallowed by the router (that strategy has no fault
    /// tolerance by design); the orchestrator degrades it to an empty
    /// result set.
    #[error("classifier '{id}' failed: {source}")]
    Classify {
        /// Identifier of the failing classifier.
        id: String,
        /// The underlying adapter error.
        #[source]
        source: anyhow::Error,
    },

    /// The local scoring collaborator failed.
    #[error("local scoring failed: {0}")]
    Scoring(#[source] anyhow::Error),

    /// A rule collaborator failed.
    #[error("rule evaluation failed: {0}")]
    Rule(#[source] anyhow::Error),

    /// The redaction collaborator failed.
    #[error("redaction failed: {0}")]
    Redaction(#[source] anyhow::Error),
}

/// Convenience alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_classifier() {
        let err = EngineError::UnknownClassifier("acme".into());
        assert_eq!(err.to_string(), "unknown classifier: acme");
    }

    #[test]
    fn display_classify() {
        let err = EngineError::Classify {
            id: "acme".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(err.to_string(), "classifier 'acme' failed: connection reset");
    }

    #[test]
    fn display_collaborator_errors() {
        let err = EngineError::Scoring(anyhow::anyhow!("bad signal"));
        assert_eq!(err.to_string(), "local scoring failed: bad signal");
        let err = EngineError::Redaction(anyhow::anyhow!("oops"));
        assert_eq!(err.to_string(), "redaction failed: oops");
    }
}
