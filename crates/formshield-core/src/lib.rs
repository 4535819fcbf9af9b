//! Form submission spam scoring engine.
//!
//! The crate evaluates a single [`Submission`](formshield_types::Submission)
//! through a fixed pipeline: deterministic local heuristics, an ordered rule
//! stage that can short-circuit, and an optional AI classification stage that
//! only runs when the local score lands in the configured gray band. The
//! result is a [`Decision`](formshield_types::Decision) carrying an action,
//! a score and an ordered reason trail explaining how it was reached.
//!
//! [`FormShield`] is the entry point. Classifier backends plug in through the
//! [`Classifier`](traits::Classifier) trait and are dispatched by the
//! [`router`] according to the configured
//! [`RouterStrategy`](formshield_types::RouterStrategy); the local stages are
//! equally swappable through [`LocalScorer`](traits::LocalScorer),
//! [`Rule`](traits::Rule) and [`Redactor`](traits::Redactor).
//!
//! Remote classifiers never see raw PII. The redaction stage hashes email
//! local parts, masks URLs, phone numbers and embedded addresses out of the
//! message body, and drops PII-bearing extra fields before anything leaves
//! the process.

pub mod budget;
pub mod cache;
pub mod email;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod merge;
pub mod normalize;
pub mod redact;
pub mod registry;
pub mod router;
pub mod rules;
pub mod traits;

pub use budget::{BudgetGate, BudgetStats};
pub use cache::{fingerprint, DecisionCache};
pub use engine::FormShield;
pub use error::{EngineError, Result};
pub use heuristics::HeuristicScorer;
pub use redact::HashingRedactor;
pub use registry::ClassifierRegistry;
pub use traits::{Classifier, LocalScorer, Redactor, Rule, RuleOutcome, ScoreSignal};

// Re-exported so downstream callers only need one crate in scope
pub use formshield_types as types;
