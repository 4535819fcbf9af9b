//! Data model and configuration types for the formshield decision engine.
//!
//! This crate is the pure-data foundation of the workspace: submissions,
//! decisions, classifier results, and the serializable engine configuration.
//! It has no async code and no I/O, so both the core engine and host
//! applications can depend on it cheaply.
//!
//! # Architecture
//!
//! - [`Submission`] is the immutable input record for one evaluation
//! - [`Decision`] is the engine's output: an [`Action`], a score and an
//!   ordered audit trail of reason tags
//! - [`ClassifierResult`] is what one remote classifier call produces
//! - [`EngineConfig`] and [`RouterStrategy`] describe how an engine
//!   instance scores, escalates and budgets

pub mod classify;
pub mod config;
pub mod decision;
pub mod submission;

pub use classify::{ClassifierResult, Label, RedactedPayload};
pub use config::{BlendMember, BudgetLimits, EngineConfig, PiiPolicy, RouterStrategy};
pub use decision::{clamp_score, Action, Decision};
pub use submission::{FieldValue, Submission};

/// Canonicalized submission fields, keyed by field name.
///
/// Derived once per evaluation by the engine's normalizer and treated as
/// read-only for the rest of the pipeline.
pub type NormalizedFields = std::collections::HashMap<String, String>;
