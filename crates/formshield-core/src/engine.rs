//! The pipeline orchestrator.
//!
//! [`FormShield::evaluate`] sequences cache lookup, local scoring, rules,
//! the gray-band gate, the budget gate, redaction, routing and merging,
//! and owns all short-circuit logic. Control flow is strictly top-down;
//! the router is the only stage that runs anything concurrently.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use formshield_types::{clamp_score, Decision, EngineConfig, RouterStrategy, Submission};

use crate::budget::{BudgetGate, BudgetStats};
use crate::cache::{fingerprint, DecisionCache};
use crate::error::{EngineError, Result};
use crate::heuristics::HeuristicScorer;
use crate::merge;
use crate::normalize::normalize_fields;
use crate::redact::HashingRedactor;
use crate::registry::ClassifierRegistry;
use crate::router;
use crate::rules;
use crate::traits::{Classifier, LocalScorer, Redactor, Rule};

/// Score that every evaluation starts from before any signal is applied.
const NEUTRAL_SCORE: f64 = 50.0;

/// Mutable scoring state threaded through one evaluation: the running
/// score and the append-only, causally ordered reason trail.
#[derive(Debug, Clone)]
struct ScoreState {
    score: f64,
    reasons: Vec<String>,
}

impl ScoreState {
    fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            reasons: Vec::new(),
        }
    }
}

/// The spam/abuse decision engine.
///
/// One instance owns its own cache and budget gate, so multiple engines
/// with different configurations can coexist in a process without
/// cross-talk. Collaborators default to the built-in heuristic scorer and
/// hashing redactor; classifiers and custom rules are registered at
/// construction time.
///
/// # Example
///
/// ```rust,ignore
/// use formshield_core::FormShield;
/// use formshield_types::{EngineConfig, Submission};
///
/// let engine = FormShield::new(EngineConfig::default())
///     .with_classifier(Arc::new(MyVendorAdapter::new()))
///     .with_rule(Box::new(formshield_core::rules::SeoSpam));
///
/// let decision = engine.evaluate(&submission).await?;
/// println!("{:?} ({}): {:?}", decision.action, decision.score, decision.reasons);
/// ```
pub struct FormShield {
    config: EngineConfig,
    scorer: Box<dyn LocalScorer>,
    redactor: Box<dyn Redactor>,
    rules: Vec<Box<dyn Rule>>,
    classifiers: ClassifierRegistry,
    budget: BudgetGate,
    cache: DecisionCache,
}

impl FormShield {
    /// Create an engine with the default collaborators and no classifiers.
    pub fn new(config: EngineConfig) -> Self {
        let budget = BudgetGate::new(Duration::from_millis(config.budget_window_ms));
        Self {
            config,
            scorer: Box::new(HeuristicScorer::new()),
            redactor: Box::new(HashingRedactor::new()),
            rules: Vec::new(),
            classifiers: ClassifierRegistry::new(),
            budget,
            cache: DecisionCache::new(),
        }
    }

    /// Replace the local scoring collaborator.
    pub fn with_scorer(mut self, scorer: Box<dyn LocalScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the redaction collaborator.
    pub fn with_redactor(mut self, redactor: Box<dyn Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    /// Append a rule to the ordered custom-rule sequence.
    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Register a remote classifier capability under its own identifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifiers.register(classifier);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the budget gate's counters.
    pub fn budget_stats(&self) -> BudgetStats {
        self.budget.stats()
    }

    /// Drop every cached decision.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evaluate one submission and return a decision with a complete,
    /// ordered reason trail.
    ///
    /// # Errors
    ///
    /// Fails only on structural misconfiguration
    /// ([`EngineError::UnknownClassifier`]) or when a scoring, rule or
    /// redaction collaborator fails; remote classifier failures degrade
    /// into partial or absent AI contributions instead.
    pub async fn evaluate(&self, submission: &Submission) -> Result<Decision> {
        let cache_ttl = self.config.cache_ttl_ms.map(Duration::from_millis);
        let cache_key = cache_ttl.as_ref().map(|_| fingerprint(submission));

        if let (Some(key), Some(ttl)) = (&cache_key, cache_ttl) {
            if let Some(mut cached) = self.cache.get(key, ttl) {
                debug!(fingerprint = %key, "decision cache hit");
                cached.reasons.push("cache:hit".to_string());
                return Ok(cached);
            }
        }

        // Fresh per-request allowance, independent of the rolling window
        self.budget.reset_request_spend();

        let normalized = normalize_fields(submission);

        let mut state = ScoreState::neutral();
        let signal = self
            .scorer
            .score(submission, &normalized, &self.config)
            .map_err(EngineError::Scoring)?;
        state.score = clamp_score(state.score + signal.delta);
        state.reasons.extend(signal.reasons);

        let stage = rules::run_stage(
            submission,
            &normalized,
            state.score,
            &mut state.reasons,
            &self.config,
            &self.rules,
        )?;
        state.score = stage.score;

        if let Some(action) = stage.action {
            let decision = Decision {
                action,
                score: clamp_score(state.score),
                reasons: state.reasons,
                details: None,
            };
            return Ok(self.store(cache_key, decision));
        }

        let (lo, hi) = self.config.gray_band;
        let in_gray_band = state.score >= lo && state.score <= hi;
        if !in_gray_band || !self.config.router.is_active() {
            let decision = Decision::from_score(state.score, state.reasons);
            return Ok(self.store(cache_key, decision));
        }

        if !self
            .budget
            .can_afford(self.config.budget.per_request_usd, self.config.budget.rolling_usd)
        {
            state.reasons.push("ai:budget-exceeded".to_string());
            let decision = Decision::from_score(state.score, state.reasons);
            return Ok(self.store(cache_key, decision));
        }

        let payload = self
            .redactor
            .redact(submission, &normalized, &self.config)
            .map_err(EngineError::Redaction)?;

        let results = match router::route(&self.config.router, &self.classifiers, &payload).await {
            Ok(results) => results,
            Err(err @ EngineError::UnknownClassifier(_)) => return Err(err),
            Err(err) => {
                warn!(error = %err, "classifier routing failed, continuing without AI results");
                Vec::new()
            }
        };
        // The attempt was made; per-provider outcomes do not change that
        self.budget.record_spend(self.config.cost_per_attempt_usd);

        let base = Decision::from_score(state.score, state.reasons);
        let merged = match &self.config.router {
            RouterStrategy::Blend { .. } => merge::merge_blend(base, &results),
            _ => merge::merge_votes(base, &results),
        };

        Ok(self.store(cache_key, merged))
    }

    /// Store the decision under its fingerprint when caching is enabled.
    fn store(&self, key: Option<String>, decision: Decision) -> Decision {
        if let Some(key) = key {
            self.cache.insert(key, decision.clone());
        }
        decision
    }
}

impl std::fmt::Debug for FormShield {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormShield")
            .field("router", &self.config.router)
            .field("gray_band", &self.config.gray_band)
            .field("classifiers", &self.classifiers.ids())
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use formshield_types::{Action, ClassifierResult, Label, RedactedPayload};

    use crate::traits::{RuleOutcome, ScoreSignal};

    struct FixedScorer {
        delta: f64,
    }

    impl LocalScorer for FixedScorer {
        fn score(
            &self,
            _s: &Submission,
            _n: &formshield_types::NormalizedFields,
            _c: &EngineConfig,
        ) -> anyhow::Result<ScoreSignal> {
            Ok(ScoreSignal {
                delta: self.delta,
                reasons: vec!["heur:fixed".to_string()],
            })
        }
    }

    struct FixedClassifier {
        id: String,
        label: Label,
        confidence: f64,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn id(&self) -> &str {
            &self.id
        }
        async fn classify(&self, _p: &RedactedPayload) -> anyhow::Result<ClassifierResult> {
            Ok(ClassifierResult::new(self.label, self.confidence).with_provider(self.id.clone()))
        }
    }

    fn submission() -> Submission {
        Submission {
            email: Some("jane.doe@acme-corp.com".into()),
            name: Some("Jane Doe".into()),
            message: Some("Interested in a quote for the enterprise plan.".into()),
            ..Default::default()
        }
    }

    fn engine_with_delta(delta: f64, config: EngineConfig) -> FormShield {
        FormShield::new(config).with_scorer(Box::new(FixedScorer { delta }))
    }

    #[tokio::test]
    async fn neutral_submission_lands_in_review() {
        let config = EngineConfig {
            cache_ttl_ms: None,
            ..Default::default()
        };
        let decision = engine_with_delta(0.0, config)
            .evaluate(&submission())
            .await
            .unwrap();
        assert_eq!(decision.action, Action::Review);
        assert_eq!(decision.score, 50.0);
        assert_eq!(decision.reasons, vec!["heur:fixed"]);
    }

    #[tokio::test]
    async fn strong_positive_delta_allows_without_ai() {
        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::FirstAvailable {
                order: vec!["ghost".into()],
            },
            ..Default::default()
        };
        // Score 80 is outside the gray band, so the unknown classifier is
        // never resolved and no error surfaces.
        let decision = engine_with_delta(30.0, config)
            .evaluate(&submission())
            .await
            .unwrap();
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.score, 80.0);
    }

    #[tokio::test]
    async fn gray_band_bounds_are_inclusive() {
        for (delta, expect_ai) in [(-5.0, true), (15.0, true), (-6.0, false), (16.0, false)] {
            let config = EngineConfig {
                cache_ttl_ms: None,
                router: RouterStrategy::FirstAvailable {
                    order: vec!["c".into()],
                },
                ..Default::default()
            };
            let engine = engine_with_delta(delta, config).with_classifier(Arc::new(
                FixedClassifier {
                    id: "c".into(),
                    label: Label::Human,
                    confidence: 1.0,
                },
            ));
            let decision = engine.evaluate(&submission()).await.unwrap();
            let got_ai = decision.reasons.iter().any(|r| r == "ai:human");
            assert_eq!(
                got_ai, expect_ai,
                "delta {delta}: score {} reasons {:?}",
                decision.score, decision.reasons
            );
        }
    }

    #[tokio::test]
    async fn rule_short_circuit_skips_ai_stage() {
        struct AlwaysBlock;
        impl Rule for AlwaysBlock {
            fn apply(
                &self,
                _s: &Submission,
                _n: &formshield_types::NormalizedFields,
                _r: f64,
            ) -> anyhow::Result<Option<RuleOutcome>> {
                Ok(Some(RuleOutcome {
                    action: Some(Action::Block),
                    score: Some(12.0),
                    reasons: vec!["custom:deny".to_string()],
                }))
            }
        }

        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::FirstAvailable {
                order: vec!["ghost".into()],
            },
            ..Default::default()
        };
        let decision = engine_with_delta(0.0, config)
            .with_rule(Box::new(AlwaysBlock))
            .evaluate(&submission())
            .await
            .unwrap();
        assert_eq!(decision.action, Action::Block);
        assert_eq!(decision.score, 12.0);
        assert_eq!(decision.reasons, vec!["heur:fixed", "custom:deny"]);
    }

    #[tokio::test]
    async fn unknown_classifier_in_gray_band_is_fatal() {
        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::FirstAvailable {
                order: vec!["ghost".into()],
            },
            ..Default::default()
        };
        let err = engine_with_delta(0.0, config)
            .evaluate(&submission())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownClassifier(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn classify_failure_degrades_to_rules_score() {
        struct Failing;
        #[async_trait]
        impl Classifier for Failing {
            fn id(&self) -> &str {
                "broken"
            }
            async fn classify(&self, _p: &RedactedPayload) -> anyhow::Result<ClassifierResult> {
                anyhow::bail!("vendor 500")
            }
        }

        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::FirstAvailable {
                order: vec!["broken".into()],
            },
            ..Default::default()
        };
        let engine = engine_with_delta(0.0, config).with_classifier(Arc::new(Failing));
        let decision = engine.evaluate(&submission()).await.unwrap();
        // Evaluation completes on the rules-stage score; no AI reasons
        assert_eq!(decision.score, 50.0);
        assert!(!decision.reasons.iter().any(|r| r.starts_with("ai:")));
        // The attempt still cost budget
        assert!(engine.budget_stats().rolling_spend > 0.0);
    }

    #[tokio::test]
    async fn budget_denial_adds_reason_and_skips_ai() {
        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::FirstAvailable {
                order: vec!["c".into()],
            },
            budget: formshield_types::BudgetLimits {
                per_request_usd: None,
                rolling_usd: Some(0.0),
            },
            ..Default::default()
        };
        let engine = engine_with_delta(0.0, config).with_classifier(Arc::new(FixedClassifier {
            id: "c".into(),
            label: Label::Human,
            confidence: 1.0,
        }));
        let decision = engine.evaluate(&submission()).await.unwrap();
        assert_eq!(
            decision.reasons,
            vec!["heur:fixed", "ai:budget-exceeded"]
        );
        assert_eq!(decision.score, 50.0);
    }

    #[tokio::test]
    async fn cache_hit_returns_stored_decision_with_marker() {
        let config = EngineConfig {
            cache_ttl_ms: Some(60_000),
            ..Default::default()
        };
        let engine = engine_with_delta(0.0, config);
        let sub = submission();

        let first = engine.evaluate(&sub).await.unwrap();
        assert!(!first.reasons.contains(&"cache:hit".to_string()));

        let second = engine.evaluate(&sub).await.unwrap();
        assert_eq!(second.score, first.score);
        assert_eq!(second.action, first.action);
        let mut expected = first.reasons.clone();
        expected.push("cache:hit".to_string());
        assert_eq!(second.reasons, expected);
    }

    #[tokio::test]
    async fn cache_store_happens_even_for_rule_short_circuits() {
        let config = EngineConfig {
            cache_ttl_ms: Some(60_000),
            allow_domains: vec!["acme-corp.com".into()],
            ..Default::default()
        };
        let engine = engine_with_delta(0.0, config);
        let sub = submission();

        let first = engine.evaluate(&sub).await.unwrap();
        assert_eq!(first.action, Action::Allow);
        assert_eq!(first.score, 90.0);

        let second = engine.evaluate(&sub).await.unwrap();
        assert!(second.reasons.contains(&"cache:hit".to_string()));
    }

    #[tokio::test]
    async fn ai_merge_applies_to_gray_band_score() {
        let config = EngineConfig {
            cache_ttl_ms: None,
            router: RouterStrategy::Vote {
                members: vec!["a".into(), "b".into()],
                min_agree: None,
            },
            ..Default::default()
        };
        let engine = engine_with_delta(0.0, config)
            .with_classifier(Arc::new(FixedClassifier {
                id: "a".into(),
                label: Label::Spam,
                confidence: 0.8,
            }))
            .with_classifier(Arc::new(FixedClassifier {
                id: "b".into(),
                label: Label::Spam,
                confidence: 0.6,
            }));
        let decision = engine.evaluate(&submission()).await.unwrap();
        // 50 - 10 * 0.7 = 43
        assert_eq!(decision.score, 43.0);
        assert!(decision.reasons.contains(&"ai:spam".to_string()));
        assert!(decision.details.is_some());
    }

    #[tokio::test]
    async fn scorer_failure_propagates() {
        struct Broken;
        impl LocalScorer for Broken {
            fn score(
                &self,
                _s: &Submission,
                _n: &formshield_types::NormalizedFields,
                _c: &EngineConfig,
            ) -> anyhow::Result<ScoreSignal> {
                anyhow::bail!("signal store offline")
            }
        }

        let config = EngineConfig {
            cache_ttl_ms: None,
            ..Default::default()
        };
        let engine = FormShield::new(config).with_scorer(Box::new(Broken));
        let err = engine.evaluate(&submission()).await.unwrap_err();
        assert!(matches!(err, EngineError::Scoring(_)));
    }
}
