//! Engine configuration: gray band, PII policy, caching, routing, budgets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the redactor treats PII before a payload leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PiiPolicy {
    /// Hash the email local-part and drop PII field keys (default).
    #[default]
    HashLocal,
    /// Send the local-part as-is. Only sensible for self-hosted
    /// classifiers that never leave the operator's infrastructure.
    Plain,
}

/// A weighted member of the blend strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendMember {
    /// Classifier identifier.
    pub id: String,
    /// Relative weight; defaults to 1 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Fan-out policy for the classifier router.
///
/// A closed sum type: each variant has exactly one handler in the router,
/// and adding a policy means adding a variant plus a handler, not growing
/// a conditional chain. Immutable for the lifetime of an engine instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RouterStrategy {
    /// Never escalate to remote classification.
    #[default]
    None,
    /// Call only the first classifier in the list. The one strategy with
    /// no fault tolerance: it names exactly one intended classifier, so
    /// its failures are surfaced rather than swallowed.
    FirstAvailable {
        /// Ordered classifier identifiers; only `order[0]` is invoked.
        order: Vec<String>,
    },
    /// Try the primary under a fixed timeout, then the secondary.
    Fallback {
        /// Primary classifier identifier.
        primary: String,
        /// Secondary classifier identifier, tagged `(fallback)` when used.
        secondary: String,
    },
    /// Invoke all members concurrently; failures are dropped.
    Vote {
        /// Classifier identifiers to fan out to.
        members: Vec<String>,
        /// Reserved minimum-agreement threshold. Accepted for forward
        /// compatibility; the majority merge does not enforce it.
        #[serde(skip_serializing_if = "Option::is_none")]
        min_agree: Option<u32>,
    },
    /// Like vote, but each surviving result carries its configured weight
    /// for weighted-blend merging.
    Blend {
        /// Weighted classifier members.
        members: Vec<BlendMember>,
    },
    /// Probabilistic rollout: route to the candidate `pct`% of the time.
    Canary {
        /// Established classifier identifier.
        control: String,
        /// Classifier under evaluation, tagged `(canary)` when chosen.
        candidate: String,
        /// Percentage of traffic sent to the candidate (0-100).
        pct: f64,
    },
    /// Deterministic experiment split: same payload and salt always route
    /// to the same arm.
    Ab {
        /// Arm a classifier identifier.
        a: String,
        /// Arm b classifier identifier.
        b: String,
        /// Optional salt mixed into the bucketing hash.
        #[serde(skip_serializing_if = "Option::is_none")]
        salt: Option<String>,
    },
}

impl RouterStrategy {
    /// Whether this strategy ever dispatches to a remote classifier.
    pub fn is_active(&self) -> bool {
        !matches!(self, RouterStrategy::None)
    }
}

/// Spend caps for the AI stage, in USD-equivalent units.
///
/// A limit of `None` means that dimension is unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetLimits {
    /// Maximum spend within a single evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_request_usd: Option<f64>,
    /// Maximum spend within the rolling window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_usd: Option<f64>,
}

/// Configuration surface consumed by the engine core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inclusive score interval in which the rules stage is not confident
    /// enough to decide alone and escalates to remote classification.
    pub gray_band: (f64, f64),

    /// PII handling policy for redaction.
    pub pii_policy: PiiPolicy,

    /// Decision cache TTL in milliseconds. `None` disables caching.
    pub cache_ttl_ms: Option<u64>,

    /// Router fan-out policy.
    pub router: RouterStrategy,

    /// Spend caps for the AI stage.
    pub budget: BudgetLimits,

    /// Placeholder spend recorded per AI routing attempt, in USD.
    ///
    /// Real per-token cost accounting is out of scope; this constant keeps
    /// the budget gate meaningful until a host wires in measured costs.
    pub cost_per_attempt_usd: f64,

    /// Rolling budget window length in milliseconds.
    pub budget_window_ms: u64,

    /// Extra disposable email domains beyond the built-in list.
    pub disposable_domains: Vec<String>,

    /// Email domains that short-circuit to allow.
    pub allow_domains: Vec<String>,

    /// Email domains that short-circuit to block (also penalized during
    /// heuristic scoring).
    pub block_domains: Vec<String>,

    /// SHA-256 hashes of email local-parts that short-circuit to allow.
    pub allow_emails_hashed: Vec<String>,

    /// SHA-256 hashes of email local-parts that short-circuit to block.
    pub block_emails_hashed: Vec<String>,

    /// Message keywords that each apply a scoring penalty.
    pub block_keywords: Vec<String>,

    /// Per-TLD scoring penalties (e.g. `"xyz" -> 10.0`).
    pub tld_risk: HashMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gray_band: (45.0, 65.0),
            pii_policy: PiiPolicy::default(),
            cache_ttl_ms: Some(24 * 60 * 60 * 1000),
            router: RouterStrategy::None,
            budget: BudgetLimits::default(),
            cost_per_attempt_usd: 0.001,
            budget_window_ms: 24 * 60 * 60 * 1000,
            disposable_domains: Vec::new(),
            allow_domains: Vec::new(),
            block_domains: Vec::new(),
            allow_emails_hashed: Vec::new(),
            block_emails_hashed: Vec::new(),
            block_keywords: Vec::new(),
            tld_risk: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.gray_band, (45.0, 65.0));
        assert_eq!(cfg.pii_policy, PiiPolicy::HashLocal);
        assert_eq!(cfg.cache_ttl_ms, Some(86_400_000));
        assert_eq!(cfg.router, RouterStrategy::None);
        assert!((cfg.cost_per_attempt_usd - 0.001).abs() < f64::EPSILON);
        assert_eq!(cfg.budget_window_ms, 86_400_000);
    }

    #[test]
    fn strategy_mode_tags() {
        let json = serde_json::to_string(&RouterStrategy::None).unwrap();
        assert_eq!(json, "{\"mode\":\"none\"}");

        let strat = RouterStrategy::FirstAvailable {
            order: vec!["a".into(), "b".into()],
        };
        let json = serde_json::to_string(&strat).unwrap();
        assert!(json.contains("\"mode\":\"first-available\""));

        let parsed: RouterStrategy = serde_json::from_str(
            "{\"mode\":\"fallback\",\"primary\":\"fast\",\"secondary\":\"slow\"}",
        )
        .unwrap();
        assert_eq!(
            parsed,
            RouterStrategy::Fallback {
                primary: "fast".into(),
                secondary: "slow".into()
            }
        );
    }

    #[test]
    fn vote_min_agree_is_optional() {
        let parsed: RouterStrategy =
            serde_json::from_str("{\"mode\":\"vote\",\"members\":[\"x\",\"y\"]}").unwrap();
        assert_eq!(
            parsed,
            RouterStrategy::Vote {
                members: vec!["x".into(), "y".into()],
                min_agree: None
            }
        );
    }

    #[test]
    fn strategy_is_active() {
        assert!(!RouterStrategy::None.is_active());
        assert!(RouterStrategy::Ab {
            a: "a".into(),
            b: "b".into(),
            salt: None
        }
        .is_active());
    }

    #[test]
    fn config_deserializes_from_partial_json() {
        let cfg: EngineConfig =
            serde_json::from_str("{\"gray_band\":[40.0,60.0],\"cache_ttl_ms\":null}").unwrap();
        assert_eq!(cfg.gray_band, (40.0, 60.0));
        assert_eq!(cfg.cache_ttl_ms, None);
        // Untouched fields keep their defaults
        assert_eq!(cfg.router, RouterStrategy::None);
    }

    #[test]
    fn pii_policy_kebab_case() {
        assert_eq!(
            serde_json::to_string(&PiiPolicy::HashLocal).unwrap(),
            "\"hash-local\""
        );
    }
}
