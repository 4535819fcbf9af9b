//! Fan-in: combining classifier results into the base decision.
//!
//! Two merge policies exist, matched to how the router produced the
//! results: majority vote for every strategy except blend, weighted blend
//! for blend. Both recompute the action from the merged score through
//! [`Action::from_score`] -- merging never sets an action directly -- and
//! both are strict no-ops on an empty result set.

use serde_json::json;

use formshield_types::{Action, ClassifierResult, Decision, Label};

/// Maximum score swing the AI stage can apply in either direction.
const MAX_DELTA: f64 = 10.0;

/// Majority-vote merge.
///
/// The label with more supporting results wins; an exact tie breaks on
/// mean confidence, and an exact confidence tie resolves to spam. That
/// conservative bias is deliberate: an uncertain coin flip should hold a
/// submission for review rather than wave it through.
pub fn merge_votes(base: Decision, results: &[ClassifierResult]) -> Decision {
    if results.is_empty() {
        return base;
    }

    let human_votes = results.iter().filter(|r| r.label == Label::Human).count();
    let spam_votes = results.len() - human_votes;

    let winner = if human_votes > spam_votes {
        Label::Human
    } else if spam_votes > human_votes {
        Label::Spam
    } else {
        let human_mean = mean_confidence(results, Label::Human);
        let spam_mean = mean_confidence(results, Label::Spam);
        if human_mean > spam_mean {
            Label::Human
        } else {
            Label::Spam
        }
    };

    let mean_conf = mean_confidence(results, winner);
    let delta = winner.sign() * MAX_DELTA * mean_conf;
    let score = (base.score + delta).round().clamp(0.0, 100.0);

    let mut reasons = base.reasons;
    reasons.push(format!("ai:{winner}"));
    fold_result_reasons(&mut reasons, results);

    let details = with_ai_details(
        base.details,
        json!({
            "results": results,
            "majority": winner,
            "mean_confidence": mean_conf,
            "delta": delta,
            "votes": { "human": human_votes, "spam": spam_votes },
        }),
    );

    Decision {
        action: Action::from_score(score),
        score,
        reasons,
        details: Some(details),
    }
}

/// Weighted-blend merge.
///
/// Normalizes Σ(sign × confidence × weight) by Σ(weight) into `[-1, 1]`
/// and scales it to a `[-10, 10]` delta. Results without a router-assigned
/// weight count as weight 1.
pub fn merge_blend(base: Decision, results: &[ClassifierResult]) -> Decision {
    if results.is_empty() {
        return base;
    }

    let total_weight: f64 = results.iter().map(|r| r.weight.unwrap_or(1.0)).sum();
    let weighted_sum: f64 = results
        .iter()
        .map(|r| r.label.sign() * r.confidence * r.weight.unwrap_or(1.0))
        .sum();

    let normalized = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };
    let delta = normalized * MAX_DELTA;
    let score = (base.score + delta).round().clamp(0.0, 100.0);

    let mut reasons = base.reasons;
    reasons.push("ai:blend".to_string());
    fold_result_reasons(&mut reasons, results);

    let details = with_ai_details(
        base.details,
        json!({
            "results": results,
            "strategy": "blend",
            "delta": delta,
            "weighted_sum": weighted_sum,
            "total_weight": total_weight,
        }),
    );

    Decision {
        action: Action::from_score(score),
        score,
        reasons,
        details: Some(details),
    }
}

fn mean_confidence(results: &[ClassifierResult], label: Label) -> f64 {
    let matching: Vec<f64> = results
        .iter()
        .filter(|r| r.label == label)
        .map(|r| r.confidence)
        .collect();
    if matching.is_empty() {
        0.0
    } else {
        matching.iter().sum::<f64>() / matching.len() as f64
    }
}

/// Fold each result's own reason tags into the audit trail, namespaced by
/// its provider identifier so every tag stays attributable to its source.
fn fold_result_reasons(reasons: &mut Vec<String>, results: &[ClassifierResult]) {
    for result in results {
        let provider = result.provider.as_deref().unwrap_or("p");
        for tag in &result.reasons {
            reasons.push(format!("ai:{provider}:{tag}"));
        }
    }
}

/// Set the `ai` key of the detail bag, preserving any existing details.
fn with_ai_details(base: Option<serde_json::Value>, ai: serde_json::Value) -> serde_json::Value {
    let mut details = match base {
        Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
        _ => json!({}),
    };
    details["ai"] = ai;
    details
}
