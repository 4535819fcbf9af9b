//! Classifier router: fan-out over remote classifiers per strategy.
//!
//! The router is the only component in the pipeline that performs
//! concurrent work. Each [`RouterStrategy`] variant has exactly one
//! handler; the fault-tolerance contract differs per variant:
//!
//! - `first-available` has none: it names exactly one intended
//!   classifier, so its failure propagates rather than being swallowed
//! - `fallback` absorbs primary timeout/failure into a secondary attempt,
//!   and a double failure into an empty result set
//! - `vote`/`blend` drop failing or unknown members with a warning and
//!   return whatever subset settled successfully
//! - `canary`/`ab` pick exactly one member and propagate like
//!   `first-available`
//!
//! Unknown identifiers in single-target strategies are structural
//! misconfiguration and raise [`EngineError::UnknownClassifier`] before
//! any remote call.

use std::time::Duration;

use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::{debug, warn};

use formshield_types::{BlendMember, ClassifierResult, RedactedPayload, RouterStrategy};

use crate::error::{EngineError, Result};
use crate::registry::ClassifierRegistry;

/// How long the fallback strategy waits on its primary leg. The secondary
/// leg runs without a timeout.
const FALLBACK_PRIMARY_TIMEOUT: Duration = Duration::from_millis(800);

/// Dispatch a redacted payload according to the strategy and collect the
/// individual results obtained.
///
/// Concurrent fan-out (vote, blend) waits for every dispatched call to
/// settle before returning; there is no early return on first success.
pub(crate) async fn route(
    strategy: &RouterStrategy,
    registry: &ClassifierRegistry,
    payload: &RedactedPayload,
) -> Result<Vec<ClassifierResult>> {
    match strategy {
        // Gray-band gating means the orchestrator never dispatches this
        RouterStrategy::None => Ok(Vec::new()),
        RouterStrategy::FirstAvailable { order } => first_available(registry, order, payload).await,
        RouterStrategy::Fallback { primary, secondary } => {
            fallback(registry, primary, secondary, payload).await
        }
        RouterStrategy::Vote { members, .. } => Ok(fan_out(registry, members, payload).await),
        RouterStrategy::Blend { members } => Ok(blend_fan_out(registry, members, payload).await),
        RouterStrategy::Canary {
            control,
            candidate,
            pct,
        } => canary(registry, control, candidate, *pct, payload).await,
        RouterStrategy::Ab { a, b, salt } => ab(registry, a, b, salt.as_deref(), payload).await,
    }
}

async fn first_available(
    registry: &ClassifierRegistry,
    order: &[String],
    payload: &RedactedPayload,
) -> Result<Vec<ClassifierResult>> {
    let Some(id) = order.first() else {
        return Err(EngineError::UnknownClassifier(String::new()));
    };
    let classifier = registry.resolve(id)?;
    let result = classifier
        .classify(payload)
        .await
        .map_err(|source| EngineError::Classify {
            id: id.clone(),
            source,
        })?;
    Ok(vec![result])
}

async fn fallback(
    registry: &ClassifierRegistry,
    primary_id: &str,
    secondary_id: &str,
    payload: &RedactedPayload,
) -> Result<Vec<ClassifierResult>> {
    let primary = registry.resolve(primary_id)?;
    let secondary = registry.resolve(secondary_id)?;

    match timeout(FALLBACK_PRIMARY_TIMEOUT, primary.classify(payload)).await {
        Ok(Ok(result)) => return Ok(vec![result]),
        Ok(Err(err)) => {
            warn!(primary = primary_id, error = %err, "primary classifier failed, using fallback");
        }
        Err(_) => {
            warn!(primary = primary_id, "primary classifier timed out, using fallback");
        }
    }

    match secondary.classify(payload).await {
        Ok(result) => Ok(vec![result.with_provider(format!("{secondary_id}(fallback)"))]),
        Err(err) => {
            warn!(secondary = secondary_id, error = %err, "fallback classifier also failed");
            Ok(Vec::new())
        }
    }
}

/// Concurrent fan-out shared by vote and blend: every call settles before
/// this returns, and failures are dropped with a warning.
async fn fan_out(
    registry: &ClassifierRegistry,
    members: &[String],
    payload: &RedactedPayload,
) -> Vec<ClassifierResult> {
    let calls = members.iter().filter_map(|id| {
        let Some(classifier) = registry.get(id) else {
            warn!(classifier = %id, "vote member not registered, skipping");
            return None;
        };
        Some(async move {
            match classifier.classify(payload).await {
                Ok(result) => Some(result),
                Err(err) => {
                    warn!(classifier = %id, error = %err, "vote member failed, dropping");
                    None
                }
            }
        })
    });

    join_all(calls).await.into_iter().flatten().collect()
}

/// Same fan-out and fault tolerance as vote, but each surviving result
/// carries its member's configured weight (default 1).
async fn blend_fan_out(
    registry: &ClassifierRegistry,
    members: &[BlendMember],
    payload: &RedactedPayload,
) -> Vec<ClassifierResult> {
    let calls = members.iter().filter_map(|member| {
        let Some(classifier) = registry.get(&member.id) else {
            warn!(classifier = %member.id, "blend member not registered, skipping");
            return None;
        };
        Some(async move {
            match classifier.classify(payload).await {
                Ok(mut result) => {
                    result.weight = Some(member.weight.unwrap_or(1.0));
                    Some(result)
                }
                Err(err) => {
                    warn!(classifier = %member.id, error = %err, "blend member failed, dropping");
                    None
                }
            }
        })
    });

    join_all(calls).await.into_iter().flatten().collect()
}

async fn canary(
    registry: &ClassifierRegistry,
    control: &str,
    candidate: &str,
    pct: f64,
    payload: &RedactedPayload,
) -> Result<Vec<ClassifierResult>> {
    let use_candidate = rand::random::<f64>() < pct / 100.0;
    let id = if use_candidate { candidate } else { control };
    debug!(classifier = id, candidate = use_candidate, "canary draw");

    let classifier = registry.resolve(id)?;
    let result = classifier
        .classify(payload)
        .await
        .map_err(|source| EngineError::Classify {
            id: id.to_string(),
            source,
        })?;

    let provider = if use_candidate {
        format!("{id}(canary)")
    } else {
        id.to_string()
    };
    Ok(vec![result.with_provider(provider)])
}

async fn ab(
    registry: &ClassifierRegistry,
    arm_a: &str,
    arm_b: &str,
    salt: Option<&str>,
    payload: &RedactedPayload,
) -> Result<Vec<ClassifierResult>> {
    let use_b = bucket_to_b(payload, salt);
    let (id, arm) = if use_b { (arm_b, "b") } else { (arm_a, "a") };
    debug!(classifier = id, arm, "ab bucket");

    let classifier = registry.resolve(id)?;
    let result = classifier
        .classify(payload)
        .await
        .map_err(|source| EngineError::Classify {
            id: id.to_string(),
            source,
        })?;

    Ok(vec![result.with_provider(format!("{id}({arm})"))])
}

/// Deterministic A/B bucketing: hash the stable payload serialization plus
/// the salt and route to arm b iff the digest is odd. Same payload + same
/// salt always lands in the same arm.
fn bucket_to_b(payload: &RedactedPayload, salt: Option<&str>) -> bool {
    // Struct serialization is stable (declaration order), so this cannot fail
    let serialized = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hasher.update(salt.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();
    digest[digest.len() - 1] & 1 == 1
}
