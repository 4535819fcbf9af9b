//! Budget gate: per-request and rolling-window spend tracking.
//!
//! Thread safety: all public methods take `&self` and use interior
//! mutability via [`std::sync::Mutex`]. The check + spend sequence is a
//! check-then-act operation shared by every in-flight evaluation, so both
//! halves run under the same lock discipline.
//!
//! The rolling window resets lazily: the first operation that observes an
//! elapsed window zeroes the rolling counters and advances the window
//! start while holding the lock, which makes the reset idempotent under
//! concurrent observers. No timer task exists.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Mutable budget counters, guarded by the gate's mutex.
#[derive(Debug)]
struct BudgetState {
    /// Spend within the current evaluation, reset at pipeline start.
    request_spend: f64,
    /// Spend within the current rolling window.
    rolling_spend: f64,
    /// When the current rolling window began.
    window_start: Instant,
    /// Requests recorded within the current rolling window.
    request_count: u64,
}

/// Read-only view of the gate's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetStats {
    /// Spend within the current evaluation.
    pub request_spend: f64,
    /// Spend within the current rolling window.
    pub rolling_spend: f64,
    /// Requests recorded within the current rolling window.
    pub request_count: u64,
    /// Age of the current rolling window.
    pub window_age: Duration,
}

/// Admits or denies remote-classification attempts against spend limits.
///
/// One gate is owned per engine instance; multiple engines in a process
/// never share counters.
#[derive(Debug)]
pub struct BudgetGate {
    state: Mutex<BudgetState>,
    window: Duration,
}

impl BudgetGate {
    /// Create a gate with the given rolling-window length.
    pub fn new(window: Duration) -> Self {
        Self {
            state: Mutex::new(BudgetState {
                request_spend: 0.0,
                rolling_spend: 0.0,
                window_start: Instant::now(),
                request_count: 0,
            }),
            window,
        }
    }

    /// Whether another remote-classification attempt fits the limits.
    ///
    /// Denies if either limit is defined and its counter has already met
    /// or exceeded it; permits when neither is breached or both are
    /// undefined.
    pub fn can_afford(&self, per_request_limit: Option<f64>, rolling_limit: Option<f64>) -> bool {
        let mut state = self.state.lock().expect("budget gate poisoned");
        self.roll_window_if_elapsed(&mut state);

        if let Some(limit) = per_request_limit {
            if state.request_spend >= limit {
                debug!(spend = state.request_spend, limit, "per-request budget exhausted");
                return false;
            }
        }
        if let Some(limit) = rolling_limit {
            if state.rolling_spend >= limit {
                debug!(spend = state.rolling_spend, limit, "rolling budget exhausted");
                return false;
            }
        }
        true
    }

    /// Record spend for one attempt against both counters.
    pub fn record_spend(&self, amount: f64) {
        let mut state = self.state.lock().expect("budget gate poisoned");
        self.roll_window_if_elapsed(&mut state);
        state.request_spend += amount;
        state.rolling_spend += amount;
        state.request_count += 1;
    }

    /// Reset the per-request counter. Called by the orchestrator at the
    /// start of every evaluation, independent of the rolling window.
    pub fn reset_request_spend(&self) {
        let mut state = self.state.lock().expect("budget gate poisoned");
        state.request_spend = 0.0;
    }

    /// Snapshot the current counters.
    pub fn stats(&self) -> BudgetStats {
        let mut state = self.state.lock().expect("budget gate poisoned");
        self.roll_window_if_elapsed(&mut state);
        BudgetStats {
            request_spend: state.request_spend,
            rolling_spend: state.rolling_spend,
            request_count: state.request_count,
            window_age: state.window_start.elapsed(),
        }
    }

    fn roll_window_if_elapsed(&self, state: &mut BudgetState) {
        if state.window_start.elapsed() > self.window {
            debug!(window_secs = self.window.as_secs(), "rolling budget window reset");
            state.rolling_spend = 0.0;
            state.request_count = 0;
            state.window_start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn unlimited_gate_always_permits() {
        let gate = BudgetGate::new(DAY);
        gate.record_spend(1_000_000.0);
        assert!(gate.can_afford(None, None));
    }

    #[test]
    fn per_request_limit_denies_at_boundary() {
        let gate = BudgetGate::new(DAY);
        assert!(gate.can_afford(Some(0.002), None));
        gate.record_spend(0.001);
        assert!(gate.can_afford(Some(0.002), None));
        gate.record_spend(0.001);
        // Counter == limit -> denied
        assert!(!gate.can_afford(Some(0.002), None));
    }

    #[test]
    fn request_reset_does_not_touch_rolling() {
        let gate = BudgetGate::new(DAY);
        gate.record_spend(0.005);
        gate.reset_request_spend();
        let stats = gate.stats();
        assert_eq!(stats.request_spend, 0.0);
        assert!((stats.rolling_spend - 0.005).abs() < 1e-12);
        assert_eq!(stats.request_count, 1);
    }

    #[test]
    fn spends_accumulate_within_one_window() {
        let gate = BudgetGate::new(DAY);
        gate.record_spend(0.25);
        gate.record_spend(0.5);
        let stats = gate.stats();
        assert!((stats.rolling_spend - 0.75).abs() < 1e-12);
        assert_eq!(stats.request_count, 2);
    }

    #[test]
    fn rolling_limit_denies_then_window_reset_readmits() {
        let gate = BudgetGate::new(Duration::from_millis(30));
        gate.record_spend(1.0);
        assert!(!gate.can_afford(None, Some(1.0)));

        std::thread::sleep(Duration::from_millis(60));

        // First observation after the window elapses resets exactly once
        assert!(gate.can_afford(None, Some(1.0)));
        let stats = gate.stats();
        assert_eq!(stats.rolling_spend, 0.0);
        assert_eq!(stats.request_count, 0);
        assert!(stats.window_age < Duration::from_millis(30));
    }

    #[test]
    fn concurrent_spend_is_not_lost() {
        use std::sync::Arc;

        let gate = Arc::new(BudgetGate::new(DAY));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    gate.record_spend(0.001);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = gate.stats();
        assert!((stats.rolling_spend - 0.8).abs() < 1e-9);
        assert_eq!(stats.request_count, 800);
    }
}
