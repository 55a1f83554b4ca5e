//! Per-operation circuit breaker.
//!
//! Only outcomes that are still failing after the retry policy gave up, and
//! that are themselves retryable (5xx, 429, transport), push a circuit
//! towards open. A 4xx means the upstream answered and counts as a success.
//!
//! ```text
//! closed ──(failure_threshold consecutive failures)──→ open
//! open   ──(open_timeout elapsed, next call)─────────→ half-open
//! half-open ──(success_threshold successes)──────────→ closed
//! half-open ──(any failure)──────────────────────────→ open
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::Operation;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls that open a closed circuit
    pub failure_threshold: u32,
    /// Successful probes that close a half-open circuit
    pub success_threshold: u32,
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            open_timeout: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Where a circuit is, with the data that only matters in that phase.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Circuit {
    phase: Phase,
    entered_at: Instant,
    calls: u64,
    failures: u64,
    rejected: u64,
}

impl Circuit {
    fn closed() -> Self {
        Self {
            phase: Phase::Closed { failures: 0 },
            entered_at: Instant::now(),
            calls: 0,
            failures: 0,
            rejected: 0,
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.entered_at = Instant::now();
    }

    fn open(&mut self) {
        self.enter(Phase::Open {
            since: Instant::now(),
        });
    }
}

/// One circuit per [`Operation`], created on first use.
pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<Operation, Circuit>>,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a call for `operation` may go out now. An open circuit whose
    /// timeout has run out lets this call through as a half-open probe.
    pub fn should_allow(&self, operation: Operation) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(operation).or_insert_with(Circuit::closed);
        circuit.calls += 1;

        let Phase::Open { since } = circuit.phase else {
            return true;
        };
        let open_for = since.elapsed();
        if open_for >= self.config.open_timeout {
            info!(operation = %operation, "Circuit half-open, probing upstream");
            circuit.enter(Phase::HalfOpen { successes: 0 });
            return true;
        }

        circuit.rejected += 1;
        debug!(
            operation = %operation,
            retry_in_ms = (self.config.open_timeout - open_for).as_millis() as u64,
            "Circuit open, call rejected"
        );
        false
    }

    pub fn record_success(&self, operation: Operation) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.lock();
        let Some(circuit) = circuits.get_mut(&operation) else {
            return;
        };

        match circuit.phase {
            Phase::Closed { failures } if failures > 0 => {
                circuit.phase = Phase::Closed { failures: 0 };
            }
            Phase::HalfOpen { successes } => {
                let successes = successes + 1;
                if successes >= self.config.success_threshold {
                    info!(operation = %operation, "Circuit closed, upstream recovered");
                    circuit.enter(Phase::Closed { failures: 0 });
                } else {
                    circuit.phase = Phase::HalfOpen { successes };
                }
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, operation: Operation) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(operation).or_insert_with(Circuit::closed);
        circuit.failures += 1;

        match circuit.phase {
            Phase::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(
                        operation = %operation,
                        failures,
                        open_for_ms = self.config.open_timeout.as_millis() as u64,
                        "Circuit opened"
                    );
                    circuit.open();
                } else {
                    circuit.phase = Phase::Closed { failures };
                }
            }
            Phase::HalfOpen { .. } => {
                warn!(operation = %operation, "Probe failed, circuit reopened");
                circuit.open();
            }
            // A call admitted just before opening; restart the timeout.
            Phase::Open { .. } => circuit.open(),
        }
    }

    pub fn state(&self, operation: Operation) -> CircuitState {
        self.circuits
            .lock()
            .get(&operation)
            .map_or(CircuitState::Closed, |c| c.phase.state())
    }

    /// One entry per operation seen so far, ordered by operation name.
    pub fn stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.lock();
        let mut stats: Vec<CircuitStats> = circuits
            .iter()
            .map(|(operation, circuit)| CircuitStats {
                operation: operation.as_str().to_string(),
                state: circuit.phase.state(),
                consecutive_failures: match circuit.phase {
                    Phase::Closed { failures } => failures,
                    _ => 0,
                },
                total_calls: circuit.calls,
                total_failures: circuit.failures,
                total_rejected: circuit.rejected,
                time_in_state_ms: circuit.entered_at.elapsed().as_millis() as u64,
            })
            .collect();
        stats.sort_by(|a, b| a.operation.cmp(&b.operation));
        stats
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub operation: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
    pub time_in_state_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreakerManager {
        CircuitBreakerManager::new(CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_millis(50),
            enabled: true,
        })
    }

    fn trip(manager: &CircuitBreakerManager, operation: Operation) {
        for _ in 0..3 {
            manager.record_failure(operation);
        }
    }

    #[test]
    fn test_unknown_operation_is_closed() {
        let manager = breaker();
        assert_eq!(manager.state(Operation::EnrollData), CircuitState::Closed);
        assert!(manager.should_allow(Operation::EnrollData));
    }

    #[test]
    fn test_threshold_opens_only_that_operation() {
        let manager = breaker();
        for _ in 0..3 {
            assert!(manager.should_allow(Operation::EnrollData));
            manager.record_failure(Operation::EnrollData);
        }

        assert_eq!(manager.state(Operation::EnrollData), CircuitState::Open);
        assert!(!manager.should_allow(Operation::EnrollData));
        assert!(manager.should_allow(Operation::GetData));
    }

    #[test]
    fn test_success_clears_failure_streak() {
        let manager = breaker();
        manager.should_allow(Operation::GetData);
        manager.record_failure(Operation::GetData);
        manager.record_failure(Operation::GetData);
        manager.record_success(Operation::GetData);
        manager.record_failure(Operation::GetData);

        assert_eq!(manager.state(Operation::GetData), CircuitState::Closed);
        assert_eq!(manager.stats()[0].consecutive_failures, 1);
    }

    #[test]
    fn test_probes_close_circuit() {
        let manager = breaker();
        trip(&manager, Operation::GetStatus);
        assert!(!manager.should_allow(Operation::GetStatus));

        std::thread::sleep(Duration::from_millis(80));
        assert!(manager.should_allow(Operation::GetStatus));
        assert_eq!(manager.state(Operation::GetStatus), CircuitState::HalfOpen);

        manager.record_success(Operation::GetStatus);
        assert_eq!(manager.state(Operation::GetStatus), CircuitState::HalfOpen);
        manager.record_success(Operation::GetStatus);
        assert_eq!(manager.state(Operation::GetStatus), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let manager = breaker();
        trip(&manager, Operation::GetStatus);
        std::thread::sleep(Duration::from_millis(80));
        assert!(manager.should_allow(Operation::GetStatus));

        manager.record_failure(Operation::GetStatus);
        assert_eq!(manager.state(Operation::GetStatus), CircuitState::Open);
        assert!(!manager.should_allow(Operation::GetStatus));
    }

    #[test]
    fn test_disabled_breaker_tracks_nothing() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig {
            enabled: false,
            ..CircuitBreakerConfig::default()
        });
        for _ in 0..10 {
            manager.record_failure(Operation::EnrollData);
        }
        assert!(manager.should_allow(Operation::EnrollData));
        assert!(manager.stats().is_empty());
    }

    #[test]
    fn test_stats_count_rejections() {
        let manager = breaker();
        for _ in 0..3 {
            manager.should_allow(Operation::DeleteConsumer);
            manager.record_failure(Operation::DeleteConsumer);
        }
        manager.should_allow(Operation::DeleteConsumer);

        let stats = manager.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].operation, "delete-consumer");
        assert_eq!(stats[0].state, CircuitState::Open);
        assert_eq!(stats[0].total_calls, 4);
        assert_eq!(stats[0].total_failures, 3);
        assert_eq!(stats[0].total_rejected, 1);
    }
}
