//! Per-service circuit breaking
//!
//! Each logical backend service accumulates a failure counter. Crossing
//! the threshold opens the circuit and subsequent requests to that service
//! are rejected synchronously, without reaching the transport, until the
//! cooldown window elapses after the last recorded failure. Recovery is
//! time-based: an open circuit whose cooldown has passed closes outright
//! and resets its counter, with no probe request. Successes decrement the
//! counter, so a service can also claw its way back under the threshold.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::BreakerConfig;
use crate::notify::{Notification, NotificationSink};

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
    is_open: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            failures: 0,
            last_failure: None,
            is_open: false,
        }
    }
}

/// Point-in-time view of one breaker, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub failures: u32,
    pub is_open: bool,
    pub seconds_since_last_failure: Option<u64>,
}

/// Registry of circuit breakers keyed by service
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    states: Arc<Mutex<HashMap<String, BreakerState>>>,
    sink: Arc<dyn NotificationSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            states: Arc::new(Mutex::new(HashMap::new())),
            sink,
        }
    }

    /// Current open state for a service key.
    ///
    /// An open breaker whose cooldown has elapsed since the last failure
    /// transitions back to closed here, resetting its counter.
    pub fn is_open(&self, service_key: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut states = self.states.lock().unwrap();
        let Some(state) = states.get_mut(service_key) else {
            return false;
        };

        if !state.is_open {
            return false;
        }

        let cooled_down = state
            .last_failure
            .map(|at| at.elapsed() >= self.config.cooldown)
            .unwrap_or(true);
        if cooled_down {
            state.is_open = false;
            state.failures = 0;
            info!(service = service_key, "circuit breaker recovered");
            return false;
        }

        true
    }

    /// Record a terminal failure for a service key
    pub fn record_failure(&self, service_key: &str) {
        if !self.config.enabled {
            return;
        }

        let opened = {
            let mut states = self.states.lock().unwrap();
            let state = states
                .entry(service_key.to_string())
                .or_insert_with(BreakerState::new);
            state.failures += 1;
            state.last_failure = Some(Instant::now());

            if state.failures >= self.config.threshold && !state.is_open {
                state.is_open = true;
                true
            } else {
                false
            }
        };

        if opened {
            warn!(service = service_key, "circuit breaker opened");
            self.sink.notify(&Notification::service_unavailable(service_key));
        }
    }

    /// Record a terminal success for a service key
    pub fn record_success(&self, service_key: &str) {
        let mut states = self.states.lock().unwrap();
        if let Some(state) = states.get_mut(service_key) {
            if state.failures > 0 {
                state.failures -= 1;
                if state.failures == 0 && state.is_open {
                    state.is_open = false;
                    info!(service = service_key, "circuit breaker closed");
                }
            }
        }
    }

    /// Per-service breaker state for diagnostics
    pub fn snapshot(&self) -> HashMap<String, BreakerSnapshot> {
        let states = self.states.lock().unwrap();
        states
            .iter()
            .map(|(key, state)| {
                (
                    key.clone(),
                    BreakerSnapshot {
                        failures: state.failures,
                        is_open: state.is_open,
                        seconds_since_last_failure: state
                            .last_failure
                            .map(|at| at.elapsed().as_secs()),
                    },
                )
            })
            .collect()
    }

    /// Drop all breaker state
    pub fn clear(&self) {
        self.states.lock().unwrap().clear();
    }
}
