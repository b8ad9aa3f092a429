//! Call statistics accumulated across all conversations.

use std::{sync::Mutex, time::Duration};

use serde::Serialize;

/// Receives one notification per completed turn.
pub trait CallRecorder: Send + Sync {
    /// Record a call's latency and its input/output sizes in characters.
    fn record_call(&self, latency: Duration, input_chars: usize, output_chars: usize);
}

#[derive(Debug, Default)]
struct Counters {
    calls: u64,
    latency: Duration,
    chars_in: u64,
    chars_out: u64,
}

/// Process-wide call counters.
///
/// Construct once at startup and share through an `Arc`.
#[derive(Debug, Default)]
pub struct CallStats {
    counters: Mutex<Counters>,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub avg_latency_ms: u64,
    pub total_chars_in: u64,
    pub total_chars_out: u64,
}

impl CallStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the counters without resetting them.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let avg_latency_ms = if counters.calls == 0 {
            0
        } else {
            let avg = counters.latency.as_millis() / u128::from(counters.calls);
            u64::try_from(avg).unwrap_or(u64::MAX)
        };
        StatsSnapshot {
            total_calls: counters.calls,
            avg_latency_ms,
            total_chars_in: counters.chars_in,
            total_chars_out: counters.chars_out,
        }
    }
}

impl CallRecorder for CallStats {
    fn record_call(&self, latency: Duration, input_chars: usize, output_chars: usize) {
        tracing::debug!(?latency, input_chars, output_chars, "recording call");
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        counters.calls += 1;
        counters.latency += latency;
        counters.chars_in += input_chars as u64;
        counters.chars_out += output_chars as u64;
    }
}
