// ── Circuit breaker ───────────────────────────────────────────────────────────
// A fast-fail guard in front of each upstream, independent of the proxy's
// "never retry" contract with its own caller: after enough consecutive
// failures against one upstream, further requests are rejected immediately
// rather than left to hang on a doomed connection.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::SystemTime;

const DEFAULT_THRESHOLD: u32 = 5;
const DEFAULT_COOLDOWN_SECS: u64 = 60;

pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: AtomicU64,
    threshold: u32,
    cooldown_secs: u64,
}

impl CircuitBreaker {
    pub const fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: AtomicU64::new(0),
            threshold,
            cooldown_secs,
        }
    }

    pub const fn with_defaults() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_COOLDOWN_SECS)
    }

    /// `Ok(())` if the request may proceed; `Err(message)` if the circuit is
    /// open and still cooling down.
    pub fn check(&self) -> Result<(), String> {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures < self.threshold {
            return Ok(());
        }

        let tripped = self.tripped_at.load(Ordering::Relaxed);
        let now = now_secs();

        if now - tripped < self.cooldown_secs {
            Err(format!(
                "circuit open: {failures} consecutive failures, cooling down for {}s",
                self.cooldown_secs - (now - tripped)
            ))
        } else {
            Ok(())
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.tripped_at.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            self.tripped_at.store(now_secs(), Ordering::Relaxed);
            log::warn!("[proxy] circuit breaker tripped after {} consecutive failures", prev + 1);
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_below_threshold() {
        let breaker = CircuitBreaker::new(3, 60);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn trips_open_at_threshold() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_err());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(breaker.check().is_ok());
    }
}
