//! Sliding-window admission control.
//!
//! Each client identifier gets two timestamp logs, one per horizon (60 s and
//! 3600 s). A request is admitted only if both logs are below their ceilings
//! after pruning; rejected attempts are not recorded and therefore never
//! consume quota. State is process-local and best-effort: a restart resets
//! every counter.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
struct ClientWindows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

/// Per-client sliding-window rate limiter.
///
/// One global mutex guards the whole identifier map; prune, check and append
/// happen as a single atomic unit per call, and the lock is never held across
/// an await point.
#[derive(Debug)]
pub struct RateLimiter {
    per_minute: usize,
    per_hour: usize,
    clients: Mutex<HashMap<String, ClientWindows>>,
}

impl RateLimiter {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        Self {
            per_minute,
            per_hour,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request attempt for `identifier`.
    pub fn admit(&self, identifier: &str) -> bool {
        self.admit_at(identifier, Instant::now())
    }

    fn admit_at(&self, identifier: &str, now: Instant) -> bool {
        let mut clients = self.lock();
        let windows = clients.entry(identifier.to_string()).or_default();

        prune(&mut windows.minute, now, MINUTE);
        prune(&mut windows.hour, now, HOUR);

        if windows.minute.len() >= self.per_minute || windows.hour.len() >= self.per_hour {
            tracing::warn!(client = identifier, "rate limit exceeded");
            return false;
        }

        windows.minute.push_back(now);
        windows.hour.push_back(now);
        true
    }

    /// Drop identifiers whose hour window has emptied. Run periodically so the
    /// map stays bounded by active-client cardinality instead of growing over
    /// every identifier ever seen. Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, windows| {
            prune(&mut windows.hour, now, HOUR);
            !windows.hour.is_empty()
        });
        before - clients.len()
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ClientWindows>> {
        // A poisoned lock only means some handler panicked mid-update; the
        // window data itself is still usable for best-effort limiting.
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, horizon: Duration) {
    while let Some(front) = window.front() {
        if now.duration_since(*front) >= horizon {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_minute_ceiling_then_rejects() {
        let limiter = RateLimiter::new(3, 1000);
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(
                limiter.admit_at("a", t0 + Duration::from_secs(i)),
                "call {i} should be admitted"
            );
        }
        assert!(!limiter.admit_at("a", t0 + Duration::from_secs(3)));
    }

    #[test]
    fn window_frees_up_after_sixty_seconds() {
        let limiter = RateLimiter::new(2, 1000);
        let t0 = Instant::now();
        assert!(limiter.admit_at("a", t0));
        assert!(limiter.admit_at("a", t0 + Duration::from_secs(1)));
        assert!(!limiter.admit_at("a", t0 + Duration::from_secs(2)));
        // The first slot expires exactly at t0 + 60s.
        assert!(limiter.admit_at("a", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn rejected_attempts_do_not_consume_quota() {
        let limiter = RateLimiter::new(1, 1000);
        let t0 = Instant::now();
        assert!(limiter.admit_at("a", t0));
        // Hammering while blocked must not extend the window.
        for i in 1..30 {
            assert!(!limiter.admit_at("a", t0 + Duration::from_secs(i)));
        }
        assert!(limiter.admit_at("a", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn hour_ceiling_applies_independently() {
        let limiter = RateLimiter::new(1000, 2);
        let t0 = Instant::now();
        assert!(limiter.admit_at("a", t0));
        // Spread past the minute horizon so only the hour log is full.
        assert!(limiter.admit_at("a", t0 + Duration::from_secs(120)));
        assert!(!limiter.admit_at("a", t0 + Duration::from_secs(240)));
        assert!(limiter.admit_at("a", t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn state_is_partitioned_by_identifier() {
        let limiter = RateLimiter::new(1, 1000);
        let t0 = Instant::now();
        assert!(limiter.admit_at("a", t0));
        assert!(!limiter.admit_at("a", t0 + Duration::from_secs(1)));
        assert!(limiter.admit_at("b", t0 + Duration::from_secs(1)));
    }

    #[test]
    fn sweep_evicts_idle_identifiers_only() {
        let limiter = RateLimiter::new(60, 1000);
        let t0 = Instant::now();
        assert!(limiter.admit_at("idle", t0));
        assert!(limiter.admit_at("active", t0 + Duration::from_secs(3599)));
        assert_eq!(limiter.tracked_clients(), 2);

        let evicted = limiter.sweep_at(t0 + Duration::from_secs(3600));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        // The surviving client keeps its quota accounting.
        assert!(limiter.admit_at("active", t0 + Duration::from_secs(3601)));
    }
}
