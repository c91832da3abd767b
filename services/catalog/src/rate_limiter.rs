//! Login throttling
//!
//! Failed logins are counted per normalized username inside a sliding
//! window. Reaching the limit locks the username out for a fixed period;
//! a successful login clears its record.
//!
//! A login must reserve an attempt with [`LoginThrottle::try_begin`] before
//! the password is checked. Reservations in flight count against the limit,
//! so parallel requests cannot check more passwords than the policy allows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    pub max_failures: u32,
    pub window: Duration,
    pub lockout: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::from_secs(5 * 60),
            lockout: Duration::from_secs(15 * 60),
        }
    }
}

/// Why a login was not allowed to proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Locked out for the remaining duration
    LockedOut(Duration),
    /// Every remaining attempt is already being checked by another request
    Saturated,
}

#[derive(Debug)]
struct FailureRecord {
    count: u32,
    in_flight: u32,
    first_failure: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    fn is_stale(&self, now: Instant, policy: &ThrottlePolicy) -> bool {
        if self.in_flight > 0 {
            return false;
        }
        match self.locked_until {
            Some(until) => now >= until,
            None => self.count == 0 || now.duration_since(self.first_failure) >= policy.window,
        }
    }
}

/// Shared failed-login tracker
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    policy: ThrottlePolicy,
    records: Arc<Mutex<HashMap<String, FailureRecord>>>,
}

impl LoginThrottle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(username: &str) -> String {
        username.trim().to_lowercase()
    }

    // Critical sections never await, and a poisoned map is still consistent
    fn records(&self) -> MutexGuard<'_, HashMap<String, FailureRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve one password check for the username
    pub fn try_begin(&self, username: &str) -> Result<LoginAttempt, Refusal> {
        let mut records = self.records();
        let now = Instant::now();
        let policy = self.policy;
        let key = Self::key(username);

        records.retain(|_, record| !record.is_stale(now, &policy));

        let record = records.entry(key.clone()).or_insert(FailureRecord {
            count: 0,
            in_flight: 0,
            first_failure: now,
            locked_until: None,
        });

        if let Some(until) = record.locked_until {
            return Err(Refusal::LockedOut(until.saturating_duration_since(now)));
        }
        if record.count == 0 && record.in_flight == 0 {
            record.first_failure = now;
        }
        if record.count + record.in_flight >= policy.max_failures {
            return Err(Refusal::Saturated);
        }

        record.in_flight += 1;
        Ok(LoginAttempt {
            throttle: self.clone(),
            key,
            settled: false,
        })
    }

    fn settle(&self, key: &str, failed: bool) {
        let mut records = self.records();
        let Some(record) = records.get_mut(key) else {
            return;
        };
        record.in_flight = record.in_flight.saturating_sub(1);

        if !failed {
            return;
        }

        record.count += 1;
        debug!("{} failed login(s) for {}", record.count, key);

        if record.count >= self.policy.max_failures && record.locked_until.is_none() {
            record.locked_until = Some(Instant::now() + self.policy.lockout);
            warn!(
                "Locked out {} for {} seconds after {} failed logins",
                key,
                self.policy.lockout.as_secs(),
                record.count
            );
        }
    }

    fn clear_key(&self, key: &str) {
        self.records().remove(key);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.records().len()
    }
}

/// A reserved password check
///
/// Dropping it without reporting an outcome gives the reservation back
/// without counting a failure.
#[derive(Debug)]
pub struct LoginAttempt {
    throttle: LoginThrottle,
    key: String,
    settled: bool,
}

impl LoginAttempt {
    pub fn failed(mut self) {
        self.settled = true;
        self.throttle.settle(&self.key, true);
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.throttle.clear_key(&self.key);
    }
}

impl Drop for LoginAttempt {
    fn drop(&mut self) {
        if !self.settled {
            self.throttle.settle(&self.key, false);
        }
    }
}
