//! Server-directed throttling
//!
//! A process-wide, host-keyed gate that remembers the earliest time the next
//! request to that host may be issued. Every response's `Retry-After` header
//! feeds the gate; every outbound request awaits it first. Updates keep the
//! LATER of competing deadlines so concurrent observers can never shorten a
//! backoff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-host retry deadline.
///
/// The deadline is a millisecond offset from the gate's creation instant,
/// held in an atomic so updates are a lock-free compare-and-set loop.
pub struct RetryGate {
    epoch: Instant,
    deadline_ms: AtomicU64,
}

impl RetryGate {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            deadline_ms: AtomicU64::new(0),
        }
    }

    /// The earliest instant the next request may be dispatched.
    pub fn next_open(&self) -> Instant {
        self.epoch + Duration::from_millis(self.deadline_ms.load(Ordering::Acquire))
    }

    /// Suspend until the gate is open.
    ///
    /// Re-checks after waking because another task may have pushed the
    /// deadline further out in the meantime.
    pub async fn wait(&self) {
        loop {
            let deadline = self.next_open();
            if deadline <= Instant::now() {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Move the deadline at least `delay` into the future.
    ///
    /// Competing updates retain the later of the two deadlines.
    pub fn push_back(&self, delay: Duration) {
        let target = Instant::now() + delay;
        let target_ms = target.saturating_duration_since(self.epoch).as_millis() as u64;

        let mut current = self.deadline_ms.load(Ordering::Acquire);
        while target_ms > current {
            match self.deadline_ms.compare_exchange_weak(
                current,
                target_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Update the gate from a `Retry-After` response header.
    pub fn observe(&self, retry_after: &str) {
        match parse_retry_after(retry_after) {
            Some(delay) => {
                warn!(delay_ms = delay.as_millis() as u64, "Server requested backoff");
                self.push_back(delay);
            }
            None => debug!(value = retry_after, "Ignoring unparseable Retry-After"),
        }
    }
}

impl Default for RetryGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `Retry-After` header value.
///
/// Both forms are accepted: relative delta-seconds (`"2"`) and an absolute
/// HTTP-date (`"Fri, 31 Dec 1999 23:59:59 GMT"`). Dates already in the past
/// yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    delta.to_std().ok().filter(|d| !d.is_zero())
}

/// Process-wide gate registry, keyed by host so all operations targeting the
/// same server share a single backoff clock.
fn registry() -> &'static Mutex<HashMap<String, Arc<RetryGate>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<RetryGate>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The shared gate governing requests to the given URL's host.
pub fn gate_for_url(url: &str) -> Arc<RetryGate> {
    let key = host_key(url);
    let mut gates = registry().lock().expect("throttle registry poisoned");
    Arc::clone(gates.entry(key).or_default())
}

fn host_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or(url).to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    }
}
