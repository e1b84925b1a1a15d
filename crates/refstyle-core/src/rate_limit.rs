//! Per-host rate limiting with adaptive governor instances.
//!
//! Each link lookup waits for its host's governor permit via `until_ready()`,
//! which spaces requests at the host's budget. On 429 the host's governor is
//! slowed; other hosts are unaffected.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for governor's direct rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request budgets in requests per minute.
const DOI_ORG_PER_MINUTE: u32 = 30;
const ACM_PER_MINUTE: u32 = 10;
const DEFAULT_PER_MINUTE: u32 = 50;

/// Error type for link lookups, distinguishing rate limiting from other errors.
#[derive(Debug, Clone)]
pub enum LinkQueryError {
    /// Server returned 429 Too Many Requests.
    RateLimited { retry_after: Option<Duration> },
    /// Any other error.
    Other(String),
}

impl std::fmt::Display for LinkQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkQueryError::RateLimited {
                retry_after: Some(d),
            } => write!(f, "Rate limited (429), retry after {:.1}s", d.as_secs_f64()),
            LinkQueryError::RateLimited { retry_after: None } => write!(f, "Rate limited (429)"),
            LinkQueryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for LinkQueryError {}

impl From<String> for LinkQueryError {
    fn from(s: String) -> Self {
        LinkQueryError::Other(s)
    }
}

fn quota_for(period: Duration) -> Quota {
    Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
}

/// Per-host rate limiter with adaptive rate adjustment via ArcSwap.
///
/// When a 429 is received, the governor is atomically swapped to a slower rate.
/// After a cooldown period (60s) with no 429s, the original rate is restored.
pub struct AdaptiveHostLimiter {
    limiter: ArcSwap<DirectLimiter>,
    /// Base period between allowed requests.
    base_period: Duration,
    /// Current slowdown factor (1 = normal, 2 = half rate, etc.).
    current_factor: AtomicU32,
    /// Timestamp of the last 429 response.
    last_429: Mutex<Option<Instant>>,
}

impl AdaptiveHostLimiter {
    /// Create a new limiter with the given minimum delay between requests.
    pub fn new(period: Duration) -> Self {
        let limiter = Arc::new(DirectLimiter::direct(quota_for(period)));
        Self {
            limiter: ArcSwap::from(limiter),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: Mutex::new(None),
        }
    }

    /// Create a limiter allowing `n` requests per minute.
    pub fn per_minute(n: u32) -> Self {
        let ms = 60_000 / n.max(1) as u64;
        Self::new(Duration::from_millis(ms))
    }

    /// Minimum delay between requests when not slowed down.
    pub fn base_period(&self) -> Duration {
        self.base_period
    }

    /// Current slowdown factor (1 = normal).
    pub fn slowdown(&self) -> u32 {
        self.current_factor.load(Ordering::SeqCst)
    }

    /// Wait until the rate limiter allows a request.
    pub async fn acquire(&self) {
        self.try_decay();
        let limiter = self.limiter.load();
        limiter.until_ready().await;
    }

    /// Called when a 429 is received. Doubles the slowdown factor and swaps the governor.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        // Double factor, cap at 16x slowdown
        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(16))
            });

        let factor = self.current_factor.load(Ordering::SeqCst);
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            tracing::debug!(factor, "slowing host limiter after 429");
            self.limiter.store(Arc::new(DirectLimiter::direct(quota)));
        }
    }

    /// If 60s have passed since the last 429, restore the original rate.
    fn try_decay(&self) {
        let should_restore = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed().as_secs() >= 60))
            .unwrap_or(false);

        if should_restore && self.current_factor.load(Ordering::SeqCst) > 1 {
            self.current_factor.store(1, Ordering::SeqCst);
            let limiter = Arc::new(DirectLimiter::direct(quota_for(self.base_period)));
            self.limiter.store(limiter);
        }
    }
}

/// Collection of per-host rate limiters, created on first use.
///
/// Each host gets its own limiter, so a slow or rate-limited host never
/// delays lookups against another one.
pub struct HostRateLimiters {
    limiters: Mutex<HashMap<String, Arc<AdaptiveHostLimiter>>>,
    budgets: HashMap<String, u32>,
    default_per_minute: u32,
}

impl Default for HostRateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRateLimiters {
    /// Limiters with the built-in budgets: doi.org 30/min, dl.acm.org 10/min,
    /// every other host 50/min.
    pub fn new() -> Self {
        let mut budgets = HashMap::new();
        budgets.insert("doi.org".to_string(), DOI_ORG_PER_MINUTE);
        budgets.insert("dl.acm.org".to_string(), ACM_PER_MINUTE);
        Self {
            limiters: Mutex::new(HashMap::new()),
            budgets,
            default_per_minute: DEFAULT_PER_MINUTE,
        }
    }

    /// Override the budget for one host.
    pub fn with_budget(mut self, host: &str, per_minute: u32) -> Self {
        self.budgets.insert(normalize_host(host), per_minute);
        self
    }

    /// Override the budget for hosts without a specific entry.
    pub fn with_default_budget(mut self, per_minute: u32) -> Self {
        self.default_per_minute = per_minute;
        self
    }

    /// Requests per minute allowed for `host`.
    pub fn budget_for(&self, host: &str) -> u32 {
        self.budgets
            .get(&normalize_host(host))
            .copied()
            .unwrap_or(self.default_per_minute)
    }

    /// Get the limiter for `host`, creating it on first use.
    pub fn get(&self, host: &str) -> Arc<AdaptiveHostLimiter> {
        let host = normalize_host(host);
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        limiters
            .entry(host.clone())
            .or_insert_with(|| Arc::new(AdaptiveHostLimiter::per_minute(self.budget_for(&host))))
            .clone()
    }

    /// Number of hosts that have been contacted.
    pub fn host_count(&self) -> usize {
        self.limiters.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// Canonical limiter key. `dx.doi.org` is the same resolver as `doi.org`.
fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    match host {
        "dx.doi.org" => "doi.org".to_string(),
        other => other.to_string(),
    }
}

/// Check if an HTTP response is a 429 and extract Retry-After if present.
///
/// Returns `Err(LinkQueryError::RateLimited { .. })` if 429, `Ok(())` otherwise.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), LinkQueryError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(LinkQueryError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date: use a conservative fixed wait rather than parsing the date
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}
