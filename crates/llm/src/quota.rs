//! Per-provider quota tracking.
//!
//! Each provider may carry three independent limits:
//! - a daily request counter that rolls over at a fixed wall-clock hour,
//! - a rolling 60-second request window (rpm),
//! - a rolling 60-second token window (tpm).
//!
//! Daily counters live in an injected [`CounterStore`] so they can be kept
//! in memory or persisted transactionally. The rolling windows are process
//! local. A call is recorded once, before its outcome is known, and is never
//! rolled back.

use crate::clock::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use concierge_core::config::{ProviderSettings, QuotaSettings};
use concierge_core::{AppError, AppResult};
use parking_lot::Mutex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Configured limits for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimits {
    pub daily_limit: Option<u64>,
    pub rpm_limit: Option<u32>,
    pub tpm_limit: Option<u64>,
}

impl QuotaLimits {
    pub fn is_unlimited(&self) -> bool {
        self.daily_limit.is_none() && self.rpm_limit.is_none() && self.tpm_limit.is_none()
    }
}

impl From<&ProviderSettings> for QuotaLimits {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            daily_limit: settings.daily_limit,
            rpm_limit: settings.rpm_limit,
            tpm_limit: settings.tpm_limit,
        }
    }
}

/// Storage for daily counters.
///
/// Every increment must be atomic with respect to concurrent callers.
pub trait CounterStore: Send + Sync {
    /// Calls recorded for `provider` in the window starting at `window_start`.
    fn daily_count(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64>;

    /// Unconditionally add one call and return the new count.
    fn increment_daily(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64>;

    /// Add one call only while the count is below `limit`.
    ///
    /// Returns the new count, or `None` when the window is already full.
    fn try_increment_daily(
        &self,
        provider: &str,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Option<u64>>;
}

/// In-memory counter store guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (DateTime<Utc>, u64)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn daily_count(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64> {
        let counters = self.counters.lock();
        Ok(match counters.get(provider) {
            Some((start, count)) if *start == window_start => *count,
            _ => 0,
        })
    }

    fn increment_daily(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64> {
        let mut counters = self.counters.lock();
        let slot = counters
            .entry(provider.to_string())
            .or_insert((window_start, 0));
        if slot.0 != window_start {
            *slot = (window_start, 0);
        }
        slot.1 += 1;
        Ok(slot.1)
    }

    fn try_increment_daily(
        &self,
        provider: &str,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Option<u64>> {
        let mut counters = self.counters.lock();
        let slot = counters
            .entry(provider.to_string())
            .or_insert((window_start, 0));
        if slot.0 != window_start {
            *slot = (window_start, 0);
        }
        if slot.1 >= limit {
            return Ok(None);
        }
        slot.1 += 1;
        Ok(Some(slot.1))
    }
}

/// Lifecycle of a provider's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaState {
    Open,
    Exhausted,
}

/// Point-in-time quota snapshot for one provider.
///
/// `percentage_used` is computed from the counters on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaStatus {
    pub provider: String,
    pub daily_limit: Option<u64>,
    pub used_count: u64,
    pub window_reset_at: DateTime<Utc>,
    pub rpm_limit: Option<u32>,
    pub rpm_used: u32,
    pub tpm_limit: Option<u64>,
    pub tpm_used: u64,
}

impl QuotaStatus {
    /// Daily usage as a percentage of the daily limit (0 when unlimited).
    pub fn percentage_used(&self) -> f64 {
        match self.daily_limit {
            Some(0) => 100.0,
            Some(limit) => self.used_count as f64 * 100.0 / limit as f64,
            None => 0.0,
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.daily_limit
            .map(|limit| limit.saturating_sub(self.used_count))
    }

    pub fn state(&self) -> QuotaState {
        let daily_full = self
            .daily_limit
            .is_some_and(|limit| self.used_count >= limit);
        let rpm_full = self
            .rpm_limit
            .is_some_and(|limit| self.rpm_used >= limit);
        let tpm_full = self
            .tpm_limit
            .is_some_and(|limit| self.tpm_used >= limit);

        if daily_full || rpm_full || tpm_full {
            QuotaState::Exhausted
        } else {
            QuotaState::Open
        }
    }
}

impl Serialize for QuotaStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("QuotaStatus", 11)?;
        s.serialize_field("provider", &self.provider)?;
        s.serialize_field("dailyLimit", &self.daily_limit)?;
        s.serialize_field("usedCount", &self.used_count)?;
        s.serialize_field("remaining", &self.remaining())?;
        s.serialize_field("percentageUsed", &self.percentage_used())?;
        s.serialize_field("state", &self.state())?;
        s.serialize_field("windowResetAt", &self.window_reset_at.to_rfc3339())?;
        s.serialize_field("rpmLimit", &self.rpm_limit)?;
        s.serialize_field("rpmUsed", &self.rpm_used)?;
        s.serialize_field("tpmLimit", &self.tpm_limit)?;
        s.serialize_field("tpmUsed", &self.tpm_used)?;
        s.end()
    }
}

/// Rolling 60-second windows for one provider.
#[derive(Debug, Default)]
struct MinuteWindow {
    requests: VecDeque<DateTime<Utc>>,
    tokens: VecDeque<(DateTime<Utc>, u64)>,
}

impl MinuteWindow {
    fn prune(&mut self, now: DateTime<Utc>) {
        let horizon = now - Duration::seconds(60);
        while self.requests.front().is_some_and(|t| *t <= horizon) {
            self.requests.pop_front();
        }
        while self.tokens.front().is_some_and(|(t, _)| *t <= horizon) {
            self.tokens.pop_front();
        }
    }

    fn request_count(&self) -> u32 {
        self.requests.len() as u32
    }

    fn token_count(&self) -> u64 {
        self.tokens.iter().map(|(_, n)| n).sum()
    }

    fn has_headroom(&self, limits: &QuotaLimits) -> bool {
        let rpm_ok = limits
            .rpm_limit
            .map_or(true, |limit| self.request_count() < limit);
        let tpm_ok = limits
            .tpm_limit
            .map_or(true, |limit| self.token_count() < limit);
        rpm_ok && tpm_ok
    }
}

/// Tracks call counters for every provider in the chain.
pub struct QuotaTracker {
    limits: BTreeMap<String, QuotaLimits>,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    reset_hour_utc: u32,
    minute: Mutex<HashMap<String, MinuteWindow>>,
}

impl QuotaTracker {
    /// Create an empty tracker; register providers with [`QuotaTracker::with_provider`].
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, reset_hour_utc: u32) -> Self {
        Self {
            limits: BTreeMap::new(),
            store,
            clock,
            reset_hour_utc: reset_hour_utc.min(23),
            minute: Mutex::new(HashMap::new()),
        }
    }

    /// Build a tracker for a provider chain.
    pub fn from_settings<'a>(
        providers: impl IntoIterator<Item = &'a ProviderSettings>,
        settings: &QuotaSettings,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        providers
            .into_iter()
            .fold(Self::new(store, clock, settings.reset_hour_utc), |tracker, p| {
                tracker.with_provider(&p.id, QuotaLimits::from(p))
            })
    }

    pub fn with_provider(mut self, provider: &str, limits: QuotaLimits) -> Self {
        self.limits.insert(provider.to_string(), limits);
        self
    }

    fn limits_for(&self, provider: &str) -> QuotaLimits {
        self.limits.get(provider).copied().unwrap_or_default()
    }

    /// Start of the daily window containing `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let candidate = date
            .and_hms_opt(self.reset_hour_utc, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);
        if candidate > now {
            candidate - Duration::days(1)
        } else {
            candidate
        }
    }

    /// Whether every window for `provider` has headroom.
    ///
    /// Store failures are logged and reported as "no headroom".
    pub fn can_call(&self, provider: &str) -> bool {
        let limits = self.limits_for(provider);
        if limits.is_unlimited() {
            return true;
        }

        let now = self.clock.now();
        let mut minute = self.minute.lock();
        let window = minute.entry(provider.to_string()).or_default();
        window.prune(now);
        if !window.has_headroom(&limits) {
            return false;
        }

        match limits.daily_limit {
            Some(limit) => match self.store.daily_count(provider, self.window_start(now)) {
                Ok(count) => count < limit,
                Err(e) => {
                    tracing::error!(provider, error = %e, "Failed to read daily quota counter");
                    false
                }
            },
            None => true,
        }
    }

    /// Check headroom and record the call in one step.
    ///
    /// Returns `false` without recording anything when any window is full.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let limits = self.limits_for(provider);
        if limits.is_unlimited() {
            return true;
        }

        let now = self.clock.now();
        let mut minute = self.minute.lock();
        let window = minute.entry(provider.to_string()).or_default();
        window.prune(now);
        if !window.has_headroom(&limits) {
            tracing::debug!(provider, "Per-minute quota window is full");
            return false;
        }

        if let Some(limit) = limits.daily_limit {
            match self
                .store
                .try_increment_daily(provider, self.window_start(now), limit)
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(provider, limit, "Daily quota exhausted");
                    return false;
                }
                Err(e) => {
                    tracing::error!(provider, error = %e, "Failed to increment daily quota counter");
                    return false;
                }
            }
        }

        window.requests.push_back(now);
        true
    }

    /// Record one call regardless of remaining headroom.
    pub fn record_call(&self, provider: &str) -> AppResult<()> {
        let limits = self.limits_for(provider);
        let now = self.clock.now();

        if limits.daily_limit.is_some() {
            self.store.increment_daily(provider, self.window_start(now))?;
        }

        let mut minute = self.minute.lock();
        let window = minute.entry(provider.to_string()).or_default();
        window.prune(now);
        window.requests.push_back(now);
        Ok(())
    }

    /// Record tokens consumed by a call, for the tpm window.
    pub fn record_tokens(&self, provider: &str, tokens: u64) {
        if tokens == 0 {
            return;
        }
        let now = self.clock.now();
        let mut minute = self.minute.lock();
        let window = minute.entry(provider.to_string()).or_default();
        window.prune(now);
        window.tokens.push_back((now, tokens));
    }

    /// Current status for one provider.
    pub fn status(&self, provider: &str) -> AppResult<QuotaStatus> {
        let limits = self
            .limits
            .get(provider)
            .copied()
            .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

        let now = self.clock.now();
        let window_start = self.window_start(now);
        let used_count = self.store.daily_count(provider, window_start)?;

        let (rpm_used, tpm_used) = {
            let mut minute = self.minute.lock();
            let window = minute.entry(provider.to_string()).or_default();
            window.prune(now);
            (window.request_count(), window.token_count())
        };

        Ok(QuotaStatus {
            provider: provider.to_string(),
            daily_limit: limits.daily_limit,
            used_count,
            window_reset_at: window_start + Duration::days(1),
            rpm_limit: limits.rpm_limit,
            rpm_used,
            tpm_limit: limits.tpm_limit,
            tpm_used,
        })
    }

    /// Status of every registered provider, keyed by provider id.
    pub fn all_status(&self) -> AppResult<BTreeMap<String, QuotaStatus>> {
        self.limits
            .keys()
            .map(|provider| Ok((provider.clone(), self.status(provider)?)))
            .collect()
    }

    /// The configured upstream limits, keyed by provider id.
    pub fn real_limits(&self) -> BTreeMap<String, QuotaLimits> {
        self.limits.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    fn tracker_with(limits: QuotaLimits) -> (QuotaTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let tracker = QuotaTracker::new(Arc::new(MemoryCounterStore::new()), clock.clone(), 0)
            .with_provider("gemini", limits);
        (tracker, clock)
    }

    fn daily(limit: u64) -> QuotaLimits {
        QuotaLimits {
            daily_limit: Some(limit),
            ..Default::default()
        }
    }

    #[test]
    fn test_daily_limit_blocks_after_exact_count() {
        let (tracker, _clock) = tracker_with(daily(3));
        for _ in 0..3 {
            assert!(tracker.can_call("gemini"));
            tracker.record_call("gemini").unwrap();
        }
        assert!(!tracker.can_call("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().state(), QuotaState::Exhausted);
    }

    #[test]
    fn test_over_limit_recording_reports_over_100_percent() {
        let (tracker, _clock) = tracker_with(daily(25));
        for _ in 0..26 {
            tracker.record_call("gemini").unwrap();
        }
        let status = tracker.status("gemini").unwrap();
        assert_eq!(status.used_count, 26);
        assert!(status.percentage_used() >= 100.0);
        assert_eq!(status.remaining(), Some(0));
        assert!(!tracker.can_call("gemini"));
    }

    #[test]
    fn test_daily_window_resets_at_boundary() {
        let (tracker, clock) = tracker_with(daily(1));
        tracker.record_call("gemini").unwrap();
        assert!(!tracker.can_call("gemini"));

        let status = tracker.status("gemini").unwrap();
        assert_eq!(
            status.window_reset_at,
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );

        clock.set(status.window_reset_at);
        assert!(tracker.can_call("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().used_count, 0);
    }

    #[test]
    fn test_window_start_honors_reset_hour() {
        let clock = Arc::new(ManualClock::new(start()));
        let tracker = QuotaTracker::new(Arc::new(MemoryCounterStore::new()), clock, 16);
        // 10:30 is before the 16:00 boundary, so the window began yesterday
        assert_eq!(
            tracker.window_start(start()),
            Utc.with_ymd_and_hms(2024, 4, 30, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rpm_window_rolls() {
        let (tracker, clock) = tracker_with(QuotaLimits {
            rpm_limit: Some(2),
            ..Default::default()
        });

        assert!(tracker.try_acquire("gemini"));
        assert!(tracker.try_acquire("gemini"));
        assert!(!tracker.try_acquire("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().rpm_used, 2);

        clock.advance(Duration::seconds(61));
        assert!(tracker.can_call("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().rpm_used, 0);
    }

    #[test]
    fn test_tpm_window() {
        let (tracker, clock) = tracker_with(QuotaLimits {
            tpm_limit: Some(1000),
            ..Default::default()
        });

        tracker.record_tokens("gemini", 600);
        assert!(tracker.can_call("gemini"));
        tracker.record_tokens("gemini", 400);
        assert!(!tracker.can_call("gemini"));

        clock.advance(Duration::seconds(60));
        assert!(tracker.can_call("gemini"));
    }

    #[test]
    fn test_both_windows_must_have_headroom() {
        let (tracker, _clock) = tracker_with(QuotaLimits {
            daily_limit: Some(100),
            rpm_limit: Some(1),
            tpm_limit: None,
        });
        assert!(tracker.try_acquire("gemini"));
        // Daily has room, minute does not
        assert!(!tracker.can_call("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().used_count, 1);
    }

    #[test]
    fn test_try_acquire_does_not_record_when_full() {
        let (tracker, _clock) = tracker_with(daily(2));
        assert!(tracker.try_acquire("gemini"));
        assert!(tracker.try_acquire("gemini"));
        assert!(!tracker.try_acquire("gemini"));
        assert_eq!(tracker.status("gemini").unwrap().used_count, 2);
    }

    #[test]
    fn test_unlimited_and_unknown_providers() {
        let (tracker, _clock) = tracker_with(QuotaLimits::default());
        for _ in 0..100 {
            assert!(tracker.try_acquire("gemini"));
        }
        assert!(tracker.can_call("not-registered"));
        assert!(tracker.status("not-registered").is_err());
        assert_eq!(tracker.status("gemini").unwrap().percentage_used(), 0.0);
    }

    #[test]
    fn test_concurrent_record_call_counts_exactly() {
        let (tracker, _clock) = tracker_with(daily(10_000));
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..125 {
                        tracker.record_call("gemini").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.status("gemini").unwrap().used_count, 1000);
    }

    #[test]
    fn test_concurrent_try_acquire_never_overshoots() {
        let (tracker, _clock) = tracker_with(daily(50));
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || (0..20).filter(|_| tracker.try_acquire("gemini")).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(granted, 50);
        assert_eq!(tracker.status("gemini").unwrap().used_count, 50);
    }

    #[test]
    fn test_status_serializes_derived_percentage() {
        let (tracker, _clock) = tracker_with(daily(4));
        tracker.record_call("gemini").unwrap();
        let json = serde_json::to_value(tracker.status("gemini").unwrap()).unwrap();
        assert_eq!(json["usedCount"], 1);
        assert_eq!(json["percentageUsed"], 25.0);
        assert_eq!(json["state"], "open");
    }

    #[test]
    fn test_all_status_and_real_limits() {
        let clock = Arc::new(ManualClock::new(start()));
        let providers = concierge_core::config::default_providers();
        let tracker = QuotaTracker::from_settings(
            &providers,
            &QuotaSettings::default(),
            Arc::new(MemoryCounterStore::new()),
            clock,
        );

        let all = tracker.all_status().unwrap();
        assert_eq!(all.len(), providers.len());
        assert_eq!(all["gemini"].daily_limit, Some(1500));

        let limits = tracker.real_limits();
        assert_eq!(limits["groq"].rpm_limit, Some(30));
        assert!(limits["rules"].is_unlimited());
    }
}
