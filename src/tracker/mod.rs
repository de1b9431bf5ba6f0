/// Request-rate tracking for the Open-Meteo API.
///
/// ## Windows
///
/// Three counters, each keyed by the current calendar window:
/// - daily    (`%Y-%m-%d`)       ceiling 10000
/// - hourly   (`%Y-%m-%d %H`)    ceiling 5000
/// - minutely (`%Y-%m-%d %H:%M`) ceiling 600
///
/// A counter resets when its window key changes. `check` reports the first
/// window that would be exceeded, in the order daily, hourly, minutely.
/// `try_record` checks and counts under one lock, so concurrent callers
/// cannot both take the last slot.
///
/// ## Backends
///
/// - `InMemoryRateTracker`: state behind a mutex, for a single process.
/// - `FileRateTracker`: state persisted as JSON so counts survive restarts.
///   Updates are serialized within one process only; two processes sharing
///   the file can lose increments.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::model::PipelineError;

// ---------------------------------------------------------------------------
// Windows and limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateWindow {
    Daily,
    Hourly,
    Minutely,
}

impl RateWindow {
    pub const ALL: [RateWindow; 3] = [RateWindow::Daily, RateWindow::Hourly, RateWindow::Minutely];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::Daily => "daily",
            RateWindow::Hourly => "hourly",
            RateWindow::Minutely => "minutely",
        }
    }

    /// Key identifying the window `now` falls into.
    pub fn key(&self, now: NaiveDateTime) -> String {
        let format = match self {
            RateWindow::Daily => "%Y-%m-%d",
            RateWindow::Hourly => "%Y-%m-%d %H",
            RateWindow::Minutely => "%Y-%m-%d %H:%M",
        };
        now.format(format).to_string()
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request ceilings per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub daily: u32,
    pub hourly: u32,
    pub minutely: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            daily: 10_000,
            hourly: 5_000,
            minutely: 600,
        }
    }
}

impl RateLimits {
    pub fn ceiling(&self, window: RateWindow) -> u32 {
        match window {
            RateWindow::Daily => self.daily,
            RateWindow::Hourly => self.hourly,
            RateWindow::Minutely => self.minutely,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{window} request limit reached")]
pub struct RateLimitError {
    pub window: RateWindow,
}

impl From<RateLimitError> for PipelineError {
    fn from(err: RateLimitError) -> Self {
        PipelineError::RateLimited { window: err.window }
    }
}

/// Admission control for outbound weather requests.
pub trait RateTracker: Send + Sync {
    /// Whether `requests` more calls fit in every window at `now`.
    fn check(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError>;

    /// Counts `requests` calls against every window at `now`.
    fn record(&self, requests: u32, now: NaiveDateTime);

    /// Counts `requests` calls only if they fit in every window.
    fn try_record(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError>;
}

// ---------------------------------------------------------------------------
// Counter state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct WindowCounter {
    #[serde(alias = "date", alias = "datetime")]
    key: String,
    requests: u32,
}

/// Persisted shape of the tracker. Also reads files written with the older
/// `date`/`datetime` field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrackerState {
    daily: WindowCounter,
    hourly: WindowCounter,
    minutely: WindowCounter,
}

impl TrackerState {
    fn counter_mut(&mut self, window: RateWindow) -> &mut WindowCounter {
        match window {
            RateWindow::Daily => &mut self.daily,
            RateWindow::Hourly => &mut self.hourly,
            RateWindow::Minutely => &mut self.minutely,
        }
    }

    fn counter(&self, window: RateWindow) -> &WindowCounter {
        match window {
            RateWindow::Daily => &self.daily,
            RateWindow::Hourly => &self.hourly,
            RateWindow::Minutely => &self.minutely,
        }
    }

    /// Resets every counter whose window has moved on. Returns whether
    /// anything changed.
    fn roll(&mut self, now: NaiveDateTime) -> bool {
        let mut changed = false;
        for window in RateWindow::ALL {
            let key = window.key(now);
            let counter = self.counter_mut(window);
            if counter.key != key {
                log::debug!("{} tracker reset for {}", window, key);
                *counter = WindowCounter { key, requests: 0 };
                changed = true;
            }
        }
        changed
    }

    fn check(&self, requests: u32, limits: &RateLimits) -> Result<(), RateLimitError> {
        for window in RateWindow::ALL {
            let remaining = limits
                .ceiling(window)
                .saturating_sub(self.counter(window).requests);
            if requests > remaining {
                return Err(RateLimitError { window });
            }
        }
        Ok(())
    }

    fn add(&mut self, requests: u32) {
        for window in RateWindow::ALL {
            let counter = self.counter_mut(window);
            counter.requests = counter.requests.saturating_add(requests);
        }
    }

    fn used(&self, window: RateWindow) -> u32 {
        self.counter(window).requests
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

pub struct InMemoryRateTracker {
    limits: RateLimits,
    state: Mutex<TrackerState>,
}

impl InMemoryRateTracker {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Requests counted so far in `window` as of `now`.
    pub fn used(&self, window: RateWindow, now: NaiveDateTime) -> u32 {
        let mut state = lock(&self.state);
        state.roll(now);
        state.used(window)
    }
}

impl Default for InMemoryRateTracker {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

impl RateTracker for InMemoryRateTracker {
    fn check(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError> {
        let mut state = lock(&self.state);
        state.roll(now);
        state.check(requests, &self.limits)
    }

    fn record(&self, requests: u32, now: NaiveDateTime) {
        let mut state = lock(&self.state);
        state.roll(now);
        state.add(requests);
    }

    fn try_record(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError> {
        let mut state = lock(&self.state);
        state.roll(now);
        state.check(requests, &self.limits)?;
        state.add(requests);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

pub struct FileRateTracker {
    path: PathBuf,
    limits: RateLimits,
    guard: Mutex<()>,
}

impl FileRateTracker {
    pub fn new(path: impl Into<PathBuf>, limits: RateLimits) -> Self {
        Self {
            path: path.into(),
            limits,
            guard: Mutex::new(()),
        }
    }

    /// Missing or unreadable state starts from zero; the tracker must not
    /// block predictions because its bookkeeping file is damaged.
    fn load(&self) -> TrackerState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return TrackerState::default(),
            Err(e) => {
                log::warn!("Error reading tracker file {}: {}", self.path.display(), e);
                return TrackerState::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            log::warn!("Error parsing tracker file {}: {}", self.path.display(), e);
            TrackerState::default()
        })
    }

    fn save(&self, state: &TrackerState) {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            log::warn!("Error creating tracker directory {}: {}", parent.display(), e);
            return;
        }

        let result = serde_json::to_string(state)
            .map_err(std::io::Error::other)
            .and_then(|json| fs::write(&self.path, json));

        if let Err(e) = result {
            log::warn!("Error writing tracker file {}: {}", self.path.display(), e);
        }
    }
}

impl RateTracker for FileRateTracker {
    fn check(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError> {
        let _guard = lock(&self.guard);
        let mut state = self.load();
        if state.roll(now) {
            self.save(&state);
        }
        state.check(requests, &self.limits)
    }

    fn record(&self, requests: u32, now: NaiveDateTime) {
        let _guard = lock(&self.guard);
        let mut state = self.load();
        state.roll(now);
        state.add(requests);
        self.save(&state);
    }

    fn try_record(&self, requests: u32, now: NaiveDateTime) -> Result<(), RateLimitError> {
        let _guard = lock(&self.guard);
        let mut state = self.load();
        let rolled = state.roll(now);
        if let Err(denied) = state.check(requests, &self.limits) {
            if rolled {
                self.save(&state);
            }
            return Err(denied);
        }
        state.add(requests);
        self.save(&state);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "wreckognizer_{}_{}_{}.json",
            name,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn test_window_keys() {
        let now = at(14, 5, 30);
        assert_eq!(RateWindow::Daily.key(now), "2024-03-10");
        assert_eq!(RateWindow::Hourly.key(now), "2024-03-10 14");
        assert_eq!(RateWindow::Minutely.key(now), "2024-03-10 14:05");
    }

    #[test]
    fn test_fresh_tracker_allows_requests() {
        let tracker = InMemoryRateTracker::default();
        assert!(tracker.check(1, at(9, 0, 0)).is_ok());
        assert!(tracker.check(600, at(9, 0, 0)).is_ok());
        assert_eq!(
            tracker.check(601, at(9, 0, 0)),
            Err(RateLimitError { window: RateWindow::Minutely })
        );
    }

    #[test]
    fn test_minute_ceiling_names_minutely() {
        let tracker = InMemoryRateTracker::default();
        let now = at(9, 0, 0);
        tracker.record(600, now);

        let err = tracker.check(1, now).unwrap_err();
        assert_eq!(err.window, RateWindow::Minutely);
        assert_eq!(PipelineError::from(err).to_string(), "Open-Meteo API minutely limit reached");
    }

    #[test]
    fn test_minute_counter_resets_next_minute() {
        let tracker = InMemoryRateTracker::default();
        tracker.record(600, at(9, 0, 0));
        assert!(tracker.check(1, at(9, 0, 59)).is_err());
        assert!(tracker.check(1, at(9, 1, 0)).is_ok());
        assert_eq!(tracker.used(RateWindow::Hourly, at(9, 1, 0)), 600);
        assert_eq!(tracker.used(RateWindow::Minutely, at(9, 1, 0)), 0);
    }

    #[test]
    fn test_daily_window_is_reported_first() {
        let limits = RateLimits { daily: 5, hourly: 5, minutely: 5 };
        let tracker = InMemoryRateTracker::new(limits);
        let now = at(23, 59, 0);
        tracker.record(5, now);
        assert_eq!(tracker.check(1, now).unwrap_err().window, RateWindow::Daily);

        // all three windows roll over at midnight
        let tomorrow = now + Duration::minutes(1);
        assert!(tracker.check(5, tomorrow).is_ok());
    }

    #[test]
    fn test_hourly_window_between_daily_and_minutely() {
        let limits = RateLimits { daily: 100, hourly: 10, minutely: 10 };
        let tracker = InMemoryRateTracker::new(limits);
        for minute in 0..10 {
            tracker.record(1, at(10, minute, 0));
        }
        assert_eq!(tracker.check(1, at(10, 30, 0)).unwrap_err().window, RateWindow::Hourly);
        assert!(tracker.check(1, at(11, 0, 0)).is_ok());
    }

    #[test]
    fn test_try_record_takes_last_slot_once() {
        let tracker = InMemoryRateTracker::default();
        let now = at(9, 0, 0);
        tracker.record(599, now);

        assert!(tracker.try_record(1, now).is_ok());
        assert_eq!(tracker.try_record(1, now).unwrap_err().window, RateWindow::Minutely);
        assert_eq!(tracker.used(RateWindow::Minutely, now), 600);
    }

    #[test]
    fn test_concurrent_try_record_never_exceeds_ceiling() {
        let limits = RateLimits { daily: 1_000, hourly: 1_000, minutely: 50 };
        let tracker = std::sync::Arc::new(InMemoryRateTracker::new(limits));
        let now = at(9, 0, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || (0..20).filter(|_| tracker.try_record(1, now).is_ok()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
        assert_eq!(tracker.used(RateWindow::Minutely, now), 50);
    }

    #[test]
    fn test_file_tracker_try_record_refuses_without_counting() {
        let path = temp_path("try_record");
        let now = at(12, 0, 0);
        let tracker = FileRateTracker::new(&path, RateLimits::default());

        tracker.record(599, now);
        assert!(tracker.try_record(1, now).is_ok());
        assert_eq!(tracker.try_record(1, now).unwrap_err().window, RateWindow::Minutely);

        let saved: TrackerState = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.minutely.requests, 600);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_tracker_persists_between_instances() {
        let path = temp_path("persist");
        let now = at(12, 0, 0);

        FileRateTracker::new(&path, RateLimits::default()).record(600, now);

        let reopened = FileRateTracker::new(&path, RateLimits::default());
        assert_eq!(reopened.check(1, now).unwrap_err().window, RateWindow::Minutely);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_tracker_reads_legacy_field_names() {
        let path = temp_path("legacy");
        fs::write(
            &path,
            r#"{"daily": {"date": "2024-03-10", "requests": 10000},
                "hourly": {"datetime": "2024-03-10 12", "requests": 3},
                "minutely": {"datetime": "2024-03-10 12:00", "requests": 3}}"#,
        )
        .unwrap();

        let tracker = FileRateTracker::new(&path, RateLimits::default());
        assert_eq!(tracker.check(1, at(12, 0, 0)).unwrap_err().window, RateWindow::Daily);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_tracker_recovers_from_corrupt_file() {
        let path = temp_path("corrupt");
        fs::write(&path, "not json").unwrap();

        let tracker = FileRateTracker::new(&path, RateLimits::default());
        assert!(tracker.check(1, at(8, 0, 0)).is_ok());
        tracker.record(1, at(8, 0, 0));

        let saved: TrackerState = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.minutely.requests, 1);

        let _ = fs::remove_file(&path);
    }
}
