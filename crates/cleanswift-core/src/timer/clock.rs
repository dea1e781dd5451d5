//! Session clock implementation.
//!
//! The session clock is a pausable elapsed-time accumulator. Like the rest of
//! the engine it owns no thread: the caller drives it with `tick()` (the
//! session controller does so from a one-second tokio interval).
//!
//! ## State Transitions
//!
//! ```text
//! Paused <-> Running
//! ```
//!
//! Time is read from an injectable [`TimeSource`] in milliseconds. Pausing
//! folds the running segment (partial second included) into the accumulator,
//! so any number of pause/resume cycles adds up to the same total as one
//! continuous run.

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::events::Event;

/// Default display estimate when a task carries none.
pub const DEFAULT_ESTIMATE_MINUTES: u32 = 25;

/// Monotonic millisecond source.
pub trait TimeSource: Send + Sync + fmt::Debug {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;
}

/// Production time source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven time source for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTime {
    now_ms: AtomicU64,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Pausable whole-second counter for one focus session.
#[derive(Debug, Clone)]
pub struct SessionClock {
    time: Arc<dyn TimeSource>,
    /// Milliseconds folded in from finished running segments.
    accumulated_ms: u64,
    /// Time source reading when the current running segment began.
    resumed_at_ms: Option<u64>,
    /// Last whole-second value reported by `tick()`.
    last_reported_secs: u64,
}

impl SessionClock {
    /// A clock at zero, paused.
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            accumulated_ms: 0,
            resumed_at_ms: None,
            last_reported_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.resumed_at_ms.is_some()
    }

    pub fn elapsed_ms(&self) -> u64 {
        let running = self
            .resumed_at_ms
            .map(|since| self.time.now_ms().saturating_sub(since))
            .unwrap_or(0);
        self.accumulated_ms + running
    }

    /// Whole seconds, rounded down.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms() / 1000
    }

    /// 0 ..= 100, for display only. `None` falls back to 25 minutes.
    pub fn progress_percent(&self, estimate_minutes: Option<u32>) -> u8 {
        let estimate_secs = u64::from(
            estimate_minutes
                .filter(|m| *m > 0)
                .unwrap_or(DEFAULT_ESTIMATE_MINUTES),
        ) * 60;
        let pct = self.elapsed_secs().saturating_mul(100) / estimate_secs;
        pct.min(100) as u8
    }

    /// `MM:SS`, with minutes growing past two digits when needed.
    pub fn display(&self) -> String {
        format_elapsed(self.elapsed_secs())
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.is_running() {
            return None; // Already running.
        }
        self.resumed_at_ms = Some(self.time.now_ms());
        tracing::debug!(elapsed_ms = self.accumulated_ms, "clock started");
        Some(Event::ClockStarted {
            elapsed_secs: self.elapsed_secs(),
            at: Utc::now(),
        })
    }

    /// Idempotent: pausing a paused clock does nothing.
    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        self.flush();
        self.resumed_at_ms = None;
        tracing::debug!(elapsed_ms = self.accumulated_ms, "clock paused");
        Some(Event::ClockPaused {
            elapsed_secs: self.elapsed_secs(),
            at: Utc::now(),
        })
    }

    pub fn toggle(&mut self) -> Option<Event> {
        if self.is_running() {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Call periodically. Returns an event when the whole-second count has
    /// advanced since the last report.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        self.flush();
        let secs = self.elapsed_secs();
        if secs == self.last_reported_secs {
            return None;
        }
        self.last_reported_secs = secs;
        Some(Event::ClockTicked {
            elapsed_secs: secs,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Fold the running segment into the accumulator and restart it at now.
    fn flush(&mut self) {
        if let Some(since) = self.resumed_at_ms {
            let now = self.time.now_ms();
            self.accumulated_ms += now.saturating_sub(since);
            self.resumed_at_ms = Some(now);
        }
    }
}

pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_clock() -> (Arc<ManualTime>, SessionClock) {
        let time = Arc::new(ManualTime::new());
        let clock = SessionClock::new(time.clone());
        (time, clock)
    }

    #[test]
    fn starts_at_zero_paused() {
        let (time, clock) = manual_clock();
        time.advance_secs(30);
        assert!(!clock.is_running());
        assert_eq!(clock.elapsed_secs(), 0);
    }

    #[test]
    fn start_pause_idempotent() {
        let (_time, mut clock) = manual_clock();
        assert!(clock.start().is_some());
        assert!(clock.start().is_none());
        assert!(clock.pause().is_some());
        assert!(clock.pause().is_none());
        assert!(!clock.is_running());
    }

    #[test]
    fn three_one_second_runs_equal_three_seconds() {
        let (time, mut clock) = manual_clock();
        for _ in 0..3 {
            clock.start();
            time.advance_secs(1);
            clock.pause();
            time.advance_secs(5); // paused time never counts
        }
        assert_eq!(clock.elapsed_secs(), 3);
    }

    #[test]
    fn partial_seconds_are_not_lost_across_pauses() {
        let (time, mut clock) = manual_clock();
        for _ in 0..4 {
            clock.start();
            time.advance_ms(500);
            clock.pause();
        }
        assert_eq!(clock.elapsed_ms(), 2000);
        assert_eq!(clock.elapsed_secs(), 2);
    }

    #[test]
    fn elapsed_rounds_down() {
        let (time, mut clock) = manual_clock();
        clock.start();
        time.advance_ms(9_999);
        assert_eq!(clock.elapsed_secs(), 9);
    }

    #[test]
    fn tick_reports_only_on_whole_second_change() {
        let (time, mut clock) = manual_clock();
        assert!(clock.tick().is_none());
        clock.start();
        time.advance_ms(400);
        assert!(clock.tick().is_none());
        time.advance_ms(700);
        match clock.tick() {
            Some(Event::ClockTicked { elapsed_secs, .. }) => assert_eq!(elapsed_secs, 1),
            other => panic!("expected tick, got {other:?}"),
        }
        assert!(clock.tick().is_none());
    }

    #[test]
    fn toggle_flips_running() {
        let (_time, mut clock) = manual_clock();
        assert!(matches!(clock.toggle(), Some(Event::ClockStarted { .. })));
        assert!(matches!(clock.toggle(), Some(Event::ClockPaused { .. })));
    }

    #[test]
    fn progress_percent_uses_estimate_or_default() {
        let (time, mut clock) = manual_clock();
        clock.start();
        time.advance_secs(5 * 60);
        assert_eq!(clock.progress_percent(Some(10)), 50);
        assert_eq!(clock.progress_percent(None), 20);
        time.advance_secs(60 * 60);
        assert_eq!(clock.progress_percent(Some(10)), 100);
    }

    #[test]
    fn display_format() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(6_000), "100:00");
    }

    #[test]
    fn monotonic_time_never_goes_backwards() {
        let time = MonotonicTime::new();
        let a = time.now_ms();
        let b = time.now_ms();
        assert!(b >= a);
    }
}
