//! Logging helpers on top of `tracing`
//!
//! Events carry an `operation` (or `scope`) field and a human-readable
//! `elapsed` field, so runner timings can be filtered like any other event.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::Level;

macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == Level::INFO {
            tracing::info!($($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

/// Await `future`, logging its duration at debug level
///
/// ```rust,ignore
/// let outcome = timed("run_batch", runner.run_items(items, target, options, &ctx)).await;
/// ```
pub async fn timed<F: Future>(operation: &str, future: F) -> F::Output {
    timed_at(Level::DEBUG, operation, future).await
}

/// Await `future`, logging its duration at `level`
pub async fn timed_at<F: Future>(level: Level, operation: &str, future: F) -> F::Output {
    let started = Instant::now();
    let output = future.await;
    event_at!(
        level,
        operation,
        elapsed = %format_duration(started.elapsed()),
        "Operation finished"
    );
    output
}

/// Logs on creation and again, with the elapsed time, when dropped
///
/// ```rust
/// use tooling::logging::LogGuard;
///
/// let _guard = LogGuard::new("sweep_expired");
/// ```
pub struct LogGuard {
    scope: &'static str,
    level: Level,
    started: Instant,
}

impl LogGuard {
    pub fn new(scope: &'static str) -> Self {
        Self::at(Level::DEBUG, scope)
    }

    pub fn at(level: Level, scope: &'static str) -> Self {
        event_at!(level, scope, "Entered");
        Self {
            scope,
            level,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        event_at!(
            self.level,
            scope = self.scope,
            elapsed = %format_duration(self.elapsed()),
            "Left"
        );
    }
}

/// Compact duration for log fields
///
/// ```rust
/// use tooling::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_micros(250)), "250μs");
/// assert_eq!(format_duration(Duration::from_millis(40)), "40ms");
/// assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
/// assert_eq!(format_duration(Duration::from_secs(3 * 3600)), "3h0m");
/// ```
pub fn format_duration(duration: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;

    let secs = duration.as_secs();
    match secs {
        0 if duration.as_millis() == 0 => format!("{}μs", duration.as_micros()),
        0 => format!("{}ms", duration.as_millis()),
        1..=59 => format!("{:.2}s", duration.as_secs_f64()),
        s if s < HOUR => format!("{}m{}s", s / MINUTE, s % MINUTE),
        s => format!("{}h{}m", s / HOUR, (s % HOUR) / MINUTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_passes_output_through() {
        assert_eq!(timed("answer", async { 42 }).await, 42);
        assert_eq!(timed_at(Level::INFO, "greeting", async { "hi" }).await, "hi");
    }

    #[test]
    fn test_guard_measures_scope() {
        let guard = LogGuard::at(Level::WARN, "scope");
        std::thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(Duration::ZERO), "0μs");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h1m");
    }
}
