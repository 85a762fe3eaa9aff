//! Stage timing for long-running generator passes.

use std::time::{Duration, Instant};

/// Measures time since construction and formats it for stage logs.
#[derive(Debug, Clone, Copy)]
pub struct Profiler {
    start: Instant,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    /// Starts timing now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the profiler was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns `"<message> <seconds> s"` with the elapsed time to two decimals.
    pub fn timed(&self, message: &str) -> String {
        format_timed(message, self.elapsed())
    }
}

fn format_timed(message: &str, elapsed: Duration) -> String {
    format!("{message} {:.2} s", elapsed.as_secs_f64())
}
