//! Progress arithmetic for thread publishing
//!
//! Estimates here are for display only and never affect pacing.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ThreadConfig;

/// Characters of a body shown in progress output
pub const PREVIEW_CHARS: usize = 100;

/// Whole-thread estimate made before the first post
///
/// `(total - 1) * delay + total * api_time_estimate`
pub fn estimate_total(total: usize, config: &ThreadConfig) -> Duration {
    if total == 0 {
        return Duration::ZERO;
    }
    let delay = config.delay_for(total);
    delay * (total as u32 - 1) + config.api_time_estimate() * total as u32
}

/// First `PREVIEW_CHARS` characters, with "..." appended when cut
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Render a duration as "< 1s", "42s" or "3m 5s" (seconds rounded up)
pub fn format_time(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return "< 1s".to_string();
    }

    let seconds = millis.div_ceil(1000);
    if seconds < 60 {
        return format!("{}s", seconds);
    }

    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// Tracks elapsed time and completed posts for one job
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
    completed: usize,
}

impl ProgressTracker {
    pub fn start(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            completed: 0,
        }
    }

    pub fn record_completed(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `elapsed / completed * (total - completed)`; unknown before the first post lands
    pub fn remaining(&self) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let per_post = self.elapsed() / self.completed as u32;
        Some(per_post * (self.total - self.completed) as u32)
    }
}

/// Whole-number percentage for the post at 1-based `index` of `total`
pub fn percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((index.min(total) * 100) as f64 / total as f64).round() as u8
}
