use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic elapsed time, when the platform exposes one.
    fn elapsed_realtime(&self) -> Option<Duration>;
}

static PROCESS_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Wall clock plus a monotonic counter anchored at first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn elapsed_realtime(&self) -> Option<Duration> {
        Some(PROCESS_ANCHOR.get_or_init(Instant::now).elapsed())
    }
}
