//! Clock port — the only source of "now" reachable from application services.
//!
//! Exists so tests can inject a fixed or steppable clock instead of depending
//! on wall time, per the explicit-`Services`-over-singletons design noted for
//! this system: every collaborator, including time, is passed in rather than
//! reached for globally.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
