use std::time::Duration;

pub use crate::counter::{HitCounter, Status};
pub use crate::error::{Error, Result};
pub use crate::listener::{listener, with_counter, ListenerOptions};

mod counter;
mod cutoff;
mod error;
mod listener;
mod window;

/// Epoch milliseconds, the instant type used across the crate.
pub type Millis = i64;

#[derive(Clone)]
pub struct Config {
    /// The widest query window supported, and the retention horizon.
    pub max_timespan: Duration,
    /// How far past the horizon the oldest bucket may drift before an append
    /// pays for a trim pass.
    pub clean_frequency: Duration,
    /// Truncation unit for merging hits into one bucket. `None` keeps raw
    /// per-event millisecond instants.
    pub granularity: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_timespan: Duration::from_secs(300),
            clean_frequency: Duration::from_secs(60),
            granularity: Some(Duration::from_secs(1)),
        }
    }
}
