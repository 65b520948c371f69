use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slog::{debug, info, o, Discard, Logger};

use crate::error::{Error, Result};
use crate::window::WindowStore;
use crate::{Config, Millis};

/// A point-in-time view of a counter, for status endpoints and logs.
#[derive(Serialize, Deserialize, Debug)]
pub struct Status {
    pub hits: u64,
    pub buckets: usize,
    pub oldest: Option<Millis>,
    pub newest: Option<Millis>,
}

impl Status {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits == 0
    }
}

struct Shared {
    store: WindowStore,
    max_timespan: Duration,
    clean_frequency: Duration,
}

/// A handle to a shared hit counter.
///
/// Clones are cheap and all observe the same state. A single lock serializes
/// recording, querying, clearing and reconfiguration against each other;
/// every operation is bounded and touches no I/O, so hold times stay short.
#[derive(Clone)]
pub struct HitCounter {
    shared: Arc<RwLock<Shared>>,
    logger: Logger,
}

impl Default for HitCounter {
    fn default() -> Self {
        Self::new(Config::default(), Logger::root(Discard, o!()))
    }
}

impl HitCounter {
    /// Creates an empty counter with the given tolerances and logger.
    pub fn new(cfg: Config, logger: Logger) -> Self {
        HitCounter {
            shared: Arc::new(RwLock::new(Shared {
                store: WindowStore::new(cfg.granularity),
                max_timespan: cfg.max_timespan,
                clean_frequency: cfg.clean_frequency,
            })),
            logger,
        }
    }

    /// Records one hit at the current instant, optionally tagged.
    ///
    /// Never fails. Expired buckets are trimmed here once the oldest one is a
    /// full clean interval past the retention horizon.
    pub fn record(&self, tag: Option<&str>) {
        let now = now_millis();
        let mut shared = self.shared.write().unwrap();
        let (max, clean) = (shared.max_timespan, shared.clean_frequency);
        let expired = shared.store.append(now, tag, max, clean);
        if expired > 0 {
            debug!(self.logger, "trimmed expired buckets";
                "expired" => expired, "retained" => shared.store.len());
        }
    }

    /// Counts hits recorded within the last `timespan_secs` seconds,
    /// optionally narrowed to one tag. No side effects.
    ///
    /// Zero is a lawful timespan and reports hits from the last 0 seconds.
    pub fn query(&self, timespan_secs: f64, tag: Option<&str>) -> Result<u64> {
        if !timespan_secs.is_finite() {
            return Err(Error::InvalidTimespan(timespan_secs.to_string()));
        }
        if timespan_secs < 0.0 {
            return Err(Error::NegativeTimespan(timespan_secs));
        }
        let shared = self.shared.read().unwrap();
        let max = shared.max_timespan.as_secs_f64();
        if timespan_secs > max {
            return Err(Error::TimespanTooLarge {
                requested: timespan_secs,
                max,
            });
        }
        let cutoff = now_millis() - (timespan_secs * 1000.0).round() as Millis;
        Ok(shared.store.count_since(Some(cutoff), tag))
    }

    /// Query entry point for raw request input, as handed over by an HTTP
    /// collaborator. Owns the missing and unparsable rejections; the value is
    /// in seconds.
    pub fn query_param(&self, timespan: Option<&str>, tag: Option<&str>) -> Result<u64> {
        let raw = timespan
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingTimespan)?;
        let secs: f64 = raw
            .parse()
            .map_err(|_| Error::InvalidTimespan(raw.to_owned()))?;
        self.query(secs, tag)
    }

    /// Drops every recorded hit. Safe to call at any time; calling it twice
    /// is the same as calling it once.
    pub fn clear(&self) {
        let mut shared = self.shared.write().unwrap();
        shared.store.clear();
        info!(self.logger, "cleared all recorded hits");
    }

    /// Updates the tolerances used by future calls. Retained buckets are not
    /// re-trimmed; the next `record` applies the new horizon.
    pub fn configure(&self, max_timespan: Option<Duration>, clean_frequency: Option<Duration>) {
        let mut shared = self.shared.write().unwrap();
        if let Some(max_timespan) = max_timespan {
            shared.max_timespan = max_timespan;
        }
        if let Some(clean_frequency) = clean_frequency {
            shared.clean_frequency = clean_frequency;
        }
    }

    /// Snapshot of the counter's retained state.
    pub fn status(&self) -> Status {
        let shared = self.shared.read().unwrap();
        Status {
            hits: shared.store.hits(),
            buckets: shared.store.len(),
            oldest: shared.store.oldest(),
            newest: shared.store.newest(),
        }
    }
}

#[inline]
pub(crate) fn now_millis() -> Millis {
    chrono::Local::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_beyond_the_maximum_timespan_are_rejected() {
        let counter = HitCounter::default();
        match counter.query(301.0, None) {
            Err(Error::TimespanTooLarge { requested, max }) => {
                assert_eq!(requested, 301.0);
                assert_eq!(max, 300.0);
            }
            other => panic!("expected TimespanTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn raw_input_rejections_cover_missing_invalid_and_negative() {
        let counter = HitCounter::default();
        assert_eq!(counter.query_param(None, None), Err(Error::MissingTimespan));
        assert_eq!(counter.query_param(Some(""), None), Err(Error::MissingTimespan));
        assert_eq!(
            counter.query_param(Some("string"), None),
            Err(Error::InvalidTimespan("string".to_owned()))
        );
        assert_eq!(
            counter.query_param(Some("-1"), None),
            Err(Error::NegativeTimespan(-1.0))
        );
        assert!(counter
            .query_param(Some("301"), None)
            .unwrap_err()
            .is_out_of_range());
    }

    #[test]
    fn a_zero_timespan_is_valid() {
        let counter = HitCounter::default();
        assert_eq!(counter.query_param(Some("0"), None), Ok(0));
        counter.record(None);
        assert!(counter.query_param(Some("0"), None).is_ok());
    }

    #[test]
    fn non_finite_timespans_are_invalid() {
        let counter = HitCounter::default();
        assert!(matches!(
            counter.query(f64::NAN, None),
            Err(Error::InvalidTimespan(_))
        ));
        assert!(matches!(
            counter.query(f64::INFINITY, None),
            Err(Error::InvalidTimespan(_))
        ));
    }

    #[test]
    fn tags_are_isolated_but_count_toward_the_total() {
        let counter = HitCounter::default();
        for _ in 0..4 {
            counter.record(Some("v1"));
        }
        for _ in 0..6 {
            counter.record(Some("v2"));
        }
        assert_eq!(counter.query(10.0, Some("v1")), Ok(4));
        assert_eq!(counter.query(10.0, Some("v2")), Ok(6));
        assert_eq!(counter.query(10.0, Some("v3")), Ok(0));
        assert_eq!(counter.query(10.0, None), Ok(10));
    }

    #[test]
    fn clones_share_one_set_of_hits() {
        let counter = HitCounter::default();
        let other = counter.clone();
        counter.record(None);
        other.record(None);
        assert_eq!(counter.query(10.0, None), Ok(2));
    }

    #[test]
    fn clear_is_idempotent() {
        let counter = HitCounter::default();
        counter.record(None);
        counter.record(Some("v1"));
        counter.clear();
        assert_eq!(counter.query(10.0, None), Ok(0));
        counter.clear();
        assert_eq!(counter.query(10.0, None), Ok(0));
        assert!(counter.status().is_empty());
    }

    #[test]
    fn configure_widens_the_supported_window() {
        let counter = HitCounter::default();
        assert!(counter.query(452.0, None).is_err());
        counter.configure(Some(Duration::from_secs(500)), None);
        assert_eq!(counter.query(452.0, None), Ok(0));
    }

    #[test]
    fn status_reflects_retained_buckets() {
        let counter = HitCounter::default();
        assert!(counter.status().is_empty());
        counter.record(Some("v1"));
        let status = counter.status();
        assert_eq!(status.hits, 1);
        assert_eq!(status.buckets, 1);
        assert!(status.oldest.is_some());
        assert_eq!(status.oldest, status.newest);
    }
}
