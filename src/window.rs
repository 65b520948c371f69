use std::collections::HashMap;
use std::time::Duration;

use crate::cutoff::{at_or_after, Timestamped};
use crate::Millis;

type TagCounts = HashMap<String, u64, ahash::RandomState>;

/// All hits recorded within one truncation unit, merged into a single record.
#[derive(Debug, Clone)]
pub(crate) struct Bucket {
    instant: Millis,
    total: u64,
    tags: TagCounts,
}

impl Bucket {
    fn new(instant: Millis, tag: Option<&str>) -> Self {
        let mut tags = TagCounts::default();
        if let Some(tag) = tag {
            tags.insert(tag.to_owned(), 1);
        }
        Bucket {
            instant,
            total: 1,
            tags,
        }
    }

    #[inline]
    fn merge(&mut self, tag: Option<&str>) {
        self.total += 1;
        if let Some(tag) = tag {
            *self.tags.entry(tag.to_owned()).or_insert(0) += 1;
        }
    }

    #[inline]
    fn count(&self, tag: Option<&str>) -> u64 {
        match tag {
            Some(tag) => self.tags.get(tag).copied().unwrap_or(0),
            None => self.total,
        }
    }
}

impl Timestamped for Bucket {
    #[inline]
    fn instant(&self) -> Millis {
        self.instant
    }
}

/// The ordered bucket sequence backing a counter.
///
/// Buckets stay ascending by instant with at most one bucket per truncation
/// unit, so appending is push-or-merge and never sorts. Expired buckets are
/// not dropped eagerly; `append` pays for a trim pass only once the oldest
/// bucket is a full clean interval past the retention horizon.
pub(crate) struct WindowStore {
    buckets: Vec<Bucket>,
    granularity: Option<Duration>,
}

impl WindowStore {
    pub fn new(granularity: Option<Duration>) -> Self {
        WindowStore {
            buckets: Vec::new(),
            granularity,
        }
    }

    /// Records one hit at `now`, then trims once staleness exceeds
    /// `max_timespan + clean_frequency`. Returns how many buckets the trim
    /// discarded, usually 0.
    pub fn append(
        &mut self,
        now: Millis,
        tag: Option<&str>,
        max_timespan: Duration,
        clean_frequency: Duration,
    ) -> usize {
        let instant = self.truncate(now);
        match self.buckets.last_mut() {
            // `<=` also absorbs a wall clock stepping backwards, keeping the
            // sequence ascending.
            Some(last) if instant <= last.instant => last.merge(tag),
            _ => self.buckets.push(Bucket::new(instant, tag)),
        }

        let threshold = now - span_millis(max_timespan) - span_millis(clean_frequency);
        match self.oldest() {
            Some(oldest) if oldest < threshold => self.trim(now - span_millis(max_timespan)),
            _ => 0,
        }
    }

    /// Discards every bucket older than `cutoff`.
    fn trim(&mut self, cutoff: Millis) -> usize {
        let keep = at_or_after(&self.buckets, Some(cutoff)).len();
        let expired = self.buckets.len() - keep;
        self.buckets.drain(..expired);
        expired
    }

    /// Number of hits at or after `cutoff`, optionally narrowed to one tag.
    /// A tag never seen counts as zero.
    pub fn count_since(&self, cutoff: Option<Millis>, tag: Option<&str>) -> u64 {
        at_or_after(&self.buckets, cutoff)
            .iter()
            .map(|bucket| bucket.count(tag))
            .sum()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Total hits currently retained, across all buckets.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.buckets.iter().map(|bucket| bucket.total).sum()
    }

    #[inline]
    pub fn oldest(&self) -> Option<Millis> {
        self.buckets.first().map(|bucket| bucket.instant)
    }

    #[inline]
    pub fn newest(&self) -> Option<Millis> {
        self.buckets.last().map(|bucket| bucket.instant)
    }

    #[inline]
    fn truncate(&self, now: Millis) -> Millis {
        match self.granularity {
            Some(unit) if unit.as_millis() > 0 => {
                let unit = unit.as_millis() as Millis;
                now - now.rem_euclid(unit)
            }
            _ => now,
        }
    }
}

#[inline]
fn span_millis(span: Duration) -> Millis {
    span.as_millis() as Millis
}
