//! warp middleware that records qualifying requests as hits.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use warp::filters::path::FullPath;
use warp::Filter;

use crate::HitCounter;

/// Decides which requests qualify as hits and how the shared counter is
/// tuned. The default tracks every request.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    /// Overrides the counter's widest supported query window.
    pub max_timespan: Option<Duration>,
    /// Overrides the counter's staleness tolerance.
    pub clean_frequency: Option<Duration>,
    /// Exact-match allow-list of request paths to count.
    pub paths: Option<Vec<String>>,
    /// Arbitrary predicate over the full request path.
    pub filter: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl ListenerOptions {
    /// Tracks only the given paths.
    pub fn for_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ListenerOptions {
            paths: Some(paths.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    fn qualifies(&self, path: &str) -> bool {
        if let Some(filter) = &self.filter {
            if !filter(path) {
                return false;
            }
        }
        match &self.paths {
            Some(paths) => paths.iter().any(|p| p == path),
            None => true,
        }
    }
}

/// Builds the middleware filter. Compose it ahead of the application's
/// routes; qualifying requests are recorded against the shared counter,
/// tagged with their path, and always passed through.
///
/// Any tolerances carried in `opts` are applied to the counter up front.
pub fn listener(
    counter: HitCounter,
    opts: ListenerOptions,
) -> impl Filter<Extract = (), Error = Infallible> + Clone {
    counter.configure(opts.max_timespan, opts.clean_frequency);
    warp::path::full()
        .map(move |path: FullPath| {
            let path = path.as_str();
            if opts.qualifies(path) {
                log::debug!("hit on {}", path);
                counter.record(Some(path));
            }
        })
        .untuple_one()
}

/// Injects a clone of the counter into downstream warp handlers.
pub fn with_counter(
    counter: HitCounter,
) -> impl Filter<Extract = (HitCounter,), Error = Infallible> + Clone {
    warp::any().map(move || counter.clone())
}
