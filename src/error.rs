use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Rejections raised by the query path; recording and clearing never fail.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    #[error("the timespan is required")]
    MissingTimespan,
    #[error("the timespan `{0}` is not a number")]
    InvalidTimespan(String),
    #[error("the timespan is beyond the supported limit: {requested}s > {max}s")]
    TimespanTooLarge { requested: f64, max: f64 },
    #[error("the timespan needs to be greater than or equal to 0, got {0}s")]
    NegativeTimespan(f64),
}

impl Error {
    /// True for the range rejections, as opposed to missing or unparsable input.
    #[inline]
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Error::TimespanTooLarge { .. } | Error::NegativeTimespan(_)
        )
    }
}
