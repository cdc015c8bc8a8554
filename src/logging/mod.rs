//! Logging statistics from collection, evaluation and fitting runs.
mod chunk;
mod chunkers;
mod display;

pub use chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
pub use chunkers::{ByGroupCount, ByTime};
pub use display::{DisplayBackend, DisplayLogger};

use std::borrow::Cow;
use std::fmt;
use std::iter::FromIterator;
use std::time::Duration;
use thiserror::Error;

/// Hierarchical identifier of a logged value.
///
/// Displayed as the scope names joined by `/`.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    path: Vec<Cow<'static, str>>,
}

impl Id {
    /// Prepend a scope name to the identifier.
    #[must_use]
    pub fn with_prefix(mut self, scope: Cow<'static, str>) -> Self {
        self.path.insert(0, scope);
        self
    }

    /// Iterate over the path components from the outermost scope.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.path.iter().map(AsRef::as_ref)
    }
}

impl From<&'static str> for Id {
    fn from(name: &'static str) -> Self {
        Self {
            path: vec![Cow::Borrowed(name)],
        }
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Self {
            path: vec![Cow::Owned(name)],
        }
    }
}

impl FromIterator<&'static str> for Id {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        Self {
            path: iter.into_iter().map(Cow::Borrowed).collect(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for component in &self.path {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            f.write_str(component)?;
        }
        Ok(())
    }
}

/// A value that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    /// Nothing. Still marks the id as present in the current chunk.
    Nothing,
    /// Increment an integer counter.
    CounterIncrement(u64),
    /// A duration. Summarized by its mean and standard deviation.
    Duration(Duration),
    /// A scalar value. Summarized by its mean and standard deviation.
    Scalar(f64),
}

impl LogValue {
    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Duration(_) => "Duration",
            Self::Scalar(_) => "Scalar",
        }
    }
}

impl From<f64> for LogValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Duration> for LogValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// Error logging a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("incompatible value type; previously {prev} now {now}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
}

/// Log time series statistics.
///
/// Logs are organized into groups. Values logged within the same group are treated as
/// simultaneous; a chunking logger only considers flushing at group boundaries.
pub trait StatsLogger: Send {
    /// Start a new group of logs.
    fn group_start(&mut self);

    /// Log a value within the current group.
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError>;

    /// End the current group.
    fn group_end(&mut self);

    /// Flush any aggregated summaries to the backend.
    fn flush(&mut self);

    /// Log a value in a group of its own.
    #[inline]
    fn log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(id, value);
        self.group_end();
        result
    }

    /// Log a scalar value.
    ///
    /// Values that are incompatible with previous entries for the same name are dropped.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        let _ = self.log(name.into(), LogValue::Scalar(value));
    }

    /// Log an increment of a counter.
    #[inline]
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) {
        let _ = self.log(name.into(), LogValue::CounterIncrement(increment));
    }

    /// Log a duration.
    #[inline]
    fn log_duration(&mut self, name: &'static str, duration: Duration) {
        let _ = self.log(name.into(), LogValue::Duration(duration));
    }

    /// Wrap this logger so that all ids are prefixed by `scope`.
    #[inline]
    fn with_scope(self, scope: &'static str) -> ScopedLogger<Self>
    where
        Self: Sized,
    {
        ScopedLogger {
            inner: self,
            scope,
        }
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn group_start(&mut self) {}
    #[inline]
    fn group_log(&mut self, _: Id, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }
    #[inline]
    fn group_end(&mut self) {}
    #[inline]
    fn flush(&mut self) {}
}

impl<L: StatsLogger + ?Sized> StatsLogger for &'_ mut L {
    #[inline]
    fn group_start(&mut self) {
        L::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        L::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for Box<L> {
    #[inline]
    fn group_start(&mut self) {
        L::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        L::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

/// Logger that prefixes every id with a scope name.
#[derive(Debug)]
pub struct ScopedLogger<L> {
    inner: L,
    scope: &'static str,
}

impl<L: StatsLogger> StatsLogger for ScopedLogger<L> {
    #[inline]
    fn group_start(&mut self) {
        self.inner.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.inner
            .group_log(id.with_prefix(Cow::Borrowed(self.scope)), value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.inner.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.inner.flush()
    }
}
