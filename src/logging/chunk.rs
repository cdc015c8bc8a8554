use super::{Id, LogError, LogValue, StatsLogger};
use crate::utils::stats::OnlineMeanVariance;
use std::collections::{btree_map::Entry, BTreeMap};
use std::ops::Drop;
use std::time::{Duration, Instant};

/// Control the aggregation of logs into summaries and summaries into chunks.
pub trait Chunker: Send {
    /// Start a new log group and decided whether to flush.
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        false
    }
    /// End the current group and decide whether to flush.
    #[inline]
    fn flush_group_end(&mut self) -> bool {
        false
    }
    /// Indicate that the current chunk has been flushed
    fn note_flush(&mut self);
}

/// Write out summaries to a backend.
pub trait SummaryWriter: Send {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>;
}

/// Logs time series statistics by breaking the time series into chunks and summarizing each chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLogger<C: Chunker, W: SummaryWriter> {
    chunker: C,
    writer: W,

    // Sorted so that related ids are written next to each other
    summaries: BTreeMap<Id, Node>,

    chunk_start: Instant,
}

impl<C: Chunker, W: SummaryWriter> ChunkLogger<C, W> {
    pub fn new(chunker: C, writer: W) -> Self {
        Self {
            chunker,
            writer,
            summaries: BTreeMap::new(),
            chunk_start: Instant::now(),
        }
    }

    /// The summary of the current chunk for an id, if any value has been logged to it.
    pub fn summary(&self, id: &Id) -> Option<&ChunkSummary> {
        self.summaries
            .get(id)
            .filter(|node| node.dirty)
            .map(|node| &node.summary)
    }
}

impl<C: Chunker + Default, W: SummaryWriter + Default> Default for ChunkLogger<C, W> {
    fn default() -> Self {
        Self::new(C::default(), W::default())
    }
}

impl<C: Chunker, W: SummaryWriter> StatsLogger for ChunkLogger<C, W> {
    fn group_start(&mut self) {
        if self.chunker.flush_group_start() {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(id) {
            Entry::Vacant(e) => {
                e.insert(Node::new(value.into()));
            }
            Entry::Occupied(e) => e.into_mut().push(value)?,
        }
        Ok(())
    }

    fn group_end(&mut self) {
        if self.chunker.flush_group_end() {
            self.flush()
        }
    }

    fn flush(&mut self) {
        if self.summaries.values().any(|node| node.dirty) {
            self.writer.write_summaries(
                self.summaries
                    .iter()
                    .filter(|(_, node)| node.dirty)
                    .map(|(id, node)| (id, &node.summary)),
                self.chunk_start.elapsed(),
            );
        }

        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.chunk_start = Instant::now();
        self.chunker.note_flush();
    }
}

/// Flush when dropped
impl<C: Chunker, W: SummaryWriter> Drop for ChunkLogger<C, W> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: ChunkSummary,
    /// Whether the summary has been updated in this chunk
    dirty: bool,
}

impl Node {
    const fn new(summary: ChunkSummary) -> Self {
        Self {
            summary,
            dirty: true,
        }
    }

    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        self.summary.push(value)?;
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.summary.reset()
    }
}

/// Summary of the values logged to one id within a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSummary {
    Nothing,
    Counter {
        increment: u64,
        initial_value: u64,
    },
    Duration {
        stats: OnlineMeanVariance<f64>,
    },
    Scalar {
        stats: OnlineMeanVariance<f64>,
    },
}

impl From<LogValue> for ChunkSummary {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::Nothing => Self::Nothing,
            LogValue::CounterIncrement(i) => Self::Counter {
                increment: i,
                initial_value: 0,
            },
            LogValue::Duration(d) => Self::Duration {
                stats: std::iter::once(d.as_secs_f64()).collect(),
            },
            LogValue::Scalar(v) => Self::Scalar {
                stats: std::iter::once(v).collect(),
            },
        }
    }
}

impl ChunkSummary {
    /// Add a value to the summary.
    ///
    /// The value is not inserted if it is a different variant than the one that created the
    /// summary.
    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Nothing, LogValue::Nothing) => {}
            (Self::Counter { increment, .. }, LogValue::CounterIncrement(i)) => *increment += i,
            (Self::Duration { stats }, LogValue::Duration(d)) => stats.push(d.as_secs_f64()),
            (Self::Scalar { stats }, LogValue::Scalar(v)) => stats.push(v),
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.value_variant_name(),
                    now: value.variant_name(),
                })
            }
        }
        Ok(())
    }

    /// Reset for the start of the next chunk.
    fn reset(&mut self) {
        match self {
            Self::Nothing => {}
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0
            }
            Self::Duration { stats } | Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
        }
    }

    const fn value_variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Counter { .. } => "CounterIncrement",
            Self::Duration { .. } => "Duration",
            Self::Scalar { .. } => "Scalar",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every batch of summaries it is asked to write.
    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<Vec<(String, ChunkSummary)>>,
    }

    impl SummaryWriter for Recorder {
        fn write_summaries<'a, I>(&mut self, summaries: I, _: Duration)
        where
            I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
        {
            self.writes.push(
                summaries
                    .map(|(id, summary)| (id.to_string(), summary.clone()))
                    .collect(),
            );
        }
    }

    #[derive(Debug, Default)]
    struct Never;

    impl Chunker for Never {
        fn note_flush(&mut self) {}
    }

    #[test]
    fn scalar_summary_mean() {
        let mut logger = ChunkLogger::new(Never, Recorder::default());
        logger.log_scalar("x", 1.0);
        logger.log_scalar("x", 3.0);
        match logger.summary(&"x".into()) {
            Some(ChunkSummary::Scalar { stats }) => {
                assert_eq!(stats.count(), 2);
                assert_eq!(stats.mean(), Some(2.0));
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn incompatible_value_rejected() {
        let mut logger = ChunkLogger::new(Never, Recorder::default());
        logger.log("x".into(), LogValue::Scalar(1.0)).unwrap();
        assert_eq!(
            logger.log("x".into(), LogValue::CounterIncrement(1)),
            Err(LogError::IncompatibleValue {
                prev: "Scalar",
                now: "CounterIncrement"
            })
        );
    }

    #[test]
    fn counter_carries_over_flush() {
        let mut logger = ChunkLogger::new(Never, Recorder::default());
        logger.log_counter_increment("n", 2);
        logger.flush();
        logger.log_counter_increment("n", 3);
        assert_eq!(
            logger.summary(&"n".into()),
            Some(&ChunkSummary::Counter {
                increment: 3,
                initial_value: 2
            })
        );
    }

    #[test]
    fn flush_writes_only_dirty() {
        let mut logger = ChunkLogger::new(Never, Recorder::default());
        logger.log_scalar("a", 1.0);
        logger.flush();
        logger.log_scalar("b", 1.0);
        logger.flush();
        logger.flush();
        let names: Vec<Vec<&str>> = logger
            .writer
            .writes
            .iter()
            .map(|w| w.iter().map(|(name, _)| name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a"], vec!["b"]]);
    }
}
