//! Command-line summary logger
use super::chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{ByTime, Id, LogError, LogValue, StatsLogger};
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays grouped summaries to standard output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DisplayLogger<C: Chunker = ByTime>(ChunkLogger<C, DisplayBackend>);

impl<C: Chunker> DisplayLogger<C> {
    #[inline]
    pub fn new(chunker: C) -> Self {
        Self(ChunkLogger::new(chunker, DisplayBackend))
    }
}

impl<C: Chunker> StatsLogger for DisplayLogger<C> {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.0.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush()
    }
}

/// Logging backend that displays summaries to standard output.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayBackend;

impl SummaryWriter for DisplayBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        println!();
        for (id, summary) in summaries {
            println!(
                "{:<28} {}",
                Paint::fixed(35, id),
                DisplaySummary {
                    summary,
                    elapsed: &elapsed
                }
            );
        }
    }
}

#[derive(Debug)]
struct DisplaySummary<'a> {
    summary: &'a ChunkSummary,
    elapsed: &'a Duration,
}

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary {
            ChunkSummary::Nothing => Ok(()),
            ChunkSummary::Counter {
                increment,
                initial_value,
            } => {
                write!(
                    f,
                    "{}  (+{})",
                    initial_value + increment,
                    Paint::fixed(253, increment)
                )?;
                if *increment > 5 {
                    // Only meaningful with several increments per chunk
                    let rate = *increment as f64 / self.elapsed.as_secs_f64();
                    write!(f, "  {}", Paint::fixed(111, format!("{:.2}/s", rate)))?;
                }
                Ok(())
            }
            ChunkSummary::Duration { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.4?}", Duration::from_secs_f64(mean))?;
                    if let (true, Some(stddev)) = (stats.count() > 1, stats.stddev()) {
                        let stddev = Duration::from_secs_f64(stddev);
                        write!(f, " {}", Paint::fixed(8, format!("(σ {:.4?})", stddev)))?;
                    }
                    let fraction = mean * stats.count() as f64 / self.elapsed.as_secs_f64();
                    write!(
                        f,
                        " {}",
                        Paint::fixed(221, format!("{:.2}%", fraction * 100.0))
                    )?;
                }
                Ok(())
            }
            ChunkSummary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.3}", mean)?;
                    if let (true, Some(stddev)) = (stats.count() > 1, stats.stddev()) {
                        write!(f, " {}", Paint::fixed(8, format!("(σ {:.3})", stddev)))?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::ByGroupCount;

    #[test]
    fn scalar_display() {
        let summary = ChunkSummary::from(LogValue::Scalar(1.5));
        let text = DisplaySummary {
            summary: &summary,
            elapsed: &Duration::from_secs(1),
        }
        .to_string();
        assert!(text.contains("1.500"));
    }

    #[test]
    fn log_and_flush() {
        Paint::disable();
        let mut logger = DisplayLogger::new(ByGroupCount::new(2));
        logger.log_scalar("reward", 1.0);
        logger.log_counter_increment("episodes", 1);
        logger.log_duration("time", Duration::from_millis(3));
        logger.flush();
    }
}
