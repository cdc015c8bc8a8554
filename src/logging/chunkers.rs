use super::chunk::Chunker;
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::time::Duration;

/// Chunk summaries at fixed time intervals (for [`ChunkLogger`][super::ChunkLogger]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByTime {
    // Coarse clock; read on every group
    pub chunk_duration: CDuration,
    coarse_chunk_start: CInstant,
}

impl ByTime {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunk_duration: CDuration::new(chunk_duration.as_secs(), chunk_duration.subsec_nanos()),
            coarse_chunk_start: CInstant::now(),
        }
    }
}

impl Default for ByTime {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Chunker for ByTime {
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        self.coarse_chunk_start.elapsed() > self.chunk_duration
    }
    fn note_flush(&mut self) {
        self.coarse_chunk_start = CInstant::now();
    }
}

/// Chunk summaries every `interval` log groups.
///
/// Useful when each group corresponds to one iteration of an algorithm,
/// e.g. one FQI iteration or one evaluated episode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByGroupCount {
    pub interval: u64,
    groups_in_chunk: u64,
}

impl ByGroupCount {
    pub const fn new(interval: u64) -> Self {
        Self {
            interval,
            groups_in_chunk: 0,
        }
    }
}

impl Default for ByGroupCount {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Chunker for ByGroupCount {
    #[inline]
    fn flush_group_end(&mut self) -> bool {
        self.groups_in_chunk += 1;
        self.groups_in_chunk >= self.interval
    }
    fn note_flush(&mut self) {
        self.groups_in_chunk = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_group_count_flushes_on_interval() {
        let mut chunker = ByGroupCount::new(3);
        assert!(!chunker.flush_group_end());
        assert!(!chunker.flush_group_end());
        assert!(chunker.flush_group_end());
        chunker.note_flush();
        assert!(!chunker.flush_group_end());
    }

    #[test]
    fn by_time_does_not_flush_immediately() {
        let mut chunker = ByTime::new(Duration::from_secs(60));
        assert!(!chunker.flush_group_start());
    }
}
