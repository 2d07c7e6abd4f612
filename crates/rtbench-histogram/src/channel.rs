//! Latency channels: one per CPU core plus the `system` aggregate.

use crate::histogram::{ReducedStats, SampleHistogram};
use crate::parse::{HistogramLine, ParseError};
use rtbench_common::ChannelId;
use serde::{Deserialize, Serialize};

/// One named latency stream and its histogram.
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    description: String,
    priority: u32,
    histogram: SampleHistogram,
}

impl Channel {
    pub fn new(id: ChannelId, description: impl Into<String>, priority: u32) -> Self {
        Self {
            id,
            description: description.into(),
            priority,
            histogram: SampleHistogram::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn histogram(&self) -> &SampleHistogram {
        &self.histogram
    }

    pub fn report(&self) -> ChannelReport {
        ChannelReport {
            id: self.id,
            kind: self.id.kind().to_string(),
            description: self.description.clone(),
            priority: self.priority,
            stats: self.histogram.reduce(),
            buckets: self.histogram.buckets().collect(),
        }
    }
}

/// Reduced view of a channel, ready for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub id: ChannelId,
    pub kind: String,
    pub description: String,
    pub priority: u32,
    pub stats: ReducedStats,
    pub buckets: Vec<(usize, u64)>,
}

/// All channels of one sampler run.
///
/// Every count written to a core channel is written to `system` in the
/// same call, so `system[i] == sum(core[i])` holds between calls.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    system: Channel,
    cores: Vec<Channel>,
}

impl ChannelSet {
    /// Channels for `num_cores` measurement threads. The `system` channel
    /// is described as `(<n> cores) <description>`.
    pub fn new(num_cores: usize, description: &str, priority: u32) -> Self {
        Self {
            system: Channel::new(
                ChannelId::System,
                format!("({} cores) {}", num_cores, description),
                priority,
            ),
            cores: (0..num_cores)
                .map(|n| Channel::new(ChannelId::Core(n), description, priority))
                .collect(),
        }
    }

    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    pub fn system(&self) -> &Channel {
        &self.system
    }

    pub fn core(&self, n: usize) -> Option<&Channel> {
        self.cores.get(n)
    }

    /// System first, then cores in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        std::iter::once(&self.system).chain(self.cores.iter())
    }

    /// Record one histogram row: column `i` goes to core `i` and to `system`.
    ///
    /// A row with more columns than tracked cores is rejected before
    /// anything is written.
    pub fn record_bucket_line(&mut self, line: &HistogramLine) -> Result<(), ParseError> {
        if line.counts.len() > self.cores.len() {
            return Err(ParseError::TooManyColumns {
                expected: self.cores.len(),
                got: line.counts.len(),
            });
        }
        for (core, &count) in self.cores.iter_mut().zip(&line.counts) {
            core.histogram.add_bucket(line.index, count);
            self.system.histogram.add_bucket(line.index, count);
        }
        Ok(())
    }

    pub fn reduce_all(&self) -> Vec<ChannelReport> {
        self.channels().map(Channel::report).collect()
    }
}
