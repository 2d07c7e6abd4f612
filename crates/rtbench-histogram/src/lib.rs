//! # rtbench histogram
//!
//! Reduction of latency samples into summary statistics.
//!
//! A latency sampler emits one histogram line per bucket index with a
//! count per CPU core. [`parse_histogram_line`] turns such a line into a
//! [`HistogramLine`], [`ChannelSet::record_bucket_line`] feeds it into the
//! per-core channels and the `system` aggregate together, and
//! [`ChannelSet::reduce_all`] produces one [`ChannelReport`] per channel.
//!
//! ```
//! use rtbench_histogram::{parse_histogram_line, ChannelSet};
//!
//! let mut set = ChannelSet::new(2, "Test CPU", 95);
//! for line in ["# Histogram", "000010 2 0", "000020 0 1", "000030 1 0"] {
//!     if let Some(parsed) = parse_histogram_line(line).unwrap() {
//!         set.record_bucket_line(&parsed).unwrap();
//!     }
//! }
//!
//! let reports = set.reduce_all();
//! let system = &reports[0];
//! assert_eq!(system.stats.samples, 4);
//! assert_eq!(system.stats.median, 15.0);
//! ```

pub mod channel;
pub mod histogram;
pub mod parse;

pub use channel::{Channel, ChannelReport, ChannelSet};
pub use histogram::{ReducedStats, SampleHistogram, NO_SAMPLES_MIN};
pub use parse::{parse_histogram_line, HistogramLine, ParseError, MAX_BUCKET_INDEX};
