//! Parser for sampler histogram output.
//!
//! A cyclictest-style sampler run with `-h <buckets>` prints, on exit, one
//! line per bucket: the bucket index (latency in microseconds) followed by
//! one count per measurement thread. Comment lines start with `#`.
//!
//! ```text
//! # Histogram
//! 000000 000000 000000
//! 000001 000123 000098
//! # Total: 000000123 000000098
//! ```

use thiserror::Error;

/// Highest bucket index accepted from a sampler.
pub const MAX_BUCKET_INDEX: usize = 1_000_000;

/// One parsed histogram row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramLine {
    pub index: usize,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed histogram line '{line}': {reason}")]
    Malformed { line: String, reason: String },

    #[error("bucket index {index} exceeds the maximum of {max}", max = MAX_BUCKET_INDEX)]
    IndexOutOfRange { index: usize },

    #[error("histogram line has {got} count columns but only {expected} cores are tracked")]
    TooManyColumns { expected: usize, got: usize },
}

impl ParseError {
    fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse one line of sampler output.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_histogram_line(line: &str) -> Result<Option<HistogramLine>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.split_whitespace();
    let index_field = fields
        .next()
        .ok_or_else(|| ParseError::malformed(line, "empty"))?;
    let index: usize = index_field
        .parse()
        .map_err(|_| ParseError::malformed(line, format!("bad bucket index '{}'", index_field)))?;
    if index > MAX_BUCKET_INDEX {
        return Err(ParseError::IndexOutOfRange { index });
    }

    let counts = fields
        .map(|field| {
            field
                .parse::<u64>()
                .map_err(|_| ParseError::malformed(line, format!("bad count '{}'", field)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if counts.is_empty() {
        return Err(ParseError::malformed(line, "no per-core counts"));
    }

    Ok(Some(HistogramLine { index, counts }))
}
