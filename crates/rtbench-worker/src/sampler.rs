//! Feeding sampler output into its channels.

use rtbench_histogram::{parse_histogram_line, ChannelSet};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read histogram lines from `output` until EOF, recording each into
/// `channels`, and hand the channels back.
///
/// Comment lines are skipped. Malformed lines are logged and skipped; they
/// never abort ingestion.
pub async fn ingest_histogram<R>(worker: String, output: R, mut channels: ChannelSet) -> ChannelSet
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(output).lines();
    let mut rows = 0usize;
    let mut rejected = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(worker = %worker, "Reading sampler output failed: {}", e);
                break;
            }
        };

        let recorded = parse_histogram_line(&line).and_then(|parsed| match parsed {
            Some(row) => channels.record_bucket_line(&row).map(|_| true),
            None => Ok(false),
        });
        match recorded {
            Ok(true) => rows += 1,
            Ok(false) => {}
            Err(e) => {
                rejected += 1;
                warn!(worker = %worker, "Skipping histogram line: {}", e);
            }
        }
    }

    debug!(worker = %worker, rows, rejected, "Sampler output finished");
    channels
}

/// Run [`ingest_histogram`] on its own task. The task exclusively owns the
/// channels until it returns them through the handle.
pub fn spawn_ingest<R>(worker: String, output: R, channels: ChannelSet) -> JoinHandle<ChannelSet>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(ingest_histogram(worker, output, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_skips_bad_lines() {
        let output: &[u8] = b"# Histogram\n000001 2 3\ngarbage\n000002 1 1 1\n000004 0 5\n# Total: 3 8\n";
        let channels = ingest_histogram("cyclictest".to_string(), output, ChannelSet::new(2, "cpu", 95)).await;

        assert_eq!(channels.system().histogram().total(), 10);
        assert_eq!(channels.core(0).unwrap().histogram().total(), 2);
        assert_eq!(channels.core(1).unwrap().histogram().total(), 8);
        assert_eq!(channels.system().histogram().count(4), Some(5));
        // the three-column row was rejected as a whole
        assert_eq!(channels.system().histogram().count(2), None);
    }

    #[tokio::test]
    async fn test_ingest_on_empty_output() {
        let output: &[u8] = b"";
        let channels = spawn_ingest("s".to_string(), output, ChannelSet::new(1, "cpu", 95))
            .await
            .unwrap();
        assert!(channels.system().histogram().is_empty());
    }
}
