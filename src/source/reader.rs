use crate::batcher::{IngestError, IngestHandle};
use crate::config::types::SourceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open source '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One line of input, the record type the CLI pipeline batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub id: Uuid,
    pub source_id: String,
    pub received_at: DateTime<Utc>,
    /// 1-based line number within the source, counting skipped lines
    pub line_number: u64,
    pub raw_text: String,
}

/// Counts reported when a reader finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub lines_read: u64,
    pub lines_ingested: u64,
    pub lines_skipped: u64,
    pub lines_rejected: u64,
    /// Lines whose invalid UTF-8 bytes were replaced
    pub lines_lossy: u64,
}

pub struct LineReader {
    source_id: String,
    path: Option<PathBuf>,
    follow: bool,
    skip_empty_lines: bool,
    poll_interval: Duration,
    line_number: u64,
}

impl LineReader {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            source_id: config.id.clone(),
            path: if config.is_stdin() {
                None
            } else {
                Some(config.path.clone())
            },
            follow: config.follow,
            skip_empty_lines: config.skip_empty_lines,
            poll_interval: Duration::from_millis(250),
            line_number: 0,
        }
    }

    /// How long to wait at EOF before re-reading in follow mode
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Read the configured file or stdin until EOF (or until cancelled in
    /// follow mode), then stop the batcher. A source that cannot be opened
    /// also stops the batcher.
    pub async fn run(
        self,
        handle: IngestHandle<LogLine>,
        cancel: CancellationToken,
    ) -> Result<ReadSummary, ReaderError> {
        match self.path.clone() {
            Some(path) => {
                let file = match File::open(&path).await {
                    Ok(file) => file,
                    Err(source) => {
                        handle.stop();
                        return Err(ReaderError::Open { path, source });
                    }
                };
                info!(source_id = %self.source_id, path = %path.display(), "Reading source file");
                self.run_with(BufReader::new(file), handle, cancel).await
            }
            None => {
                info!(source_id = %self.source_id, "Reading stdin");
                self.run_with(BufReader::new(tokio::io::stdin()), handle, cancel)
                    .await
            }
        }
    }

    /// Read lines from any buffered input. Always calls `stop` on the handle
    /// before returning, including on error.
    pub async fn run_with<R>(
        mut self,
        mut input: R,
        handle: IngestHandle<LogLine>,
        cancel: CancellationToken,
    ) -> Result<ReadSummary, ReaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let result = self.read_lines(&mut input, &handle, &cancel).await;
        handle.stop();

        if let Ok(summary) = &result {
            info!(
                source_id = %self.source_id,
                lines_read = summary.lines_read,
                lines_ingested = summary.lines_ingested,
                lines_skipped = summary.lines_skipped,
                lines_rejected = summary.lines_rejected,
                lines_lossy = summary.lines_lossy,
                "Source reader finished"
            );
        }

        result
    }

    async fn read_lines<R>(
        &mut self,
        input: &mut R,
        handle: &IngestHandle<LogLine>,
        cancel: &CancellationToken,
    ) -> Result<ReadSummary, ReaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = ReadSummary::default();
        // Bytes, not String: a stray invalid byte must not end the read.
        // A cancelled `read_until` leaves what it already read in `buf`.
        let mut buf = Vec::new();

        loop {
            let bytes = tokio::select! {
                result = input.read_until(b'\n', &mut buf) => result?,
                _ = cancel.cancelled() => {
                    debug!(source_id = %self.source_id, "Reader cancelled");
                    break;
                }
            };

            if bytes == 0 {
                if !self.follow {
                    break;
                }
                tokio::select! {
                    _ = sleep(self.poll_interval) => continue,
                    _ = cancel.cancelled() => break,
                }
            }

            // A writer may still be appending to the last line
            if self.follow && !buf.ends_with(b"\n") {
                continue;
            }

            let Some(line) = self.next_line(&mut buf, &mut summary) else {
                continue;
            };

            let result = tokio::select! {
                biased;
                result = handle.ingest(line) => result,
                _ = cancel.cancelled() => {
                    debug!(source_id = %self.source_id, "Reader cancelled while waiting for queue space");
                    break;
                }
            };

            match result {
                Ok(()) => summary.lines_ingested += 1,
                Err(IngestError::QueueOverflow(line)) => {
                    debug!(line_number = line.line_number, "Line rejected, ingest queue full");
                    summary.lines_rejected += 1;
                }
                Err(IngestError::Stopped(_)) => {
                    debug!(source_id = %self.source_id, "Batcher stopped, reader exiting");
                    return Ok(summary);
                }
            }
        }

        // Content read before cancellation or a final unterminated line in
        // follow mode still belongs in the last batch.
        if !buf.is_empty() {
            if let Some(line) = self.next_line(&mut buf, &mut summary) {
                match handle.try_ingest(line) {
                    Ok(()) => summary.lines_ingested += 1,
                    Err(IngestError::QueueOverflow(_)) => summary.lines_rejected += 1,
                    Err(IngestError::Stopped(_)) => {
                        debug!(source_id = %self.source_id, "Batcher stopped, trailing line dropped");
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Turn the raw bytes in `buf` into a record, clearing `buf`. Returns
    /// `None` for a skipped empty line.
    fn next_line(&mut self, buf: &mut Vec<u8>, summary: &mut ReadSummary) -> Option<LogLine> {
        self.line_number += 1;
        summary.lines_read += 1;

        let text = match String::from_utf8_lossy(buf) {
            Cow::Borrowed(text) => text.trim_end_matches(&['\n', '\r'][..]).to_string(),
            Cow::Owned(text) => {
                warn!(
                    source_id = %self.source_id,
                    line_number = self.line_number,
                    "Line is not valid UTF-8, invalid bytes replaced"
                );
                summary.lines_lossy += 1;
                text.trim_end_matches(&['\n', '\r'][..]).to_string()
            }
        };
        buf.clear();

        if self.skip_empty_lines && text.trim().is_empty() {
            summary.lines_skipped += 1;
            return None;
        }

        Some(LogLine {
            id: Uuid::new_v4(),
            source_id: self.source_id.clone(),
            received_at: Utc::now(),
            line_number: self.line_number,
            raw_text: text,
        })
    }
}
