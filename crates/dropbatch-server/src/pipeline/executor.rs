//! Chunked read-transform-write executor
//!
//! Reads the run's files as one concatenated delimited source, groups records
//! into chunks of `chunk_size`, transforms each chunk and hands it to the sink
//! as one transaction. The first failing chunk stops the run; chunks committed
//! before it stay committed.
//!
//! Once the cancellation token fires no new chunk is started: a chunk already
//! buffered or being written still commits, then the run is reported as
//! failed.

use csv_async::{AsyncReaderBuilder, Trim};
use dropbatch_common::types::{transform, Discount, RawDiscount};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::listener::CompletionListener;
use super::sink::ChunkSink;
use super::types::{PipelineError, RunParameters, RunReport, RunStats, RunStatus};

/// Executes import runs against a sink.
pub struct ChunkedPipeline {
    sink: Arc<dyn ChunkSink>,
    listener: Arc<dyn CompletionListener>,
    chunk_size: usize,
    cancel: CancellationToken,
}

impl ChunkedPipeline {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(
        sink: Arc<dyn ChunkSink>,
        listener: Arc<dyn CompletionListener>,
        chunk_size: usize,
    ) -> Self {
        Self {
            sink,
            listener,
            chunk_size: chunk_size.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs at their next commit boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pipeline over every file in `params`.
    ///
    /// Never returns an error: failures are captured in the report. The
    /// completion listener is invoked exactly once before returning.
    pub async fn run(&self, params: &RunParameters) -> RunReport {
        let span = info_span!(
            "pipeline_run",
            timestamp = params.timestamp(),
            files = params.file_paths().len()
        );

        async {
            info!(file_paths = %params.joined_paths(), "Starting run");

            let mut stats = RunStats::new();
            let status = match self.execute(params, &mut stats).await {
                Ok(()) => RunStatus::Completed,
                Err(err) => RunStatus::Failed(err),
            };
            stats.complete();

            let report = RunReport {
                params: params.clone(),
                status,
                stats,
            };

            self.listener.after_run(&report).await;

            report
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        params: &RunParameters,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        // The buffer outlives each file so chunks may span file boundaries.
        let mut buffer: Vec<RawDiscount> = Vec::with_capacity(self.chunk_size);

        for path in params.file_paths() {
            self.read_file(path, &mut buffer, stats).await?;
        }

        if !buffer.is_empty() {
            self.commit_chunk(&mut buffer, stats).await?;
        }

        Ok(())
    }

    async fn read_file(
        &self,
        path: &Path,
        buffer: &mut Vec<RawDiscount>,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PipelineError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Reading file");

        let mut reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .create_deserializer(file);
        let records = reader.deserialize::<RawDiscount>();
        tokio::pin!(records);

        let mut record_number = 0u64;
        while let Some(record) = records.next().await {
            record_number += 1;
            let record = record.map_err(|source| PipelineError::Read {
                path: path.to_path_buf(),
                record: record_number,
                source,
            })?;

            if buffer.is_empty() {
                self.check_cancelled(stats)?;
            }

            stats.inc_read();
            buffer.push(record);

            if buffer.len() >= self.chunk_size {
                self.commit_chunk(buffer, stats).await?;
            }
        }

        Ok(())
    }

    fn check_cancelled(&self, stats: &RunStats) -> Result<(), PipelineError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        warn!(
            chunks_committed = stats.chunks_committed,
            "Run cancelled at chunk boundary"
        );
        Err(PipelineError::Cancelled {
            chunks_committed: stats.chunks_committed,
        })
    }

    /// Transform and write the buffered records, then clear the buffer.
    async fn commit_chunk(
        &self,
        buffer: &mut Vec<RawDiscount>,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        let chunk_number = stats.chunks_committed + 1;
        let transformed = buffer.iter().map(transform).collect::<Result<Vec<Discount>, _>>();
        buffer.clear();

        let chunk = match transformed {
            Ok(chunk) => chunk,
            Err(err) => {
                stats.record_failed_chunk();
                return Err(err.into());
            },
        };

        match self.sink.write_chunk(&chunk).await {
            Ok(written) => {
                stats.record_commit(written);
                debug!(chunk = chunk_number, records = written, "Chunk committed");
                Ok(())
            },
            Err(source) => {
                stats.record_failed_chunk();
                Err(PipelineError::Sink {
                    chunk: chunk_number,
                    source,
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, DbResult};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        commits: Mutex<Vec<Vec<Discount>>>,
        fail_on_chunk: Option<usize>,
        /// Fires the token while chunk N is being written
        cancel_on_chunk: Option<(usize, CancellationToken)>,
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn write_chunk(&self, chunk: &[Discount]) -> DbResult<u64> {
            let mut commits = self.commits.lock().unwrap();
            if self.fail_on_chunk == Some(commits.len() + 1) {
                return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            if let Some((n, token)) = &self.cancel_on_chunk {
                if *n == commits.len() + 1 {
                    token.cancel();
                }
            }
            commits.push(chunk.to_vec());
            Ok(chunk.len() as u64)
        }
    }

    #[derive(Default)]
    struct CountingListener {
        calls: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl CompletionListener for CountingListener {
        async fn after_run(&self, report: &RunReport) {
            self.calls.lock().unwrap().push(report.is_success());
        }
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn pipeline(
        sink: Arc<RecordingSink>,
        listener: Arc<CountingListener>,
        chunk_size: usize,
    ) -> ChunkedPipeline {
        ChunkedPipeline::new(sink, listener, chunk_size)
    }

    #[tokio::test]
    async fn test_seven_records_commit_three_chunks() {
        let dir = TempDir::new().unwrap();
        let body: String = (1..=7).map(|i| format!("item{i},{i}\n")).collect();
        let path = write_file(&dir, "seven.csv", &body);

        let sink = Arc::new(RecordingSink::default());
        let listener = Arc::new(CountingListener::default());
        let report = pipeline(sink.clone(), listener.clone(), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(report.is_success());
        let sizes: Vec<usize> = sink.commits.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(report.stats.records_written, 7);
        assert_eq!(report.stats.chunks_committed, 3);
        assert_eq!(*listener.calls.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_malformed_fourth_record_commits_first_chunk_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.csv", "a,1\nb,2\nc,3\nd,oops\n");

        let sink = Arc::new(RecordingSink::default());
        let listener = Arc::new(CountingListener::default());
        let report = pipeline(sink.clone(), listener.clone(), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(!report.is_success());
        assert!(matches!(report.error(), Some(PipelineError::Transform(_))));
        assert_eq!(sink.commits.lock().unwrap().len(), 1);
        assert_eq!(report.stats.chunks_committed, 1);
        assert_eq!(report.stats.chunks_failed, 1);
        assert_eq!(*listener.calls.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_malformed_record_discards_whole_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mid.csv", "a,1\nb,x\nc,3\n");

        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(!report.is_success());
        assert!(sink.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_fails_run() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ok.csv", "a,1\nb,2\nc,3\nd,4\n");

        let sink = Arc::new(RecordingSink {
            fail_on_chunk: Some(2),
            ..Default::default()
        });
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(matches!(
            report.error(),
            Some(PipelineError::Sink { chunk: 2, .. })
        ));
        assert_eq!(sink.commits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_files_are_concatenated_in_order() {
        let dir = TempDir::new().unwrap();
        let first = write_file(&dir, "first.csv", "a,1\nb,2\n");
        let second = write_file(&dir, "second.csv", "c,3\nd,4\n");

        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .run(&RunParameters::new(vec![first, second]))
            .await;

        assert!(report.is_success());
        let commits = sink.commits.lock().unwrap();
        let names: Vec<Vec<&str>> = commits
            .iter()
            .map(|chunk| chunk.iter().map(|d| d.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["A", "B", "C"], vec!["D"]]);
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_commits() {
        let sink = Arc::new(RecordingSink::default());
        let listener = Arc::new(CountingListener::default());
        let report = pipeline(sink.clone(), listener.clone(), 3)
            .run(&RunParameters::new(vec![PathBuf::from("/nonexistent/drop.csv")]))
            .await;

        assert!(matches!(report.error(), Some(PipelineError::Open { .. })));
        assert!(sink.commits.lock().unwrap().is_empty());
        assert_eq!(listener.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_completes_without_commits() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");

        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(report.is_success());
        assert_eq!(report.stats.records_read, 0);
        assert!(sink.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_around_fields_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "spaced.csv", "  widget , 5 \n");

        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(report.is_success());
        assert_eq!(
            sink.commits.lock().unwrap()[0],
            vec![Discount::new("WIDGET", 5.0)]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", "a,1\nb,2\n");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let sink = Arc::new(RecordingSink::default());
        let listener = Arc::new(CountingListener::default());
        let report = pipeline(sink.clone(), listener.clone(), 3)
            .with_cancellation(cancel)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(matches!(
            report.error(),
            Some(PipelineError::Cancelled { chunks_committed: 0 })
        ));
        assert!(sink.commits.lock().unwrap().is_empty());
        assert_eq!(*listener.calls.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_cancel_during_write_stops_at_next_chunk() {
        let dir = TempDir::new().unwrap();
        let body: String = (1..=5).map(|i| format!("item{i},{i}\n")).collect();
        let path = write_file(&dir, "five.csv", &body);

        let cancel = CancellationToken::new();
        let sink = Arc::new(RecordingSink {
            cancel_on_chunk: Some((1, cancel.clone())),
            ..Default::default()
        });
        let listener = Arc::new(CountingListener::default());
        let report = pipeline(sink.clone(), listener.clone(), 1)
            .with_cancellation(cancel)
            .run(&RunParameters::new(vec![path]))
            .await;

        // The chunk in flight when the token fired still commits
        assert_eq!(sink.commits.lock().unwrap().len(), 1);
        assert!(matches!(
            report.error(),
            Some(PipelineError::Cancelled { chunks_committed: 1 })
        ));
        assert_eq!(report.stats.records_written, 1);
        assert_eq!(*listener.calls.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_cancel_during_last_chunk_completes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "three.csv", "a,1\nb,2\nc,3\n");

        let cancel = CancellationToken::new();
        let sink = Arc::new(RecordingSink {
            cancel_on_chunk: Some((1, cancel.clone())),
            ..Default::default()
        });
        let report = pipeline(sink.clone(), Arc::new(CountingListener::default()), 3)
            .with_cancellation(cancel)
            .run(&RunParameters::new(vec![path]))
            .await;

        assert!(report.is_success());
        assert_eq!(report.stats.records_written, 3);
    }
}
