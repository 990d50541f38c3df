use crate::core::pool::run_batch;
use crate::core::sink::AppendSink;
use crate::core::tracker::ProcessedSet;
use crate::domain::model::{Record, RunSummary};
use crate::domain::ports::{RecordProcessor, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::collections::HashSet;

/// Batch shape for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub workers: usize,
}

impl BatchSettings {
    pub fn new(batch_size: usize, workers: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            workers: workers.max(1),
        }
    }
}

/// Single-threaded driver of the resumable batch pattern.
///
/// Records are read in order, already-processed ids are dropped, the rest
/// are grouped into batches and each batch is run to completion on the
/// worker pool before the next one is formed.
pub struct BatchEngine<P: RecordProcessor> {
    processor: P,
    settings: BatchSettings,
    monitor: SystemMonitor,
}

impl<P: RecordProcessor> BatchEngine<P> {
    pub fn new(processor: P, settings: BatchSettings) -> Self {
        Self::new_with_monitoring(processor, settings, false)
    }

    pub fn new_with_monitoring(processor: P, settings: BatchSettings, monitor: bool) -> Self {
        Self {
            processor,
            settings,
            monitor: SystemMonitor::new(monitor),
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Runs every record of `source` through the processor. Completed
    /// records go to `sink` when one is given; the sink is finished before
    /// returning.
    pub async fn run<I, S>(
        &mut self,
        source: I,
        processed: &ProcessedSet,
        mut sink: Option<AppendSink<S>>,
    ) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<Record>>,
        S: Storage,
    {
        let mut summary = RunSummary::default();
        let mut batch: Vec<Record> = Vec::with_capacity(self.settings.batch_size);
        let mut batch_ids: HashSet<i64> = HashSet::new();

        tracing::info!(
            "🚀 Starting run: batch size {}, {} workers, {} ids already processed",
            self.settings.batch_size,
            self.settings.workers,
            processed.len()
        );

        for item in source {
            let record = item?;
            summary.read += 1;

            if processed.contains(record.id) {
                summary.already_processed += 1;
                continue;
            }
            let record = match processed.partial(record.id) {
                Some(previous) => {
                    summary.resumed += 1;
                    with_previous_fields(record, previous)
                }
                None => record,
            };
            // 同一批次內 id 必須唯一，暫存檔名由 id 決定
            if !batch_ids.insert(record.id) {
                tracing::warn!(record_id = record.id, "Dropping duplicate id within batch");
                summary.duplicates += 1;
                continue;
            }

            batch.push(record);
            if batch.len() >= self.settings.batch_size {
                batch_ids.clear();
                let full = std::mem::take(&mut batch);
                self.dispatch(full, &mut summary, sink.as_mut()).await?;
            }
        }

        if !batch.is_empty() {
            self.dispatch(batch, &mut summary, sink.as_mut()).await?;
        }

        if let Some(sink) = sink {
            let stats = sink.finish().await?;
            summary.flushes = stats.flushes;
            summary.written = stats.written;
        }

        self.monitor.log_final_stats();
        tracing::info!(
            "✅ Run finished: {} read, {} skipped as done, {} completed, {} failed",
            summary.read,
            summary.already_processed,
            summary.completed,
            summary.failed
        );
        Ok(summary)
    }

    async fn dispatch<S: Storage>(
        &mut self,
        batch: Vec<Record>,
        summary: &mut RunSummary,
        sink: Option<&mut AppendSink<S>>,
    ) -> Result<()> {
        let size = batch.len();
        let outcome = run_batch(&self.processor, batch, self.settings.workers).await;

        summary.batches += 1;
        summary.completed += outcome.completed.len();
        summary.failed += outcome.failed.len();

        tracing::info!(
            "🔄 Batch {} done: {}/{} completed",
            summary.batches,
            outcome.completed.len(),
            size
        );

        if let Some(sink) = sink {
            for record in &outcome.completed {
                sink.push(record)?;
            }
            sink.maybe_flush().await?;
        }

        self.monitor.log_stats("batch");
        Ok(())
    }
}

/// Layers the derived fields stored for a partial record over the input
/// record, so the processor only has to fill what is still missing.
fn with_previous_fields(mut record: Record, previous: &Record) -> Record {
    for (key, value) in &previous.fields {
        record.fields.insert(key.clone(), value.clone());
    }
    record
}
