use crate::domain::model::Record;
use crate::domain::ports::RecordProcessor;
use futures::stream::{self, StreamExt};

/// Result of one batch: records that completed, and ids that failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<Record>,
    pub failed: Vec<i64>,
}

/// Runs `processor` over every record of `batch` with at most `workers`
/// invocations in flight, and returns once all of them have finished.
///
/// Failures are logged here with the record id and URL and never affect
/// sibling records. Completion order is not submission order.
pub async fn run_batch<P>(processor: &P, batch: Vec<Record>, workers: usize) -> BatchOutcome
where
    P: RecordProcessor + ?Sized,
{
    let results = stream::iter(batch)
        .map(|record| {
            let id = record.id;
            let url = record.image_url.clone();
            async move { (id, url, processor.process(record).await) }
        })
        .buffer_unordered(workers.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut outcome = BatchOutcome::default();
    for (id, url, result) in results {
        match result {
            Ok(record) => outcome.completed.push(record),
            Err(e) => {
                tracing::error!(
                    record_id = id,
                    url = url.as_deref().unwrap_or(""),
                    error = %e,
                    category = ?e.category(),
                    "❌ Record failed"
                );
                outcome.failed.push(id);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{PrepError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowProcessor {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_ids: Vec<i64>,
    }

    impl SlowProcessor {
        fn new(fail_ids: Vec<i64>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_ids,
            }
        }
    }

    #[async_trait]
    impl RecordProcessor for SlowProcessor {
        async fn process(&self, mut record: Record) -> Result<Record> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_ids.contains(&record.id) {
                return Err(PrepError::FetchError {
                    url: record.image_url.clone().unwrap_or_default(),
                    message: "unreachable".to_string(),
                });
            }
            record.set_text_field("done", "yes");
            Ok(record)
        }
    }

    fn batch(n: i64) -> Vec<Record> {
        (0..n)
            .map(|id| Record::new(id, format!("caption {}", id), format!("http://host/{}", id)))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_workers() {
        let processor = SlowProcessor::new(vec![]);
        let outcome = run_batch(&processor, batch(10), 3).await;

        assert_eq!(outcome.completed.len(), 10);
        assert_eq!(processor.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(processor.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let processor = SlowProcessor::new(vec![1, 3]);
        let outcome = run_batch(&processor, batch(5), 2).await;

        let mut completed: Vec<i64> = outcome.completed.iter().map(|r| r.id).collect();
        completed.sort();
        let mut failed = outcome.failed.clone();
        failed.sort();

        assert_eq!(completed, vec![0, 2, 4]);
        assert_eq!(failed, vec![1, 3]);
        assert!(outcome
            .completed
            .iter()
            .all(|r| r.text_field("done") == Some("yes")));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let processor = SlowProcessor::new(vec![]);
        let outcome = run_batch(&processor, Vec::new(), 4).await;
        assert!(outcome.completed.is_empty());
        assert!(outcome.failed.is_empty());
    }
}
