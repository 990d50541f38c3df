use crate::domain::model::Record;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Object storage the output file is uploaded to.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Stores the local file at `source` under `key`, streaming it from disk.
    fn put_file(
        &self,
        key: &str,
        source: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Text translation service, keyed by source and destination language codes.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// The unit of work the worker pool runs for each record.
///
/// An `Err` means the record produced no output this run and will be
/// retried on the next resume.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    async fn process(&self, record: Record) -> Result<Record>;
}
