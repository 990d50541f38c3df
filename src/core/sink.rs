use crate::adapters::storage::LocalStorage;
use crate::domain::model::Record;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Pushes the output file to remote storage every `every_n_flushes` flushes.
#[derive(Debug, Clone)]
pub struct Uploader<S: Storage> {
    storage: S,
    key: String,
    every_n_flushes: usize,
}

impl<S: Storage> Uploader<S> {
    pub fn new(storage: S, key: impl Into<String>, every_n_flushes: usize) -> Self {
        Self {
            storage,
            key: key.into(),
            every_n_flushes: every_n_flushes.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub flushes: usize,
    pub written: usize,
    pub uploads: usize,
}

/// Buffers serialized records and appends them to the output file in
/// bursts of at least `flush_threshold` lines.
///
/// Every flush is followed by a full copy of the output file to
/// `<name>-backup`. Lines already on disk are never rewritten.
pub struct AppendSink<S: Storage = LocalStorage> {
    path: PathBuf,
    backup_path: PathBuf,
    flush_threshold: usize,
    buffer: Vec<String>,
    stats: SinkStats,
    flushes_since_upload: usize,
    uploader: Option<Uploader<S>>,
}

impl AppendSink<LocalStorage> {
    pub fn new<P: AsRef<Path>>(path: P, flush_threshold: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            backup_path: backup_path_for(&path),
            path,
            flush_threshold: flush_threshold.max(1),
            buffer: Vec::new(),
            stats: SinkStats::default(),
            flushes_since_upload: 0,
            uploader: None,
        }
    }
}

impl<S: Storage> AppendSink<S> {
    pub fn with_uploader<T: Storage>(self, uploader: Uploader<T>) -> AppendSink<T> {
        AppendSink {
            path: self.path,
            backup_path: self.backup_path,
            flush_threshold: self.flush_threshold,
            buffer: self.buffer,
            stats: self.stats,
            flushes_since_upload: self.flushes_since_upload,
            uploader: Some(uploader),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    pub fn push(&mut self, record: &Record) -> Result<()> {
        self.buffer.push(record.to_json_line()?);
        Ok(())
    }

    /// Flushes when the buffer has reached the threshold.
    pub async fn maybe_flush(&mut self) -> Result<bool> {
        if self.buffer.len() < self.flush_threshold {
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        // 整批一次寫入，避免留下半行
        let mut data = String::with_capacity(self.buffer.iter().map(|l| l.len() + 1).sum());
        for line in &self.buffer {
            data.push_str(line);
            data.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(data.as_bytes())?;
        file.sync_data()?;

        let count = self.buffer.len();
        self.buffer.clear();
        self.stats.flushes += 1;
        self.stats.written += count;

        std::fs::copy(&self.path, &self.backup_path)?;
        tracing::info!(
            "💾 Flushed {} records ({} total) to {}",
            count,
            self.stats.written,
            self.path.display()
        );

        self.flushes_since_upload += 1;
        let upload_due = self
            .uploader
            .as_ref()
            .is_some_and(|u| self.flushes_since_upload >= u.every_n_flushes);
        if upload_due {
            self.upload().await;
        }

        Ok(())
    }

    /// Flushes the remainder and performs a last upload if anything new
    /// was written since the previous one.
    pub async fn finish(mut self) -> Result<SinkStats> {
        self.flush().await?;
        if self.uploader.is_some() && self.flushes_since_upload > 0 {
            self.upload().await;
        }
        Ok(self.stats)
    }

    // Upload failures are logged only; the local file stays the checkpoint.
    async fn upload(&mut self) {
        let Some(uploader) = &self.uploader else {
            return;
        };

        match uploader.storage.put_file(&uploader.key, &self.path).await {
            Ok(()) => {
                self.flushes_since_upload = 0;
                self.stats.uploads += 1;
                tracing::info!("☁️ Uploaded {} to {}", self.path.display(), uploader.key);
            }
            Err(e) => {
                tracing::warn!(key = %uploader.key, error = %e, "Upload failed, will retry on a later flush");
            }
        }
    }
}

pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push("-backup");
    PathBuf::from(name)
}
