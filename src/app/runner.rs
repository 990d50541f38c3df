//! Wires configs, sources, processors and sinks into complete runs.

use crate::adapters::storage::LocalStorage;
use crate::adapters::translator::HttpTranslator;
use crate::app::pipelines::{is_fully_translated, CaptionTranslator, ImageFetcher};
use crate::config::{DownloadConfig, TranslateConfig, UploadBackend, UploadConfig};
use crate::core::engine::{BatchEngine, BatchSettings};
use crate::core::sink::{AppendSink, Uploader};
use crate::core::source::{JsonlSource, MalformedPolicy};
use crate::core::tracker::{load_processed_with, ProcessedSet};
use crate::domain::model::{IdRange, Record, RunSummary};
use crate::domain::ports::{Storage, Translator};
use crate::utils::error::Result;
use crate::utils::validation::validate_required_field;
use std::path::Path;
use std::time::Duration;

/// Downloads every image of the configured split that is not on disk yet.
pub async fn download_images(config: &DownloadConfig, monitor: bool) -> Result<RunSummary> {
    let target_dir = config.target_dir();
    tokio::fs::create_dir_all(&target_dir).await?;
    tokio::fs::create_dir_all(&config.tmp_dir).await?;

    let input = config.input_path();
    tracing::info!(
        "📥 Downloading images from {} into {}",
        input.display(),
        target_dir.display()
    );

    let source = JsonlSource::open(&input, config.range(), config.malformed)?;
    let fetcher = ImageFetcher::new(config.fetch_settings())?;
    let mut engine = BatchEngine::new_with_monitoring(
        fetcher,
        BatchSettings::new(config.batch_size, config.workers),
        monitor,
    );

    // 圖片是否完成由目標檔案決定，不需要 processed 集合
    engine
        .run(source, &ProcessedSet::default(), None::<AppendSink<LocalStorage>>)
        .await
}

/// Translates captions over HTTP, appending to the derived output file and
/// uploading it when `upload` is configured.
pub async fn translate_captions(
    config: &TranslateConfig,
    upload: Option<&UploadConfig>,
    monitor: bool,
) -> Result<RunSummary> {
    let translator = HttpTranslator::new(
        config.translator.endpoint.clone(),
        config.translator.api_key.clone(),
        Duration::from_millis(config.translator.timeout_ms),
    )?;

    let output = config.output_path();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let sink = AppendSink::new(&output, config.flush_every);

    let Some(upload) = upload else {
        return translate_with(config, translator, sink, monitor).await;
    };

    let key = upload.key_for(&output);
    tracing::info!("☁️ Uploading {} as {}/{}", output.display(), upload.bucket, key);

    match upload.backend {
        UploadBackend::Local => {
            let root = validate_required_field("upload.local_root", &upload.local_root)?;
            let storage = LocalStorage::new(root.join(&upload.bucket));
            let sink = sink.with_uploader(Uploader::new(storage, key, upload.every_n_flushes));
            translate_with(config, translator, sink, monitor).await
        }
        UploadBackend::S3 => translate_to_s3(config, translator, sink, upload, key, monitor).await,
    }
}

#[cfg(feature = "s3")]
async fn translate_to_s3<T: Translator>(
    config: &TranslateConfig,
    translator: T,
    sink: AppendSink,
    upload: &UploadConfig,
    key: String,
    monitor: bool,
) -> Result<RunSummary> {
    use crate::adapters::storage::S3Storage;

    let storage = S3Storage::from_env(upload.bucket.clone(), upload.region.clone()).await;
    let sink = sink.with_uploader(Uploader::new(storage, key, upload.every_n_flushes));
    translate_with(config, translator, sink, monitor).await
}

#[cfg(not(feature = "s3"))]
async fn translate_to_s3<T: Translator>(
    _config: &TranslateConfig,
    _translator: T,
    _sink: AppendSink,
    _upload: &UploadConfig,
    _key: String,
    _monitor: bool,
) -> Result<RunSummary> {
    Err(crate::utils::error::PrepError::ConfigError {
        message: "S3 upload requires building with the `s3` feature".to_string(),
    })
}

/// Resumable translate run against any translator and sink.
///
/// Ids whose latest output line is fully translated are skipped. Lines
/// missing a language are resubmitted with their stored fields, so only the
/// missing languages are requested; the new line supersedes the old one.
pub async fn translate_with<T: Translator, S: Storage>(
    config: &TranslateConfig,
    translator: T,
    sink: AppendSink<S>,
    monitor: bool,
) -> Result<RunSummary> {
    let processed = load_processed_with(sink.path(), |record| {
        is_fully_translated(record, &config.langs)
    })?;
    if !processed.is_empty() {
        tracing::info!(
            "🔁 Resuming {}: {} records translated, {} with missing languages",
            sink.path().display(),
            processed.len(),
            processed.partial_len()
        );
    }

    let source = JsonlSource::open(&config.input, config.range(), config.malformed)?;
    let processor = CaptionTranslator::new(translator, config.translate_settings());
    let mut engine = BatchEngine::new_with_monitoring(
        processor,
        BatchSettings::new(config.batch_size, config.workers),
        monitor,
    );

    engine.run(source, &processed, Some(sink)).await
}

/// First `limit` records of a JSONL file.
pub fn inspect_records<P: AsRef<Path>>(path: P, limit: usize) -> Result<Vec<Record>> {
    JsonlSource::open(path, IdRange::default(), MalformedPolicy::Fail)?
        .take(limit)
        .collect()
}
