#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::app::pipelines::{ImageFetchSettings, TranslateSettings};
use crate::core::retry::RetryPolicy;
use crate::core::source::MalformedPolicy;
use crate::domain::model::IdRange;
use crate::utils::error::{PrepError, Result};
use crate::utils::validation::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use toml_config::TomlConfig;

fn validate_id_range(field_name: &str, inf: i64, sup: Option<i64>) -> Result<()> {
    if inf < 0 {
        return Err(PrepError::InvalidConfigValueError {
            field: format!("{}.inf", field_name),
            value: inf.to_string(),
            reason: "Range start cannot be negative".to_string(),
        });
    }
    if let Some(sup) = sup {
        if sup <= inf {
            return Err(PrepError::InvalidConfigValueError {
                field: format!("{}.sup", field_name),
                value: sup.to_string(),
                reason: format!("Range end must be greater than start {}", inf),
            });
        }
    }
    Ok(())
}

/// Image download settings. Defaults follow the CC3M train split layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Input JSONL; defaults to `./<dataset>_<split>.jsonl`.
    pub input: Option<PathBuf>,
    pub dataset_name: String,
    pub split: String,
    pub image_root: PathBuf,
    pub tmp_dir: PathBuf,
    pub workers: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub max_image_side: u32,
    /// Many CC3M hosts serve broken certificates, so this is on by default.
    pub accept_invalid_certs: bool,
    pub inf: i64,
    pub sup: Option<i64>,
    pub malformed: MalformedPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            input: None,
            dataset_name: "cc3m".to_string(),
            split: "train".to_string(),
            image_root: PathBuf::from("./cc3m_images"),
            tmp_dir: PathBuf::from("./tmp"),
            workers: 32,
            batch_size: 32_000,
            timeout_ms: 2_000,
            max_image_side: crate::app::pipelines::image_fetch::MAX_IMAGE_SIDE,
            accept_invalid_certs: true,
            inf: 0,
            sup: None,
            malformed: MalformedPolicy::Fail,
        }
    }
}

impl DownloadConfig {
    /// File name prefix and image sub-directory, e.g. `cc3m_train`.
    pub fn prefix(&self) -> String {
        format!("{}_{}", self.dataset_name, self.split)
    }

    pub fn input_path(&self) -> PathBuf {
        self.input
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("./{}.jsonl", self.prefix())))
    }

    pub fn target_dir(&self) -> PathBuf {
        self.image_root.join(self.prefix())
    }

    pub fn range(&self) -> IdRange {
        IdRange::new(self.inf, self.sup)
    }

    pub fn fetch_settings(&self) -> ImageFetchSettings {
        ImageFetchSettings {
            target_dir: self.target_dir(),
            tmp_dir: self.tmp_dir.clone(),
            prefix: self.prefix(),
            max_side: self.max_image_side,
            timeout: Duration::from_millis(self.timeout_ms),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

impl Validate for DownloadConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("download.dataset_name", &self.dataset_name)?;
        validate_non_empty_string("download.split", &self.split)?;
        validate_path(
            "download.image_root",
            &self.image_root.to_string_lossy(),
        )?;
        validate_path("download.tmp_dir", &self.tmp_dir.to_string_lossy())?;
        validate_range("download.workers", self.workers, 1, 1024)?;
        validate_positive_number("download.batch_size", self.batch_size, 1)?;
        validate_range("download.timeout_ms", self.timeout_ms, 1, 600_000)?;
        validate_range("download.max_image_side", self.max_image_side, 1, 65_535)?;
        validate_id_range("download", self.inf, self.sup)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/translate".to_string(),
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

/// Caption cleaning and translation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub input: PathBuf,
    /// Explicit output file; otherwise derived from input name and range.
    pub output: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub langs: Vec<String>,
    pub batch_size: usize,
    pub flush_every: usize,
    pub workers: usize,
    pub pause_ms: u64,
    pub inf: i64,
    pub sup: Option<i64>,
    pub malformed: MalformedPolicy,
    pub retry: RetryPolicy,
    pub translator: TranslatorConfig,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("cc3m_train.jsonl"),
            output: None,
            output_dir: PathBuf::from("./"),
            langs: ["fr", "es", "pt", "it", "ja", "ko", "zh-CN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            batch_size: 100,
            flush_every: 100,
            workers: 4,
            pause_ms: 300,
            inf: 0,
            sup: None,
            malformed: MalformedPolicy::Fail,
            retry: RetryPolicy::default(),
            translator: TranslatorConfig::default(),
        }
    }
}

impl TranslateConfig {
    pub fn range(&self) -> IdRange {
        IdRange::new(self.inf, self.sup)
    }

    /// `<output_dir>/<input stem>_translated_<inf>_to_<sup|end>.jsonl` unless set.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "captions".to_string());
        self.output_dir
            .join(format!("{}_translated_{}.jsonl", stem, self.range().label()))
    }

    pub fn translate_settings(&self) -> TranslateSettings {
        TranslateSettings {
            langs: self.langs.clone(),
            retry: self.retry,
            pause: Duration::from_millis(self.pause_ms),
        }
    }
}

impl Validate for TranslateConfig {
    fn validate(&self) -> Result<()> {
        validate_path("translate.input", &self.input.to_string_lossy())?;
        validate_language_codes("translate.langs", &self.langs)?;
        validate_positive_number("translate.batch_size", self.batch_size, 1)?;
        validate_positive_number("translate.flush_every", self.flush_every, 1)?;
        validate_range("translate.workers", self.workers, 1, 256)?;
        validate_range("translate.retry.max_attempts", self.retry.max_attempts, 1, 100)?;
        validate_url("translate.translator.endpoint", &self.translator.endpoint)?;
        validate_id_range("translate", self.inf, self.sup)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    #[default]
    S3,
    /// Mirror into a local directory (`local_root/<bucket>/<key>`).
    Local,
}

/// Periodic upload of the translate output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub backend: UploadBackend,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_every_n_flushes")]
    pub every_n_flushes: usize,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

fn default_every_n_flushes() -> usize {
    100
}

impl UploadConfig {
    pub fn new(backend: UploadBackend, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            prefix: String::new(),
            every_n_flushes: default_every_n_flushes(),
            region: None,
            local_root: None,
        }
    }

    /// Object key for `output`: `<prefix>/<file name>`.
    pub fn key_for(&self, output: &Path) -> String {
        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            file_name
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }
}

impl Validate for UploadConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("upload.every_n_flushes", self.every_n_flushes, 1)?;
        match self.backend {
            UploadBackend::S3 => validate_s3_bucket_name("upload.bucket", &self.bucket)?,
            UploadBackend::Local => {
                validate_non_empty_string("upload.bucket", &self.bucket)?;
                let root = validate_required_field("upload.local_root", &self.local_root)?;
                validate_path("upload.local_root", &root.to_string_lossy())?;
            }
        }
        Ok(())
    }
}
