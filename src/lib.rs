pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::LocalStorage;
#[cfg(feature = "s3")]
pub use adapters::storage::S3Storage;
pub use adapters::translator::HttpTranslator;
pub use config::{DownloadConfig, TomlConfig, TranslateConfig, UploadConfig};
pub use core::engine::{BatchEngine, BatchSettings};
pub use domain::model::{IdRange, Record, RunSummary};
pub use utils::error::{PrepError, Result};
