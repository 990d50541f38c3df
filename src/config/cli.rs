use crate::config::{DownloadConfig, TomlConfig, TranslateConfig, UploadBackend, UploadConfig};
use crate::core::source::MalformedPolicy;
use crate::domain::model::IdRange;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cc3m-prep")]
#[command(about = "Prepare image-caption datasets: convert, download images, translate captions")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log process CPU and memory usage per batch
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a caption<TAB>url file to JSONL
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Download, resize and save the images of a JSONL split
    Download(DownloadArgs),
    /// Clean captions and add translations, resumably
    Translate(TranslateArgs),
    /// Pretty-print the first records of a JSONL file
    Inspect {
        input: PathBuf,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Print dataset examples with their resolved image paths
    Dataset {
        #[arg(long, default_value = "cc3m")]
        variant: String,
        #[arg(long, default_value = "train")]
        split: String,
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

/// `--inf/--sup` or `--shard-index/--shard-size`, never both.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// First id to process (inclusive)
    #[arg(long)]
    pub inf: Option<i64>,

    /// Stop before this id (exclusive)
    #[arg(long)]
    pub sup: Option<i64>,

    /// Shard number; processes ids [index*size, (index+1)*size)
    #[arg(long, requires = "shard_size", conflicts_with_all = ["inf", "sup"])]
    pub shard_index: Option<u32>,

    #[arg(long, requires = "shard_index")]
    pub shard_size: Option<u32>,
}

impl RangeArgs {
    pub fn apply(&self, inf: &mut i64, sup: &mut Option<i64>) {
        if let (Some(index), Some(size)) = (self.shard_index, self.shard_size) {
            let range = IdRange::shard(index, size);
            *inf = range.inf;
            *sup = range.sup;
            return;
        }
        if let Some(value) = self.inf {
            *inf = value;
        }
        if let Some(value) = self.sup {
            *sup = Some(value);
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub split: Option<String>,

    #[arg(long)]
    pub image_root: Option<PathBuf>,

    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long)]
    pub max_image_side: Option<u32>,

    /// Reject hosts with invalid TLS certificates
    #[arg(long)]
    pub verify_certs: bool,

    #[arg(long, value_enum)]
    pub malformed: Option<MalformedPolicy>,

    #[command(flatten)]
    pub range: RangeArgs,
}

impl DownloadArgs {
    pub fn apply_to(&self, config: &mut DownloadConfig) {
        if let Some(input) = &self.input {
            config.input = Some(input.clone());
        }
        if let Some(split) = &self.split {
            config.split = split.clone();
        }
        if let Some(image_root) = &self.image_root {
            config.image_root = image_root.clone();
        }
        if let Some(tmp_dir) = &self.tmp_dir {
            config.tmp_dir = tmp_dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_image_side) = self.max_image_side {
            config.max_image_side = max_image_side;
        }
        if self.verify_certs {
            config.accept_invalid_certs = false;
        }
        if let Some(policy) = self.malformed {
            config.malformed = policy;
        }
        self.range.apply(&mut config.inf, &mut config.sup);
    }
}

#[derive(Debug, Clone, Args)]
pub struct TranslateArgs {
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output file; defaults to a name derived from input and range
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Target languages, comma separated
    #[arg(long, value_delimiter = ',')]
    pub langs: Vec<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub flush_every: Option<usize>,

    #[arg(long)]
    pub workers: Option<usize>,

    /// Translation service URL
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Pause between calls for the same caption, in milliseconds
    #[arg(long)]
    pub pause_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub malformed: Option<MalformedPolicy>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Upload the output file to this bucket
    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long)]
    pub blob_prefix: Option<String>,

    #[arg(long)]
    pub upload_every: Option<usize>,

    #[arg(long, value_enum)]
    pub upload_backend: Option<UploadBackend>,

    /// Root directory for the local upload backend
    #[arg(long)]
    pub upload_root: Option<PathBuf>,

    #[arg(long)]
    pub region: Option<String>,
}

impl TranslateArgs {
    pub fn apply_to(&self, config: &mut TranslateConfig, upload: &mut Option<UploadConfig>) {
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if !self.langs.is_empty() {
            config.langs = self.langs.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(flush_every) = self.flush_every {
            config.flush_every = flush_every;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(endpoint) = &self.endpoint {
            config.translator.endpoint = endpoint.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.translator.api_key = Some(api_key.clone());
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(delay_ms) = self.retry_delay_ms {
            config.retry.delay = std::time::Duration::from_millis(delay_ms);
        }
        if let Some(pause_ms) = self.pause_ms {
            config.pause_ms = pause_ms;
        }
        if let Some(policy) = self.malformed {
            config.malformed = policy;
        }
        self.range.apply(&mut config.inf, &mut config.sup);

        if let Some(bucket) = &self.bucket {
            let backend = self.upload_backend.unwrap_or_default();
            let target = upload.get_or_insert_with(|| UploadConfig::new(backend, bucket.clone()));
            target.bucket = bucket.clone();
        }
        if let Some(target) = upload.as_mut() {
            if let Some(backend) = self.upload_backend {
                target.backend = backend;
            }
            if let Some(prefix) = &self.blob_prefix {
                target.prefix = prefix.clone();
            }
            if let Some(every) = self.upload_every {
                target.every_n_flushes = every;
            }
            if let Some(root) = &self.upload_root {
                target.local_root = Some(root.clone());
            }
            if let Some(region) = &self.region {
                target.region = Some(region.clone());
            }
        }
    }
}

impl Cli {
    /// Loads `--config` (or defaults) and applies the subcommand overrides.
    pub fn load_config(&self) -> crate::utils::error::Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        match &self.command {
            Command::Download(args) => args.apply_to(&mut config.download),
            Command::Translate(args) => args.apply_to(&mut config.translate, &mut config.upload),
            _ => {}
        }

        Ok(config)
    }
}
