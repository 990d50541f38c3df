use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory-backed storage; keys are relative paths under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<()> {
        let full_path = self.base_path.join(key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::copy(source, full_path)?;
        Ok(())
    }
}

#[cfg(feature = "s3")]
pub use s3::S3Storage;

#[cfg(feature = "s3")]
mod s3 {
    use crate::domain::ports::Storage;
    use crate::utils::error::{PrepError, Result};
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::config::Region;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client as S3Client;
    use std::path::Path;

    #[derive(Debug, Clone)]
    pub struct S3Storage {
        client: S3Client,
        bucket: String,
    }

    impl S3Storage {
        pub fn new(client: S3Client, bucket: String) -> Self {
            Self { client, bucket }
        }

        /// Builds a client from the default AWS credential chain.
        pub async fn from_env(bucket: String, region: Option<String>) -> Self {
            let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
            let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
            if let Some(region) = region {
                builder = builder.region(Region::new(region));
            }
            Self::new(S3Client::from_conf(builder.build()), bucket)
        }
    }

    impl Storage for S3Storage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(path)
                .send()
                .await
                .map_err(|e| PrepError::StorageError {
                    message: format!("Failed to read s3://{}/{}: {}", self.bucket, path, e),
                })?;

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| PrepError::StorageError {
                    message: format!("Failed to collect S3 data: {}", e),
                })?;

            Ok(data.into_bytes().to_vec())
        }

        async fn put_file(&self, key: &str, source: &Path) -> Result<()> {
            let body = ByteStream::from_path(source)
                .await
                .map_err(|e| PrepError::StorageError {
                    message: format!("Failed to open {}: {}", source.display(), e),
                })?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| PrepError::StorageError {
                    message: format!(
                        "Failed to write s3://{}/{}: {}",
                        self.bucket,
                        key,
                        e.into_service_error()
                    ),
                })?;

            Ok(())
        }
    }
}
