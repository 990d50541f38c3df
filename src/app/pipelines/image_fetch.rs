use crate::domain::model::Record;
use crate::domain::ports::RecordProcessor;
use crate::utils::error::{PrepError, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Shorter side above which downloaded images are scaled down.
pub const MAX_IMAGE_SIDE: u32 = 512;

#[derive(Debug, Clone)]
pub struct ImageFetchSettings {
    pub target_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub prefix: String,
    pub max_side: u32,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

/// `{prefix}_{image_id:08}.jpg`
pub fn image_file_name(prefix: &str, image_id: i64) -> String {
    format!("{}_{:08}.jpg", prefix, image_id)
}

/// Output size keeping the aspect ratio so the shorter side is at most
/// `max_side`. Images already within bounds keep their size.
pub fn target_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let short = width.min(height);
    if short <= max_side || short == 0 {
        return (width, height);
    }

    let scale = |long: u32| -> u32 {
        let scaled = (u64::from(long) * u64::from(max_side) + u64::from(short) / 2) / u64::from(short);
        scaled.max(1) as u32
    };

    if width <= height {
        (max_side, scale(height))
    } else {
        (scale(width), max_side)
    }
}

/// Converts to RGB and downsizes with Lanczos resampling when needed.
pub fn resize_to_bounds(image: image::DynamicImage, max_side: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    let (width, height) = target_dimensions(rgb.width(), rgb.height(), max_side);
    if (width, height) == rgb.dimensions() {
        rgb
    } else {
        image::imageops::resize(&rgb, width, height, FilterType::Lanczos3)
    }
}

/// Removes the file on drop; a file that is already gone is fine.
struct TempFileGuard {
    path: PathBuf,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// Downloads one image, normalizes it and stores it as JPEG.
///
/// An existing output file means the record is done and nothing is
/// fetched; this is how a re-run resumes.
pub struct ImageFetcher {
    client: Client,
    settings: ImageFetchSettings,
}

impl ImageFetcher {
    pub fn new(settings: ImageFetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn final_path(&self, record: &Record) -> PathBuf {
        self.settings
            .target_dir
            .join(image_file_name(&self.settings.prefix, record.image_id()))
    }

    async fn download(&self, url: &str, tmp_path: &Path) -> Result<()> {
        let fetch_error = |message: String| PrepError::FetchError {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("status {}", response.status())));
        }

        let mut file = tokio::fs::File::create(tmp_path).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

fn decode_resize_save(tmp_path: &Path, final_path: &Path, max_side: u32) -> Result<(u32, u32)> {
    let bytes = std::fs::read(tmp_path)?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| PrepError::DecodeError {
        message: e.to_string(),
    })?;
    let resized = resize_to_bounds(decoded, max_side);

    // 先寫到 .part 再改名，最終檔案只會以完整狀態出現
    let mut part_name = final_path.as_os_str().to_owned();
    part_name.push(".part");
    let part_path = PathBuf::from(part_name);
    let _part_guard = TempFileGuard {
        path: part_path.clone(),
    };

    resized
        .save_with_format(&part_path, ImageFormat::Jpeg)
        .map_err(|e| PrepError::DecodeError {
            message: format!("encode failed: {}", e),
        })?;
    std::fs::rename(&part_path, final_path)?;

    Ok(resized.dimensions())
}

#[async_trait]
impl RecordProcessor for ImageFetcher {
    async fn process(&self, record: Record) -> Result<Record> {
        let final_path = self.final_path(&record);
        if final_path.exists() {
            tracing::debug!(record_id = record.id, "Image already present, skipping");
            return Ok(record);
        }

        let url = record
            .image_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PrepError::FetchError {
                url: String::new(),
                message: "record has no image_url".to_string(),
            })?;

        let file_name = image_file_name(&self.settings.prefix, record.image_id());
        let tmp_path = self.settings.tmp_dir.join(&file_name);
        let _tmp_guard = TempFileGuard {
            path: tmp_path.clone(),
        };

        self.download(url, &tmp_path).await?;

        let max_side = self.settings.max_side;
        let blocking_final = final_path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || {
            decode_resize_save(&tmp_path, &blocking_final, max_side)
        })
        .await
        .map_err(|e| PrepError::ProcessingError {
            message: format!("image worker panicked: {}", e),
        })??;

        tracing::debug!(
            record_id = record.id,
            "🖼️ Saved {} ({}x{})",
            final_path.display(),
            width,
            height
        );
        Ok(record)
    }
}
