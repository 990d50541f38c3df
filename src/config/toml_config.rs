use crate::config::{DownloadConfig, TranslateConfig, UploadConfig};
use crate::utils::error::{PrepError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|e| panic!("invalid env var pattern: {}", e))
});

/// Whole configuration file; every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub download: DownloadConfig,
    pub translate: TranslateConfig,
    pub upload: Option<UploadConfig>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PrepError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| PrepError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.download.validate()?;
        self.translate.validate()?;
        if let Some(upload) = &self.upload {
            upload.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadBackend;
    use crate::core::source::MalformedPolicy;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert!(config.upload.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[download]
split = "valid"
workers = 8
malformed = "skip"

[translate]
input = "cc3m_valid.jsonl"
langs = ["fr", "de"]
inf = 0
sup = 15840

[translate.retry]
max_attempts = 3
delay_ms = 50

[translate.translator]
endpoint = "https://translate.example.com/translate"

[upload]
bucket = "cc3m-data"
prefix = "translated"
every_n_flushes = 100
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.download.prefix(), "cc3m_valid");
        assert_eq!(config.download.workers, 8);
        assert_eq!(config.download.malformed, MalformedPolicy::Skip);
        assert_eq!(config.download.batch_size, 32_000);

        assert_eq!(config.translate.langs, vec!["fr", "de"]);
        assert_eq!(config.translate.sup, Some(15840));
        assert_eq!(config.translate.retry.max_attempts, 3);
        assert_eq!(config.translate.retry.delay, Duration::from_millis(50));
        assert_eq!(config.translate.batch_size, 100);

        let upload = config.upload.as_ref().unwrap();
        assert_eq!(upload.backend, UploadBackend::S3);
        assert_eq!(upload.bucket, "cc3m-data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CC3M_PREP_TEST_API_KEY", "s3cret");

        let toml_content = r#"
[translate.translator]
api_key = "${CC3M_PREP_TEST_API_KEY}"
endpoint = "${CC3M_PREP_TEST_UNSET_ENDPOINT}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.translate.translator.api_key.as_deref(), Some("s3cret"));
        assert_eq!(
            config.translate.translator.endpoint,
            "${CC3M_PREP_TEST_UNSET_ENDPOINT}"
        );
        assert!(config.validate().is_err());

        std::env::remove_var("CC3M_PREP_TEST_API_KEY");
    }

    #[test]
    fn test_invalid_toml() {
        let err = TomlConfig::from_toml_str("[download\nworkers = ").unwrap_err();
        assert!(matches!(err, PrepError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[download]\nimage_root = \"/data/images\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.download.target_dir(),
            PathBuf::from("/data/images/cc3m_train")
        );
    }
}
