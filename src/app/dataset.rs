//! Read-side adapter: iterates a translated JSONL split and attaches the
//! on-disk image path to every record.

use crate::core::source::{JsonlSource, MalformedPolicy};
use crate::domain::model::{IdRange, Record};
use crate::utils::error::{PrepError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl FromStr for Split {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "val" | "valid" | "validation" | "dev" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            other => Err(PrepError::InvalidConfigValueError {
                field: "split".to_string(),
                value: other.to_string(),
                reason: "Expected train, valid or test".to_string(),
            }),
        }
    }
}

/// Naming conventions of one dataset family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetVariant {
    pub name: &'static str,
    pub splits: &'static [Split],
    pub langs: &'static [&'static str],
    pub prefix_before_image_fn: bool,
    pub zfill: usize,
}

pub const VARIANTS: &[DatasetVariant] = &[
    DatasetVariant {
        name: "coco_2017",
        splits: &[Split::Train, Split::Valid],
        langs: &["en", "fr"],
        prefix_before_image_fn: false,
        zfill: 12,
    },
    DatasetVariant {
        name: "cc3m",
        splits: &[Split::Train, Split::Valid],
        langs: &["en", "fr"],
        prefix_before_image_fn: true,
        zfill: 8,
    },
    DatasetVariant {
        name: "cc12m",
        splits: &[Split::Train, Split::Valid],
        langs: &["en", "fr"],
        prefix_before_image_fn: true,
        zfill: 8,
    },
];

pub fn find_variant(name: &str) -> Result<&'static DatasetVariant> {
    VARIANTS
        .iter()
        .find(|v| v.name == name)
        .ok_or_else(|| PrepError::InvalidConfigValueError {
            field: "variant".to_string(),
            value: name.to_string(),
            reason: format!(
                "Known variants: {}",
                VARIANTS.iter().map(|v| v.name).collect::<Vec<_>>().join(", ")
            ),
        })
}

/// One record as handed to training code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    pub image_id: i64,
    pub id: i64,
    pub caption: Option<String>,
    #[serde(flatten)]
    pub langs: Map<String, Value>,
    pub image_url: String,
    pub image_file: PathBuf,
}

impl DatasetVariant {
    pub fn jsonl_path(&self, data_dir: &Path, split: Split) -> PathBuf {
        data_dir.join(format!("{}_translated_{}.jsonl", self.name, split.as_str()))
    }

    pub fn image_dir(&self, data_dir: &Path, split: Split) -> PathBuf {
        data_dir
            .join(format!("{}_images", self.name))
            .join(format!("{}_{}", self.name, split.as_str()))
    }

    pub fn image_file_name(&self, split: Split, image_id: i64) -> String {
        let padded = format!("{:0width$}.jpg", image_id, width = self.zfill);
        if self.prefix_before_image_fn {
            format!("{}_{}_{}", self.name, split.as_str(), padded)
        } else {
            padded
        }
    }

    /// Lazily yields the examples of `split` found under `data_dir`.
    ///
    /// A resumed translate run may write an id more than once; only the last
    /// line for each id is yielded, at its position in the file.
    pub fn examples(
        &self,
        data_dir: &Path,
        split: Split,
    ) -> Result<impl Iterator<Item = Result<Example>> + '_> {
        if !self.splits.contains(&split) {
            return Err(PrepError::InvalidConfigValueError {
                field: "split".to_string(),
                value: split.as_str().to_string(),
                reason: format!("Variant {} has no such split", self.name),
            });
        }

        let path = self.jsonl_path(data_dir, split);
        let latest = latest_line_per_id(&path)?;
        let source: JsonlSource<File> =
            JsonlSource::open(&path, IdRange::default(), MalformedPolicy::Fail)?;
        let image_dir = self.image_dir(data_dir, split);

        Ok(source
            .enumerate()
            .filter(move |(index, item)| match item {
                Ok(record) => latest.get(&record.id) == Some(index),
                Err(_) => true,
            })
            .map(move |(_, item)| item.map(|record| self.example(record, split, &image_dir))))
    }

    fn example(&self, record: Record, split: Split, image_dir: &Path) -> Example {
        let image_id = record.image_id();
        let langs = self
            .langs
            .iter()
            .map(|lang| {
                let value = record.fields.get(*lang).cloned().unwrap_or(Value::Null);
                (lang.to_string(), value)
            })
            .collect();

        Example {
            image_id,
            id: record.id,
            caption: record.caption,
            langs,
            image_url: record.image_url.unwrap_or_default(),
            image_file: image_dir.join(self.image_file_name(split, image_id)),
        }
    }
}

/// Position of the last line of every id. Stops at the first bad line; the
/// second pass reports it.
fn latest_line_per_id(path: &Path) -> Result<HashMap<i64, usize>> {
    let source: JsonlSource<File> =
        JsonlSource::open(path, IdRange::default(), MalformedPolicy::Fail)?;
    let mut latest = HashMap::new();
    for (index, item) in source.enumerate() {
        match item {
            Ok(record) => {
                latest.insert(record.id, index);
            }
            Err(_) => break,
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_aliases() {
        assert_eq!("dev".parse::<Split>().unwrap(), Split::Valid);
        assert_eq!("validation".parse::<Split>().unwrap(), Split::Valid);
        assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
        assert!("holdout".parse::<Split>().is_err());
    }

    #[test]
    fn test_image_file_names() {
        let coco = find_variant("coco_2017").unwrap();
        assert_eq!(coco.image_file_name(Split::Train, 139), "000000000139.jpg");

        let cc3m = find_variant("cc3m").unwrap();
        assert_eq!(cc3m.image_file_name(Split::Valid, 42), "cc3m_valid_00000042.jpg");
        assert!(find_variant("laion").is_err());
    }

    #[test]
    fn test_paths_match_downloader_layout() {
        let cc3m = find_variant("cc3m").unwrap();
        let data_dir = Path::new("/data");
        assert_eq!(
            cc3m.jsonl_path(data_dir, Split::Train),
            PathBuf::from("/data/cc3m_translated_train.jsonl")
        );
        assert_eq!(
            cc3m.image_dir(data_dir, Split::Train),
            PathBuf::from("/data/cc3m_images/cc3m_train")
        );
    }

    #[test]
    fn test_examples_attach_image_file() {
        let dir = TempDir::new().unwrap();
        let cc3m = find_variant("cc3m").unwrap();
        std::fs::write(
            cc3m.jsonl_path(dir.path(), Split::Valid),
            "{\"image_id\":3,\"id\":3,\"caption\":\"Dog.\",\"en\":\"dog\",\"fr\":\"chien\",\"image_url\":\"http://x/3\"}\n\
             {\"image_id\":4,\"id\":4,\"caption\":\"Cat.\",\"en\":\"cat\"}\n",
        )
        .unwrap();

        let examples: Vec<Example> = cc3m
            .examples(dir.path(), Split::Valid)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(examples.len(), 2);
        assert_eq!(
            examples[0].image_file,
            dir.path()
                .join("cc3m_images/cc3m_valid")
                .join("cc3m_valid_00000003.jpg")
        );
        assert_eq!(examples[0].langs.get("fr"), Some(&Value::String("chien".into())));
        assert_eq!(examples[1].langs.get("fr"), Some(&Value::Null));
        assert_eq!(examples[1].image_url, "");
    }

    #[test]
    fn test_examples_keep_last_line_per_id() {
        let dir = TempDir::new().unwrap();
        let cc3m = find_variant("cc3m").unwrap();
        std::fs::write(
            cc3m.jsonl_path(dir.path(), Split::Train),
            "{\"image_id\":1,\"id\":1,\"en\":\"dog\"}\n\
             {\"image_id\":2,\"id\":2,\"en\":\"cat\",\"fr\":\"chat\"}\n\
             \n\
             {\"image_id\":1,\"id\":1,\"en\":\"dog\",\"fr\":\"chien\"}\n",
        )
        .unwrap();

        let examples: Vec<Example> = cc3m
            .examples(dir.path(), Split::Train)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(examples.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(examples[1].langs.get("fr"), Some(&Value::String("chien".into())));
    }

    #[test]
    fn test_unknown_split_for_variant() {
        let dir = TempDir::new().unwrap();
        let cc3m = find_variant("cc3m").unwrap();
        assert!(cc3m.examples(dir.path(), Split::Test).is_err());
    }
}
