use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One caption/image unit, as stored on one JSONL line.
///
/// Known fields are typed; everything else (`en` and the per-language
/// translations) lives in `fields`. `image_url` is declared last so it is
/// always serialized last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Record {
    pub fn new(id: i64, caption: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            image_id: Some(id),
            id,
            caption: Some(caption.into()),
            fields: Map::new(),
            image_url: Some(image_url.into()),
        }
    }

    /// Falls back to `id` for inputs that never carried a separate image id.
    pub fn image_id(&self) -> i64 {
        self.image_id.unwrap_or(self.id)
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn set_text_field(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Half-open id range `[inf, sup)`; `sup = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdRange {
    pub inf: i64,
    pub sup: Option<i64>,
}

impl IdRange {
    pub fn new(inf: i64, sup: Option<i64>) -> Self {
        Self { inf, sup }
    }

    /// Range owned by worker `index` when ids are split into fixed-size shards.
    pub fn shard(index: u32, size: u32) -> Self {
        let inf = i64::from(index) * i64::from(size);
        Self {
            inf,
            sup: Some(inf + i64::from(size)),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        id >= self.inf && !self.is_past_end(id)
    }

    pub fn is_past_end(&self, id: i64) -> bool {
        self.sup.is_some_and(|sup| id >= sup)
    }

    pub fn label(&self) -> String {
        match self.sup {
            Some(sup) => format!("{}_to_{}", self.inf, sup),
            None => format!("{}_to_end", self.inf),
        }
    }
}

/// Counters reported at the end of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub read: usize,
    pub already_processed: usize,
    /// Partial records resubmitted with their stored fields.
    pub resumed: usize,
    pub duplicates: usize,
    pub completed: usize,
    pub failed: usize,
    pub batches: usize,
    pub flushes: usize,
    pub written: usize,
}
