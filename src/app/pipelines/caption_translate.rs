use crate::app::normalize::{clean_translation, normalize_caption};
use crate::core::retry::RetryPolicy;
use crate::domain::model::Record;
use crate::domain::ports::{RecordProcessor, Translator};
use crate::utils::error::{PrepError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

pub const SOURCE_LANG: &str = "en";

/// What is kept from a previous pass and what still needs translating.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationPlan {
    pub fields: Map<String, Value>,
    pub missing: Vec<String>,
}

/// Merges a record's existing derived fields with a freshly normalized
/// English caption.
///
/// Stored translations are reused only when the stored `en` equals the new
/// normalized text; otherwise every language is planned again. Fields that
/// are neither `en` nor a target language pass through untouched.
pub fn plan_translation(existing: &Map<String, Value>, en: &str, langs: &[String]) -> TranslationPlan {
    let unchanged = existing.get(SOURCE_LANG).and_then(Value::as_str) == Some(en);

    let mut fields: Map<String, Value> = existing
        .iter()
        .filter(|(key, _)| key.as_str() != SOURCE_LANG && !langs.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    fields.insert(SOURCE_LANG.to_string(), Value::String(en.to_string()));

    let mut missing = Vec::new();
    for lang in langs {
        let previous = existing
            .get(lang)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty());
        match previous {
            Some(text) if unchanged => {
                fields.insert(lang.clone(), Value::String(text.to_string()));
            }
            _ => missing.push(lang.clone()),
        }
    }

    TranslationPlan { fields, missing }
}

/// Whether a stored output line needs no further work: it has `en`, and
/// either `en` is empty or every target language is filled.
pub fn is_fully_translated(record: &Record, langs: &[String]) -> bool {
    match record.text_field(SOURCE_LANG) {
        None => false,
        Some("") => true,
        Some(_) => langs
            .iter()
            .all(|lang| record.text_field(lang).is_some_and(|text| !text.is_empty())),
    }
}

/// Puts `en` and the target languages, in configured order, after any
/// other derived fields.
fn order_fields(fields: &mut Map<String, Value>, langs: &[String]) {
    let mut ordered: Map<String, Value> = Map::new();
    let mut tail: Vec<(String, Value)> = Vec::new();
    for key in std::iter::once(SOURCE_LANG).chain(langs.iter().map(String::as_str)) {
        if let Some(value) = fields.remove(key) {
            tail.push((key.to_string(), value));
        }
    }
    for (key, value) in std::mem::take(fields) {
        ordered.insert(key, value);
    }
    ordered.extend(tail);
    *fields = ordered;
}

#[derive(Debug, Clone)]
pub struct TranslateSettings {
    pub langs: Vec<String>,
    pub retry: RetryPolicy,
    /// Pause after each translation request.
    pub pause: Duration,
}

/// Cleans the caption and fills one field per target language.
///
/// A language that still fails after the retry budget is left absent and
/// the record is emitted anyway; a later run fills the gap.
pub struct CaptionTranslator<T: Translator> {
    translator: T,
    settings: TranslateSettings,
}

impl<T: Translator> CaptionTranslator<T> {
    pub fn new(translator: T, settings: TranslateSettings) -> Self {
        Self {
            translator,
            settings,
        }
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    async fn translate_one(&self, text: &str, target: &str) -> Result<String> {
        let result = self
            .settings
            .retry
            .run(|_| async move {
                let raw = self.translator.translate(text, SOURCE_LANG, target).await?;
                clean_translation(&raw).ok_or_else(|| PrepError::TranslationError {
                    target: target.to_string(),
                    attempts: 1,
                    message: "empty translation".to_string(),
                })
            })
            .await;

        result.map_err(|(e, attempts)| PrepError::TranslationError {
            target: target.to_string(),
            attempts,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl<T: Translator> RecordProcessor for CaptionTranslator<T> {
    async fn process(&self, mut record: Record) -> Result<Record> {
        let en = normalize_caption(record.caption.as_deref().unwrap_or(""));
        let plan = plan_translation(&record.fields, &en, &self.settings.langs);
        record.fields = plan.fields;

        if en.is_empty() {
            tracing::warn!(record_id = record.id, "Caption is empty after normalization, not translating");
            return Ok(record);
        }

        for lang in &plan.missing {
            match self.translate_one(&en, lang).await {
                Ok(text) => record.set_text_field(lang, text),
                Err(e) => {
                    tracing::warn!(
                        record_id = record.id,
                        url = record.image_url.as_deref().unwrap_or(""),
                        error = %e,
                        "Translation gave up, leaving field empty"
                    );
                }
            }
            if !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }
        }

        order_fields(&mut record.fields, &self.settings.langs);
        Ok(record)
    }
}
